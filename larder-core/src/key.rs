//! Unique names and identities of cached objects.
//!
//! Every cached object is addressed by a [`UniqueName`], derived from the
//! codec's type name and the object's [`Identity`]:
//!
//! `{type}:{key1=value1&key2=value2}`
//!
//! ```
//! use larder_core::{KeyPart, UniqueName};
//!
//! let name = UniqueName::for_identity("user", &42u64);
//! assert_eq!(name.as_str(), "user:id=42");
//!
//! let parts = vec![KeyPart::new("org", Some("acme")), KeyPart::new("archived", None::<&str>)];
//! let name = UniqueName::for_identity("feed", &parts);
//! assert_eq!(name.as_str(), "feed:org=acme&archived");
//! ```
//!
//! Separators occurring inside keys or values are percent-escaped, so two
//! distinct identities of one type never collapse into the same name.

use std::borrow::Borrow;
use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

const PART_SEPARATOR: char = '&';
const VALUE_SEPARATOR: char = '=';
const TYPE_SEPARATOR: char = ':';

/// Stable key of one cache entry.
///
/// Unique per entry; derived from type name and identity. Cloning is cheap
/// for names up to 23 bytes (stored inline by [`SmolStr`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueName(SmolStr);

impl UniqueName {
    /// Wraps an already computed name.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    /// Computes the name of `identity` within the type `type_name`.
    pub fn for_identity<I>(type_name: &str, identity: &I) -> Self
    where
        I: Identity + ?Sized,
    {
        let mut name = String::with_capacity(type_name.len() + 16);
        push_escaped(&mut name, type_name, true);
        name.push(TYPE_SEPARATOR);
        for (i, part) in identity.key_parts().iter().enumerate() {
            if i > 0 {
                name.push(PART_SEPARATOR);
            }
            push_escaped(&mut name, part.key(), false);
            if let Some(value) = part.value() {
                name.push(VALUE_SEPARATOR);
                push_escaped(&mut name, value, false);
            }
        }
        Self(SmolStr::from(name))
    }

    /// Returns the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the type-name prefix of this name.
    pub fn type_name(&self) -> &str {
        self.0
            .split_once(TYPE_SEPARATOR)
            .map_or(self.0.as_str(), |(type_name, _)| type_name)
    }
}

fn push_escaped(out: &mut String, input: &str, escape_type_separator: bool) {
    for c in input.chars() {
        match c {
            '%' | PART_SEPARATOR | VALUE_SEPARATOR => {
                let _ = write!(out, "%{:02X}", c as u32);
            }
            TYPE_SEPARATOR if escape_type_separator => {
                let _ = write!(out, "%{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
}

impl fmt::Display for UniqueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UniqueName {
    fn from(name: &str) -> Self {
        Self(SmolStr::new(name))
    }
}

impl From<String> for UniqueName {
    fn from(name: String) -> Self {
        Self(SmolStr::from(name))
    }
}

impl AsRef<str> for UniqueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UniqueName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A single component of an identity.
///
/// The value is optional; key-only parts act as flags.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the key name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

/// The value that, together with a type, determines a [`UniqueName`].
///
/// Scalars map to a single `id` part. Composite identities (for example a
/// record id plus a locale) list one part per component, in a stable order.
pub trait Identity: Send + Sync {
    /// Returns the parts identifying this object within its type.
    fn key_parts(&self) -> Vec<KeyPart>;
}

impl Identity for str {
    fn key_parts(&self) -> Vec<KeyPart> {
        vec![KeyPart::new("id", Some(self))]
    }
}

impl Identity for String {
    fn key_parts(&self) -> Vec<KeyPart> {
        self.as_str().key_parts()
    }
}

impl Identity for SmolStr {
    fn key_parts(&self) -> Vec<KeyPart> {
        self.as_str().key_parts()
    }
}

impl Identity for [KeyPart] {
    fn key_parts(&self) -> Vec<KeyPart> {
        self.to_vec()
    }
}

impl Identity for Vec<KeyPart> {
    fn key_parts(&self) -> Vec<KeyPart> {
        self.clone()
    }
}

impl<T: Identity + ?Sized> Identity for &T {
    fn key_parts(&self) -> Vec<KeyPart> {
        (**self).key_parts()
    }
}

macro_rules! integer_identity {
    ($($ty:ty),*) => {
        $(
            impl Identity for $ty {
                fn key_parts(&self) -> Vec<KeyPart> {
                    vec![KeyPart::new("id", Some(self.to_string()))]
                }
            }
        )*
    };
}

integer_identity!(u16, u32, u64, usize, i16, i32, i64);
