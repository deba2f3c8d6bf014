//! Opaque, cheaply clonable cache keys.
//!
//! A [`Name`] is an immutable byte string. In the content-addressed store it is
//! a hierarchical `/`-separated name, but equality, hashing and ordering are
//! plain byte comparisons; nothing is normalized.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Immutable key shared between the cache index, the sketch and the accountant.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<[u8]>);

impl Name {
    /// Creates a name from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    /// Returns the raw key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the key in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the empty name.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `prefix` names a leading run of whole components.
    ///
    /// `/fog/instruction` is a prefix of `/fog/instruction/7` but not of
    /// `/fog/instructions`.
    ///
    /// ```
    /// use tinyslru::Name;
    ///
    /// let prefix = Name::from("/fog/instruction");
    /// assert!(Name::from("/fog/instruction/7").has_prefix(&prefix));
    /// assert!(Name::from("/fog/instruction").has_prefix(&prefix));
    /// assert!(!Name::from("/fog/instructions").has_prefix(&prefix));
    /// ```
    pub fn has_prefix(&self, prefix: &Name) -> bool {
        let prefix = prefix.as_bytes().strip_suffix(b"/").unwrap_or(prefix.as_bytes());
        match self.as_bytes().strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest[0] == b'/' || prefix.is_empty(),
            None => false,
        }
    }

    /// Returns a new name with `component` appended after a `/` separator.
    pub fn append(&self, component: &str) -> Name {
        let base = self.as_bytes().strip_suffix(b"/").unwrap_or(self.as_bytes());
        let mut bytes = Vec::with_capacity(base.len() + 1 + component.len());
        bytes.extend_from_slice(base);
        bytes.push(b'/');
        bytes.extend_from_slice(component.as_bytes());
        Name::from(bytes)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self(Arc::from(s.into_bytes()))
    }
}

impl From<Vec<u8>> for Name {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for Name {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", String::from_utf8_lossy(&self.0))
    }
}
