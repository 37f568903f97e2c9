use serde::{Deserialize, Serialize};

/// Row version used for compare-and-swap updates.
///
/// A stored transaction starts at version 1; every successful write
/// increments it by one. Version 0 means "never stored".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for an unsaved transaction.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first stored version (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the version a successful write produces.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns true once the transaction has been written at least once.
    pub fn is_stored(&self) -> bool {
        self.0 > 0
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
