//! Label sets and alert fingerprints.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AlertmanagerError, Result};

/// Mapping from label name to value. Ordered so that hashing and JSON output
/// are deterministic.
pub type LabelSet = BTreeMap<String, String>;

static LABEL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap_or_else(|_| unreachable!("static regex"))
});

/// Returns true if `name` is a valid label name.
#[must_use]
pub fn is_valid_label_name(name: &str) -> bool {
    LABEL_NAME.is_match(name)
}

/// Removes every label whose value is the empty string.
pub fn remove_empty_labels(labels: &mut LabelSet) {
    labels.retain(|_, v| !v.is_empty());
}

/// Validates every label name in the set.
///
/// # Errors
///
/// Returns `BadData` naming the first invalid label.
pub fn validate_label_names(labels: &LabelSet) -> Result<()> {
    for name in labels.keys() {
        if !is_valid_label_name(name) {
            return Err(AlertmanagerError::bad_data(format!(
                "invalid label name {name:?}"
            )));
        }
    }
    Ok(())
}

/// Deterministic identity hash of a label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(u64);

const SEPARATOR: u8 = 0xff;

impl Fingerprint {
    /// Computes the fingerprint of a label set.
    #[must_use]
    pub fn of(labels: &LabelSet) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in labels {
            hasher.update(name.as_bytes());
            hasher.update(&[SEPARATOR]);
            hasher.update(value.as_bytes());
            hasher.update(&[SEPARATOR]);
        }
        let hash = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        Self(u64::from_be_bytes(prefix))
    }

    /// Parses a 16 digit hex fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `BadData` if the string is not hex.
    pub fn parse(s: &str) -> Result<Self> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| AlertmanagerError::bad_data(format!("invalid fingerprint {s:?}: {e}")))
    }

    /// The raw hash value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
