//! Parameter fingerprinting: deterministic identity for indicator configurations.
//!
//! - `ParamsFingerprint`: BLAKE3 hash of a parameter map serialized with sorted keys.
//! - `IndicatorRequest`: an indicator name plus its parameters.
//! - `SeriesKey`: (name, fingerprint), the key under which a computed series is stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hex-encoded BLAKE3 hash of a canonical parameter map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamsFingerprint(pub String);

impl ParamsFingerprint {
    /// Fingerprint a parameter map.
    ///
    /// `BTreeMap` gives sorted keys, so the JSON form (and the hash) does not
    /// depend on insertion order.
    pub fn of(params: &BTreeMap<String, f64>) -> Self {
        // Map<String, f64> serialization cannot fail; non-finite values become null.
        let json = serde_json::to_string(params).unwrap_or_default();
        Self::from_bytes(json.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamsFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to compute one indicator series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRequest {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl IndicatorRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter.
    pub fn param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Canonical (upper-case) indicator name.
    pub fn canonical_name(&self) -> String {
        self.name.trim().to_ascii_uppercase()
    }

    pub fn fingerprint(&self) -> ParamsFingerprint {
        ParamsFingerprint::of(&self.params)
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            name: self.canonical_name(),
            fingerprint: self.fingerprint(),
        }
    }
}

impl fmt::Display for IndicatorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, ")")
    }
}

/// Identity of one computed series: canonical name plus parameter fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub name: String,
    pub fingerprint: ParamsFingerprint,
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, &self.fingerprint.0[..12.min(self.fingerprint.0.len())])
    }
}
