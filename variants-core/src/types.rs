//! Domain types for versioned units.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a versioned unit (`Widget` in `Widget.v1.tsx`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitName(pub String);

impl UnitName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UnitName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UnitName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// VersionKey
// ---------------------------------------------------------------------------

/// Canonical version key, `v<major>[_<minor>]`.
///
/// The two numeric parts only provide a total order; they carry no
/// semantic-versioning meaning. `v1` sorts before `v1_0`, which sorts
/// before `v1_2`, which sorts before `v2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionKey {
    major: u64,
    minor: Option<u64>,
}

impl VersionKey {
    pub fn new(major: u64, minor: Option<u64>) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> Option<u64> {
        self.minor
    }

    /// `true` iff `raw` matches `^v\d+(_\d+)?$`.
    pub fn is_valid(raw: &str) -> bool {
        raw.parse::<VersionKey>().is_ok()
    }

    /// Version string as it appears in file names: `v1_2` → `1_2`.
    pub fn file_version(&self) -> String {
        match self.minor {
            Some(minor) => format!("{}_{}", self.major, minor),
            None => self.major.to_string(),
        }
    }

    /// Inverse of [`VersionKey::file_version`]: `1_2` → `v1_2`.
    pub fn from_file_version(raw: &str) -> Result<Self, CoreError> {
        format!("v{raw}").parse()
    }
}

fn parse_digits(raw: &str, original: &str) -> Result<u64, CoreError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidVersionKey(original.to_string()));
    }
    raw.parse::<u64>()
        .map_err(|_| CoreError::InvalidVersionKey(original.to_string()))
}

impl FromStr for VersionKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('v') else {
            return Err(CoreError::InvalidVersionKey(s.to_string()));
        };
        match rest.split_once('_') {
            Some((major, minor)) => Ok(Self {
                major: parse_digits(major, s)?,
                minor: Some(parse_digits(minor, s)?),
            }),
            None => Ok(Self {
                major: parse_digits(rest, s)?,
                minor: None,
            }),
        }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.file_version())
    }
}

impl Serialize for VersionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

/// File extensions a version file may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    Tsx,
    Ts,
    Jsx,
    Js,
}

impl Extension {
    /// Probe order used when several files exist for the same key.
    pub const DEFAULT_PROBE_ORDER: [Extension; 4] =
        [Extension::Tsx, Extension::Ts, Extension::Jsx, Extension::Js];

    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Tsx => "tsx",
            Extension::Ts => "ts",
            Extension::Jsx => "jsx",
            Extension::Js => "js",
        }
    }

    /// Whether files with this extension may contain JSX.
    pub fn supports_jsx(&self) -> bool {
        matches!(self, Extension::Tsx | Extension::Jsx)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Extension {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tsx" => Ok(Extension::Tsx),
            "ts" => Ok(Extension::Ts),
            "jsx" => Ok(Extension::Jsx),
            "js" => Ok(Extension::Js),
            other => Err(CoreError::InvalidExtension(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Hand-editable metadata preserved in the manifest across regenerations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One concrete implementation file of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub key: VersionKey,
    /// Absolute path to the backing file.
    pub path: PathBuf,
    pub extension: Extension,
    #[serde(default)]
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Identifier the manifest uses to import this version.
    pub render_ref: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(UnitName::from("Widget").to_string(), "Widget");
    }

    #[test]
    fn key_round_trips_through_display() {
        for raw in ["v1", "v10", "v1_2", "v0_0"] {
            let key: VersionKey = raw.parse().expect("valid key");
            assert_eq!(key.to_string(), raw);
        }
    }

    #[test]
    fn key_rejects_malformed_input() {
        for raw in ["", "v", "1", "V1", "v1_", "v_1", "v1_2_3", "v1.2", "v-1", "vx", " v1"] {
            assert!(raw.parse::<VersionKey>().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn key_ordering_is_major_then_minor() {
        let mut keys: Vec<VersionKey> = ["v10", "v2", "v1_2", "v1"]
            .iter()
            .map(|k| k.parse().unwrap())
            .collect();
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["v1", "v1_2", "v2", "v10"]);
    }

    #[test]
    fn file_version_conversion() {
        let key: VersionKey = "v1_2".parse().unwrap();
        assert_eq!(key.file_version(), "1_2");
        assert_eq!(VersionKey::from_file_version("1_2").unwrap(), key);
        assert_eq!(VersionKey::from_file_version("7").unwrap().to_string(), "v7");
    }

    #[test]
    fn key_serde_is_a_plain_string() {
        let key: VersionKey = "v3_1".parse().unwrap();
        let json = serde_yaml::to_string(&key).unwrap();
        assert_eq!(json.trim(), "v3_1");
        let back: VersionKey = serde_yaml::from_str("v3_1").unwrap();
        assert_eq!(back, key);
        assert!(serde_yaml::from_str::<VersionKey>("3_1").is_err());
    }

    #[test]
    fn extension_probe_order() {
        let order: Vec<&str> = Extension::DEFAULT_PROBE_ORDER
            .iter()
            .map(Extension::as_str)
            .collect();
        assert_eq!(order, vec!["tsx", "ts", "jsx", "js"]);
        assert!(Extension::Tsx.supports_jsx());
        assert!(!Extension::Ts.supports_jsx());
        assert!("mjs".parse::<Extension>().is_err());
    }
}
