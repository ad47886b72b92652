//! Names, labels, and the identifiers derived from them.
//!
//! A [`Name`] is a dot-separated sequence of validated labels
//! (`v2.demo.site`). A [`NodeId`] is the registry's 32-byte address for a
//! name, computed by folding label digests over the parent node. An
//! [`Address`] is a 20-byte account identifier; account identifiers are not
//! case-sensitive in this domain, so the canonical form is lowercase hex.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ── Account identifiers ──────────────────────────────────────

/// A 20-byte account identifier, canonically lowercase.
///
/// Equality is byte equality, so mixed-case inputs that denote the same
/// account always compare equal after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("account identifier must start with 0x")]
    MissingPrefix,
    #[error("account identifier must be 40 hex digits, got {0}")]
    BadLength(usize),
    #[error("account identifier contains non-hex characters")]
    BadHex,
}

impl Address {
    /// The all-zero identifier the registry reports for unowned nodes.
    pub const ZERO: Self = Self([0u8; 20]);

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn parse(input: &str) -> Result<Self, AddressParseError> {
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        if digits.len() != 40 {
            return Err(AddressParseError::BadLength(digits.len()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressParseError::BadHex)?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ── Node addressing ──────────────────────────────────────────

/// The registry's 32-byte node address for a name.
///
/// Computed recursively: the root (empty name) is all zeroes, and
/// `node(child.parent) = sha256(node(parent) || sha256(child))`. The scheme
/// commits to the full label path, so two distinct names can never share a
/// node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId([u8; 32]);

impl NodeId {
    /// Address of the registry root (the empty name).
    pub const ROOT: Self = Self([0u8; 32]);

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Node address of `label` under `self`.
    #[must_use]
    pub fn child(&self, label: &str) -> Self {
        let label_hash: [u8; 32] = Sha256::digest(label.as_bytes()).into();
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(label_hash);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| serde::de::Error::custom("node id must start with 0x"))?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

// ── Names ────────────────────────────────────────────────────

/// A validated, dot-separated registry name (`v2.demo.site`).
///
/// Labels are lowercase ASCII alphanumerics and hyphens, non-empty, and may
/// not start or end with a hyphen. Names are stored as entered and never
/// re-cased: label validation already rejects anything that would need it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameParseError {
    #[error("name must not be empty")]
    Empty,
    #[error("empty label in name")]
    EmptyLabel,
    #[error("invalid label {0:?}: labels are lowercase alphanumerics and interior hyphens")]
    BadLabel(String),
}

fn validate_label(label: &str) -> Result<(), NameParseError> {
    if label.is_empty() {
        return Err(NameParseError::EmptyLabel);
    }
    let chars_ok = label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !chars_ok || label.starts_with('-') || label.ends_with('-') {
        return Err(NameParseError::BadLabel(label.to_string()));
    }
    Ok(())
}

impl Name {
    pub fn parse(input: &str) -> Result<Self, NameParseError> {
        if input.is_empty() {
            return Err(NameParseError::Empty);
        }
        for label in input.split('.') {
            validate_label(label)?;
        }
        Ok(Self(input.to_string()))
    }

    /// The name `label.self`.
    pub fn child(&self, label: &str) -> Result<Self, NameParseError> {
        validate_label(label)?;
        Ok(Self(format!("{label}.{}", self.0)))
    }

    /// Labels in written order, most-specific first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Registry node address of this name.
    ///
    /// Folds [`NodeId::child`] from the root, so `v2.demo.site` hashes
    /// `site`, then `demo`, then `v2`.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.0
            .rsplit('.')
            .fold(NodeId::ROOT, |node, label| node.child(label))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Name {
    type Error = NameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Name> for String {
    fn from(value: Name) -> Self {
        value.0
    }
}

impl FromStr for Name {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
