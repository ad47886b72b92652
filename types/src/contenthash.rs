//! Content-pointer codec.
//!
//! The naming registry's resolver stores one opaque byte string per node: a
//! variable-length namespace code followed by the raw binary form of a
//! content identifier. This module parses the textual identifiers the
//! storage network hands back, encodes them into that pointer format, and
//! decodes pointers found on nodes - including pointers written by third
//! parties under namespaces we do not publish.
//!
//! Two identifier generations are supported:
//!
//! - legacy: base58btc text (`Qm...`), binary form is the bare sha2-256
//!   multihash (`0x12 0x20` + 32-byte digest);
//! - current: multibase base32 text (`b...`), binary form is
//!   `version(1) || codec || multihash`.
//!
//! `decode(encode(x)) == x` holds for every valid identifier of either
//! generation. Malformed input never produces a pointer: parsing fails
//! loudly rather than truncating, because a wrong pointer resolves to wrong
//! content forever once fuses are burned.
//!
//! The base32/base58 codecs are implemented here rather than imported; they
//! are a few dozen lines each and are load-bearing parts of the pointer
//! format, not general-purpose plumbing.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Namespace code for content-addressed storage pointers.
const CONTENT_NAMESPACE: u64 = 0xe3;
/// Namespace code for mutable-pointer (name-resolution) entries.
const MUTABLE_NAMESPACE: u64 = 0xe5;

/// sha2-256 multihash code and digest length.
const MULTIHASH_SHA2_256: u64 = 0x12;
const SHA2_256_LEN: usize = 32;

/// Errors from parsing or decoding content identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentIdError {
    #[error("unrecognized content identifier format: {0:?}")]
    UnknownFormat(String),
    #[error("invalid base58 in legacy content identifier")]
    BadBase58,
    #[error("invalid base32 in content identifier")]
    BadBase32,
    #[error("legacy identifier must wrap a 32-byte sha2-256 multihash")]
    BadLegacyMultihash,
    #[error("unsupported content identifier version {0}")]
    UnsupportedVersion(u64),
    #[error("truncated content identifier")]
    Truncated,
    #[error("multihash length {declared} does not match remaining {actual} bytes")]
    MultihashLength { declared: usize, actual: usize },
    #[error("pointer does not carry a content identifier")]
    NotContentAddressed,
}

// ── Unsigned varints ─────────────────────────────────────────

fn write_uvarint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Returns `(value, bytes_consumed)`, or `None` on truncation/overflow.
/// A u64 needs at most ten varint bytes.
fn read_uvarint(input: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (idx, &byte) in input.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (idx * 7);
        if byte & 0x80 == 0 {
            return Some((value, idx + 1));
        }
    }
    None
}

// ── Base58btc ────────────────────────────────────────────────

const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn base58_encode(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|&&b| b == 0).count();
    // Little-endian base58 digits.
    let mut digits: Vec<u32> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for &byte in &bytes[zeros..] {
        let mut carry = u32::from(byte);
        for digit in &mut digits {
            carry += *digit << 8;
            *digit = carry % 58;
            carry /= 58;
        }
        while carry > 0 {
            digits.push(carry % 58);
            carry /= 58;
        }
    }
    let mut out = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        out.push('1');
    }
    for &digit in digits.iter().rev() {
        out.push(BASE58_ALPHABET[digit as usize] as char);
    }
    out
}

fn base58_decode(input: &str) -> Option<Vec<u8>> {
    // Big-endian byte accumulator.
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    for ch in input.bytes() {
        let value = BASE58_ALPHABET.iter().position(|&c| c == ch)? as u32;
        let mut carry = value;
        for byte in bytes.iter_mut().rev() {
            let acc = u32::from(*byte) * 58 + carry;
            *byte = (acc & 0xff) as u8;
            carry = acc >> 8;
        }
        while carry > 0 {
            bytes.insert(0, (carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    let zeros = input.bytes().take_while(|&c| c == b'1').count();
    let mut out = vec![0u8; zeros];
    out.extend(bytes);
    Some(out)
}

// ── Base32 (RFC 4648 lowercase, no padding) ──────────────────

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u64 = 0;
    let mut bits: u32 = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | u64::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits: u32 = 0;
    for ch in input.bytes() {
        let value = match ch {
            b'a'..=b'z' => ch - b'a',
            b'2'..=b'7' => ch - b'2' + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | u64::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    // Trailing bits are zero padding from the encoder; anything else means
    // the text was not produced from whole bytes.
    if bits > 0 && buffer & ((1 << bits) - 1) != 0 {
        return None;
    }
    Some(out)
}

// ── Content identifiers ──────────────────────────────────────

/// A parsed content identifier from the content-addressed storage network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentId {
    /// Legacy generation: bare sha2-256 digest, rendered base58btc.
    Legacy([u8; SHA2_256_LEN]),
    /// Current generation: explicit codec plus multihash, rendered as
    /// multibase base32.
    Current { codec: u64, multihash: Vec<u8> },
}

impl ContentId {
    /// Parse the textual form returned by the storage network.
    ///
    /// Accepts both generations; anything else fails loudly. A truncated or
    /// corrupted identifier must never silently become a pointer.
    pub fn parse(input: &str) -> Result<Self, ContentIdError> {
        if input.starts_with("Qm") && input.len() == 46 {
            let bytes = base58_decode(input).ok_or(ContentIdError::BadBase58)?;
            return Self::legacy_from_multihash(&bytes);
        }
        if let Some(rest) = input.strip_prefix('b') {
            let bytes = base32_decode(rest).ok_or(ContentIdError::BadBase32)?;
            let (version, consumed) = read_uvarint(&bytes).ok_or(ContentIdError::Truncated)?;
            if version != 1 {
                return Err(ContentIdError::UnsupportedVersion(version));
            }
            return Self::current_from_bytes(&bytes[consumed..]);
        }
        Err(ContentIdError::UnknownFormat(truncate_for_error(input)))
    }

    /// Binary form: what gets embedded into a pointer after the namespace.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Legacy(digest) => {
                let mut out = Vec::with_capacity(2 + SHA2_256_LEN);
                write_uvarint(&mut out, MULTIHASH_SHA2_256);
                write_uvarint(&mut out, SHA2_256_LEN as u64);
                out.extend_from_slice(digest);
                out
            }
            Self::Current { codec, multihash } => {
                let mut out = Vec::with_capacity(2 + multihash.len());
                write_uvarint(&mut out, 1);
                write_uvarint(&mut out, *codec);
                out.extend_from_slice(multihash);
                out
            }
        }
    }

    /// Inverse of [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContentIdError> {
        let (version, consumed) = read_uvarint(bytes).ok_or(ContentIdError::Truncated)?;
        match version {
            // A leading sha2-256 multihash code means a legacy identifier:
            // its binary form has no version prefix.
            MULTIHASH_SHA2_256 => Self::legacy_from_multihash(bytes),
            1 => Self::current_from_bytes(&bytes[consumed..]),
            other => Err(ContentIdError::UnsupportedVersion(other)),
        }
    }

    fn legacy_from_multihash(bytes: &[u8]) -> Result<Self, ContentIdError> {
        let [code, len, digest @ ..] = bytes else {
            return Err(ContentIdError::BadLegacyMultihash);
        };
        if u64::from(*code) != MULTIHASH_SHA2_256
            || usize::from(*len) != SHA2_256_LEN
            || digest.len() != SHA2_256_LEN
        {
            return Err(ContentIdError::BadLegacyMultihash);
        }
        let mut out = [0u8; SHA2_256_LEN];
        out.copy_from_slice(digest);
        Ok(Self::Legacy(out))
    }

    /// Parse `codec || multihash` (the bytes after a version-1 prefix).
    fn current_from_bytes(bytes: &[u8]) -> Result<Self, ContentIdError> {
        let (codec, consumed) = read_uvarint(bytes).ok_or(ContentIdError::Truncated)?;
        let multihash = &bytes[consumed..];

        // Validate multihash framing: code, declared length, digest.
        let (_code, code_len) = read_uvarint(multihash).ok_or(ContentIdError::Truncated)?;
        let (declared, len_len) =
            read_uvarint(&multihash[code_len..]).ok_or(ContentIdError::Truncated)?;
        let actual = multihash.len() - code_len - len_len;
        if declared as usize != actual {
            return Err(ContentIdError::MultihashLength {
                declared: declared as usize,
                actual,
            });
        }

        Ok(Self::Current {
            codec,
            multihash: multihash.to_vec(),
        })
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(digest) => {
                let mut bytes = Vec::with_capacity(2 + SHA2_256_LEN);
                write_uvarint(&mut bytes, MULTIHASH_SHA2_256);
                write_uvarint(&mut bytes, SHA2_256_LEN as u64);
                bytes.extend_from_slice(digest);
                f.write_str(&base58_encode(&bytes))
            }
            Self::Current { .. } => {
                write!(f, "b{}", base32_encode(&self.to_bytes()))
            }
        }
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn truncate_for_error(input: &str) -> String {
    const MAX: usize = 32;
    if input.len() <= MAX {
        input.to_string()
    } else {
        let cut = input
            .char_indices()
            .take_while(|(idx, _)| *idx < MAX)
            .last()
            .map_or(0, |(idx, ch)| idx + ch.len_utf8());
        format!("{}...", &input[..cut])
    }
}

// ── Pointers ─────────────────────────────────────────────────

/// Classification of a pointer's namespace, for read paths that encounter
/// entries written by third parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Content-addressed storage identifier (the only kind we publish).
    ContentAddressed,
    /// Mutable name-resolution pointer.
    MutablePointer,
    /// Any other namespace, carried for display.
    Other(u64),
}

/// Result of decoding a pointer read back from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPointer {
    Content(ContentId),
    /// A foreign namespace we can classify but not interpret.
    Foreign {
        kind: PointerKind,
        payload: Vec<u8>,
    },
}

/// The resolver-side binary pointer: namespace varint plus identifier bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPointer(Vec<u8>);

impl ContentPointer {
    /// Encode a content identifier into pointer bytes.
    #[must_use]
    pub fn encode(id: &ContentId) -> Self {
        let mut out = Vec::new();
        write_uvarint(&mut out, CONTENT_NAMESPACE);
        out.extend_from_slice(&id.to_bytes());
        Self(out)
    }

    /// Wrap raw pointer bytes read from the registry.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Namespace classification. Never fails: a foreign or mangled prefix is
    /// reported, not rejected, because read paths must tolerate pointers we
    /// did not write.
    #[must_use]
    pub fn kind(&self) -> PointerKind {
        match read_uvarint(&self.0) {
            Some((CONTENT_NAMESPACE, _)) => PointerKind::ContentAddressed,
            Some((MUTABLE_NAMESPACE, _)) => PointerKind::MutablePointer,
            Some((other, _)) => PointerKind::Other(other),
            None => PointerKind::Other(0),
        }
    }

    /// Exact inverse of [`Self::encode`] for content-addressed pointers;
    /// foreign namespaces come back as [`DecodedPointer::Foreign`].
    pub fn decode(&self) -> Result<DecodedPointer, ContentIdError> {
        let (namespace, consumed) = read_uvarint(&self.0).ok_or(ContentIdError::Truncated)?;
        let payload = &self.0[consumed..];
        if namespace == CONTENT_NAMESPACE {
            Ok(DecodedPointer::Content(ContentId::from_bytes(payload)?))
        } else {
            Ok(DecodedPointer::Foreign {
                kind: self.kind(),
                payload: payload.to_vec(),
            })
        }
    }
}

impl fmt::Display for ContentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl Serialize for ContentPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentPointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| serde::de::Error::custom("pointer must start with 0x"))?;
        let bytes = hex::decode(digits).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}
