use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

pub type Amount = u64;
pub type Timestamp = u64;

pub const NOS_DECIMALS: u32 = 8;
pub const NOS_SCALE: u64 = 100_000_000; // 1 NOS = 1e8 minimal units

/// 20-byte principal identifying an account or a ledger instance.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Last 20 bytes of SHA-256 over `material` (a public key, a label, ...).
    pub fn derive(material: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(material).into();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let raw = hex::decode(digits)
            .map_err(|e| LedgerError::InvalidIdentifier(format!("address {s}: {e}")))?;
        let bytes: [u8; 20] = raw.try_into().map_err(|_| {
            LedgerError::InvalidIdentifier(format!("address {s}: expected 20 bytes"))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Fixed-width 32-byte identifier, right-padded with zero bytes.
///
/// Logic always compares the full width; trailing zeros are only trimmed for
/// display.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id32([u8; 32]);

pub type OperatorId = Id32;
pub type PlayerId = Id32;

impl Id32 {
    pub const ZERO: Id32 = Id32([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Pads `text` with zero bytes; longer than 32 bytes is rejected.
    pub fn from_text(text: &str) -> Result<Self, LedgerError> {
        let raw = text.as_bytes();
        if raw.len() > 32 {
            return Err(LedgerError::InvalidIdentifier(format!(
                "{text}: longer than 32 bytes"
            )));
        }
        let mut bytes = [0u8; 32];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn trimmed(&self) -> &[u8] {
        let end = self
            .0
            .iter()
            .rposition(|b| *b != 0)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        &self.0[..end]
    }
}

impl fmt::Display for Id32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(self.trimmed()) {
            Ok(text) => f.write_str(text),
            Err(_) => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

impl fmt::Debug for Id32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id32({:?})", String::from_utf8_lossy(self.trimmed()))
    }
}

impl FromStr for Id32 {
    type Err = LedgerError;

    /// `0x` followed by 64 hex digits is taken as raw bytes; anything else is
    /// text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_prefix("0x") {
            if digits.len() == 64 {
                let raw = hex::decode(digits)
                    .map_err(|e| LedgerError::InvalidIdentifier(format!("{s}: {e}")))?;
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&raw);
                return Ok(Self(bytes));
            }
        }
        Self::from_text(s)
    }
}

impl Serialize for Id32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for Id32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Parses a decimal token amount such as `"5000"` or `"0.00000001"`.
pub fn parse_amount(text: &str) -> Result<Amount, LedgerError> {
    let invalid = |why: &str| LedgerError::InvalidAmount(format!("{text}: {why}"));
    let text = text.trim();
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("empty"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }
    if frac.len() > NOS_DECIMALS as usize {
        return Err(invalid("more than 8 fractional digits"));
    }
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("too large"))?
    };
    let mut frac_units: u64 = 0;
    for (idx, digit) in frac.bytes().enumerate() {
        frac_units += u64::from(digit - b'0') * 10u64.pow(NOS_DECIMALS - 1 - idx as u32);
    }
    whole
        .checked_mul(NOS_SCALE)
        .and_then(|units| units.checked_add(frac_units))
        .ok_or_else(|| invalid("too large"))
}

/// Renders scaled units as a decimal token amount without trailing zeros.
pub fn format_amount(amount: Amount) -> String {
    let whole = amount / NOS_SCALE;
    let frac = amount % NOS_SCALE;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:08}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
