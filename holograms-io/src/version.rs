use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol revisions of the world engine that have an encoder.
///
/// Revisions are named after the engine's internal package tags (`v1_16_R3`).
/// Several revisions can share a minor version; feature gates only look at the minor.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    v1_8_R3,
    v1_9_R1,
    v1_9_R2,
    v1_10_R1,
    v1_11_R1,
    v1_12_R1,
    v1_13_R1,
    v1_13_R2,
    v1_14_R1,
    v1_15_R1,
    v1_16_R1,
    v1_16_R2,
    v1_16_R3,
    v1_17_R1,
    v1_18_R1,
    v1_18_R2,
    v1_19_R1,
    v1_19_R2,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 18] = [
        Self::v1_8_R3,
        Self::v1_9_R1,
        Self::v1_9_R2,
        Self::v1_10_R1,
        Self::v1_11_R1,
        Self::v1_12_R1,
        Self::v1_13_R1,
        Self::v1_13_R2,
        Self::v1_14_R1,
        Self::v1_15_R1,
        Self::v1_16_R1,
        Self::v1_16_R2,
        Self::v1_16_R3,
        Self::v1_17_R1,
        Self::v1_18_R1,
        Self::v1_18_R2,
        Self::v1_19_R1,
        Self::v1_19_R2,
    ];

    /// The newest revision with an encoder.
    pub const LATEST: ProtocolVersion = Self::v1_19_R2;

    pub fn minor(self) -> u8 {
        match self {
            Self::v1_8_R3 => 8,
            Self::v1_9_R1 | Self::v1_9_R2 => 9,
            Self::v1_10_R1 => 10,
            Self::v1_11_R1 => 11,
            Self::v1_12_R1 => 12,
            Self::v1_13_R1 | Self::v1_13_R2 => 13,
            Self::v1_14_R1 => 14,
            Self::v1_15_R1 => 15,
            Self::v1_16_R1 | Self::v1_16_R2 | Self::v1_16_R3 => 16,
            Self::v1_17_R1 => 17,
            Self::v1_18_R1 | Self::v1_18_R2 => 18,
            Self::v1_19_R1 | Self::v1_19_R2 => 19,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::v1_8_R3 => "v1_8_R3",
            Self::v1_9_R1 => "v1_9_R1",
            Self::v1_9_R2 => "v1_9_R2",
            Self::v1_10_R1 => "v1_10_R1",
            Self::v1_11_R1 => "v1_11_R1",
            Self::v1_12_R1 => "v1_12_R1",
            Self::v1_13_R1 => "v1_13_R1",
            Self::v1_13_R2 => "v1_13_R2",
            Self::v1_14_R1 => "v1_14_R1",
            Self::v1_15_R1 => "v1_15_R1",
            Self::v1_16_R1 => "v1_16_R1",
            Self::v1_16_R2 => "v1_16_R2",
            Self::v1_16_R3 => "v1_16_R3",
            Self::v1_17_R1 => "v1_17_R1",
            Self::v1_18_R1 => "v1_18_R1",
            Self::v1_18_R2 => "v1_18_R2",
            Self::v1_19_R1 => "v1_19_R1",
            Self::v1_19_R2 => "v1_19_R2",
        }
    }

    pub fn after(self, minor: u8) -> bool {
        self.minor() > minor
    }

    pub fn after_or_equal(self, minor: u8) -> bool {
        self.minor() >= minor
    }

    pub fn is(self, minor: u8) -> bool {
        self.minor() == minor
    }

    pub fn before(self, minor: u8) -> bool {
        self.minor() < minor
    }

    pub fn before_or_equal(self, minor: u8) -> bool {
        self.minor() <= minor
    }

    /// Hex (RGB) colours in names are understood from 1.16 on.
    pub fn supports_hex(self) -> bool {
        self.after_or_equal(16)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when a string names no known revision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported protocol version: {0}")]
pub struct UnknownVersion(pub String);

impl FromStr for ProtocolVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.tag().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVersion(wanted.to_string()))
    }
}
