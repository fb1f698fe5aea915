//! Schema-tagged particle status codes.
//!
//! The two record schemas disagree on how a final-state particle is encoded:
//!
//! | Meaning | [`Schema::Rich`] (generator-native) | [`Schema::Minimal`] (v2 output) |
//! |---|---|---|
//! | final / observable | any positive code | `1` |
//! | decayed hadron | `-81..=-99` | `2` |
//! | beam | `-11..=-19` | `4` |
//! | other intermediate | any other negative code | `3`, `11..` |
//! | undefined | `0` | `0` |
//!
//! A raw code is meaningless without its schema, so every event carries a
//! [`Schema`] tag and all interpretation goes through [`Schema::classify`] and
//! [`Schema::encode`]. Conversions between schemas decode to the canonical
//! [`ParticleStatus`] and re-encode; they never reinterpret a raw integer.
//!
//! Remapping is lossy in three places:
//!
//! - rich final codes collapse to `1`;
//! - minimal generator-specific codes `11..=19` / `81..=99` land in the rich
//!   beam / decayed-hadron ranges and therefore come back as `4` / `2`;
//! - minimal codes `5..=10` and negative minimal codes are unclassified
//!   intermediates below the generator-specific range and come back as `3`.

use serde::{Deserialize, Serialize};

/// Rich-schema code written for a decayed particle.
const RICH_DECAYED: i32 = -91;

/// Rich-schema code written for a beam particle.
const RICH_BEAM: i32 = -12;

/// Minimal-schema code for documentation / unclassified intermediates.
const MINIMAL_DOCUMENTATION: i32 = 3;

/// First minimal-schema code reserved for generator-specific intermediates.
const MINIMAL_GENERATOR_SPECIFIC: u32 = 11;

/// The status-code convention an event's particles are encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Generator-native signed codes, used by v3 records and working states.
    Rich,
    /// Standard positive codes, used by v2 records for downstream consumers.
    Minimal,
}

/// Canonical, schema-independent particle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleStatus {
    /// Stable, observable particle with no further decay in the record.
    Final,
    /// Unstable hadron whose decay products are recorded.
    Decayed,
    /// Incoming beam particle.
    Beam,
    /// Any other intermediate or documentation entry, with its code magnitude.
    Intermediate(u32),
    /// No status information.
    Undefined,
}

impl ParticleStatus {
    /// Whether the particle is in the final state.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }

    /// Whether the particle decayed inside the record.
    pub const fn is_decayed(self) -> bool {
        matches!(self, Self::Decayed)
    }
}

impl Schema {
    /// Interpret a raw status code in this schema.
    pub fn classify(self, code: i32) -> ParticleStatus {
        match self {
            Self::Rich => match code {
                0 => ParticleStatus::Undefined,
                c if c > 0 => ParticleStatus::Final,
                -19..=-11 => ParticleStatus::Beam,
                -99..=-81 => ParticleStatus::Decayed,
                c => ParticleStatus::Intermediate(c.unsigned_abs()),
            },
            Self::Minimal => match code {
                0 => ParticleStatus::Undefined,
                1 => ParticleStatus::Final,
                2 => ParticleStatus::Decayed,
                4 => ParticleStatus::Beam,
                c => ParticleStatus::Intermediate(c.unsigned_abs()),
            },
        }
    }

    /// Encode a canonical status as a raw code of this schema.
    pub fn encode(self, status: ParticleStatus) -> i32 {
        match self {
            Self::Rich => match status {
                ParticleStatus::Final => 1,
                ParticleStatus::Decayed => RICH_DECAYED,
                ParticleStatus::Beam => RICH_BEAM,
                ParticleStatus::Intermediate(n) => {
                    i32::try_from(n).map_or(i32::MIN, |n| n.saturating_neg())
                }
                ParticleStatus::Undefined => 0,
            },
            Self::Minimal => match status {
                ParticleStatus::Final => 1,
                ParticleStatus::Decayed => 2,
                ParticleStatus::Beam => 4,
                ParticleStatus::Intermediate(n) if n >= MINIMAL_GENERATOR_SPECIFIC => {
                    i32::try_from(n).unwrap_or(i32::MAX)
                }
                ParticleStatus::Intermediate(_) => MINIMAL_DOCUMENTATION,
                ParticleStatus::Undefined => 0,
            },
        }
    }

    /// Re-encode a raw code of this schema into `target`.
    pub fn convert(self, code: i32, target: Self) -> i32 {
        if self == target {
            code
        } else {
            target.encode(self.classify(code))
        }
    }

    /// Short lowercase name of the schema.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rich => "rich",
            Self::Minimal => "minimal",
        }
    }
}

impl core::fmt::Display for Schema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl core::str::FromStr for Schema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rich" => Ok(Self::Rich),
            "minimal" => Ok(Self::Minimal),
            other => Err(format!("unknown schema '{other}' (expected rich or minimal)")),
        }
    }
}
