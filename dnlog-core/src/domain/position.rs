use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ids::PositionId;
use crate::hedge::{self, RehedgeDecision};

/// Option right. A long call carries positive delta, a long put negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Single-letter suffix used in contract names and exchange symbols.
    pub fn suffix(self) -> char {
        match self {
            OptionType::Call => 'C',
            OptionType::Put => 'P',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown option type '{0}' (expected call, put, c or p)")]
pub struct ParseOptionTypeError(pub String);

impl FromStr for OptionType {
    type Err = ParseOptionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            other => Err(ParseOptionTypeError(other.to_string())),
        }
    }
}

fn default_active() -> bool {
    true
}

/// One option contract paired with its perpetual hedge.
///
/// `current_hedge` is signed: negative is a short perp position, positive a long one.
/// It only moves through a confirmed rehedge in the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    #[serde(rename = "name")]
    pub contract_name: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: String,
    pub size: f64,
    pub entry_delta: f64,
    pub band: f64,
    pub current_hedge: f64,
    pub last_delta: f64,
    #[serde(default)]
    pub rehedge_count: u32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_symbol: Option<String>,
}

impl Position {
    /// Hedge that would neutralize the option at `observed_delta`.
    pub fn target_hedge(&self, observed_delta: f64) -> f64 {
        hedge::target_hedge(self.size, observed_delta, self.option_type)
    }

    /// Evaluate the band rule against the currently held hedge.
    pub fn check_rehedge(&self, observed_delta: f64) -> RehedgeDecision {
        hedge::rehedge_decision(self.current_hedge, self.target_hedge(observed_delta), self.band)
    }

    /// Directional exposure of the option leg alone (`size * last_delta`, signed by type).
    pub fn option_exposure(&self) -> f64 {
        -self.target_hedge(self.last_delta)
    }

    /// Net exposure of option plus hedge at the last observed delta.
    pub fn net_exposure(&self) -> f64 {
        self.option_exposure() + self.current_hedge
    }

    /// "SHORT", "LONG" or "FLAT" for the perp leg.
    pub fn hedge_side(&self) -> &'static str {
        hedge::hedge_side(self.current_hedge)
    }
}

/// A closed position as stored in the archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedPosition {
    #[serde(flatten)]
    pub position: Position,
    pub closed_at: NaiveDateTime,
}

impl ArchivedPosition {
    pub fn id(&self) -> &PositionId {
        &self.position.id
    }
}
