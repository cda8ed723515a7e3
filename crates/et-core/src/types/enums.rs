//! Enumerations shared by the market-data, order and session crates.
//!
//! Wire spellings follow the order gateway's conventions (`BUY`, `LMT`,
//! `DAY`, ...), so the serde representations double as the payload values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EtError;

// ---------------------------------------------------------------------------
// Order side / reference price point
// ---------------------------------------------------------------------------

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Which side of the last quote an order is priced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PricePoint {
    Bid,
    Ask,
}

impl fmt::Display for PricePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "BID"),
            Self::Ask => write!(f, "ASK"),
        }
    }
}

impl FromStr for PricePoint {
    type Err = EtError;

    /// Case-insensitive `BID` / `ASK`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BID" => Ok(Self::Bid),
            "ASK" => Ok(Self::Ask),
            other => Err(EtError::InvalidArgument(format!(
                "price point must be BID or ASK, got '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Order parameters
// ---------------------------------------------------------------------------

/// Order type as understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderType {
    #[serde(rename = "MKT")]
    Market,
    #[default]
    #[serde(rename = "LMT")]
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "MKT"),
            Self::Limit => write!(f, "LMT"),
        }
    }
}

/// Time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Day,
    Gtc,
    Ioc,
    Fok,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "DAY"),
            Self::Gtc => write!(f, "GTC"),
            Self::Ioc => write!(f, "IOC"),
            Self::Fok => write!(f, "FOK"),
        }
    }
}
