//! Strategy signals.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(value: &str) -> Option<Side> {
        match value.to_ascii_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy's recommendation for one evaluation. Consumed once by the execution
/// loop; it is not a broker command.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub action: Side,
    pub reference_price: f64,
    pub reason: String,
}

impl Signal {
    pub fn buy(reference_price: f64, reason: impl Into<String>) -> Self {
        Self {
            action: Side::Buy,
            reference_price,
            reason: reason.into(),
        }
    }

    pub fn sell(reference_price: f64, reason: impl Into<String>) -> Self {
        Self {
            action: Side::Sell,
            reference_price,
            reason: reason.into(),
        }
    }
}
