use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Sequencing policy for dropping fallbacks across sibling items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealOrder {
    /// Nothing shows until every item is settled, then everything at once.
    Together,
    /// An item shows once it and every item before it are settled.
    #[default]
    Forwards,
    /// An item shows once it and every item after it are settled.
    Backwards,
}

impl fmt::Display for RevealOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevealOrder::Together => write!(f, "together"),
            RevealOrder::Forwards => write!(f, "forwards"),
            RevealOrder::Backwards => write!(f, "backwards"),
        }
    }
}

impl FromStr for RevealOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "together" => Ok(RevealOrder::Together),
            "forwards" => Ok(RevealOrder::Forwards),
            "backwards" => Ok(RevealOrder::Backwards),
            other => Err(ConfigError::InvalidRevealOrder(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for order in [RevealOrder::Together, RevealOrder::Forwards, RevealOrder::Backwards] {
            assert_eq!(order.to_string().parse::<RevealOrder>().unwrap(), order);
        }
        assert_eq!(" BACKWARDS ".parse::<RevealOrder>().unwrap(), RevealOrder::Backwards);
        assert!("in-order".parse::<RevealOrder>().is_err());
    }
}
