use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_UNDERLYING_LEN: usize = 12;

/// Normalized underlying asset code (`BTC`, `ETH`, `SOL_USDC`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Underlying(String);

impl Underlying {
    /// Parse and normalize an underlying code to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyUnderlying);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_UNDERLYING_LEN {
            return Err(ValidationError::UnderlyingTooLong {
                len,
                max: MAX_UNDERLYING_LEN,
            });
        }

        if let Some(first) = normalized.chars().next() {
            if !first.is_ascii_alphabetic() {
                return Err(ValidationError::UnderlyingInvalidStart { ch: first });
            }
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '_';
            if !valid {
                return Err(ValidationError::UnderlyingInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Currency code used for catalog queries (`SOL_USDC` lists under `USDC`).
    pub fn currency(&self) -> &str {
        match self.0.split_once('_') {
            Some((_, settlement)) => settlement,
            None => &self.0,
        }
    }
}

impl Display for Underlying {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Underlying {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Underlying {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Underlying> for String {
    fn from(value: Underlying) -> Self {
        value.0
    }
}
