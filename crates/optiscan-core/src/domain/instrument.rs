use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::{Underlying, ValidationError};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }

    pub const fn suffix(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

impl Display for OptionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(Self::Call),
            "put" | "p" => Ok(Self::Put),
            _ => Err(ValidationError::InvalidInstrumentName {
                value: value.to_owned(),
                reason: "option type must be call or put",
            }),
        }
    }
}

/// One option contract: underlying, expiry date, strike and type.
///
/// Ordering follows the field order, so a sorted catalog groups by underlying,
/// then expiry, then strike, with the call before the put at each strike.
/// Serialized as the venue instrument name, e.g. `BTC-27DEC24-60000-C`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId {
    underlying: Underlying,
    expiry: Date,
    strike: Decimal,
    kind: OptionKind,
}

impl InstrumentId {
    pub fn new(
        underlying: Underlying,
        expiry: Date,
        strike: Decimal,
        kind: OptionKind,
    ) -> Result<Self, ValidationError> {
        if strike <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveStrike);
        }

        Ok(Self {
            underlying,
            expiry,
            strike: strike.normalize(),
            kind,
        })
    }

    /// Parse a venue instrument name (`UNDERLYING-DDMMMYY-STRIKE-C|P`).
    ///
    /// Fractional strikes use `d` as the decimal mark (`XRP_USDC-7MAR25-2d5-P`).
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        let invalid = |reason| ValidationError::InvalidInstrumentName {
            value: name.to_owned(),
            reason,
        };

        let parts = name.trim().split('-').collect::<Vec<_>>();
        let [underlying, expiry, strike, kind] = parts.as_slice() else {
            return Err(invalid("expected four '-' separated parts"));
        };

        let underlying = Underlying::parse(underlying)?;
        let expiry = parse_expiry(expiry).ok_or_else(|| invalid("expiry must look like 27DEC24"))?;
        let strike = Decimal::from_str(&strike.replace('d', "."))
            .map_err(|_| invalid("strike is not a number"))?;
        let kind = match *kind {
            "C" | "c" => OptionKind::Call,
            "P" | "p" => OptionKind::Put,
            _ => return Err(invalid("option type suffix must be C or P")),
        };

        Self::new(underlying, expiry, strike, kind)
    }

    pub fn underlying(&self) -> &Underlying {
        &self.underlying
    }

    pub const fn expiry(&self) -> Date {
        self.expiry
    }

    pub const fn strike(&self) -> Decimal {
        self.strike
    }

    pub const fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn name(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.underlying,
            format_expiry(self.expiry),
            self.strike.to_string().replace('.', "d"),
            self.kind.suffix()
        )
    }
}

impl Display for InstrumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for InstrumentId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InstrumentId> for String {
    fn from(value: InstrumentId) -> Self {
        value.name()
    }
}

const MONTHS: [(&str, Month); 12] = [
    ("JAN", Month::January),
    ("FEB", Month::February),
    ("MAR", Month::March),
    ("APR", Month::April),
    ("MAY", Month::May),
    ("JUN", Month::June),
    ("JUL", Month::July),
    ("AUG", Month::August),
    ("SEP", Month::September),
    ("OCT", Month::October),
    ("NOV", Month::November),
    ("DEC", Month::December),
];

fn parse_expiry(raw: &str) -> Option<Date> {
    let raw = raw.to_ascii_uppercase();
    let digits = raw.chars().take_while(char::is_ascii_digit).count();
    if !raw.is_ascii() || !(1..=2).contains(&digits) || raw.len() != digits + 5 {
        return None;
    }

    let day = raw[..digits].parse::<u8>().ok()?;
    let month = MONTHS
        .iter()
        .find(|(code, _)| *code == &raw[digits..digits + 3])
        .map(|(_, month)| *month)?;
    let year = raw[digits + 3..].parse::<i32>().ok()?;

    Date::from_calendar_date(2000 + year, month, day).ok()
}

fn format_expiry(date: Date) -> String {
    let month = MONTHS
        .iter()
        .find(|(_, month)| *month == date.month())
        .map(|(code, _)| *code)
        .unwrap_or("???");
    format!("{}{}{:02}", date.day(), month, date.year() % 100)
}
