//! Severity levels controlling which entity kinds get redacted.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::EntityKind;

/// Redaction severity. Each level redacts everything the previous one does.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Level 0: nothing is redacted.
    Off,
    /// Level 20: card numbers and SSNs.
    Critical,
    /// Level 40: adds contact details and transactional identifiers.
    Standard,
    /// Level 60: adds person names.
    Elevated,
    /// Level 80: adds locations and dates.
    High,
    /// Level 100: every kind.
    #[default]
    Maximum,
}

const CRITICAL: &[EntityKind] = &[EntityKind::CreditCard, EntityKind::Ssn];

const STANDARD: &[EntityKind] = &[
    EntityKind::CreditCard,
    EntityKind::Ssn,
    EntityKind::Email,
    EntityKind::Phone,
    EntityKind::Pnr,
    EntityKind::TransactionId,
    EntityKind::InvoiceNumber,
    EntityKind::IpAddress,
];

const ELEVATED: &[EntityKind] = &[
    EntityKind::CreditCard,
    EntityKind::Ssn,
    EntityKind::Email,
    EntityKind::Phone,
    EntityKind::Pnr,
    EntityKind::TransactionId,
    EntityKind::InvoiceNumber,
    EntityKind::IpAddress,
    EntityKind::Person,
];

const HIGH: &[EntityKind] = &[
    EntityKind::CreditCard,
    EntityKind::Ssn,
    EntityKind::Email,
    EntityKind::Phone,
    EntityKind::Pnr,
    EntityKind::TransactionId,
    EntityKind::InvoiceNumber,
    EntityKind::IpAddress,
    EntityKind::Person,
    EntityKind::Location,
    EntityKind::Date,
];

impl Severity {
    /// Parse a numeric level (0, 20, 40, 60, 80, 100).
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Self::Off),
            20 => Ok(Self::Critical),
            40 => Ok(Self::Standard),
            60 => Ok(Self::Elevated),
            80 => Ok(Self::High),
            100 => Ok(Self::Maximum),
            other => Err(Error::Config(format!(
                "Unsupported severity level {} (expected 0, 20, 40, 60, 80 or 100)",
                other
            ))),
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Critical => 20,
            Self::Standard => 40,
            Self::Elevated => 60,
            Self::High => 80,
            Self::Maximum => 100,
        }
    }

    /// Entity kinds redacted at this level.
    pub fn kinds(&self) -> &'static [EntityKind] {
        match self {
            Self::Off => &[],
            Self::Critical => CRITICAL,
            Self::Standard => STANDARD,
            Self::Elevated => ELEVATED,
            Self::High => HIGH,
            Self::Maximum => EntityKind::all(),
        }
    }

    pub fn includes(&self, kind: EntityKind) -> bool {
        self.kinds().contains(&kind)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_cumulative() {
        let levels = [0u8, 20, 40, 60, 80, 100];
        for pair in levels.windows(2) {
            let lower = Severity::from_level(pair[0]).unwrap();
            let higher = Severity::from_level(pair[1]).unwrap();
            for kind in lower.kinds() {
                assert!(higher.includes(*kind), "{} missing {:?}", higher, kind);
            }
            assert!(higher.kinds().len() > lower.kinds().len());
        }
    }

    #[test]
    fn test_person_starts_at_sixty() {
        assert!(!Severity::Standard.includes(EntityKind::Person));
        assert!(Severity::Elevated.includes(EntityKind::Person));
        assert!(Severity::Off.kinds().is_empty());
    }

    #[test]
    fn test_default_is_maximum() {
        assert_eq!(Severity::default(), Severity::Maximum);
        assert_eq!(Severity::default().level(), 100);
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(Severity::from_level(50), Err(Error::Config(_))));
        assert_eq!(Severity::from_level(80).unwrap().level(), 80);
    }
}
