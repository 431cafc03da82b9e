//! Core data model shared by detectors, the merger, the vault and the engines.

use serde::{Deserialize, Serialize};

/// Category of detected PII.
///
/// Declaration order is the final tie-break when merging spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Email,
    Phone,
    Ssn,
    CreditCard,
    IpAddress,
    Url,
    Pnr,
    TransactionId,
    InvoiceNumber,
    Person,
    Location,
    Date,
    Organization,
}

impl EntityKind {
    pub fn all() -> &'static [EntityKind] {
        &[
            Self::Email,
            Self::Phone,
            Self::Ssn,
            Self::CreditCard,
            Self::IpAddress,
            Self::Url,
            Self::Pnr,
            Self::TransactionId,
            Self::InvoiceNumber,
            Self::Person,
            Self::Location,
            Self::Date,
            Self::Organization,
        ]
    }

    /// Stable uppercase label used inside tokens.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Email => "EMAIL",
            EntityKind::Phone => "PHONE",
            EntityKind::Ssn => "SSN",
            EntityKind::CreditCard => "CREDIT_CARD",
            EntityKind::IpAddress => "IP_ADDRESS",
            EntityKind::Url => "URL",
            EntityKind::Pnr => "PNR",
            EntityKind::TransactionId => "TRANSACTION_ID",
            EntityKind::InvoiceNumber => "INVOICE_NUMBER",
            EntityKind::Person => "PERSON",
            EntityKind::Location => "LOCATION",
            EntityKind::Date => "DATE",
            EntityKind::Organization => "ORGANIZATION",
        }
    }

    /// Map a free-form label (as returned by NER models and LLMs) to a kind.
    pub fn from_label(label: &str) -> Option<EntityKind> {
        let normalized = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let kind = match normalized.as_str() {
            "email" | "email_address" => EntityKind::Email,
            "phone" | "phone_number" | "telephone" => EntityKind::Phone,
            "ssn" | "social_security_number" => EntityKind::Ssn,
            "credit_card" | "credit_card_number" | "card_number" => EntityKind::CreditCard,
            "ip" | "ip_address" => EntityKind::IpAddress,
            "url" | "website" => EntityKind::Url,
            "pnr" | "booking_reference" => EntityKind::Pnr,
            "transaction_id" | "transaction" => EntityKind::TransactionId,
            "invoice_number" | "invoice" => EntityKind::InvoiceNumber,
            "person" | "person_name" | "name" | "per" => EntityKind::Person,
            "location" | "gpe" | "loc" | "address" | "street_address" => EntityKind::Location,
            "date" | "date_of_birth" | "dob" => EntityKind::Date,
            "organization" | "organisation" | "org" | "organization_name" => {
                EntityKind::Organization
            }
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which detector produced a candidate span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Pattern,
    Semantic,
}

impl DetectorKind {
    /// Lower value wins ties in the merger. Deterministic matches are ground truth.
    pub fn priority(&self) -> u8 {
        match self {
            DetectorKind::Pattern => 0,
            DetectorKind::Semantic => 1,
        }
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

/// A half-open `[start, end)` interval of character offsets naming a candidate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub label: EntityKind,
    pub confidence: f64,
    pub source: DetectorKind,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        label: EntityKind,
        confidence: f64,
        source: DetectorKind,
    ) -> Self {
        Self {
            start,
            end,
            label,
            confidence,
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether two half-open intervals share at least one offset.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// An accepted span together with the text it covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedEntity {
    pub span: Span,
    pub value: String,
}

/// Text with every merged entity replaced by its token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedDocument {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "redactedText")]
    pub text: String,
}
