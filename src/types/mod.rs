pub mod bill;
pub mod committee;
pub mod error;
pub mod member;
pub mod payload;
pub mod tags;

pub use bill::{
    Action, Bill, BillStatus, Cosponsor, TextFormat, TextVersion, parse_bill_number,
};
pub use committee::Committee;
pub use error::{ErrorCategory, Result, ResultExt, SyncError};
pub use member::{Chamber, Member};
pub use payload::{DetailPayload, SelectionPolicy};
pub use tags::{TagRecord, normalize_tag_name};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Natural key of a legislative item: (congress, type, number).
///
/// The type component is canonicalized to uppercase on construction so
/// `hr123` and `HR123` always resolve to the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BillKey {
    congress: u16,
    bill_type: String,
    number: String,
}

impl BillKey {
    pub fn new(congress: u16, bill_type: impl AsRef<str>, number: impl AsRef<str>) -> Self {
        Self {
            congress,
            bill_type: bill_type.as_ref().to_uppercase(),
            number: number.as_ref().to_string(),
        }
    }

    /// Parse a combined bill number like `HR1234` or `sjres33`.
    pub fn parse(congress: u16, combined: &str) -> Result<Self> {
        let (bill_type, number) = parse_bill_number(combined)?;
        Ok(Self::new(congress, bill_type, number))
    }

    pub fn congress(&self) -> u16 {
        self.congress
    }

    pub fn bill_type(&self) -> &str {
        &self.bill_type
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    /// Combined `TYPE||NUMBER` form stored as the `bill_number` column.
    pub fn bill_number(&self) -> String {
        format!("{}{}", self.bill_type, self.number)
    }

    /// Lowercase type as the upstream API expects in URL paths.
    pub fn path_type(&self) -> String {
        self.bill_type.to_lowercase()
    }
}

impl fmt::Display for BillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.congress, self.bill_type, self.number)
    }
}

#[cfg(test)]
mod newtype_tests {
    use super::*;

    #[test]
    fn test_bill_key_canonical_case() {
        let lower = BillKey::parse(117, "hr123").unwrap();
        let upper = BillKey::parse(117, "HR123").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.bill_number(), "HR123");
        assert_eq!(lower.path_type(), "hr");
    }

    #[test]
    fn test_bill_key_display() {
        let key = BillKey::new(117, "sjres", "33");
        assert_eq!(key.to_string(), "117/SJRES33");
    }

}
