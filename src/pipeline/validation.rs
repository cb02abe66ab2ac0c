//! Batch validation stage.
//!
//! Scans the relational store for bills missing expected sub-resources
//! and groups findings by category, separating expected historical gaps
//! from modern-record true gaps. The report doubles as the backfill
//! stage's worklist source.

use tracing::info;

use crate::constants::is_historical_congress;
use crate::storage::SharedDatabase;
use crate::types::{BillKey, Result};

/// Categories of missing enrichment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingCategory {
    Actions,
    Subjects,
    Cosponsors,
    TextVersions,
    Summary,
    PolicyAreaTag,
}

impl MissingCategory {
    pub const ALL: [MissingCategory; 6] = [
        Self::Actions,
        Self::Subjects,
        Self::Cosponsors,
        Self::TextVersions,
        Self::Summary,
        Self::PolicyAreaTag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actions => "actions",
            Self::Subjects => "subjects",
            Self::Cosponsors => "cosponsors",
            Self::TextVersions => "text_versions",
            Self::Summary => "summary",
            Self::PolicyAreaTag => "policy_area_tag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "actions" => Some(Self::Actions),
            "subjects" => Some(Self::Subjects),
            "cosponsors" => Some(Self::Cosponsors),
            "text_versions" => Some(Self::TextVersions),
            "summary" => Some(Self::Summary),
            "policy_area_tag" => Some(Self::PolicyAreaTag),
            _ => None,
        }
    }

    fn query(&self) -> &'static str {
        match self {
            Self::Actions => {
                "SELECT b.congress, b.bill_number FROM bills b
                 WHERE NOT EXISTS (SELECT 1 FROM bill_actions a
                     WHERE a.congress = b.congress AND a.bill_number = b.bill_number)
                 ORDER BY b.introduced_date DESC"
            }
            Self::Subjects => {
                "SELECT b.congress, b.bill_number FROM bills b
                 WHERE NOT EXISTS (SELECT 1 FROM bill_subjects s
                     WHERE s.congress = b.congress AND s.bill_number = b.bill_number)
                 ORDER BY b.introduced_date DESC"
            }
            // Only bills with a known sponsor are expected to carry cosponsors
            Self::Cosponsors => {
                "SELECT b.congress, b.bill_number FROM bills b
                 WHERE b.sponsor_id IS NOT NULL
                   AND NOT EXISTS (SELECT 1 FROM bill_cosponsors c
                     WHERE c.congress = b.congress AND c.bill_number = b.bill_number)
                 ORDER BY b.introduced_date DESC"
            }
            Self::TextVersions => {
                "SELECT congress, bill_number FROM bills
                 WHERE text_versions IS NULL OR text_versions = '[]'
                 ORDER BY introduced_date DESC"
            }
            Self::Summary => {
                "SELECT congress, bill_number FROM bills
                 WHERE summary IS NULL
                 ORDER BY introduced_date DESC"
            }
            Self::PolicyAreaTag => {
                "SELECT b.congress, b.bill_number FROM bills b
                 WHERE NOT EXISTS (
                     SELECT 1 FROM bill_tags bt
                     JOIN tags t ON t.id = bt.tag_id
                     JOIN tag_types tt ON tt.id = t.type_id
                     WHERE bt.bill_id = b.id AND tt.normalized_name = 'policy_area')
                 ORDER BY b.introduced_date DESC"
            }
        }
    }
}

impl std::fmt::Display for MissingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Findings for one category, historical gaps kept apart.
#[derive(Debug, Clone, Default)]
pub struct CategoryFindings {
    pub modern: Vec<BillKey>,
    pub historical: Vec<BillKey>,
}

impl CategoryFindings {
    pub fn total(&self) -> usize {
        self.modern.len() + self.historical.len()
    }
}

/// Full data-quality report.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub findings: Vec<(MissingCategory, CategoryFindings)>,
}

impl ValidationReport {
    pub fn category(&self, category: MissingCategory) -> Option<&CategoryFindings> {
        self.findings
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, f)| f)
    }

    /// True data-quality gaps: modern records only.
    pub fn modern_total(&self) -> usize {
        self.findings.iter().map(|(_, f)| f.modern.len()).sum()
    }
}

pub struct ValidationStage {
    db: SharedDatabase,
}

impl ValidationStage {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Run every category scan.
    pub fn validate(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        for category in MissingCategory::ALL {
            let findings = self.scan(category, None)?;
            info!(
                category = %category,
                modern = findings.modern.len(),
                historical = findings.historical.len(),
                "Validation scan"
            );
            report.findings.push((category, findings));
        }
        Ok(report)
    }

    /// Scan one category, optionally capped.
    pub fn scan(&self, category: MissingCategory, limit: Option<usize>) -> Result<CategoryFindings> {
        let conn = self.db.connection()?;
        let mut sql = category.query().to_string();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut findings = CategoryFindings::default();
        for (congress, bill_number) in rows {
            let key = BillKey::parse(congress, &bill_number)?;
            if is_historical_congress(congress) {
                findings.historical.push(key);
            } else {
                findings.modern.push(key);
            }
        }
        Ok(findings)
    }

    /// Worklist for the backfill stage: modern gaps first, then
    /// historical, capped at `limit`.
    pub fn worklist(&self, category: MissingCategory, limit: usize) -> Result<Vec<BillKey>> {
        let findings = self.scan(category, None)?;
        let mut keys = findings.modern;
        keys.extend(findings.historical);
        keys.truncate(limit);
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;

    fn seed_bill(db: &Database, congress: u16, bill_number: &str, with_summary: bool) {
        let conn = db.connection().unwrap();
        conn.execute(
            "INSERT INTO bills (congress, bill_number, bill_type, bill_title, sponsor_id, summary)
             VALUES (?1, ?2, 'HR', 'T', 'A000360', ?3)",
            rusqlite::params![congress, bill_number, with_summary.then_some("done")],
        )
        .unwrap();
    }

    #[test]
    fn test_missing_summary_scan() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        seed_bill(&db, 117, "HR1", false);
        seed_bill(&db, 117, "HR2", true);

        let stage = ValidationStage::new(db);
        let findings = stage.scan(MissingCategory::Summary, None).unwrap();
        assert_eq!(findings.modern.len(), 1);
        assert_eq!(findings.modern[0].bill_number(), "HR1");
    }

    #[test]
    fn test_historical_gaps_separated() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        seed_bill(&db, 12, "HR9", false);
        seed_bill(&db, 117, "HR1", false);

        let stage = ValidationStage::new(db);
        let findings = stage.scan(MissingCategory::Actions, None).unwrap();
        assert_eq!(findings.modern.len(), 1);
        assert_eq!(findings.historical.len(), 1);
        assert_eq!(findings.historical[0].congress(), 12);
    }

    #[test]
    fn test_full_report_covers_all_categories() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        seed_bill(&db, 117, "HR1", false);

        let report = ValidationStage::new(db).validate().unwrap();
        assert_eq!(report.findings.len(), MissingCategory::ALL.len());
        assert!(report.modern_total() >= 1);
        assert!(report.category(MissingCategory::Summary).is_some());
    }

    #[test]
    fn test_worklist_orders_modern_first() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        seed_bill(&db, 12, "HR9", false);
        seed_bill(&db, 117, "HR1", false);

        let stage = ValidationStage::new(db);
        let worklist = stage.worklist(MissingCategory::Subjects, 10).unwrap();
        assert_eq!(worklist.len(), 2);
        assert_eq!(worklist[0].congress(), 117);
    }

    #[test]
    fn test_category_round_trip() {
        for category in MissingCategory::ALL {
            assert_eq!(MissingCategory::parse(category.as_str()), Some(category));
        }
    }
}
