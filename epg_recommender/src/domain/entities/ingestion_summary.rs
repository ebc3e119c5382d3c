use serde::Serialize;

/// Outcome of a bulk ingestion.
///
/// Every record of the request is either accepted, rejected (invalid record) or failed
/// (its batch could not be embedded or stored), and each rejected or failed record is listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub rejected_items: Vec<IngestionIssue>,
    pub failed_items: Vec<IngestionIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionIssue {
    /// Position of the record in the request
    pub position: usize,
    pub content_id: Option<String>,
    pub reason: String,
}

impl IngestionSummary {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected + self.failed
    }

    pub fn add_rejected(&mut self, position: usize, content_id: Option<&str>, reason: String) {
        self.rejected += 1;
        self.rejected_items.push(IngestionIssue {
            position,
            content_id: content_id.map(str::to_string),
            reason,
        });
    }

    pub fn add_failed(&mut self, position: usize, content_id: &str, reason: String) {
        self.failed += 1;
        self.failed_items.push(IngestionIssue {
            position,
            content_id: Some(content_id.to_string()),
            reason,
        });
    }
}
