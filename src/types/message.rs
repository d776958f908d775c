//! Message-level types: inbound payloads, the canonical message record,
//! the per-message analysis summary and processing outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::atom::{Atom, AttributionMethod};

/// Inbound message as delivered by the ingestion workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Provider message id; the idempotency key.
    pub message_id: String,
    /// Provider thread id.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Raw message headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Plain-text body.
    #[serde(default)]
    pub body: Option<String>,
    /// HTML body.
    #[serde(default)]
    pub html_body: Option<String>,
    /// Sender, used when no `From` header is present.
    #[serde(default)]
    pub from: Option<String>,
    /// Subject, used when no `Subject` header is present.
    #[serde(default)]
    pub subject: Option<String>,
    /// Delivery timestamp, used when no `Date` header is present.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl MessagePayload {
    /// Create a payload with only an id.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            ..Self::default()
        }
    }

    /// Set the HTML body.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }

    /// Set the plain-text body.
    pub fn with_plain(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sender: the `From` header, falling back to `from`.
    pub fn sender(&self) -> Option<&str> {
        self.header("From")
            .or(self.from.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Mailbox addresses from the `From`, `To` and `Cc` headers.
    pub fn participants(&self) -> Vec<String> {
        ["From", "To", "Cc"]
            .iter()
            .filter_map(|name| self.header(name))
            .flat_map(|value| value.split(','))
            .map(mailbox_address)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// HTML body, empty when absent.
    pub fn html(&self) -> &str {
        self.html_body.as_deref().unwrap_or("")
    }

    /// Plain body, empty when absent.
    pub fn plain(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    /// Canonical record written by the idempotency gate.
    pub fn to_record(&self, engagement_id: &str) -> MessageRecord {
        MessageRecord {
            message_id: self.message_id.clone(),
            engagement_id: engagement_id.to_string(),
            thread_id: self.thread_id.clone(),
            from_address: self.sender().map(str::to_string),
            to_address: self.header("To").map(str::to_string),
            subject: self
                .header("Subject")
                .map(str::to_string)
                .or_else(|| self.subject.clone()),
            body_plain: self.plain().to_string(),
            body_html: self.html().to_string(),
            sent_date: self
                .header("Date")
                .map(str::to_string)
                .or_else(|| self.timestamp.clone()),
            headers: self.headers.clone(),
        }
    }
}

/// Address part of a mailbox: `Name <a@b.c>` gives `a@b.c`.
pub fn mailbox_address(mailbox: &str) -> &str {
    let mailbox = mailbox.trim();
    match (mailbox.rfind('<'), mailbox.rfind('>')) {
        (Some(open), Some(close)) if open < close => mailbox[open + 1..close].trim(),
        _ => mailbox,
    }
}

/// Canonical message record in the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Message id (unique).
    pub message_id: String,
    /// Engagement the message belongs to.
    pub engagement_id: String,
    /// Thread id.
    pub thread_id: Option<String>,
    /// Sender address.
    pub from_address: Option<String>,
    /// Recipient address.
    pub to_address: Option<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Plain-text body.
    pub body_plain: String,
    /// HTML body.
    pub body_html: String,
    /// Date header, verbatim.
    pub sent_date: Option<String>,
    /// All headers.
    pub headers: BTreeMap<String, String>,
}

/// Per-message attribution summary, stored as the terminal pipeline step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Message id.
    pub message_id: String,
    /// Atom count per attributed author (`"unknown"` when unattributed).
    pub attribution_stats: BTreeMap<String, usize>,
    /// Atom count per attribution method.
    pub method_stats: BTreeMap<String, usize>,
    /// Total atoms.
    pub atom_count: usize,
    /// Atoms carrying at least one label.
    pub labeled_count: usize,
    /// Policy that produced the attribution.
    pub policy_id: String,
    /// Parameter hash of that policy.
    pub policy_hash: String,
}

impl AnalysisSummary {
    /// Summarize attributed atoms.
    pub fn from_atoms(
        message_id: impl Into<String>,
        atoms: &[Atom],
        policy_id: impl Into<String>,
        policy_hash: impl Into<String>,
    ) -> Self {
        let mut attribution_stats = BTreeMap::new();
        let mut method_stats = BTreeMap::new();
        let mut labeled_count = 0;

        for atom in atoms {
            let author = atom.attributed_to().unwrap_or("unknown").to_string();
            *attribution_stats.entry(author).or_insert(0) += 1;
            let method = atom
                .attribution_method()
                .as_ref()
                .map(AttributionMethod::as_str)
                .unwrap_or("UNATTRIBUTED");
            *method_stats.entry(method.to_string()).or_insert(0) += 1;
            if atom.labels().map(|l| !l.is_empty()).unwrap_or(false) {
                labeled_count += 1;
            }
        }

        Self {
            message_id: message_id.into(),
            attribution_stats,
            method_stats,
            atom_count: atoms.len(),
            labeled_count,
            policy_id: policy_id.into(),
            policy_hash: policy_hash.into(),
        }
    }
}

/// Terminal status of one message-processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Atoms persisted and analysis stored.
    Success,
    /// Message already recorded; nothing was done.
    Skipped,
    /// Processing failed; see the outcome reason.
    Error,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Skipped => write!(f, "skipped"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Result of `Pipeline::process_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    /// Message id.
    pub message_id: String,
    /// Terminal status.
    pub status: ProcessStatus,
    /// Atoms produced (0 when skipped).
    pub atoms: usize,
    /// Why the message was skipped or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProcessOutcome {
    /// Successful outcome.
    pub fn success(message_id: impl Into<String>, atoms: usize) -> Self {
        Self {
            message_id: message_id.into(),
            status: ProcessStatus::Success,
            atoms,
            reason: None,
        }
    }

    /// Duplicate message.
    pub fn skipped(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            status: ProcessStatus::Skipped,
            atoms: 0,
            reason: Some("duplicate".to_string()),
        }
    }

    /// Failed message.
    pub fn error(message_id: impl Into<String>, atoms: usize, reason: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            status: ProcessStatus::Error,
            atoms,
            reason: Some(reason.into()),
        }
    }
}

/// Result of `Pipeline::process_batch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Messages processed successfully.
    pub processed: usize,
    /// Duplicates skipped.
    pub skipped: usize,
    /// Messages that ended in error.
    pub failed: usize,
    /// Per-message outcomes, in input order.
    pub outcomes: Vec<ProcessOutcome>,
}

impl BatchReport {
    /// Tally outcomes (kept in the given order).
    pub fn from_outcomes(outcomes: Vec<ProcessOutcome>) -> Self {
        let count = |status: ProcessStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            processed: count(ProcessStatus::Success),
            skipped: count(ProcessStatus::Skipped),
            failed: count(ProcessStatus::Error),
            outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VisualStyle;

    #[test]
    fn test_participants_extract_addresses() {
        let payload = MessagePayload::new("m")
            .with_header("From", "Me <me@x.com>")
            .with_header("To", "Victim <victim@y.com>, other@z.com")
            .with_header("cc", "  ");
        assert_eq!(
            payload.participants(),
            vec!["me@x.com", "victim@y.com", "other@z.com"]
        );
        assert_eq!(mailbox_address("plain@x.com"), "plain@x.com");
    }

    #[test]
    fn test_sender_prefers_from_header() {
        let mut payload = MessagePayload::new("m1").with_header("from", "hdr@x.com");
        payload.from = Some("field@x.com".to_string());
        assert_eq!(payload.sender(), Some("hdr@x.com"));

        payload.headers.clear();
        assert_eq!(payload.sender(), Some("field@x.com"));

        payload.from = Some("   ".to_string());
        assert_eq!(payload.sender(), None);
    }

    #[test]
    fn test_payload_camel_case() {
        let payload: MessagePayload = serde_json::from_str(
            r#"{"messageId":"m1","threadId":"t1","htmlBody":"<p>Hi.</p>","headers":{"From":"a@x.com"}}"#,
        )
        .unwrap();
        assert_eq!(payload.message_id, "m1");
        assert_eq!(payload.thread_id.as_deref(), Some("t1"));
        assert_eq!(payload.html(), "<p>Hi.</p>");
        assert_eq!(payload.plain(), "");
    }

    #[test]
    fn test_to_record_maps_headers() {
        let payload = MessagePayload::new("m1")
            .with_header("From", "a@x.com")
            .with_header("To", "b@x.com")
            .with_header("Subject", "Permit")
            .with_header("Date", "Mon, 1 Jan 2024 10:00:00 +0000")
            .with_plain("Hello.");
        let record = payload.to_record("eng-1");
        assert_eq!(record.engagement_id, "eng-1");
        assert_eq!(record.from_address.as_deref(), Some("a@x.com"));
        assert_eq!(record.to_address.as_deref(), Some("b@x.com"));
        assert_eq!(record.subject.as_deref(), Some("Permit"));
        assert_eq!(record.body_plain, "Hello.");
        assert!(record.sent_date.is_some());
    }

    #[test]
    fn test_summary_counts() {
        let mut a = Atom::new("m", 0, "Hi.", 0, VisualStyle::default());
        a.attribute("s@x.com", AttributionMethod::HeaderDepth0);
        let mut b = Atom::new("m", 1, "Yes.", 1, VisualStyle::bold());
        b.attribute("s@x.com", AttributionMethod::StyleInferenceInterjection);
        b.append_labels(["admission"]);
        let c = Atom::new("m", 2, "No.", 1, VisualStyle::default());

        let summary = AnalysisSummary::from_atoms("m", &[a, b, c], "p", "h");
        assert_eq!(summary.atom_count, 3);
        assert_eq!(summary.labeled_count, 1);
        assert_eq!(summary.attribution_stats["s@x.com"], 2);
        assert_eq!(summary.attribution_stats["unknown"], 1);
        assert_eq!(summary.method_stats["HEADER_DEPTH_0"], 1);
    }

    #[test]
    fn test_batch_report_tally() {
        let report = BatchReport::from_outcomes(vec![
            ProcessOutcome::success("a", 3),
            ProcessOutcome::skipped("b"),
            ProcessOutcome::error("c", 0, "boom"),
            ProcessOutcome::success("d", 1),
        ]);
        assert_eq!((report.processed, report.skipped, report.failed), (2, 1, 1));
        assert_eq!(report.outcomes[2].message_id, "c");
    }
}
