//! Postmortem record model.

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::{Mode, Pattern};
use crate::session::{CompletionStatus, Outcome, Phase};
use crate::types::errors::RehearseError;

/// Bug class tag. The recommended taxonomy plus a verbatim escape hatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum BugClass {
    OffByOne,
    WrongCondition,
    MissingEdgeCase,
    TypeError,
    /// Anything outside the taxonomy, kept as typed.
    Other(String),
}

impl BugClass {
    /// Recommended tags, in menu order.
    pub const RECOMMENDED: [&'static str; 5] = [
        "off-by-one",
        "wrong-condition",
        "missing-edge-case",
        "type-error",
        "other",
    ];

    /// Parses a tag. Known tags are matched loosely (`Off_By_One` works);
    /// anything else is kept verbatim. Blank input yields `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = trimmed.to_lowercase().replace(['_', ' '], "-");
        Some(match normalized.as_str() {
            "off-by-one" => BugClass::OffByOne,
            "wrong-condition" => BugClass::WrongCondition,
            "missing-edge-case" => BugClass::MissingEdgeCase,
            "type-error" => BugClass::TypeError,
            _ => BugClass::Other(trimmed.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            BugClass::OffByOne => "off-by-one",
            BugClass::WrongCondition => "wrong-condition",
            BugClass::MissingEdgeCase => "missing-edge-case",
            BugClass::TypeError => "type-error",
            BugClass::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for BugClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BugClass> for String {
    fn from(class: BugClass) -> Self {
        class.as_str().to_string()
    }
}

impl From<String> for BugClass {
    fn from(tag: String) -> Self {
        BugClass::parse(&tag).unwrap_or(BugClass::Other(tag))
    }
}

impl FromStr for BugClass {
    type Err = RehearseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BugClass::parse(s).ok_or_else(|| RehearseError::config("bug class must not be empty"))
    }
}

/// Accepted self-rated confidence values.
pub const SELF_CONFIDENCE: RangeInclusive<u8> = 1..=5;

/// Reflection answers collected when a session ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reflection {
    /// Required for timed-out sessions; completed sessions carry their own.
    pub outcome: Option<Outcome>,
    /// Pattern actually used, when it differs from the problem's tag.
    pub pattern_used: Option<Pattern>,
    pub bug_class: String,
    pub fix_rule: String,
    pub micro_drill: String,
    pub test_note: String,
    pub notes: String,
    /// How sure the practitioner felt, 1 (guessing) to 5 (could teach it).
    pub self_confidence: Option<u8>,
}

/// One recorded session. Field names are the history's stable format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postmortem {
    pub session_id: String,
    pub problem_id: String,
    pub mode: Mode,
    pub pattern: Pattern,
    pub outcome: Outcome,
    pub completion_status: CompletionStatus,
    #[serde(default)]
    pub bug_class: Option<BugClass>,
    #[serde(default)]
    pub fix_rule: String,
    #[serde(default)]
    pub micro_drill: String,
    #[serde(default)]
    pub test_note: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_confidence: Option<u8>,
    pub time_to_solution_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_phase: Option<Phase>,
    pub recorded_at: DateTime<Utc>,
    /// SHA-256 of the canonical JSON, set when appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Postmortem {
    pub fn time_to_solution(&self) -> Duration {
        Duration::from_secs(self.time_to_solution_secs)
    }

    pub fn is_pass(&self) -> bool {
        self.outcome.is_pass()
    }

    /// JSON of the record without its digest.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let unsigned = Postmortem {
            digest: None,
            ..self.clone()
        };
        serde_json::to_string(&unsigned)
    }

    /// Hex SHA-256 of [`Postmortem::canonical_json`].
    pub fn compute_digest(&self) -> Result<String, serde_json::Error> {
        let json = self.canonical_json()?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }

    /// Returns a copy carrying its digest.
    pub fn sealed(mut self) -> Result<Self, serde_json::Error> {
        self.digest = Some(self.compute_digest()?);
        Ok(self)
    }

    /// `true` if the stored digest matches the content.
    pub fn verify_digest(&self) -> bool {
        match (&self.digest, self.compute_digest()) {
            (Some(stored), Ok(actual)) => *stored == actual,
            _ => false,
        }
    }
}
