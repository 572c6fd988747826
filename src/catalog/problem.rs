//! Problem, pattern and mode types.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::errors::RehearseError;

/// Session track. Selects the problem pool and the prompt set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// General algorithmic practice.
    Core,
    /// Applied engineering track (ingestion, validation, web APIs, agents).
    Specialized,
}

impl Mode {
    /// All modes, in display order.
    pub const ALL: [Mode; 2] = [Mode::Core, Mode::Specialized];

    /// Patterns whose problems belong to this mode.
    pub fn patterns(&self) -> &'static [Pattern] {
        match self {
            Mode::Core => &[
                Pattern::Hashmap,
                Pattern::TwoPointers,
                Pattern::Sorting,
                Pattern::Heap,
                Pattern::BinarySearch,
                Pattern::Graph,
                Pattern::Plumbing,
            ],
            Mode::Specialized => &[
                Pattern::Ingestion,
                Pattern::SchemaValidation,
                Pattern::ApiRetry,
                Pattern::WebApi,
                Pattern::AgentLoop,
            ],
        }
    }

    /// Returns `true` if `pattern` is eligible in this mode.
    pub fn includes(&self, pattern: Pattern) -> bool {
        pattern.mode() == *self
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Core => write!(f, "core"),
            Mode::Specialized => write!(f, "specialized"),
        }
    }
}

impl FromStr for Mode {
    type Err = RehearseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "core" => Ok(Mode::Core),
            "specialized" => Ok(Mode::Specialized),
            other => Err(RehearseError::config(format!(
                "unknown mode '{}' (expected 'core' or 'specialized')",
                other
            ))),
        }
    }
}

/// Coding technique used to tag problems and postmortems.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Hashmap,
    TwoPointers,
    Sorting,
    Heap,
    BinarySearch,
    Graph,
    Plumbing,
    Ingestion,
    SchemaValidation,
    ApiRetry,
    WebApi,
    AgentLoop,
}

impl Pattern {
    /// Every known pattern, core first.
    pub const ALL: [Pattern; 12] = [
        Pattern::Hashmap,
        Pattern::TwoPointers,
        Pattern::Sorting,
        Pattern::Heap,
        Pattern::BinarySearch,
        Pattern::Graph,
        Pattern::Plumbing,
        Pattern::Ingestion,
        Pattern::SchemaValidation,
        Pattern::ApiRetry,
        Pattern::WebApi,
        Pattern::AgentLoop,
    ];

    /// The mode this pattern belongs to.
    pub fn mode(&self) -> Mode {
        match self {
            Pattern::Hashmap
            | Pattern::TwoPointers
            | Pattern::Sorting
            | Pattern::Heap
            | Pattern::BinarySearch
            | Pattern::Graph
            | Pattern::Plumbing => Mode::Core,
            Pattern::Ingestion
            | Pattern::SchemaValidation
            | Pattern::ApiRetry
            | Pattern::WebApi
            | Pattern::AgentLoop => Mode::Specialized,
        }
    }

    /// Snake-case tag, as stored in history.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Hashmap => "hashmap",
            Pattern::TwoPointers => "two_pointers",
            Pattern::Sorting => "sorting",
            Pattern::Heap => "heap",
            Pattern::BinarySearch => "binary_search",
            Pattern::Graph => "graph",
            Pattern::Plumbing => "plumbing",
            Pattern::Ingestion => "ingestion",
            Pattern::SchemaValidation => "schema_validation",
            Pattern::ApiRetry => "api_retry",
            Pattern::WebApi => "web_api",
            Pattern::AgentLoop => "agent_loop",
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = RehearseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Pattern::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| RehearseError::config(format!("unknown pattern '{}'", s.trim())))
    }
}

/// Problem difficulty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// One practice problem from the content bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Problem {
    /// Unique key, conventionally `<pattern>/<slug>`.
    pub id: String,
    pub pattern: Pattern,
    pub difficulty: Difficulty,
    pub title: String,
    /// Content directory relative to the bank root, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Problem {
    /// The mode this problem is eligible for.
    pub fn mode(&self) -> Mode {
        self.pattern.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("core".parse::<Mode>().unwrap(), Mode::Core);
        assert_eq!(" Specialized ".parse::<Mode>().unwrap(), Mode::Specialized);
        assert!(matches!(
            "weekend".parse::<Mode>(),
            Err(RehearseError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_pattern_from_str_accepts_dashes() {
        assert_eq!("binary-search".parse::<Pattern>().unwrap(), Pattern::BinarySearch);
        assert_eq!("two_pointers".parse::<Pattern>().unwrap(), Pattern::TwoPointers);
        assert!("dynamic_programming".parse::<Pattern>().is_err());
    }

    #[test]
    fn test_every_pattern_belongs_to_exactly_one_mode() {
        for pattern in Pattern::ALL {
            let owners: Vec<_> = Mode::ALL
                .iter()
                .filter(|m| m.patterns().contains(&pattern))
                .collect();
            assert_eq!(owners.len(), 1, "{} listed in {:?}", pattern, owners);
            assert!(owners[0].includes(pattern));
        }
    }

    #[test]
    fn test_pattern_serde_matches_display() {
        let json = serde_json::to_string(&Pattern::SchemaValidation).unwrap();
        assert_eq!(json, "\"schema_validation\"");
        assert_eq!(Pattern::SchemaValidation.to_string(), "schema_validation");
    }
}
