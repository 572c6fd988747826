//! Configuration for rehearse.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::Mode;
use crate::types::errors::RehearseError;
use crate::RehearseResult;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "rehearse.toml";

/// Main configuration for rehearse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Session timer settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Problem selection settings.
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Progress scoring settings.
    #[serde(default)]
    pub progress: ProgressConfig,

    /// History store settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Problem catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Session timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Move to the next phase automatically once its target elapses.
    #[serde(default = "default_true")]
    pub auto_advance: bool,

    /// Ring the terminal bell on phase changes and timeout.
    #[serde(default = "default_true")]
    pub bell: bool,

    /// Polling interval of the session loop (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Phase plan for core sessions. Keys left out keep the core defaults.
    #[serde(default = "ModePlanConfig::core", deserialize_with = "core_plan")]
    pub core: ModePlanConfig,

    /// Phase plan for specialized sessions. Keys left out keep the
    /// specialized defaults.
    #[serde(
        default = "ModePlanConfig::specialized",
        deserialize_with = "specialized_plan"
    )]
    pub specialized: ModePlanConfig,
}

impl SessionConfig {
    /// The phase plan for `mode`.
    pub fn plan_for(&self, mode: Mode) -> &ModePlanConfig {
        match mode {
            Mode::Core => &self.core,
            Mode::Specialized => &self.specialized,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_advance: true,
            bell: true,
            tick_interval_ms: default_tick_interval(),
            core: ModePlanConfig::core(),
            specialized: ModePlanConfig::specialized(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    250
}

fn core_plan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModePlanConfig, D::Error> {
    overlay_plan(deserializer, ModePlanConfig::core())
}

fn specialized_plan<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<ModePlanConfig, D::Error> {
    overlay_plan(deserializer, ModePlanConfig::specialized())
}

/// Reads a possibly partial plan table on top of `base`.
fn overlay_plan<'de, D: Deserializer<'de>>(
    deserializer: D,
    base: ModePlanConfig,
) -> Result<ModePlanConfig, D::Error> {
    let partial = toml::Value::deserialize(deserializer)?;
    let mut merged = toml::Value::try_from(&base).map_err(D::Error::custom)?;
    merge_tables(&mut merged, partial);
    merged.try_into().map_err(D::Error::custom)
}

fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Timing and prompts for one mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModePlanConfig {
    /// Hard limit for the whole session (minutes).
    pub overall_limit_mins: u64,

    /// Target duration of each phase (minutes).
    pub targets: PhaseTargets,

    /// Prompt shown when entering each phase.
    pub prompts: PhasePrompts,
}

impl ModePlanConfig {
    /// Defaults for the core track.
    pub fn core() -> Self {
        Self {
            overall_limit_mins: 35,
            targets: PhaseTargets {
                restate_problem: 2,
                write_tests: 2,
                baseline_prompt: 0,
                implement: 13,
                invariant_prompt: 0,
                edge_cases: 5,
            },
            prompts: PhasePrompts {
                restate_problem: "Restate the problem in your own words. Which pattern fits?".into(),
                write_tests: "Write 2-3 test cases before any implementation.".into(),
                baseline_prompt: "Freeze. Implement the simplest correct solution first.".into(),
                implement: "Build the baseline. Talk through each step out loud.".into(),
                invariant_prompt: "Re-anchor: what must be true after each step? State your invariant."
                    .into(),
                edge_cases: "Edge cases: empty input, single element, duplicates, bounds. Then clean up."
                    .into(),
                done: "Time to run your tests and record the postmortem.".into(),
            },
        }
    }

    /// Defaults for the specialized track.
    pub fn specialized() -> Self {
        Self {
            overall_limit_mins: 45,
            targets: PhaseTargets {
                restate_problem: 3,
                write_tests: 4,
                baseline_prompt: 0,
                implement: 25,
                invariant_prompt: 0,
                edge_cases: 8,
            },
            prompts: PhasePrompts {
                restate_problem: "Restate the contract: inputs, outputs and failure modes.".into(),
                write_tests: "Write tests for the happy path and one failure (bad record, timeout, 4xx)."
                    .into(),
                baseline_prompt: "Freeze. Get one record flowing end to end before adding robustness."
                    .into(),
                implement: "Build it out: validation, retries, error mapping.".into(),
                invariant_prompt:
                    "Re-anchor: which guarantees must each stage keep (ordering, idempotency, no loss)?"
                        .into(),
                edge_cases: "Edge cases: empty batch, malformed input, partial failure, retry limits."
                    .into(),
                done: "Time to run your checks and record the postmortem.".into(),
            },
        }
    }
}

/// Target minutes per timed phase. Prompt phases default to zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseTargets {
    pub restate_problem: u64,
    pub write_tests: u64,
    pub baseline_prompt: u64,
    pub implement: u64,
    pub invariant_prompt: u64,
    pub edge_cases: u64,
}

impl PhaseTargets {
    /// Sum of all targets (minutes).
    pub fn total(&self) -> u64 {
        self.restate_problem
            + self.write_tests
            + self.baseline_prompt
            + self.implement
            + self.invariant_prompt
            + self.edge_cases
    }
}

/// Prompt text per phase, including the terminal one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhasePrompts {
    pub restate_problem: String,
    pub write_tests: String,
    pub baseline_prompt: String,
    pub implement: String,
    pub invariant_prompt: String,
    pub edge_cases: String,
    pub done: String,
}

/// Problem selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Number of most recent distinct problems to avoid.
    #[serde(default = "default_exclude_recent")]
    pub exclude_recent: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            exclude_recent: default_exclude_recent(),
        }
    }
}

fn default_exclude_recent() -> usize {
    2
}

/// Confidence scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Geometric weight decay per step of age (0 < decay <= 1).
    #[serde(default = "default_decay")]
    pub decay: f64,

    /// Attempts needed before confidence may reach the reliable threshold.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Confidence at or above which a pattern is considered reliable.
    #[serde(default = "default_reliable_threshold")]
    pub reliable_threshold: f64,

    /// Confidence at or above which a reliable pattern counts as mastered.
    #[serde(default = "default_mastery_threshold")]
    pub mastery_threshold: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            decay: default_decay(),
            min_samples: default_min_samples(),
            reliable_threshold: default_reliable_threshold(),
            mastery_threshold: default_mastery_threshold(),
        }
    }
}

fn default_decay() -> f64 {
    0.8
}

fn default_min_samples() -> usize {
    3
}

fn default_reliable_threshold() -> f64 {
    0.7
}

fn default_mastery_threshold() -> f64 {
    0.85
}

/// History store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How long an append waits for another writer (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".rehearse/history.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Problem catalog settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog TOML file. The bundled catalog is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> RehearseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> RehearseResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            session: SessionConfig::default(),
            selector: SelectorConfig::default(),
            progress: ProgressConfig::default(),
            history: HistoryConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }

    /// The user-wide configuration file, if the platform has a config dir.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rehearse").join(CONFIG_FILE))
    }

    /// Tries the current directory, then the user config dir, then defaults.
    pub fn load_or_default() -> RehearseResult<Self> {
        let candidates =
            std::iter::once(PathBuf::from(CONFIG_FILE)).chain(Self::user_config_path());
        Self::load_first(candidates)
    }

    /// Loads the first of `candidates` that exists. A file that exists but
    /// does not parse is an error; defaults apply only when none exists.
    pub fn load_first<I>(candidates: I) -> RehearseResult<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in candidates {
            if path.is_file() {
                return Self::load(&path).map_err(|e| {
                    RehearseError::config(format!("{}: {}", path.display(), e))
                });
            }
        }
        Ok(Self::default_config())
    }

    /// Problems that make the configuration unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for mode in Mode::ALL {
            let plan = self.session.plan_for(mode);
            if plan.overall_limit_mins == 0 {
                issues.push(format!("session.{}.overall_limit_mins must be > 0", mode));
            }
            if plan.targets.total() > plan.overall_limit_mins {
                issues.push(format!(
                    "session.{}: phase targets sum to {} min, over the {} min limit",
                    mode,
                    plan.targets.total(),
                    plan.overall_limit_mins
                ));
            }
        }

        if self.session.tick_interval_ms == 0 {
            issues.push("session.tick_interval_ms must be > 0".to_string());
        }
        if !(self.progress.decay > 0.0 && self.progress.decay <= 1.0) {
            issues.push("progress.decay must be in (0, 1]".to_string());
        }
        if self.progress.min_samples == 0 {
            issues.push("progress.min_samples must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.progress.reliable_threshold) {
            issues.push("progress.reliable_threshold must be in [0, 1]".to_string());
        }
        if self.progress.mastery_threshold < self.progress.reliable_threshold
            || self.progress.mastery_threshold > 1.0
        {
            issues.push(
                "progress.mastery_threshold must be between reliable_threshold and 1".to_string(),
            );
        }

        issues
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
