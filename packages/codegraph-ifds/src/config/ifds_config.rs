//! Analysis configuration types
//!
//! `IfdsConfig` is consumed by analyzer factories and the unit manager; the
//! solver core only sees the values derived from it (runner options, path
//! length bounds).

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use crate::features::ifds::infrastructure::{BidiMode, WorklistOrder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Deadline used when `timeout_seconds` is 0
pub const UNLIMITED_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default taint mark for source rules without an explicit mark
pub const DEFAULT_TAINT_MARK: &str = "TAINT";

fn default_mark() -> String {
    DEFAULT_TAINT_MARK.to_string()
}

fn default_sink_rule() -> String {
    DEFAULT_TAINT_MARK.to_string()
}

// ============================================================================
// Taint Rules
// ============================================================================

/// Marks results of calls whose callee name matches `pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRuleConfig {
    pub pattern: String,
    #[serde(default = "default_mark")]
    pub mark: String,
}

/// Removes taint from the arguments of matching calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizerRuleConfig {
    pub pattern: String,
    /// `None` sanitizes every mark
    #[serde(default)]
    pub mark: Option<String>,
}

/// Reports tainted arguments reaching matching calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkRuleConfig {
    pub pattern: String,
    #[serde(default = "default_sink_rule")]
    pub rule: String,
    /// `None` accepts every mark except `NULLNESS`
    #[serde(default)]
    pub mark: Option<String>,
}

/// Method-name matchers for the taint analyzers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaintRulesConfig {
    pub sources: Vec<SourceRuleConfig>,
    pub sanitizers: Vec<SanitizerRuleConfig>,
    pub sinks: Vec<SinkRuleConfig>,
}

impl TaintRulesConfig {
    /// Check that every pattern compiles
    pub fn validate(&self) -> ConfigResult<()> {
        let patterns = self
            .sources
            .iter()
            .map(|r| ("taint.sources", r.pattern.as_str()))
            .chain(self.sanitizers.iter().map(|r| ("taint.sanitizers", r.pattern.as_str())))
            .chain(self.sinks.iter().map(|r| ("taint.sinks", r.pattern.as_str())));

        for (field, pattern) in patterns {
            if let Err(err) = regex::Regex::new(pattern) {
                return Err(ConfigError::invalid_pattern(field, pattern, &err));
            }
        }
        Ok(())
    }

    /// Builder: Add a source rule
    pub fn source(mut self, pattern: impl Into<String>, mark: impl Into<String>) -> Self {
        self.sources.push(SourceRuleConfig {
            pattern: pattern.into(),
            mark: mark.into(),
        });
        self
    }

    /// Builder: Add a sanitizer rule for every mark
    pub fn sanitizer(mut self, pattern: impl Into<String>) -> Self {
        self.sanitizers.push(SanitizerRuleConfig {
            pattern: pattern.into(),
            mark: None,
        });
        self
    }

    /// Builder: Add a sink rule for every mark
    pub fn sink(mut self, pattern: impl Into<String>, rule: impl Into<String>) -> Self {
        self.sinks.push(SinkRuleConfig {
            pattern: pattern.into(),
            rule: rule.into(),
            mark: None,
        });
        self
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// IFDS engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IfdsConfig {
    /// Maximum tracked access path length in fields (1..=64)
    pub max_path_length: usize,

    /// Whole-run deadline in seconds (0..=3600, 0 = unlimited)
    pub timeout_seconds: u64,

    /// Forward/backward runner composition
    pub bidi_mode: BidiMode,

    /// Worklist discipline of every runner
    pub worklist_order: WorklistOrder,

    /// Runner yields to the scheduler every N iterations (1..=1_000_000)
    pub yield_every: usize,

    /// Progress log period in milliseconds (>= 10)
    pub progress_interval_ms: u64,

    /// Time runners get to flush after the deadline (0..=60000)
    pub shutdown_grace_ms: u64,

    /// Source / sanitizer / sink matchers
    pub taint: TaintRulesConfig,
}

impl IfdsConfig {
    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_path_length == 0 || self.max_path_length > 64 {
            return Err(ConfigError::range_with_hint(
                "max_path_length",
                self.max_path_length,
                1,
                64,
                "Access paths are truncated to this many fields",
            ));
        }

        if self.timeout_seconds > 3600 {
            return Err(ConfigError::range_with_hint(
                "timeout_seconds",
                self.timeout_seconds,
                0,
                3600,
                "Analysis timeout should be at most 1 hour (3600 seconds)",
            ));
        }

        if self.yield_every == 0 || self.yield_every > 1_000_000 {
            return Err(ConfigError::range_with_hint(
                "yield_every",
                self.yield_every,
                1,
                1_000_000,
                "Runners must yield periodically",
            ));
        }

        if self.progress_interval_ms < 10 {
            return Err(ConfigError::range_with_hint(
                "progress_interval_ms",
                self.progress_interval_ms,
                10,
                u64::MAX,
                "Progress logging faster than 10ms floods the log",
            ));
        }

        if self.shutdown_grace_ms > 60_000 {
            return Err(ConfigError::range_with_hint(
                "shutdown_grace_ms",
                self.shutdown_grace_ms,
                0,
                60_000,
                "Stragglers are aborted after the grace period",
            ));
        }

        self.taint.validate()
    }

    /// Create config from preset
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                max_path_length: 3,
                timeout_seconds: 10,
                bidi_mode: BidiMode::Disabled,
                worklist_order: WorklistOrder::Fifo,
                yield_every: 4096,
                progress_interval_ms: 1000,
                shutdown_grace_ms: 500,
                taint: TaintRulesConfig::default(),
            },
            Preset::Balanced | Preset::Custom => Self {
                max_path_length: 5,
                timeout_seconds: 60,
                bidi_mode: BidiMode::Parallel,
                worklist_order: WorklistOrder::Fifo,
                yield_every: 1024,
                progress_interval_ms: 1000,
                shutdown_grace_ms: 2000,
                taint: TaintRulesConfig::default(),
            },
            Preset::Thorough => Self {
                max_path_length: 8,
                timeout_seconds: 600,
                bidi_mode: BidiMode::Sequential,
                worklist_order: WorklistOrder::Fifo,
                yield_every: 256,
                progress_interval_ms: 5000,
                shutdown_grace_ms: 10_000,
                taint: TaintRulesConfig::default(),
            },
        }
    }

    /// Parse and validate a YAML document
    ///
    /// Missing fields take the balanced defaults.
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Run deadline derived from `timeout_seconds`
    pub fn timeout(&self) -> Duration {
        if self.timeout_seconds == 0 {
            UNLIMITED_TIMEOUT
        } else {
            Duration::from_secs(self.timeout_seconds)
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Builder: Set max_path_length
    pub fn max_path_length(mut self, v: usize) -> Self {
        self.max_path_length = v;
        self
    }

    /// Builder: Set timeout_seconds
    pub fn timeout_seconds(mut self, v: u64) -> Self {
        self.timeout_seconds = v;
        self
    }

    /// Builder: Set bidi_mode
    pub fn bidi_mode(mut self, v: BidiMode) -> Self {
        self.bidi_mode = v;
        self
    }

    /// Builder: Set worklist_order
    pub fn worklist_order(mut self, v: WorklistOrder) -> Self {
        self.worklist_order = v;
        self
    }

    /// Builder: Set yield_every
    pub fn yield_every(mut self, v: usize) -> Self {
        self.yield_every = v;
        self
    }

    /// Builder: Set progress_interval_ms
    pub fn progress_interval_ms(mut self, v: u64) -> Self {
        self.progress_interval_ms = v;
        self
    }

    /// Builder: Set shutdown_grace_ms
    pub fn shutdown_grace_ms(mut self, v: u64) -> Self {
        self.shutdown_grace_ms = v;
        self
    }

    /// Builder: Set taint rules
    pub fn taint(mut self, v: TaintRulesConfig) -> Self {
        self.taint = v;
        self
    }
}

impl Default for IfdsConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ifds_config_presets_validate() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough, Preset::Custom] {
            assert!(IfdsConfig::from_preset(preset).validate().is_ok(), "{preset}");
        }

        let fast = IfdsConfig::from_preset(Preset::Fast);
        assert_eq!(fast.bidi_mode, BidiMode::Disabled);
        assert_eq!(fast.max_path_length, 3);

        let thorough = IfdsConfig::from_preset(Preset::Thorough);
        assert_eq!(thorough.bidi_mode, BidiMode::Sequential);
        assert_eq!(thorough.max_path_length, 8);
    }

    #[test]
    fn test_ifds_config_validation() {
        let config = IfdsConfig::default().max_path_length(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Range { field, .. }) if field == "max_path_length"
        ));

        let config = IfdsConfig::default().timeout_seconds(7200);
        assert!(config.validate().is_err());

        let config = IfdsConfig::default().yield_every(0);
        assert!(config.validate().is_err());

        let config = IfdsConfig::default().progress_interval_ms(1);
        assert!(config.validate().is_err());

        let config = IfdsConfig::default().shutdown_grace_ms(120_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = IfdsConfig::default().taint(TaintRulesConfig::default().sink("exec(", "CMDI"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern { field, .. }) if field == "taint.sinks"
        ));
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
max_path_length: 7
worklist_order: lifo
taint:
  sources:
    - pattern: "^readLine$"
  sinks:
    - pattern: "^exec$"
      rule: CMDI
"#;
        let config = IfdsConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_path_length, 7);
        assert_eq!(config.worklist_order, WorklistOrder::Lifo);
        assert_eq!(config.timeout_seconds, 60);
        assert_eq!(config.taint.sources[0].mark, DEFAULT_TAINT_MARK);
        assert_eq!(config.taint.sinks[0].rule, "CMDI");
        assert_eq!(config.taint.sinks[0].mark, None);
    }

    #[test]
    fn test_yaml_validation_runs() {
        let err = IfdsConfig::from_yaml_str("max_path_length: 100\n").unwrap_err();
        assert!(matches!(err, ConfigError::Range { .. }));

        let err = IfdsConfig::from_yaml_str("bidi_mode: sideways\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = IfdsConfig::from_preset(Preset::Thorough)
            .taint(TaintRulesConfig::default().source("^getenv$", "ENV").sanitizer("^escape$"));
        let yaml = config.to_yaml().unwrap();
        assert_eq!(IfdsConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_timeout_zero_is_unlimited() {
        assert_eq!(IfdsConfig::default().timeout_seconds(0).timeout(), UNLIMITED_TIMEOUT);
        assert_eq!(IfdsConfig::default().timeout(), Duration::from_secs(60));
    }
}
