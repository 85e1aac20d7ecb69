//! Engine configuration
//!
//! Two tiers, as in the rest of the codebase:
//! - Preset: `IfdsConfig::from_preset(Preset::Fast)`
//! - YAML / builders: `IfdsConfig::from_yaml_str(..)` or `IfdsConfig::default().max_path_length(8)`
//!
//! Every entry point validates ranges and rule patterns before a run starts.

pub mod error;
pub mod ifds_config;
pub mod preset;

pub use error::{ConfigError, ConfigResult};
pub use ifds_config::{
    IfdsConfig, SanitizerRuleConfig, SinkRuleConfig, SourceRuleConfig, TaintRulesConfig,
    DEFAULT_TAINT_MARK, UNLIMITED_TIMEOUT,
};
pub use preset::Preset;
