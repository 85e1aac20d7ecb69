//! Source / sanitizer / sink evaluation for the taint analyzers

use super::taint_fact::TaintMark;
use crate::config::{ConfigError, ConfigResult, TaintRulesConfig};
use regex::Regex;

/// A sink rule triggered by a tainted argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkMatch {
    pub rule: String,
    pub message: String,
}

/// Decides source, sanitizer and sink membership of a call
pub trait TaintRuleEvaluator: Send + Sync + 'static {
    /// Marks carried by the result of a call to `callee`
    fn source_marks(&self, callee: &str) -> Vec<TaintMark>;

    /// Whether a call to `callee` removes `mark` from its arguments
    fn sanitizes(&self, callee: &str, mark: &TaintMark) -> bool;

    /// Rule violated when `mark` reaches an argument of `callee`
    fn sink(&self, callee: &str, mark: &TaintMark) -> Option<SinkMatch>;

    /// Marks checked by the sinks matching `callee`
    fn sink_marks(&self, callee: &str) -> Vec<TaintMark>;
}

fn sink_message(rule: &str, mark: &TaintMark, callee: &str) -> String {
    format!("{rule}: {mark} data reaches {callee}")
}

struct SourceRule {
    pattern: Regex,
    mark: TaintMark,
}

struct SanitizerRule {
    pattern: Regex,
    mark: Option<TaintMark>,
}

struct SinkRule {
    pattern: Regex,
    rule: String,
    mark: Option<TaintMark>,
}

impl SinkRule {
    fn accepts(&self, mark: &TaintMark) -> bool {
        match &self.mark {
            Some(expected) => expected == mark,
            None => *mark != TaintMark::NULLNESS,
        }
    }
}

/// Rules compiled from method-name regexes
pub struct TaintRuleTable {
    sources: Vec<SourceRule>,
    sanitizers: Vec<SanitizerRule>,
    sinks: Vec<SinkRule>,
}

impl TaintRuleTable {
    pub fn from_config(config: &TaintRulesConfig) -> ConfigResult<Self> {
        let compile = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|err| ConfigError::invalid_pattern(field, pattern, &err))
        };

        let sources = config
            .sources
            .iter()
            .map(|rule| -> ConfigResult<SourceRule> {
                Ok(SourceRule {
                    pattern: compile("taint.sources", &rule.pattern)?,
                    mark: TaintMark::new(rule.mark.clone()),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        let sanitizers = config
            .sanitizers
            .iter()
            .map(|rule| -> ConfigResult<SanitizerRule> {
                Ok(SanitizerRule {
                    pattern: compile("taint.sanitizers", &rule.pattern)?,
                    mark: rule.mark.clone().map(TaintMark::new),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        let sinks = config
            .sinks
            .iter()
            .map(|rule| -> ConfigResult<SinkRule> {
                Ok(SinkRule {
                    pattern: compile("taint.sinks", &rule.pattern)?,
                    rule: rule.rule.clone(),
                    mark: rule.mark.clone().map(TaintMark::new),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            sources,
            sanitizers,
            sinks,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.sanitizers.is_empty() && self.sinks.is_empty()
    }

    fn all_source_marks(&self) -> Vec<TaintMark> {
        let mut marks: Vec<TaintMark> = self.sources.iter().map(|rule| rule.mark.clone()).collect();
        marks.sort();
        marks.dedup();
        marks
    }
}

impl TaintRuleEvaluator for TaintRuleTable {
    fn source_marks(&self, callee: &str) -> Vec<TaintMark> {
        self.sources
            .iter()
            .filter(|rule| rule.pattern.is_match(callee))
            .map(|rule| rule.mark.clone())
            .collect()
    }

    fn sanitizes(&self, callee: &str, mark: &TaintMark) -> bool {
        self.sanitizers.iter().any(|rule| {
            rule.pattern.is_match(callee) && rule.mark.as_ref().map_or(true, |expected| expected == mark)
        })
    }

    fn sink(&self, callee: &str, mark: &TaintMark) -> Option<SinkMatch> {
        self.sinks
            .iter()
            .find(|rule| rule.accepts(mark) && rule.pattern.is_match(callee))
            .map(|rule| SinkMatch {
                rule: rule.rule.clone(),
                message: sink_message(&rule.rule, mark, callee),
            })
    }

    fn sink_marks(&self, callee: &str) -> Vec<TaintMark> {
        let mut marks = Vec::new();
        for rule in self.sinks.iter().filter(|rule| rule.pattern.is_match(callee)) {
            match &rule.mark {
                Some(mark) => marks.push(mark.clone()),
                None => marks.extend(self.all_source_marks()),
            }
        }
        marks.sort();
        marks.dedup();
        marks
    }
}

type CalleePredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Rules backed by closures over the callee name
#[derive(Default)]
pub struct PredicateTaintRules {
    sources: Vec<(CalleePredicate, TaintMark)>,
    sanitizers: Vec<CalleePredicate>,
    sinks: Vec<(CalleePredicate, String)>,
}

impl PredicateTaintRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static, mark: TaintMark) -> Self {
        self.sources.push((Box::new(predicate), mark));
        self
    }

    pub fn sanitizer(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.sanitizers.push(Box::new(predicate));
        self
    }

    pub fn sink(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static, rule: impl Into<String>) -> Self {
        self.sinks.push((Box::new(predicate), rule.into()));
        self
    }
}

impl TaintRuleEvaluator for PredicateTaintRules {
    fn source_marks(&self, callee: &str) -> Vec<TaintMark> {
        self.sources
            .iter()
            .filter(|(matches, _)| matches(callee))
            .map(|(_, mark)| mark.clone())
            .collect()
    }

    fn sanitizes(&self, callee: &str, _mark: &TaintMark) -> bool {
        self.sanitizers.iter().any(|matches| matches(callee))
    }

    fn sink(&self, callee: &str, mark: &TaintMark) -> Option<SinkMatch> {
        if *mark == TaintMark::NULLNESS {
            return None;
        }
        self.sinks
            .iter()
            .find(|(matches, _)| matches(callee))
            .map(|(_, rule)| SinkMatch {
                rule: rule.clone(),
                message: sink_message(rule, mark, callee),
            })
    }

    fn sink_marks(&self, callee: &str) -> Vec<TaintMark> {
        if !self.sinks.iter().any(|(matches, _)| matches(callee)) {
            return Vec::new();
        }
        let mut marks: Vec<TaintMark> = self.sources.iter().map(|(_, mark)| mark.clone()).collect();
        marks.sort();
        marks.dedup();
        marks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> TaintRuleTable {
        let mut config = TaintRulesConfig::default()
            .source(r"^lib\.Http\.param$", "UNTRUSTED")
            .sanitizer(r"^lib\.Html\.escape$")
            .sink(r"^lib\.Db\.query$", "SQLI");
        config.sinks.push(crate::config::SinkRuleConfig {
            pattern: r"\.deref$".into(),
            rule: "NPE-SINK".into(),
            mark: Some("NULLNESS".into()),
        });
        TaintRuleTable::from_config(&config).unwrap()
    }

    #[test]
    fn test_rule_table() {
        let rules = table();
        let untrusted = TaintMark::new("UNTRUSTED");
        assert_eq!(rules.source_marks("lib.Http.param"), vec![untrusted.clone()]);
        assert!(rules.source_marks("lib.Http.header").is_empty());
        assert!(rules.sanitizes("lib.Html.escape", &untrusted));
        assert_eq!(rules.sink("lib.Db.query", &untrusted).map(|m| m.rule), Some("SQLI".to_string()));
        assert_eq!(rules.sink("lib.Db.query", &TaintMark::NULLNESS), None);
        assert_eq!(
            rules.sink("lib.Ptr.deref", &TaintMark::NULLNESS).map(|m| m.rule),
            Some("NPE-SINK".to_string())
        );
        assert_eq!(rules.sink_marks("lib.Db.query"), vec![untrusted]);
        assert_eq!(rules.sink_marks("lib.Ptr.deref"), vec![TaintMark::NULLNESS]);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = TaintRulesConfig::default().sink("(", "SQLI");
        assert!(matches!(
            TaintRuleTable::from_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_predicate_rules() {
        let rules = PredicateTaintRules::new()
            .source(|callee| callee.ends_with(".read"), TaintMark::TAINT)
            .sanitizer(|callee| callee.contains("clean"))
            .sink(|callee| callee == "lib.Os.exec", "CMDI");
        assert_eq!(rules.source_marks("lib.File.read"), vec![TaintMark::TAINT]);
        assert!(rules.sanitizes("lib.clean", &TaintMark::TAINT));
        assert_eq!(TaintRuleEvaluator::sink(&rules, "lib.Os.exec", &TaintMark::TAINT).map(|m| m.rule), Some("CMDI".into()));
        assert_eq!(TaintRuleEvaluator::sink(&rules, "lib.Os.exec", &TaintMark::NULLNESS), None);
        assert_eq!(rules.sink_marks("lib.Os.exec"), vec![TaintMark::TAINT]);
        assert!(rules.sink_marks("lib.Os.read").is_empty());
    }
}
