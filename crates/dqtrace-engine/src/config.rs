//! JSON configuration: the ordered rule list, the ordered stage list, and the
//! execution mode.
//!
//! [`QualityConfig::default`] describes the classic three-stage pipeline
//! (load, then two transformations over an `age` column).

use std::path::Path;

use serde::{Deserialize, Serialize};

use dqtrace_types::{DqError, Result};

use crate::engine::RuleEngine;
use crate::rules::{FormatRule, MissingDataRule, RangeRule, Rule, ValueType};
use crate::signatures;
use crate::stages::{StagePredicate, StageRegistry};
use crate::violation::ValidationMode;

// ---------------------------------------------------------------------------
// Rule specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleSpec {
    MissingData {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Format {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        column: String,
        expected: ValueType,
    },
}

impl RuleSpec {
    fn build(&self) -> Result<Box<dyn Rule>> {
        let rule: Box<dyn Rule> = match self {
            RuleSpec::MissingData { name } => Box::new(match name {
                Some(name) => MissingDataRule::named(name.clone()),
                None => MissingDataRule::new(),
            }),
            RuleSpec::Range {
                name,
                column,
                min,
                max,
            } => {
                require_column(column, "range rule")?;
                check_bounds(column, *min, *max)?;
                let rule = RangeRule::new(column.clone(), *min, *max);
                Box::new(match name {
                    Some(name) => rule.named(name.clone()),
                    None => rule,
                })
            }
            RuleSpec::Format {
                name,
                column,
                expected,
            } => {
                require_column(column, "format rule")?;
                let rule = FormatRule::new(column.clone(), *expected);
                Box::new(match name {
                    Some(name) => rule.named(name.clone()),
                    None => rule,
                })
            }
        };
        Ok(rule)
    }
}

// ---------------------------------------------------------------------------
// Stage specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signature {
    HasNulls,
    ColumnHasNulls {
        column: String,
    },
    NegativeValues {
        column: String,
    },
    OutOfRange {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    NonInteger {
        column: String,
    },
}

impl Signature {
    fn build(&self) -> Result<Box<dyn StagePredicate>> {
        let predicate: Box<dyn StagePredicate> = match self {
            Signature::HasNulls => Box::new(signatures::has_nulls()),
            Signature::ColumnHasNulls { column } => {
                require_column(column, "column_has_nulls signature")?;
                Box::new(signatures::column_has_nulls(column.clone()))
            }
            Signature::NegativeValues { column } => {
                require_column(column, "negative_values signature")?;
                Box::new(signatures::negative_values(column.clone()))
            }
            Signature::OutOfRange { column, min, max } => {
                require_column(column, "out_of_range signature")?;
                check_bounds(column, *min, *max)?;
                Box::new(signatures::out_of_range(column.clone(), *min, *max))
            }
            Signature::NonInteger { column } => {
                require_column(column, "non_integer signature")?;
                Box::new(signatures::non_integer(column.clone()))
            }
        };
        Ok(predicate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub signature: Signature,
}

fn require_column(column: &str, what: &str) -> Result<()> {
    if column.trim().is_empty() {
        return Err(DqError::Configuration(format!("{what} has an empty column name")));
    }
    Ok(())
}

fn check_bounds(column: &str, min: Option<f64>, max: Option<f64>) -> Result<()> {
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(DqError::Configuration(format!(
                "range for column '{column}' has min {lo} greater than max {hi}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// QualityConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub mode: ValidationMode,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::CollectAll,
            rules: vec![
                RuleSpec::MissingData { name: None },
                RuleSpec::Range {
                    name: None,
                    column: "age".into(),
                    min: Some(0.0),
                    max: None,
                },
                RuleSpec::Format {
                    name: None,
                    column: "age".into(),
                    expected: ValueType::Integer,
                },
            ],
            stages: vec![
                StageSpec {
                    name: "Data Load".into(),
                    signature: Signature::HasNulls,
                },
                StageSpec {
                    name: "Transformation A".into(),
                    signature: Signature::NegativeValues {
                        column: "age".into(),
                    },
                },
                StageSpec {
                    name: "Transformation B".into(),
                    signature: Signature::NonInteger {
                        column: "age".into(),
                    },
                },
            ],
        }
    }
}

impl QualityConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: QualityConfig = serde_json::from_str(&json)?;
        tracing::debug!(
            path = %path.display(),
            rules = config.rules.len(),
            stages = config.stages.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Build a [`RuleEngine`] with the configured rules, in order.
    pub fn build_engine(&self) -> Result<RuleEngine> {
        let mut engine = RuleEngine::new();
        for spec in &self.rules {
            engine.register_boxed(spec.build()?)?;
        }
        Ok(engine)
    }

    /// Build a [`StageRegistry`] with the configured stages, in order.
    pub fn build_registry(&self) -> Result<StageRegistry> {
        let mut registry = StageRegistry::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(DqError::Configuration("stage with an empty name".into()));
            }
            registry.register_boxed(stage.name.clone(), stage.signature.build()?)?;
        }
        Ok(registry)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_classic_pipeline() {
        let config = QualityConfig::default();
        let engine = config.build_engine().unwrap();
        let registry = config.build_registry().unwrap();
        assert_eq!(engine.rule_names(), vec!["missing_data", "range:age", "format:age"]);
        assert_eq!(
            registry.stage_names(),
            vec!["Data Load", "Transformation A", "Transformation B"]
        );
        assert_eq!(config.mode, ValidationMode::CollectAll);
    }

    #[test]
    fn parse_tagged_json() {
        let json = r#"{
            "mode": "fail_fast",
            "rules": [
                { "type": "missing_data" },
                { "type": "range", "column": "score", "min": 0, "max": 100, "name": "score_pct" },
                { "type": "format", "column": "id", "expected": "integer" }
            ],
            "stages": [
                { "name": "Ingest", "signature": { "type": "column_has_nulls", "column": "id" } },
                { "name": "Scale", "signature": { "type": "out_of_range", "column": "score", "max": 100 } }
            ]
        }"#;
        let config: QualityConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, ValidationMode::FailFast);
        assert_eq!(
            config.rules[1],
            RuleSpec::Range {
                name: Some("score_pct".into()),
                column: "score".into(),
                min: Some(0.0),
                max: Some(100.0),
            }
        );
        let engine = config.build_engine().unwrap();
        assert_eq!(engine.rule_names(), vec!["missing_data", "score_pct", "format:id"]);
        assert_eq!(config.build_registry().unwrap().len(), 2);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let config: QualityConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.mode, ValidationMode::CollectAll);
        assert!(config.build_engine().unwrap().is_empty());
        assert!(config.build_registry().unwrap().is_empty());
    }

    #[test]
    fn duplicate_rule_names_are_configuration_errors() {
        let config = QualityConfig {
            rules: vec![
                RuleSpec::MissingData { name: None },
                RuleSpec::MissingData { name: None },
            ],
            ..QualityConfig::default()
        };
        let err = config.build_engine().err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn duplicate_stage_names_are_configuration_errors() {
        let mut config = QualityConfig::default();
        config.stages[2].name = "Data Load".into();
        let err = config.build_registry().err().unwrap();
        assert!(matches!(err, DqError::DuplicateStage { ref name } if name == "Data Load"));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = QualityConfig {
            rules: vec![RuleSpec::Range {
                name: None,
                column: "age".into(),
                min: Some(10.0),
                max: Some(1.0),
            }],
            stages: vec![],
            mode: ValidationMode::CollectAll,
        };
        let err = config.build_engine().err().unwrap();
        assert!(matches!(err, DqError::Configuration(ref msg) if msg.contains("greater than max")));
    }

    #[test]
    fn empty_column_is_rejected() {
        let mut config = QualityConfig::default();
        config.stages[1].signature = Signature::NegativeValues { column: " ".into() };
        assert!(config.build_registry().err().unwrap().is_configuration());
    }

    #[test]
    fn unknown_rule_type_fails_to_parse() {
        let err = serde_json::from_str::<QualityConfig>(r#"{"rules":[{"type":"regex"}]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality.json");
        let config = QualityConfig::default();
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"type\": \"negative_values\""));

        let loaded = QualityConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = QualityConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, DqError::Io(_)));
    }
}
