//! Pipeline stages and the stage factory capability

use crate::error::{PipelineError, Result};
use crate::filter::{self, Filterer};
use crate::labels::{Labels, MatchType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One executable step of line processing
pub trait Stage: fmt::Debug + Send + Sync {
    /// Process a line, returning the (possibly rewritten) line, or `None`
    /// when the line is dropped. Stages may add or rewrite labels.
    fn process(&self, line: String, labels: &mut Labels) -> Option<String>;

    /// Whether the stage leaves every line and label untouched
    fn is_noop(&self) -> bool {
        false
    }
}

/// The no-op sentinel; pipeline compilation never keeps it
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStage;

impl Stage for NoopStage {
    fn process(&self, line: String, _labels: &mut Labels) -> Option<String> {
        Some(line)
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Ordered sequence of stages applied to every line
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Pipeline that passes every line through
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Box<dyn Stage>> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run a line through every stage, stopping at the first that drops it
    pub fn process(&self, line: &str, labels: &mut Labels) -> Option<String> {
        self.stages
            .iter()
            .try_fold(line.to_string(), |line, stage| stage.process(line, labels))
    }
}

/// Structured-field parser kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParserKind {
    Json,
    Logfmt,
    Regexp,
    Unpack,
    Pattern,
}

impl ParserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserKind::Json => "json",
            ParserKind::Logfmt => "logfmt",
            ParserKind::Regexp => "regexp",
            ParserKind::Unpack => "unpack",
            ParserKind::Pattern => "pattern",
        }
    }

    /// Whether the parser is written with a quoted expression
    pub fn takes_param(&self) -> bool {
        matches!(self, ParserKind::Regexp | ParserKind::Pattern)
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ParserKind::Json),
            "logfmt" => Ok(ParserKind::Logfmt),
            "regexp" => Ok(ParserKind::Regexp),
            "unpack" => Ok(ParserKind::Unpack),
            "pattern" => Ok(ParserKind::Pattern),
            _ => Err(PipelineError::unsupported(format!("unknown parser operator: {}", s))),
        }
    }
}

/// JSON path extraction into a label: `identifier="path.to[0].field"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonExpression {
    pub identifier: String,
    pub expression: String,
}

impl JsonExpression {
    pub fn new(identifier: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            expression: expression.into(),
        }
    }
}

/// Label formatting rule: a rename (`dst=src`) or a template (`dst="{{.src}}"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFmt {
    pub name: String,
    pub value: String,
    pub rename: bool,
}

impl LabelFmt {
    pub fn rename(dst: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            name: dst.into(),
            value: src.into(),
            rename: true,
        }
    }

    pub fn template(dst: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: dst.into(),
            value: template.into(),
            rename: false,
        }
    }
}

/// Builds executable stages from expression parameters
///
/// Parsers and formatters are supplied by the runtime that executes the
/// pipeline. Line filter predicates default to the built-in filters.
pub trait StageFactory: Send + Sync {
    /// Predicate for a plain line filter (`|=`, `!=`, `|~`, `!~`)
    fn line_filter(&self, ty: MatchType, pattern: &str) -> Result<Box<dyn Filterer>> {
        filter::new_filter(pattern, ty)
    }

    /// Predicate for an `ip("...")` line filter
    fn ip_line_filter(&self, ty: MatchType, pattern: &str) -> Result<Box<dyn Filterer>> {
        filter::new_ip_line_filter(pattern, ty)
    }

    /// Structured-field parser (`| json`, `| regexp "..."`, ...)
    fn parser(&self, kind: ParserKind, param: &str) -> Result<Box<dyn Stage>>;

    /// JSON path extraction (`| json a="x.y"`)
    fn json_expression_parser(&self, expressions: &[JsonExpression]) -> Result<Box<dyn Stage>>;

    /// Line rewrite (`| line_format "..."`)
    fn line_formatter(&self, template: &str) -> Result<Box<dyn Stage>>;

    /// Label rewrite (`| label_format a=b`)
    fn labels_formatter(&self, formats: &[LabelFmt]) -> Result<Box<dyn Stage>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterStage;

    #[derive(Debug)]
    struct Uppercase;

    impl Stage for Uppercase {
        fn process(&self, line: String, labels: &mut Labels) -> Option<String> {
            labels.insert("upper".to_string(), "true".to_string());
            Some(line.to_uppercase())
        }
    }

    #[test]
    fn test_pipeline_process() {
        let pipeline = Pipeline::new(vec![
            Box::new(FilterStage::new(
                filter::new_filter("keep", MatchType::Equal).unwrap(),
            )),
            Box::new(Uppercase),
        ]);
        assert_eq!(pipeline.len(), 2);

        let mut labels = Labels::new();
        assert_eq!(
            pipeline.process("keep this", &mut labels),
            Some("KEEP THIS".to_string())
        );
        assert_eq!(labels.get("upper").map(String::as_str), Some("true"));

        let mut labels = Labels::new();
        assert_eq!(pipeline.process("drop this", &mut labels), None);
        assert!(labels.is_empty());
    }

    #[test]
    fn test_noop_pipeline() {
        let pipeline = Pipeline::noop();
        assert!(pipeline.is_empty());
        let mut labels = Labels::new();
        assert_eq!(pipeline.process("x", &mut labels), Some("x".to_string()));
        assert!(NoopStage.is_noop());
    }

    #[test]
    fn test_parser_kind_names() {
        for kind in [
            ParserKind::Json,
            ParserKind::Logfmt,
            ParserKind::Regexp,
            ParserKind::Unpack,
            ParserKind::Pattern,
        ] {
            assert_eq!(kind.as_str().parse::<ParserKind>().unwrap(), kind);
        }
        assert!("xml".parse::<ParserKind>().is_err());
    }

    #[test]
    fn test_parser_kind_takes_param() {
        assert!(ParserKind::Regexp.takes_param());
        assert!(ParserKind::Pattern.takes_param());
        assert!(!ParserKind::Json.takes_param());
        assert!(!ParserKind::Unpack.takes_param());
    }
}
