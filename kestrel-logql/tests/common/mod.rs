//! Shared fixtures for LogQL integration tests

#![allow(dead_code)]

use kestrel_logpipe::filter::new_filter;
use kestrel_logpipe::{
    Filterer, JsonExpression, LabelFmt, Labels, MatchType, Matcher, NoopStage, ParserKind,
    PipelineError, Stage, StageFactory,
};
use kestrel_logql::{LogSelectorExpr, MatchersExpr};
use std::sync::{Arc, Mutex};

/// Install a test subscriber; `RUST_LOG=kestrel_logql=trace` shows compilation logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn selector(pairs: &[(&str, &str)]) -> LogSelectorExpr {
    let matchers = pairs
        .iter()
        .map(|(name, value)| Matcher::new(MatchType::Equal, *name, *value).unwrap())
        .collect();
    MatchersExpr::new(matchers).into()
}

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Label under which [`NamedStage`]s record themselves
pub const STAGES_LABEL: &str = "stages";

/// Stage appending its name to the [`STAGES_LABEL`] label
#[derive(Debug)]
pub struct NamedStage(pub String);

impl Stage for NamedStage {
    fn process(&self, line: String, labels: &mut Labels) -> Option<String> {
        let seen = labels.entry(STAGES_LABEL.to_string()).or_default();
        if !seen.is_empty() {
            seen.push(',');
        }
        seen.push_str(&self.0);
        Some(line)
    }
}

/// Substring filter logging every pattern it tests
#[derive(Debug)]
pub struct RecordingFilter {
    pattern: String,
    negated: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl Filterer for RecordingFilter {
    fn matches(&self, line: &str) -> bool {
        self.log.lock().unwrap().push(self.pattern.clone());
        line.contains(&self.pattern) != self.negated
    }
}

/// Stage factory for tests.
///
/// Non-empty substring filters record evaluation order in `evaluated`.
/// `regexp` validates its expression, `pattern` requires one and `unpack`
/// compiles to the no-op stage.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    pub evaluated: Arc<Mutex<Vec<String>>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.lock().unwrap().clone()
    }
}

impl StageFactory for RecordingFactory {
    fn line_filter(
        &self,
        ty: MatchType,
        pattern: &str,
    ) -> kestrel_logpipe::Result<Box<dyn Filterer>> {
        match ty {
            MatchType::Equal | MatchType::NotEqual if !pattern.is_empty() => {
                Ok(Box::new(RecordingFilter {
                    pattern: pattern.to_string(),
                    negated: ty == MatchType::NotEqual,
                    log: Arc::clone(&self.evaluated),
                }))
            }
            _ => new_filter(pattern, ty),
        }
    }

    fn parser(&self, kind: ParserKind, param: &str) -> kestrel_logpipe::Result<Box<dyn Stage>> {
        match kind {
            ParserKind::Regexp => {
                regex::Regex::new(param)?;
            }
            ParserKind::Pattern if param.is_empty() => {
                return Err(PipelineError::invalid_stage("pattern parser requires an expression"));
            }
            ParserKind::Unpack => return Ok(Box::new(NoopStage)),
            _ => {}
        }
        Ok(Box::new(NamedStage(kind.to_string())))
    }

    fn json_expression_parser(
        &self,
        expressions: &[JsonExpression],
    ) -> kestrel_logpipe::Result<Box<dyn Stage>> {
        let names: Vec<&str> = expressions.iter().map(|e| e.identifier.as_str()).collect();
        Ok(Box::new(NamedStage(format!("json[{}]", names.join(" ")))))
    }

    fn line_formatter(&self, _template: &str) -> kestrel_logpipe::Result<Box<dyn Stage>> {
        Ok(Box::new(NamedStage("line_format".to_string())))
    }

    fn labels_formatter(&self, _formats: &[LabelFmt]) -> kestrel_logpipe::Result<Box<dyn Stage>> {
        Ok(Box::new(NamedStage("label_format".to_string())))
    }
}
