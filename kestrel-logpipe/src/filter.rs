//! Line filters
//!
//! Built-in predicates behind `|=`, `!=`, `|~`, `!~` and `|= ip("...")`.
//! A filter becomes a pipeline stage through `FilterStage`; an always-true
//! filter turns into the no-op stage sentinel.

use crate::error::{PipelineError, Result};
use crate::ip::IpPattern;
use crate::labels::{Labels, MatchType};
use crate::stage::Stage;
use regex::Regex;
use std::fmt;

/// Predicate over a raw log line
pub trait Filterer: fmt::Debug + Send + Sync {
    /// Whether the line is kept
    fn matches(&self, line: &str) -> bool;

    /// Whether this filter keeps every line
    fn is_true(&self) -> bool {
        false
    }
}

/// Keeps every line
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueFilter;

impl Filterer for TrueFilter {
    fn matches(&self, _line: &str) -> bool {
        true
    }

    fn is_true(&self) -> bool {
        true
    }
}

/// Substring filter: `|= "text"`
#[derive(Debug, Clone)]
pub struct ContainsFilter {
    pattern: String,
}

impl ContainsFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl Filterer for ContainsFilter {
    fn matches(&self, line: &str) -> bool {
        line.contains(&self.pattern)
    }
}

/// Unanchored regex filter: `|~ "re"`
#[derive(Debug, Clone)]
pub struct RegexFilter {
    re: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            re: Regex::new(pattern)?,
        })
    }
}

impl Filterer for RegexFilter {
    fn matches(&self, line: &str) -> bool {
        self.re.is_match(line)
    }
}

/// Inverts another filter
#[derive(Debug)]
pub struct NotFilter {
    inner: Box<dyn Filterer>,
}

impl NotFilter {
    pub fn new(inner: Box<dyn Filterer>) -> Self {
        Self { inner }
    }
}

impl Filterer for NotFilter {
    fn matches(&self, line: &str) -> bool {
        !self.inner.matches(line)
    }
}

/// Conjunction of filters, evaluated left to right with short-circuit
#[derive(Debug)]
pub struct AndFilter {
    filters: Vec<Box<dyn Filterer>>,
}

impl AndFilter {
    pub fn new(filters: Vec<Box<dyn Filterer>>) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &[Box<dyn Filterer>] {
        &self.filters
    }
}

impl Filterer for AndFilter {
    fn matches(&self, line: &str) -> bool {
        self.filters.iter().all(|f| f.matches(line))
    }

    fn is_true(&self) -> bool {
        self.filters.iter().all(|f| f.is_true())
    }
}

/// Keeps lines containing (or, negated, not containing) an address in the pattern
#[derive(Debug, Clone)]
pub struct IpLineFilter {
    pattern: IpPattern,
    negated: bool,
}

impl Filterer for IpLineFilter {
    fn matches(&self, line: &str) -> bool {
        self.pattern.matches_line(line) != self.negated
    }
}

/// Build the filter for a plain line filter operator
pub fn new_filter(pattern: &str, ty: MatchType) -> Result<Box<dyn Filterer>> {
    let filter: Box<dyn Filterer> = match ty {
        MatchType::Equal if pattern.is_empty() => Box::new(TrueFilter),
        MatchType::Equal => Box::new(ContainsFilter::new(pattern)),
        MatchType::NotEqual => Box::new(NotFilter::new(Box::new(ContainsFilter::new(pattern)))),
        MatchType::Regexp if pattern.is_empty() || pattern == ".*" => Box::new(TrueFilter),
        MatchType::Regexp => Box::new(RegexFilter::new(pattern)?),
        MatchType::NotRegexp => Box::new(NotFilter::new(Box::new(RegexFilter::new(pattern)?))),
    };
    Ok(filter)
}

/// Build the filter for `ip("...")`; only equality operators are supported
pub fn new_ip_line_filter(pattern: &str, ty: MatchType) -> Result<Box<dyn Filterer>> {
    let negated = match ty {
        MatchType::Equal => false,
        MatchType::NotEqual => true,
        MatchType::Regexp | MatchType::NotRegexp => {
            return Err(PipelineError::unsupported(format!(
                "ip line filter does not support {} matching",
                ty
            )))
        }
    };
    Ok(Box::new(IpLineFilter {
        pattern: IpPattern::parse(pattern)?,
        negated,
    }))
}

/// Adapts a line filter into a pipeline stage
#[derive(Debug)]
pub struct FilterStage {
    filter: Box<dyn Filterer>,
}

impl FilterStage {
    pub fn new(filter: Box<dyn Filterer>) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &dyn Filterer {
        self.filter.as_ref()
    }
}

impl Stage for FilterStage {
    fn process(&self, line: String, _labels: &mut Labels) -> Option<String> {
        if self.filter.matches(&line) {
            Some(line)
        } else {
            None
        }
    }

    fn is_noop(&self) -> bool {
        self.filter.is_true()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_filters() {
        let f = new_filter("error", MatchType::Equal).unwrap();
        assert!(f.matches("level=error msg=boom"));
        assert!(!f.matches("level=info"));

        let f = new_filter("error", MatchType::NotEqual).unwrap();
        assert!(!f.matches("level=error msg=boom"));
        assert!(f.matches("level=info"));
    }

    #[test]
    fn test_regex_filters() {
        let f = new_filter("status=5\\d\\d", MatchType::Regexp).unwrap();
        assert!(f.matches("GET / status=503"));
        assert!(!f.matches("GET / status=200"));

        let f = new_filter("debug|trace", MatchType::NotRegexp).unwrap();
        assert!(f.matches("level=info"));
        assert!(!f.matches("level=debug"));

        assert!(matches!(
            new_filter("(", MatchType::Regexp),
            Err(PipelineError::InvalidRegex(_))
        ));
    }

    #[test]
    fn test_true_filters() {
        assert!(new_filter("", MatchType::Equal).unwrap().is_true());
        assert!(new_filter(".*", MatchType::Regexp).unwrap().is_true());
        assert!(!new_filter("x", MatchType::Equal).unwrap().is_true());
        assert!(FilterStage::new(Box::new(TrueFilter)).is_noop());
    }

    #[test]
    fn test_ip_line_filter() {
        let f = new_ip_line_filter("192.168.0.0/16", MatchType::Equal).unwrap();
        assert!(f.matches("conn from 192.168.4.2 accepted"));
        assert!(!f.matches("conn from 10.0.0.1 accepted"));

        let f = new_ip_line_filter("192.168.0.0/16", MatchType::NotEqual).unwrap();
        assert!(f.matches("conn from 10.0.0.1 accepted"));

        assert!(new_ip_line_filter("192.168.0.0/16", MatchType::Regexp).is_err());
        assert!(new_ip_line_filter("nope", MatchType::Equal).is_err());
    }

    #[test]
    fn test_and_filter() {
        let f = AndFilter::new(vec![
            new_filter("GET", MatchType::Equal).unwrap(),
            new_filter("/api", MatchType::Equal).unwrap(),
        ]);
        assert!(f.matches("GET /api/v1"));
        assert!(!f.matches("POST /api/v1"));
        assert!(!f.matches("GET /static"));
        assert_eq!(f.filters().len(), 2);
    }

    #[test]
    fn test_filter_stage() {
        let stage = FilterStage::new(new_filter("keep", MatchType::Equal).unwrap());
        let mut labels = Labels::new();
        assert_eq!(
            stage.process("keep me".to_string(), &mut labels),
            Some("keep me".to_string())
        );
        assert_eq!(stage.process("drop me".to_string(), &mut labels), None);
        assert!(!stage.is_noop());
    }
}
