//! Label filters (`| status >= 400`, `| level="error"`, `| addr=ip("10.0.0.0/8")`)

use crate::error::PipelineError;
use crate::format::{format_float, format_go_duration, parse_bytes, parse_duration, quote};
use crate::ip::IpPattern;
use crate::labels::{Labels, Matcher, ERROR_LABEL, LABEL_FILTER_ERROR};
use crate::stage::Stage;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Comparison used by typed label filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LabelFilterType {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LesserThan,
    LesserThanOrEqual,
}

impl LabelFilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelFilterType::Equal => "==",
            LabelFilterType::NotEqual => "!=",
            LabelFilterType::GreaterThan => ">",
            LabelFilterType::GreaterThanOrEqual => ">=",
            LabelFilterType::LesserThan => "<",
            LabelFilterType::LesserThanOrEqual => "<=",
        }
    }

    fn compare<T: PartialOrd>(&self, left: T, right: T) -> bool {
        match self {
            LabelFilterType::Equal => left == right,
            LabelFilterType::NotEqual => left != right,
            LabelFilterType::GreaterThan => left > right,
            LabelFilterType::GreaterThanOrEqual => left >= right,
            LabelFilterType::LesserThan => left < right,
            LabelFilterType::LesserThanOrEqual => left <= right,
        }
    }
}

impl fmt::Display for LabelFilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `label=ip("pattern")`; an invalid pattern is kept and reported when the
/// filter is compiled into a stage
#[derive(Debug, Clone, Serialize)]
pub struct IpLabelFilter {
    name: String,
    ty: LabelFilterType,
    pattern: String,
    #[serde(skip)]
    parsed: std::result::Result<IpPattern, String>,
}

impl IpLabelFilter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn pattern_error(&self) -> Option<PipelineError> {
        self.parsed
            .as_ref()
            .err()
            .map(|message| PipelineError::invalid_ip(self.pattern.clone(), message.clone()))
    }

    fn matches(&self, labels: &Labels) -> bool {
        let Ok(pattern) = &self.parsed else {
            return false;
        };
        let Some(value) = labels.get(&self.name) else {
            return false;
        };
        let hit = value
            .trim()
            .parse::<IpAddr>()
            .map(|ip| pattern.contains(&ip))
            .unwrap_or(false);
        match self.ty {
            LabelFilterType::NotEqual => !hit,
            _ => hit,
        }
    }
}

impl PartialEq for IpLabelFilter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty && self.pattern == other.pattern
    }
}

/// A predicate over the labels of a line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LabelFilter {
    /// `a , b` (and) or `a or b`
    Binary {
        left: Box<LabelFilter>,
        right: Box<LabelFilter>,
        and: bool,
    },
    /// `size > 10KB`
    Bytes {
        name: String,
        ty: LabelFilterType,
        value: u64,
    },
    /// `latency >= 250ms`
    Duration {
        name: String,
        ty: LabelFilterType,
        value: Duration,
    },
    /// `status >= 400`
    Numeric {
        name: String,
        ty: LabelFilterType,
        value: f64,
    },
    /// `level="error"`, `path=~"/api/.*"`
    String(Matcher),
    /// `addr=ip("10.0.0.0/8")`
    Ip(IpLabelFilter),
}

impl LabelFilter {
    pub fn and(left: LabelFilter, right: LabelFilter) -> Self {
        LabelFilter::Binary {
            left: Box::new(left),
            right: Box::new(right),
            and: true,
        }
    }

    pub fn or(left: LabelFilter, right: LabelFilter) -> Self {
        LabelFilter::Binary {
            left: Box::new(left),
            right: Box::new(right),
            and: false,
        }
    }

    pub fn numeric(name: impl Into<String>, ty: LabelFilterType, value: f64) -> Self {
        LabelFilter::Numeric {
            name: name.into(),
            ty,
            value,
        }
    }

    pub fn bytes(name: impl Into<String>, ty: LabelFilterType, value: u64) -> Self {
        LabelFilter::Bytes {
            name: name.into(),
            ty,
            value,
        }
    }

    pub fn duration(name: impl Into<String>, ty: LabelFilterType, value: Duration) -> Self {
        LabelFilter::Duration {
            name: name.into(),
            ty,
            value,
        }
    }

    pub fn string(matcher: Matcher) -> Self {
        LabelFilter::String(matcher)
    }

    /// IP filters only support `=` and `!=`; any problem with the pattern or
    /// the operator surfaces from [`LabelFilter::pattern_error`]
    pub fn ip(name: impl Into<String>, ty: LabelFilterType, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let parsed = match ty {
            LabelFilterType::Equal | LabelFilterType::NotEqual => {
                IpPattern::parse(&pattern).map_err(|e| match e {
                    PipelineError::InvalidIpPattern { message, .. } => message,
                    other => other.to_string(),
                })
            }
            _ => Err(format!("ip filter does not support {} comparison", ty)),
        };
        LabelFilter::Ip(IpLabelFilter {
            name: name.into(),
            ty,
            pattern,
            parsed,
        })
    }

    /// Fold filters into a left-nested conjunction
    pub fn reduce_and(filters: impl IntoIterator<Item = LabelFilter>) -> Option<LabelFilter> {
        filters.into_iter().reduce(LabelFilter::and)
    }

    /// Deferred construction error of an IP filter anywhere in this filter
    pub fn pattern_error(&self) -> Option<PipelineError> {
        match self {
            LabelFilter::Ip(ip) => ip.pattern_error(),
            LabelFilter::Binary { left, right, .. } => {
                left.pattern_error().or_else(|| right.pattern_error())
            }
            _ => None,
        }
    }

    /// Evaluate against a label set. Typed comparisons on values that do not
    /// parse keep the line and mark it with the error label.
    pub fn filter(&self, labels: &mut Labels) -> bool {
        match self {
            LabelFilter::Binary { left, right, and } => {
                if *and {
                    left.filter(labels) && right.filter(labels)
                } else {
                    left.filter(labels) || right.filter(labels)
                }
            }
            LabelFilter::Bytes { name, ty, value } => {
                compare_label(labels, name, parse_bytes, |v| ty.compare(v, *value))
            }
            LabelFilter::Duration { name, ty, value } => {
                compare_label(labels, name, parse_duration, |v| ty.compare(v, *value))
            }
            LabelFilter::Numeric { name, ty, value } => compare_label(
                labels,
                name,
                |s| s.trim().parse::<f64>().ok(),
                |v| ty.compare(v, *value),
            ),
            LabelFilter::String(matcher) => matcher.matches_labels(labels),
            LabelFilter::Ip(ip) => ip.matches(labels),
        }
    }
}

fn compare_label<T>(
    labels: &mut Labels,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
    test: impl Fn(T) -> bool,
) -> bool {
    let parsed = match labels.get(name) {
        Some(raw) => parse(raw.as_str()),
        None => return false,
    };
    match parsed {
        Some(v) => test(v),
        None => {
            labels.insert(ERROR_LABEL.to_string(), LABEL_FILTER_ERROR.to_string());
            true
        }
    }
}

impl Stage for LabelFilter {
    fn process(&self, line: String, labels: &mut Labels) -> Option<String> {
        if self.filter(labels) {
            Some(line)
        } else {
            None
        }
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelFilter::Binary { left, right, and } => {
                let op = if *and { "," } else { "or" };
                write!(f, "( {} {} {} )", left, op, right)
            }
            LabelFilter::Bytes { name, ty, value } => write!(f, "{}{}{}B", name, ty, value),
            LabelFilter::Duration { name, ty, value } => {
                write!(f, "{}{}{}", name, ty, format_go_duration(*value))
            }
            LabelFilter::Numeric { name, ty, value } => {
                write!(f, "{}{}{}", name, ty, format_float(*value))
            }
            LabelFilter::String(matcher) => write!(f, "{}", matcher),
            LabelFilter::Ip(ip) => {
                let op = match ip.ty {
                    LabelFilterType::NotEqual => "!=",
                    _ => "=",
                };
                write!(f, "{}{}ip({})", ip.name, op, quote(&ip.pattern))
            }
        }
    }
}
