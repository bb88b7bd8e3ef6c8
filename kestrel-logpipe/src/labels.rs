//! Label sets and label matchers

use crate::error::{PipelineError, Result};
use crate::format::quote;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A label set, ordered by label name
pub type Labels = BTreeMap<String, String>;

/// Label set on lines whose labels could not be processed
pub const ERROR_LABEL: &str = "__error__";

/// Value of [`ERROR_LABEL`] set by label filters
pub const LABEL_FILTER_ERROR: &str = "LabelFilterErr";

/// Match operator shared by label matchers and line filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    Equal,
    NotEqual,
    Regexp,
    NotRegexp,
}

impl MatchType {
    /// Operator as written in a label matcher
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::Regexp => "=~",
            MatchType::NotRegexp => "!~",
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, MatchType::Regexp | MatchType::NotRegexp)
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, MatchType::NotEqual | MatchType::NotRegexp)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(MatchType::Equal),
            "!=" => Ok(MatchType::NotEqual),
            "=~" => Ok(MatchType::Regexp),
            "!~" => Ok(MatchType::NotRegexp),
            _ => Err(PipelineError::unsupported(format!("unknown match type: {}", s))),
        }
    }
}

/// Label matcher: `name="value"`, `name=~"re"`, ...
///
/// Regex matchers are compiled at construction and always anchored to the
/// whole label value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MatcherRepr", into = "MatcherRepr")]
pub struct Matcher {
    name: String,
    ty: MatchType,
    value: String,
    re: Option<Regex>,
}

#[derive(Serialize, Deserialize)]
struct MatcherRepr {
    name: String,
    #[serde(rename = "type")]
    ty: MatchType,
    value: String,
}

impl Matcher {
    /// Create a matcher, compiling the value if the operator is a regex
    pub fn new(ty: MatchType, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let re = if ty.is_regex() {
            Some(Regex::new(&format!("^(?:{})$", value))?)
        } else {
            None
        };
        Ok(Self {
            name: name.into(),
            ty,
            value,
            re,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn match_type(&self) -> MatchType {
        self.ty
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Test a label value against this matcher
    pub fn matches(&self, value: &str) -> bool {
        match (self.ty, &self.re) {
            (MatchType::Equal, _) => value == self.value,
            (MatchType::NotEqual, _) => value != self.value,
            (MatchType::Regexp, Some(re)) => re.is_match(value),
            (MatchType::NotRegexp, Some(re)) => !re.is_match(value),
            // regex matchers always carry a compiled regex
            (MatchType::Regexp | MatchType::NotRegexp, None) => false,
        }
    }

    /// Test a label set; a missing label matches as the empty string
    pub fn matches_labels(&self, labels: &Labels) -> bool {
        self.matches(labels.get(&self.name).map(String::as_str).unwrap_or(""))
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty && self.value == other.value
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.ty, quote(&self.value))
    }
}

impl TryFrom<MatcherRepr> for Matcher {
    type Error = PipelineError;

    fn try_from(repr: MatcherRepr) -> Result<Self> {
        Matcher::new(repr.ty, repr.name, repr.value)
    }
}

impl From<Matcher> for MatcherRepr {
    fn from(m: Matcher) -> Self {
        MatcherRepr {
            name: m.name,
            ty: m.ty,
            value: m.value,
        }
    }
}
