//! LogQL Abstract Syntax Tree (AST) definitions
//!
//! Nodes that carry invariants are built through their constructors only;
//! every constructor validates its arguments and fails with a parse error.
//! Plain data (grouping, vector matching, unwrap) has public fields.

use crate::error::{LogqlError, Result};
use crate::merge::{merge_bin_op, Sample};
use crate::ops::{BinaryOp, LineFilterFunction, RangeOp, UnwrapConversion, VectorOp};
use kestrel_logpipe::{JsonExpression, LabelFilter, LabelFmt, MatchType, Matcher, ParserKind};
use regex::Regex;
use serde::Serialize;
use std::time::Duration;

/// Root expression: a log query or a metric query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Log(LogSelectorExpr),
    Sample(SampleExpr),
}

impl Expr {
    /// Reject trees that cannot be executed on their own (a bare literal)
    pub fn ensure_query(&self) -> Result<()> {
        match self {
            Expr::Sample(SampleExpr::Literal(lit)) => Err(LogqlError::parse(format!(
                "a literal is not a valid query: {}",
                lit
            ))),
            _ => Ok(()),
        }
    }

    pub fn as_log_selector(&self) -> Option<&LogSelectorExpr> {
        match self {
            Expr::Log(e) => Some(e),
            Expr::Sample(_) => None,
        }
    }

    pub fn as_sample(&self) -> Option<&SampleExpr> {
        match self {
            Expr::Sample(e) => Some(e),
            Expr::Log(_) => None,
        }
    }
}

impl From<LogSelectorExpr> for Expr {
    fn from(e: LogSelectorExpr) -> Self {
        Expr::Log(e)
    }
}

impl From<SampleExpr> for Expr {
    fn from(e: SampleExpr) -> Self {
        Expr::Sample(e)
    }
}

// ---------------------------------------------------------------------------
// Log selectors
// ---------------------------------------------------------------------------

/// Expression returning a stream of log lines
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LogSelectorExpr {
    /// `{app="api"}`
    Matchers(MatchersExpr),
    /// `{app="api"} |= "error" | json`
    Pipeline(PipelineExpr),
}

impl LogSelectorExpr {
    pub fn matchers(&self) -> &[Matcher] {
        match self {
            LogSelectorExpr::Matchers(e) => e.matchers(),
            LogSelectorExpr::Pipeline(e) => e.matchers(),
        }
    }

    /// Whether a stage of this selector can drop lines
    pub fn has_filter(&self) -> bool {
        match self {
            LogSelectorExpr::Matchers(_) => false,
            LogSelectorExpr::Pipeline(e) => e.has_filter(),
        }
    }

    /// Append a line filter, turning a bare selector into a pipeline
    pub fn add_filter_expr(
        self,
        ty: MatchType,
        function: Option<LineFilterFunction>,
        pattern: impl Into<String>,
    ) -> LogSelectorExpr {
        let filter = StageExpr::LineFilter(LineFilterExpr::with_function(ty, function, pattern));
        match self {
            LogSelectorExpr::Matchers(m) => {
                LogSelectorExpr::Pipeline(PipelineExpr::new(m, vec![filter]))
            }
            LogSelectorExpr::Pipeline(mut p) => {
                p.append_stage(filter);
                LogSelectorExpr::Pipeline(p)
            }
        }
    }
}

impl From<MatchersExpr> for LogSelectorExpr {
    fn from(e: MatchersExpr) -> Self {
        LogSelectorExpr::Matchers(e)
    }
}

impl From<PipelineExpr> for LogSelectorExpr {
    fn from(e: PipelineExpr) -> Self {
        LogSelectorExpr::Pipeline(e)
    }
}

/// Stream selector: the leaf of every query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchersExpr {
    pub(crate) matchers: Vec<Matcher>,
}

impl MatchersExpr {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Inject extra matchers while the query is being assembled
    pub fn append_matchers(&mut self, matchers: impl IntoIterator<Item = Matcher>) {
        self.matchers.extend(matchers);
    }
}

/// Stream selector followed by processing stages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineExpr {
    pub(crate) left: MatchersExpr,
    pub(crate) stages: Vec<StageExpr>,
}

impl PipelineExpr {
    pub fn new(left: MatchersExpr, stages: Vec<StageExpr>) -> Self {
        Self { left, stages }
    }

    pub fn left(&self) -> &MatchersExpr {
        &self.left
    }

    pub fn matchers(&self) -> &[Matcher] {
        self.left.matchers()
    }

    pub fn stages(&self) -> &[StageExpr] {
        &self.stages
    }

    /// Inject a stage while the query is being assembled
    pub fn append_stage(&mut self, stage: StageExpr) {
        self.stages.push(stage);
    }

    pub fn has_filter(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s, StageExpr::LineFilter(_) | StageExpr::LabelFilter(_)))
    }
}

/// One step of a log pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StageExpr {
    /// `|= "error" != "timeout"`
    LineFilter(LineFilterExpr),
    /// `| json`, `| regexp "(?P<status>\\d+)"`
    LabelParser(LabelParserExpr),
    /// `| status >= 500`
    LabelFilter(LabelFilterExpr),
    /// `| line_format "{{.msg}}"`
    LineFmt(LineFmtExpr),
    /// `| label_format dst=src`
    LabelFmt(LabelFmtExpr),
    /// `| json status="response.code"`
    JsonExpressionParser(JsonExpressionParserExpr),
}

/// A chain of line filters, stored right to left: the last filter written
/// is the head and `left` points at the one before it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineFilterExpr {
    pub(crate) left: Option<Box<LineFilterExpr>>,
    pub(crate) ty: MatchType,
    pub(crate) function: Option<LineFilterFunction>,
    pub(crate) pattern: String,
}

impl LineFilterExpr {
    pub fn new(ty: MatchType, pattern: impl Into<String>) -> Self {
        Self::with_function(ty, None, pattern)
    }

    /// `|= ip("10.0.0.0/8")`
    pub fn ip(ty: MatchType, pattern: impl Into<String>) -> Self {
        Self::with_function(ty, Some(LineFilterFunction::Ip), pattern)
    }

    pub fn with_function(
        ty: MatchType,
        function: Option<LineFilterFunction>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            left: None,
            ty,
            function,
            pattern: pattern.into(),
        }
    }

    /// Chain `next` after this filter. `next` becomes the head; this chain is
    /// attached below its last link.
    pub fn then(self, mut next: LineFilterExpr) -> LineFilterExpr {
        attach_left(&mut next, self);
        next
    }

    pub fn left(&self) -> Option<&LineFilterExpr> {
        self.left.as_deref()
    }

    pub fn match_type(&self) -> MatchType {
        self.ty
    }

    pub fn function(&self) -> Option<LineFilterFunction> {
        self.function
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of filters in the chain
    pub fn chain_len(&self) -> usize {
        1 + self.left.as_ref().map_or(0, |l| l.chain_len())
    }
}

fn attach_left(link: &mut LineFilterExpr, left: LineFilterExpr) {
    match &mut link.left {
        Some(next) => attach_left(next, left),
        None => link.left = Some(Box::new(left)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelParserExpr {
    pub(crate) kind: ParserKind,
    pub(crate) param: String,
}

impl LabelParserExpr {
    /// `param` is the regexp or pattern expression; empty for other parsers
    pub fn new(kind: ParserKind, param: impl Into<String>) -> Self {
        Self {
            kind,
            param: param.into(),
        }
    }

    pub fn kind(&self) -> ParserKind {
        self.kind
    }

    pub fn param(&self) -> &str {
        &self.param
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelFilterExpr {
    pub(crate) filter: LabelFilter,
}

impl LabelFilterExpr {
    pub fn new(filter: LabelFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &LabelFilter {
        &self.filter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFmtExpr {
    pub(crate) template: String,
}

impl LineFmtExpr {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelFmtExpr {
    pub(crate) formats: Vec<LabelFmt>,
}

impl LabelFmtExpr {
    pub fn new(formats: Vec<LabelFmt>) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &[LabelFmt] {
        &self.formats
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonExpressionParserExpr {
    pub(crate) expressions: Vec<JsonExpression>,
}

impl JsonExpressionParserExpr {
    pub fn new(expressions: Vec<JsonExpression>) -> Self {
        Self { expressions }
    }

    pub fn expressions(&self) -> &[JsonExpression] {
        &self.expressions
    }
}

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

/// `| unwrap bytes(size) | size > 0`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnwrapExpr {
    pub identifier: String,
    pub conversion: Option<UnwrapConversion>,
    /// Label filters applied to each line before the value is read
    pub post_filters: Vec<LabelFilter>,
}

impl UnwrapExpr {
    pub fn new(identifier: impl Into<String>, conversion: Option<UnwrapConversion>) -> Self {
        Self {
            identifier: identifier.into(),
            conversion,
            post_filters: Vec::new(),
        }
    }

    pub fn with_post_filter(mut self, filter: LabelFilter) -> Self {
        self.post_filters.push(filter);
        self
    }
}

/// ` offset 5m`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetExpr {
    pub offset: Duration,
}

impl OffsetExpr {
    pub fn new(offset: Duration) -> Self {
        Self { offset }
    }
}

/// Time window over a log selector: `{app="api"} | unwrap latency [5m] offset 1h`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRange {
    pub(crate) left: LogSelectorExpr,
    pub(crate) unwrap: Option<UnwrapExpr>,
    pub(crate) interval: Duration,
    pub(crate) offset: Duration,
}

impl LogRange {
    pub fn new(
        left: LogSelectorExpr,
        interval: Duration,
        unwrap: Option<UnwrapExpr>,
        offset: Option<OffsetExpr>,
    ) -> Self {
        Self {
            left,
            unwrap,
            interval,
            offset: offset.map_or(Duration::ZERO, |o| o.offset),
        }
    }

    pub fn left(&self) -> &LogSelectorExpr {
        &self.left
    }

    pub fn unwrap_expr(&self) -> Option<&UnwrapExpr> {
        self.unwrap.as_ref()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }
}

// ---------------------------------------------------------------------------
// Sample expressions
// ---------------------------------------------------------------------------

/// Expression returning a numeric time series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SampleExpr {
    RangeAggregation(Box<RangeAggregationExpr>),
    VectorAggregation(Box<VectorAggregationExpr>),
    BinOp(Box<BinOpExpr>),
    Literal(LiteralExpr),
    LabelReplace(Box<LabelReplaceExpr>),
}

impl SampleExpr {
    /// The log selector the samples are read from; `None` for literals
    pub fn selector(&self) -> Option<&LogSelectorExpr> {
        match self {
            SampleExpr::RangeAggregation(e) => Some(e.left.left()),
            SampleExpr::VectorAggregation(e) => e.left.selector(),
            SampleExpr::BinOp(e) => e.left.selector().or_else(|| e.right.selector()),
            SampleExpr::Literal(_) => None,
            SampleExpr::LabelReplace(e) => e.left.selector(),
        }
    }

    pub fn as_literal(&self) -> Option<&LiteralExpr> {
        match self {
            SampleExpr::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

impl From<RangeAggregationExpr> for SampleExpr {
    fn from(e: RangeAggregationExpr) -> Self {
        SampleExpr::RangeAggregation(Box::new(e))
    }
}

impl From<VectorAggregationExpr> for SampleExpr {
    fn from(e: VectorAggregationExpr) -> Self {
        SampleExpr::VectorAggregation(Box::new(e))
    }
}

impl From<LiteralExpr> for SampleExpr {
    fn from(e: LiteralExpr) -> Self {
        SampleExpr::Literal(e)
    }
}

impl From<LabelReplaceExpr> for SampleExpr {
    fn from(e: LabelReplaceExpr) -> Self {
        SampleExpr::LabelReplace(Box::new(e))
    }
}

/// `by (a, b)` or `without (a, b)`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Grouping {
    pub groups: Vec<String>,
    pub without: bool,
}

impl Grouping {
    pub fn by<S: Into<String>>(groups: impl IntoIterator<Item = S>) -> Self {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            without: false,
        }
    }

    pub fn without<S: Into<String>>(groups: impl IntoIterator<Item = S>) -> Self {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            without: true,
        }
    }

    /// `by ()`: aggregate every series into one
    pub fn is_empty_by(&self) -> bool {
        !self.without && self.groups.is_empty()
    }
}

/// `rate({app="api"}[5m])`, `quantile_over_time(0.99, ... [5m]) by (path)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeAggregationExpr {
    pub(crate) left: LogRange,
    pub(crate) op: RangeOp,
    pub(crate) param: Option<f64>,
    pub(crate) grouping: Option<Grouping>,
}

impl RangeAggregationExpr {
    /// `param` is the parameter as written; only `quantile_over_time` takes one
    pub fn new(
        left: LogRange,
        op: RangeOp,
        grouping: Option<Grouping>,
        param: Option<&str>,
    ) -> Result<Self> {
        let param = match param {
            Some(raw) => {
                if op != RangeOp::QuantileOverTime {
                    return Err(LogqlError::parse(format!(
                        "parameter {} not supported for operation {}",
                        raw, op
                    )));
                }
                let value = raw.trim().parse::<f64>().map_err(|e| {
                    LogqlError::parse(format!("invalid parameter for operation {}: {}", op, e))
                })?;
                Some(value)
            }
            None if op == RangeOp::QuantileOverTime => {
                return Err(LogqlError::parse(format!(
                    "parameter required for operation {}",
                    op
                )));
            }
            None => None,
        };

        let expr = Self {
            left,
            op,
            param,
            grouping,
        };
        expr.validate()?;
        Ok(expr)
    }

    /// Check grouping and unwrap against the operation
    pub fn validate(&self) -> Result<()> {
        if self.grouping.is_some() {
            match self.op {
                RangeOp::AvgOverTime
                | RangeOp::StddevOverTime
                | RangeOp::StdvarOverTime
                | RangeOp::QuantileOverTime
                | RangeOp::MaxOverTime
                | RangeOp::MinOverTime
                | RangeOp::FirstOverTime
                | RangeOp::LastOverTime => {}
                _ => {
                    return Err(LogqlError::parse(format!(
                        "grouping not allowed for {} aggregation",
                        self.op
                    )))
                }
            }
        }

        if self.left.unwrap.is_some() {
            return match self.op {
                RangeOp::AvgOverTime
                | RangeOp::SumOverTime
                | RangeOp::MaxOverTime
                | RangeOp::MinOverTime
                | RangeOp::StddevOverTime
                | RangeOp::StdvarOverTime
                | RangeOp::QuantileOverTime
                | RangeOp::Rate
                | RangeOp::RateCounter
                | RangeOp::AbsentOverTime
                | RangeOp::FirstOverTime
                | RangeOp::LastOverTime => Ok(()),
                _ => Err(LogqlError::parse(format!(
                    "invalid aggregation {} with unwrap",
                    self.op
                ))),
            };
        }

        match self.op {
            RangeOp::BytesOverTime
            | RangeOp::BytesRate
            | RangeOp::CountOverTime
            | RangeOp::Rate
            | RangeOp::AbsentOverTime => Ok(()),
            _ => Err(LogqlError::parse(format!(
                "invalid aggregation {} without unwrap",
                self.op
            ))),
        }
    }

    pub fn left(&self) -> &LogRange {
        &self.left
    }

    pub fn op(&self) -> RangeOp {
        self.op
    }

    pub fn param(&self) -> Option<f64> {
        self.param
    }

    pub fn grouping(&self) -> Option<&Grouping> {
        self.grouping.as_ref()
    }
}

/// `sum by (app) (...)`, `topk(5, ...)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorAggregationExpr {
    pub(crate) left: SampleExpr,
    pub(crate) op: VectorOp,
    pub(crate) grouping: Grouping,
    pub(crate) param: i64,
}

impl VectorAggregationExpr {
    /// topk and bottomk require an integer `param`; other operations reject one.
    /// A missing grouping means `by ()`.
    pub fn new(
        left: SampleExpr,
        op: VectorOp,
        grouping: Option<Grouping>,
        param: Option<&str>,
    ) -> Result<Self> {
        let param = match (op.takes_param(), param) {
            (true, None) => {
                return Err(LogqlError::parse(format!(
                    "parameter required for operation {}",
                    op
                )))
            }
            (true, Some(raw)) => raw.trim().parse::<i64>().map_err(|_| {
                LogqlError::parse(format!("invalid parameter {}({},", op, raw))
            })?,
            (false, Some(raw)) => {
                return Err(LogqlError::parse(format!(
                    "unsupported parameter for operation {}({},",
                    op, raw
                )))
            }
            (false, None) => 0,
        };

        Ok(Self {
            left,
            op,
            grouping: grouping.unwrap_or_default(),
            param,
        })
    }

    pub fn left(&self) -> &SampleExpr {
        &self.left
    }

    pub fn op(&self) -> VectorOp {
        self.op
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    pub fn param(&self) -> i64 {
        self.param
    }
}

/// Which side of a binary operation may match several series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VectorMatchCardinality {
    #[default]
    OneToOne,
    /// `group_left`
    ManyToOne,
    /// `group_right`
    OneToMany,
}

impl VectorMatchCardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMatchCardinality::OneToOne => "one-to-one",
            VectorMatchCardinality::ManyToOne => "many-to-one",
            VectorMatchCardinality::OneToMany => "one-to-many",
        }
    }
}

/// `on (a) group_left (b)`, `ignoring (a)`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VectorMatching {
    pub card: VectorMatchCardinality,
    /// Labels that decide whether two series match
    pub matching_labels: Vec<String>,
    /// `on` when set, `ignoring` otherwise
    pub on: bool,
    /// Labels copied from the side with the lower cardinality
    pub include: Vec<String>,
}

impl VectorMatching {
    pub fn on<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            matching_labels: labels.into_iter().map(Into::into).collect(),
            on: true,
            ..Self::default()
        }
    }

    pub fn ignoring<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            matching_labels: labels.into_iter().map(Into::into).collect(),
            on: false,
            ..Self::default()
        }
    }

    pub fn group_left<S: Into<String>>(mut self, include: impl IntoIterator<Item = S>) -> Self {
        self.card = VectorMatchCardinality::ManyToOne;
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    pub fn group_right<S: Into<String>>(mut self, include: impl IntoIterator<Item = S>) -> Self {
        self.card = VectorMatchCardinality::OneToMany;
        self.include = include.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BinOpOptions {
    /// `bool` modifier on comparisons
    pub return_bool: bool,
    pub vector_matching: Option<VectorMatching>,
}

/// `(left op right)`; never holds two literal legs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinOpExpr {
    pub(crate) left: SampleExpr,
    pub(crate) right: SampleExpr,
    pub(crate) op: BinaryOp,
    pub(crate) opts: Option<BinOpOptions>,
}

impl BinOpExpr {
    /// Build a binary operation. Both legs must be sample expressions; two
    /// literal legs fold into a single literal.
    pub fn new(
        op: BinaryOp,
        opts: Option<BinOpOptions>,
        left: Expr,
        right: Expr,
    ) -> Result<SampleExpr> {
        let left = match left {
            Expr::Sample(e) => e,
            Expr::Log(e) => {
                return Err(LogqlError::parse(format!(
                    "unexpected type for left leg of binary operation ({}): {}",
                    op, e
                )))
            }
        };
        let right = match right {
            Expr::Sample(e) => e,
            Expr::Log(e) => {
                return Err(LogqlError::parse(format!(
                    "unexpected type for right leg of binary operation ({}): {}",
                    op, e
                )))
            }
        };

        if op.is_logical() {
            if let Some(lit) = left.as_literal() {
                return Err(LogqlError::parse(format!(
                    "unexpected literal for left leg of logical/set binary operation ({}): {:.6}",
                    op, lit.value
                )));
            }
            if let Some(lit) = right.as_literal() {
                return Err(LogqlError::parse(format!(
                    "unexpected literal for right leg of logical/set binary operation ({}): {:.6}",
                    op, lit.value
                )));
            }
        }

        if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
            return Ok(SampleExpr::Literal(reduce_bin_op(op, l, r)?));
        }

        Ok(SampleExpr::BinOp(Box::new(Self {
            left,
            right,
            op,
            opts,
        })))
    }

    pub fn left(&self) -> &SampleExpr {
        &self.left
    }

    pub fn right(&self) -> &SampleExpr {
        &self.right
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }

    pub fn opts(&self) -> Option<&BinOpOptions> {
        self.opts.as_ref()
    }

    pub fn vector_matching(&self) -> Option<&VectorMatching> {
        self.opts.as_ref().and_then(|o| o.vector_matching.as_ref())
    }
}

fn reduce_bin_op(op: BinaryOp, left: &LiteralExpr, right: &LiteralExpr) -> Result<LiteralExpr> {
    let merged = merge_bin_op(
        op,
        Some(&Sample::scalar(left.value)),
        Some(&Sample::scalar(right.value)),
        false,
        false,
    )?;
    Ok(LiteralExpr::new(merged.map_or(f64::NAN, |s| s.value)))
}

/// Bare number, only meaningful as a binary operation leg
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiteralExpr {
    pub(crate) value: f64,
}

impl LiteralExpr {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    /// Parse a literal as written, negated when preceded by a unary minus
    pub fn parse(raw: &str, invert: bool) -> Result<Self> {
        let value = raw.trim().parse::<f64>().map_err(|e| {
            LogqlError::parse(format!("unable to parse literal as a float: {}", e))
        })?;
        Ok(Self::new(if invert { -value } else { value }))
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// `label_replace(<expr>, "dst", "$1", "src", "(.*)")`
#[derive(Debug, Clone, Serialize)]
pub struct LabelReplaceExpr {
    pub(crate) left: SampleExpr,
    pub(crate) dst: String,
    pub(crate) replacement: String,
    pub(crate) src: String,
    pub(crate) regex: String,
    #[serde(skip)]
    pub(crate) re: Regex,
}

impl LabelReplaceExpr {
    /// The regex is anchored to the whole source label value
    pub fn new(
        left: SampleExpr,
        dst: impl Into<String>,
        replacement: impl Into<String>,
        src: impl Into<String>,
        regex: impl Into<String>,
    ) -> Result<Self> {
        let regex = regex.into();
        let re = Regex::new(&format!("^(?:{})$", regex))
            .map_err(|e| LogqlError::parse(format!("invalid regex in label_replace: {}", e)))?;
        Ok(Self {
            left,
            dst: dst.into(),
            replacement: replacement.into(),
            src: src.into(),
            regex,
            re,
        })
    }

    pub fn left(&self) -> &SampleExpr {
        &self.left
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn regex(&self) -> &str {
        &self.regex
    }

    /// Compiled, anchored form of [`LabelReplaceExpr::regex`]
    pub fn compiled(&self) -> &Regex {
        &self.re
    }
}

impl PartialEq for LabelReplaceExpr {
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left
            && self.dst == other.dst
            && self.replacement == other.replacement
            && self.src == other.src
            && self.regex == other.regex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_logpipe::LabelFilterType;

    fn selector() -> LogSelectorExpr {
        MatchersExpr::new(vec![Matcher::new(MatchType::Equal, "app", "api").unwrap()]).into()
    }

    fn range(unwrap: Option<UnwrapExpr>) -> LogRange {
        LogRange::new(selector(), Duration::from_secs(300), unwrap, None)
    }

    fn parse_message(err: LogqlError) -> String {
        match err {
            LogqlError::Parse { message, .. } => message,
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_range_aggregation_param_rules() {
        let err = RangeAggregationExpr::new(range(None), RangeOp::Rate, None, Some("0.5")).unwrap_err();
        assert_eq!(parse_message(err), "parameter 0.5 not supported for operation rate");

        let unwrap = Some(UnwrapExpr::new("latency", None));
        let err = RangeAggregationExpr::new(range(unwrap.clone()), RangeOp::QuantileOverTime, None, None)
            .unwrap_err();
        assert_eq!(parse_message(err), "parameter required for operation quantile_over_time");

        let err = RangeAggregationExpr::new(range(unwrap.clone()), RangeOp::QuantileOverTime, None, Some("high"))
            .unwrap_err();
        assert!(parse_message(err).starts_with("invalid parameter for operation quantile_over_time"));

        let ok = RangeAggregationExpr::new(range(unwrap), RangeOp::QuantileOverTime, None, Some("0.99"))
            .unwrap();
        assert_eq!(ok.param(), Some(0.99));
    }

    #[test]
    fn test_range_aggregation_unwrap_rules() {
        let unwrap = Some(UnwrapExpr::new("size", Some(UnwrapConversion::Bytes)));
        let err = RangeAggregationExpr::new(range(unwrap.clone()), RangeOp::BytesOverTime, None, None)
            .unwrap_err();
        assert_eq!(parse_message(err), "invalid aggregation bytes_over_time with unwrap");

        assert!(RangeAggregationExpr::new(range(unwrap), RangeOp::RateCounter, None, None).is_ok());

        let err = RangeAggregationExpr::new(range(None), RangeOp::SumOverTime, None, None).unwrap_err();
        assert_eq!(parse_message(err), "invalid aggregation sum_over_time without unwrap");

        let err = RangeAggregationExpr::new(range(None), RangeOp::RateCounter, None, None).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_range_aggregation_grouping_rules() {
        let err = RangeAggregationExpr::new(
            range(None),
            RangeOp::CountOverTime,
            Some(Grouping::by(["app"])),
            None,
        )
        .unwrap_err();
        assert_eq!(parse_message(err), "grouping not allowed for count_over_time aggregation");

        let unwrap = Some(UnwrapExpr::new("latency", None));
        let expr = RangeAggregationExpr::new(
            range(unwrap),
            RangeOp::MaxOverTime,
            Some(Grouping::by(["app"])),
            None,
        )
        .unwrap();
        assert!(expr.validate().is_ok());
        assert_eq!(expr.grouping(), Some(&Grouping::by(["app"])));
    }

    #[test]
    fn test_vector_aggregation_params() {
        let inner: SampleExpr =
            RangeAggregationExpr::new(range(None), RangeOp::Rate, None, None).unwrap().into();

        let err = VectorAggregationExpr::new(inner.clone(), VectorOp::Topk, None, None).unwrap_err();
        assert_eq!(parse_message(err), "parameter required for operation topk");

        let err = VectorAggregationExpr::new(inner.clone(), VectorOp::Topk, None, Some("1.5")).unwrap_err();
        assert_eq!(parse_message(err), "invalid parameter topk(1.5,");

        let err = VectorAggregationExpr::new(inner.clone(), VectorOp::Sum, None, Some("3")).unwrap_err();
        assert_eq!(parse_message(err), "unsupported parameter for operation sum(3,");

        let topk = VectorAggregationExpr::new(inner.clone(), VectorOp::Bottomk, None, Some("3")).unwrap();
        assert_eq!(topk.param(), 3);

        let sum = VectorAggregationExpr::new(inner, VectorOp::Sum, None, None).unwrap();
        assert!(sum.grouping().is_empty_by());
    }

    #[test]
    fn test_bin_op_folds_literals() {
        let folded = BinOpExpr::new(
            BinaryOp::Mul,
            None,
            SampleExpr::from(LiteralExpr::new(3.0)).into(),
            SampleExpr::from(LiteralExpr::new(4.0)).into(),
        )
        .unwrap();
        assert_eq!(folded, SampleExpr::Literal(LiteralExpr::new(12.0)));

        let folded = BinOpExpr::new(
            BinaryOp::Gt,
            None,
            SampleExpr::from(LiteralExpr::new(1.0)).into(),
            SampleExpr::from(LiteralExpr::new(2.0)).into(),
        )
        .unwrap();
        assert_eq!(folded.as_literal().map(LiteralExpr::value), Some(0.0));
    }

    #[test]
    fn test_bin_op_rejects_bad_legs() {
        let rate: SampleExpr =
            RangeAggregationExpr::new(range(None), RangeOp::Rate, None, None).unwrap().into();

        let err = BinOpExpr::new(BinaryOp::Add, None, selector().into(), rate.clone().into()).unwrap_err();
        assert!(parse_message(err).starts_with("unexpected type for left leg of binary operation (+)"));

        let err = BinOpExpr::new(BinaryOp::Add, None, rate.clone().into(), selector().into()).unwrap_err();
        assert!(parse_message(err).starts_with("unexpected type for right leg of binary operation (+)"));

        let err = BinOpExpr::new(
            BinaryOp::And,
            None,
            rate.clone().into(),
            SampleExpr::from(LiteralExpr::new(1.0)).into(),
        )
        .unwrap_err();
        assert_eq!(
            parse_message(err),
            "unexpected literal for right leg of logical/set binary operation (and): 1.000000"
        );

        let err = BinOpExpr::new(
            BinaryOp::Unless,
            None,
            SampleExpr::from(LiteralExpr::new(2.0)).into(),
            rate.into(),
        )
        .unwrap_err();
        assert!(parse_message(err).starts_with("unexpected literal for left leg"));
    }

    #[test]
    fn test_literal_parse() {
        assert_eq!(LiteralExpr::parse("2.5", false).unwrap().value(), 2.5);
        assert_eq!(LiteralExpr::parse("2.5", true).unwrap().value(), -2.5);
        let err = LiteralExpr::parse("two", false).unwrap_err();
        assert!(parse_message(err).starts_with("unable to parse literal as a float"));

        let lit = Expr::Sample(LiteralExpr::new(1.0).into());
        assert!(lit.ensure_query().is_err());
        assert!(Expr::Log(selector()).ensure_query().is_ok());
    }

    #[test]
    fn test_label_replace_regex() {
        let inner: SampleExpr =
            RangeAggregationExpr::new(range(None), RangeOp::Rate, None, None).unwrap().into();
        let expr = LabelReplaceExpr::new(inner.clone(), "dst", "$1", "src", "api-(.*)").unwrap();
        assert!(expr.compiled().is_match("api-gateway"));
        assert!(!expr.compiled().is_match("my-api-gateway"));

        let err = LabelReplaceExpr::new(inner, "dst", "$1", "src", "(").unwrap_err();
        assert!(parse_message(err).starts_with("invalid regex in label_replace"));
    }

    #[test]
    fn test_add_filter_expr() {
        let expr = selector().add_filter_expr(MatchType::Equal, None, "error");
        assert!(expr.has_filter());
        let expr = expr.add_filter_expr(MatchType::NotEqual, Some(LineFilterFunction::Ip), "10.0.0.1");
        match &expr {
            LogSelectorExpr::Pipeline(p) => assert_eq!(p.stages().len(), 2),
            other => panic!("Expected pipeline, got {:?}", other),
        }
        assert_eq!(expr.matchers().len(), 1);
    }

    #[test]
    fn test_mutation_points() {
        let mut m = MatchersExpr::new(vec![]);
        m.append_matchers(vec![Matcher::new(MatchType::Equal, "ns", "prod").unwrap()]);
        assert_eq!(m.matchers().len(), 1);

        let mut p = PipelineExpr::new(m, vec![]);
        assert!(!p.has_filter());
        p.append_stage(StageExpr::LabelParser(LabelParserExpr::new(ParserKind::Json, "")));
        assert!(!p.has_filter());
        p.append_stage(StageExpr::LabelFilter(LabelFilterExpr::new(LabelFilter::numeric(
            "status",
            LabelFilterType::GreaterThan,
            499.0,
        ))));
        assert!(p.has_filter());
    }

    #[test]
    fn test_line_filter_chain() {
        let chain = LineFilterExpr::new(MatchType::Equal, "a")
            .then(LineFilterExpr::new(MatchType::Equal, "b"))
            .then(LineFilterExpr::new(MatchType::NotEqual, "c"));
        assert_eq!(chain.chain_len(), 3);
        assert_eq!(chain.pattern(), "c");
        assert_eq!(chain.left().map(LineFilterExpr::pattern), Some("b"));
        assert_eq!(
            chain.left().and_then(LineFilterExpr::left).map(LineFilterExpr::pattern),
            Some("a")
        );
    }

    #[test]
    fn test_selector_of_bin_op() {
        let rate: SampleExpr =
            RangeAggregationExpr::new(range(None), RangeOp::Rate, None, None).unwrap().into();
        let expr = BinOpExpr::new(
            BinaryOp::Div,
            None,
            SampleExpr::from(LiteralExpr::new(1.0)).into(),
            rate.into(),
        )
        .unwrap();
        assert_eq!(expr.selector().map(|s| s.matchers().len()), Some(1));
        assert!(SampleExpr::from(LiteralExpr::new(1.0)).selector().is_none());
    }
}
