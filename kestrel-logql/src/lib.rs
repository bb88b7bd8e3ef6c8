//! Kestrel LogQL
//!
//! Expression layer of the LogQL query language: the syntax tree, its
//! construction-time validation, canonical rendering, shardability analysis
//! and compilation into log pipelines and sample extractors.

pub mod ast;
pub mod error;
pub mod matchers;
pub mod merge;
pub mod ops;
pub mod pipeline;
pub mod render;
pub mod shard;
pub mod walk;

// Re-exports
pub use ast::{
    BinOpExpr, BinOpOptions, Expr, Grouping, JsonExpressionParserExpr, LabelFilterExpr,
    LabelFmtExpr, LabelParserExpr, LabelReplaceExpr, LineFilterExpr, LineFmtExpr, LiteralExpr,
    LogRange, LogSelectorExpr, MatchersExpr, OffsetExpr, PipelineExpr, RangeAggregationExpr,
    SampleExpr, StageExpr, UnwrapExpr, VectorAggregationExpr, VectorMatchCardinality,
    VectorMatching,
};
pub use error::{LogqlError, Result};
pub use matchers::{matcher_groups, MatcherRange};
pub use merge::{merge_bin_op, Sample};
pub use ops::{is_shardable_op, BinaryOp, LineFilterFunction, RangeOp, UnwrapConversion, VectorOp};
pub use walk::{Node, Walkable};
