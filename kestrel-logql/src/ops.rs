//! Operation names of the query language and the shardable-operation table

use crate::error::{LogqlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Operations whose per-shard partial results can be recombined into the
// global result. The sample operation must be associative (`+`, `*`, but not
// `/`, `%`, `^`), and a vector aggregation over it must distribute over the
// shards. topk, bottomk, max and min at the vector level are excluded: each
// shard would keep its own extremes and the global ones could be discarded.
// avg is listed because it is evaluated as sum/count.
const SHARDABLE_OPS: &[&str] = &[
    // vector ops
    "sum",
    "avg",
    "count",
    // range vector ops
    "count_over_time",
    "rate",
    "bytes_over_time",
    "bytes_rate",
    "sum_over_time",
    "max_over_time",
    "min_over_time",
    // binops - arith
    "+",
    "*",
];

/// Whether the named operation can be evaluated per shard and merged
pub fn is_shardable_op(op: &str) -> bool {
    SHARDABLE_OPS.contains(&op)
}

/// Range vector aggregation over a log range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeOp {
    CountOverTime,
    Rate,
    RateCounter,
    BytesOverTime,
    BytesRate,
    AvgOverTime,
    SumOverTime,
    MinOverTime,
    MaxOverTime,
    StdvarOverTime,
    StddevOverTime,
    QuantileOverTime,
    FirstOverTime,
    LastOverTime,
    AbsentOverTime,
}

impl RangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::CountOverTime => "count_over_time",
            RangeOp::Rate => "rate",
            RangeOp::RateCounter => "rate_counter",
            RangeOp::BytesOverTime => "bytes_over_time",
            RangeOp::BytesRate => "bytes_rate",
            RangeOp::AvgOverTime => "avg_over_time",
            RangeOp::SumOverTime => "sum_over_time",
            RangeOp::MinOverTime => "min_over_time",
            RangeOp::MaxOverTime => "max_over_time",
            RangeOp::StdvarOverTime => "stdvar_over_time",
            RangeOp::StddevOverTime => "stddev_over_time",
            RangeOp::QuantileOverTime => "quantile_over_time",
            RangeOp::FirstOverTime => "first_over_time",
            RangeOp::LastOverTime => "last_over_time",
            RangeOp::AbsentOverTime => "absent_over_time",
        }
    }

    pub fn all() -> &'static [RangeOp] {
        &[
            RangeOp::CountOverTime,
            RangeOp::Rate,
            RangeOp::RateCounter,
            RangeOp::BytesOverTime,
            RangeOp::BytesRate,
            RangeOp::AvgOverTime,
            RangeOp::SumOverTime,
            RangeOp::MinOverTime,
            RangeOp::MaxOverTime,
            RangeOp::StdvarOverTime,
            RangeOp::StddevOverTime,
            RangeOp::QuantileOverTime,
            RangeOp::FirstOverTime,
            RangeOp::LastOverTime,
            RangeOp::AbsentOverTime,
        ]
    }
}

/// Vector aggregation across series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorOp {
    Sum,
    Avg,
    Max,
    Min,
    Count,
    Stddev,
    Stdvar,
    Bottomk,
    Topk,
}

impl VectorOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorOp::Sum => "sum",
            VectorOp::Avg => "avg",
            VectorOp::Max => "max",
            VectorOp::Min => "min",
            VectorOp::Count => "count",
            VectorOp::Stddev => "stddev",
            VectorOp::Stdvar => "stdvar",
            VectorOp::Bottomk => "bottomk",
            VectorOp::Topk => "topk",
        }
    }

    pub fn all() -> &'static [VectorOp] {
        &[
            VectorOp::Sum,
            VectorOp::Avg,
            VectorOp::Max,
            VectorOp::Min,
            VectorOp::Count,
            VectorOp::Stddev,
            VectorOp::Stdvar,
            VectorOp::Bottomk,
            VectorOp::Topk,
        ]
    }

    /// topk and bottomk take an integer parameter
    pub fn takes_param(&self) -> bool {
        matches!(self, VectorOp::Bottomk | VectorOp::Topk)
    }
}

/// Binary operator between two sample expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Logical/set
    Or,
    And,
    Unless,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    // Comparison
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Unless => "unless",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
        }
    }

    pub fn all() -> &'static [BinaryOp] {
        &[
            BinaryOp::Or,
            BinaryOp::And,
            BinaryOp::Unless,
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Mod,
            BinaryOp::Pow,
            BinaryOp::Eq,
            BinaryOp::Neq,
            BinaryOp::Gt,
            BinaryOp::Gte,
            BinaryOp::Lt,
            BinaryOp::Lte,
        ]
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Gt | BinaryOp::Gte | BinaryOp::Lt | BinaryOp::Lte
        )
    }

    /// and, or, unless
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And | BinaryOp::Unless)
    }

    pub fn is_arithmetic(&self) -> bool {
        !self.is_comparison() && !self.is_logical()
    }
}

/// Conversion applied to an unwrapped label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnwrapConversion {
    Bytes,
    Duration,
    DurationSeconds,
}

impl UnwrapConversion {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnwrapConversion::Bytes => "bytes",
            UnwrapConversion::Duration => "duration",
            UnwrapConversion::DurationSeconds => "duration_seconds",
        }
    }
}

/// Named predicate function of a line filter (`|= ip("10.0.0.0/8")`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineFilterFunction {
    Ip,
}

impl LineFilterFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineFilterFunction::Ip => "ip",
        }
    }
}

macro_rules! named_op {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = LogqlError;

            fn from_str(s: &str) -> Result<Self> {
                $(
                    if s == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(LogqlError::parse(format!("unknown {}: {}", $kind, s)))
            }
        }
    };
}

named_op!(RangeOp, "range vector operation", [
    CountOverTime, Rate, RateCounter, BytesOverTime, BytesRate, AvgOverTime, SumOverTime,
    MinOverTime, MaxOverTime, StdvarOverTime, StddevOverTime, QuantileOverTime,
    FirstOverTime, LastOverTime, AbsentOverTime,
]);
named_op!(VectorOp, "vector operation", [
    Sum, Avg, Max, Min, Count, Stddev, Stdvar, Bottomk, Topk,
]);
named_op!(BinaryOp, "binary operation", [
    Or, And, Unless, Add, Sub, Mul, Div, Mod, Pow, Eq, Neq, Gt, Gte, Lt, Lte,
]);
named_op!(UnwrapConversion, "unwrap conversion", [Bytes, Duration, DurationSeconds]);
named_op!(LineFilterFunction, "line filter function", [Ip]);
