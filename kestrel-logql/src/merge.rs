//! Sample arithmetic for binary operations
//!
//! [`merge_bin_op`] is used to fold literal pairs while a tree is built and
//! by evaluators to combine the two legs of a binary operation at each step.

use crate::error::{LogqlError, Result};
use crate::ops::BinaryOp;
use kestrel_logpipe::Labels;
use serde::Serialize;

/// One point of a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub metric: Labels,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(metric: Labels, timestamp: i64, value: f64) -> Self {
        Self {
            metric,
            timestamp,
            value,
        }
    }

    /// Sample without labels or timestamp, as produced by a literal
    pub fn scalar(value: f64) -> Self {
        Self::new(Labels::new(), 0, value)
    }
}

/// Merge two samples of a binary operation.
///
/// The result keeps the left sample's labels and timestamp. A missing leg
/// yields no sample. Comparisons produce 1 or 0; with `filter` set a failing
/// comparison yields no sample and a passing one keeps the left value. With
/// both `filter` and `is_vector_comparison` set, any produced sample is
/// replaced by the left sample itself. Set operators have no sample
/// arithmetic and are rejected.
pub fn merge_bin_op(
    op: BinaryOp,
    left: Option<&Sample>,
    right: Option<&Sample>,
    filter: bool,
    is_vector_comparison: bool,
) -> Result<Option<Sample>> {
    if op.is_logical() {
        return Err(LogqlError::UnsupportedMerge {
            op: op.to_string(),
        });
    }

    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => return Ok(None),
    };
    let (l, r) = (left.value, right.value);

    let value = if op.is_comparison() {
        let pass = match op {
            BinaryOp::Eq => l == r,
            BinaryOp::Neq => l != r,
            BinaryOp::Gt => l > r,
            BinaryOp::Gte => l >= r,
            BinaryOp::Lt => l < r,
            _ => l <= r,
        };
        match (pass, filter) {
            (true, true) => l,
            (true, false) => 1.0,
            (false, true) => return Ok(None),
            (false, false) => 0.0,
        }
    } else {
        match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div if r == 0.0 => f64::NAN,
            BinaryOp::Div => l / r,
            BinaryOp::Mod if r == 0.0 => f64::NAN,
            // same sign as the dividend, like fmod
            BinaryOp::Mod => l % r,
            _ => l.powf(r),
        }
    };

    if filter && is_vector_comparison {
        return Ok(Some(left.clone()));
    }

    Ok(Some(Sample {
        metric: left.metric.clone(),
        timestamp: left.timestamp,
        value,
    }))
}
