//! Shardability analysis
//!
//! A subtree is shardable when evaluating it independently on every shard
//! and merging the partial results gives the same answer as evaluating it
//! once over all data.

use crate::ast::*;
use crate::ops::{is_shardable_op, VectorOp};
use crate::walk::{Node, Walkable};
use tracing::trace;

impl Expr {
    pub fn shardable(&self) -> bool {
        match self {
            Expr::Log(e) => e.shardable(),
            Expr::Sample(e) => e.shardable(),
        }
    }
}

impl LogSelectorExpr {
    pub fn shardable(&self) -> bool {
        match self {
            LogSelectorExpr::Matchers(e) => e.shardable(),
            LogSelectorExpr::Pipeline(e) => e.shardable(),
        }
    }
}

impl MatchersExpr {
    pub fn shardable(&self) -> bool {
        true
    }
}

impl PipelineExpr {
    pub fn shardable(&self) -> bool {
        self.stages.iter().all(StageExpr::shardable)
    }
}

impl StageExpr {
    /// Every stage except `label_format`, which can merge series by rewriting labels
    pub fn shardable(&self) -> bool {
        !matches!(self, StageExpr::LabelFmt(_))
    }
}

impl LogRange {
    pub fn shardable(&self) -> bool {
        self.left.shardable()
    }
}

impl SampleExpr {
    pub fn shardable(&self) -> bool {
        match self {
            SampleExpr::RangeAggregation(e) => e.shardable(),
            SampleExpr::VectorAggregation(e) => e.shardable(),
            SampleExpr::BinOp(e) => e.shardable(),
            SampleExpr::Literal(_) => true,
            SampleExpr::LabelReplace(_) => false,
        }
    }
}

impl RangeAggregationExpr {
    pub fn shardable(&self) -> bool {
        let shardable = is_shardable_op(self.op.as_str()) && self.left.shardable();
        trace!(op = %self.op, shardable, "range aggregation shardability");
        shardable
    }
}

impl VectorAggregationExpr {
    pub fn shardable(&self) -> bool {
        let shardable = match self.op {
            // A parser anywhere below may produce label sets that collapse
            // differently per shard, counting distinct series twice.
            VectorOp::Count | VectorOp::Avg => {
                self.left.shardable()
                    && !self
                        .left
                        .any_node(&mut |node| matches!(node, Node::LabelParser(_)))
            }
            _ => is_shardable_op(self.op.as_str()) && self.left.shardable(),
        };
        trace!(op = %self.op, shardable, "vector aggregation shardability");
        shardable
    }
}

impl BinOpExpr {
    pub fn shardable(&self) -> bool {
        // on/ignoring/group_* change the label grouping of the result
        if self.vector_matching().is_some() {
            trace!(op = %self.op, "binary operation with vector matching is not shardable");
            return false;
        }
        let shardable =
            is_shardable_op(self.op.as_str()) && self.left.shardable() && self.right.shardable();
        trace!(op = %self.op, shardable, "binary operation shardability");
        shardable
    }
}

impl LiteralExpr {
    pub fn shardable(&self) -> bool {
        true
    }
}

impl LabelReplaceExpr {
    pub fn shardable(&self) -> bool {
        false
    }
}
