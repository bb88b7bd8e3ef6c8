//! Depth-first traversal of expression trees
//!
//! Every node is visited exactly once, parent before children, children in
//! the order they are written (matchers before stages, left leg before right).

use crate::ast::*;
use std::ops::ControlFlow;

/// A borrowed node of an expression tree
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Matchers(&'a MatchersExpr),
    Pipeline(&'a PipelineExpr),
    LineFilter(&'a LineFilterExpr),
    LabelParser(&'a LabelParserExpr),
    LabelFilter(&'a LabelFilterExpr),
    LineFmt(&'a LineFmtExpr),
    LabelFmt(&'a LabelFmtExpr),
    JsonExpressionParser(&'a JsonExpressionParserExpr),
    LogRange(&'a LogRange),
    RangeAggregation(&'a RangeAggregationExpr),
    VectorAggregation(&'a VectorAggregationExpr),
    BinOp(&'a BinOpExpr),
    Literal(&'a LiteralExpr),
    LabelReplace(&'a LabelReplaceExpr),
}

pub trait Walkable {
    /// Visit nodes in pre-order until `f` breaks
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()>;

    /// Visit this node and all of its descendants in pre-order
    fn walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>)) {
        let _ = self.try_walk(&mut |node| {
            f(node);
            ControlFlow::Continue(())
        });
    }

    /// Whether any node of the subtree satisfies `pred`; stops at the first match
    fn any_node(&self, pred: &mut dyn FnMut(Node<'_>) -> bool) -> bool {
        self.try_walk(&mut |node| {
            if pred(node) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .is_break()
    }
}

impl Walkable for Expr {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        match self {
            Expr::Log(e) => e.try_walk(f),
            Expr::Sample(e) => e.try_walk(f),
        }
    }
}

impl Walkable for LogSelectorExpr {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        match self {
            LogSelectorExpr::Matchers(e) => e.try_walk(f),
            LogSelectorExpr::Pipeline(e) => e.try_walk(f),
        }
    }
}

impl Walkable for MatchersExpr {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        f(Node::Matchers(self))
    }
}

impl Walkable for PipelineExpr {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        f(Node::Pipeline(self))?;
        self.left.try_walk(f)?;
        for stage in &self.stages {
            stage.try_walk(f)?;
        }
        ControlFlow::Continue(())
    }
}

impl Walkable for StageExpr {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        match self {
            StageExpr::LineFilter(e) => e.try_walk(f),
            StageExpr::LabelParser(e) => f(Node::LabelParser(e)),
            StageExpr::LabelFilter(e) => f(Node::LabelFilter(e)),
            StageExpr::LineFmt(e) => f(Node::LineFmt(e)),
            StageExpr::LabelFmt(e) => f(Node::LabelFmt(e)),
            StageExpr::JsonExpressionParser(e) => f(Node::JsonExpressionParser(e)),
        }
    }
}

impl Walkable for LineFilterExpr {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        f(Node::LineFilter(self))?;
        match &self.left {
            Some(left) => left.try_walk(f),
            None => ControlFlow::Continue(()),
        }
    }
}

impl Walkable for LogRange {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        f(Node::LogRange(self))?;
        self.left.try_walk(f)
    }
}

impl Walkable for SampleExpr {
    fn try_walk<'a>(&'a self, f: &mut dyn FnMut(Node<'a>) -> ControlFlow<()>) -> ControlFlow<()> {
        match self {
            SampleExpr::RangeAggregation(e) => {
                f(Node::RangeAggregation(e))?;
                e.left.try_walk(f)
            }
            SampleExpr::VectorAggregation(e) => {
                f(Node::VectorAggregation(e))?;
                e.left.try_walk(f)
            }
            SampleExpr::BinOp(e) => {
                f(Node::BinOp(e))?;
                e.left.try_walk(f)?;
                e.right.try_walk(f)
            }
            SampleExpr::Literal(e) => f(Node::Literal(e)),
            SampleExpr::LabelReplace(e) => {
                f(Node::LabelReplace(e))?;
                e.left.try_walk(f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{BinaryOp, RangeOp, VectorOp};
    use kestrel_logpipe::{MatchType, Matcher, ParserKind};
    use std::time::Duration;

    fn kind(node: Node<'_>) -> &'static str {
        match node {
            Node::Matchers(_) => "matchers",
            Node::Pipeline(_) => "pipeline",
            Node::LineFilter(_) => "line_filter",
            Node::LabelParser(_) => "label_parser",
            Node::LabelFilter(_) => "label_filter",
            Node::LineFmt(_) => "line_fmt",
            Node::LabelFmt(_) => "label_fmt",
            Node::JsonExpressionParser(_) => "json_expression",
            Node::LogRange(_) => "log_range",
            Node::RangeAggregation(_) => "range_aggregation",
            Node::VectorAggregation(_) => "vector_aggregation",
            Node::BinOp(_) => "bin_op",
            Node::Literal(_) => "literal",
            Node::LabelReplace(_) => "label_replace",
        }
    }

    fn rate_of(selector: LogSelectorExpr) -> SampleExpr {
        let range = LogRange::new(selector, Duration::from_secs(60), None, None);
        RangeAggregationExpr::new(range, RangeOp::CountOverTime, None, None)
            .unwrap()
            .into()
    }

    #[test]
    fn test_walk_pre_order() {
        let matchers = MatchersExpr::new(vec![Matcher::new(MatchType::Equal, "app", "api").unwrap()]);
        let chain = LineFilterExpr::new(MatchType::Equal, "a").then(LineFilterExpr::new(MatchType::Equal, "b"));
        let pipeline = PipelineExpr::new(
            matchers.clone(),
            vec![
                StageExpr::LineFilter(chain),
                StageExpr::LabelParser(LabelParserExpr::new(ParserKind::Json, "")),
            ],
        );
        let sum = VectorAggregationExpr::new(rate_of(pipeline.into()), VectorOp::Sum, None, None).unwrap();
        let expr = BinOpExpr::new(
            BinaryOp::Add,
            None,
            SampleExpr::from(sum).into(),
            rate_of(matchers.into()).into(),
        )
        .unwrap();

        let mut visited = Vec::new();
        expr.walk(&mut |node| visited.push(kind(node)));
        assert_eq!(
            visited,
            vec![
                "bin_op",
                "vector_aggregation",
                "range_aggregation",
                "log_range",
                "pipeline",
                "matchers",
                "line_filter",
                "line_filter",
                "label_parser",
                "range_aggregation",
                "log_range",
                "matchers",
            ]
        );
    }

    #[test]
    fn test_any_node() {
        let matchers = MatchersExpr::new(vec![]);
        let pipeline = PipelineExpr::new(
            matchers,
            vec![StageExpr::LabelParser(LabelParserExpr::new(ParserKind::Logfmt, ""))],
        );
        let expr = rate_of(pipeline.into());
        assert!(expr.any_node(&mut |n| matches!(n, Node::LabelParser(_))));
        assert!(!expr.any_node(&mut |n| matches!(n, Node::LabelFmt(_))));
        assert!(SampleExpr::from(LiteralExpr::new(1.0)).any_node(&mut |n| matches!(n, Node::Literal(_))));
    }

    #[test]
    fn test_any_node_stops_at_first_match() {
        let matchers = MatchersExpr::new(vec![Matcher::new(MatchType::Equal, "app", "api").unwrap()]);
        let expr = BinOpExpr::new(
            BinaryOp::Add,
            None,
            rate_of(matchers.clone().into()).into(),
            rate_of(matchers.into()).into(),
        )
        .unwrap();

        let mut visited = 0;
        let found = expr.any_node(&mut |n| {
            visited += 1;
            matches!(n, Node::RangeAggregation(_))
        });
        assert!(found);
        // bin_op, then the left range aggregation
        assert_eq!(visited, 2);

        let mut total = 0;
        expr.walk(&mut |_| total += 1);
        assert_eq!(total, 7);
    }
}
