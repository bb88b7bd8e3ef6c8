//! Data windows read by a query
//!
//! Planners use these to decide which streams and time ranges to fetch.

use crate::ast::*;
use kestrel_logpipe::Matcher;
use serde::Serialize;
use std::time::Duration;

/// Stream matchers read over `interval`, shifted back by `offset`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatcherRange {
    pub matchers: Vec<Matcher>,
    pub interval: Duration,
    pub offset: Duration,
}

impl SampleExpr {
    /// Windows read by this expression, left leg first
    pub fn matcher_groups(&self) -> Vec<MatcherRange> {
        match self {
            SampleExpr::RangeAggregation(e) => e.matcher_groups(),
            SampleExpr::VectorAggregation(e) => e.left.matcher_groups(),
            SampleExpr::BinOp(e) => {
                let mut groups = e.left.matcher_groups();
                groups.extend(e.right.matcher_groups());
                groups
            }
            SampleExpr::Literal(_) => Vec::new(),
            SampleExpr::LabelReplace(e) => e.left.matcher_groups(),
        }
    }
}

impl RangeAggregationExpr {
    pub fn matcher_groups(&self) -> Vec<MatcherRange> {
        let matchers = self.left.left.matchers();
        if matchers.is_empty() {
            return Vec::new();
        }
        vec![MatcherRange {
            matchers: matchers.to_vec(),
            interval: self.left.interval,
            offset: self.left.offset,
        }]
    }
}

/// Windows read by any expression. A log query reads its matchers with no
/// interval or offset.
pub fn matcher_groups(expr: &Expr) -> Vec<MatcherRange> {
    match expr {
        Expr::Sample(e) => e.matcher_groups(),
        Expr::Log(e) => {
            let matchers = e.matchers();
            if matchers.is_empty() {
                return Vec::new();
            }
            vec![MatcherRange {
                matchers: matchers.to_vec(),
                interval: Duration::ZERO,
                offset: Duration::ZERO,
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{BinaryOp, RangeOp, VectorOp};
    use kestrel_logpipe::MatchType;

    fn selector(app: &str) -> LogSelectorExpr {
        MatchersExpr::new(vec![Matcher::new(MatchType::Equal, "app", app).unwrap()]).into()
    }

    fn rate(app: &str, offset: Option<OffsetExpr>) -> SampleExpr {
        let range = LogRange::new(selector(app), Duration::from_secs(300), None, offset);
        RangeAggregationExpr::new(range, RangeOp::Rate, None, None)
            .unwrap()
            .into()
    }

    #[test]
    fn test_log_selector_groups() {
        let groups = matcher_groups(&Expr::Log(selector("api")));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].interval, Duration::ZERO);
        assert_eq!(groups[0].matchers[0].value(), "api");

        let empty = MatchersExpr::new(vec![]).into();
        assert!(matcher_groups(&Expr::Log(empty)).is_empty());
    }

    #[test]
    fn test_bin_op_groups_in_order() {
        let left = VectorAggregationExpr::new(rate("api", None), VectorOp::Sum, None, None).unwrap();
        let right = rate("db", Some(OffsetExpr::new(Duration::from_secs(3600))));
        let expr = BinOpExpr::new(BinaryOp::Div, None, SampleExpr::from(left).into(), right.into()).unwrap();

        let groups = matcher_groups(&Expr::Sample(expr));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].matchers[0].value(), "api");
        assert_eq!(groups[0].offset, Duration::ZERO);
        assert_eq!(groups[1].matchers[0].value(), "db");
        assert_eq!(groups[1].interval, Duration::from_secs(300));
        assert_eq!(groups[1].offset, Duration::from_secs(3600));
    }

    #[test]
    fn test_literal_has_no_groups() {
        let expr = BinOpExpr::new(
            BinaryOp::Mul,
            None,
            SampleExpr::from(LiteralExpr::new(2.0)).into(),
            rate("api", None).into(),
        )
        .unwrap();
        assert_eq!(expr.matcher_groups().len(), 1);
        assert!(SampleExpr::from(LiteralExpr::new(2.0)).matcher_groups().is_empty());
    }
}
