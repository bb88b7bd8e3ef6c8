//! Canonical query text of every node
//!
//! Rendered text parses back into an equivalent tree: strings are quoted,
//! binary operations parenthesized and modifiers that change shardability
//! (vector matching, an explicit empty `by ()`) are always written out.

use crate::ast::*;
use crate::ops::VectorOp;
use kestrel_logpipe::format::{format_float, format_go_duration, format_prometheus_duration, quote};
use kestrel_logpipe::MatchType;
use std::fmt;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Log(e) => write!(f, "{}", e),
            Expr::Sample(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for LogSelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSelectorExpr::Matchers(e) => write!(f, "{}", e),
            LogSelectorExpr::Pipeline(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for MatchersExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", m)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for PipelineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.left)?;
        for stage in &self.stages {
            write!(f, " {}", stage)?;
        }
        Ok(())
    }
}

impl fmt::Display for StageExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageExpr::LineFilter(e) => write!(f, "{}", e),
            StageExpr::LabelParser(e) => write!(f, "{}", e),
            StageExpr::LabelFilter(e) => write!(f, "{}", e),
            StageExpr::LineFmt(e) => write!(f, "{}", e),
            StageExpr::LabelFmt(e) => write!(f, "{}", e),
            StageExpr::JsonExpressionParser(e) => write!(f, "{}", e),
        }
    }
}

fn line_filter_operator(ty: MatchType) -> &'static str {
    match ty {
        MatchType::Equal => "|=",
        MatchType::NotEqual => "!=",
        MatchType::Regexp => "|~",
        MatchType::NotRegexp => "!~",
    }
}

impl fmt::Display for LineFilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(left) = &self.left {
            write!(f, "{} ", left)?;
        }
        write!(f, "{} ", line_filter_operator(self.ty))?;
        match self.function {
            Some(function) => write!(f, "{}({})", function, quote(&self.pattern)),
            None => f.write_str(&quote(&self.pattern)),
        }
    }
}

impl fmt::Display for LabelParserExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "| {}", self.kind)?;
        if self.kind.takes_param() || !self.param.is_empty() {
            write!(f, " {}", quote(&self.param))?;
        }
        Ok(())
    }
}

impl fmt::Display for LabelFilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "| {}", self.filter)
    }
}

impl fmt::Display for LineFmtExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "| line_format {}", quote(&self.template))
    }
}

impl fmt::Display for LabelFmtExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("| label_format ")?;
        for (i, rule) in self.formats.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if rule.rename {
                write!(f, "{}={}", rule.name, rule.value)?;
            } else {
                write!(f, "{}={}", rule.name, quote(&rule.value))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for JsonExpressionParserExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("| json ")?;
        for (i, exp) in self.expressions.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", exp.identifier, quote(&exp.expression))?;
        }
        Ok(())
    }
}

impl fmt::Display for UnwrapExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.conversion {
            Some(conv) => write!(f, " | unwrap {}({})", conv, self.identifier)?,
            None => write!(f, " | unwrap {}", self.identifier)?,
        }
        for filter in &self.post_filters {
            write!(f, " | {}", filter)?;
        }
        Ok(())
    }
}

impl fmt::Display for OffsetExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " offset {}", format_go_duration(self.offset))
    }
}

impl fmt::Display for LogRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.left)?;
        if let Some(unwrap) = &self.unwrap {
            write!(f, "{}", unwrap)?;
        }
        write!(f, "[{}]", format_prometheus_duration(self.interval))?;
        if !self.offset.is_zero() {
            write!(f, "{}", OffsetExpr::new(self.offset))?;
        }
        Ok(())
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.without {
            write!(f, " without({})", self.groups.join(","))
        } else if !self.groups.is_empty() {
            write!(f, " by({})", self.groups.join(","))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for SampleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleExpr::RangeAggregation(e) => write!(f, "{}", e),
            SampleExpr::VectorAggregation(e) => write!(f, "{}", e),
            SampleExpr::BinOp(e) => write!(f, "{}", e),
            SampleExpr::Literal(e) => write!(f, "{}", e),
            SampleExpr::LabelReplace(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for RangeAggregationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op)?;
        if let Some(param) = self.param {
            write!(f, "{},", format_float(param))?;
        }
        write!(f, "{})", self.left)?;
        match &self.grouping {
            // `by ()` drops every label from the extracted samples
            Some(g) if g.is_empty_by() => f.write_str(" by()"),
            Some(g) => write!(f, "{}", g),
            None => Ok(()),
        }
    }
}

impl fmt::Display for VectorAggregationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}(", self.op, self.grouping)?;
        if matches!(self.op, VectorOp::Topk | VectorOp::Bottomk) {
            write!(f, "{},", self.param)?;
        }
        write!(f, "{})", self.left)
    }
}

impl fmt::Display for VectorMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on = if self.on { "on" } else { "ignoring" };
        write!(f, "{}({})", on, self.matching_labels.join(","))?;
        let group = match self.card {
            VectorMatchCardinality::OneToOne => return Ok(()),
            VectorMatchCardinality::ManyToOne => "group_left",
            VectorMatchCardinality::OneToMany => "group_right",
        };
        if self.include.is_empty() {
            write!(f, " {}", group)
        } else {
            write!(f, " {}({})", group, self.include.join(","))
        }
    }
}

impl fmt::Display for BinOpExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {}", self.left, self.op)?;
        if let Some(opts) = &self.opts {
            if opts.return_bool {
                f.write_str(" bool")?;
            }
            if let Some(vm) = &opts.vector_matching {
                write!(f, " {}", vm)?;
            }
        }
        write!(f, " {})", self.right)
    }
}

impl fmt::Display for LiteralExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_float(self.value))
    }
}

impl fmt::Display for LabelReplaceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "label_replace({},{},{},{},{})",
            self.left,
            quote(&self.dst),
            quote(&self.replacement),
            quote(&self.src),
            quote(&self.regex)
        )
    }
}
