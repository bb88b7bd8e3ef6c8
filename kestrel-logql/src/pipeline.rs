//! Pipeline and sample extractor compilation
//!
//! Stages are built through the caller's [`StageFactory`]. Stages that turn
//! out to be no-ops are dropped, and any stage failure is reported with the
//! stage's query text.

use crate::ast::*;
use crate::error::{LogqlError, Result};
use crate::ops::{LineFilterFunction, RangeOp, UnwrapConversion, VectorOp};
use kestrel_logpipe::{
    AndFilter, ConversionOp, ExtractorKind, FilterStage, Filterer, LabelFilter, Pipeline,
    SampleExtractor, Stage, StageFactory,
};
use tracing::{debug, trace};

impl LineFilterExpr {
    /// Compile the chain into one predicate applying the filters in the
    /// order they were written; errors carry the chain's query text
    pub fn filter(&self, factory: &dyn StageFactory) -> Result<Box<dyn Filterer>> {
        self.build_filter(factory)
            .map_err(|err| LogqlError::stage(self.to_string(), err))
    }

    fn build_filter(&self, factory: &dyn StageFactory) -> kestrel_logpipe::Result<Box<dyn Filterer>> {
        let mut filters = Vec::with_capacity(self.chain_len());
        let mut link = Some(self);
        while let Some(curr) = link {
            let next = match curr.function {
                Some(LineFilterFunction::Ip) => factory.ip_line_filter(curr.ty, &curr.pattern)?,
                None => factory.line_filter(curr.ty, &curr.pattern)?,
            };
            filters.push(next);
            link = curr.left.as_deref();
        }

        if filters.len() == 1 {
            if let Some(only) = filters.pop() {
                return Ok(only);
            }
        }

        // collected head first, which is the last filter written
        filters.reverse();
        Ok(Box::new(AndFilter::new(filters)))
    }
}

impl StageExpr {
    /// Build the executable stage; the error is the factory's, unwrapped
    pub fn stage(&self, factory: &dyn StageFactory) -> kestrel_logpipe::Result<Box<dyn Stage>> {
        match self {
            StageExpr::LineFilter(e) => Ok(Box::new(FilterStage::new(e.build_filter(factory)?))),
            StageExpr::LabelParser(e) => factory.parser(e.kind, &e.param),
            StageExpr::LabelFilter(e) => {
                if let Some(err) = e.filter.pattern_error() {
                    return Err(err);
                }
                Ok(Box::new(e.filter.clone()))
            }
            StageExpr::LineFmt(e) => factory.line_formatter(&e.template),
            StageExpr::LabelFmt(e) => factory.labels_formatter(&e.formats),
            StageExpr::JsonExpressionParser(e) => factory.json_expression_parser(&e.expressions),
        }
    }
}

/// Compile stages in order, dropping no-ops
fn compile_stages(stages: &[StageExpr], factory: &dyn StageFactory) -> Result<Vec<Box<dyn Stage>>> {
    let mut compiled = Vec::with_capacity(stages.len());
    for expr in stages {
        let stage = expr
            .stage(factory)
            .map_err(|err| LogqlError::stage(expr.to_string(), err))?;
        if stage.is_noop() {
            trace!(stage = %expr, "eliding no-op stage");
            continue;
        }
        compiled.push(stage);
    }
    debug!(
        stages = compiled.len(),
        elided = stages.len() - compiled.len(),
        "compiled log pipeline"
    );
    Ok(compiled)
}

impl PipelineExpr {
    pub fn pipeline(&self, factory: &dyn StageFactory) -> Result<Pipeline> {
        Ok(Pipeline::new(compile_stages(&self.stages, factory)?))
    }
}

impl LogSelectorExpr {
    /// Executable stages of the selector; a bare selector has none
    pub fn pipeline(&self, factory: &dyn StageFactory) -> Result<Pipeline> {
        match self {
            LogSelectorExpr::Matchers(_) => Ok(Pipeline::noop()),
            LogSelectorExpr::Pipeline(e) => e.pipeline(factory),
        }
    }
}

impl From<UnwrapConversion> for ConversionOp {
    fn from(conv: UnwrapConversion) -> Self {
        match conv {
            UnwrapConversion::Bytes => ConversionOp::Bytes,
            UnwrapConversion::Duration | UnwrapConversion::DurationSeconds => {
                ConversionOp::Duration
            }
        }
    }
}

impl SampleExpr {
    /// Build the extractor producing this expression's input samples
    pub fn extractor(&self, factory: &dyn StageFactory) -> Result<SampleExtractor> {
        match self {
            SampleExpr::RangeAggregation(e) => e.extractor(factory),
            SampleExpr::VectorAggregation(e) => e.extractor(factory),
            SampleExpr::BinOp(e) => e.extractor(factory),
            SampleExpr::Literal(e) => Err(LogqlError::NoExtractor {
                expr: e.to_string(),
            }),
            SampleExpr::LabelReplace(e) => e.left.extractor(factory),
        }
    }
}

impl RangeAggregationExpr {
    pub fn extractor(&self, factory: &dyn StageFactory) -> Result<SampleExtractor> {
        self.extractor_with_grouping(factory, None)
    }

    /// Build the extractor, grouping samples by `grouping` instead of this
    /// node's own grouping when one is given
    pub fn extractor_with_grouping(
        &self,
        factory: &dyn StageFactory,
        grouping: Option<&Grouping>,
    ) -> Result<SampleExtractor> {
        self.validate()?;

        let mut groups = Vec::new();
        let mut without = false;
        let mut no_labels = false;
        if let Some(g) = grouping.or(self.grouping.as_ref()) {
            groups = g.groups.clone();
            without = g.without;
            no_labels = g.is_empty_by();
        }
        // absent_over_time produces a single series
        if self.op == RangeOp::AbsentOverTime {
            no_labels = true;
        }

        let stages = match &self.left.left {
            LogSelectorExpr::Pipeline(p) => compile_stages(&p.stages, factory)?,
            LogSelectorExpr::Matchers(_) => Vec::new(),
        };

        let kind = match &self.left.unwrap {
            Some(unwrap) => ExtractorKind::Label {
                identifier: unwrap.identifier.clone(),
                conversion: unwrap.conversion.map_or(ConversionOp::Float, ConversionOp::from),
                post_filter: LabelFilter::reduce_and(unwrap.post_filters.iter().cloned()),
            },
            None => match self.op {
                RangeOp::Rate | RangeOp::CountOverTime | RangeOp::AbsentOverTime => {
                    ExtractorKind::Count
                }
                RangeOp::BytesOverTime | RangeOp::BytesRate => ExtractorKind::Bytes,
                op => {
                    return Err(LogqlError::UnsupportedRangeOperation { op: op.to_string() })
                }
            },
        };

        debug!(
            op = %self.op,
            groups = ?groups,
            without,
            no_labels,
            "built sample extractor"
        );
        Ok(SampleExtractor::new(
            kind,
            Pipeline::new(stages),
            groups,
            without,
            no_labels,
        ))
    }
}

/// Whether a vector aggregation can hand its grouping to the range
/// aggregation below it. Only `sum` is unaffected by dropping the labels
/// it does not group by.
fn can_inject_vector_grouping(vec_op: VectorOp, range_op: RangeOp) -> bool {
    vec_op == VectorOp::Sum
        && matches!(
            range_op,
            RangeOp::BytesOverTime
                | RangeOp::BytesRate
                | RangeOp::SumOverTime
                | RangeOp::Rate
                | RangeOp::CountOverTime
        )
}

impl VectorAggregationExpr {
    pub fn extractor(&self, factory: &dyn StageFactory) -> Result<SampleExtractor> {
        if let SampleExpr::RangeAggregation(r) = &self.left {
            if r.grouping.is_none() && can_inject_vector_grouping(self.op, r.op) {
                debug!(vector_op = %self.op, range_op = %r.op, "pushing grouping down to range aggregation");
                return r.extractor_with_grouping(factory, Some(&self.grouping));
            }
        }
        self.left.extractor(factory)
    }
}

impl BinOpExpr {
    /// Extractor of the first leg that reads logs
    pub fn extractor(&self, factory: &dyn StageFactory) -> Result<SampleExtractor> {
        if self.left.as_literal().is_some() {
            self.right.extractor(factory)
        } else {
            self.left.extractor(factory)
        }
    }
}
