//! Sample extractors
//!
//! An extractor runs the selector's pipeline over a line and turns the
//! result into one numeric sample plus the label set it is grouped under.

use crate::format::{parse_bytes, parse_duration};
use crate::label_filter::LabelFilter;
use crate::labels::Labels;
use crate::stage::Pipeline;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How an unwrapped label value becomes a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionOp {
    /// Plain float (`| unwrap latency`)
    Float,
    /// Human readable byte size (`| unwrap bytes(size)`)
    Bytes,
    /// Go duration, converted to seconds (`| unwrap duration(took)`)
    Duration,
}

impl ConversionOp {
    pub fn convert(&self, raw: &str) -> Option<f64> {
        match self {
            ConversionOp::Float => raw.trim().parse::<f64>().ok(),
            ConversionOp::Bytes => parse_bytes(raw).map(|b| b as f64),
            ConversionOp::Duration => parse_duration(raw).map(|d| d.as_secs_f64()),
        }
    }
}

/// Where the sample value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorKind {
    /// Every line counts as 1
    Count,
    /// Size of the processed line in bytes
    Bytes,
    /// Value of a label, filtered then converted
    Label {
        identifier: String,
        conversion: ConversionOp,
        post_filter: Option<LabelFilter>,
    },
}

#[derive(Debug)]
pub struct SampleExtractor {
    kind: ExtractorKind,
    pipeline: Pipeline,
    groups: Vec<String>,
    without: bool,
    no_labels: bool,
}

impl SampleExtractor {
    /// `groups` are sorted and deduplicated; `no_labels` drops every label
    pub fn new(
        kind: ExtractorKind,
        pipeline: Pipeline,
        mut groups: Vec<String>,
        without: bool,
        no_labels: bool,
    ) -> Self {
        groups.sort();
        groups.dedup();
        Self {
            kind,
            pipeline,
            groups,
            without,
            no_labels,
        }
    }

    pub fn kind(&self) -> &ExtractorKind {
        &self.kind
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn without(&self) -> bool {
        self.without
    }

    pub fn no_labels(&self) -> bool {
        self.no_labels
    }

    /// Extract a sample from a line; `None` when the line is dropped
    pub fn extract(&self, line: &str, labels: &Labels) -> Option<(f64, Labels)> {
        let mut lbs = labels.clone();
        let line = self.pipeline.process(line, &mut lbs)?;

        let value = match &self.kind {
            ExtractorKind::Count => 1.0,
            ExtractorKind::Bytes => line.len() as f64,
            ExtractorKind::Label {
                identifier,
                conversion,
                post_filter,
            } => {
                if let Some(filter) = post_filter {
                    if !filter.filter(&mut lbs) {
                        return None;
                    }
                }
                let raw = lbs.get(identifier)?;
                match conversion.convert(raw) {
                    Some(v) => v,
                    None => {
                        warn!(label = %identifier, value = %raw, "dropping sample, label value is not convertible");
                        return None;
                    }
                }
            }
        };

        Some((value, self.project(lbs)))
    }

    fn project(&self, mut lbs: Labels) -> Labels {
        if self.no_labels {
            return Labels::new();
        }
        if let ExtractorKind::Label { identifier, .. } = &self.kind {
            lbs.remove(identifier);
        }
        if self.without {
            lbs.retain(|name, _| self.groups.binary_search(name).is_err());
        } else if !self.groups.is_empty() {
            lbs.retain(|name, _| self.groups.binary_search(name).is_ok());
        }
        lbs
    }
}
