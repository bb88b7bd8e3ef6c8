//! Kestrel Log Pipeline
//!
//! Runtime building blocks that LogQL expressions compile into: label
//! matchers, line filters, label filters, pipeline stages and sample
//! extractors. Parsers and formatters are provided by the executing runtime
//! through [`StageFactory`].

pub mod error;
pub mod extractor;
pub mod filter;
pub mod format;
pub mod ip;
pub mod label_filter;
pub mod labels;
pub mod stage;

// Re-exports
pub use error::{PipelineError, Result};
pub use extractor::{ConversionOp, ExtractorKind, SampleExtractor};
pub use filter::{AndFilter, FilterStage, Filterer, TrueFilter};
pub use ip::IpPattern;
pub use label_filter::{IpLabelFilter, LabelFilter, LabelFilterType};
pub use labels::{Labels, MatchType, Matcher, ERROR_LABEL};
pub use stage::{JsonExpression, LabelFmt, NoopStage, ParserKind, Pipeline, Stage, StageFactory};
