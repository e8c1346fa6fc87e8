//! Bank statement import: format detection, CSV and OFX/QFX parsing,
//! keyword classification, and all-or-nothing hand-off to a storage sink.

pub mod config;
pub mod context;
pub mod csv;
pub mod detect;
pub mod error;
pub mod ofx;
pub mod pipeline;
pub mod rules;
pub(crate) mod util;

pub use crate::config::ImportConfig;
pub use crate::context::{ParseContext, ParseReport};
pub use crate::csv::ColumnRoles;
pub use crate::detect::{detect, detect_and_parse, parse_path, Format, SniffReader, MIN_SNIFF_WINDOW};
pub use crate::error::{ImportError, Result, SinkError};
pub use crate::pipeline::{ImportPipeline, ImportSummary, MemorySink, TransactionSink};
pub use crate::rules::{CategoryRule, Classifier, DEFAULT_CATEGORY};
