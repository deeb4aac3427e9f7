//! Screening of BibTeX corpora for systematic literature reviews.
//!
//! A deduplicated `.bib` export goes through two whole-record filters: the
//! type filter drops unwanted entry types and untitled entries, the keyword
//! screen keeps entries whose title and abstract mention both a domain term
//! and a quality term. Surviving entries are written back unaltered.

pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod parser;
pub mod processor;
pub mod report;
pub mod types;

pub use config::{Config, ConfigBuilder, MatchMode};
pub use error::{EmptyFieldWarning, Error, ParseError, Result};
pub use filter::{
    Evaluation, Exclusion, FilterResult, KeywordScreen, RecordFilter, TermMatches, TermSet,
    TypeFilter,
};
pub use parser::{parse_bibliography, parse_file};
pub use processor::{apply_filter, run_stage, screen_file, Decision, PendingWrites, StageReport};
pub use types::{BibRecord, Bibliography, Block};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ConfigBuilder, MatchMode};
    pub use crate::error::{Error, Result};
    pub use crate::filter::{FilterResult, KeywordScreen, RecordFilter, TypeFilter};
    pub use crate::processor::{apply_filter, run_stage, screen_file, PendingWrites, StageReport};
    pub use crate::types::{BibRecord, Bibliography};
}
