use crate::config::MatchMode;
use crate::error::{EmptyFieldWarning, Error, Result};
use crate::types::BibRecord;
use indexmap::IndexSet;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

/// Why a record was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Entry type is in the excluded set
    ExcludedType(String),
    /// Title is missing or blank
    MissingTitle,
    /// Screened text lacks a domain term, a quality term, or both
    MissingTerms { no_domain: bool, no_quality: bool },
}

impl Exclusion {
    /// Stable, machine-readable reason used in summaries and reports
    pub fn reason(&self) -> String {
        match self {
            Exclusion::ExcludedType(entry_type) => format!("excluded_type:{}", entry_type),
            Exclusion::MissingTitle => "missing_title".to_string(),
            Exclusion::MissingTerms {
                no_domain,
                no_quality,
            } => {
                let mut reasons = Vec::new();
                if *no_domain {
                    reasons.push("no_domain_term");
                }
                if *no_quality {
                    reasons.push("no_quality_term");
                }
                reasons.join(";")
            }
        }
    }
}

/// Filter result indicating whether a record should be kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    Keep,
    FilterOut(Exclusion),
}

impl FilterResult {
    pub fn is_keep(&self) -> bool {
        matches!(self, FilterResult::Keep)
    }
}

/// Terms found in a record's screened text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermMatches {
    pub domain: BTreeSet<String>,
    pub quality: BTreeSet<String>,
}

/// Full outcome of running one record through a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub result: FilterResult,
    pub matches: Option<TermMatches>,
    pub warnings: Vec<EmptyFieldWarning>,
}

impl Evaluation {
    fn from_result(result: FilterResult) -> Self {
        Self {
            result,
            matches: None,
            warnings: Vec::new(),
        }
    }
}

/// Whole-record inclusion decision
pub trait RecordFilter {
    /// Stage name used in logs and summaries
    fn name(&self) -> &str;

    fn evaluate(&self, record: &BibRecord) -> Evaluation;

    fn should_keep(&self, record: &BibRecord) -> FilterResult {
        self.evaluate(record).result
    }
}

/// Drops records of excluded entry types and records without a title
#[derive(Debug, Clone)]
pub struct TypeFilter {
    excluded: HashSet<String>,
}

impl TypeFilter {
    pub fn new(excluded_types: &[String]) -> Self {
        Self {
            excluded: excluded_types
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl RecordFilter for TypeFilter {
    fn name(&self) -> &str {
        "type filter"
    }

    fn evaluate(&self, record: &BibRecord) -> Evaluation {
        let result = if self.excluded.contains(&record.entry_type) {
            FilterResult::FilterOut(Exclusion::ExcludedType(record.entry_type.clone()))
        } else if record.title().is_empty() {
            FilterResult::FilterOut(Exclusion::MissingTitle)
        } else {
            FilterResult::Keep
        };
        Evaluation::from_result(result)
    }
}

/// Lowercased, deduplicated match terms
#[derive(Debug, Clone)]
pub struct TermSet {
    terms: Vec<String>,
    patterns: Option<Vec<Regex>>,
}

impl TermSet {
    pub fn new(terms: &[String], mode: MatchMode) -> Result<Self> {
        let terms: IndexSet<String> = terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let terms: Vec<String> = terms.into_iter().collect();

        let patterns = match mode {
            MatchMode::Substring => None,
            MatchMode::Word => Some(
                terms
                    .iter()
                    .map(|t| Regex::new(&format!(r"(?:^|\W){}(?:$|\W)", regex::escape(t))))
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
        };

        Ok(Self { terms, patterns })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms occurring in `text`, compared case-insensitively
    pub fn find_matches(&self, text: &str) -> BTreeSet<String> {
        let text = text.to_lowercase();
        match &self.patterns {
            None => self
                .terms
                .iter()
                .filter(|t| text.contains(t.as_str()))
                .cloned()
                .collect(),
            Some(patterns) => self
                .terms
                .iter()
                .zip(patterns)
                .filter(|(_, pattern)| pattern.is_match(&text))
                .map(|(t, _)| t.clone())
                .collect(),
        }
    }
}

/// Keeps records mentioning at least one domain term and one quality term
#[derive(Debug, Clone)]
pub struct KeywordScreen {
    domain: TermSet,
    quality: TermSet,
    search_fields: Vec<String>,
}

impl KeywordScreen {
    pub fn new(
        domain_terms: &[String],
        quality_terms: &[String],
        search_fields: &[String],
        mode: MatchMode,
    ) -> Result<Self> {
        let domain = TermSet::new(domain_terms, mode)?;
        if domain.is_empty() {
            return Err(Error::Config("domain_terms must not be empty".to_string()));
        }
        let quality = TermSet::new(quality_terms, mode)?;
        if quality.is_empty() {
            return Err(Error::Config("quality_terms must not be empty".to_string()));
        }

        let search_fields: Vec<String> = search_fields
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        if search_fields.is_empty() {
            return Err(Error::Config("search_fields must not be empty".to_string()));
        }

        Ok(Self {
            domain,
            quality,
            search_fields,
        })
    }

    pub fn domain_terms(&self) -> &TermSet {
        &self.domain
    }

    pub fn quality_terms(&self) -> &TermSet {
        &self.quality
    }

    /// Searched fields joined by a space. Missing fields count as empty.
    pub fn search_text(&self, record: &BibRecord) -> (String, Vec<EmptyFieldWarning>) {
        let mut warnings = Vec::new();
        let parts: Vec<String> = self
            .search_fields
            .iter()
            .map(|field| {
                record.text(field).unwrap_or_else(|| {
                    warnings.push(EmptyFieldWarning {
                        key: record.key.clone(),
                        field: field.clone(),
                    });
                    String::new()
                })
            })
            .collect();
        (parts.join(" "), warnings)
    }
}

impl RecordFilter for KeywordScreen {
    fn name(&self) -> &str {
        "keyword screen"
    }

    fn evaluate(&self, record: &BibRecord) -> Evaluation {
        let (text, warnings) = self.search_text(record);
        let matches = TermMatches {
            domain: self.domain.find_matches(&text),
            quality: self.quality.find_matches(&text),
        };

        let result = if !matches.domain.is_empty() && !matches.quality.is_empty() {
            FilterResult::Keep
        } else {
            FilterResult::FilterOut(Exclusion::MissingTerms {
                no_domain: matches.domain.is_empty(),
                no_quality: matches.quality.is_empty(),
            })
        };

        Evaluation {
            result,
            matches: Some(matches),
            warnings,
        }
    }
}
