//! CSV listings of screening decisions.

use crate::error::{Error, Result};
use crate::filter::FilterResult;
use crate::processor::StageReport;

/// Longest title written to a report row, in characters
pub const REPORT_TITLE_LIMIT: usize = 200;

/// `key,title,domain_matches,quality_matches` for every kept record
pub fn included_csv(report: &StageReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["key", "title", "domain_matches", "quality_matches"])?;

    for decision in report.included() {
        let (domain, quality) = match &decision.matches {
            Some(matches) => (join(&matches.domain), join(&matches.quality)),
            None => (String::new(), String::new()),
        };
        writer.write_record([
            decision.key.as_str(),
            truncate(&decision.title).as_str(),
            domain.as_str(),
            quality.as_str(),
        ])?;
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// `key,title,reason` for every discarded record
pub fn excluded_csv(report: &StageReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["key", "title", "reason"])?;

    for decision in report.excluded() {
        let reason = match &decision.result {
            FilterResult::FilterOut(exclusion) => exclusion.reason(),
            FilterResult::Keep => continue,
        };
        writer.write_record([
            decision.key.as_str(),
            truncate(&decision.title).as_str(),
            reason.as_str(),
        ])?;
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn join<'a>(terms: impl IntoIterator<Item = &'a String>) -> String {
    terms
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";")
}

fn truncate(title: &str) -> String {
    title.chars().take(REPORT_TITLE_LIMIT).collect()
}
