use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::links::{LinkValidator, ReachabilityProbe};

/// Survey columns in sheet order. Position decides the year, never the link itself.
pub const SURVEY_YEARS: [&str; 4] = ["2019", "2020", "2021", "2022"];
pub const ANONYMOUS_NAME: &str = "Mysterious Stranger";

const RESPONDENT_COLUMNS: usize = SURVEY_YEARS.len() + 2;

pub type FixedRow = [String; 4];

/// Right-pad a ragged sheet row with empty strings to one slot per survey year.
pub fn normalize(row: &[String]) -> Result<FixedRow, PipelineError> {
    if row.len() > SURVEY_YEARS.len() {
        return Err(PipelineError::Input(format!(
            "survey row has {} cells, expected at most {}",
            row.len(),
            SURVEY_YEARS.len()
        )));
    }

    let mut fixed = FixedRow::default();
    for (slot, cell) in fixed.iter_mut().zip(row) {
        *slot = cell.trim().to_string();
    }
    Ok(fixed)
}

/// Links grouped by survey year, in sheet row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct YearBucket(BTreeMap<String, Vec<String>>);

impl YearBucket {
    pub fn empty() -> Self {
        Self(
            SURVEY_YEARS
                .iter()
                .map(|year| (year.to_string(), Vec::new()))
                .collect(),
        )
    }

    pub fn links(&self, year: &str) -> &[String] {
        self.0.get(year).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(year, links)| (year.as_str(), links.as_slice()))
    }

    pub fn link_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    fn push(&mut self, year: &str, link: String) {
        self.0.entry(year.to_string()).or_default().push(link);
    }
}

/// A row with at most one cell carries no real submission.
fn has_submission(row: &[String]) -> bool {
    row.len() > 1
}

pub fn bucketize(rows: &[Vec<String>]) -> Result<YearBucket, PipelineError> {
    let mut bucket = YearBucket::empty();
    let mut dropped = 0usize;

    for row in rows {
        if !has_submission(row) {
            dropped += 1;
            continue;
        }
        let fixed = normalize(row)?;
        for (year, link) in SURVEY_YEARS.iter().zip(fixed) {
            if !link.is_empty() {
                bucket.push(year, link);
            }
        }
    }

    debug!(
        rows = rows.len(),
        dropped,
        links = bucket.link_count(),
        "bucketized survey rows"
    );
    Ok(bucket)
}

/// Rows where every year holds a valid link, for year-over-year comparison.
///
/// Rows that miss a year or carry one invalid link are dropped wholesale.
pub fn complete_quadruplets<P: ReachabilityProbe>(
    rows: &[Vec<String>],
    validator: &LinkValidator<P>,
) -> Result<Vec<FixedRow>, PipelineError> {
    let mut complete = Vec::new();

    'rows: for row in rows {
        if !has_submission(row) {
            continue;
        }
        let fixed = normalize(row)?;
        for link in &fixed {
            if link.is_empty() || !validator.is_valid(link)? {
                debug!(link = %link, "dropping incomplete respondent row");
                continue 'rows;
            }
        }
        complete.push(fixed);
    }

    debug!(rows = rows.len(), complete = complete.len(), "collected complete rows");
    Ok(complete)
}

/// A survey respondent who left an address for their results.
#[derive(Debug, Clone, PartialEq)]
pub struct Respondent {
    pub name: String,
    pub links: FixedRow,
    pub email: String,
}

/// Reads `[name, 2019, 2020, 2021, 2022, email]` rows.
pub struct RespondentParser {
    email: Regex,
}

impl RespondentParser {
    pub fn new() -> Result<Self> {
        let email =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").context("failed to compile email regex")?;
        Ok(Self { email })
    }

    pub fn parse(&self, rows: &[Vec<String>]) -> Vec<Respondent> {
        let mut respondents = Vec::new();

        for row in rows {
            if row.len() != RESPONDENT_COLUMNS {
                continue;
            }
            let email = row[RESPONDENT_COLUMNS - 1].trim();
            if !self.email.is_match(email) {
                warn!(email = %email, "skipping respondent without a usable address");
                continue;
            }

            let name = match row[0].trim() {
                "" => ANONYMOUS_NAME.to_string(),
                name => name.to_string(),
            };
            let mut links = FixedRow::default();
            for (slot, cell) in links.iter_mut().zip(&row[1..RESPONDENT_COLUMNS - 1]) {
                *slot = cell.trim().to_string();
            }

            respondents.push(Respondent {
                name,
                links,
                email: email.to_string(),
            });
        }

        respondents
    }
}
