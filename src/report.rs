use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::MusicCatalog;
use crate::error::PipelineError;
use crate::links::ReachabilityProbe;
use crate::survey::{FixedRow, SURVEY_YEARS, YearBucket};
use crate::valence::{Score, ValenceAggregator, round2, rounded_mean};

/// Per-playlist scores and per-year means.
///
/// Sentinel scores stay visible in `per_playlist` but never enter a mean; a
/// year without any numeric score has a `null` mean.
#[derive(Debug, Clone, Serialize)]
pub struct YearReport {
    pub per_playlist: BTreeMap<String, Vec<Score>>,
    pub per_year_mean: BTreeMap<String, Option<f64>>,
}

/// Year-pair label ("2019-2020") to per-respondent score differences.
pub type YearDelta = BTreeMap<String, Vec<f64>>;

pub fn year_pair_labels() -> Vec<String> {
    SURVEY_YEARS
        .windows(2)
        .map(|pair| format!("{}-{}", pair[0], pair[1]))
        .collect()
}

pub fn summarize<C: MusicCatalog, P: ReachabilityProbe>(
    bucket: &YearBucket,
    aggregator: &ValenceAggregator<'_, C, P>,
) -> Result<YearReport, PipelineError> {
    let mut per_playlist = BTreeMap::new();
    let mut per_year_mean = BTreeMap::new();

    for (year, links) in bucket.iter() {
        let mut scores = Vec::with_capacity(links.len());
        for link in links {
            scores.push(aggregator.average_valence(link)?);
        }

        let values: Vec<f64> = scores.iter().filter_map(|score| score.value()).collect();
        let mean = rounded_mean(&values).ok();
        info!(
            year = %year,
            links = links.len(),
            scored = values.len(),
            mean = ?mean,
            "summarized year"
        );

        per_playlist.insert(year.to_string(), scores);
        per_year_mean.insert(year.to_string(), mean);
    }

    Ok(YearReport {
        per_playlist,
        per_year_mean,
    })
}

/// Consecutive-year differences for respondents with four numeric scores.
///
/// A respondent with any sentinel score is skipped entirely so the three
/// lists stay aligned by respondent.
pub fn delta<C: MusicCatalog, P: ReachabilityProbe>(
    quadruplets: &[FixedRow],
    aggregator: &ValenceAggregator<'_, C, P>,
) -> Result<YearDelta, PipelineError> {
    let labels = year_pair_labels();
    let mut deltas: YearDelta = labels
        .iter()
        .map(|label| (label.clone(), Vec::new()))
        .collect();

    for (respondent, links) in quadruplets.iter().enumerate() {
        let mut values = Vec::with_capacity(links.len());
        for link in links {
            match aggregator.average_valence(link)? {
                Score::Valence(value) => values.push(value),
                score => {
                    warn!(
                        respondent,
                        link = %link,
                        score = %score,
                        "skipping respondent without four scores"
                    );
                    break;
                }
            }
        }
        if values.len() != links.len() {
            continue;
        }

        for (label, pair) in labels.iter().zip(values.windows(2)) {
            if let Some(entries) = deltas.get_mut(label) {
                entries.push(round2(pair[1] - pair[0]));
            }
        }
    }

    Ok(deltas)
}

/// Single-playlist message for someone checking their own link.
pub fn owner_line(owner: &str, score: Score, year: &str) -> String {
    format!("{owner} was about {score} happy out of 1 in the Year {year}!")
}
