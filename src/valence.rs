use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::catalog::MusicCatalog;
use crate::error::PipelineError;
use crate::links::{LinkValidator, ReachabilityProbe};

pub const NO_SUBMISSION: &str = "No Playlist Submitted";
pub const NO_DATA: &str = "No Scorable Tracks";

/// One playlist's happiness, or the reason there is none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Valence(f64),
    /// Empty, invalid, private or missing playlist link.
    NoSubmission,
    /// The playlist resolved but none of its tracks had a valence.
    NoData,
}

impl Score {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Valence(value) => Some(value),
            Self::NoSubmission | Self::NoData => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valence(value) => write!(f, "{value}"),
            Self::NoSubmission => f.write_str(NO_SUBMISSION),
            Self::NoData => f.write_str(NO_DATA),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valence(value) => serializer.serialize_f64(*value),
            Self::NoSubmission => serializer.serialize_str(NO_SUBMISSION),
            Self::NoData => serializer.serialize_str(NO_DATA),
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn rounded_mean(values: &[f64]) -> Result<f64, PipelineError> {
    if values.is_empty() {
        return Err(PipelineError::NoData("mean of zero values".to_string()));
    }
    Ok(round2(values.iter().sum::<f64>() / values.len() as f64))
}

/// Reduces a playlist link to the mean valence of its tracks.
pub struct ValenceAggregator<'a, C, P> {
    catalog: &'a C,
    validator: &'a LinkValidator<P>,
}

impl<'a, C: MusicCatalog, P: ReachabilityProbe> ValenceAggregator<'a, C, P> {
    pub fn new(catalog: &'a C, validator: &'a LinkValidator<P>) -> Self {
        Self { catalog, validator }
    }

    pub fn average_valence(&self, link: &str) -> Result<Score, PipelineError> {
        if link.trim().is_empty() || !self.validator.is_valid(link)? {
            return Ok(Score::NoSubmission);
        }

        let Some(playlist_id) = recover_input(self.catalog.resolve_playlist_id(link))? else {
            return Ok(Score::NoSubmission);
        };
        let Some(track_ids) = recover_input(self.catalog.list_track_ids(&playlist_id))? else {
            debug!(playlist_id = %playlist_id, "playlist unavailable to the catalog");
            return Ok(Score::NoSubmission);
        };

        let mut valences = Vec::with_capacity(track_ids.len());
        for track_id in &track_ids {
            if let Some(valence) = self.catalog.positivity_score(track_id)? {
                valences.push(valence);
            }
        }

        match rounded_mean(&valences) {
            Ok(mean) => {
                debug!(
                    playlist_id = %playlist_id,
                    tracks = track_ids.len(),
                    scored = valences.len(),
                    mean,
                    "scored playlist"
                );
                Ok(Score::Valence(mean))
            }
            Err(PipelineError::NoData(_)) => {
                warn!(
                    playlist_id = %playlist_id,
                    tracks = track_ids.len(),
                    "no track in playlist has a valence"
                );
                Ok(Score::NoData)
            }
            Err(err) => Err(err),
        }
    }
}

/// Input errors become `None`; every other kind keeps propagating.
fn recover_input<T>(result: Result<T, PipelineError>) -> Result<Option<T>, PipelineError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PipelineError::Input(reason)) => {
            debug!(reason = %reason, "recovered input error");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fakes::FakeCatalog;
    use crate::links::fakes::FakeProbe;

    const PUBLIC: &str = "https://open.spotify.com/playlist/pub?si=abc";
    const PRIVATE: &str = "https://open.spotify.com/playlist/37i9dQZF1EUMDoJuT8yJsl?si=164c2f9bd9674fe3";

    fn catalog() -> FakeCatalog {
        FakeCatalog::default()
            .playlist("pub", &[("a", Some(0.2)), ("b", None), ("c", Some(0.64))])
            .playlist("silent", &[("x", None), ("y", None)])
    }

    #[test]
    fn empty_link_is_no_submission() {
        let catalog = catalog();
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        let aggregator = ValenceAggregator::new(&catalog, &validator);
        assert_eq!(aggregator.average_valence("").unwrap(), Score::NoSubmission);
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn private_playlist_is_no_submission() {
        let catalog = catalog();
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        let aggregator = ValenceAggregator::new(&catalog, &validator);
        assert_eq!(aggregator.average_valence(PRIVATE).unwrap(), Score::NoSubmission);
    }

    #[test]
    fn unreachable_link_never_reaches_the_catalog() {
        let catalog = catalog();
        let probe = FakeProbe::default().with_status(PUBLIC, 404);
        let validator = LinkValidator::new(&probe);
        let aggregator = ValenceAggregator::new(&catalog, &validator);
        assert_eq!(aggregator.average_valence(PUBLIC).unwrap(), Score::NoSubmission);
        assert_eq!(catalog.score_calls.get(), 0);
    }

    #[test]
    fn mean_skips_tracks_without_valence_and_rounds() {
        let catalog = catalog();
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        let aggregator = ValenceAggregator::new(&catalog, &validator);
        assert_eq!(aggregator.average_valence(PUBLIC).unwrap(), Score::Valence(0.42));
        assert_eq!(catalog.score_calls.get(), 3);
    }

    #[test]
    fn playlist_without_any_valence_is_no_data() {
        let catalog = catalog();
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        let aggregator = ValenceAggregator::new(&catalog, &validator);
        let score = aggregator
            .average_valence("https://open.spotify.com/playlist/silent")
            .unwrap();
        assert_eq!(score, Score::NoData);
    }

    #[test]
    fn catalog_outage_propagates() {
        let catalog = FakeCatalog {
            outage: true,
            ..catalog()
        };
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        let aggregator = ValenceAggregator::new(&catalog, &validator);
        assert!(matches!(
            aggregator.average_valence(PUBLIC),
            Err(PipelineError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn rounded_mean_of_nothing_is_no_data() {
        assert!(matches!(rounded_mean(&[]), Err(PipelineError::NoData(_))));
        assert_eq!(rounded_mean(&[0.1, 0.2, 0.4]).unwrap(), 0.23);
    }

    #[test]
    fn score_serializes_as_number_or_marker() {
        let scores = [Score::Valence(0.5), Score::NoSubmission, Score::NoData];
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"[0.5,"No Playlist Submitted","No Scorable Tracks"]"#);
        assert_eq!(Score::Valence(0.43).to_string(), "0.43");
    }
}
