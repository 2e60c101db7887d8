use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::error::PipelineError;
use crate::http_client::{self, RetryConfig, is_transport_error, retry_with_backoff};
use crate::links;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com";
pub const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

const SERVICE: &str = "music catalog";
const TRACK_PAGE_SIZE: &str = "100";

pub trait MusicCatalog {
    fn resolve_playlist_id(&self, link: &str) -> Result<String, PipelineError> {
        links::playlist_id(link)
    }

    /// Track ids in playlist order. A missing or private playlist is an input error.
    fn list_track_ids(&self, playlist_id: &str) -> Result<Vec<String>, PipelineError>;

    /// Valence of one track, or `None` when the provider has no analysis for it.
    fn positivity_score(&self, track_id: &str) -> Result<Option<f64>, PipelineError>;

    fn playlist_owner(&self, playlist_id: &str) -> Result<String, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracksPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<TrackRef>,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AudioFeatures {
    valence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PlaylistOwnerEnvelope {
    owner: PlaylistOwner,
}

#[derive(Debug, Deserialize)]
struct PlaylistOwner {
    id: String,
    display_name: Option<String>,
}

pub struct SpotifyCatalog {
    agent: ureq::Agent,
    api_base: Url,
    bearer: String,
    retry: RetryConfig,
}

impl SpotifyCatalog {
    pub fn with_token(
        api_base: &str,
        token: &str,
        retry: RetryConfig,
    ) -> Result<Self, PipelineError> {
        let api_base = Url::parse(api_base).map_err(|err| {
            PipelineError::Input(format!("invalid catalog base url {api_base}: {err}"))
        })?;
        Ok(Self {
            agent: http_client::agent(),
            api_base,
            bearer: format!("Bearer {token}"),
            retry,
        })
    }

    /// Exchange application credentials for an app-only access token.
    pub fn with_client_credentials(
        api_base: &str,
        accounts_base: &str,
        client_id: &str,
        client_secret: &str,
        retry: RetryConfig,
    ) -> Result<Self, PipelineError> {
        let token_url = format!("{}/api/token", accounts_base.trim_end_matches('/'));
        let basic = STANDARD.encode(format!("{client_id}:{client_secret}"));
        let agent = http_client::agent();

        let response = retry_with_backoff(
            retry,
            || {
                agent
                    .post(&token_url)
                    .set("Authorization", &format!("Basic {basic}"))
                    .send_form(&[("grant_type", "client_credentials")])
            },
            is_transport_error,
        )
        .map_err(|err| PipelineError::upstream(SERVICE, format!("token request failed: {err}")))?;
        let token: TokenResponse = response.into_json().map_err(|err| {
            PipelineError::upstream(SERVICE, format!("invalid token response: {err}"))
        })?;

        info!(accounts = %accounts_base, "obtained catalog access token");
        Self::with_token(api_base, &token.access_token, retry)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PipelineError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PipelineError::Input(format!(
                    "catalog base url cannot hold a path: {}",
                    self.api_base
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON document; `None` when the resource does not exist.
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, PipelineError> {
        let result = retry_with_backoff(
            self.retry,
            || self.agent.get(url).set("Authorization", &self.bearer).call(),
            is_transport_error,
        );
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(ureq::Error::Status(code, _)) => {
                return Err(PipelineError::upstream(SERVICE, format!("HTTP {code} for {url}")));
            }
            Err(err) => return Err(PipelineError::upstream(SERVICE, err.to_string())),
        };
        response.into_json::<T>().map(Some).map_err(|err| {
            PipelineError::upstream(SERVICE, format!("invalid json from {url}: {err}"))
        })
    }
}

impl MusicCatalog for SpotifyCatalog {
    fn list_track_ids(&self, playlist_id: &str) -> Result<Vec<String>, PipelineError> {
        let mut url = self.endpoint(&["v1", "playlists", playlist_id, "tracks"])?;
        url.query_pairs_mut()
            .append_pair("limit", TRACK_PAGE_SIZE)
            .append_pair("fields", "items(track(id)),next");

        let mut next = Some(url.to_string());
        let mut track_ids = Vec::new();
        let mut pages = 0usize;

        while let Some(page_url) = next.take() {
            let page: PlaylistTracksPage = self.get_json(&page_url)?.ok_or_else(|| {
                PipelineError::Input(format!("playlist {playlist_id} is missing or private"))
            })?;
            pages += 1;
            track_ids.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track.and_then(|track| track.id)),
            );
            next = page.next;
        }

        debug!(
            playlist_id = %playlist_id,
            pages,
            tracks = track_ids.len(),
            "listed playlist tracks"
        );
        Ok(track_ids)
    }

    fn positivity_score(&self, track_id: &str) -> Result<Option<f64>, PipelineError> {
        let url = self.endpoint(&["v1", "audio-features", track_id])?;
        let features: Option<Option<AudioFeatures>> = self.get_json(url.as_str())?;
        Ok(features.flatten().and_then(|features| features.valence))
    }

    fn playlist_owner(&self, playlist_id: &str) -> Result<String, PipelineError> {
        let mut url = self.endpoint(&["v1", "playlists", playlist_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "owner(id,display_name)");

        let envelope: PlaylistOwnerEnvelope = self.get_json(url.as_str())?.ok_or_else(|| {
            PipelineError::Input(format!("playlist {playlist_id} is missing or private"))
        })?;
        let owner = envelope
            .owner
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(envelope.owner.id);
        Ok(capitalize(&owner))
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
