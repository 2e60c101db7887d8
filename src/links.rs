use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::PipelineError;
use crate::http_client::{self, RetryConfig, is_timeout, is_transport_error, retry_with_backoff};

pub const PLAYLIST_HOST: &str = "open.spotify.com";
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Reports the HTTP status a URL answers with.
pub trait ReachabilityProbe {
    /// `None` when no answer arrived within the timeout. Non-2xx statuses are
    /// values; only failures to reach the host at all are errors.
    fn fetch_status(&self, url: &str) -> Result<Option<u16>, PipelineError>;
}

impl<T: ReachabilityProbe + ?Sized> ReachabilityProbe for &T {
    fn fetch_status(&self, url: &str) -> Result<Option<u16>, PipelineError> {
        (**self).fetch_status(url)
    }
}

pub struct HttpProbe {
    agent: ureq::Agent,
    retry: RetryConfig,
}

impl HttpProbe {
    pub fn new(timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            agent: http_client::agent_with_timeout(timeout),
            retry,
        }
    }
}

impl ReachabilityProbe for HttpProbe {
    fn fetch_status(&self, url: &str) -> Result<Option<u16>, PipelineError> {
        let result = retry_with_backoff(
            self.retry,
            || self.agent.get(url).call(),
            is_transport_error,
        );
        match result {
            Ok(response) => Ok(Some(response.status())),
            Err(ureq::Error::Status(code, _)) => Ok(Some(code)),
            Err(err) if is_timeout(&err) => {
                debug!(url = %url, error = %err, "link did not answer in time");
                Ok(None)
            }
            Err(err) => Err(PipelineError::upstream("link reachability", err.to_string())),
        }
    }
}

/// Parse a submitted link as an absolute http(s) URL.
pub fn parse_link(link: &str) -> Result<Url, PipelineError> {
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Input("empty link".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|err| PipelineError::Input(format!("not a url: {trimmed}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::Input(format!(
            "unsupported scheme {}: {trimmed}",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Last non-empty path segment of a playlist link, without query or fragment.
pub fn playlist_id(link: &str) -> Result<String, PipelineError> {
    let url = parse_link(link)?;
    url.path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .map(ToOwned::to_owned)
        .ok_or_else(|| PipelineError::Input(format!("link has no playlist id: {link}")))
}

pub fn is_playlist_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(PLAYLIST_HOST))
}

/// Decides whether a submitted link can be scored.
///
/// Structural checks run before any request so that empty, malformed and
/// off-domain links never cost a round trip. Reachability verdicts are kept
/// for the lifetime of the validator, which is one pipeline run.
pub struct LinkValidator<P> {
    probe: P,
    verdicts: RefCell<HashMap<String, bool>>,
}

impl<P: ReachabilityProbe> LinkValidator<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            verdicts: RefCell::new(HashMap::new()),
        }
    }

    pub fn is_valid(&self, link: &str) -> Result<bool, PipelineError> {
        let url = match parse_link(link) {
            Ok(url) => url,
            Err(err) => {
                debug!(error = %err, "rejected link");
                return Ok(false);
            }
        };
        if !is_playlist_host(&url) {
            let host = url.host_str().unwrap_or_default();
            debug!(link = %link, host, "rejected off-domain link");
            return Ok(false);
        }

        if let Some(verdict) = self.verdicts.borrow().get(link).copied() {
            return Ok(verdict);
        }

        let status = self.probe.fetch_status(url.as_str())?;
        let verdict = status.is_some_and(|code| (200..300).contains(&code));
        if !verdict {
            debug!(link = %link, status = ?status, "link did not answer with success");
        }
        self.verdicts.borrow_mut().insert(link.to_string(), verdict);
        Ok(verdict)
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeProbe;
    use super::*;
    use crate::http_client::test_server::{http_response, serve_responses, serve_silence};

    const PUBLIC: &str = "https://open.spotify.com/playlist/37i9dQZF1DWUa8ZRTfalHk";

    #[test]
    fn playlist_id_takes_last_segment() {
        assert_eq!(playlist_id(PUBLIC).unwrap(), "37i9dQZF1DWUa8ZRTfalHk");
    }

    #[test]
    fn playlist_id_strips_query_string() {
        let link = "https://open.spotify.com/playlist/29TRiiXCIQTT84JpR398jN?si=a3e5e6eec0fe4e52";
        assert_eq!(playlist_id(link).unwrap(), "29TRiiXCIQTT84JpR398jN");
    }

    #[test]
    fn playlist_id_rejects_non_urls() {
        assert!(matches!(playlist_id("Hi/dude?what"), Err(PipelineError::Input(_))));
        assert!(matches!(playlist_id(""), Err(PipelineError::Input(_))));
    }

    #[test]
    fn empty_link_is_invalid_without_fetch() {
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        assert!(!validator.is_valid("").unwrap());
        assert!(!validator.is_valid("   ").unwrap());
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn malformed_link_is_invalid_without_fetch() {
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        assert!(!validator.is_valid("Hi/dude?what").unwrap());
        assert!(!validator.is_valid("ftp://open.spotify.com/playlist/x").unwrap());
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn off_domain_link_is_invalid() {
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        assert!(!validator.is_valid("https://google.com").unwrap());
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn non_success_status_is_invalid_not_error() {
        let probe = FakeProbe::default().with_status(PUBLIC, 404);
        let validator = LinkValidator::new(&probe);
        assert!(!validator.is_valid(PUBLIC).unwrap());
    }

    #[test]
    fn reachable_playlist_link_is_valid() {
        let probe = FakeProbe::default();
        let validator = LinkValidator::new(&probe);
        assert!(validator.is_valid(PUBLIC).unwrap());
    }

    #[test]
    fn transport_failure_is_reported() {
        let probe = FakeProbe {
            unreachable: true,
            ..FakeProbe::default()
        };
        let validator = LinkValidator::new(&probe);
        assert!(matches!(
            validator.is_valid(PUBLIC),
            Err(PipelineError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn verdicts_are_reused_within_a_run() {
        let probe = FakeProbe::default().with_status(PUBLIC, 404);
        let validator = LinkValidator::new(&probe);
        assert!(!validator.is_valid(PUBLIC).unwrap());
        assert!(!validator.is_valid(PUBLIC).unwrap());
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn http_probe_returns_status_codes() {
        let (base, requests) = serve_responses(vec![
            http_response(200, "ok"),
            http_response(404, "missing"),
        ]);
        let probe = HttpProbe::new(DEFAULT_LINK_TIMEOUT, RetryConfig::with_attempts(1));
        assert_eq!(probe.fetch_status(&format!("{base}/playlist/a")).unwrap(), Some(200));
        assert_eq!(probe.fetch_status(&format!("{base}/playlist/b")).unwrap(), Some(404));
        assert_eq!(requests.recv().unwrap(), "GET /playlist/a HTTP/1.1");
    }

    #[test]
    fn http_probe_reports_silence_as_no_answer() {
        let base = serve_silence(Duration::from_secs(2));
        let probe = HttpProbe::new(Duration::from_millis(200), RetryConfig::with_attempts(1));
        assert_eq!(probe.fetch_status(&format!("{base}/playlist/slow")).unwrap(), None);
    }

    #[test]
    fn link_that_times_out_is_invalid_not_error() {
        let probe = FakeProbe::default().with_no_answer(PUBLIC);
        let validator = LinkValidator::new(&probe);
        assert!(!validator.is_valid(PUBLIC).unwrap());
        assert_eq!(probe.calls.get(), 1);
    }
}
