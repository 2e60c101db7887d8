/// Failure kinds shared by the validator, the aggregator and the collaborators.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed or unusable input. Recovered locally into `false` or a sentinel score.
    #[error("invalid input: {0}")]
    Input(String),
    /// A remote service could not be reached or answered unexpectedly.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        service: &'static str,
        reason: String,
    },
    /// A reduction ran over zero usable values.
    #[error("no usable data: {0}")]
    NoData(String),
}

impl PipelineError {
    pub fn upstream(service: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.into(),
        }
    }
}
