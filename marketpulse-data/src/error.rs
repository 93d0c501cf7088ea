use thiserror::Error;

/// All errors generated in `marketpulse-data`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
pub enum DataError {
    /// Upstream answered HTTP 429. Retried internally with backoff; surfaces
    /// only once the final attempt was also rate limited.
    #[error("rate limited by upstream: {endpoint}")]
    RateLimited { endpoint: String },

    /// Request never produced a response (DNS, TLS, connect or read failure,
    /// per-attempt timeout included).
    #[error("transport failure for {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// Upstream answered with a non-success status other than 429.
    #[error("upstream returned HTTP {status} for {endpoint}")]
    Http { endpoint: String, status: u16 },

    /// The retry budget is spent; carries a description of the last failure.
    #[error("retries exhausted after {attempts} attempts for {endpoint}: {last}")]
    RetriesExhausted {
        endpoint: String,
        attempts: usize,
        last: String,
    },

    /// Upstream answered 2xx but the body did not match the expected schema.
    /// Never retried: the exchange responded, the payload is the problem.
    #[error("malformed payload from {context}: {message}")]
    MalformedPayload { context: String, message: String },

    /// An optional sub-feature (liquidation stream, spot trades) could not be
    /// served. Recorded as an explicit gap in the snapshot, never aborts a
    /// collection cycle.
    #[error("{feature} unavailable: {reason}")]
    Unavailable {
        feature: &'static str,
        reason: String,
    },

    /// An inbound stream frame could not be parsed. Logged and dropped by the
    /// consumer; the stream keeps running.
    #[error("malformed stream message: {0}")]
    MalformedMessage(String),
}

impl DataError {
    /// Determine if an error aborts the collection cycle that observed it.
    ///
    /// Transient variants only ever exist inside the retry loop; what escapes
    /// the [`RestClient`](crate::http::RestClient) is terminal for the cycle.
    /// [`DataError::Unavailable`] and [`DataError::MalformedMessage`] degrade
    /// locally instead.
    pub fn is_terminal(&self) -> bool {
        match self {
            DataError::RetriesExhausted { .. } => true,
            DataError::MalformedPayload { .. } => true,
            DataError::RateLimited { .. }
            | DataError::Transport { .. }
            | DataError::Http { .. }
            | DataError::Unavailable { .. }
            | DataError::MalformedMessage(_) => false,
        }
    }

    /// True for failures the retry loop is allowed to spend budget on.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::RateLimited { .. }
                | DataError::Transport { .. }
                | DataError::Http { .. }
        )
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        let endpoint = value
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        Self::Transport {
            endpoint,
            message: value.to_string(),
        }
    }
}
