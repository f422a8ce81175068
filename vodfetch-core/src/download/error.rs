use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http status {status} fetching {url}")]
    Status { status: u16, url: String },
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("request timed out fetching {url}")]
    Timeout { url: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    const TRANSIENT_STATUS: [u16; 4] = [400, 401, 403, 502];

    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => Self::TRANSIENT_STATUS.contains(status),
            FetchError::Network { .. } | FetchError::Timeout { .. } => true,
            FetchError::Io { .. } | FetchError::InvalidUrl { .. } | FetchError::Exhausted { .. } => {
                false
            }
        }
    }

    pub fn from_reqwest(error: reqwest::Error, url: &str) -> Self {
        if error.is_timeout() {
            return FetchError::Timeout {
                url: url.to_string(),
            };
        }
        if let Some(status) = error.status() {
            return FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            };
        }
        FetchError::Network {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        for status in [400u16, 401, 403, 502] {
            let err = FetchError::Status {
                status,
                url: "https://h/seg.ts".into(),
            };
            assert!(err.is_transient(), "{status} should be transient");
        }
        let not_found = FetchError::Status {
            status: 404,
            url: "https://h/seg.ts".into(),
        };
        assert!(!not_found.is_transient());
        let timeout = FetchError::Timeout {
            url: "https://h/seg.ts".into(),
        };
        assert!(timeout.is_transient());
        let exhausted = FetchError::Exhausted {
            attempts: 3,
            last: Box::new(timeout),
        };
        assert!(!exhausted.is_transient());
    }
}
