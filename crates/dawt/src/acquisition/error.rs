use std::time::Duration;

use thiserror::Error;

use crate::error::{ErrorKind, JobError};

/// Coarse reason an acquisition attempt failed, derived from the fetcher's
/// diagnostic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network hiccup or dropped fragment. Worth another attempt.
    Transient,
    AuthRequired,
    RateLimited,
    ContentRestricted,
    Unsupported,
    Unknown,
}

impl FailureClass {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailureClass::AuthRequired => ErrorKind::AuthRequired,
            FailureClass::RateLimited => ErrorKind::RateLimited,
            FailureClass::ContentRestricted => ErrorKind::ContentRestricted,
            FailureClass::Transient | FailureClass::Unsupported | FailureClass::Unknown => {
                ErrorKind::DownloadFailed
            }
        }
    }

    /// Actionable explanation shown to the caller instead of raw tool output.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureClass::Transient => {
                "Could not download the media after several attempts. Check the link and try again."
            }
            FailureClass::AuthRequired => {
                "This content requires a logged-in session. Add an active session credential and try again."
            }
            FailureClass::RateLimited => {
                "The platform is rate limiting downloads right now. Wait a few minutes before retrying."
            }
            FailureClass::ContentRestricted => {
                "This content is private, age-restricted or no longer available."
            }
            FailureClass::Unsupported => "This link is not a supported media source.",
            FailureClass::Unknown => "Could not download the media from this link.",
        }
    }
}

struct Rule {
    needles: &'static [&'static str],
    class: FailureClass,
}

/// Ordered lookup of lowercase substrings. First matching rule wins, so
/// more specific rules come first.
const RULES: &[Rule] = &[
    Rule {
        needles: &["429", "too many requests", "rate-limit", "rate limit"],
        class: FailureClass::RateLimited,
    },
    // Server-side errors read "Service Unavailable" and must not fall
    // through to the content rules below.
    Rule {
        needles: &[
            "http error 5",
            "service unavailable",
            "bad gateway",
            "gateway timeout",
            "gateway time-out",
        ],
        class: FailureClass::Transient,
    },
    Rule {
        needles: &[
            "login required",
            "log in",
            "login",
            "sign in",
            "--cookies",
            "cookies",
            "authentication",
            "401",
        ],
        class: FailureClass::AuthRequired,
    },
    Rule {
        needles: &[
            "private",
            "age-restricted",
            "age restricted",
            "inappropriate for some users",
            "not available",
            "unavailable",
            "has been removed",
            "403",
            "404",
        ],
        class: FailureClass::ContentRestricted,
    },
    Rule {
        needles: &["unsupported url", "no video formats", "is not a valid url"],
        class: FailureClass::Unsupported,
    },
    Rule {
        needles: &[
            "fragment",
            "timed out",
            "connection reset",
            "connection refused",
            "temporary failure",
            "network is unreachable",
            "unable to download",
            "incomplete read",
        ],
        class: FailureClass::Transient,
    },
];

/// Maps fetcher diagnostic output onto a [`FailureClass`].
pub fn classify(stderr: &str) -> FailureClass {
    let lower = stderr.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| lower.contains(needle)))
        .map(|rule| rule.class)
        .unwrap_or(FailureClass::Unknown)
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Fetcher reported {class:?}: {detail}")]
    Remote { class: FailureClass, detail: String },

    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable media metadata: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Builds a classified error from a failed fetch's stderr.
    pub fn from_stderr(stderr: &str) -> Self {
        FetchError::Remote {
            class: classify(stderr),
            detail: stderr.trim().to_string(),
        }
    }

    /// Returns true if the failure is likely transient and the attempt can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Remote {
                class: FailureClass::Transient,
                ..
            } | FetchError::Timeout(_)
        )
    }

    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::Remote { class, .. } => *class,
            FetchError::Timeout(_) => FailureClass::Transient,
            FetchError::Spawn { .. } | FetchError::Metadata(_) | FetchError::Io(_) => {
                FailureClass::Unknown
            }
        }
    }

    /// The caller-facing error. Raw tool output is deliberately left out.
    pub fn to_job_error(&self) -> JobError {
        let class = self.class();
        JobError::new(class.kind(), class.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth() {
        assert_eq!(
            classify("ERROR: [Instagram] xyz: Requested content is not available, rate-limit reached or login required"),
            FailureClass::RateLimited
        );
        assert_eq!(
            classify("ERROR: [Instagram] abc: login required to access this reel. Use --cookies"),
            FailureClass::AuthRequired
        );
    }

    #[test]
    fn test_classify_restricted() {
        assert_eq!(
            classify("ERROR: [youtube] id: Private video. Sign in if you've been granted access"),
            FailureClass::AuthRequired
        );
        assert_eq!(
            classify("ERROR: [tiktok] 123: This video has been removed"),
            FailureClass::ContentRestricted
        );
        assert_eq!(
            classify("ERROR: HTTP Error 404: Not Found"),
            FailureClass::ContentRestricted
        );
    }

    #[test]
    fn test_classify_transient_and_unknown() {
        assert_eq!(
            classify("ERROR: fragment 3 not found, unable to continue"),
            FailureClass::Transient
        );
        assert_eq!(
            classify("ERROR: Unsupported URL: https://example.org/page"),
            FailureClass::Unsupported
        );
        assert_eq!(classify("something odd happened"), FailureClass::Unknown);
    }

    #[test]
    fn test_classify_server_errors_as_transient() {
        for stderr in [
            "ERROR: unable to download video data: HTTP Error 502: Bad Gateway",
            "ERROR: unable to download video data: HTTP Error 503: Service Unavailable",
            "ERROR: [youtube] abc: HTTP Error 504: Gateway Timeout",
        ] {
            assert_eq!(classify(stderr), FailureClass::Transient, "{}", stderr);
            assert!(FetchError::from_stderr(stderr).is_retryable(), "{}", stderr);
        }
        assert_eq!(
            classify("ERROR: [youtube] abc: Video unavailable. This video is private"),
            FailureClass::ContentRestricted
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(FetchError::from_stderr("Read timed out").is_retryable());
        assert!(FetchError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(!FetchError::from_stderr("HTTP Error 429: Too Many Requests").is_retryable());
        assert!(!FetchError::Metadata("bad json".into()).is_retryable());
    }

    #[test]
    fn test_job_error_hides_raw_output() {
        let err = FetchError::from_stderr("ERROR: [Instagram] secret-id: login required");
        let job_error = err.to_job_error();
        assert_eq!(job_error.kind, ErrorKind::AuthRequired);
        assert!(!job_error.message.contains("secret-id"));
    }
}
