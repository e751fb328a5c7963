use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Riot API error: {status} - {message}")]
    RiotApi { status: u16, message: String },

    #[error("Riot API rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Player not found: {game_name}#{tag_line}")]
    PlayerNotFound { game_name: String, tag_line: String },

    #[error("Match {match_id} could not be ingested: {reason}")]
    IngestFailed { match_id: String, reason: String },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Provider-supplied backoff when this error is a rate limit rejection.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PlayerNotFound { .. } | Self::RiotApi { status: 404, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_only_for_rate_limits() {
        let limited = AppError::RateLimited {
            retry_after: Duration::from_secs(3),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));

        let other = AppError::RiotApi {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(other.retry_after(), None);
    }

    #[test]
    fn not_found_covers_identity_and_http_404() {
        let player = AppError::PlayerNotFound {
            game_name: "abc".into(),
            tag_line: "1".into(),
        };
        assert!(player.is_not_found());
        assert!(
            AppError::RiotApi {
                status: 404,
                message: String::new()
            }
            .is_not_found()
        );
        assert!(!AppError::Config("x".into()).is_not_found());
    }
}
