use serde::{Deserialize, Serialize};

use crate::riot::Platform;

/// Work the scheduler knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Resolve an account then refresh its profile and match history.
    FullSync {
        game_name: String,
        tag_line: String,
        region: Platform,
    },
    /// Re-verify an account identity upstream.
    IdentityOnlySync {
        game_name: String,
        tag_line: String,
        region: Platform,
    },
    IngestOneMatch {
        match_id: String,
        region: Platform,
    },
    /// List the matches of an account and queue the unknown ones.
    DiscoverAndEnqueue { puuid: String, region: Platform },
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FullSync { .. } => "full_sync",
            Self::IdentityOnlySync { .. } => "identity_only_sync",
            Self::IngestOneMatch { .. } => "ingest_one_match",
            Self::DiscoverAndEnqueue { .. } => "discover_and_enqueue",
        }
    }

    /// Key shared by jobs doing the same work.
    pub fn dedup_key(&self) -> String {
        match self {
            Self::FullSync {
                game_name,
                tag_line,
                region,
            }
            | Self::IdentityOnlySync {
                game_name,
                tag_line,
                region,
            } => format!(
                "{}:{}#{}@{region}",
                self.kind(),
                game_name.to_lowercase(),
                tag_line.to_lowercase()
            ),
            Self::IngestOneMatch { match_id, .. } => format!("{}:{match_id}", self.kind()),
            Self::DiscoverAndEnqueue { puuid, region } => {
                format!("{}:{puuid}@{region}", self.kind())
            }
        }
    }

    /// Short description used in logs.
    pub fn subject(&self) -> String {
        match self {
            Self::FullSync {
                game_name,
                tag_line,
                region,
            }
            | Self::IdentityOnlySync {
                game_name,
                tag_line,
                region,
            } => format!("{game_name}#{tag_line}@{region}"),
            Self::IngestOneMatch { match_id, .. } => match_id.clone(),
            Self::DiscoverAndEnqueue { puuid, region } => format!("{puuid}@{region}"),
        }
    }
}
