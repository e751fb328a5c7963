//! Local mirror of Riot API account, match and profile data, kept up to date
//! by a throttled job queue.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod riot;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
