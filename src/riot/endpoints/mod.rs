mod account;
mod challenges;
mod ddragon;
mod mastery;
mod match_v5;
mod summoner;

pub use match_v5::MatchIdsQuery;
