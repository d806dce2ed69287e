//! Consensus: weighted voting elections keyed by conflict root.
//!
//! Representatives vote on candidate blocks; an election confirms once a
//! single candidate's weighted tally clears quorum. Elections are
//! reprioritized by observed proof-of-work difficulty when announcement
//! bandwidth is scarce.

pub mod active;
pub mod election;
pub mod online_reps;
pub mod vote;
pub mod vote_cache;
pub mod vote_uniquer;

pub use active::{ActiveElections, ElectionStatus, ANNOUNCEMENT_MAX};
pub use election::{Election, QuorumConfig, VoteInfo, NOT_AN_ACCOUNT};
pub use online_reps::OnlineReps;
pub use vote::{Vote, VoteCode, VotePayload, MAX_VOTE_HASHES};
pub use vote_cache::VoteCache;
pub use vote_uniquer::VoteUniquer;
