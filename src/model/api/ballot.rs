use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{candidate::CandidateSummary, election::ElectionDescription, id::ApiId},
    db::Vote,
};

/// What a voter needs in order to vote: the open election and its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub election: ElectionDescription,
    pub candidates: Vec<CandidateSummary>,
}

/// A voter's choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: ApiId,
}

/// Confirmation of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub timestamp: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id.into(),
            election_id: vote.vote.election_id.into(),
            candidate_id: vote.vote.candidate_id.into(),
            timestamp: vote.vote.timestamp,
        }
    }
}
