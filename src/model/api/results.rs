use serde::{Deserialize, Serialize};

use crate::model::api::{election::ElectionDescription, id::ApiId};

/// One candidate's line in the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: ApiId,
    pub name: String,
    pub slogan: String,
    pub votes: u64,
    /// Share of all votes cast, rounded to two decimal places.
    pub percentage: f64,
}

/// Results of an election, ordered by votes, most first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election: ElectionDescription,
    pub candidates: Vec<CandidateResult>,
    pub total_votes: u64,
    pub total_eligible_voters: u64,
    /// Votes cast as a percentage of registered voters, rounded to two decimal places.
    pub turnout: f64,
}
