use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::Candidate};

/// Longest slogan a candidate may set, in characters.
pub const MAX_SLOGAN_CHARS: usize = 200;

/// A candidate as shown on the ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: ApiId,
    pub name: String,
    pub slogan: String,
    pub manifesto: String,
}

impl From<Candidate> for CandidateSummary {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            slogan: candidate.candidate.slogan,
            manifesto: candidate.candidate.manifesto,
        }
    }
}

/// A candidate's own view of their profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: ApiId,
    pub user_id: ApiId,
    pub name: String,
    pub manifesto: String,
    pub slogan: String,
    pub votes_received: u64,
}

impl From<Candidate> for CandidateProfile {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            user_id: candidate.user_id.into(),
            name: candidate.candidate.name,
            manifesto: candidate.candidate.manifesto,
            slogan: candidate.candidate.slogan,
            votes_received: candidate.candidate.votes_received,
        }
    }
}

/// New manifesto and slogan for the caller's candidate profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub manifesto: String,
    pub slogan: String,
}

/// Make the given user a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub user_id: ApiId,
}
