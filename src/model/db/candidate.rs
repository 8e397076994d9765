use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate profile data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// The account this profile belongs to.
    pub user_id: Id,
    /// Display name, copied from the account on promotion.
    pub name: String,
    pub manifesto: String,
    pub slogan: String,
    /// Cached count of all votes naming this candidate.
    /// Always recomputed from the votes collection, never incremented.
    pub votes_received: u64,
}

impl CandidateCore {
    /// Create an empty profile for the given account.
    pub fn new(user_id: Id, name: String) -> Self {
        Self {
            user_id,
            name,
            manifesto: String::new(),
            slogan: String::new(),
            votes_received: 0,
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate profile from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
