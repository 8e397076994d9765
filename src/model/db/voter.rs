use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core voter profile data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// The account this profile belongs to.
    pub user_id: Id,
    /// Whether this voter has cast a vote. Updated alongside vote creation.
    pub has_voted: bool,
    /// Whether the voter has proved ownership of their email by logging in.
    pub email_verified: bool,
}

impl VoterCore {
    /// Create a fresh profile for the given account.
    pub fn new(user_id: Id) -> Self {
        Self {
            user_id,
            has_voted: false,
            email_verified: false,
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter profile from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
