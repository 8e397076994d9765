use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    api::id::ApiId,
    db::{Election, NewElection},
};

/// An election as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TryFrom<ElectionSpec> for NewElection {
    type Error = crate::error::Error;

    fn try_from(spec: ElectionSpec) -> Result<Self> {
        NewElection::new(spec.name, spec.start_time, spec.end_time)
    }
}

/// An election as presented to clients, with its derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub active: bool,
    /// Active and within the voting window.
    pub open: bool,
    /// Past the end of the voting window.
    pub ended: bool,
}

impl ElectionDescription {
    /// Describe the election as it stands at the given instant.
    pub fn at(election: Election, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            open: election.is_open_at(now),
            ended: election.has_ended_at(now),
            name: election.election.name,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            active: election.election.active,
        }
    }
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self::at(election, Utc::now())
    }
}
