use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// Election start time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Election end time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// At most one election is active at any time.
    pub active: bool,
}

impl ElectionCore {
    /// Create a new, inactive election, checking that the voting window is non-empty.
    pub fn new(name: String, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<Self> {
        if start_time >= end_time {
            return Err(Error::InvalidWindow);
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("Election name is empty".to_string()));
        }
        Ok(Self {
            name,
            start_time,
            end_time,
            active: false,
        })
    }

    /// Is voting open at the given instant?
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.start_time <= now && now <= self.end_time
    }

    /// Is voting open right now?
    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    /// Had the election finished at the given instant?
    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }

    /// Has the election finished?
    pub fn has_ended(&self) -> bool {
        self.has_ended_at(Utc::now())
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl ElectionCore {
        /// An active election that is currently open.
        pub fn current_example() -> Self {
            let now = Utc::now();
            Self {
                name: "Student Council President".to_string(),
                start_time: now - Duration::days(1),
                end_time: now + Duration::days(1),
                active: true,
            }
        }

        /// An election that has finished.
        pub fn past_example() -> Self {
            let now = Utc::now();
            Self {
                name: "Last Year's Council".to_string(),
                start_time: now - Duration::days(30),
                end_time: now - Duration::days(29),
                active: false,
            }
        }

        /// An election that hasn't started yet.
        pub fn future_example() -> Self {
            let now = Utc::now();
            Self {
                name: "Sports Captain".to_string(),
                start_time: now + Duration::days(29),
                end_time: now + Duration::days(30),
                active: false,
            }
        }
    }
}
