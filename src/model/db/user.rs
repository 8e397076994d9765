use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::{
    api::{auth::Rights, email::Email},
    mongodb::Id,
};

/// Academic branch a user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    /// Computer Science.
    Cse,
    /// Electronics and Communication.
    Ece,
    /// Mechanical.
    Me,
    /// Civil.
    Ce,
    /// Electrical.
    Ee,
}

/// Year of study, first to fourth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum YearOfStudy {
    First = 1,
    Second = 2,
    Third = 3,
    Fourth = 4,
}

/// Core user account data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub email: Email,
    pub name: String,
    pub role: Rights,
    pub branch: Branch,
    pub year_of_study: YearOfStudy,
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user account from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}
