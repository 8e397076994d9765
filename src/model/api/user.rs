use serde::{Deserialize, Serialize};

use crate::model::{
    api::{auth::Rights, email::Email, id::ApiId},
    db::{Branch, User, YearOfStudy},
};

/// An account as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: ApiId,
    pub name: String,
    pub email: Email,
    pub role: Rights,
    pub branch: Branch,
    pub year_of_study: YearOfStudy,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            name: user.user.name,
            email: user.user.email,
            role: user.user.role,
            branch: user.user.branch,
            year_of_study: user.user.year_of_study,
        }
    }
}
