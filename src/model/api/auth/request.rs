use serde::{Deserialize, Serialize};

use crate::model::{
    api::email::Email,
    db::{Branch, NewUser, YearOfStudy},
};

use super::user::Rights;

/// A request for a login link to be emailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLinkRequest {
    pub email: Email,
}

/// The outcome of a login link request.
///
/// `dev_link` is only ever populated in development mode, when the link
/// could not be delivered and is handed straight back to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginLinkResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_link: Option<String>,
}

/// A self-registration request. Registered users are always voters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: Email,
    pub branch: Branch,
    pub year_of_study: YearOfStudy,
}

impl From<RegistrationRequest> for NewUser {
    fn from(request: RegistrationRequest) -> Self {
        Self {
            email: request.email,
            name: request.name.trim().to_string(),
            role: Rights::Voter,
            branch: request.branch,
            year_of_study: request.year_of_study,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl LoginLinkRequest {
        pub fn example() -> Self {
            Self {
                email: Email::example(),
            }
        }
    }

    impl RegistrationRequest {
        pub fn example() -> Self {
            Self {
                name: "Ada Lovelace".to_string(),
                email: Email::example(),
                branch: Branch::Cse,
                year_of_study: YearOfStudy::Third,
            }
        }
    }
}
