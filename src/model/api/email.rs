use std::fmt::{Display, Formatter};
use std::{ops::Deref, str::FromStr};

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user's email address, normalised to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email {
    inner: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Email address is empty")]
    Empty,
    #[error("Email address `{0}` is malformed")]
    Malformed(String),
}

impl Deref for Email {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        let well_formed = match trimmed.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && domain.contains('.')
                    && !trimmed.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if !well_formed {
            return Err(EmailError::Malformed(trimmed.to_string()));
        }
        Ok(Self {
            inner: trimmed.to_lowercase(),
        })
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.inner
    }
}

impl From<Email> for Bson {
    fn from(email: Email) -> Self {
        Bson::String(email.inner)
    }
}
