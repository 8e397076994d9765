use std::ops::Deref;

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{login::TokenSecret, mongodb::Id};

/// Core login token data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginTokenCore {
    /// The account this token logs in as.
    pub user_id: Id,
    /// The opaque secret. Unique across all tokens.
    pub token: TokenSecret,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    #[serde(default, with = "optional_bson_datetime")]
    pub used_at: Option<DateTime<Utc>>,
}

/// Why a stored token can no longer be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Used,
    Expired,
}

impl LoginTokenCore {
    /// Create a fresh, unused token for the given user, valid for `ttl` from `now`.
    pub fn new(user_id: Id, token: TokenSecret, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_id,
            token,
            created_at: now,
            expires_at: now + ttl,
            used: false,
            used_at: None,
        }
    }

    /// Classify this token at the given instant. Use takes precedence over expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.used {
            TokenStatus::Used
        } else if self.expires_at <= now {
            TokenStatus::Expired
        } else {
            TokenStatus::Valid
        }
    }
}

/// A login token without an ID.
pub type NewLoginToken = LoginTokenCore;

/// A login token from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginToken {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub token: LoginTokenCore,
}

impl Deref for LoginToken {
    type Target = LoginTokenCore;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

/// (De)serialisation for optional datetimes in MongoDB's native format.
mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_valid_until_expiry() {
        let now = Utc::now();
        let token = LoginTokenCore::new(Id::new(), TokenSecret::generate(), now, Duration::minutes(15));
        assert_eq!(now + Duration::minutes(15), token.expires_at);
        assert!(!token.used);
        assert!(token.used_at.is_none());
        assert_eq!(TokenStatus::Valid, token.status_at(now));
        assert_eq!(TokenStatus::Valid, token.status_at(now + Duration::minutes(14)));
        assert_eq!(TokenStatus::Expired, token.status_at(now + Duration::minutes(15)));
    }

    #[test]
    fn zero_ttl_is_expired_immediately() {
        let now = Utc::now();
        let token = LoginTokenCore::new(Id::new(), TokenSecret::generate(), now, Duration::zero());
        assert_eq!(TokenStatus::Expired, token.status_at(now));

        let token = LoginTokenCore::new(Id::new(), TokenSecret::generate(), now, Duration::minutes(-5));
        assert_eq!(TokenStatus::Expired, token.status_at(now));
    }

    #[test]
    fn used_takes_precedence_over_expired() {
        let now = Utc::now();
        let mut token = LoginTokenCore::new(Id::new(), TokenSecret::generate(), now, Duration::zero());
        token.used = true;
        token.used_at = Some(now);
        assert_eq!(TokenStatus::Used, token.status_at(now + Duration::days(1)));
    }
}
