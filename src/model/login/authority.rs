use chrono::{Duration, Utc};
use mongodb::{
    bson::{self, doc},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    db::{LoginToken, LoginTokenCore, NewLoginToken, TokenStatus, User, Voter},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{secret::TokenSecret, signed::SignedToken};

/// Default lifetime of a login link.
pub const DEFAULT_TTL_MINUTES: i64 = 15;

/// Attempts at finding an unused secret before giving up.
const ISSUE_ATTEMPTS: usize = 3;

/// Issues, signs, validates and retires single-use login tokens.
pub struct TokenAuthority {
    pub(super) tokens: Coll<LoginToken>,
    new_tokens: Coll<NewLoginToken>,
    pub(super) users: Coll<User>,
    voters: Coll<Voter>,
    signing_key: Vec<u8>,
}

impl TokenAuthority {
    /// Create an authority over the given database, signing with the given key.
    pub fn new(db: &Database, signing_key: &[u8]) -> Self {
        Self {
            tokens: Coll::from_db(db),
            new_tokens: Coll::from_db(db),
            users: Coll::from_db(db),
            voters: Coll::from_db(db),
            signing_key: signing_key.to_vec(),
        }
    }

    /// Issue a fresh token for the given user, valid for `ttl`.
    pub async fn issue(&self, user: &User, ttl: Duration) -> Result<LoginToken> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let token = LoginTokenCore::new(user.id, TokenSecret::generate(), Utc::now(), ttl);
            match self.new_tokens.insert_one(&token, None).await {
                Ok(result) => {
                    let id: Id = result
                        .inserted_id
                        .as_object_id()
                        .unwrap() // Valid because the ID comes directly from the DB
                        .into();
                    debug!("Issued login token {id} for user {}", user.id);
                    return Ok(LoginToken { id, token });
                }
                // A secret collision is astronomically unlikely, but the unique index is the
                // authority on it.
                Err(e) if is_duplicate_key_error(&e) && attempts < ISSUE_ATTEMPTS => {
                    warn!("Login token secret collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Wrap the token's secret in a tamper-evident signature.
    pub fn sign(&self, token: &LoginTokenCore) -> SignedToken {
        SignedToken::sign(&token.token, &self.signing_key)
    }

    /// Check the signature, then atomically mark the token as used and return its owner.
    ///
    /// The compare-and-set on `used` means that of any number of concurrent
    /// verifications of the same token, at most one succeeds.
    pub async fn verify_and_consume(&self, signed: &SignedToken) -> Result<User> {
        let secret = signed.unsign(&self.signing_key)?;
        let now = Utc::now();
        let bson_now = bson::DateTime::from_chrono(now);

        let filter = doc! {
            "token": secret.as_str(),
            "used": false,
            "expires_at": { "$gt": bson_now },
        };
        let update = doc! {
            "$set": {
                "used": true,
                "used_at": bson_now,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let consumed = self
            .tokens
            .find_one_and_update(filter, update, options)
            .await?;

        let token = match consumed {
            Some(token) => token,
            None => {
                // Work out why the token didn't match, for the user's benefit.
                let existing = self
                    .tokens
                    .find_one(doc! { "token": secret.as_str() }, None)
                    .await?
                    .ok_or_else(|| Error::not_found("Login link"))?;
                return Err(match existing.status_at(now) {
                    TokenStatus::Used => Error::AlreadyUsed,
                    TokenStatus::Expired | TokenStatus::Valid => Error::Expired,
                });
            }
        };

        let user = self
            .users
            .find_one(token.user_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("User {}", token.user_id)))?;

        // Logging in via the emailed link proves the voter owns the address.
        self.voters
            .update_one(
                doc! { "user_id": user.id },
                doc! { "$set": { "email_verified": true } },
                None,
            )
            .await?;

        info!("Login token {} consumed by user {}", token.id, user.id);
        Ok(user)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TokenAuthority {
    type Error = ();

    /// Build the authority from managed state.
    ///
    /// Panics iff the [`Database`] or [`Config`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        let config = req.guard::<&State<Config>>().await.unwrap();
        request::Outcome::Success(TokenAuthority::new(db, config.hmac_secret()))
    }
}

#[cfg(test)]
mod tests {
    use rocket::futures::future::join_all;

    use crate::model::db::{NewUser, NewVoter};

    use super::*;

    async fn insert_user(db: &Database) -> User {
        let new_users = Coll::<NewUser>::from_db(db);
        let id: Id = new_users
            .insert_one(NewUser::example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        Coll::<NewVoter>::from_db(db)
            .insert_one(NewVoter::new(id), None)
            .await
            .unwrap();
        Coll::<User>::from_db(db)
            .find_one(id.as_doc(), None)
            .await
            .unwrap()
            .unwrap()
    }

    #[backend_test]
    async fn issue_then_consume_once(db: Database, voters: Coll<Voter>) {
        let authority = TokenAuthority::new(&db, b"test key");
        let user = insert_user(&db).await;

        let token = authority
            .issue(&user, Duration::minutes(DEFAULT_TTL_MINUTES))
            .await
            .unwrap();
        assert!(!token.used);
        let signed = authority.sign(&token);

        let consumed_by = authority.verify_and_consume(&signed).await.unwrap();
        assert_eq!(user.id, consumed_by.id);

        let stored = authority
            .tokens
            .find_one(token.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.used);
        assert!(stored.used_at.is_some());

        let voter = voters
            .find_one(doc! { "user_id": user.id }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(voter.email_verified);
        assert!(!voter.has_voted);

        // The second attempt always fails, and says why.
        assert!(matches!(
            authority.verify_and_consume(&signed).await,
            Err(Error::AlreadyUsed)
        ));
    }

    #[backend_test]
    async fn zero_ttl_is_expired(db: Database) {
        let authority = TokenAuthority::new(&db, b"test key");
        let user = insert_user(&db).await;

        for ttl in [Duration::zero(), Duration::minutes(-10)] {
            let token = authority.issue(&user, ttl).await.unwrap();
            let signed = authority.sign(&token);
            assert!(matches!(
                authority.verify_and_consume(&signed).await,
                Err(Error::Expired)
            ));
        }
    }

    #[backend_test]
    async fn unknown_and_tampered_tokens(db: Database) {
        let authority = TokenAuthority::new(&db, b"test key");
        let user = insert_user(&db).await;

        // Correctly signed, but never issued.
        let stranger = SignedToken::sign(&TokenSecret::generate(), b"test key");
        assert!(matches!(
            authority.verify_and_consume(&stranger).await,
            Err(Error::NotFound(_))
        ));

        // Issued, but signed by someone else.
        let token = authority.issue(&user, Duration::minutes(15)).await.unwrap();
        let forged = SignedToken::sign(&token.token.token, b"attacker key");
        assert!(matches!(
            authority.verify_and_consume(&forged).await,
            Err(Error::TamperedOrInvalidSignature)
        ));

        // The forgery must not have burned the real token.
        let signed = authority.sign(&token);
        assert!(authority.verify_and_consume(&signed).await.is_ok());
    }

    #[backend_test]
    async fn concurrent_consumption_succeeds_once(db: Database) {
        let authority = TokenAuthority::new(&db, b"test key");
        let user = insert_user(&db).await;
        let token = authority.issue(&user, Duration::minutes(15)).await.unwrap();
        let signed = authority.sign(&token);

        let attempts = (0..8).map(|_| authority.verify_and_consume(&signed));
        let results = join_all(attempts).await;

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(1, successes);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(Error::AlreadyUsed))));
    }
}
