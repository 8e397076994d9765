use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::User,
    mongodb::{Coll, Id},
};

use super::user::{role, Rights, Role};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
///
/// The type parameter is the capability the token has been checked against.
#[derive(Debug)]
pub struct AuthToken<R> {
    pub id: Id,
    pub rights: Rights,
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// Does this token permit the given capability?
    pub fn permits<T: Role>(&self) -> bool {
        T::permits(self.rights)
    }

    /// Check this token against a different capability.
    pub fn narrow<T: Role>(self) -> Option<AuthToken<T>> {
        T::permits(self.rights).then(|| AuthToken {
            id: self.id,
            rights: self.rights,
            phantom: PhantomData,
        })
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a session cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            id: self.id,
            rights: self.rights,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }
}

impl<R: Role> AuthToken<R> {
    /// Create a new [`AuthToken`] for the given user, if their role grants the capability.
    pub fn new(user: &User) -> Option<Self> {
        R::permits(user.role).then(|| Self {
            id: user.id,
            rights: user.role,
            phantom: PhantomData,
        })
    }

    /// Deserialize a token from a cookie, checking it grants the capability.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let claims = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims)?;
        if !R::permits(claims.rights) {
            return Err(Error::Forbidden(format!(
                "{} accounts cannot do this",
                claims.rights
            )));
        }
        Ok(Self {
            id: claims.id,
            rights: claims.rights,
            phantom: PhantomData,
        })
    }
}

impl AuthToken<role::Any> {
    /// Create a session token for the given user, carrying whatever rights their role has.
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id,
            rights: user.role,
            phantom: PhantomData,
        }
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    id: Id,
    #[serde(rename = "rgt")]
    rights: Rights,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Role + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this
    /// capability.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = try_outcome!(req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .into_outcome((Status::Unauthorized, Error::Unauthenticated)));

        // Decode the token and check it represents the correct rights.
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e @ Error::Forbidden(_)) => return Outcome::Failure((Status::Forbidden, e)),
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        // Check the user still exists with the same role.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        match Coll::<User>::from_db(db).find_one(token.id.as_doc(), None).await {
            Ok(Some(user)) if user.role == token.rights => Outcome::Success(token),
            Ok(_) => Outcome::Failure((Status::Unauthorized, Error::Unauthenticated)),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::NewUser;

    fn user(role: Rights) -> User {
        User {
            id: Id::new(),
            user: NewUser {
                role,
                ..NewUser::example()
            },
        }
    }

    #[test]
    fn capability_requires_matching_role() {
        let voter = user(Rights::Voter);
        assert!(AuthToken::<role::Voter>::new(&voter).is_some());
        assert!(AuthToken::<role::Admin>::new(&voter).is_none());
        assert!(AuthToken::<role::Candidate>::new(&voter).is_none());

        let admin = user(Rights::Admin);
        let any = AuthToken::for_user(&admin);
        assert_eq!(admin.id, any.id);
        assert!(any.permits::<role::Admin>());
        assert!(any.narrow::<role::Admin>().is_some());
    }

    #[test]
    fn cookie_round_trip_checks_capability() {
        let config = Config::example();
        let admin = user(Rights::Admin);
        let cookie = AuthToken::for_user(&admin).into_cookie(&config);

        let token = AuthToken::<role::Admin>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(admin.id, token.id);
        assert!(matches!(
            AuthToken::<role::Voter>::from_cookie(&cookie, &config),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn forged_cookie_rejected() {
        let config = Config::example();
        let admin = user(Rights::Admin);
        let cookie = AuthToken::for_user(&admin).into_cookie(&config);
        let forged = Cookie::new(AUTH_TOKEN_COOKIE, format!("{}x", cookie.value()));
        assert!(matches!(
            AuthToken::<role::Admin>::from_cookie(&forged, &config),
            Err(Error::Jwt(_))
        ));
    }
}
