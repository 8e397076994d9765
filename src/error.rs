use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::{serde_json::json, Json},
    Request,
};
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Start time must be before end time")]
    InvalidWindow,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid or tampered login link")]
    TamperedOrInvalidSignature,
    #[error("This login link has expired")]
    Expired,
    #[error("This login link has already been used")]
    AlreadyUsed,
    #[error("Election {0} is not open for voting")]
    ElectionNotOpen(Id),
    #[error("Already voted in election {0}")]
    AlreadyVoted(Id),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not logged in")]
    Unauthenticated,
    #[error("Failed to send login link: {0}")]
    DeliveryFailed(String),
    #[error("Ledger invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Construct a [`Error::NotFound`] describing the missing thing.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Short machine-readable name for this kind of error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Db(_) => "database",
            Self::Jwt(_) => "session",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidWindow => "invalid_window",
            Self::NotFound(_) => "not_found",
            Self::TamperedOrInvalidSignature => "tampered_or_invalid_signature",
            Self::Expired => "expired",
            Self::AlreadyUsed => "already_used",
            Self::ElectionNotOpen(_) => "election_not_open",
            Self::AlreadyVoted(_) => "already_voted",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthenticated => "unauthenticated",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::Invariant(_) => "invariant",
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Invariant(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::InvalidInput(_) | Self::InvalidWindow | Self::TamperedOrInvalidSignature => {
                Status::BadRequest
            }
            Self::NotFound(_) => Status::NotFound,
            Self::Expired => Status::Gone,
            Self::AlreadyUsed | Self::ElectionNotOpen(_) | Self::AlreadyVoted(_) => {
                Status::Conflict
            }
            Self::Forbidden(_) => Status::Forbidden,
            Self::Unauthenticated => Status::Unauthorized,
            Self::DeliveryFailed(_) => Status::ServiceUnavailable,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        // Never leak database internals to the client.
        let message = match self {
            Self::Db(_) | Self::Invariant(_) => "Internal server error".to_string(),
            ref other => other.to_string(),
        };
        let body = json!({
            "error": self.kind(),
            "message": message,
        });
        Custom(status, Json(body)).respond_to(req)
    }
}
