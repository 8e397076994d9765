mod request;
mod token;
mod user;

pub use request::{LoginLinkRequest, LoginLinkResponse, RegistrationRequest};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{role, Rights, Role};
