use std::sync::Arc;

use mongodb::{bson::doc, Client};
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    logging::RequestId,
    model::{
        api::{
            auth::{
                AuthToken, LoginLinkRequest, LoginLinkResponse, RegistrationRequest,
                AUTH_TOKEN_COOKIE,
            },
            user::UserSummary,
        },
        db::{NewUser, NewVoter, User},
        login::{SignedToken, TokenAuthority},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    notifier::Notifier,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, request_link, verify, logout]
}

/// Create a voter account.
#[post("/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<RegistrationRequest>,
    new_users: Coll<NewUser>,
    new_voters: Coll<NewVoter>,
    users: Coll<User>,
    db_client: &State<Client>,
) -> Result<(Status, Json<UserSummary>)> {
    let user: NewUser = registration.0.into();
    if user.name.is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let id: Id = match new_users
        .insert_one_with_session(&user, None, &mut session)
        .await
    {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB
            .into(),
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::InvalidInput(
                "An account with this email already exists".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    new_voters
        .insert_one_with_session(NewVoter::new(id), None, &mut session)
        .await?;
    session.commit_transaction().await?;

    let user = users
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {id}")))?;
    info!("Registered voter {id}");
    Ok((Status::Created, Json(user.into())))
}

/// Email a single-use login link to the owner of the given address.
#[post("/auth/link", data = "<request>", format = "json")]
pub async fn request_link(
    request: Json<LoginLinkRequest>,
    users: Coll<User>,
    authority: TokenAuthority,
    notifier: &State<Arc<dyn Notifier>>,
    config: &State<Config>,
    request_id: &RequestId,
) -> Result<Json<LoginLinkResponse>> {
    let email = request.0.email;
    let user = users
        .find_one(doc! { "email": email.clone() }, None)
        .await?
        .ok_or_else(|| Error::not_found("Account with this email"))?;

    let token = authority.issue(&user, config.login_ttl()).await?;
    let signed = authority.sign(&token);
    let link = verification_link(config, &signed);

    match notifier
        .send_login_link(&email, &link, config.login_ttl())
        .await
    {
        Ok(()) => {
            info!("req{request_id}: login link sent to {email}");
            Ok(Json(LoginLinkResponse {
                message: format!(
                    "Login link sent. Check your email; it expires in {} minutes.",
                    config.login_ttl().num_minutes()
                ),
                dev_link: None,
            }))
        }
        Err(e) if config.dev_mode() => {
            warn!("req{request_id}: failed to deliver login link to {email}: {e}");
            warn!("req{request_id}: development login link for {email}: {link}");
            Ok(Json(LoginLinkResponse {
                message: "Email delivery failed; using development link.".to_string(),
                dev_link: Some(link),
            }))
        }
        Err(e) => {
            error!("req{request_id}: failed to deliver login link to {email}: {e}");
            Err(Error::DeliveryFailed(
                "Please try again or contact support".to_string(),
            ))
        }
    }
}

/// The absolute URL a user visits to redeem a login token.
fn verification_link(config: &Config, signed: &SignedToken) -> String {
    format!(
        "{}{}",
        config.public_url(),
        uri!(verify(token = signed.as_str()))
    )
}

/// Redeem a login link, starting a session.
#[get("/auth/verify?<token>")]
pub async fn verify(
    token: &str,
    authority: TokenAuthority,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
) -> Result<Json<UserSummary>> {
    let signed = SignedToken::from(token.to_string());
    let user = authority.verify_and_consume(&signed).await?;

    let session = AuthToken::for_user(&user);
    cookies.add(session.into_cookie(config));

    Ok(Json(user.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
