use rocket::{serde::json::Json, Catcher, Request, Route};
use rocket::serde::json::{serde_json::json, Value};

mod admin;
pub(crate) mod auth;
mod candidate;
mod results;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(candidate::routes());
    routes.extend(results::routes());
    routes.extend(voting::routes());
    routes
}

/// JSON error bodies for failures that happen before a handler runs,
/// e.g. a missing session or a malformed request body.
pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, unauthorized, forbidden, not_found, unprocessable]
}

fn error_body(kind: &str, message: &str) -> Json<Value> {
    Json(json!({
        "error": kind,
        "message": message,
    }))
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    error_body("invalid_input", "Malformed request")
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    error_body("unauthenticated", "Not logged in")
}

#[catch(403)]
fn forbidden() -> Json<Value> {
    error_body("forbidden", "Your account cannot do this")
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    error_body("not_found", &format!("No such resource: {}", req.uri()))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    error_body("invalid_input", "Request body could not be understood")
}
