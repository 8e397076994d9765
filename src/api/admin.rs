use rocket::{http::Status, serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{role, AuthToken},
            candidate::{CandidateProfile, PromotionRequest},
            election::{ElectionDescription, ElectionSpec},
            user::UserSummary,
        },
        ledger::Ledger,
        mongodb::Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        elections,
        create_election,
        toggle_election,
        delete_election,
        eligible_candidates,
        promote_candidate,
    ]
}

#[get("/elections")]
async fn elections(
    token: AuthToken<role::Admin>,
    ledger: Ledger,
) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = ledger.list_elections(&token).await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<role::Admin>,
    spec: Json<ElectionSpec>,
    ledger: Ledger,
) -> Result<(Status, Json<ElectionDescription>)> {
    let election = ledger.create_election(&token, spec.0).await?;
    Ok((Status::Created, Json(election.into())))
}

#[post("/elections/<election_id>/toggle")]
async fn toggle_election(
    token: AuthToken<role::Admin>,
    election_id: Id,
    ledger: Ledger,
) -> Result<Json<ElectionDescription>> {
    let election = ledger.toggle_active(&token, election_id).await?;
    Ok(Json(election.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<role::Admin>,
    election_id: Id,
    ledger: Ledger,
) -> Result<Status> {
    ledger.delete_election(&token, election_id).await?;
    Ok(Status::NoContent)
}

#[get("/candidates/eligible")]
async fn eligible_candidates(
    token: AuthToken<role::Admin>,
    ledger: Ledger,
) -> Result<Json<Vec<UserSummary>>> {
    let users = ledger.eligible_candidates(&token).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[post("/candidates", data = "<request>", format = "json")]
async fn promote_candidate(
    token: AuthToken<role::Admin>,
    request: Json<PromotionRequest>,
    ledger: Ledger,
) -> Result<Json<CandidateProfile>> {
    let candidate = ledger
        .promote_candidate(&token, request.0.user_id.into())
        .await?;
    Ok(Json(candidate.into()))
}
