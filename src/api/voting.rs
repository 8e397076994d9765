use rocket::{http::Status, serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{role, AuthToken},
            ballot::{Ballot, VoteReceipt, VoteRequest},
        },
        ledger::Ledger,
        mongodb::Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![ballot, cast_vote]
}

/// The open election's candidates, if the caller has yet to vote in it.
#[get("/ballot")]
async fn ballot(token: AuthToken<role::Voter>, ledger: Ledger) -> Result<Json<Ballot>> {
    Ok(Json(ledger.ballot(&token).await?))
}

#[post("/elections/<election_id>/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    token: AuthToken<role::Voter>,
    election_id: Id,
    vote: Json<VoteRequest>,
    ledger: Ledger,
) -> Result<(Status, Json<VoteReceipt>)> {
    let vote = ledger
        .cast_vote(&token, vote.0.candidate_id.into(), election_id)
        .await?;
    Ok((Status::Created, Json(vote.into())))
}
