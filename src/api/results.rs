use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{role, AuthToken},
            results::ElectionResults,
        },
        ledger::Ledger,
        mongodb::Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![active_results, election_results]
}

/// Results of the active election.
#[get("/results")]
async fn active_results(
    token: AuthToken<role::Any>,
    ledger: Ledger,
) -> Result<Json<ElectionResults>> {
    Ok(Json(ledger.results(&token, None).await?))
}

#[get("/results/<election_id>")]
async fn election_results(
    token: AuthToken<role::Any>,
    election_id: Id,
    ledger: Ledger,
) -> Result<Json<ElectionResults>> {
    Ok(Json(ledger.results(&token, Some(election_id)).await?))
}
