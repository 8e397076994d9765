use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{role, AuthToken},
            candidate::{CandidateProfile, ProfileUpdate},
        },
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![profile, update_profile]
}

#[get("/candidate/profile")]
async fn profile(token: AuthToken<role::Candidate>, ledger: Ledger) -> Result<Json<CandidateProfile>> {
    Ok(Json(ledger.profile(&token).await?.into()))
}

#[put("/candidate/profile", data = "<update>", format = "json")]
async fn update_profile(
    token: AuthToken<role::Candidate>,
    update: Json<ProfileUpdate>,
    ledger: Ledger,
) -> Result<Json<CandidateProfile>> {
    Ok(Json(ledger.update_profile(&token, update.0).await?.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::api::candidate::MAX_SLOGAN_CHARS;

    use super::*;

    #[backend_test(candidate)]
    async fn edit_own_profile(client: Client) {
        let response = client.get(uri!(profile)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let before: CandidateProfile = response.into_json().await.unwrap();
        assert_eq!("", before.slogan);

        let update = ProfileUpdate {
            manifesto: "  More benches in the quad.  ".to_string(),
            slogan: "Sit down, stand up".to_string(),
        };
        let response = client
            .put(uri!(update_profile))
            .header(ContentType::JSON)
            .body(json!(update).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let after: CandidateProfile = response.into_json().await.unwrap();
        assert_eq!(before.id, after.id);
        assert_eq!("More benches in the quad.", after.manifesto);
        assert_eq!("Sit down, stand up", after.slogan);
    }

    #[backend_test(candidate)]
    async fn long_slogan_rejected(client: Client) {
        let update = ProfileUpdate {
            manifesto: String::new(),
            slogan: "a".repeat(MAX_SLOGAN_CHARS + 1),
        };
        let response = client
            .put(uri!(update_profile))
            .header(ContentType::JSON)
            .body(json!(update).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(voter)]
    async fn voters_have_no_profile(client: Client) {
        let response = client.get(uri!(profile)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
    }
}
