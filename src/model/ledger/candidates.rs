use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    ClientSession,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{role, AuthToken, Rights},
        candidate::{ProfileUpdate, MAX_SLOGAN_CHARS},
    },
    db::{Candidate, NewCandidate, User, YearOfStudy},
    mongodb::Id,
};

use super::{commit, Ledger};

impl Ledger {
    /// Voters in their final two years, who may be put forward as candidates.
    pub async fn eligible_candidates(&self, _admin: &AuthToken<role::Admin>) -> Result<Vec<User>> {
        let filter = doc! {
            "role": Rights::Voter as i32,
            "year_of_study": { "$in": [YearOfStudy::Third as i32, YearOfStudy::Fourth as i32] },
        };
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        Ok(self.users.find(filter, options).await?.try_collect().await?)
    }

    /// Make the given user a candidate, creating their profile if they don't have one.
    pub async fn promote_candidate(
        &self,
        admin: &AuthToken<role::Admin>,
        user_id: Id,
    ) -> Result<Candidate> {
        let candidate = self
            .transaction("promote candidate", |session| self.promote_in(session, user_id))
            .await?;
        info!(
            "Admin {} promoted user {user_id} to candidate {}",
            admin.id, candidate.id
        );
        Ok(candidate)
    }

    /// The caller's own candidate profile.
    pub async fn profile(&self, candidate: &AuthToken<role::Candidate>) -> Result<Candidate> {
        self.candidates
            .find_one(doc! { "user_id": candidate.id }, None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate profile for user {}", candidate.id)))
    }

    /// Replace the caller's manifesto and slogan.
    pub async fn update_profile(
        &self,
        candidate: &AuthToken<role::Candidate>,
        update: ProfileUpdate,
    ) -> Result<Candidate> {
        let manifesto = update.manifesto.trim();
        let slogan = update.slogan.trim();
        if slogan.chars().count() > MAX_SLOGAN_CHARS {
            return Err(Error::InvalidInput(format!(
                "Slogan must be at most {MAX_SLOGAN_CHARS} characters"
            )));
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .candidates
            .find_one_and_update(
                doc! { "user_id": candidate.id },
                doc! { "$set": { "manifesto": manifesto, "slogan": slogan } },
                options,
            )
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("Candidate profile for user {}", candidate.id))
            })?;
        debug!("Candidate {} updated their profile", updated.id);
        Ok(updated)
    }

    async fn promote_in(&self, mut session: ClientSession, user_id: Id) -> Result<Candidate> {
        let user = self
            .users
            .find_one_with_session(user_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("User {user_id}")))?;
        if user.role == Rights::Admin {
            return Err(Error::InvalidInput(
                "Administrators cannot stand as candidates".to_string(),
            ));
        }

        self.users
            .update_one_with_session(
                user_id.as_doc(),
                doc! { "$set": { "role": Rights::Candidate as i32 } },
                None,
                &mut session,
            )
            .await?;

        let existing = self
            .candidates
            .find_one_with_session(doc! { "user_id": user_id }, None, &mut session)
            .await?;
        let candidate = match existing {
            Some(candidate) => candidate,
            None => {
                let profile = NewCandidate::new(user_id, user.user.name);
                let id: Id = self
                    .new_candidates
                    .insert_one_with_session(&profile, None, &mut session)
                    .await?
                    .inserted_id
                    .as_object_id()
                    .unwrap() // Valid because the ID comes directly from the DB
                    .into();
                Candidate {
                    id,
                    candidate: profile,
                }
            }
        };

        commit(&mut session).await?;
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::{Client as DbClient, Database};

    use crate::model::{
        db::{NewUser, YearOfStudy},
        ledger::fixtures,
        mongodb::Coll,
    };

    use super::*;

    async fn insert(db: &Database, user: NewUser) -> Id {
        Coll::<NewUser>::from_db(db)
            .insert_one(user, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    #[backend_test]
    async fn promotion_is_idempotent(db_client: DbClient, db: Database, users: Coll<User>) {
        let ledger = Ledger::new(&db_client, &db);
        let admin = fixtures::admin();
        let user_id = insert(&db, NewUser::example()).await;

        let first = ledger.promote_candidate(&admin, user_id).await.unwrap();
        assert_eq!(user_id, first.user_id);
        assert_eq!("Ada Lovelace", first.name);
        assert_eq!(0, first.votes_received);

        let again = ledger.promote_candidate(&admin, user_id).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(1, ledger.candidates.count_documents(None, None).await.unwrap());

        let user = users.find_one(user_id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(Rights::Candidate, user.role);

        assert!(matches!(
            ledger.promote_candidate(&admin, Id::new()).await,
            Err(Error::NotFound(_))
        ));
        let admin_id = insert(&db, NewUser::admin_example()).await;
        assert!(matches!(
            ledger.promote_candidate(&admin, admin_id).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[backend_test]
    async fn only_senior_voters_are_eligible(db_client: DbClient, db: Database) {
        let ledger = Ledger::new(&db_client, &db);
        let admin = fixtures::admin();
        insert(&db, NewUser::example()).await;
        insert(
            &db,
            NewUser {
                year_of_study: YearOfStudy::First,
                ..NewUser::example2()
            },
        )
        .await;
        insert(&db, NewUser::admin_example()).await;

        let eligible = ledger.eligible_candidates(&admin).await.unwrap();
        assert_eq!(1, eligible.len());
        assert_eq!("Ada Lovelace", eligible[0].name);
    }

    #[backend_test]
    async fn profile_updates_are_trimmed_and_bounded(db_client: DbClient, db: Database) {
        let ledger = Ledger::new(&db_client, &db);
        let admin = fixtures::admin();
        let user_id = insert(&db, NewUser::example()).await;
        let promoted = ledger.promote_candidate(&admin, user_id).await.unwrap();
        let user = User {
            id: user_id,
            user: NewUser {
                role: Rights::Candidate,
                ..NewUser::example()
            },
        };
        let token = AuthToken::<role::Candidate>::new(&user).unwrap();

        let updated = ledger
            .update_profile(
                &token,
                ProfileUpdate {
                    manifesto: "  Better coffee.\n".to_string(),
                    slogan: " Vote Ada ".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.id, updated.id);
        assert_eq!("Better coffee.", updated.manifesto);
        assert_eq!("Vote Ada", updated.slogan);
        assert_eq!(updated.slogan, ledger.profile(&token).await.unwrap().slogan);

        let too_long = ProfileUpdate {
            manifesto: String::new(),
            slogan: "x".repeat(MAX_SLOGAN_CHARS + 1),
        };
        assert!(matches!(
            ledger.update_profile(&token, too_long).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!("Vote Ada", ledger.profile(&token).await.unwrap().slogan);
    }
}
