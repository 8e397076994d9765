use std::collections::BTreeSet;

use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions, ClientSession};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{role, AuthToken},
        election::ElectionSpec,
    },
    db::{Election, NewElection, Vote},
    mongodb::Id,
};

use super::{commit, Ledger};

impl Ledger {
    /// All elections, most recent start first.
    pub async fn list_elections(&self, _admin: &AuthToken<role::Admin>) -> Result<Vec<Election>> {
        let options = FindOptions::builder().sort(doc! { "start_time": -1 }).build();
        let elections = self.elections.find(None, options).await?.try_collect().await?;
        Ok(elections)
    }

    /// The election currently marked active, if any.
    pub async fn active_election(&self) -> Result<Option<Election>> {
        Ok(self.elections.find_one(doc! { "active": true }, None).await?)
    }

    /// Create a new election and make it the active one.
    pub async fn create_election(
        &self,
        admin: &AuthToken<role::Admin>,
        spec: ElectionSpec,
    ) -> Result<Election> {
        let mut election = NewElection::try_from(spec)?;
        election.active = true;
        let created = self
            .transaction("create election", |session| self.insert_active(session, &election))
            .await?;
        info!(
            "Admin {} created election {} ({})",
            admin.id, created.id, created.name
        );
        Ok(created)
    }

    /// Flip an election's active flag. Activating an election deactivates every other one.
    pub async fn toggle_active(
        &self,
        admin: &AuthToken<role::Admin>,
        election_id: Id,
    ) -> Result<Election> {
        let toggled = self
            .transaction("toggle election", |session| self.toggle_in(session, election_id))
            .await?;
        info!(
            "Admin {} {} election {}",
            admin.id,
            if toggled.active { "activated" } else { "deactivated" },
            election_id
        );
        Ok(toggled)
    }

    /// Delete an election along with all its votes.
    pub async fn delete_election(&self, admin: &AuthToken<role::Admin>, election_id: Id) -> Result<()> {
        let removed = self
            .transaction("delete election", |session| self.delete_in(session, election_id))
            .await?;
        info!(
            "Admin {} deleted election {election_id} and {removed} vote(s)",
            admin.id
        );
        Ok(())
    }

    async fn insert_active(
        &self,
        mut session: ClientSession,
        election: &NewElection,
    ) -> Result<Election> {
        self.deactivate_all(&mut session).await?;
        let id: Id = self
            .new_elections
            .insert_one_with_session(election, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB
            .into();
        self.check_single_active(&mut session, id).await?;
        commit(&mut session).await?;
        Ok(Election {
            id,
            election: election.clone(),
        })
    }

    async fn toggle_in(&self, mut session: ClientSession, election_id: Id) -> Result<Election> {
        let mut election = self
            .elections
            .find_one_with_session(election_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

        if election.active {
            self.elections
                .update_one_with_session(
                    election_id.as_doc(),
                    doc! { "$set": { "active": false } },
                    None,
                    &mut session,
                )
                .await?;
        } else {
            self.deactivate_all(&mut session).await?;
            self.elections
                .update_one_with_session(
                    election_id.as_doc(),
                    doc! { "$set": { "active": true } },
                    None,
                    &mut session,
                )
                .await?;
            self.check_single_active(&mut session, election_id).await?;
        }
        commit(&mut session).await?;

        election.active = !election.active;
        Ok(election)
    }

    /// Delete the election and its votes, then bring the derived caches back in line.
    async fn delete_in(&self, mut session: ClientSession, election_id: Id) -> Result<u64> {
        let deleted = self
            .elections
            .delete_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(Error::not_found(format!("Election {election_id}")));
        }

        let filter = doc! { "election_id": election_id };
        let votes: Vec<Vote> = self
            .votes
            .find_with_session(filter.clone(), None, &mut session)
            .await?
            .stream(&mut session)
            .try_collect()
            .await?;
        let removed = self
            .votes
            .delete_many_with_session(filter, None, &mut session)
            .await?
            .deleted_count;

        let candidates: BTreeSet<Id> = votes.iter().map(|vote| vote.candidate_id).collect();
        for candidate_id in candidates {
            self.recount(&mut session, candidate_id).await?;
        }
        let voters: BTreeSet<Id> = votes.iter().map(|vote| vote.voter_id).collect();
        for voter_id in voters {
            let remaining = self
                .votes
                .count_documents_with_session(doc! { "voter_id": voter_id }, None, &mut session)
                .await?;
            self.voters
                .update_one_with_session(
                    voter_id.as_doc(),
                    doc! { "$set": { "has_voted": remaining > 0 } },
                    None,
                    &mut session,
                )
                .await?;
        }

        commit(&mut session).await?;
        Ok(removed)
    }

    async fn deactivate_all(&self, session: &mut ClientSession) -> Result<()> {
        self.elections
            .update_many_with_session(
                doc! { "active": true },
                doc! { "$set": { "active": false } },
                None,
                session,
            )
            .await?;
        Ok(())
    }

    /// Check that the given election, and only it, is active.
    async fn check_single_active(&self, session: &mut ClientSession, expected: Id) -> Result<()> {
        let active: Vec<Election> = self
            .elections
            .find_with_session(doc! { "active": true }, None, session)
            .await?
            .stream(session)
            .try_collect()
            .await?;
        match active.as_slice() {
            [only] if only.id == expected => Ok(()),
            _ => {
                error!(
                    "Expected only election {expected} to be active, found {} active",
                    active.len()
                );
                Err(Error::Invariant(format!(
                    "{} elections active after activating {expected}",
                    active.len()
                )))
            }
        }
    }
}
