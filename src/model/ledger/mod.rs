//! The election ledger: election lifecycle, vote recording and tallies.
//!
//! Every mutating operation takes an [`AuthToken`](crate::model::api::auth::AuthToken)
//! for the capability it needs, and runs as a single MongoDB transaction. The
//! unique indexes created by [`ensure_indexes_exist`](crate::model::mongodb::ensure_indexes_exist)
//! are the final guard on the ledger's invariants; the transactions check them
//! up front so that callers get a meaningful error.

use std::future::Future;

use mongodb::{bson::doc, Client, ClientSession, Database};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::error::{Error, Result};
use crate::model::{
    db::{Candidate, Election, NewCandidate, NewElection, NewVote, User, Vote, Voter},
    mongodb::{has_transient_label, is_unknown_commit_result, Coll, Id},
};

mod candidates;
mod elections;
mod results;
mod voting;

pub use results::{can_view_results, round2, tally, turnout, Tally};

/// Attempts at a transaction before a transient failure is reported.
const TRANSACTION_ATTEMPTS: usize = 5;

/// Handle on the ledger's collections.
pub struct Ledger {
    client: Client,
    users: Coll<User>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    new_candidates: Coll<NewCandidate>,
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
    votes: Coll<Vote>,
    new_votes: Coll<NewVote>,
}

impl Ledger {
    pub fn new(client: &Client, db: &Database) -> Self {
        Self {
            client: client.clone(),
            users: Coll::from_db(db),
            voters: Coll::from_db(db),
            candidates: Coll::from_db(db),
            new_candidates: Coll::from_db(db),
            elections: Coll::from_db(db),
            new_elections: Coll::from_db(db),
            votes: Coll::from_db(db),
            new_votes: Coll::from_db(db),
        }
    }

    /// Run `body` inside a fresh transaction, starting again from the top if
    /// the server reports a transient error such as a write conflict.
    ///
    /// `body` is responsible for committing, via [`commit`].
    async fn transaction<T, F, Fut>(&self, what: &str, body: F) -> Result<T>
    where
        F: Fn(ClientSession) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let mut session = self.client.start_session(None).await?;
            session.start_transaction(None).await?;
            match body(session).await {
                Err(Error::Db(e)) if has_transient_label(&e) && attempt < TRANSACTION_ATTEMPTS => {
                    debug!("Transient error in {what} (attempt {attempt}), retrying: {e}");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Recompute a candidate's cached vote count from the votes themselves.
    async fn recount(&self, session: &mut ClientSession, candidate_id: Id) -> Result<u64> {
        let count = self
            .votes
            .count_documents_with_session(doc! { "candidate_id": candidate_id }, None, session)
            .await?;
        self.candidates
            .update_one_with_session(
                candidate_id.as_doc(),
                doc! { "$set": { "votes_received": count as i64 } },
                None,
                session,
            )
            .await?;
        Ok(count)
    }
}

/// Commit the session's transaction, retrying the commit itself if its outcome is unknown.
async fn commit(session: &mut ClientSession) -> Result<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(e) if is_unknown_commit_result(&e) && attempt < TRANSACTION_ATTEMPTS => {
                debug!("Unknown commit result (attempt {attempt}), retrying commit: {e}");
                attempt += 1;
            }
            other => return Ok(other?),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Ledger {
    type Error = ();

    /// Build the ledger from managed state.
    ///
    /// Panics iff the [`Client`] or [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Ledger::new(client, db))
    }
}

/// Database fixtures shared by the ledger's tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use mongodb::Database;

    use crate::model::{
        api::auth::{role, AuthToken, Rights},
        db::{NewUser, NewVoter},
    };

    use super::*;

    fn inserted_id(result: mongodb::results::InsertOneResult) -> Id {
        result.inserted_id.as_object_id().unwrap().into()
    }

    /// An administrator capability. Admin operations never consult the admin's record.
    pub fn admin() -> AuthToken<role::Admin> {
        let user = User {
            id: Id::new(),
            user: NewUser::admin_example(),
        };
        AuthToken::new(&user).unwrap()
    }

    /// Insert a voter account and profile with the given email.
    pub async fn voter(db: &Database, email: &str) -> (User, AuthToken<role::Voter>) {
        let new_user = NewUser {
            email: email.parse().unwrap(),
            ..NewUser::example()
        };
        let id = inserted_id(
            Coll::<NewUser>::from_db(db)
                .insert_one(&new_user, None)
                .await
                .unwrap(),
        );
        Coll::<NewVoter>::from_db(db)
            .insert_one(NewVoter::new(id), None)
            .await
            .unwrap();
        let user = User { id, user: new_user };
        let token = AuthToken::new(&user).unwrap();
        (user, token)
    }

    /// Insert a candidate account and profile with the given email and name.
    pub async fn candidate(db: &Database, email: &str, name: &str) -> Candidate {
        let new_user = NewUser {
            email: email.parse().unwrap(),
            name: name.to_string(),
            role: Rights::Candidate,
            ..NewUser::example2()
        };
        let user_id = inserted_id(
            Coll::<NewUser>::from_db(db)
                .insert_one(&new_user, None)
                .await
                .unwrap(),
        );
        let profile = NewCandidate::new(user_id, name.to_string());
        let id = inserted_id(
            Coll::<NewCandidate>::from_db(db)
                .insert_one(&profile, None)
                .await
                .unwrap(),
        );
        Candidate {
            id,
            candidate: profile,
        }
    }

    /// Insert an election directly, bypassing the activation checks.
    pub async fn election(db: &Database, election: NewElection) -> Election {
        let id = inserted_id(
            Coll::<NewElection>::from_db(db)
                .insert_one(&election, None)
                .await
                .unwrap(),
        );
        Election { id, election }
    }
}
