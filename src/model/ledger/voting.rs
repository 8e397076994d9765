use chrono::{DateTime, Utc};
use mongodb::{bson::doc, options::FindOptions, ClientSession};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{role, AuthToken},
        ballot::Ballot,
        candidate::CandidateSummary,
        election::ElectionDescription,
    },
    db::{NewVote, Vote, Voter},
    mongodb::{is_duplicate_key_error, Id},
};

use super::{commit, Ledger};

impl Ledger {
    /// Record the voter's choice of candidate in the given election.
    ///
    /// Succeeds at most once per voter per election, however many attempts race.
    pub async fn cast_vote(
        &self,
        voter: &AuthToken<role::Voter>,
        candidate_id: Id,
        election_id: Id,
    ) -> Result<Vote> {
        let vote = self
            .transaction("cast vote", |session| {
                self.cast_vote_in(session, voter.id, candidate_id, election_id)
            })
            .await?;
        info!(
            "Voter profile {} voted in election {election_id}",
            vote.voter_id
        );
        Ok(vote)
    }

    /// The open election and its candidates, for a voter who has yet to vote in it.
    pub async fn ballot(&self, voter: &AuthToken<role::Voter>) -> Result<Ballot> {
        let now = Utc::now();
        let election = self
            .active_election()
            .await?
            .filter(|election| election.is_open_at(now))
            .ok_or_else(|| Error::not_found("Open election"))?;
        let profile = self.voter_profile(voter.id).await?;

        let prior = self
            .votes
            .count_documents(doc! { "voter_id": profile.id, "election_id": election.id }, None)
            .await?;
        if prior > 0 {
            return Err(Error::AlreadyVoted(election.id));
        }

        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let candidates = self
            .candidates
            .find(None, options)
            .await?
            .map_ok(CandidateSummary::from)
            .try_collect()
            .await?;
        Ok(Ballot {
            election: ElectionDescription::at(election, now),
            candidates,
        })
    }

    async fn voter_profile(&self, user_id: Id) -> Result<Voter> {
        self.voters
            .find_one(doc! { "user_id": user_id }, None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter profile for user {user_id}")))
    }

    async fn cast_vote_in(
        &self,
        mut session: ClientSession,
        user_id: Id,
        candidate_id: Id,
        election_id: Id,
    ) -> Result<Vote> {
        let now: DateTime<Utc> = Utc::now();

        let election = self
            .elections
            .find_one_with_session(election_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        if !election.is_open_at(now) {
            return Err(Error::ElectionNotOpen(election_id));
        }

        let candidate = self
            .candidates
            .find_one_with_session(candidate_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
        let voter = self
            .voters
            .find_one_with_session(doc! { "user_id": user_id }, None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter profile for user {user_id}")))?;

        let prior = self
            .votes
            .count_documents_with_session(
                doc! { "voter_id": voter.id, "election_id": election_id },
                None,
                &mut session,
            )
            .await?;
        if prior > 0 {
            return Err(Error::AlreadyVoted(election_id));
        }

        let vote = NewVote {
            voter_id: voter.id,
            candidate_id: candidate.id,
            election_id,
            timestamp: now,
        };
        let id: Id = match self
            .new_votes
            .insert_one_with_session(&vote, None, &mut session)
            .await
        {
            Ok(result) => result
                .inserted_id
                .as_object_id()
                .unwrap() // Valid because the ID comes directly from the DB
                .into(),
            Err(e) if is_duplicate_key_error(&e) => return Err(Error::AlreadyVoted(election_id)),
            Err(e) => return Err(e.into()),
        };

        self.voters
            .update_one_with_session(
                voter.id.as_doc(),
                doc! { "$set": { "has_voted": true } },
                None,
                &mut session,
            )
            .await?;
        self.recount(&mut session, candidate.id).await?;

        commit(&mut session).await?;
        Ok(Vote { id, vote })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::{Client as DbClient, Database};
    use rocket::futures::future::join_all;

    use crate::model::{
        db::{Candidate, NewElection},
        ledger::fixtures,
        mongodb::Coll,
    };

    use super::*;

    #[backend_test]
    async fn vote_is_recorded_and_counted(db_client: DbClient, db: Database, voters: Coll<Voter>) {
        let ledger = Ledger::new(&db_client, &db);
        let election = fixtures::election(&db, NewElection::current_example()).await;
        let candidate = fixtures::candidate(&db, "cand@college.example", "Cand").await;
        let (user, token) = fixtures::voter(&db, "voter@college.example").await;

        let vote = ledger
            .cast_vote(&token, candidate.id, election.id)
            .await
            .unwrap();
        assert_eq!(candidate.id, vote.candidate_id);
        assert_eq!(election.id, vote.election_id);

        let voter = voters
            .find_one(doc! { "user_id": user.id }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(voter.has_voted);
        assert_eq!(voter.id, vote.voter_id);

        let candidate = ledger
            .candidates
            .find_one(candidate.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(1, candidate.votes_received);

        assert!(matches!(
            ledger.cast_vote(&token, candidate.id, election.id).await,
            Err(Error::AlreadyVoted(id)) if id == election.id
        ));
        assert!(matches!(
            ledger.ballot(&token).await,
            Err(Error::AlreadyVoted(_))
        ));
    }

    #[backend_test]
    async fn closed_or_missing_things_are_rejected(db_client: DbClient, db: Database) {
        let ledger = Ledger::new(&db_client, &db);
        let candidate = fixtures::candidate(&db, "cand@college.example", "Cand").await;
        let (_, token) = fixtures::voter(&db, "voter@college.example").await;

        let mut inactive = NewElection::current_example();
        inactive.active = false;
        let inactive = fixtures::election(&db, inactive).await;
        assert!(matches!(
            ledger.cast_vote(&token, candidate.id, inactive.id).await,
            Err(Error::ElectionNotOpen(_))
        ));

        let future = fixtures::election(&db, NewElection::future_example()).await;
        assert!(matches!(
            ledger.cast_vote(&token, candidate.id, future.id).await,
            Err(Error::ElectionNotOpen(_))
        ));

        assert!(matches!(
            ledger.cast_vote(&token, candidate.id, Id::new()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(ledger.ballot(&token).await, Err(Error::NotFound(_))));

        let open = fixtures::election(&db, NewElection::current_example()).await;
        assert!(matches!(
            ledger.cast_vote(&token, Id::new(), open.id).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(0, ledger.votes.count_documents(None, None).await.unwrap());
    }

    #[backend_test]
    async fn concurrent_votes_record_once(db_client: DbClient, db: Database) {
        let ledger = Ledger::new(&db_client, &db);
        let election = fixtures::election(&db, NewElection::current_example()).await;
        let first = fixtures::candidate(&db, "first@college.example", "First").await;
        let second = fixtures::candidate(&db, "second@college.example", "Second").await;
        let (_, token) = fixtures::voter(&db, "voter@college.example").await;

        let attempts = (0..6).map(|i| {
            let candidate = if i % 2 == 0 { first.id } else { second.id };
            ledger.cast_vote(&token, candidate, election.id)
        });
        let results = join_all(attempts).await;

        assert!(results.iter().filter(|r| r.is_ok()).count() <= 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::AlreadyVoted(_) | Error::Db(_))));
        let votes = ledger.votes.count_documents(None, None).await.unwrap();
        assert!(votes <= 1);

        let total: u64 = ledger
            .candidates
            .find(None, None)
            .await
            .unwrap()
            .map_ok(|c: Candidate| c.votes_received)
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .into_iter()
            .sum();
        assert_eq!(votes, total);
    }

    #[backend_test]
    async fn ballot_lists_candidates_in_order(db_client: DbClient, db: Database) {
        let ledger = Ledger::new(&db_client, &db);
        let election = fixtures::election(&db, NewElection::current_example()).await;
        let first = fixtures::candidate(&db, "first@college.example", "First").await;
        let second = fixtures::candidate(&db, "second@college.example", "Second").await;
        let (_, token) = fixtures::voter(&db, "voter@college.example").await;

        let ballot = ledger.ballot(&token).await.unwrap();
        assert_eq!(election.id, *ballot.election.id);
        assert!(ballot.election.open);
        let names: Vec<_> = ballot.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(vec!["First", "Second"], names);
        assert_eq!(first.id, *ballot.candidates[0].id);
        assert_eq!(second.id, *ballot.candidates[1].id);
    }
}
