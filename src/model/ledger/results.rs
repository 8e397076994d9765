use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc},
    options::{FindOptions, SessionOptions},
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{role, AuthToken, Rights},
        election::ElectionDescription,
        results::{CandidateResult, ElectionResults},
    },
    db::{Candidate, Election, ElectionCore},
    mongodb::Id,
};

use super::Ledger;

/// Per-candidate vote counts for one election.
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    /// Every candidate, most votes first. Ties keep storage order.
    pub rows: Vec<CandidateResult>,
    pub total_votes: u64,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build the results table from the candidates (in storage order) and the
/// number of votes each received. Candidates absent from `counts` got no votes.
pub fn tally(candidates: Vec<Candidate>, counts: &HashMap<Id, u64>) -> Tally {
    let total_votes: u64 = candidates
        .iter()
        .map(|c| counts.get(&c.id).copied().unwrap_or(0))
        .sum();
    let mut rows: Vec<CandidateResult> = candidates
        .into_iter()
        .map(|candidate| {
            let votes = counts.get(&candidate.id).copied().unwrap_or(0);
            let percentage = if total_votes > 0 {
                round2(votes as f64 / total_votes as f64 * 100.0)
            } else {
                0.0
            };
            CandidateResult {
                candidate_id: candidate.id.into(),
                name: candidate.candidate.name,
                slogan: candidate.candidate.slogan,
                votes,
                percentage,
            }
        })
        .collect();
    // `sort_by` is stable.
    rows.sort_by(|a, b| b.votes.cmp(&a.votes));
    Tally { rows, total_votes }
}

/// Votes cast as a percentage of eligible voters.
pub fn turnout(total_votes: u64, eligible_voters: u64) -> f64 {
    if eligible_voters == 0 {
        0.0
    } else {
        round2(total_votes as f64 / eligible_voters as f64 * 100.0)
    }
}

/// Administrators may always see results; everyone else only once voting has finished.
pub fn can_view_results(rights: Rights, election: &ElectionCore, now: DateTime<Utc>) -> bool {
    rights == Rights::Admin || election.has_ended_at(now)
}

#[derive(Deserialize)]
struct VoteCount {
    #[serde(rename = "_id")]
    candidate_id: Id,
    count: u64,
}

impl Ledger {
    /// Results for the given election, or for the active election if none is given.
    pub async fn results(
        &self,
        viewer: &AuthToken<role::Any>,
        election_id: Option<Id>,
    ) -> Result<ElectionResults> {
        let now = Utc::now();
        let election: Election = match election_id {
            Some(id) => self
                .elections
                .find_one(id.as_doc(), None)
                .await?
                .ok_or_else(|| Error::not_found(format!("Election {id}")))?,
            None => self
                .active_election()
                .await?
                .ok_or_else(|| Error::not_found("Active election"))?,
        };

        if !can_view_results(viewer.rights, &election, now) {
            return Err(Error::Forbidden(
                "Results are visible to administrators, or to everyone once the election has ended"
                    .to_string(),
            ));
        }

        // Read everything from one snapshot so the figures agree with each other.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let candidates: Vec<Candidate> = self
            .candidates
            .find_with_session(None, options, &mut session)
            .await?
            .stream(&mut session)
            .try_collect()
            .await?;

        let pipeline = [
            doc! { "$match": { "election_id": election.id } },
            doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
        ];
        let mut counts = HashMap::new();
        let mut cursor = self
            .votes
            .aggregate_with_session(pipeline, None, &mut session)
            .await?;
        while let Some(document) = cursor.next(&mut session).await.transpose()? {
            let row: VoteCount = bson::from_document(document)
                .map_err(|e| Error::Invariant(format!("Malformed vote count: {e}")))?;
            counts.insert(row.candidate_id, row.count);
        }

        let eligible = self
            .voters
            .count_documents_with_session(None, None, &mut session)
            .await?;

        let Tally { rows, total_votes } = tally(candidates, &counts);
        Ok(ElectionResults {
            election: ElectionDescription::at(election, now),
            candidates: rows,
            total_votes,
            total_eligible_voters: eligible,
            turnout: turnout(total_votes, eligible),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mongodb::{Client as DbClient, Database};

    use crate::model::{
        db::{NewCandidate, NewElection, NewUser, User},
        ledger::fixtures,
    };

    use super::*;

    fn candidate(name: &str) -> Candidate {
        Candidate {
            id: Id::new(),
            candidate: NewCandidate::new(Id::new(), name.to_string()),
        }
    }

    #[test]
    fn single_vote_takes_everything() {
        let a = candidate("A");
        let b = candidate("B");
        let counts = HashMap::from([(b.id, 1)]);

        let result = tally(vec![a, b.clone()], &counts);
        assert_eq!(1, result.total_votes);
        assert_eq!(*result.rows[0].candidate_id, b.id);
        assert_eq!(1, result.rows[0].votes);
        assert_eq!(100.0, result.rows[0].percentage);
        assert_eq!(0.0, result.rows[1].percentage);
    }

    #[test]
    fn no_votes_means_zero_percent() {
        let result = tally(vec![candidate("A"), candidate("B")], &HashMap::new());
        assert_eq!(0, result.total_votes);
        assert!(result.rows.iter().all(|r| r.percentage == 0.0 && r.votes == 0));
    }

    #[test]
    fn percentages_sum_to_a_hundred() {
        let candidates: Vec<_> = ["A", "B", "C"].into_iter().map(candidate).collect();
        let counts: HashMap<_, _> = candidates.iter().map(|c| (c.id, 1)).collect();
        let result = tally(candidates, &counts);
        assert!(result.rows.iter().all(|r| r.percentage == 33.33));
        let sum: f64 = result.rows.iter().map(|r| r.percentage).sum();
        assert!((sum - 100.0).abs() < 0.05);
    }

    #[test]
    fn ties_keep_storage_order() {
        let candidates: Vec<_> = ["A", "B", "C", "D"].into_iter().map(candidate).collect();
        let counts = HashMap::from([
            (candidates[0].id, 2),
            (candidates[1].id, 5),
            (candidates[2].id, 2),
            (candidates[3].id, 5),
        ]);
        let result = tally(candidates, &counts);
        let names: Vec<_> = result.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(vec!["B", "D", "A", "C"], names);
        assert_eq!(14, result.total_votes);
        assert_eq!(35.71, result.rows[0].percentage);
        assert_eq!(14.29, result.rows[3].percentage);
    }

    #[test]
    fn turnout_is_rounded_and_safe() {
        assert_eq!(0.0, turnout(0, 0));
        assert_eq!(0.0, turnout(5, 0));
        assert_eq!(33.33, turnout(1, 3));
        assert_eq!(100.0, turnout(4, 4));
    }

    #[test]
    fn visibility_rule() {
        let election = NewElection::current_example();
        let now = Utc::now();
        assert!(can_view_results(Rights::Admin, &election, now));
        assert!(!can_view_results(Rights::Voter, &election, now));
        assert!(!can_view_results(Rights::Candidate, &election, now));

        let after = election.end_time + Duration::seconds(1);
        assert!(can_view_results(Rights::Voter, &election, after));
        assert!(can_view_results(Rights::Candidate, &election, after));
        // The end instant itself still counts as running.
        assert!(!can_view_results(Rights::Voter, &election, election.end_time));
    }

    fn viewer(rights: Rights) -> AuthToken<role::Any> {
        AuthToken::for_user(&User {
            id: Id::new(),
            user: NewUser {
                role: rights,
                ..NewUser::example()
            },
        })
    }

    #[backend_test]
    async fn results_respect_visibility(db_client: DbClient, db: Database) {
        let ledger = Ledger::new(&db_client, &db);
        let running = fixtures::election(&db, NewElection::current_example()).await;
        let finished = fixtures::election(&db, NewElection::past_example()).await;
        let candidate = fixtures::candidate(&db, "cand@college.example", "Cand").await;
        let (_, voter) = fixtures::voter(&db, "voter@college.example").await;
        fixtures::voter(&db, "other@college.example").await;

        ledger
            .cast_vote(&voter, candidate.id, running.id)
            .await
            .unwrap();

        // Admins see the running election, which is the default.
        let results = ledger.results(&viewer(Rights::Admin), None).await.unwrap();
        assert_eq!(running.id, *results.election.id);
        assert_eq!(1, results.total_votes);
        assert_eq!(2, results.total_eligible_voters);
        assert_eq!(50.0, results.turnout);
        assert_eq!(1, results.candidates[0].votes);
        assert_eq!(100.0, results.candidates[0].percentage);

        assert!(matches!(
            ledger.results(&viewer(Rights::Voter), Some(running.id)).await,
            Err(Error::Forbidden(_))
        ));

        let results = ledger
            .results(&viewer(Rights::Voter), Some(finished.id))
            .await
            .unwrap();
        assert!(results.election.ended);
        assert_eq!(0, results.total_votes);
        assert_eq!(0.0, results.candidates[0].percentage);

        assert!(matches!(
            ledger.results(&viewer(Rights::Admin), Some(Id::new())).await,
            Err(Error::NotFound(_))
        ));
    }
}
