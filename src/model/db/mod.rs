//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

mod candidate;
pub use candidate::{Candidate, CandidateCore, NewCandidate};

mod election;
pub use election::{Election, ElectionCore, NewElection};

mod login_token;
pub use login_token::{LoginToken, LoginTokenCore, NewLoginToken, TokenStatus};

mod user;
pub use user::{Branch, NewUser, User, UserCore, YearOfStudy};

mod vote;
pub use vote::{NewVote, Vote, VoteCore};

mod voter;
pub use voter::{NewVoter, Voter, VoterCore};
