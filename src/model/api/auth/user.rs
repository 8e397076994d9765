use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
    Candidate = 2,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
                Self::Candidate => "candidate",
            }
        )
    }
}

/// A capability that an [`AuthToken`](super::AuthToken) can carry.
///
/// Ledger and token operations take `&AuthToken<R>` as proof that the caller
/// holds the capability `R`, so the check happens once, when the token is
/// extracted from the request.
pub trait Role {
    /// Does a user with the given rights hold this capability?
    fn permits(rights: Rights) -> bool;
}

/// Capability markers. These are never constructed.
pub mod role {
    use super::{Rights, Role};

    /// Election administration.
    #[derive(Debug)]
    pub enum Admin {}

    /// Casting votes.
    #[derive(Debug)]
    pub enum Voter {}

    /// Managing one's own candidate profile.
    #[derive(Debug)]
    pub enum Candidate {}

    /// Any authenticated user.
    #[derive(Debug)]
    pub enum Any {}

    impl Role for Admin {
        fn permits(rights: Rights) -> bool {
            rights == Rights::Admin
        }
    }

    impl Role for Voter {
        fn permits(rights: Rights) -> bool {
            rights == Rights::Voter
        }
    }

    impl Role for Candidate {
        fn permits(rights: Rights) -> bool {
            rights == Rights::Candidate
        }
    }

    impl Role for Any {
        fn permits(_rights: Rights) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_match_rights() {
        assert!(role::Admin::permits(Rights::Admin));
        assert!(!role::Admin::permits(Rights::Voter));
        assert!(!role::Admin::permits(Rights::Candidate));
        assert!(role::Voter::permits(Rights::Voter));
        assert!(!role::Voter::permits(Rights::Candidate));
        assert!(role::Candidate::permits(Rights::Candidate));
        assert!(role::Any::permits(Rights::Voter));
        assert!(role::Any::permits(Rights::Admin));
    }
}
