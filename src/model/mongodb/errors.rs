//! Classification of MongoDB errors that the ledger and token authority react to.

use mongodb::error::{
    Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};

pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key write error, whether it
/// came from a plain write or from inside a transaction.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Return true if the server says the whole transaction may be retried,
/// e.g. after a write conflict with a concurrent transaction.
pub fn has_transient_label(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

/// Return true if a commit may or may not have applied, and the commit alone
/// should be retried.
pub fn is_unknown_commit_result(err: &DbError) -> bool {
    err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}
