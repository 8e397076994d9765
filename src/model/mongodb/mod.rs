mod bson;
mod collection;
mod errors;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{has_transient_label, is_duplicate_key_error, is_unknown_commit_result};
