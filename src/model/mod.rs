pub mod api;
pub mod db;
pub mod ledger;
pub mod login;
pub mod mongodb;
