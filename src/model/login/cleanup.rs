use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{self, doc};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{db::LoginToken, mongodb::Id};

use super::authority::TokenAuthority;

/// Default retention window for expired or used tokens.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Longest retention window accepted, about a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// How many candidates a dry-run report lists individually.
const PREVIEW_LIMIT: usize = 10;

/// A token eligible for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupCandidate {
    pub token_id: Id,
    /// The owner's email, if the owner still exists.
    pub email: Option<String>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

/// The outcome of a cleanup sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub days: i64,
    pub dry_run: bool,
    pub candidates: Vec<CleanupCandidate>,
    /// Tokens actually deleted. Always zero for a dry run.
    pub deleted: u64,
}

impl TokenAuthority {
    /// Delete tokens that are expired or used and were created more than `days` days ago.
    ///
    /// With `dry_run`, nothing is deleted and the report lists what would have been.
    /// Deletion is row by row: a row that fails to delete is logged and skipped.
    pub async fn cleanup(&self, days: i64, dry_run: bool) -> Result<CleanupReport> {
        let now = Utc::now();
        let cutoff = retention_cutoff(now, days)?;
        let filter = doc! {
            "created_at": { "$lt": bson::DateTime::from_chrono(cutoff) },
            "$or": [
                { "expires_at": { "$lt": bson::DateTime::from_chrono(now) } },
                { "used": true },
            ],
        };
        let stale: Vec<LoginToken> = self.tokens.find(filter, None).await?.try_collect().await?;

        // Look up owners in one go, for reporting.
        let owner_ids: Vec<Id> = stale.iter().map(|token| token.user_id).collect();
        let owners: HashMap<Id, String> = self
            .users
            .find(doc! { "_id": { "$in": owner_ids } }, None)
            .await?
            .map_ok(|user| (user.id, user.email.to_string()))
            .try_collect()
            .await?;

        let candidates: Vec<CleanupCandidate> = stale
            .iter()
            .map(|token| CleanupCandidate {
                token_id: token.id,
                email: owners.get(&token.user_id).cloned(),
                used: token.used,
                created_at: token.created_at,
            })
            .collect();

        let mut deleted = 0;
        if !dry_run {
            for candidate in &candidates {
                match self
                    .tokens
                    .delete_one(candidate.token_id.as_doc(), None)
                    .await
                {
                    Ok(result) => deleted += result.deleted_count,
                    Err(e) => warn!("Failed to delete login token {}: {e}", candidate.token_id),
                }
            }
            info!("Login token cleanup deleted {deleted} of {}", candidates.len());
        }

        Ok(CleanupReport {
            days,
            dry_run,
            candidates,
            deleted,
        })
    }
}

/// The creation time before which dead tokens are collected.
fn retention_cutoff(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    if !(0..=MAX_RETENTION_DAYS).contains(&days) {
        return Err(Error::InvalidInput(format!(
            "Retention must be between 0 and {MAX_RETENTION_DAYS} days, not {days}"
        )));
    }
    now.checked_sub_signed(Duration::days(days))
        .ok_or_else(|| Error::InvalidInput(format!("Retention of {days} days is out of range")))
}

impl Display for CleanupReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.dry_run {
            writeln!(
                f,
                "DRY RUN: Showing what would be deleted (tokens older than {} days)",
                self.days
            )?;
        }
        if self.candidates.is_empty() {
            return writeln!(f, "No tokens to clean up.");
        }
        if !self.dry_run {
            return writeln!(
                f,
                "Successfully deleted {} expired/used tokens.",
                self.deleted
            );
        }

        let count = self.candidates.len();
        writeln!(f, "Would delete {count} tokens:")?;
        for candidate in self.candidates.iter().take(PREVIEW_LIMIT) {
            writeln!(
                f,
                "  - {}: {}, created {}",
                candidate.email.as_deref().unwrap_or("<deleted user>"),
                if candidate.used { "used" } else { "expired" },
                candidate.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            )?;
        }
        if count > PREVIEW_LIMIT {
            writeln!(f, "  ... and {} more", count - PREVIEW_LIMIT)?;
        }
        Ok(())
    }
}
