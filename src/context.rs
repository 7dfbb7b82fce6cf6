//! Context blurb for the reasoning engine, built from live domain state.
//!
//! Recomputed on every agent-mode run. The text is advisory only.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::auth::UserId;
use crate::error::DatabaseError;
use crate::store::Database;

const MAX_OVERDUE_EXAMPLES: usize = 3;
const MAX_PENDING_HABITS: usize = 5;

/// Aggregates overdue tasks, pending habits and the active focus session.
#[derive(Clone)]
pub struct ContextProvider {
    db: Arc<dyn Database>,
}

impl ContextProvider {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn build_context(&self, identity: &UserId) -> Result<String, DatabaseError> {
        self.build_context_at(identity, Utc::now()).await
    }

    /// Same as [`build_context`](Self::build_context) with an explicit clock.
    pub async fn build_context_at(
        &self,
        identity: &UserId,
        now: DateTime<Utc>,
    ) -> Result<String, DatabaseError> {
        let mut parts = Vec::with_capacity(3);

        let overdue = self.db.list_overdue_tasks(identity, now).await?;
        if !overdue.is_empty() {
            let examples: Vec<String> = overdue
                .iter()
                .take(MAX_OVERDUE_EXAMPLES)
                .map(|t| format!("'{}'", t.title))
                .collect();
            parts.push(format!(
                "User has {} overdue tasks (e.g., {}).",
                overdue.len(),
                examples.join(", ")
            ));
        }

        let today = now.date_naive();
        let done_today: HashSet<_> = self
            .db
            .list_habit_entries(identity, today)
            .await?
            .into_iter()
            .filter(|e| e.completed)
            .map(|e| e.habit_id)
            .collect();
        let pending: Vec<String> = self
            .db
            .list_habits(identity)
            .await?
            .into_iter()
            .filter(|h| !done_today.contains(&h.id))
            .take(MAX_PENDING_HABITS)
            .map(|h| h.name)
            .collect();
        if !pending.is_empty() {
            parts.push(format!("Pending habits for today: {}.", pending.join(", ")));
        }

        if let Some(session) = self.db.active_session(identity).await? {
            parts.push(format!(
                "User is currently in a '{}' focus session started at {}.",
                session.session_type.as_str(),
                session.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }

        Ok(parts.join(" "))
    }
}
