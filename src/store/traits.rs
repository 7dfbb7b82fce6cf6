//! `Database` trait: single async interface over the productivity records.
//!
//! Every operation is keyed by owner. The agent pipeline only reads through
//! this trait; writes come from the CRUD surface and from agent tools.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::DatabaseError;
use crate::store::model::{Habit, HabitEntry, PomodoroSession, Task};

/// Backend-agnostic repository for tasks, habits and focus sessions.
#[async_trait]
pub trait Database: Send + Sync {
    // ── Tasks ───────────────────────────────────────────────────────

    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError>;

    async fn list_tasks(&self, owner: &UserId) -> Result<Vec<Task>, DatabaseError>;

    async fn get_task(&self, owner: &UserId, id: Uuid) -> Result<Option<Task>, DatabaseError>;

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError>;

    /// Returns `false` when no such task exists for this owner.
    async fn delete_task(&self, owner: &UserId, id: Uuid) -> Result<bool, DatabaseError>;

    /// Tasks that are not done and due before `now`, oldest due first.
    async fn list_overdue_tasks(
        &self,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, DatabaseError> {
        let mut overdue: Vec<Task> = self
            .list_tasks(owner)
            .await?
            .into_iter()
            .filter(|t| t.is_overdue(now))
            .collect();
        overdue.sort_by_key(|t| t.due_date);
        Ok(overdue)
    }

    // ── Habits ──────────────────────────────────────────────────────

    async fn create_habit(&self, habit: &Habit) -> Result<(), DatabaseError>;

    async fn list_habits(&self, owner: &UserId) -> Result<Vec<Habit>, DatabaseError>;

    async fn delete_habit(&self, owner: &UserId, id: Uuid) -> Result<bool, DatabaseError>;

    /// Insert or replace the entry for `(habit_id, date)`.
    async fn record_habit_entry(&self, entry: &HabitEntry) -> Result<(), DatabaseError>;

    /// All habit entries of this owner on `date`.
    async fn list_habit_entries(
        &self,
        owner: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<HabitEntry>, DatabaseError>;

    // ── Focus sessions ──────────────────────────────────────────────

    async fn create_session(&self, session: &PomodoroSession) -> Result<(), DatabaseError>;

    async fn list_sessions(&self, owner: &UserId) -> Result<Vec<PomodoroSession>, DatabaseError>;

    async fn update_session(&self, session: &PomodoroSession) -> Result<(), DatabaseError>;

    /// The most recently started session that is neither completed nor ended.
    async fn active_session(
        &self,
        owner: &UserId,
    ) -> Result<Option<PomodoroSession>, DatabaseError> {
        Ok(self
            .list_sessions(owner)
            .await?
            .into_iter()
            .filter(PomodoroSession::is_active)
            .max_by_key(|s| s.started_at))
    }
}
