//! In-memory `Database` backend.
//!
//! Records live in maps behind a `tokio::sync::RwLock`. Used by the server
//! binary when no external store is wired in, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::model::{Habit, HabitEntry, PomodoroSession, Task};
use super::traits::Database;
use crate::auth::UserId;
use crate::error::DatabaseError;

#[derive(Default)]
struct Tables {
    tasks: HashMap<Uuid, Task>,
    habits: HashMap<Uuid, Habit>,
    habit_entries: HashMap<(Uuid, NaiveDate), HabitEntry>,
    sessions: HashMap<Uuid, PomodoroSession>,
}

/// Volatile store; contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(entity: &str, id: Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl Database for InMemoryStore {
    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.tasks.contains_key(&task.id) {
            return Err(DatabaseError::Constraint(format!(
                "task {} already exists",
                task.id
            )));
        }
        tables.tasks.insert(task.id, task.clone());
        debug!(task_id = %task.id, user_id = %task.user_id, "Task created");
        Ok(())
    }

    async fn list_tasks(&self, owner: &UserId) -> Result<Vec<Task>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| &t.user_id == owner)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn get_task(&self, owner: &UserId, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .get(&id)
            .filter(|t| &t.user_id == owner)
            .cloned())
    }

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&task.id) {
            Some(existing) if existing.user_id == task.user_id => {
                *existing = task.clone();
                existing.updated_at = chrono::Utc::now();
                Ok(())
            }
            _ => Err(not_found("task", task.id)),
        }
    }

    async fn delete_task(&self, owner: &UserId, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        let owned = tables.tasks.get(&id).is_some_and(|t| &t.user_id == owner);
        if owned {
            tables.tasks.remove(&id);
        }
        Ok(owned)
    }

    async fn create_habit(&self, habit: &Habit) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.habits.contains_key(&habit.id) {
            return Err(DatabaseError::Constraint(format!(
                "habit {} already exists",
                habit.id
            )));
        }
        tables.habits.insert(habit.id, habit.clone());
        Ok(())
    }

    async fn list_habits(&self, owner: &UserId) -> Result<Vec<Habit>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut habits: Vec<Habit> = tables
            .habits
            .values()
            .filter(|h| &h.user_id == owner)
            .cloned()
            .collect();
        habits.sort_by_key(|h| h.created_at);
        Ok(habits)
    }

    async fn delete_habit(&self, owner: &UserId, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        let owned = tables.habits.get(&id).is_some_and(|h| &h.user_id == owner);
        if owned {
            tables.habits.remove(&id);
            tables.habit_entries.retain(|(habit_id, _), _| *habit_id != id);
        }
        Ok(owned)
    }

    async fn record_habit_entry(&self, entry: &HabitEntry) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .habits
            .get(&entry.habit_id)
            .is_some_and(|h| h.user_id == entry.user_id);
        if !owned {
            return Err(not_found("habit", entry.habit_id));
        }
        tables
            .habit_entries
            .insert((entry.habit_id, entry.date), entry.clone());
        Ok(())
    }

    async fn list_habit_entries(
        &self,
        owner: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<HabitEntry>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .habit_entries
            .values()
            .filter(|e| &e.user_id == owner && e.date == date)
            .cloned()
            .collect())
    }

    async fn create_session(&self, session: &PomodoroSession) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn list_sessions(&self, owner: &UserId) -> Result<Vec<PomodoroSession>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<PomodoroSession> = tables
            .sessions
            .values()
            .filter(|s| &s.user_id == owner)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn update_session(&self, session: &PomodoroSession) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&session.id) {
            Some(existing) if existing.user_id == session.user_id => {
                *existing = session.clone();
                Ok(())
            }
            _ => Err(not_found("session", session.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::{SessionType, TaskStatus};
    use chrono::{Duration, Utc};

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[tokio::test]
    async fn task_crud_is_owner_scoped() {
        let store = InMemoryStore::new();
        let task = Task::new(alice(), "Write report");
        store.create_task(&task).await.unwrap();

        assert_eq!(store.list_tasks(&alice()).await.unwrap().len(), 1);
        assert!(store.list_tasks(&UserId::new("bob")).await.unwrap().is_empty());
        assert!(store.get_task(&UserId::new("bob"), task.id).await.unwrap().is_none());

        let mut updated = task.clone();
        updated.status = TaskStatus::Done;
        store.update_task(&updated).await.unwrap();
        let fetched = store.get_task(&alice(), task.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Done);

        assert!(!store.delete_task(&UserId::new("bob"), task.id).await.unwrap());
        assert!(store.delete_task(&alice(), task.id).await.unwrap());
        assert!(store.list_tasks(&alice()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_task_rejected() {
        let store = InMemoryStore::new();
        let task = Task::new(alice(), "Once");
        store.create_task(&task).await.unwrap();
        let err = store.create_task(&task).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn overdue_tasks_sorted_by_due_date() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let older = Task::new(alice(), "older").with_due_date(now - Duration::days(3));
        let newer = Task::new(alice(), "newer").with_due_date(now - Duration::days(1));
        let later = Task::new(alice(), "later").with_due_date(now + Duration::days(1));
        store.create_task(&newer).await.unwrap();
        store.create_task(&older).await.unwrap();
        store.create_task(&later).await.unwrap();

        let overdue = store.list_overdue_tasks(&alice(), now).await.unwrap();
        let titles: Vec<&str> = overdue.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn habit_entry_upserts_per_day() {
        let store = InMemoryStore::new();
        let habit = Habit::new(alice(), "Read");
        store.create_habit(&habit).await.unwrap();
        let today = Utc::now().date_naive();

        store
            .record_habit_entry(&HabitEntry::new(&habit, today, false))
            .await
            .unwrap();
        store
            .record_habit_entry(&HabitEntry::new(&habit, today, true))
            .await
            .unwrap();

        let entries = store.list_habit_entries(&alice(), today).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].completed);
    }

    #[tokio::test]
    async fn habit_entry_for_unknown_habit_fails() {
        let store = InMemoryStore::new();
        let habit = Habit::new(alice(), "Ghost");
        let err = store
            .record_habit_entry(&HabitEntry::new(&habit, Utc::now().date_naive(), true))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn active_session_ignores_ended() {
        let store = InMemoryStore::new();
        let mut ended = PomodoroSession::start(alice(), SessionType::Work);
        ended.ended_at = Some(Utc::now());
        store.create_session(&ended).await.unwrap();
        assert!(store.active_session(&alice()).await.unwrap().is_none());

        let running = PomodoroSession::start(alice(), SessionType::ShortBreak);
        store.create_session(&running).await.unwrap();
        let active = store.active_session(&alice()).await.unwrap().unwrap();
        assert_eq!(active.id, running.id);
    }
}
