//! JSON document store.
//!
//! Collections live in memory and, when the store is opened on a directory,
//! are written back as `todos.json` and `users.json` after every mutation:
//!   <data_dir>/todos.json
//!   <data_dir>/users.json

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::error::{TaskxError, TaskxResult};
use crate::store::{TaskStore, UserStore};
use crate::task::{PatchEffect, Task, TaskPatch};
use crate::user::{NotificationPreferences, TokenBundle, UserProfile};

const TASKS_FILE: &str = "todos.json";
const USERS_FILE: &str = "users.json";

pub struct DocumentStore {
    dir: Option<PathBuf>,
    tasks: RwLock<BTreeMap<String, Task>>,
    users: RwLock<BTreeMap<String, UserProfile>>,
}

impl DocumentStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        DocumentStore {
            dir: None,
            tasks: RwLock::new(BTreeMap::new()),
            users: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open (or create) a store persisted under `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> TaskxResult<Self> {
        let dir = dir.into();

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            TaskxError::Storage(format!("Could not create {}: {e}", dir.display()))
        })?;

        let tasks: Vec<Task> = load_collection(&dir.join(TASKS_FILE)).await?;
        let users: Vec<UserProfile> = load_collection(&dir.join(USERS_FILE)).await?;

        tracing::debug!(
            dir = %dir.display(),
            tasks = tasks.len(),
            users = users.len(),
            "Opened document store"
        );

        Ok(DocumentStore {
            dir: Some(dir),
            tasks: RwLock::new(tasks.into_iter().map(|t| (t.id.clone(), t)).collect()),
            users: RwLock::new(users.into_iter().map(|u| (u.uid.clone(), u)).collect()),
        })
    }

    /// Write `next` out, then make it the live collection. A failed write
    /// leaves `current` untouched.
    async fn commit_tasks(
        &self,
        current: &mut BTreeMap<String, Task>,
        next: BTreeMap<String, Task>,
    ) -> TaskxResult<()> {
        if let Some(dir) = &self.dir {
            write_collection(&dir.join(TASKS_FILE), next.values()).await?;
        }
        *current = next;
        Ok(())
    }

    async fn commit_users(
        &self,
        current: &mut BTreeMap<String, UserProfile>,
        next: BTreeMap<String, UserProfile>,
    ) -> TaskxResult<()> {
        if let Some(dir) = &self.dir {
            write_collection(&dir.join(USERS_FILE), next.values()).await?;
        }
        *current = next;
        Ok(())
    }

    /// Apply `f` to a stored user and persist the result.
    async fn modify_user<F>(&self, uid: &str, f: F) -> TaskxResult<UserProfile>
    where
        F: FnOnce(&mut UserProfile) + Send,
    {
        let mut users = self.users.write().await;
        let mut next = users.clone();
        let user = next
            .get_mut(uid)
            .ok_or_else(|| TaskxError::NotFound(format!("User {uid}")))?;
        f(user);
        let updated = user.clone();
        self.commit_users(&mut users, next).await?;
        Ok(updated)
    }

    async fn modify_task<F, R>(&self, id: &str, f: F) -> TaskxResult<R>
    where
        F: FnOnce(&mut Task) -> TaskxResult<R> + Send,
        R: Send,
    {
        let mut tasks = self.tasks.write().await;
        let mut next = tasks.clone();
        let task = next
            .get_mut(id)
            .ok_or_else(|| TaskxError::NotFound(format!("Task {id}")))?;
        let result = f(task)?;
        self.commit_tasks(&mut tasks, next).await?;
        Ok(result)
    }
}

async fn load_collection<T: DeserializeOwned>(path: &Path) -> TaskxResult<Vec<T>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(TaskxError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    serde_json::from_str(&contents)
        .map_err(|e| TaskxError::Storage(format!("Failed to parse {}: {e}", path.display())))
}

async fn write_collection<'a, T, I>(path: &Path, items: I) -> TaskxResult<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let contents = {
        let items: Vec<&T> = items.into_iter().collect();
        serde_json::to_string_pretty(&items)?
    };

    // Write next to the target and rename so readers never see half a file
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| TaskxError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;

    // Owner-only (0600) since user documents contain OAuth tokens
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
    }

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| TaskxError::Storage(format!("Failed to replace {}: {e}", path.display())))?;

    Ok(())
}

#[async_trait]
impl TaskStore for DocumentStore {
    async fn insert_task(&self, task: Task) -> TaskxResult<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(TaskxError::Storage(format!("Task {} already exists", task.id)));
        }
        let mut next = tasks.clone();
        next.insert(task.id.clone(), task.clone());
        self.commit_tasks(&mut tasks, next).await?;
        Ok(task)
    }

    async fn get_task(&self, id: &str) -> TaskxResult<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn tasks_for_user(&self, user_id: &str) -> TaskxResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut owned: Vec<Task> = tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn tasks_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TaskxResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut due: Vec<Task> = tasks
            .values()
            .filter(|t| t.deadline.is_some_and(|d| d >= from && d <= to))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.deadline);
        Ok(due)
    }

    async fn patch_task(
        &self,
        id: &str,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> TaskxResult<(Task, PatchEffect)> {
        self.modify_task(id, move |task| {
            let effect = patch.apply(task, now)?;
            Ok((task.clone(), effect))
        })
        .await
    }

    async fn set_calendar_event_id(&self, id: &str, event_id: Option<&str>) -> TaskxResult<()> {
        let event_id = event_id.map(str::to_string);
        self.modify_task(id, move |task| {
            task.calendar_event_id = event_id;
            Ok(())
        })
        .await
    }

    async fn claim_reminder(&self, id: &str) -> TaskxResult<bool> {
        let mut tasks = self.tasks.write().await;
        let claimed = tasks
            .get(id)
            .ok_or_else(|| TaskxError::NotFound(format!("Task {id}")))?;
        if claimed.reminder_sent {
            return Ok(false);
        }

        let mut next = tasks.clone();
        if let Some(task) = next.get_mut(id) {
            task.reminder_sent = true;
        }
        self.commit_tasks(&mut tasks, next).await?;
        Ok(true)
    }

    async fn release_reminder(&self, id: &str) -> TaskxResult<()> {
        self.modify_task(id, |task| {
            task.reminder_sent = false;
            Ok(())
        })
        .await
    }

    async fn delete_task(&self, id: &str) -> TaskxResult<()> {
        let mut tasks = self.tasks.write().await;
        let mut next = tasks.clone();
        if next.remove(id).is_none() {
            return Err(TaskxError::NotFound(format!("Task {id}")));
        }
        self.commit_tasks(&mut tasks, next).await
    }
}

#[async_trait]
impl UserStore for DocumentStore {
    async fn get_user(&self, uid: &str) -> TaskxResult<Option<UserProfile>> {
        Ok(self.users.read().await.get(uid).cloned())
    }

    async fn ensure_user(&self, uid: &str, email: Option<&str>) -> TaskxResult<UserProfile> {
        let mut users = self.users.write().await;

        let existing = users.get(uid).cloned();
        let mut profile = existing.clone().unwrap_or_else(|| UserProfile::new(uid));
        if profile.email_address().is_none() {
            profile.email = email.map(str::to_string);
        }

        if existing.as_ref() != Some(&profile) {
            if existing.is_none() {
                tracing::info!(user_id = uid, "Created user profile");
            }
            let mut next = users.clone();
            next.insert(uid.to_string(), profile.clone());
            self.commit_users(&mut users, next).await?;
        }

        Ok(profile)
    }

    async fn save_calendar_link(
        &self,
        uid: &str,
        tokens: &TokenBundle,
        calendar_id: &str,
    ) -> TaskxResult<()> {
        let mut users = self.users.write().await;
        let mut next = users.clone();
        let profile = next
            .entry(uid.to_string())
            .or_insert_with(|| UserProfile::new(uid));
        profile.google_tokens = Some(tokens.clone());
        profile.google_calendar_id = Some(calendar_id.to_string());
        self.commit_users(&mut users, next).await
    }

    async fn update_tokens(&self, uid: &str, tokens: &TokenBundle) -> TaskxResult<()> {
        let tokens = tokens.clone();
        self.modify_user(uid, move |user| user.google_tokens = Some(tokens))
            .await?;
        Ok(())
    }

    async fn clear_calendar_link(&self, uid: &str) -> TaskxResult<()> {
        self.modify_user(uid, |user| {
            user.google_tokens = None;
            user.google_calendar_id = None;
        })
        .await?;
        Ok(())
    }

    async fn update_notification_preferences(
        &self,
        uid: &str,
        prefs: &NotificationPreferences,
    ) -> TaskxResult<UserProfile> {
        let prefs = prefs.clone();
        self.modify_user(uid, move |user| {
            user.notification_type = prefs.notification_type;
            user.phone_number = prefs.phone_number;
        })
        .await
    }
}
