/*
Document store backed by a single JSON file.
The whole Db lives in memory behind a RwLock; every write is flushed
to disk atomically (tmp file + rename). Last write wins.
*/

use std::{fs, io, path::Path, path::PathBuf};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Db, Task, User};

pub const DEFAULT_DB_PATH: &str = "data/db.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),

    #[error("store document is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

pub struct Store {
    path: Option<PathBuf>, // None -> memory only
    db: RwLock<Db>,
}

impl Store {
    /// Open the file at `path`, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let db = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no database file yet, starting empty");
                Db::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Store {
            path: Some(path),
            db: RwLock::new(db),
        })
    }

    pub fn in_memory() -> Self {
        Store {
            path: None,
            db: RwLock::new(Db::default()),
        }
    }

    async fn read<T>(&self, f: impl FnOnce(&Db) -> T) -> T {
        let db = self.db.read().await;
        f(&db)
    }

    // Memory only changes once the save succeeded
    async fn write<T>(&self, f: impl FnOnce(&mut Db) -> T) -> Result<T, StoreError> {
        let mut db = self.db.write().await;
        let mut next = db.clone();
        let out = f(&mut next);
        if let Some(path) = &self.path {
            save_db(path, &next)?;
        }
        *db = next;
        Ok(out)
    }

    // -----------------------------
    // users
    // -----------------------------

    pub async fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.read(|db| db.users.iter().find(|u| u.email == email).cloned())
            .await
    }

    pub async fn find_user(&self, id: Uuid) -> Option<User> {
        self.read(|db| db.users.iter().find(|u| u.id == id).cloned())
            .await
    }

    pub async fn find_user_by_google_id(&self, google_id: &str) -> Option<User> {
        self.read(|db| {
            db.users
                .iter()
                .find(|u| u.google_id.as_deref() == Some(google_id))
                .cloned()
        })
        .await
    }

    pub async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.write(|db| db.users.push(user)).await
    }

    pub async fn save_user(&self, user: &User) -> Result<bool, StoreError> {
        self.write(|db| match db.users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                *slot = user.clone();
                true
            }
            None => false,
        })
        .await
    }

    // -----------------------------
    // tasks (always owner-scoped)
    // -----------------------------

    pub async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        debug!(task_id = %task.id, "inserting task");
        self.write(|db| db.tasks.push(task)).await
    }

    pub async fn find_task(&self, owner: Uuid, id: Uuid) -> Option<Task> {
        self.read(|db| {
            db.tasks
                .iter()
                .find(|t| t.id == id && t.user_id == owner)
                .cloned()
        })
        .await
    }

    /// Tasks of `owner` in storage order.
    pub async fn list_tasks(&self, owner: Uuid) -> Vec<Task> {
        self.read(|db| {
            db.tasks
                .iter()
                .filter(|t| t.user_id == owner)
                .cloned()
                .collect()
        })
        .await
    }

    /// Replace a stored task. Returns false when it does not exist for that owner.
    pub async fn save_task(&self, task: &Task) -> Result<bool, StoreError> {
        self.write(|db| {
            match db
                .tasks
                .iter_mut()
                .find(|t| t.id == task.id && t.user_id == task.user_id)
            {
                Some(slot) => {
                    *slot = task.clone();
                    true
                }
                None => false,
            }
        })
        .await
    }

    pub async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        self.write(|db| {
            let before = db.tasks.len();
            db.tasks.retain(|t| !(t.id == id && t.user_id == owner));
            db.tasks.len() != before
        })
        .await
    }
}

fn save_db(path: &Path, db: &Db) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("json.tmp");
    let text = serde_json::to_string_pretty(db)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&tmp_path, text)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
