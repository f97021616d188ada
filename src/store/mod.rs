//! Durable store for identities, projects, settings and the email audit log.
//! SQLite-backed; the unique index on users.email and the singleton guard on
//! settings.is_default are enforced here rather than in process memory.

mod users;
mod projects;
mod settings;
mod email_log;

pub use users::{NewUser, Role, User};
pub use projects::{NewProject, Project, PROJECT_STATUSES};
pub use settings::{Setting, SettingUpdate};
pub use email_log::EmailLog;

use crate::error::AppResult;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> AppResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                token_version INTEGER NOT NULL DEFAULT 0,
                phone TEXT NOT NULL DEFAULT '',
                job_title TEXT NOT NULL DEFAULT 'Staff',
                department TEXT NOT NULL DEFAULT 'General',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                client TEXT NOT NULL,
                client_email TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                deadline TEXT NOT NULL,
                budget REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'Pending',
                assigned_to TEXT,
                priority TEXT NOT NULL DEFAULT 'Medium',
                tech_stack TEXT NOT NULL DEFAULT '',
                project_type TEXT NOT NULL DEFAULT 'Web Development',
                docs_link TEXT NOT NULL DEFAULT '',
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_projects_assigned
                ON projects(assigned_to);
            CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY,
                company_name TEXT NOT NULL,
                contact_email TEXT NOT NULL,
                whatsapp_number TEXT NOT NULL,
                address TEXT NOT NULL,
                gstin TEXT NOT NULL,
                website TEXT NOT NULL,
                facebook_url TEXT NOT NULL DEFAULT '',
                instagram_url TEXT NOT NULL DEFAULT '',
                twitter_url TEXT NOT NULL DEFAULT '',
                is_default INTEGER NOT NULL DEFAULT 1 CHECK (is_default = 1) UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS email_log (
                id TEXT PRIMARY KEY,
                client_name TEXT NOT NULL,
                client_email TEXT NOT NULL,
                invoice_number TEXT NOT NULL,
                project_id TEXT NOT NULL,
                sent_by TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Sent',
                sent_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

/// Shared handle injected into handlers; one request locks at a time.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        Ok(SharedStore(Arc::new(Mutex::new(Store::open(path)?))))
    }

    pub fn in_memory() -> AppResult<Self> {
        Ok(SharedStore(Arc::new(Mutex::new(Store::in_memory()?))))
    }
}
