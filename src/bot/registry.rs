//! Session registry and roster persistence.
//!
//! The registry owns every running [`SessionHandle`], enforces
//! case-insensitive name uniqueness, and persists the roster as JSON
//! (`{ "bots": [ { "id", "name" } ] }`). Persistence is always a full-file
//! rewrite: the dataset is tiny and changes are human-driven.
//!
//! Two removal paths exist on purpose. `remove_session` is the operator
//! path: it stops the session, deletes its on-disk credentials and rewrites
//! the roster. `evict` is the supervisor path: it only drops the in-memory
//! session, so a restart will recreate and re-attempt it from the roster.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::backend::{ClientConnector, ConnectOptions};
use crate::config::DeployMode;

use super::errors::BotError;
use super::session::{spawn_session, BotSession, SessionHandle, SessionSettings, SessionStatus};

const MAX_NAME_LEN: usize = 64;

/// One persisted roster entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterFile {
    #[serde(default)]
    bots: Vec<RosterEntry>,
}

/// Point-in-time view of one registered session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: u64,
    pub name: String,
    pub ready: bool,
    pub authenticated: bool,
    pub state_label: &'static str,
}

/// Owns the set of running bot sessions and their persisted roster.
pub struct SessionRegistry {
    sessions: HashMap<u64, SessionHandle>,
    roster_path: PathBuf,
    auth_dir: PathBuf,
    connector: Arc<dyn ClientConnector>,
    settings: SessionSettings,
    mode: DeployMode,
}

impl SessionRegistry {
    pub fn new(
        roster_path: impl Into<PathBuf>,
        auth_dir: impl Into<PathBuf>,
        connector: Arc<dyn ClientConnector>,
        settings: SessionSettings,
        mode: DeployMode,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            roster_path: roster_path.into(),
            auth_dir: auth_dir.into(),
            connector,
            settings,
            mode,
        }
    }

    /// Load the persisted roster. Duplicate names (case-insensitive) are
    /// collapsed, first occurrence wins, input order preserved. A missing
    /// or malformed file is never fatal: it yields an empty roster.
    pub async fn load_roster(path: &Path) -> Vec<RosterEntry> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                info!("no roster at {} ({}); starting empty", path.display(), e);
                return Vec::new();
            }
        };
        let file: RosterFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    "malformed roster at {} ({}); starting empty",
                    path.display(),
                    e
                );
                return Vec::new();
            }
        };
        dedup_entries(file.bots)
    }

    /// Start sessions for every roster entry. Failures to connect one
    /// session are logged and do not stop the others.
    pub async fn start_from_roster(&mut self, entries: Vec<RosterEntry>) {
        for entry in entries {
            if let Err(e) = self.spawn_entry(&entry).await {
                warn!("could not start bot \"{}\": {}", entry.name, e);
            } else {
                info!("started bot \"{}\" (id {})", entry.name, entry.id);
            }
        }
    }

    /// Create, start and persist a new session with a unique name.
    pub async fn add_session(&mut self, name: &str) -> Result<u64, BotError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BotError::InvalidName("name is empty".to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(BotError::InvalidName(format!(
                "name longer than {} characters",
                MAX_NAME_LEN
            )));
        }
        let lower = name.to_lowercase();
        if self
            .sessions
            .values()
            .any(|h| h.name.to_lowercase() == lower)
        {
            return Err(BotError::DuplicateName(name.to_string()));
        }

        let id = allocate_id();
        let entry = RosterEntry {
            id,
            name: name.to_string(),
        };
        self.spawn_entry(&entry).await?;
        self.save_roster().await?;
        info!("bot \"{}\" added with id {}", name, id);
        Ok(id)
    }

    /// Stop a session, delete its on-disk credentials and roster entry.
    pub async fn remove_session(&mut self, id: u64) -> Result<String, BotError> {
        let handle = self
            .sessions
            .remove(&id)
            .ok_or(BotError::SessionNotFound(id))?;
        let name = handle.name.clone();
        handle.shutdown().await;

        let session_auth = self.session_auth_path(id);
        if session_auth.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&session_auth).await {
                warn!(
                    "auth state cleanup failed for {}: {}",
                    session_auth.display(),
                    e
                );
            }
        }

        self.save_roster().await?;
        info!("bot \"{}\" removed", name);
        Ok(name)
    }

    /// Supervisor eviction: drop the in-memory session only. The roster
    /// entry and auth state stay, so the next process start re-attempts it.
    pub async fn evict(&mut self, id: u64) -> Result<String, BotError> {
        let handle = self
            .sessions
            .remove(&id)
            .ok_or(BotError::SessionNotFound(id))?;
        let name = handle.name.clone();
        handle.shutdown().await;
        Ok(name)
    }

    /// Gracefully stop every session (process shutdown).
    pub async fn shutdown_all(&mut self) {
        info!("stopping all bots...");
        for (_, handle) in self.sessions.drain() {
            handle.shutdown().await;
        }
    }

    /// Auto-provision the default session for unattended deployments with
    /// an empty roster.
    pub async fn create_default_session(&mut self) -> Result<u64, BotError> {
        let name = format!("Railway-Bot-{}", Utc::now().format("%Y-%m-%d"));
        let id = self.add_session(&name).await?;
        info!("default bot created: {}", name);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|h| h.status().is_ready())
            .count()
    }

    /// Snapshot of every session's status fields, sorted by id for stable
    /// listings.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut list: Vec<SessionSnapshot> = self
            .sessions
            .values()
            .map(|h| SessionSnapshot {
                id: h.id,
                name: h.name.clone(),
                ready: h.status().is_ready(),
                authenticated: h.status().is_authenticated(),
                state_label: h.status().ready_state().label(),
            })
            .collect();
        list.sort_by_key(|s| s.id);
        list
    }

    async fn spawn_entry(&mut self, entry: &RosterEntry) -> Result<(), BotError> {
        let session_auth = self.session_auth_path(entry.id);
        tokio::fs::create_dir_all(&session_auth).await?;

        let opts = ConnectOptions {
            auth_path: session_auth,
            qr_max_retries: self.mode.qr_max_retries(),
        };
        let (client, events) = self.connector.connect(entry.id, opts).await?;

        let status = Arc::new(SessionStatus::default());
        let session = BotSession::new(
            entry.id,
            entry.name.clone(),
            client,
            status,
            self.settings.clone(),
        );
        let handle = spawn_session(session, events);
        self.sessions.insert(entry.id, handle);
        Ok(())
    }

    async fn save_roster(&self) -> Result<(), BotError> {
        let mut bots: Vec<RosterEntry> = self
            .sessions
            .values()
            .map(|h| RosterEntry {
                id: h.id,
                name: h.name.clone(),
            })
            .collect();
        bots.sort_by_key(|e| e.id);
        let file = RosterFile { bots };
        let content = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&self.roster_path, content).await?;
        Ok(())
    }

    fn session_auth_path(&self, id: u64) -> PathBuf {
        self.auth_dir.join(format!("session-bot-{}", id))
    }
}

/// Fresh session id: epoch millis plus a small random component so two
/// sessions created within the same millisecond stay distinct.
fn allocate_id() -> u64 {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    millis + rand::thread_rng().gen_range(0..1000)
}

fn dedup_entries(entries: Vec<RosterEntry>) -> Vec<RosterEntry> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for entry in entries {
        if seen.insert(entry.name.to_lowercase()) {
            unique.push(entry);
        }
    }
    unique
}
