//! # botfleet - Multi-Session Chat Bot Manager
//!
//! botfleet runs a fleet of independent chat-bot sessions against an
//! external messaging backend. Each session carries its own authentication
//! state, reacts to a dot-prefixed command surface, and can hold a
//! multi-step dialog with each contact (pick a group from a numbered menu,
//! then type the message) without blocking other contacts or sessions.
//! A process-level supervisor reports health, forces a restart when no
//! session stays ready, and evicts sessions that never authenticate.
//!
//! ## Features
//!
//! - **Session registry**: named sessions persisted to a JSON roster,
//!   created and removed at runtime from an interactive menu.
//! - **Per-contact dialogs**: multi-turn command flows tracked per contact,
//!   cancellable at any step, never expired by timeout.
//! - **Backend-agnostic**: the messaging backend is consumed through the
//!   [`backend::MessagingClient`] capability trait; deployments plug in
//!   their own bridge via [`backend::ClientConnector`].
//! - **Supervised liveness**: unattended deployments exit non-zero after a
//!   readiness grace window so the platform restarts the process.
//! - **Async design**: one Tokio task per session; events per session are
//!   strictly ordered, sessions never block each other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use botfleet::backend::detached::DetachedConnector;
//! use botfleet::bot::{SessionRegistry, SessionSettings};
//! use botfleet::config::{Config, DeployMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("botfleet.toml").await?;
//!     let mode = DeployMode::detect();
//!     let mut registry = SessionRegistry::new(
//!         &config.manager.roster_file,
//!         &config.manager.auth_dir,
//!         Arc::new(DetachedConnector),
//!         SessionSettings::from_config(&config, mode),
//!         mode,
//!     );
//!     let roster = SessionRegistry::load_roster(
//!         std::path::Path::new(&config.manager.roster_file),
//!     ).await;
//!     registry.start_from_roster(roster).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bot`] - Core: sessions, dialogs, registry, supervisor
//! - [`backend`] - Messaging backend boundary (traits + data contracts)
//! - [`config`] - Settings file and deployment mode detection
//! - [`logutil`] - Log sanitation helpers
//! - [`procinfo`] - Process uptime and memory snapshots

pub mod backend;
pub mod bot;
pub mod config;
pub mod logutil;
pub mod menu;
pub mod procinfo;
