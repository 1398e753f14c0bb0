//! Process-level supervision.
//!
//! Three periodic actions run over registry snapshots, on independent
//! timers inside one task:
//!
//! - **health report**: purely observational log line (ready/total, RSS,
//!   uptime) with a high-memory warning;
//! - **keep-alive**: if no session has been Ready for longer than the
//!   grace window, give up and ask for an external restart through the
//!   fatal channel; backend auth state is cheaper to rebuild on a fresh
//!   process than to repair here;
//! - **stale cleanup**: evict sessions that are neither Ready nor
//!   authenticated (e.g. a QR nobody ever scanned) from the in-memory
//!   registry only; their roster entries stay.
//!
//! Reading status fields concurrently with session dispatch is safe: only
//! a session's own task mutates its status, and the registry only appends
//! or removes whole entries under its lock.

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::SupervisorConfig;
use crate::procinfo;

use super::registry::{SessionRegistry, SessionSnapshot};

/// Reason sent on the fatal channel; main exits non-zero so the external
/// process manager restarts us.
pub type FatalReason = String;

pub struct Supervisor {
    registry: Arc<Mutex<SessionRegistry>>,
    config: SupervisorConfig,
    fatal_tx: mpsc::UnboundedSender<FatalReason>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<Mutex<SessionRegistry>>,
        config: SupervisorConfig,
        fatal_tx: mpsc::UnboundedSender<FatalReason>,
    ) -> Self {
        Self {
            registry,
            config,
            fatal_tx,
        }
    }

    /// Spawn the supervision loop. The task runs until the process exits
    /// or the keep-alive check fires the fatal channel.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut health = interval(Duration::from_secs(self.config.health_interval_secs));
            let mut keepalive = interval(Duration::from_secs(self.config.keepalive_interval_secs));
            let mut cleanup = interval(Duration::from_secs(self.config.cleanup_interval_secs));
            for ticker in [&mut health, &mut keepalive, &mut cleanup] {
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick of an interval fires immediately; skip it
                // so each action waits one full period before acting.
                ticker.tick().await;
            }

            let mut last_ready = Instant::now();
            info!("supervisor started");

            loop {
                tokio::select! {
                    _ = health.tick() => self.report_health().await,
                    _ = keepalive.tick() => {
                        if self.check_keepalive(&mut last_ready).await {
                            break;
                        }
                    }
                    _ = cleanup.tick() => self.cleanup_stale().await,
                }
            }
            info!("supervisor loop terminated");
        })
    }

    async fn report_health(&self) {
        let (ready, total) = {
            let registry = self.registry.lock().await;
            (registry.ready_count(), registry.len())
        };
        let memory = procinfo::rss_mib();
        info!(
            "health: ready={}/{} memory={} uptime={}s",
            ready,
            total,
            memory.map(|m| format!("{}MB", m)).unwrap_or_else(|| "?".to_string()),
            procinfo::uptime_secs()
        );
        if let Some(mib) = memory {
            if mib > self.config.memory_warn_mib {
                warn!("high memory usage: {}MB (threshold {}MB)", mib, self.config.memory_warn_mib);
            }
        }
    }

    /// Returns true when the fatal signal was fired.
    async fn check_keepalive(&self, last_ready: &mut Instant) -> bool {
        let ready = self.registry.lock().await.ready_count();
        if ready > 0 {
            *last_ready = Instant::now();
            return false;
        }
        let stalled_for = last_ready.elapsed();
        if stalled_for.as_secs() > self.config.ready_grace_secs {
            let reason = format!(
                "no ready bots for {}s (grace {}s)",
                stalled_for.as_secs(),
                self.config.ready_grace_secs
            );
            warn!("keep-alive: {} - requesting restart", reason);
            let _ = self.fatal_tx.send(reason);
            return true;
        }
        false
    }

    async fn cleanup_stale(&self) {
        let stale = {
            let registry = self.registry.lock().await;
            stale_ids(&registry.snapshot())
        };
        if stale.is_empty() {
            return;
        }
        let mut cleaned = 0usize;
        for id in stale {
            let mut registry = self.registry.lock().await;
            match registry.evict(id).await {
                Ok(name) => {
                    info!("cleaned up stuck bot \"{}\" (id {})", name, id);
                    cleaned += 1;
                }
                // Removed by the operator between snapshot and eviction.
                Err(_) => {}
            }
        }
        if cleaned > 0 {
            info!("cleaned up {} inactive bot(s)", cleaned);
        }
    }
}

/// Sessions eligible for eviction: neither Ready nor authenticated. A
/// session with either flag set is never considered stale, regardless of
/// how long it has been running.
fn stale_ids(snapshots: &[SessionSnapshot]) -> Vec<u64> {
    snapshots
        .iter()
        .filter(|s| !s.ready && !s.authenticated)
        .map(|s| s.id)
        .collect()
}
