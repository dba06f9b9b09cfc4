use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::metrics::RiskIndicators;
use crate::poller::PollTicket;
use crate::resilience::{Resolved, SurfacedError};
use crate::types::{find_position, BalanceSnapshot, BotStatus, LogLine, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Status,
    Balance,
    Positions,
    Logs,
    Health,
}

impl ResourceKind {
    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Status => "status",
            ResourceKind::Balance => "balance",
            ResourceKind::Positions => "positions",
            ResourceKind::Logs => "logs",
            ResourceKind::Health => "health",
        };
        f.write_str(name)
    }
}

/// Latest known value for one resource.
///
/// A failed fetch without a fallback keeps the previous value and sets `error`; the next
/// success clears it.
#[derive(Debug, Clone, Serialize)]
pub struct Slot<T> {
    pub value: Option<T>,
    pub error: Option<String>,
    pub degraded: bool,
    pub last_update: Option<DateTime<Utc>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
            degraded: false,
            last_update: None,
        }
    }
}

impl<T> Slot<T> {
    fn set(&mut self, value: T, degraded: bool) {
        self.value = Some(value);
        self.error = None;
        self.degraded = degraded;
        self.last_update = Some(Utc::now());
    }

    fn fail(&mut self, error: SurfacedError) {
        self.error = Some(error.error);
        self.last_update = Some(Utc::now());
    }

    fn resolve(&mut self, result: Result<T, SurfacedError>) {
        match result {
            Ok(value) => self.set(value, false),
            Err(e) => self.fail(e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewData {
    pub status: Slot<BotStatus>,
    pub balance: Slot<BalanceSnapshot>,
    pub positions: Slot<Vec<Position>>,
    pub logs: Slot<Vec<LogLine>>,
    pub backend_alive: Slot<bool>,
    pub last_ping: Option<DateTime<Utc>>,
    applied: [u64; 5],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The issuing poller was stopped before the result arrived.
    Cancelled,
    /// A result issued later has already been applied.
    Stale { seq: u64, last_applied: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Discarded(DiscardReason),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ViewEvent {
    StatusUpdate {
        status: Option<BotStatus>,
        error: Option<String>,
    },
    BalanceUpdate {
        balance: BalanceSnapshot,
        degraded: bool,
        risk: RiskIndicators,
    },
    PositionsUpdate {
        positions: Option<Vec<Position>>,
        error: Option<String>,
    },
    LogsUpdate {
        lines: usize,
        degraded: bool,
    },
    HealthUpdate {
        alive: bool,
        last_ping: Option<DateTime<Utc>>,
    },
}

/// What display consumers read: every slot plus indicators derived from the balance.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub status: Slot<BotStatus>,
    pub balance: Slot<BalanceSnapshot>,
    pub risk: Option<RiskIndicators>,
    pub positions: Slot<Vec<Position>>,
    pub logs: Slot<Vec<LogLine>>,
    pub backend_alive: Slot<bool>,
    pub last_ping: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

/// The single writer of the reconciled dashboard view.
///
/// Each resource is written independently. A write carries the sequence number handed out
/// by [`ViewState::next_seq`] when its call was issued, and is dropped if a later-issued
/// result already landed or if the poller that issued it has been stopped. Liveness and
/// sequence are checked under the same write lock as the mutation.
#[derive(Clone)]
pub struct ViewState {
    inner: Arc<RwLock<ViewData>>,
    issued: Arc<[AtomicU64; 5]>,
    pub tx: broadcast::Sender<ViewEvent>,
}

impl ViewState {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(RwLock::new(ViewData::default())),
            issued: Arc::new(Default::default()),
            tx,
        }
    }

    /// Allocates the sequence number for a call about to be issued.
    pub fn next_seq(&self, kind: ResourceKind) -> u64 {
        self.issued[kind.index()].fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.tx.subscribe()
    }

    async fn apply(
        &self,
        kind: ResourceKind,
        seq: u64,
        ticket: Option<&PollTicket>,
        update: impl FnOnce(&mut ViewData) -> ViewEvent,
    ) -> ApplyOutcome {
        let mut data = self.inner.write().await;

        if let Some(ticket) = ticket {
            if !ticket.is_live() {
                debug!(
                    "[{}] seq {} (tick {}) arrived after stop, discarded",
                    kind,
                    seq,
                    ticket.tick()
                );
                return ApplyOutcome::Discarded(DiscardReason::Cancelled);
            }
        }

        let last_applied = data.applied[kind.index()];
        if seq <= last_applied {
            debug!(
                "[{}] seq {} older than applied seq {}, discarded",
                kind, seq, last_applied
            );
            return ApplyOutcome::Discarded(DiscardReason::Stale { seq, last_applied });
        }
        data.applied[kind.index()] = seq;

        let event = update(&mut data);
        drop(data);

        let _ = self.tx.send(event);
        ApplyOutcome::Applied
    }

    pub async fn apply_status(
        &self,
        seq: u64,
        ticket: Option<&PollTicket>,
        result: Result<BotStatus, SurfacedError>,
    ) -> ApplyOutcome {
        self.apply(ResourceKind::Status, seq, ticket, |data| {
            data.status.resolve(result);
            ViewEvent::StatusUpdate {
                status: data.status.value.clone(),
                error: data.status.error.clone(),
            }
        })
        .await
    }

    pub async fn apply_positions(
        &self,
        seq: u64,
        ticket: Option<&PollTicket>,
        result: Result<Vec<Position>, SurfacedError>,
    ) -> ApplyOutcome {
        self.apply(ResourceKind::Positions, seq, ticket, |data| {
            data.positions.resolve(result);
            ViewEvent::PositionsUpdate {
                positions: data.positions.value.clone(),
                error: data.positions.error.clone(),
            }
        })
        .await
    }

    pub async fn apply_balance(
        &self,
        seq: u64,
        ticket: Option<&PollTicket>,
        resolved: Resolved<BalanceSnapshot>,
    ) -> ApplyOutcome {
        self.apply(ResourceKind::Balance, seq, ticket, |data| {
            let risk = RiskIndicators::from_balance(&resolved.value);
            let event = ViewEvent::BalanceUpdate {
                balance: resolved.value.clone(),
                degraded: resolved.degraded,
                risk,
            };
            data.balance.set(resolved.value, resolved.degraded);
            event
        })
        .await
    }

    pub async fn apply_logs(
        &self,
        seq: u64,
        ticket: Option<&PollTicket>,
        resolved: Resolved<Vec<LogLine>>,
    ) -> ApplyOutcome {
        self.apply(ResourceKind::Logs, seq, ticket, |data| {
            let event = ViewEvent::LogsUpdate {
                lines: resolved.value.len(),
                degraded: resolved.degraded,
            };
            data.logs.set(resolved.value, resolved.degraded);
            event
        })
        .await
    }

    pub async fn apply_health(
        &self,
        seq: u64,
        ticket: Option<&PollTicket>,
        alive: bool,
    ) -> ApplyOutcome {
        self.apply(ResourceKind::Health, seq, ticket, |data| {
            data.backend_alive.set(alive, false);
            if alive {
                data.last_ping = data.backend_alive.last_update;
            }
            ViewEvent::HealthUpdate {
                alive,
                last_ping: data.last_ping,
            }
        })
        .await
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let data = self.inner.read().await;
        ViewSnapshot {
            status: data.status.clone(),
            balance: data.balance.clone(),
            risk: data.balance.value.as_ref().map(RiskIndicators::from_balance),
            positions: data.positions.clone(),
            logs: data.logs.clone(),
            backend_alive: data.backend_alive.clone(),
            last_ping: data.last_ping,
            generated_at: Utc::now(),
        }
    }

    pub async fn has_position(&self, symbol: &str) -> bool {
        let data = self.inner.read().await;
        data.positions
            .value
            .as_deref()
            .map(|positions| find_position(positions, symbol).is_some())
            .unwrap_or(false)
    }

    /// Current log lines joined for download.
    pub async fn log_text(&self) -> String {
        let data = self.inner.read().await;
        data.logs
            .value
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(LogLine::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}
