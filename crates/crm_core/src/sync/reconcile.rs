//! Client-side daily-log cache kept in step with a [`DailyLogGateway`].
//!
//! # Responsibility
//! - Create logs with all of their initial entries, batched or paced.
//! - Re-read a log after every mutation and replace the cached copy, also
//!   when the gateway rejects the mutation.
//! - Retry transient gateway failures with capped exponential backoff.
//!
//! # Invariants
//! - A cached log is always a copy of what the gateway last returned.
//! - Locally closed logs reject appends and re-closes without a gateway call.
//! - A call is attempted at most `max_retries + 1` times.

use crate::config::SyncConfig;
use crate::model::daily_log::{DailyLog, DailyLogKind};
use crate::model::RecordId;
use crate::sync::gateway::{DailyLogGateway, GatewayError, GatewayResult};
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Source of waits between gateway calls.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }
}

#[derive(Debug)]
pub enum ReconcileError {
    /// Gateway call failed for good after `attempts` tries.
    Gateway {
        op: &'static str,
        attempts: u32,
        source: GatewayError,
    },
    /// A log needs at least one entry at creation.
    NoSubjects,
    LogClosed(RecordId),
    AlreadyClosed(RecordId),
    /// Gateway answered with a different log than requested.
    UnexpectedLog {
        requested: RecordId,
        received: RecordId,
    },
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway {
                op,
                attempts,
                source,
            } => write!(f, "{op} gave up after {attempts} attempt(s): {source}"),
            Self::NoSubjects => write!(f, "a daily log needs at least one entry"),
            Self::LogClosed(id) => write!(f, "daily log {id} is closed and accepts no entries"),
            Self::AlreadyClosed(id) => write!(f, "daily log {id} is already closed"),
            Self::UnexpectedLog {
                requested,
                received,
            } => write!(
                f,
                "requested daily log {requested} but gateway returned {received}"
            ),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Gateway { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Outcome of the most recent gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncHealth {
    #[default]
    Healthy,
    /// Last call failed; carries the failing operation and error code.
    Degraded { op: &'static str, code: String },
}

pub struct DailyLogReconciler<G: DailyLogGateway, P: Pause = ThreadPause> {
    gateway: G,
    pause: P,
    config: SyncConfig,
    logs: BTreeMap<RecordId, DailyLog>,
    health: SyncHealth,
}

impl<G: DailyLogGateway> DailyLogReconciler<G, ThreadPause> {
    pub fn new(gateway: G, config: SyncConfig) -> Self {
        Self::with_pause(gateway, config, ThreadPause)
    }
}

impl<G: DailyLogGateway, P: Pause> DailyLogReconciler<G, P> {
    pub fn with_pause(gateway: G, config: SyncConfig, pause: P) -> Self {
        Self {
            gateway,
            pause,
            config,
            logs: BTreeMap::new(),
            health: SyncHealth::Healthy,
        }
    }

    pub fn health(&self) -> &SyncHealth {
        &self.health
    }

    pub fn cached(&self, log_id: RecordId) -> Option<&DailyLog> {
        self.logs.get(&log_id)
    }

    /// Cached logs of `kind`, newest date first.
    pub fn cached_logs(&self, kind: DailyLogKind) -> Vec<&DailyLog> {
        let mut logs: Vec<&DailyLog> = self.logs.values().filter(|log| log.kind == kind).collect();
        logs.sort_by(|left, right| right.log_date.cmp(&left.log_date));
        logs
    }

    /// Creates a log holding every subject, then caches the stored copy.
    ///
    /// The first subject goes in with the create call. The rest go in one
    /// batch call, or one call each with `entry_delay` between them when
    /// batching is off.
    pub fn create_with_entries(
        &mut self,
        kind: DailyLogKind,
        log_date: &str,
        subject_ids: &[RecordId],
    ) -> ReconcileResult<&DailyLog> {
        let Some((&first, rest)) = subject_ids.split_first() else {
            return Err(ReconcileError::NoSubjects);
        };

        let created = self.with_retry("create_log", |gateway| {
            gateway.create_log(kind, log_date, first)
        })?;
        let log_id = created.uuid;
        self.logs.insert(log_id, created);
        self.push_entries(log_id, rest)?;

        info!(
            "event=daily_log_sync module=sync status=ok op=create kind={} log_date={} entries={}",
            kind.as_str(),
            log_date,
            subject_ids.len()
        );
        self.reconcile(log_id)
    }

    /// Appends one subject and refreshes the cached copy.
    pub fn add_entry(
        &mut self,
        log_id: RecordId,
        subject_id: RecordId,
    ) -> ReconcileResult<&DailyLog> {
        self.ensure_open(log_id)?;
        self.mutate("add_entry", log_id, |gateway| {
            gateway.add_entry(log_id, subject_id)
        })?;
        self.reconcile(log_id)
    }

    /// Appends many subjects, batched or paced per configuration.
    pub fn add_entries(
        &mut self,
        log_id: RecordId,
        subject_ids: &[RecordId],
    ) -> ReconcileResult<&DailyLog> {
        self.ensure_open(log_id)?;
        self.push_entries(log_id, subject_ids)?;
        self.reconcile(log_id)
    }

    /// Replaces the cached copy of `log_id` with the stored one.
    pub fn reconcile(&mut self, log_id: RecordId) -> ReconcileResult<&DailyLog> {
        let log = self.with_retry("fetch_log", |gateway| gateway.fetch_log(log_id))?;
        if log.uuid != log_id {
            return Err(ReconcileError::UnexpectedLog {
                requested: log_id,
                received: log.uuid,
            });
        }
        self.logs.insert(log_id, log);
        Ok(&self.logs[&log_id])
    }

    /// Replaces every cached log of `kind`; returns how many were fetched.
    pub fn refresh_all(&mut self, kind: DailyLogKind) -> ReconcileResult<usize> {
        let fetched = self.with_retry("fetch_logs", |gateway| gateway.fetch_logs(kind))?;
        self.logs.retain(|_, log| log.kind != kind);
        let count = fetched.len();
        for log in fetched {
            self.logs.insert(log.uuid, log);
        }
        info!(
            "event=daily_log_refresh module=sync status=ok kind={} count={}",
            kind.as_str(),
            count
        );
        Ok(count)
    }

    /// Closes `log_id` and refreshes the cached copy.
    pub fn close(&mut self, log_id: RecordId) -> ReconcileResult<&DailyLog> {
        if self.logs.get(&log_id).is_some_and(|log| !log.is_open()) {
            return Err(ReconcileError::AlreadyClosed(log_id));
        }
        self.mutate("close_log", log_id, |gateway| gateway.close_log(log_id))?;
        self.reconcile(log_id)
    }

    fn ensure_open(&self, log_id: RecordId) -> ReconcileResult<()> {
        match self.logs.get(&log_id) {
            Some(log) if !log.is_open() => Err(ReconcileError::LogClosed(log_id)),
            _ => Ok(()),
        }
    }

    fn push_entries(&mut self, log_id: RecordId, subject_ids: &[RecordId]) -> ReconcileResult<()> {
        if subject_ids.is_empty() {
            return Ok(());
        }
        if self.config.use_batch {
            return self.mutate("add_entries", log_id, |gateway| {
                gateway.add_entries(log_id, subject_ids)
            });
        }

        let delay = self.config.entry_delay();
        for &subject_id in subject_ids {
            self.pause.pause(delay);
            self.mutate("add_entry", log_id, |gateway| {
                gateway.add_entry(log_id, subject_id)
            })?;
        }
        Ok(())
    }

    /// Runs a mutation of `log_id`. When the gateway refuses it for good, the
    /// log is re-read so the cache shows the state that caused the refusal.
    fn mutate<T>(
        &mut self,
        op: &'static str,
        log_id: RecordId,
        call: impl FnMut(&G) -> GatewayResult<T>,
    ) -> ReconcileResult<T> {
        let result = self.with_retry(op, call);
        if let Err(ReconcileError::Gateway { source, .. }) = &result {
            if !source.retryable {
                self.refresh_after_rejection(log_id);
            }
        }
        result
    }

    /// Keeps the health of the rejected call rather than the re-read's.
    fn refresh_after_rejection(&mut self, log_id: RecordId) {
        let health = self.health.clone();
        if let Err(err) = self.reconcile(log_id) {
            warn!(
                "event=daily_log_sync module=sync status=stale op=refresh log_id={} error={}",
                log_id, err
            );
        }
        self.health = health;
    }

    fn with_retry<T>(
        &mut self,
        op: &'static str,
        mut call: impl FnMut(&G) -> GatewayResult<T>,
    ) -> ReconcileResult<T> {
        let mut attempt = 0;
        loop {
            match call(&self.gateway) {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            "event=gateway_call module=sync status=recovered op={} attempts={}",
                            op,
                            attempt + 1
                        );
                    }
                    self.health = SyncHealth::Healthy;
                    return Ok(value);
                }
                Err(err) if err.retryable && attempt < self.config.max_retries => {
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        "event=gateway_call module=sync status=retry op={} attempt={} code={} delay_ms={}",
                        op,
                        attempt + 1,
                        err.code,
                        delay.as_millis()
                    );
                    self.pause.pause(delay);
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        "event=gateway_call module=sync status=error op={} attempts={} code={} retryable={}",
                        op,
                        attempt + 1,
                        err.code,
                        err.retryable
                    );
                    self.health = SyncHealth::Degraded {
                        op,
                        code: err.code.clone(),
                    };
                    return Err(ReconcileError::Gateway {
                        op,
                        attempts: attempt + 1,
                        source: err,
                    });
                }
            }
        }
    }
}
