//! Core domain logic for the distribution CRM.
//! This crate is the single source of truth for business invariants:
//! CCP/RIP checksums, client/provider/catalog records, orders, invoices
//! and the per-day client and order logs.

pub mod ccp;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use ccp::{calculate_rip, ccp_cle, compute_ccp, normalize_ccp, rip_cle, CcpRecord};
pub use config::{load_config, ConfigError, CoreConfig, LoggingConfig, SyncConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::daily_log::{DailyLog, DailyLogEntry, DailyLogKind, DailyLogStatus};
pub use model::{ModelValidationError, RecordId};
pub use repo::{ListQuery, RepoError, RepoResult, SortOrder};
pub use service::client_service::ClientService;
pub use service::daily_log_service::DailyLogService;
pub use service::order_service::{OrderLine, OrderService};
pub use service::{ServiceError, ServiceResult};
pub use sync::gateway::{DailyLogGateway, GatewayError, GatewayResult, LocalGateway};
pub use sync::reconcile::{DailyLogReconciler, Pause, ReconcileError, SyncHealth, ThreadPause};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
