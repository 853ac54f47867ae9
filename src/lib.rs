//! Clinic data store: cached, hydrated patient/doctor/appointment/bill
//! collections over a pluggable record service.

pub mod config;
pub mod db;
pub mod hydration;
pub mod models;
pub mod reports;
pub mod service;
pub mod store;
pub mod subscription;
pub mod validation;

pub use service::{Collection, MemoryRecordService, RecordService, SqliteRecordService};
pub use store::{ClinicStore, OperationFailure, Snapshot, StoreError, SyncReport};
pub use subscription::Subscription;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default filter. Calling this more than once is a no-op.
pub fn init_tracing() {
    let initialized = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if initialized {
        tracing::info!("{} v{} logging initialised", config::APP_NAME, config::APP_VERSION);
    }
}
