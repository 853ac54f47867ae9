//! The clinic data store.
//!
//! `ClinicStore` caches the four clinic collections as one immutable
//! [`Snapshot`] and is the only path between consumers and the record
//! service. Reads are served from the snapshot. Every successful write is
//! followed by a full synchronization; the cache is never patched locally.
//!
//! Overlapping synchronizations are not ordered against each other unless
//! `StoreConfig::serialize_refreshes` is set: the snapshot reflects whichever
//! synchronization applied its results last.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::db::DatabaseError;
use crate::hydration;
use crate::models::*;
use crate::service::{Collection, RecordService};
use crate::subscription::{Listeners, Subscription};
use crate::validation::Validate;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Query on {collection} timed out after {timeout_ms} ms")]
    Timeout {
        collection: Collection,
        timeout_ms: u64,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Whether a read that failed this way is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Task(_) => true,
            Self::Database(e) => e.is_transient(),
            Self::Validation { .. } => false,
        }
    }
}

/// The most recent failed store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    pub operation: String,
    pub message: String,
    pub at: NaiveDateTime,
}

// ═══════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════

/// An immutable view of all four collections.
///
/// Collections are shared behind `Arc`, so cloning a snapshot is cheap and a
/// collection that did not refresh is carried over by pointer.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Newest first.
    pub patients: Arc<Vec<Patient>>,
    /// Newest first.
    pub doctors: Arc<Vec<Doctor>>,
    /// By appointment date, then time.
    pub appointments: Arc<Vec<Appointment>>,
    /// Newest first.
    pub bills: Arc<Vec<Bill>>,
    /// Collections whose latest fetch failed, with the failure message.
    /// A collection listed here still holds its last good contents.
    pub collection_errors: BTreeMap<Collection, String>,
    /// When a synchronization last refreshed at least one collection.
    pub synced_at: Option<NaiveDateTime>,
}

impl Snapshot {
    pub fn patient(&self, id: &Uuid) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == *id)
    }

    pub fn doctor(&self, id: &Uuid) -> Option<&Doctor> {
        self.doctors.iter().find(|d| d.id == *id)
    }

    pub fn appointment(&self, id: &Uuid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == *id)
    }

    pub fn bill(&self, id: &Uuid) -> Option<&Bill> {
        self.bills.iter().find(|b| b.id == *id)
    }
}

/// Outcome of one synchronization. Failures are reported here rather than
/// returned as an error.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub refreshed: Vec<Collection>,
    pub failed: Vec<(Collection, StoreError)>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_collections(&self) -> Vec<Collection> {
        self.failed.iter().map(|(c, _)| *c).collect()
    }
}

/// Keeps the loading counter raised while a synchronization is in flight,
/// including when its future is dropped early.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════
// ClinicStore
// ═══════════════════════════════════════════════════════════

pub struct ClinicStore<S: RecordService> {
    service: Arc<S>,
    config: StoreConfig,
    snapshot: RwLock<Arc<Snapshot>>,
    in_flight: AtomicUsize,
    last_error: Mutex<Option<OperationFailure>>,
    listeners: Listeners,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl<S: RecordService> ClinicStore<S> {
    /// Build the store and run the initial synchronization.
    pub async fn open(service: Arc<S>, config: StoreConfig) -> Self {
        let store = Self {
            service,
            config,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            in_flight: AtomicUsize::new(0),
            last_error: Mutex::new(None),
            listeners: Listeners::default(),
            refresh_gate: tokio::sync::Mutex::new(()),
        };

        let report = store.synchronize().await;
        tracing::info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Clinic store opened"
        );
        store
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ── Read path ───────────────────────────────────────────

    /// The current snapshot. Never observes a partially applied refresh.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn patients(&self) -> Arc<Vec<Patient>> {
        Arc::clone(&self.snapshot().patients)
    }

    pub fn doctors(&self) -> Arc<Vec<Doctor>> {
        Arc::clone(&self.snapshot().doctors)
    }

    pub fn appointments(&self) -> Arc<Vec<Appointment>> {
        Arc::clone(&self.snapshot().appointments)
    }

    pub fn bills(&self) -> Arc<Vec<Bill>> {
        Arc::clone(&self.snapshot().bills)
    }

    /// True while any synchronization has queries outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_error(&self) -> Option<OperationFailure> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Message of the latest failed fetch for `collection`, if it has not
    /// since refreshed.
    pub fn collection_error(&self, collection: Collection) -> Option<String> {
        self.snapshot().collection_errors.get(&collection).cloned()
    }

    /// Register a listener called with each snapshot a synchronization
    /// produces.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    // ── Synchronization ─────────────────────────────────────

    /// Re-fetch all four collections and replace each one that succeeded.
    ///
    /// A collection whose query fails keeps its previous contents; the
    /// failure is logged, flagged on the snapshot and returned in the report.
    pub async fn synchronize(&self) -> SyncReport {
        let _serial = if self.config.serialize_refreshes {
            Some(self.refresh_gate.lock().await)
        } else {
            None
        };
        let loading = LoadingGuard::new(&self.in_flight);

        let (patients, doctors, appointments, bills) = tokio::join!(
            self.fetch(Collection::Patients, S::select_patients),
            self.fetch(Collection::Doctors, S::select_doctors),
            self.fetch(Collection::Appointments, hydration::load_appointments::<S>),
            self.fetch(Collection::Bills, hydration::load_bills::<S>),
        );

        let mut report = SyncReport::default();
        let snapshot = {
            let mut guard = self
                .snapshot
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut next = Snapshot::clone(&guard);

            settle(&mut next.patients, Collection::Patients, patients, &mut next.collection_errors, &mut report);
            settle(&mut next.doctors, Collection::Doctors, doctors, &mut next.collection_errors, &mut report);
            settle(&mut next.appointments, Collection::Appointments, appointments, &mut next.collection_errors, &mut report);
            settle(&mut next.bills, Collection::Bills, bills, &mut next.collection_errors, &mut report);

            if !report.refreshed.is_empty() {
                next.synced_at = Some(Utc::now().naive_utc());
            }
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };
        drop(loading);

        for (collection, e) in &report.failed {
            tracing::warn!(%collection, error = %e, "Collection fetch failed, keeping cached rows");
            self.record_failure(format!("synchronize {collection}"), e);
        }

        if report.refreshed.is_empty() {
            tracing::warn!("Synchronization refreshed no collections");
        } else {
            tracing::debug!(
                patients = snapshot.patients.len(),
                doctors = snapshot.doctors.len(),
                appointments = snapshot.appointments.len(),
                bills = snapshot.bills.len(),
                "Synchronized"
            );
            self.listeners.notify(&snapshot);
        }

        report
    }

    /// Run one read on the blocking pool, retrying transient failures.
    async fn fetch<T>(
        &self,
        collection: Collection,
        query: fn(&S) -> Result<T, DatabaseError>,
    ) -> Result<T, StoreError>
    where
        T: Send + 'static,
    {
        let mut delay = self.config.retry_backoff();
        let mut attempt = 0;

        loop {
            match self.fetch_once(collection, query).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_retryable() && attempt < self.config.fetch_retries => {
                    attempt += 1;
                    tracing::warn!(
                        %collection,
                        attempt,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once<T>(
        &self,
        collection: Collection,
        query: fn(&S) -> Result<T, DatabaseError>,
    ) -> Result<T, StoreError>
    where
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let task = tokio::task::spawn_blocking(move || query(service.as_ref()));

        match tokio::time::timeout(self.config.fetch_timeout(), task).await {
            Ok(Ok(result)) => result.map_err(StoreError::from),
            Ok(Err(join_error)) => Err(StoreError::Task(join_error.to_string())),
            Err(_) => Err(StoreError::Timeout {
                collection,
                timeout_ms: self.config.fetch_timeout_ms,
            }),
        }
    }

    // ── Mutations ───────────────────────────────────────────

    /// Insert a patient, then refresh. The new row is visible in
    /// `patients()` when this returns `Ok`.
    pub async fn add_patient(&self, mut patient: NewPatient) -> Result<(), StoreError> {
        self.check("add_patient", &mut patient)?;
        let id = self
            .write("add_patient", move |s| s.insert_patient(&patient))
            .await?;
        tracing::info!(%id, "Patient added");
        Ok(())
    }

    pub async fn add_doctor(&self, mut doctor: NewDoctor) -> Result<(), StoreError> {
        self.check("add_doctor", &mut doctor)?;
        let id = self
            .write("add_doctor", move |s| s.insert_doctor(&doctor))
            .await?;
        tracing::info!(%id, "Doctor added");
        Ok(())
    }

    pub async fn add_appointment(&self, mut appointment: NewAppointment) -> Result<(), StoreError> {
        self.check("add_appointment", &mut appointment)?;
        let id = self
            .write("add_appointment", move |s| s.insert_appointment(&appointment))
            .await?;
        tracing::info!(%id, "Appointment added");
        Ok(())
    }

    pub async fn add_bill(&self, mut bill: NewBill) -> Result<(), StoreError> {
        self.check("add_bill", &mut bill)?;
        let id = self.write("add_bill", move |s| s.insert_bill(&bill)).await?;
        tracing::info!(%id, "Bill added");
        Ok(())
    }

    /// Set an appointment's status. `status` must be one of `scheduled`,
    /// `completed`, `cancelled`, `no-show`.
    pub async fn update_appointment_status(&self, id: Uuid, status: &str) -> Result<(), StoreError> {
        let status: AppointmentStatus = status
            .parse()
            .map_err(|e: DatabaseError| self.reject("update_appointment_status", e.into()))?;
        self.write("update_appointment_status", move |s| {
            s.update_appointment_status(&id, status)
        })
        .await?;
        tracing::info!(%id, status = status.as_str(), "Appointment status set");
        Ok(())
    }

    /// Set a bill's status. `status` must be one of `pending`, `paid`, `overdue`.
    pub async fn update_bill_status(&self, id: Uuid, status: &str) -> Result<(), StoreError> {
        let status: BillStatus = status
            .parse()
            .map_err(|e: DatabaseError| self.reject("update_bill_status", e.into()))?;
        self.write("update_bill_status", move |s| s.update_bill_status(&id, status))
            .await?;
        tracing::info!(%id, status = status.as_str(), "Bill status set");
        Ok(())
    }

    fn check(&self, operation: &str, payload: &mut impl Validate) -> Result<(), StoreError> {
        payload.normalize();
        payload.validate().map_err(|e| self.reject(operation, e))
    }

    /// Forward one write to the record service. On success, synchronize
    /// before returning; on failure, leave the cache alone.
    async fn write<T, F>(&self, operation: &str, write: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, DatabaseError> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let outcome = match tokio::task::spawn_blocking(move || write(service.as_ref())).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(join_error) => Err(StoreError::Task(join_error.to_string())),
        };

        match outcome {
            Ok(value) => {
                self.synchronize().await;
                Ok(value)
            }
            Err(e) => Err(self.reject(operation, e)),
        }
    }

    fn reject(&self, operation: &str, e: StoreError) -> StoreError {
        tracing::warn!(operation, error = %e, "Write rejected");
        self.record_failure(operation.to_string(), &e);
        e
    }

    fn record_failure(&self, operation: String, e: &StoreError) {
        let mut slot = self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(OperationFailure {
            operation,
            message: e.to_string(),
            at: Utc::now().naive_utc(),
        });
    }
}

/// Apply one collection's fetch outcome to the snapshot being built.
fn settle<T>(
    slot: &mut Arc<Vec<T>>,
    collection: Collection,
    result: Result<Vec<T>, StoreError>,
    errors: &mut BTreeMap<Collection, String>,
    report: &mut SyncReport,
) {
    match result {
        Ok(rows) => {
            *slot = Arc::new(rows);
            errors.remove(&collection);
            report.refreshed.push(collection);
        }
        Err(e) => {
            errors.insert(collection, e.to_string());
            report.failed.push((collection, e));
        }
    }
}
