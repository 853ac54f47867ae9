//! The persistent record service seam.
//!
//! `RecordService` is the only way the store reaches persisted data. Methods
//! are synchronous; the store runs them on the blocking pool.

mod memory;
mod sqlite;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

pub use memory::MemoryRecordService;
pub use sqlite::SqliteRecordService;

/// One of the four cached collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Patients,
    Doctors,
    Appointments,
    Bills,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Patients,
        Collection::Doctors,
        Collection::Appointments,
        Collection::Bills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patients => "patients",
            Self::Doctors => "doctors",
            Self::Appointments => "appointments",
            Self::Bills => "bills",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level access to the four clinic tables.
///
/// Selects return base rows only: `Appointment::patient`, `Appointment::doctor`
/// and `Bill::patient` are `None`. The store performs the join through
/// `patients_by_ids` / `doctors_by_ids`.
pub trait RecordService: Send + Sync + 'static {
    /// All patients, newest first.
    fn select_patients(&self) -> Result<Vec<Patient>, DatabaseError>;

    /// All doctors, newest first.
    fn select_doctors(&self) -> Result<Vec<Doctor>, DatabaseError>;

    /// All appointments by appointment date ascending (time as tiebreak).
    fn select_appointments(&self) -> Result<Vec<Appointment>, DatabaseError>;

    /// All bills, newest first.
    fn select_bills(&self) -> Result<Vec<Bill>, DatabaseError>;

    /// Patients matching any of `ids`. Unknown ids are skipped, not errors.
    fn patients_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Patient>, DatabaseError>;

    /// Doctors matching any of `ids`. Unknown ids are skipped, not errors.
    fn doctors_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Doctor>, DatabaseError>;

    fn insert_patient(&self, patient: &NewPatient) -> Result<Uuid, DatabaseError>;
    fn insert_doctor(&self, doctor: &NewDoctor) -> Result<Uuid, DatabaseError>;
    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<Uuid, DatabaseError>;
    fn insert_bill(&self, bill: &NewBill) -> Result<Uuid, DatabaseError>;

    /// Set the status column of one appointment. `NotFound` if no row matches.
    fn update_appointment_status(
        &self,
        id: &Uuid,
        status: AppointmentStatus,
    ) -> Result<(), DatabaseError>;

    /// Set the status column of one bill. `NotFound` if no row matches.
    fn update_bill_status(&self, id: &Uuid, status: BillStatus) -> Result<(), DatabaseError>;
}
