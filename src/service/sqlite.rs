use std::path::{Path, PathBuf};

use rusqlite::Connection;
use uuid::Uuid;

use super::RecordService;
use crate::config;
use crate::db::{self, DatabaseError};
use crate::models::*;

/// `RecordService` backed by a SQLite database file.
///
/// Each call opens its own connection, so the four synchronization reads
/// can run in parallel on separate blocking threads.
#[derive(Debug, Clone)]
pub struct SqliteRecordService {
    path: PathBuf,
}

impl SqliteRecordService {
    /// Open (creating if needed) the database at `path` and apply migrations.
    /// Missing parent directories are created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DatabaseError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        db::open_database(&path)?;
        tracing::debug!(path = %path.display(), "Record database ready");
        Ok(Self { path })
    }

    /// Open the database at the per-user default location.
    pub fn open_default() -> Result<Self, DatabaseError> {
        Self::open(config::database_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<Connection, DatabaseError> {
        db::connect(&self.path)
    }
}

impl RecordService for SqliteRecordService {
    fn select_patients(&self) -> Result<Vec<Patient>, DatabaseError> {
        db::get_all_patients(&self.conn()?)
    }

    fn select_doctors(&self) -> Result<Vec<Doctor>, DatabaseError> {
        db::get_all_doctors(&self.conn()?)
    }

    fn select_appointments(&self) -> Result<Vec<Appointment>, DatabaseError> {
        db::get_all_appointments(&self.conn()?)
    }

    fn select_bills(&self) -> Result<Vec<Bill>, DatabaseError> {
        db::get_all_bills(&self.conn()?)
    }

    fn patients_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Patient>, DatabaseError> {
        db::get_patients_by_ids(&self.conn()?, ids)
    }

    fn doctors_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Doctor>, DatabaseError> {
        db::get_doctors_by_ids(&self.conn()?, ids)
    }

    fn insert_patient(&self, patient: &NewPatient) -> Result<Uuid, DatabaseError> {
        db::insert_patient(&self.conn()?, patient)
    }

    fn insert_doctor(&self, doctor: &NewDoctor) -> Result<Uuid, DatabaseError> {
        db::insert_doctor(&self.conn()?, doctor)
    }

    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<Uuid, DatabaseError> {
        db::insert_appointment(&self.conn()?, appointment)
    }

    fn insert_bill(&self, bill: &NewBill) -> Result<Uuid, DatabaseError> {
        db::insert_bill(&self.conn()?, bill)
    }

    fn update_appointment_status(
        &self,
        id: &Uuid,
        status: AppointmentStatus,
    ) -> Result<(), DatabaseError> {
        db::update_appointment_status(&self.conn()?, id, &status)
    }

    fn update_bill_status(&self, id: &Uuid, status: BillStatus) -> Result<(), DatabaseError> {
        db::update_bill_status(&self.conn()?, id, &status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        let service = SqliteRecordService::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(service.path(), path.as_path());
        assert!(service.select_patients().unwrap().is_empty());
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic-store").join("data").join("clinic.db");
        let service = SqliteRecordService::open(&path).unwrap();
        assert!(path.exists());
        assert!(service.select_bills().unwrap().is_empty());
    }

    #[test]
    fn writes_are_visible_to_new_connections() {
        let dir = tempfile::tempdir().unwrap();
        let service = SqliteRecordService::open(dir.path().join("clinic.db")).unwrap();
        let id = service
            .insert_patient(&NewPatient {
                name: "Somchai".into(),
                phone: "020 5555 1234".into(),
                email: None,
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                gender: Gender::Male,
                address: None,
                emergency_contact: None,
                medical_history: None,
            })
            .unwrap();

        let reopened = SqliteRecordService::open(service.path()).unwrap();
        let patients = reopened.patients_by_ids(&[id]).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].name, "Somchai");
    }
}
