use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use super::{Collection, RecordService};
use crate::db::DatabaseError;
use crate::models::*;

#[derive(Default)]
struct Tables {
    patients: Vec<Patient>,
    doctors: Vec<Doctor>,
    appointments: Vec<Appointment>,
    bills: Vec<Bill>,
}

/// Remaining injected failures for one collection's select.
#[derive(Debug, Clone, Copy)]
enum Fault {
    Times(u32),
    Always,
}

/// In-process `RecordService`.
///
/// Mirrors the SQLite schema's rules (required text, non-negative amounts,
/// references must exist at insert time) and adds hooks to fail or slow
/// down individual collection reads and to remove rows behind the store's
/// back.
#[derive(Default)]
pub struct MemoryRecordService {
    tables: Mutex<Tables>,
    faults: Mutex<HashMap<Collection, Fault>>,
    delays: Mutex<HashMap<Collection, Duration>>,
    select_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MemoryRecordService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every select on `collection` fail until `recover` is called.
    pub fn fail_collection(&self, collection: Collection) {
        lock(&self.faults).insert(collection, Fault::Always);
    }

    /// Make the next `times` selects on `collection` fail.
    pub fn fail_times(&self, collection: Collection, times: u32) {
        lock(&self.faults).insert(collection, Fault::Times(times));
    }

    pub fn recover(&self, collection: Collection) {
        lock(&self.faults).remove(&collection);
    }

    /// Block every select on `collection` for `delay`.
    pub fn set_delay(&self, collection: Collection, delay: Duration) {
        lock(&self.delays).insert(collection, delay);
    }

    /// Number of `select_*` calls served (or failed) so far.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of insert/update calls received so far.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Delete a patient without touching rows that reference it.
    pub fn remove_patient(&self, id: &Uuid) -> bool {
        let mut tables = lock(&self.tables);
        let before = tables.patients.len();
        tables.patients.retain(|p| p.id != *id);
        tables.patients.len() != before
    }

    /// Delete a doctor without touching rows that reference it.
    pub fn remove_doctor(&self, id: &Uuid) -> bool {
        let mut tables = lock(&self.tables);
        let before = tables.doctors.len();
        tables.doctors.retain(|d| d.id != *id);
        tables.doctors.len() != before
    }

    fn begin_select(&self, collection: Collection) -> Result<(), DatabaseError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);

        let delay = lock(&self.delays).get(&collection).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut faults = lock(&self.faults);
        match faults.get(&collection).copied() {
            None => Ok(()),
            Some(Fault::Always) => Err(unavailable(collection)),
            Some(Fault::Times(n)) => {
                if n <= 1 {
                    faults.remove(&collection);
                } else {
                    faults.insert(collection, Fault::Times(n - 1));
                }
                Err(unavailable(collection))
            }
        }
    }

    fn begin_write(&self) {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge the service for the others.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unavailable(collection: Collection) -> DatabaseError {
    DatabaseError::Unavailable(format!("{collection} query failed"))
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn require_text(table: &str, column: &str, value: &str) -> Result<(), DatabaseError> {
    if value.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "CHECK constraint failed: {table}.{column}"
        )));
    }
    Ok(())
}

fn missing_reference(table: &str, column: &str) -> DatabaseError {
    DatabaseError::ConstraintViolation(format!("FOREIGN KEY constraint failed: {table}.{column}"))
}

/// Newest first; rows created in the same instant keep reverse insertion order.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> NaiveDateTime) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

impl RecordService for MemoryRecordService {
    fn select_patients(&self) -> Result<Vec<Patient>, DatabaseError> {
        self.begin_select(Collection::Patients)?;
        Ok(newest_first(&lock(&self.tables).patients, |p| p.created_at))
    }

    fn select_doctors(&self) -> Result<Vec<Doctor>, DatabaseError> {
        self.begin_select(Collection::Doctors)?;
        Ok(newest_first(&lock(&self.tables).doctors, |d| d.created_at))
    }

    fn select_appointments(&self) -> Result<Vec<Appointment>, DatabaseError> {
        self.begin_select(Collection::Appointments)?;
        let mut rows = lock(&self.tables).appointments.clone();
        rows.sort_by_key(|a| (a.appointment_date, a.appointment_time));
        Ok(rows)
    }

    fn select_bills(&self) -> Result<Vec<Bill>, DatabaseError> {
        self.begin_select(Collection::Bills)?;
        Ok(newest_first(&lock(&self.tables).bills, |b| b.created_at))
    }

    fn patients_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Patient>, DatabaseError> {
        let tables = lock(&self.tables);
        Ok(tables
            .patients
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    fn doctors_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Doctor>, DatabaseError> {
        let tables = lock(&self.tables);
        Ok(tables
            .doctors
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    fn insert_patient(&self, patient: &NewPatient) -> Result<Uuid, DatabaseError> {
        self.begin_write();
        require_text("patients", "name", &patient.name)?;
        require_text("patients", "phone", &patient.phone)?;

        let id = Uuid::new_v4();
        lock(&self.tables)
            .patients
            .push(patient.clone().into_patient(id, now()));
        Ok(id)
    }

    fn insert_doctor(&self, doctor: &NewDoctor) -> Result<Uuid, DatabaseError> {
        self.begin_write();
        require_text("doctors", "name", &doctor.name)?;
        require_text("doctors", "specialization", &doctor.specialization)?;
        require_text("doctors", "phone", &doctor.phone)?;
        require_text("doctors", "license_number", &doctor.license_number)?;

        let id = Uuid::new_v4();
        lock(&self.tables)
            .doctors
            .push(doctor.clone().into_doctor(id, now()));
        Ok(id)
    }

    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<Uuid, DatabaseError> {
        self.begin_write();
        let mut tables = lock(&self.tables);
        if !tables.patients.iter().any(|p| p.id == appointment.patient_id) {
            return Err(missing_reference("appointments", "patient_id"));
        }
        if !tables.doctors.iter().any(|d| d.id == appointment.doctor_id) {
            return Err(missing_reference("appointments", "doctor_id"));
        }

        let id = Uuid::new_v4();
        tables
            .appointments
            .push(appointment.clone().into_appointment(id, now()));
        Ok(id)
    }

    fn insert_bill(&self, bill: &NewBill) -> Result<Uuid, DatabaseError> {
        self.begin_write();
        require_text("bills", "description", &bill.description)?;
        if bill.amount.is_nan() || bill.amount < 0.0 {
            return Err(DatabaseError::ConstraintViolation(
                "CHECK constraint failed: bills.amount".into(),
            ));
        }

        let mut tables = lock(&self.tables);
        if !tables.patients.iter().any(|p| p.id == bill.patient_id) {
            return Err(missing_reference("bills", "patient_id"));
        }
        if let Some(appointment_id) = bill.appointment_id {
            if !tables.appointments.iter().any(|a| a.id == appointment_id) {
                return Err(missing_reference("bills", "appointment_id"));
            }
        }

        let id = Uuid::new_v4();
        tables.bills.push(bill.clone().into_bill(id, now()));
        Ok(id)
    }

    fn update_appointment_status(
        &self,
        id: &Uuid,
        status: AppointmentStatus,
    ) -> Result<(), DatabaseError> {
        self.begin_write();
        let mut tables = lock(&self.tables);
        let row = tables
            .appointments
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity_type: "Appointment".into(),
                id: id.to_string(),
            })?;
        row.status = status;
        Ok(())
    }

    fn update_bill_status(&self, id: &Uuid, status: BillStatus) -> Result<(), DatabaseError> {
        self.begin_write();
        let mut tables = lock(&self.tables);
        let row = tables
            .bills
            .iter_mut()
            .find(|b| b.id == *id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity_type: "Bill".into(),
                id: id.to_string(),
            })?;
        row.status = status;
        Ok(())
    }
}
