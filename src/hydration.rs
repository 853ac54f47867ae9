//! Read-time relational join.
//!
//! Base rows are fetched first, then the referenced patients and doctors are
//! looked up by identifier set and attached through a hash join. A reference
//! that does not resolve leaves the derived field `None`.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;
use crate::service::RecordService;

/// Distinct identifiers in a stable order.
fn distinct_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

fn index_by_id<T>(rows: Vec<T>, id: impl Fn(&T) -> Uuid) -> HashMap<Uuid, T> {
    rows.into_iter().map(|row| (id(&row), row)).collect()
}

/// Attach patient and doctor records to each appointment.
///
/// Derived fields are always recomputed, so anything a service may have
/// pre-filled is replaced by what `patients`/`doctors` say.
pub fn hydrate_appointments(
    appointments: Vec<Appointment>,
    patients: Vec<Patient>,
    doctors: Vec<Doctor>,
) -> Vec<Appointment> {
    let patients = index_by_id(patients, |p| p.id);
    let doctors = index_by_id(doctors, |d| d.id);

    appointments
        .into_iter()
        .map(|mut appointment| {
            appointment.patient = patients.get(&appointment.patient_id).cloned();
            appointment.doctor = doctors.get(&appointment.doctor_id).cloned();
            appointment
        })
        .collect()
}

/// Attach the patient record to each bill.
pub fn hydrate_bills(bills: Vec<Bill>, patients: Vec<Patient>) -> Vec<Bill> {
    let patients = index_by_id(patients, |p| p.id);

    bills
        .into_iter()
        .map(|mut bill| {
            bill.patient = patients.get(&bill.patient_id).cloned();
            bill
        })
        .collect()
}

/// Appointments by date, each joined with its patient and doctor.
pub fn load_appointments<S: RecordService + ?Sized>(
    service: &S,
) -> Result<Vec<Appointment>, DatabaseError> {
    let appointments = service.select_appointments()?;
    let patients = service.patients_by_ids(&distinct_ids(
        appointments.iter().map(|a| a.patient_id),
    ))?;
    let doctors = service.doctors_by_ids(&distinct_ids(
        appointments.iter().map(|a| a.doctor_id),
    ))?;
    Ok(hydrate_appointments(appointments, patients, doctors))
}

/// Bills, newest first, each joined with its patient.
pub fn load_bills<S: RecordService + ?Sized>(service: &S) -> Result<Vec<Bill>, DatabaseError> {
    let bills = service.select_bills()?;
    let patients = service.patients_by_ids(&distinct_ids(bills.iter().map(|b| b.patient_id)))?;
    Ok(hydrate_bills(bills, patients))
}
