use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::{map_write_error, parse_date, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, name, phone, email, date_of_birth, gender, address,
     emergency_contact, medical_history, created_at";

struct PatientRow {
    id: String,
    name: String,
    phone: String,
    email: Option<String>,
    date_of_birth: String,
    gender: String,
    address: Option<String>,
    emergency_contact: Option<String>,
    medical_history: Option<String>,
    created_at: String,
}

fn read_patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        date_of_birth: row.get(4)?,
        gender: row.get(5)?,
        address: row.get(6)?,
        emergency_contact: row.get(7)?,
        medical_history: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid("patients.id", &row.id)?,
        name: row.name,
        phone: row.phone,
        email: row.email,
        date_of_birth: parse_date("patients.date_of_birth", &row.date_of_birth)?,
        gender: row.gender.parse()?,
        address: row.address,
        emergency_contact: row.emergency_contact,
        medical_history: row.medical_history,
        created_at: parse_timestamp("patients.created_at", &row.created_at)?,
    })
}

pub fn insert_patient(conn: &Connection, patient: &NewPatient) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO patients (id, name, phone, email, date_of_birth, gender, address,
         emergency_contact, medical_history)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id.to_string(),
            patient.name,
            patient.phone,
            patient.email,
            patient.date_of_birth.to_string(),
            patient.gender.as_str(),
            patient.address,
            patient.emergency_contact,
            patient.medical_history,
        ],
    )
    .map_err(map_write_error)?;
    Ok(id)
}

/// All patients, newest first.
pub fn get_all_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], read_patient_row)?;

    rows.map(|r| patient_from_row(r?)).collect()
}

/// Patients whose id is in `ids`, in no particular order. Unknown ids are skipped.
pub fn get_patients_by_ids(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Patient>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id IN ({placeholders})"
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter().map(|id| id.to_string())), read_patient_row)?;

    rows.map(|r| patient_from_row(r?)).collect()
}
