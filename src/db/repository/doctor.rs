use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::{map_write_error, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const DOCTOR_COLUMNS: &str =
    "id, name, specialization, phone, email, license_number, schedule, created_at";

struct DoctorRow {
    id: String,
    name: String,
    specialization: String,
    phone: String,
    email: Option<String>,
    license_number: String,
    schedule: Option<String>,
    created_at: String,
}

fn read_doctor_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DoctorRow> {
    Ok(DoctorRow {
        id: row.get(0)?,
        name: row.get(1)?,
        specialization: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        license_number: row.get(5)?,
        schedule: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn doctor_from_row(row: DoctorRow) -> Result<Doctor, DatabaseError> {
    Ok(Doctor {
        id: parse_uuid("doctors.id", &row.id)?,
        name: row.name,
        specialization: row.specialization,
        phone: row.phone,
        email: row.email,
        license_number: row.license_number,
        schedule: row.schedule,
        created_at: parse_timestamp("doctors.created_at", &row.created_at)?,
    })
}

pub fn insert_doctor(conn: &Connection, doctor: &NewDoctor) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO doctors (id, name, specialization, phone, email, license_number, schedule)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            doctor.name,
            doctor.specialization,
            doctor.phone,
            doctor.email,
            doctor.license_number,
            doctor.schedule,
        ],
    )
    .map_err(map_write_error)?;
    Ok(id)
}

/// All doctors, newest first.
pub fn get_all_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([], read_doctor_row)?;

    rows.map(|r| doctor_from_row(r?)).collect()
}

pub fn get_doctors_by_ids(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Doctor>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id IN ({placeholders})"
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter().map(|id| id.to_string())), read_doctor_row)?;

    rows.map(|r| doctor_from_row(r?)).collect()
}
