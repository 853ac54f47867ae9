use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{map_write_error, parse_date, parse_time, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

struct AppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    appointment_date: String,
    appointment_time: String,
    status: String,
    notes: Option<String>,
    created_at: String,
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid("appointments.id", &row.id)?,
        patient_id: parse_uuid("appointments.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("appointments.doctor_id", &row.doctor_id)?,
        appointment_date: parse_date("appointments.appointment_date", &row.appointment_date)?,
        appointment_time: parse_time("appointments.appointment_time", &row.appointment_time)?,
        status: row.status.parse()?,
        notes: row.notes,
        created_at: parse_timestamp("appointments.created_at", &row.created_at)?,
        patient: None,
        doctor: None,
    })
}

pub fn insert_appointment(
    conn: &Connection,
    appointment: &NewAppointment,
) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, appointment_date, appointment_time,
         status, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            appointment.patient_id.to_string(),
            appointment.doctor_id.to_string(),
            appointment.appointment_date.to_string(),
            appointment.appointment_time.format("%H:%M:%S").to_string(),
            appointment.status.as_str(),
            appointment.notes,
        ],
    )
    .map_err(map_write_error)?;
    Ok(id)
}

/// Base appointment rows by date then time. Derived fields are left empty.
pub fn get_all_appointments(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, appointment_date, appointment_time, status, notes,
         created_at
         FROM appointments ORDER BY appointment_date ASC, appointment_time ASC, rowid ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(AppointmentRow {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            doctor_id: row.get(2)?,
            appointment_date: row.get(3)?,
            appointment_time: row.get(4)?,
            status: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;

    rows.map(|r| appointment_from_row(r?)).collect()
}

/// Unconditional status set. Errors with `NotFound` when no row has this id.
pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: &AppointmentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE appointments SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )
        .map_err(map_write_error)?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
