use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{map_write_error, parse_date, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

struct BillRow {
    id: String,
    patient_id: String,
    appointment_id: Option<String>,
    amount: f64,
    description: String,
    status: String,
    due_date: String,
    created_at: String,
}

fn bill_from_row(row: BillRow) -> Result<Bill, DatabaseError> {
    Ok(Bill {
        id: parse_uuid("bills.id", &row.id)?,
        patient_id: parse_uuid("bills.patient_id", &row.patient_id)?,
        appointment_id: row
            .appointment_id
            .as_deref()
            .map(|id| parse_uuid("bills.appointment_id", id))
            .transpose()?,
        amount: row.amount,
        description: row.description,
        status: row.status.parse()?,
        due_date: parse_date("bills.due_date", &row.due_date)?,
        created_at: parse_timestamp("bills.created_at", &row.created_at)?,
        patient: None,
    })
}

pub fn insert_bill(conn: &Connection, bill: &NewBill) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO bills (id, patient_id, appointment_id, amount, description, status, due_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            bill.patient_id.to_string(),
            bill.appointment_id.map(|id| id.to_string()),
            bill.amount,
            bill.description,
            bill.status.as_str(),
            bill.due_date.to_string(),
        ],
    )
    .map_err(map_write_error)?;
    Ok(id)
}

/// Base bill rows, newest first. Derived patient is left empty.
pub fn get_all_bills(conn: &Connection) -> Result<Vec<Bill>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, appointment_id, amount, description, status, due_date, created_at
         FROM bills ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(BillRow {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            appointment_id: row.get(2)?,
            amount: row.get(3)?,
            description: row.get(4)?,
            status: row.get(5)?,
            due_date: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;

    rows.map(|r| bill_from_row(r?)).collect()
}

/// Unconditional status set. Errors with `NotFound` when no row has this id.
pub fn update_bill_status(
    conn: &Connection,
    id: &Uuid,
    status: &BillStatus,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE bills SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )
        .map_err(map_write_error)?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Bill".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
