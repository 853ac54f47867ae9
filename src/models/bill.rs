use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BillStatus;
use super::patient::Patient;

/// A bill as read from the record service. `patient` is a read-time join
/// on `patient_id`, absent when the patient cannot be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub amount: f64,
    pub description: String,
    pub status: BillStatus,
    pub due_date: NaiveDate,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBill {
    pub patient_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    pub amount: f64,
    pub description: String,
    pub status: BillStatus,
    pub due_date: NaiveDate,
}

impl NewBill {
    pub fn into_bill(self, id: Uuid, created_at: NaiveDateTime) -> Bill {
        Bill {
            id,
            patient_id: self.patient_id,
            appointment_id: self.appointment_id,
            amount: self.amount,
            description: self.description,
            status: self.status,
            due_date: self.due_date,
            created_at,
            patient: None,
        }
    }
}
