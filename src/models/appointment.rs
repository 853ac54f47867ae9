use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::doctor::Doctor;
use super::enums::AppointmentStatus;
use super::patient::Patient;

/// An appointment as read from the record service.
///
/// `patient` and `doctor` are filled in by hydration from `patient_id` and
/// `doctor_id`. They are `None` when the referenced row could not be found
/// and are never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<Doctor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn into_appointment(self, id: Uuid, created_at: NaiveDateTime) -> Appointment {
        Appointment {
            id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            appointment_date: self.appointment_date,
            appointment_time: self.appointment_time,
            status: self.status,
            notes: self.notes,
            created_at,
            patient: None,
            doctor: None,
        }
    }
}
