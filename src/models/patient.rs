use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Insert payload. Identifier and creation time are assigned by the record service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
}

impl NewPatient {
    pub fn into_patient(self, id: Uuid, created_at: NaiveDateTime) -> Patient {
        Patient {
            id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address,
            emergency_contact: self.emergency_contact,
            medical_history: self.medical_history,
            created_at,
        }
    }
}
