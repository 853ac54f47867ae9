use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub phone: String,
    pub email: Option<String>,
    pub license_number: String,
    pub schedule: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialization: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub license_number: String,
    #[serde(default)]
    pub schedule: Option<String>,
}

impl NewDoctor {
    pub fn into_doctor(self, id: Uuid, created_at: NaiveDateTime) -> Doctor {
        Doctor {
            id,
            name: self.name,
            specialization: self.specialization,
            phone: self.phone,
            email: self.email,
            license_number: self.license_number,
            schedule: self.schedule,
            created_at,
        }
    }
}
