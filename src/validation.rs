//! Local checks on insert payloads, run before the record service is touched.
//!
//! Closed enums are enforced by the payload types themselves; these checks
//! cover what the type system cannot: blank required text and amounts.
//! Blank optional text is normalized to absent rather than rejected.

use crate::models::*;
use crate::store::StoreError;

pub trait Validate {
    /// Rewrite the payload into its stored form before it is checked.
    fn normalize(&mut self) {}

    fn validate(&self) -> Result<(), StoreError>;
}

fn required(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation {
            field,
            reason: "is required".into(),
        });
    }
    Ok(())
}

/// An empty form field arrives as `Some("")`; store it as `None`.
fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}

impl Validate for NewPatient {
    fn normalize(&mut self) {
        blank_to_none(&mut self.email);
        blank_to_none(&mut self.address);
        blank_to_none(&mut self.emergency_contact);
        blank_to_none(&mut self.medical_history);
    }

    fn validate(&self) -> Result<(), StoreError> {
        required("name", &self.name)?;
        required("phone", &self.phone)?;
        Ok(())
    }
}

impl Validate for NewDoctor {
    fn normalize(&mut self) {
        blank_to_none(&mut self.email);
        blank_to_none(&mut self.schedule);
    }

    fn validate(&self) -> Result<(), StoreError> {
        required("name", &self.name)?;
        required("specialization", &self.specialization)?;
        required("phone", &self.phone)?;
        required("license_number", &self.license_number)?;
        Ok(())
    }
}

impl Validate for NewAppointment {
    fn normalize(&mut self) {
        blank_to_none(&mut self.notes);
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.patient_id.is_nil() {
            return Err(StoreError::Validation {
                field: "patient_id",
                reason: "is required".into(),
            });
        }
        if self.doctor_id.is_nil() {
            return Err(StoreError::Validation {
                field: "doctor_id",
                reason: "is required".into(),
            });
        }
        Ok(())
    }
}

impl Validate for NewBill {
    fn validate(&self) -> Result<(), StoreError> {
        if self.patient_id.is_nil() {
            return Err(StoreError::Validation {
                field: "patient_id",
                reason: "is required".into(),
            });
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(StoreError::Validation {
                field: "amount",
                reason: format!("must be a non-negative number, got {}", self.amount),
            });
        }
        required("description", &self.description)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn doctor() -> NewDoctor {
        NewDoctor {
            name: "Vong".into(),
            specialization: "Pediatrics".into(),
            phone: "021 000 111".into(),
            email: None,
            license_number: "LA-77".into(),
            schedule: None,
        }
    }

    fn bill(amount: f64) -> NewBill {
        NewBill {
            patient_id: Uuid::new_v4(),
            appointment_id: None,
            amount,
            description: "X-ray".into(),
            status: BillStatus::Pending,
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[test]
    fn complete_doctor_passes() {
        assert!(doctor().validate().is_ok());
    }

    #[test]
    fn blank_license_number_is_rejected() {
        let mut d = doctor();
        d.license_number = "".into();
        match d.validate() {
            Err(StoreError::Validation { field, .. }) => assert_eq!(field, "license_number"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn blank_optional_text_becomes_absent() {
        let mut d = doctor();
        d.email = Some(" ".into());
        d.schedule = Some("Mon-Fri 08:00-12:00".into());
        d.normalize();
        assert_eq!(d.email, None);
        assert_eq!(d.schedule.as_deref(), Some("Mon-Fri 08:00-12:00"));
        assert!(d.validate().is_ok());
    }

    #[test]
    fn bill_amount_bounds() {
        assert!(bill(0.0).validate().is_ok());
        assert!(bill(120.5).validate().is_ok());
        assert!(bill(-0.01).validate().is_err());
        assert!(bill(f64::NAN).validate().is_err());
        assert!(bill(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn nil_references_are_rejected() {
        let mut b = bill(1.0);
        b.patient_id = Uuid::nil();
        assert!(b.validate().is_err());
    }

    #[test]
    fn unknown_gender_fails_at_deserialization() {
        let json = r#"{"name":"Somchai","phone":"020","date_of_birth":"1990-01-01","gender":"robot"}"#;
        assert!(serde_json::from_str::<NewPatient>(json).is_err());

        let json = r#"{"name":"Somchai","phone":"020","date_of_birth":"1990-01-01","gender":"male"}"#;
        let patient: NewPatient = serde_json::from_str(json).unwrap();
        assert!(patient.validate().is_ok());
    }
}
