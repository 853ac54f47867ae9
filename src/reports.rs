//! Read-only projections over a [`Snapshot`] for dashboard, billing and
//! report views. Nothing here touches the record service.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::*;
use crate::store::Snapshot;

pub const UNKNOWN_PATIENT: &str = "Unknown Patient";
pub const UNKNOWN_DOCTOR: &str = "Unknown Doctor";

/// Name of a hydrated patient, or a placeholder when the join found nothing.
pub fn patient_name(patient: Option<&Patient>) -> &str {
    patient.map(|p| p.name.as_str()).unwrap_or(UNKNOWN_PATIENT)
}

pub fn doctor_name(doctor: Option<&Doctor>) -> &str {
    doctor.map(|d| d.name.as_str()).unwrap_or(UNKNOWN_DOCTOR)
}

/// Case-insensitive match on name or email; plain substring match on phone.
/// An empty term matches everyone.
pub fn search_patients<'a>(snapshot: &'a Snapshot, term: &str) -> Vec<&'a Patient> {
    let needle = term.trim().to_lowercase();
    snapshot
        .patients
        .iter()
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.phone.contains(term.trim())
                || p
                    .email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Appointments on `date`, earliest first.
pub fn appointments_on(snapshot: &Snapshot, date: NaiveDate) -> Vec<&Appointment> {
    let mut day: Vec<&Appointment> = snapshot
        .appointments
        .iter()
        .filter(|a| a.appointment_date == date)
        .collect();
    day.sort_by_key(|a| a.appointment_time);
    day
}

/// The first `limit` scheduled appointments in collection order.
pub fn upcoming_scheduled(snapshot: &Snapshot, limit: usize) -> Vec<&Appointment> {
    snapshot
        .appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled)
        .take(limit)
        .collect()
}

fn sum_where<'a>(bills: impl Iterator<Item = &'a Bill>, keep: impl Fn(&Bill) -> bool) -> f64 {
    bills.filter(|b| keep(b)).map(|b| b.amount).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BillingTotals {
    pub paid: f64,
    pub pending: f64,
    pub overdue: f64,
}

pub fn billing_totals(snapshot: &Snapshot) -> BillingTotals {
    let by_status = |status: BillStatus| sum_where(snapshot.bills.iter(), |b| b.status == status);
    BillingTotals {
        paid: by_status(BillStatus::Paid),
        pending: by_status(BillStatus::Pending),
        overdue: by_status(BillStatus::Overdue),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_patients: usize,
    pub todays_appointments: usize,
    pub pending_bills: usize,
    pub paid_revenue: f64,
}

pub fn dashboard_summary(snapshot: &Snapshot, today: NaiveDate) -> DashboardSummary {
    DashboardSummary {
        total_patients: snapshot.patients.len(),
        todays_appointments: snapshot
            .appointments
            .iter()
            .filter(|a| a.appointment_date == today)
            .count(),
        pending_bills: snapshot
            .bills
            .iter()
            .filter(|b| b.status == BillStatus::Pending)
            .count(),
        paid_revenue: sum_where(snapshot.bills.iter(), |b| b.status == BillStatus::Paid),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShare {
    pub status: AppointmentStatus,
    pub count: usize,
    /// Share of all appointments, 0–100. Zero when there are none.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicReport {
    pub total_patients: usize,
    pub total_doctors: usize,
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub paid_revenue: f64,
    pub pending_revenue: f64,
    pub appointments_in_month: usize,
    /// Paid amounts of bills created in the month.
    pub revenue_in_month: f64,
    pub status_breakdown: Vec<StatusShare>,
}

/// Clinic-wide figures; "month" figures use the year and month of `month`.
pub fn clinic_report(snapshot: &Snapshot, month: NaiveDate) -> ClinicReport {
    let same_month = |d: NaiveDate| d.year() == month.year() && d.month() == month.month();
    let total = snapshot.appointments.len();
    let count_status = |status: AppointmentStatus| {
        snapshot
            .appointments
            .iter()
            .filter(|a| a.status == status)
            .count()
    };

    let status_breakdown = AppointmentStatus::ALL
        .iter()
        .map(|&status| {
            let count = count_status(status);
            let percentage = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            StatusShare {
                status,
                count,
                percentage,
            }
        })
        .collect();

    ClinicReport {
        total_patients: snapshot.patients.len(),
        total_doctors: snapshot.doctors.len(),
        total_appointments: total,
        completed_appointments: count_status(AppointmentStatus::Completed),
        paid_revenue: sum_where(snapshot.bills.iter(), |b| b.status == BillStatus::Paid),
        pending_revenue: sum_where(snapshot.bills.iter(), |b| b.status == BillStatus::Pending),
        appointments_in_month: snapshot
            .appointments
            .iter()
            .filter(|a| same_month(a.appointment_date))
            .count(),
        revenue_in_month: sum_where(snapshot.bills.iter(), |b| {
            b.status == BillStatus::Paid && same_month(b.created_at.date())
        }),
        status_breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, NaiveTime};
    use std::sync::Arc;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stamp(y: i32, m: u32, d: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(8, 0, 0).unwrap()
    }

    fn patient(name: &str, phone: &str, email: Option<&str>) -> Patient {
        NewPatient {
            name: name.into(),
            phone: phone.into(),
            email: email.map(Into::into),
            date_of_birth: date(1988, 4, 2),
            gender: Gender::Female,
            address: None,
            emergency_contact: None,
            medical_history: None,
        }
        .into_patient(Uuid::new_v4(), stamp(2024, 1, 1))
    }

    fn appointment(day: NaiveDate, hour: u32, status: AppointmentStatus) -> Appointment {
        NewAppointment {
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            appointment_date: day,
            appointment_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            status,
            notes: None,
        }
        .into_appointment(Uuid::new_v4(), stamp(2024, 1, 1))
    }

    fn bill(amount: f64, status: BillStatus, created: NaiveDateTime) -> Bill {
        NewBill {
            patient_id: Uuid::new_v4(),
            appointment_id: None,
            amount,
            description: "Consultation".into(),
            status,
            due_date: date(2024, 12, 31),
        }
        .into_bill(Uuid::new_v4(), created)
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            patients: Arc::new(vec![
                patient("Somchai Phommasak", "020 5555 1234", Some("Somchai@Mail.la")),
                patient("Noy Keomany", "020 7777 0000", None),
            ]),
            appointments: Arc::new(vec![
                appointment(date(2024, 6, 3), 14, AppointmentStatus::Scheduled),
                appointment(date(2024, 6, 3), 9, AppointmentStatus::Completed),
                appointment(date(2024, 6, 4), 10, AppointmentStatus::Scheduled),
                appointment(date(2024, 7, 1), 11, AppointmentStatus::NoShow),
            ]),
            bills: Arc::new(vec![
                bill(100.0, BillStatus::Paid, stamp(2024, 6, 10)),
                bill(40.0, BillStatus::Paid, stamp(2024, 5, 10)),
                bill(25.0, BillStatus::Pending, stamp(2024, 6, 11)),
                bill(10.0, BillStatus::Overdue, stamp(2024, 4, 1)),
            ]),
            ..Snapshot::default()
        }
    }

    #[test]
    fn search_matches_name_email_and_phone() {
        let s = snapshot();
        assert_eq!(search_patients(&s, "somchai").len(), 1);
        assert_eq!(search_patients(&s, "MAIL.LA").len(), 1);
        assert_eq!(search_patients(&s, "7777")[0].name, "Noy Keomany");
        assert_eq!(search_patients(&s, "").len(), 2);
        assert!(search_patients(&s, "nobody").is_empty());
    }

    #[test]
    fn day_view_sorted_by_time() {
        let s = snapshot();
        let hours: Vec<_> = appointments_on(&s, date(2024, 6, 3))
            .iter()
            .map(|a| a.appointment_time.format("%H:%M").to_string())
            .collect();
        assert_eq!(hours, vec!["09:00", "14:00"]);
    }

    #[test]
    fn upcoming_only_scheduled() {
        let s = snapshot();
        let upcoming = upcoming_scheduled(&s, 5);
        assert_eq!(upcoming.len(), 2);
        assert!(upcoming.iter().all(|a| a.status == AppointmentStatus::Scheduled));
        assert_eq!(upcoming_scheduled(&s, 1).len(), 1);
    }

    #[test]
    fn billing_totals_by_status() {
        let totals = billing_totals(&snapshot());
        assert_eq!(
            totals,
            BillingTotals {
                paid: 140.0,
                pending: 25.0,
                overdue: 10.0
            }
        );
    }

    #[test]
    fn dashboard_counts_today() {
        let summary = dashboard_summary(&snapshot(), date(2024, 6, 3));
        assert_eq!(summary.total_patients, 2);
        assert_eq!(summary.todays_appointments, 2);
        assert_eq!(summary.pending_bills, 1);
        assert_eq!(summary.paid_revenue, 140.0);
    }

    #[test]
    fn report_month_figures_and_breakdown() {
        let report = clinic_report(&snapshot(), date(2024, 6, 15));
        assert_eq!(report.total_appointments, 4);
        assert_eq!(report.completed_appointments, 1);
        assert_eq!(report.appointments_in_month, 3);
        assert_eq!(report.revenue_in_month, 100.0);
        assert_eq!(report.pending_revenue, 25.0);

        let scheduled = &report.status_breakdown[0];
        assert_eq!(scheduled.status, AppointmentStatus::Scheduled);
        assert_eq!(scheduled.count, 2);
        assert_eq!(scheduled.percentage, 50.0);
        let total: usize = report.status_breakdown.iter().map(|s| s.count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn empty_snapshot_has_zero_percentages() {
        let report = clinic_report(&Snapshot::default(), date(2024, 1, 1));
        assert!(report.status_breakdown.iter().all(|s| s.percentage == 0.0));
    }

    #[test]
    fn unknown_fallbacks() {
        assert_eq!(patient_name(None), UNKNOWN_PATIENT);
        assert_eq!(doctor_name(None), UNKNOWN_DOCTOR);
        let p = patient("Noy", "1", None);
        assert_eq!(patient_name(Some(&p)), "Noy");
    }
}
