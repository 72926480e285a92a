use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `patients` row: demographic profile linked one-to-one with a patient
/// identity. Created out-of-band; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_of_birth: Option<NaiveDate>,
    /// Height in cm.
    pub height: Option<f64>,
    /// Weight in kg.
    pub weight: Option<f64>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}
