//! # BMI Record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored BMI measurement.
///
/// `id` is zero until the store assigns one; `created_at` is set by the
/// store at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmiRecord {
    pub id: i64,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    pub created_at: DateTime<Utc>,
}

impl BmiRecord {
    /// Create an unstored record
    pub fn new(user_name: impl Into<String>, weight: f64, height: f64) -> Self {
        Self {
            id: 0,
            user_name: user_name.into(),
            weight,
            height,
            bmi: 0.0,
            created_at: DateTime::<Utc>::default(),
        }
    }

    /// Compute `weight / height²`.
    ///
    /// Leaves `bmi` untouched unless both weight and height are positive.
    pub fn calculate_bmi(&mut self) {
        if self.height > 0.0 && self.weight > 0.0 {
            self.bmi = self.weight / self.height.powi(2);
        }
    }

    /// Whether the store has assigned an id yet
    pub fn is_stored(&self) -> bool {
        self.id != 0
    }
}

/// Body of `POST /records`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecordRequest {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub weight: f64,
    pub height: f64,
}

impl CreateRecordRequest {
    /// Check the fields that serde cannot
    pub fn validate(&self) -> Result<(), String> {
        if self.user_name.trim().is_empty() {
            return Err("userName must not be empty".to_string());
        }
        if !self.weight.is_finite() || !self.height.is_finite() {
            return Err("weight and height must be finite numbers".to_string());
        }
        Ok(())
    }

    /// Build the record to store, with its BMI computed
    pub fn into_record(self) -> BmiRecord {
        let mut record = BmiRecord::new(self.user_name, self.weight, self.height);
        record.calculate_bmi();
        record
    }
}
