//! Data models for users, sensor records, and the request bodies that touch them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// ---

/// A row of the `users` table.
///
/// Not `Serialize`; responses go through [`PublicUser`].
#[derive(Debug, Clone, PartialEq, Deserialize, sqlx::FromRow)]
pub struct User {
    // ---
    pub user_id: i64,
    pub email: String,
    /// Stored and compared as plaintext.
    pub password: String,
}

/// User as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub user_id: i64,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
        }
    }
}

/// A row of the `data` table: one sensor snapshot for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DataRecord {
    // ---
    pub id: i64,
    pub client_id: i64,
    pub avg_blink_rate: f64,
    pub avg_temp: f64,
    pub left_eye_redness: f64,
    pub right_eye_redness: f64,
    /// Assigned by the store on insert.
    pub created_at: DateTime<Utc>,
}

/// The validated measurement payload of `POST /data`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReadings {
    pub client_id: i64,
    pub avg_blink_rate: f64,
    pub avg_temp: f64,
    pub left_eye_redness: f64,
    pub right_eye_redness: f64,
}

/// A record ready to insert, carrying its service-assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NewDataRecord {
    pub id: i64,
    #[serde(flatten)]
    pub readings: SensorReadings,
}

// ---

/// Body of `POST /login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Both fields must be present; the error does not say which one was missing.
    pub fn credentials(self) -> AppResult<(String, String)> {
        match (self.email, self.password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(AppError::validation("Email and password are required")),
        }
    }
}

/// Body of `POST /data`.
#[derive(Debug, Default, Deserialize)]
pub struct InsertDataRequest {
    pub client_id: Option<i64>,
    pub avg_blink_rate: Option<f64>,
    pub avg_temp: Option<f64>,
    pub left_eye_redness: Option<f64>,
    pub right_eye_redness: Option<f64>,
}

impl InsertDataRequest {
    /// Check required fields in a fixed order, failing on the first one missing.
    pub fn validate(self) -> AppResult<SensorReadings> {
        // ---
        Ok(SensorReadings {
            client_id: require(self.client_id, "client_id")?,
            avg_blink_rate: require(self.avg_blink_rate, "avg_blink_rate")?,
            avg_temp: require(self.avg_temp, "avg_temp")?,
            left_eye_redness: require(self.left_eye_redness, "left_eye_redness")?,
            right_eye_redness: require(self.right_eye_redness, "right_eye_redness")?,
        })
    }
}

fn require<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation(format!("Missing required field: {field}")))
}

/// Body of `PUT /users/{user_id}`. Keys other than these are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(password) = &self.password {
            user.password = password.clone();
        }
    }
}

/// Body of `PUT /data/record/{id}`. Only the four sensor fields are updatable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_blink_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_eye_redness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_eye_redness: Option<f64>,
}

impl DataPatch {
    pub fn is_empty(&self) -> bool {
        self.avg_blink_rate.is_none()
            && self.avg_temp.is_none()
            && self.left_eye_redness.is_none()
            && self.right_eye_redness.is_none()
    }

    pub fn apply(&self, record: &mut DataRecord) {
        if let Some(v) = self.avg_blink_rate {
            record.avg_blink_rate = v;
        }
        if let Some(v) = self.avg_temp {
            record.avg_temp = v;
        }
        if let Some(v) = self.left_eye_redness {
            record.left_eye_redness = v;
        }
        if let Some(v) = self.right_eye_redness {
            record.right_eye_redness = v;
        }
    }
}
