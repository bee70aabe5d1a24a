//! Careers and job applications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use haat_core::{ApplicationStatus, CareerApplicationId, CareerId, Email, Phone, Slug};

/// A job opening.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Career {
    pub id: CareerId,
    pub title: String,
    pub slug: Slug,
    pub department: String,
    pub location: String,
    /// e.g. `full_time`, `part_time`, `internship`.
    pub employment_type: String,
    pub description: String,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An application to a job opening.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CareerApplication {
    pub id: CareerApplicationId,
    pub career_id: CareerId,
    pub name: String,
    pub email: Email,
    pub phone: Phone,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
