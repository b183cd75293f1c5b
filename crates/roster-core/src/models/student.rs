use serde::{Deserialize, Serialize};

use super::form::StudentForm;

/// Server-assigned student identifier.
pub type StudentId = i64;

/// Gender as stored by the backend.
///
/// Canonical wire casing is lowercase. Older records may carry `"Other"` or
/// `"Male"`, and mock data sometimes uses values outside the three options;
/// anything unrecognized reads as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Other,
        }
    }

    /// Get the next option (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Other,
            Gender::Other => Gender::Male,
        }
    }

    /// Get the previous option (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Gender::Male => Gender::Other,
            Gender::Female => Gender::Male,
            Gender::Other => Gender::Female,
        }
    }
}

impl From<String> for Gender {
    fn from(value: String) -> Self {
        Gender::parse(&value)
    }
}

impl From<Gender> for String {
    fn from(value: Gender) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
            Gender::Other => write!(f, "Other"),
        }
    }
}

/// A full student record as returned by `GET /students/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub btc_address: String,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// The editable part of the record.
    pub fn to_form(&self) -> StudentForm {
        StudentForm {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            gender: self.gender,
            country: self.country.clone(),
            avatar: self.avatar.clone(),
            btc_address: self.btc_address.clone(),
        }
    }

    /// Project the record onto the fields shown in the list.
    pub fn summary(&self) -> StudentSummary {
        StudentSummary {
            id: self.id,
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// The projection of a student rendered in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: StudentId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub last_name: String,
}
