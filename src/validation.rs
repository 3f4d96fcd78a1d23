//! Field rules for the registration form.
//!
//! Everything here is a pure function of the current form values. The web
//! layer re-runs [`RegistrationForm::validate`] on every submission attempt and
//! uses [`RegistrationForm::field_errors`] to render inline messages.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exact number of digits a phone number must have.
pub const PHONE_DIGITS: usize = 10;

/// Maximum number of digits the PIN input accepts.
pub const PIN_MAX_DIGITS: usize = 4;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Departments a student can register under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    ComputerScience,
    Electronics,
    Mechanical,
    Civil,
    Electrical,
    InformationTechnology,
    Other,
}

impl Department {
    pub const ALL: [Department; 7] = [
        Department::ComputerScience,
        Department::Electronics,
        Department::Mechanical,
        Department::Civil,
        Department::Electrical,
        Department::InformationTechnology,
        Department::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::ComputerScience => "Computer Science",
            Department::Electronics => "Electronics",
            Department::Mechanical => "Mechanical",
            Department::Civil => "Civil",
            Department::Electrical => "Electrical",
            Department::InformationTechnology => "Information Technology",
            Department::Other => "Other",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or(FieldError::Department)
    }
}

/// Year of study.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Year {
    First,
    Second,
    Third,
    Fourth,
    Other,
}

impl Year {
    pub const ALL: [Year; 5] = [Year::First, Year::Second, Year::Third, Year::Fourth, Year::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Year::First => "1st Year",
            Year::Second => "2nd Year",
            Year::Third => "3rd Year",
            Year::Fourth => "4th Year",
            Year::Other => "Other",
        }
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Year {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Year::ALL
            .into_iter()
            .find(|y| y.as_str() == s)
            .ok_or(FieldError::Year)
    }
}

/// A single field that failed its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FieldError {
    #[error("Name is required")]
    Name,
    #[error("Must be exactly 10 digits")]
    Phone,
    #[error("Enter a valid email address")]
    Email,
    #[error("College name is required")]
    College,
    #[error("Select a department")]
    Department,
    #[error("Select a year")]
    Year,
}

impl FieldError {
    /// The form field this error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Name => "name",
            FieldError::Phone => "phone",
            FieldError::Email => "email",
            FieldError::College => "college",
            FieldError::Department => "department",
            FieldError::Year => "year",
        }
    }
}

/// Every rule the form currently violates, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn contains(&self, error: FieldError) -> bool {
        self.0.contains(&error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

/// Strips everything but ASCII digits and truncates to [`PHONE_DIGITS`].
pub fn sanitize_phone(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_digit)
        .take(PHONE_DIGITS)
        .collect()
}

/// Strips everything but ASCII digits and truncates to [`PIN_MAX_DIGITS`].
pub fn sanitize_pin(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_digit)
        .take(PIN_MAX_DIGITS)
        .collect()
}

pub fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
}

pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == PHONE_DIGITS && phone.chars().all(|c| c.is_ascii_digit())
}

/// Syntactic `x@y.z` check. Says nothing about deliverability.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

pub fn is_valid_college(college: &str) -> bool {
    !college.trim().is_empty()
}

/// Raw values of the registration form as the browser submitted them.
///
/// `department` and `year` are empty until the user picks an option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub year: String,
}

impl RegistrationForm {
    /// Applies the entry-time phone filter, as typing into the phone box would.
    pub fn with_filtered_phone(mut self) -> Self {
        self.phone = sanitize_phone(&self.phone);
        self
    }

    /// Rules that currently fail, in field order. Empty when submittable.
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if !is_valid_name(&self.name) {
            errors.push(FieldError::Name);
        }
        if !is_valid_phone(&self.phone) {
            errors.push(FieldError::Phone);
        }
        if !is_valid_email(&self.email) {
            errors.push(FieldError::Email);
        }
        if !is_valid_college(&self.college) {
            errors.push(FieldError::College);
        }
        if self.department.parse::<Department>().is_err() {
            errors.push(FieldError::Department);
        }
        if self.year.parse::<Year>().is_err() {
            errors.push(FieldError::Year);
        }
        errors
    }

    pub fn is_submittable(&self) -> bool {
        self.field_errors().is_empty()
    }

    /// Turns the raw values into a record ready for insertion.
    pub fn validate(&self) -> Result<NewStudent, ValidationErrors> {
        let errors = self.field_errors();
        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        // Both parses were checked by field_errors above
        let department = self.department.parse().map_err(|e| ValidationErrors(vec![e]))?;
        let year = self.year.parse().map_err(|e| ValidationErrors(vec![e]))?;

        Ok(NewStudent {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            college: self.college.clone(),
            department,
            year,
        })
    }
}

/// A registration that passed every field rule.
///
/// Only [`RegistrationForm::validate`] produces one, so a store never sees
/// an unvalidated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub college: String,
    pub department: Department,
    pub year: Year,
}
