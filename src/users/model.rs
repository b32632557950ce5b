use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MIN_NAME_LEN: usize = 4;
pub const MIN_PASSWORD_LEN: usize = 5;

/// Violations of the user record's schema. Checked on every write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Your name must contain at least 4 characters.")]
    NameTooShort,
    #[error("Please provide a valid email.")]
    InvalidEmail,
    #[error("Your password must contain at least 5 characters.")]
    PasswordTooShort,
    #[error("Phone is required.")]
    MissingPhone,
    #[error("Address is required.")]
    MissingAddress,
    #[error("Role must be either candidate or recruiter.")]
    UnknownRole,
    #[error("Provide all four of your preferred job niches.")]
    IncompleteNiches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "candidate" => Ok(Role::Candidate),
            "recruiter" => Ok(Role::Recruiter),
            _ => Err(SchemaError::UnknownRole),
        }
    }
}

/// The four job-category labels a candidate is looking for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Niches {
    pub first_niche: Option<String>,
    pub second_niche: Option<String>,
    pub third_niche: Option<String>,
    pub fourth_niche: Option<String>,
}

impl Niches {
    fn slots(&self) -> [&Option<String>; 4] {
        [
            &self.first_niche,
            &self.second_niche,
            &self.third_niche,
            &self.fourth_niche,
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.slots()
            .iter()
            .all(|n| n.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// A stored resume: the object key in the asset store and the URL it is served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub storage_id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub address: String,
    pub role: Role,
    pub niches: Niches,
    pub cover_letter: Option<String>,
    pub resume: Option<Resume>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub address: String,
    pub role: Role,
    pub niches: Niches,
    pub cover_letter: Option<String>,
    pub resume: Option<Resume>,
}

/// Partial profile update. `None` keeps the stored value; an empty niche or
/// cover letter clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub cover_letter: Option<String>,
    pub niches: Niches,
    pub resume: Option<Resume>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn validate_password(plain: &str) -> Result<(), SchemaError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(SchemaError::PasswordTooShort);
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn check_record(
    name: &str,
    email: &str,
    phone: &str,
    address: &str,
    role: Role,
    niches: &Niches,
) -> Result<(), SchemaError> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(SchemaError::NameTooShort);
    }
    if !is_valid_email(email) {
        return Err(SchemaError::InvalidEmail);
    }
    if phone.trim().is_empty() {
        return Err(SchemaError::MissingPhone);
    }
    if address.trim().is_empty() {
        return Err(SchemaError::MissingAddress);
    }
    if role == Role::Candidate && !niches.is_complete() {
        return Err(SchemaError::IncompleteNiches);
    }
    Ok(())
}

impl NewUser {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_record(
            &self.name,
            &self.email,
            &self.phone,
            &self.address,
            self.role,
            &self.niches,
        )
    }
}

impl User {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_record(
            &self.name,
            &self.email,
            &self.phone,
            &self.address,
            self.role,
            &self.niches,
        )
    }

    /// Merges `changes` into the record. Niches and cover letter only apply to candidates.
    pub fn apply(&mut self, changes: &ProfileChanges) {
        if let Some(name) = &changes.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = &changes.email {
            self.email = normalize_email(email);
        }
        if let Some(phone) = &changes.phone {
            self.phone = phone.trim().to_string();
        }
        if let Some(address) = &changes.address {
            self.address = address.trim().to_string();
        }

        if self.role == Role::Candidate {
            if let Some(letter) = &changes.cover_letter {
                self.cover_letter = non_empty(letter);
            }
            let incoming = &changes.niches;
            let slots = [
                (&mut self.niches.first_niche, &incoming.first_niche),
                (&mut self.niches.second_niche, &incoming.second_niche),
                (&mut self.niches.third_niche, &incoming.third_niche),
                (&mut self.niches.fourth_niche, &incoming.fourth_niche),
            ];
            for (slot, value) in slots {
                if let Some(value) = value {
                    *slot = non_empty(value);
                }
            }
        }

        if let Some(resume) = &changes.resume {
            self.resume = Some(resume.clone());
        }
    }
}

/// What registration and login hand back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Identity the auth gate attaches to a request.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub role: Role,
}

/// Full profile view, everything except the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub role: Role,
    pub niches: Niches,
    pub cover_letter: Option<String>,
    pub resume: Option<Resume>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
        }
    }
}

impl From<&User> for SessionUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            phone: u.phone.clone(),
            address: u.address.clone(),
            role: u.role,
        }
    }
}

impl From<&User> for Profile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            phone: u.phone.clone(),
            address: u.address.clone(),
            role: u.role,
            niches: u.niches.clone(),
            cover_letter: u.cover_letter.clone(),
            resume: u.resume.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn full_niches() -> Niches {
    Niches {
        first_niche: Some("Backend".into()),
        second_niche: Some("DevOps".into()),
        third_niche: Some("Data".into()),
        fourth_niche: Some("Security".into()),
    }
}
