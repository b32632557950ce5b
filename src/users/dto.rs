use serde::{Deserialize, Deserializer, Serialize};

use super::model::{normalize_email, Niches, ProfileChanges, Profile, PublicUser, Role};
use crate::error::AppError;

pub const NICHES_REQUIRED: &str = "Provide your preferred job niches.";

/// Accepts `"123"` as well as `123`, since JSON clients send phone numbers either way.
fn string_or_number<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(Option::<Raw>::deserialize(d)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Request body for registration (JSON or multipart).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub first_niche: Option<String>,
    pub second_niche: Option<String>,
    pub third_niche: Option<String>,
    pub fourth_niche: Option<String>,
    pub cover_letter: Option<String>,
}

/// Registration input after boundary checks.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub password: String,
    pub role: Role,
    pub niches: Niches,
    pub cover_letter: Option<String>,
}

impl TryFrom<RegisterRequest> for RegisterInput {
    type Error = AppError;

    fn try_from(req: RegisterRequest) -> Result<Self, Self::Error> {
        let name = present(req.name);
        let email = present(req.email);
        let phone = present(req.phone);
        let password = req.password.filter(|p| !p.is_empty());
        let address = present(req.address);
        let role = present(req.role);

        let mut missing = Vec::new();
        for (field, value) in [
            ("name", name.is_none()),
            ("email", email.is_none()),
            ("phone", phone.is_none()),
            ("password", password.is_none()),
            ("address", address.is_none()),
            ("role", role.is_none()),
        ] {
            if value {
                missing.push(field);
            }
        }
        let (Some(name), Some(email), Some(phone), Some(password), Some(address), Some(role)) =
            (name, email, phone, password, address, role)
        else {
            return Err(AppError::MissingFields(missing));
        };

        let role: Role = role.parse()?;

        let (niches, cover_letter) = match role {
            Role::Candidate => {
                let niches = Niches {
                    first_niche: present(req.first_niche),
                    second_niche: present(req.second_niche),
                    third_niche: present(req.third_niche),
                    fourth_niche: present(req.fourth_niche),
                };
                if !niches.is_complete() {
                    return Err(AppError::Validation(NICHES_REQUIRED.into()));
                }
                (niches, present(req.cover_letter))
            }
            Role::Recruiter => (Niches::default(), None),
        };

        Ok(Self {
            name,
            email: normalize_email(&email),
            phone,
            address,
            password,
            role,
            niches,
            cover_letter,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Partial profile update. Blank niches or cover letter clear the stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub cover_letter: Option<String>,
    pub first_niche: Option<String>,
    pub second_niche: Option<String>,
    pub third_niche: Option<String>,
    pub fourth_niche: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileChanges {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            phone: req.phone,
            address: req.address,
            cover_letter: req.cover_letter,
            niches: Niches {
                first_niche: req.first_niche,
                second_niche: req.second_niche,
                third_niche: req.third_niche,
                fourth_niche: req.fourth_niche,
            },
            resume: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}

/// Returned by login and password change.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: Profile,
}
