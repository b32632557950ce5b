use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::users::model::{Niches, NewUser, ProfileChanges, Resume, Role, SchemaError, User};

pub const USER_EXISTS: &str = "User already exists.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AppError::Conflict(USER_EXISTS.into()),
            StoreError::Schema(e) => e.into(),
            StoreError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<SchemaError> for AppError {
    fn from(e: SchemaError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Persistent user records. Implementations own e-mail uniqueness and
/// re-validate the schema on every write.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Merges `changes` into the record atomically. `None` if the user is gone.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, StoreError>;
    /// Returns `false` if the user is gone.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError>;
}

/// Row as stored in Postgres.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    phone: String,
    address: String,
    role: String,
    first_niche: Option<String>,
    second_niche: Option<String>,
    third_niche: Option<String>,
    fourth_niche: Option<String>,
    cover_letter: Option<String>,
    resume_id: Option<String>,
    resume_url: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role: Role = r
            .role
            .parse()
            .map_err(|_| sqlx::Error::Decode(format!("unknown role {:?}", r.role).into()))?;
        let resume = match (r.resume_id, r.resume_url) {
            (Some(storage_id), Some(url)) => Some(Resume { storage_id, url }),
            _ => None,
        };
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            phone: r.phone,
            address: r.address,
            role,
            niches: Niches {
                first_niche: r.first_niche,
                second_niche: r.second_niche,
                third_niche: r.third_niche,
                fourth_niche: r.fourth_niche,
            },
            cover_letter: r.cover_letter,
            resume,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn write_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        other => StoreError::Database(other),
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        user.validate()?;
        let (resume_id, resume_url) = match user.resume {
            Some(r) => (Some(r.storage_id), Some(r.url)),
            None => (None, None),
        };
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, password_hash, phone, address, role,
                               first_niche, second_niche, third_niche, fourth_niche,
                               cover_letter, resume_id, resume_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, name, email, password_hash, phone, address, role,
                      first_niche, second_niche, third_niche, fourth_niche,
                      cover_letter, resume_id, resume_url, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(user.role.as_str())
        .bind(&user.niches.first_niche)
        .bind(&user.niches.second_niche)
        .bind(&user.niches.third_niche)
        .bind(&user.niches.fourth_niche)
        .bind(&user.cover_letter)
        .bind(resume_id)
        .bind(resume_url)
        .fetch_one(&self.db)
        .await
        .map_err(write_error)?;
        Ok(User::try_from(row)?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, phone, address, role,
                   first_niche, second_niche, third_niche, fourth_niche,
                   cover_letter, resume_id, resume_url, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, phone, address, role,
                   first_niche, second_niche, third_niche, fourth_niche,
                   cover_letter, resume_id, resume_url, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, phone, address, role,
                   first_niche, second_niche, third_niche, fourth_niche,
                   cover_letter, resume_id, resume_url, created_at, updated_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut user = User::try_from(row)?;
        user.apply(changes);
        user.validate()?;

        let (resume_id, resume_url) = match &user.resume {
            Some(r) => (Some(r.storage_id.as_str()), Some(r.url.as_str())),
            None => (None, None),
        };
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET name = $2, email = $3, phone = $4, address = $5,
                   first_niche = $6, second_niche = $7, third_niche = $8, fourth_niche = $9,
                   cover_letter = $10, resume_id = $11, resume_url = $12,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, phone, address, role,
                      first_niche, second_niche, third_niche, fourth_niche,
                      cover_letter, resume_id, resume_url, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.niches.first_niche)
        .bind(&user.niches.second_niche)
        .bind(&user.niches.third_niche)
        .bind(&user.niches.fourth_niche)
        .bind(&user.cover_letter)
        .bind(resume_id)
        .bind(resume_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error)?;

        tx.commit().await?;
        Ok(Some(User::try_from(row)?))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
