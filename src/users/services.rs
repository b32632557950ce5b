use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{LoginRequest, RegisterInput, UpdatePasswordRequest};
use super::extractors::ResumeUpload;
use super::jwt::issue_token;
use super::model::{
    normalize_email, validate_password, NewUser, ProfileChanges, Role, SchemaError, User,
};
use super::password::{hash_password, verify_decoy, verify_password};
use super::repo::USER_EXISTS;
use super::resume::{delete_resume, discard_resume, upload_resume};
use crate::{error::AppError, state::AppState};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const USER_NOT_FOUND: &str = "User not found.";

fn invalid_credentials() -> AppError {
    AppError::Unauthorized(INVALID_CREDENTIALS.into())
}

fn hashing_failed(e: anyhow::Error) -> AppError {
    AppError::upstream("Password hashing failed.", e)
}

pub async fn register(
    st: &AppState,
    input: RegisterInput,
    resume: Option<ResumeUpload>,
) -> Result<User, AppError> {
    validate_password(&input.password)?;
    let mut new_user = NewUser {
        name: input.name,
        email: input.email,
        password_hash: String::new(),
        phone: input.phone,
        address: input.address,
        role: input.role,
        niches: input.niches,
        cover_letter: input.cover_letter,
        resume: None,
    };
    new_user.validate()?;

    if st.users.find_by_email(&new_user.email).await?.is_some() {
        warn!(email = %new_user.email, "email already registered");
        return Err(AppError::Conflict(USER_EXISTS.into()));
    }

    new_user.password_hash = hash_password(&input.password).map_err(hashing_failed)?;

    if let Some(file) = resume {
        new_user.resume = Some(upload_resume(st, file).await?);
    }
    let uploaded = new_user.resume.clone();

    match st.users.create(new_user).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, role = user.role.as_str(), "user registered");
            Ok(user)
        }
        Err(e) => {
            if let Some(resume) = &uploaded {
                discard_resume(st, resume).await;
            }
            Err(e.into())
        }
    }
}

/// Checks credentials and mints a token. Unknown e-mail and wrong password
/// fail identically.
pub async fn login(st: &AppState, req: LoginRequest) -> Result<(User, String), AppError> {
    let (Some(email), Some(password)) = (
        req.email.filter(|e| !e.trim().is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation("Email and password are required.".into()));
    };
    let email = normalize_email(&email);

    let Some(user) = st.users.find_by_email(&email).await? else {
        verify_decoy(&password);
        warn!(%email, "login unknown email");
        return Err(invalid_credentials());
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let token = issue_token(st, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

pub async fn get_profile(st: &AppState, user_id: Uuid) -> Result<User, AppError> {
    st.users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))
}

/// Merges the provided fields into the profile. A new resume replaces the old
/// one: the previous asset is deleted before the new one is stored.
pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    mut changes: ProfileChanges,
    resume: Option<ResumeUpload>,
) -> Result<User, AppError> {
    let current = get_profile(st, user_id).await?;

    let mut merged = current.clone();
    merged.apply(&changes);
    if merged.role == Role::Candidate && !merged.niches.is_complete() {
        return Err(SchemaError::IncompleteNiches.into());
    }
    merged.validate()?;

    if merged.email != current.email {
        if let Some(holder) = st.users.find_by_email(&merged.email).await? {
            if holder.id != user_id {
                warn!(%user_id, email = %merged.email, "email already registered");
                return Err(AppError::Conflict(USER_EXISTS.into()));
            }
        }
    }

    if let Some(file) = resume {
        if let Some(previous) = &current.resume {
            delete_resume(st, &previous.storage_id).await?;
        }
        changes.resume = Some(upload_resume(st, file).await?);
    }

    let result = st.users.update_profile(user_id, &changes).await;
    let failure = match result {
        Ok(Some(user)) => {
            info!(user_id = %user.id, "profile updated");
            return Ok(user);
        }
        Ok(None) => AppError::NotFound(USER_NOT_FOUND.into()),
        Err(e) => e.into(),
    };

    if let Some(resume) = &changes.resume {
        discard_resume(st, resume).await;
    }
    Err(failure)
}

/// Replaces the password after checking the old one, then mints a fresh token.
pub async fn update_password(
    st: &AppState,
    user_id: Uuid,
    req: UpdatePasswordRequest,
) -> Result<(User, String), AppError> {
    let (Some(old_password), Some(new_password), Some(confirm_password)) = (
        req.old_password.filter(|p| !p.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
        req.confirm_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation("All password fields are required.".into()));
    };

    let user = get_profile(st, user_id).await?;
    if !verify_password(&old_password, &user.password_hash)? {
        warn!(%user_id, "password change with wrong old password");
        return Err(AppError::Validation("Old password is incorrect.".into()));
    }
    if new_password != confirm_password {
        return Err(AppError::Validation(
            "New password and confirm password do not match.".into(),
        ));
    }
    validate_password(&new_password)?;

    let hash = hash_password(&new_password).map_err(hashing_failed)?;
    if !st.users.update_password(user_id, &hash).await? {
        return Err(AppError::NotFound(USER_NOT_FOUND.into()));
    }

    let token = issue_token(st, user_id).await?;
    info!(%user_id, "password updated");
    Ok((user, token))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use bytes::Bytes;

    use super::*;
    use crate::storage::FakeStorage;
    use crate::users::memory::MemoryUserStore;
    use crate::users::repo::{StoreError, UserStore};
    use crate::users::extractors::ResumeUpload;
    use crate::users::jwt::JwtKeys;
    use crate::users::model::{full_niches, Niches};

    fn jane() -> RegisterInput {
        RegisterInput {
            name: "Jane Doe".into(),
            email: "jane@x.com".into(),
            phone: "123".into(),
            address: "NYC".into(),
            password: "Secret1".into(),
            role: Role::Candidate,
            niches: full_niches(),
            cover_letter: None,
        }
    }

    fn recruiter(email: &str) -> RegisterInput {
        RegisterInput {
            name: "Acme Hiring".into(),
            email: email.into(),
            role: Role::Recruiter,
            niches: Niches::default(),
            ..jane()
        }
    }

    fn creds(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn pdf(name: &str) -> ResumeUpload {
        ResumeUpload {
            file_name: Some(name.into()),
            content_type: "application/pdf".into(),
            body: Bytes::from_static(b"%PDF-1.4"),
        }
    }

    #[tokio::test]
    async fn register_stores_hash_not_plaintext() {
        let st = AppState::fake();
        let user = register(&st, jane(), None).await.unwrap();

        let stored = st.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "Secret1");
        assert!(verify_password("Secret1", &stored.password_hash).unwrap());
        assert!(stored.niches.is_complete());
        assert_eq!(stored.resume, None);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let st = AppState::fake();
        register(&st, jane(), None).await.unwrap();

        let err = register(&st, recruiter("jane@x.com"), None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), USER_EXISTS);
    }

    #[tokio::test]
    async fn concurrent_registrations_with_one_email_admit_one() {
        let st = AppState::fake();
        let (a, b) = tokio::join!(
            register(&st, jane(), None),
            register(&st, recruiter("jane@x.com"), None)
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let err = a.err().or(b.err()).unwrap();
        assert_eq!(err.to_string(), USER_EXISTS);
        assert!(st.users.find_by_email("jane@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn register_rejects_short_name_before_uploading() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let input = RegisterInput {
            name: "Jo".into(),
            ..jane()
        };

        let err = register(&st, input, Some(pdf("cv.pdf"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn register_with_resume_stores_the_pair() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with_storage(storage.clone());

        let user = register(&st, jane(), Some(pdf("cv.pdf"))).await.unwrap();
        let resume = user.resume.expect("resume stored");
        assert_eq!(storage.calls(), vec![format!("put:{}", resume.storage_id)]);
        assert!(resume.url.ends_with(&resume.storage_id));
    }

    #[tokio::test]
    async fn register_fails_when_upload_fails() {
        let storage = Arc::new(FakeStorage::default());
        storage.fail_uploads();
        let st = AppState::fake_with_storage(storage);

        let err = register(&st, jane(), Some(pdf("cv.pdf"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Resume upload failed.");
        assert!(st.users.find_by_email("jane@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_issues_token_for_the_user() {
        let st = AppState::fake();
        let user = register(&st, jane(), None).await.unwrap();

        let (logged_in, token) = login(&st, creds(" JANE@x.com", "Secret1")).await.unwrap();
        assert_eq!(logged_in.id, user.id);
        let claims = JwtKeys::from(&st.config.jwt).verify(&token).unwrap();
        assert_eq!(claims.id, user.id);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let st = AppState::fake();
        register(&st, jane(), None).await.unwrap();

        let wrong_password = login(&st, creds("jane@x.com", "nope!")).await.unwrap_err();
        let unknown_email = login(&st, creds("ghost@x.com", "Secret1")).await.unwrap_err();

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(unknown_email.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let st = AppState::fake();
        let req = LoginRequest {
            email: Some("jane@x.com".into()),
            password: None,
        };
        let err = login(&st, req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Email and password are required.");
    }

    #[tokio::test]
    async fn update_rejects_clearing_a_niche() {
        let st = AppState::fake();
        let user = register(&st, jane(), None).await.unwrap();

        let changes = ProfileChanges {
            niches: Niches {
                second_niche: Some("".into()),
                ..Niches::default()
            },
            ..ProfileChanges::default()
        };
        let err = update_profile(&st, user.id, changes, None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let stored = st.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.niches, full_niches());
    }

    #[tokio::test]
    async fn update_merges_partial_fields() {
        let st = AppState::fake();
        let user = register(&st, jane(), None).await.unwrap();

        let changes = ProfileChanges {
            address: Some("Boston".into()),
            cover_letter: Some("Ten years of Rust".into()),
            niches: Niches {
                first_niche: Some("Embedded".into()),
                ..Niches::default()
            },
            ..ProfileChanges::default()
        };
        let updated = update_profile(&st, user.id, changes, None).await.unwrap();
        assert_eq!(updated.address, "Boston");
        assert_eq!(updated.name, "Jane Doe");
        assert_eq!(updated.cover_letter.as_deref(), Some("Ten years of Rust"));
        assert_eq!(updated.niches.first_niche.as_deref(), Some("Embedded"));
        assert_eq!(updated.niches.fourth_niche.as_deref(), Some("Security"));
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn update_replaces_resume_deleting_old_first() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        let user = register(&st, jane(), Some(pdf("old.pdf"))).await.unwrap();
        let old = user.resume.clone().unwrap();

        let updated = update_profile(&st, user.id, ProfileChanges::default(), Some(pdf("new.pdf")))
            .await
            .unwrap();
        let new = updated.resume.unwrap();
        assert_ne!(new.storage_id, old.storage_id);
        assert_eq!(
            storage.calls(),
            vec![
                format!("put:{}", old.storage_id),
                format!("delete:{}", old.storage_id),
                format!("put:{}", new.storage_id),
            ]
        );
    }

    /// Loses every profile write to a concurrent holder of the same e-mail.
    struct LosesEmailRace(Arc<MemoryUserStore>);

    #[async_trait]
    impl UserStore for LosesEmailRace {
        async fn create(&self, user: NewUser) -> Result<User, StoreError> {
            self.0.create(user).await
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.0.find_by_email(email).await
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.0.find_by_id(id).await
        }
        async fn update_profile(
            &self,
            _id: Uuid,
            _changes: &ProfileChanges,
        ) -> Result<Option<User>, StoreError> {
            Err(StoreError::DuplicateEmail)
        }
        async fn update_password(&self, id: Uuid, hash: &str) -> Result<bool, StoreError> {
            self.0.update_password(id, hash).await
        }
    }

    #[tokio::test]
    async fn update_discards_upload_when_write_fails() {
        let users = Arc::new(MemoryUserStore::new());
        let storage = Arc::new(FakeStorage::default());
        let mut st = AppState::fake_with(users.clone(), storage.clone());
        let user = register(&st, jane(), None).await.unwrap();
        st.users = Arc::new(LosesEmailRace(users));

        let changes = ProfileChanges {
            email: Some("fresh@x.com".into()),
            ..ProfileChanges::default()
        };
        let err = update_profile(&st, user.id, changes, Some(pdf("cv.pdf")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USER_EXISTS);

        let calls = storage.calls();
        assert_eq!(calls.len(), 2);
        let key = calls[0].strip_prefix("put:").unwrap();
        assert_eq!(calls[1], format!("delete:{key}"));
    }

    #[tokio::test]
    async fn taken_email_keeps_existing_resume_untouched() {
        let storage = Arc::new(FakeStorage::default());
        let st = AppState::fake_with_storage(storage.clone());
        register(&st, recruiter("taken@x.com"), None).await.unwrap();
        let user = register(&st, jane(), Some(pdf("old.pdf"))).await.unwrap();
        let old = user.resume.clone().unwrap();

        let changes = ProfileChanges {
            email: Some(" Taken@X.com".into()),
            ..ProfileChanges::default()
        };
        let err = update_profile(&st, user.id, changes, Some(pdf("new.pdf")))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), USER_EXISTS);

        assert_eq!(storage.calls(), vec![format!("put:{}", old.storage_id)]);
        let stored = st.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.resume, Some(old));
        assert_eq!(stored.email, "jane@x.com");
    }

    #[tokio::test]
    async fn resubmitting_own_email_is_not_a_conflict() {
        let st = AppState::fake();
        let user = register(&st, jane(), None).await.unwrap();

        let changes = ProfileChanges {
            email: Some("JANE@x.com".into()),
            ..ProfileChanges::default()
        };
        let updated = update_profile(&st, user.id, changes, None).await.unwrap();
        assert_eq!(updated.email, "jane@x.com");
    }

    #[tokio::test]
    async fn update_password_rehashes_and_checks_old_password() {
        let st = AppState::fake();
        let user = register(&st, jane(), None).await.unwrap();

        let wrong = UpdatePasswordRequest {
            old_password: Some("not-it".into()),
            new_password: Some("Secret2".into()),
            confirm_password: Some("Secret2".into()),
        };
        let err = update_password(&st, user.id, wrong).await.unwrap_err();
        assert_eq!(err.to_string(), "Old password is incorrect.");

        let mismatch = UpdatePasswordRequest {
            old_password: Some("Secret1".into()),
            new_password: Some("Secret2".into()),
            confirm_password: Some("Secret3".into()),
        };
        let err = update_password(&st, user.id, mismatch).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let ok = UpdatePasswordRequest {
            old_password: Some("Secret1".into()),
            new_password: Some("Secret2".into()),
            confirm_password: Some("Secret2".into()),
        };
        let (_, token) = update_password(&st, user.id, ok).await.unwrap();
        assert!(!token.is_empty());

        assert!(login(&st, creds("jane@x.com", "Secret1")).await.is_err());
        assert!(login(&st, creds("jane@x.com", "Secret2")).await.is_ok());
    }
}
