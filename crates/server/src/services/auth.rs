//! Registration, login and password changes.

use crate::services::error::{ServiceError, ServiceResult};
use crate::services::users::normalize_email;
use crate::services::views::UserProfile;
use guideforge_core::password::{hash_password, verify_password};
use guideforge_core::validation::{validate_email, validate_password, validate_username};
use guideforge_core::{Claims, Principal, TokenIssuer};
use guideforge_metadata::models::NewUser;
use guideforge_metadata::{MetadataError, MetadataStore};
use std::sync::{Arc, LazyLock};
use tracing::info;

const BAD_CREDENTIALS: &str = "invalid email or password";

/// Verified against when the email is unknown, so both login failures cost
/// one Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("guideforge-login-placeholder").ok());

/// Registration request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A freshly issued token and the user it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_in: u64,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct AuthService {
    metadata: Arc<dyn MetadataStore>,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(metadata: Arc<dyn MetadataStore>, tokens: TokenIssuer) -> Self {
        Self { metadata, tokens }
    }

    pub async fn register(&self, input: Registration) -> ServiceResult<Session> {
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        validate_password(&input.password)?;
        let email = normalize_email(&input.email);

        let existing = self
            .metadata
            .get_user_by_email(&email)
            .await
            .map_err(|e| ServiceError::metadata("looking up email", e))?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "email {email} is already registered"
            )));
        }

        let password_hash = hash_blocking(input.password).await?;
        let user = self
            .metadata
            .create_user(&NewUser {
                username: input.username.trim().to_string(),
                email: email.clone(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                MetadataError::AlreadyExists(_) => {
                    ServiceError::Conflict(format!("email {email} is already registered"))
                }
                other => ServiceError::metadata("creating user", other),
            })?;
        info!(user_id = user.id, "User registered");
        self.session(user.into())
    }

    /// Unknown emails and wrong passwords fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let email = normalize_email(email);
        let user = self
            .metadata
            .get_user_by_email(&email)
            .await
            .map_err(|e| ServiceError::metadata("looking up email", e))?;
        let Some(user) = user else {
            verify_dummy_blocking(password.to_string()).await;
            return Err(ServiceError::Unauthenticated(BAD_CREDENTIALS.to_string()));
        };

        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            return Err(ServiceError::Unauthenticated(BAD_CREDENTIALS.to_string()));
        }
        self.session(user.into())
    }

    pub async fn change_password(
        &self,
        principal: Principal,
        current_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        validate_password(new_password)?;
        let user = self
            .metadata
            .get_user(principal.id())
            .await
            .map_err(|e| ServiceError::metadata("loading user", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("user {principal}")))?;

        if !verify_blocking(current_password.to_string(), user.password_hash).await? {
            return Err(ServiceError::Unauthenticated(
                "current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_blocking(new_password.to_string()).await?;
        self.metadata
            .update_password(user.id, &password_hash)
            .await
            .map_err(|e| ServiceError::metadata("updating password", e))?;
        info!(user_id = user.id, "Password changed");
        Ok(())
    }

    pub fn verify_token(&self, token: &str) -> ServiceResult<Claims> {
        Ok(self.tokens.verify(token)?)
    }

    fn session(&self, user: UserProfile) -> ServiceResult<Session> {
        let token = self.tokens.issue(user.id, &user.email)?;
        Ok(Session {
            token,
            expires_in: self.tokens.expiration_secs(),
            user,
        })
    }
}

// Argon2 runs on the blocking pool.
async fn hash_blocking(password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::storage("hashing password", e))?
        .map_err(ServiceError::from)
}

async fn verify_blocking(password: String, hash: String) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::storage("verifying password", e))?
        .map_err(ServiceError::from)
}

async fn verify_dummy_blocking(password: String) {
    let _ = tokio::task::spawn_blocking(move || {
        DUMMY_HASH
            .as_deref()
            .map(|hash| verify_password(&password, hash))
    })
    .await;
}
