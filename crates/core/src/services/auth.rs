//! Authentication service: accounts, passwords and access tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use qa_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use qa_db::{
    entities::user::{self, UserRole},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::{Validate, ValidationError};

/// Email of the shared account anonymous submissions are attributed to.
pub const GUEST_EMAIL: &str = "guest@system.local";
const GUEST_USERNAME: &str = "Guest";

/// Whether `user` is the shared account anonymous submissions are attributed to.
#[must_use]
pub fn is_guest(user: &user::Model) -> bool {
    user.email == GUEST_EMAIL
}

/// Maximum password length in UTF-8 bytes.
const MAX_PASSWORD_BYTES: usize = 72;

/// Input for registering a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 50))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6), custom(function = "validate_password_bytes"))]
    pub password: String,
}

/// Input for logging in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

fn validate_password_bytes(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        let mut err = ValidationError::new("password_too_long");
        err.message = Some(format!("password cannot exceed {MAX_PASSWORD_BYTES} bytes").into());
        return Err(err);
    }
    Ok(())
}

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
}

impl From<&user::Model> for UserDto {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
        }
    }
}

/// Successful register/login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserDto,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    secret_key: String,
    token_ttl: Duration,
    id_gen: IdGenerator,
}

impl AuthService {
    /// Create a new auth service.
    #[must_use]
    pub fn new(user_repo: UserRepository, config: &AuthConfig) -> Self {
        Self {
            user_repo,
            secret_key: config.secret_key.clone(),
            token_ttl: Duration::minutes(config.token_ttl_minutes),
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new account and log it in.
    pub async fn register(&self, input: RegisterInput) -> AppResult<TokenResponse> {
        input.validate()?;

        if input.email.eq_ignore_ascii_case(GUEST_EMAIL)
            || input.username.eq_ignore_ascii_case(GUEST_USERNAME)
        {
            return Err(AppError::BadRequest("This identity is reserved".to_string()));
        }
        if self.user_repo.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }
        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("Username already taken".to_string()));
        }

        let user = self
            .create_user(&input.username, &input.email, &input.password, UserRole::Guest)
            .await?;
        info!(user_id = %user.id, "User registered");

        self.token_response(&user)
    }

    /// Verify credentials and issue a token.
    ///
    /// Unknown email, wrong password and deactivated accounts are all `Unauthorized`.
    pub async fn login(&self, input: LoginInput) -> AppResult<TokenResponse> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }
        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt by deactivated user");
            return Err(AppError::Unauthorized);
        }

        self.token_response(&user)
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Resolve a bearer token to its user.
    ///
    /// The user is returned even when inactive; callers decide how to refuse.
    pub async fn authenticate_token(&self, token: &str) -> AppResult<user::Model> {
        let claims = self.verify_token(token)?;
        self.user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get the shared guest account, creating it on first use.
    pub async fn get_or_create_guest(&self) -> AppResult<user::Model> {
        if let Some(guest) = self.user_repo.find_by_email(GUEST_EMAIL).await? {
            return Ok(guest);
        }

        // Nobody can log in as the guest: the password is random and discarded.
        let password = self.id_gen.generate_token_id();
        match self
            .create_user(GUEST_USERNAME, GUEST_EMAIL, &password, UserRole::Guest)
            .await
        {
            Ok(guest) => {
                info!(user_id = %guest.id, "Guest user created");
                Ok(guest)
            }
            // Lost a creation race; the other insert won.
            Err(AppError::Database(e)) => self
                .user_repo
                .find_by_email(GUEST_EMAIL)
                .await?
                .ok_or(AppError::Database(e)),
            Err(e) => Err(e),
        }
    }

    /// Sign an access token for a user.
    pub fn issue_token(&self, user: &user::Model) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
            jti: self.id_gen.generate_token_id(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret_key.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Check a token's signature and expiry.
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret_key.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> AppResult<user::Model> {
        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(hash_password(password)?),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        self.user_repo.create(model).await
    }

    fn token_response(&self, user: &user::Model) -> AppResult<TokenResponse> {
        Ok(TokenResponse {
            access_token: self.issue_token(user)?,
            token_type: "bearer".to_string(),
            user: UserDto::from(user),
        })
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
