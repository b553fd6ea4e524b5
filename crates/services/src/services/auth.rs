use board_protocol::user::User;
use db::{
    DbErr, DbPool, is_unique_violation,
    models::user::{UpdateProfile, UpsertUser, UserRepository},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utils_core::validation::{
    SHORT_TEXT_MAX_LEN, ValidationError, normalize_email, normalize_url, sanitize_optional,
    validate_username,
};
use utils_jwt::{JwtError, JwtManager};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Current password is incorrect")]
    WrongPassword,
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token signing failed: {0}")]
    Token(#[from] JwtError),
    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Identity carried by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Whichever of `email` / `username` was sent.
    pub fn login(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordRequest {
    #[serde(default, alias = "currentPassword")]
    pub current_password: String,
    #[serde(default, alias = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarRequest {
    #[serde(default, alias = "avatarUrl")]
    pub avatar_url: Option<String>,
}

/// Login, token verification and self-service account changes.
#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
    jwt: JwtManager,
    cost: u32,
    dummy_hash: String,
}

impl AuthService {
    pub fn new(db: DbPool, jwt: JwtManager) -> Result<Self, AuthError> {
        Self::with_cost(db, jwt, bcrypt::DEFAULT_COST)
    }

    /// `cost` is the bcrypt work factor; tests use the minimum.
    pub fn with_cost(db: DbPool, jwt: JwtManager, cost: u32) -> Result<Self, AuthError> {
        let dummy_hash = bcrypt::hash("vibeweb-dummy-password", cost)?;
        Ok(Self {
            db,
            jwt,
            cost,
            dummy_hash,
        })
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        hash_password(password, self.cost).await
    }

    /// Always runs one bcrypt comparison, against a dummy hash when the user
    /// does not exist, so response time does not reveal which logins exist.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let Some(login) = request.login() else {
            return Err(ValidationError::new("email", "E-mail or username is required").into());
        };
        if request.password.is_empty() {
            return Err(ValidationError::new("password", "Password is required").into());
        }

        let credentials = UserRepository::find_credentials(&self.db, login).await?;
        let hash = credentials
            .as_ref()
            .map(|c| c.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());
        let matches = verify_password(&request.password, hash).await?;

        match credentials {
            Some(credentials) if matches => {
                let token = self
                    .jwt
                    .issue(credentials.user.id, &credentials.user.email)?;
                tracing::info!(user_id = credentials.user.id, "user logged in");
                Ok(LoginResponse {
                    user: credentials.user,
                    token,
                })
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    pub fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self
            .jwt
            .validate(token.trim())
            .map_err(|_| AuthError::Unauthorized)?;
        let id = claims.user_id().map_err(|_| AuthError::Unauthorized)?;
        Ok(AuthUser {
            id,
            email: claims.email,
        })
    }

    pub async fn me(&self, user_id: i64) -> Result<User, AuthError> {
        UserRepository::find_by_id(&self.db, user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        request: &ProfileRequest,
    ) -> Result<User, AuthError> {
        let name = match request.name.as_deref() {
            Some(raw) => Some(
                sanitize_optional(Some(raw), SHORT_TEXT_MAX_LEN)
                    .ok_or_else(|| ValidationError::new("name", "Name must not be empty"))?,
            ),
            None => None,
        };
        let data = UpdateProfile {
            name,
            email: request.email.as_deref().map(normalize_email).transpose()?,
            username: request
                .username
                .as_deref()
                .map(validate_username)
                .transpose()?,
        };

        UserRepository::update_profile(&self.db, user_id, &data)
            .await
            .map_err(|err| match err {
                DbErr::RecordNotFound(_) => AuthError::UserNotFound,
                err if is_unique_violation(&err) => {
                    ValidationError::new("email", "E-mail or username already in use").into()
                }
                err => AuthError::Database(err),
            })
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        request: &PasswordRequest,
    ) -> Result<(), AuthError> {
        if request.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "new_password",
                format!("Password must have at least {MIN_PASSWORD_LEN} characters"),
            )
            .into());
        }

        let current = UserRepository::password_hash(&self.db, user_id)
            .await
            .map_err(not_found_as_user)?;
        if !verify_password(&request.current_password, current).await? {
            return Err(AuthError::WrongPassword);
        }

        let hash = self.hash_password(&request.new_password).await?;
        UserRepository::set_password_hash(&self.db, user_id, &hash)
            .await
            .map_err(not_found_as_user)?;
        tracing::info!(user_id, "password changed");
        Ok(())
    }

    pub async fn set_avatar(
        &self,
        user_id: i64,
        request: &AvatarRequest,
    ) -> Result<User, AuthError> {
        let avatar_url = normalize_url("avatar_url", request.avatar_url.as_deref())?;
        UserRepository::set_avatar_url(&self.db, user_id, avatar_url)
            .await
            .map_err(not_found_as_user)
    }

    /// Creates or overwrites a user; used by the provisioning binary.
    pub async fn provision(
        &self,
        email: &str,
        username: Option<&str>,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("Password must have at least {MIN_PASSWORD_LEN} characters"),
            )
            .into());
        }
        let name = sanitize_optional(Some(name), SHORT_TEXT_MAX_LEN)
            .ok_or_else(|| ValidationError::new("name", "Name must not be empty"))?;
        let data = UpsertUser {
            email: normalize_email(email)?,
            username: username.map(validate_username).transpose()?,
            name,
            password_hash: self.hash_password(password).await?,
        };
        Ok(UserRepository::upsert(&self.db, &data).await?)
    }
}

fn not_found_as_user(err: DbErr) -> AuthError {
    match err {
        DbErr::RecordNotFound(_) => AuthError::UserNotFound,
        err => AuthError::Database(err),
    }
}

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: &str, hash: String) -> Result<bool, AuthError> {
    let password = password.to_string();
    let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;
    // A malformed stored hash is a failed login, not a server error.
    Ok(result.unwrap_or(false))
}
