//! auth.rs
//!
//! Регистрация, проверка пароля и выдача JWT. Координатор бронирования
//! про токены ничего не знает: ему нужен только уже проверенный `user_id`,
//! который даёт `CapabilityResolver::resolve`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::JwtConfig;
use crate::error::BookingError;
use crate::models::User;
use crate::store::{StoreError, UserStore};

/// Проверенная личность, извлечённая из токена.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub username: String,
}

/// Разрешение непрозрачного токена в пользователя.
pub trait CapabilityResolver: Send + Sync {
    fn resolve(&self, capability: &str) -> Result<UserIdentity, BookingError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    username: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// HS256 JWT: выдача и проверка.
pub struct JwtSessions {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtSessions {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(&config.secret, Duration::hours(config.expires_in_hours))
    }

    pub fn issue(&self, user: &User) -> Result<AuthToken, BookingError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| BookingError::StorageUnavailable(format!("token encoding failed: {e}")))?;

        Ok(AuthToken {
            token,
            token_type: "Bearer",
            expires_in: self.ttl.num_seconds(),
        })
    }
}

impl CapabilityResolver for JwtSessions {
    fn resolve(&self, capability: &str) -> Result<UserIdentity, BookingError> {
        let data = decode::<Claims>(capability, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            BookingError::Unauthenticated
        })?;

        Ok(UserIdentity {
            user_id: data.claims.sub,
            username: data.claims.username,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 3, max = 32, message = "username must be 3 to 32 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<JwtSessions>,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<JwtSessions>, bcrypt_cost: u32) -> Self {
        Self { users, sessions, bcrypt_cost }
    }

    pub async fn register(&self, credentials: Credentials) -> Result<User, BookingError> {
        let credentials = Credentials {
            username: credentials.username.trim().to_string(),
            password: credentials.password,
        };
        credentials
            .validate()
            .map_err(|e| BookingError::InvalidCredentials(validation_message(&e)))?;

        let username = credentials.username;
        let cost = self.bcrypt_cost;
        // bcrypt тяжёлый - уводим с async-потоков
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(credentials.password, cost))
            .await
            .map_err(|e| BookingError::StorageUnavailable(format!("hashing task failed: {e}")))?
            .map_err(|e| BookingError::StorageUnavailable(format!("hashing failed: {e}")))?;

        match self.users.insert_user(&username, &hash).await {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "user registered");
                Ok(user)
            }
            Err(StoreError::Duplicate) => Err(BookingError::UsernameTaken),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn authenticate(&self, credentials: Credentials) -> Result<AuthToken, BookingError> {
        let invalid = || BookingError::InvalidCredentials("unknown username or wrong password".to_string());

        let user = self
            .users
            .find_by_username(credentials.username.trim())
            .await?
            .ok_or_else(invalid)?;

        let candidate = user.clone();
        let password = credentials.password;
        let verified = tokio::task::spawn_blocking(move || candidate.verify_password(&password))
            .await
            .map_err(|e| BookingError::StorageUnavailable(format!("hashing task failed: {e}")))?;

        if !verified {
            warn!(username = %user.username, "failed login attempt");
            return Err(invalid());
        }

        self.sessions.issue(&user)
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "invalid credentials".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (AuthService, Arc<JwtSessions>) {
        let sessions = Arc::new(JwtSessions::new("test-secret", Duration::hours(1)));
        let service = AuthService::new(Arc::new(MemoryStore::new()), sessions.clone(), 4);
        (service, sessions)
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials { username: username.to_string(), password: password.to_string() }
    }

    #[tokio::test]
    async fn register_then_login_resolves_identity() {
        let (service, sessions) = service();
        let user = service.register(creds("marta", "hunter22")).await.unwrap();

        let token = service.authenticate(creds("marta", "hunter22")).await.unwrap();
        assert_eq!(token.token_type, "Bearer");

        let identity = sessions.resolve(&token.token).unwrap();
        assert_eq!(identity, UserIdentity { user_id: user.id, username: "marta".to_string() });
    }

    #[tokio::test]
    async fn short_credentials_are_rejected() {
        let (service, _) = service();
        let err = service.register(creds("ab", "hunter22")).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidCredentials(_)));

        let err = service.register(creds("marta", "123")).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn duplicate_username_is_taken() {
        let (service, _) = service();
        service.register(creds("marta", "hunter22")).await.unwrap();
        let err = service.register(creds("marta", "another1")).await.unwrap_err();
        assert!(matches!(err, BookingError::UsernameTaken));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let (service, _) = service();
        service.register(creds("marta", "hunter22")).await.unwrap();

        let wrong = service.authenticate(creds("marta", "hunter23")).await.unwrap_err();
        let unknown = service.authenticate(creds("olga", "hunter22")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn garbage_and_foreign_tokens_are_unauthenticated() {
        let sessions = JwtSessions::new("test-secret", Duration::hours(1));
        assert!(matches!(sessions.resolve("not-a-jwt"), Err(BookingError::Unauthenticated)));

        let other = JwtSessions::new("other-secret", Duration::hours(1));
        let user = User {
            id: Uuid::new_v4(),
            username: "marta".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let foreign = other.issue(&user).unwrap();
        assert!(matches!(sessions.resolve(&foreign.token), Err(BookingError::Unauthenticated)));
    }

    #[test]
    fn expired_token_is_unauthenticated() {
        let sessions = JwtSessions::new("test-secret", Duration::seconds(-10));
        let user = User {
            id: Uuid::new_v4(),
            username: "marta".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let token = sessions.issue(&user).unwrap();
        assert!(matches!(sessions.resolve(&token.token), Err(BookingError::Unauthenticated)));
    }
}
