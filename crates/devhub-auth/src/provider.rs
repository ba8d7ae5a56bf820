use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;
use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use devhub_db::Database;
use devhub_types::claims::Claims;
use devhub_types::models::Session;
use devhub_types::path::paths;
use devhub_types::{HubError, HubResult};

/// Authentication provider: issues and checks session tokens.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> HubResult<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> HubResult<Session>;

    async fn sign_out(&self, token: &str) -> HubResult<()>;

    /// `Ok(None)` when the token is expired, malformed, revoked, or its user
    /// is gone.
    async fn verify(&self, token: &str) -> HubResult<Option<Session>>;
}

/// Password + JWT provider backed by the local `users` table.
#[derive(Clone)]
pub struct LocalAuth {
    db: Arc<Database>,
    jwt_secret: String,
    token_ttl: chrono::Duration,
}

impl LocalAuth {
    pub fn new(db: Arc<Database>, jwt_secret: impl Into<String>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            token_ttl: chrono::Duration::days(30),
        }
    }

    pub fn with_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    fn create_token(&self, user_id: Uuid, email: &str) -> HubResult<String> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            jti: Uuid::new_v4(),
            exp: (chrono::Utc::now() + self.token_ttl).timestamp().max(0) as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| HubError::unavailable(format!("token encoding failed: {}", e)))
    }

    fn decode_claims(&self, token: &str, check_expiry: bool) -> Option<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = check_expiry;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| debug!("Rejected token: {}", e))
        .ok()
        .map(|data| data.claims)
    }

    async fn blocking<F, T>(&self, f: F) -> HubResult<T>
    where
        F: FnOnce(&LocalAuth) -> HubResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(&this))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                HubError::unavailable(e)
            })?
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthBackend for LocalAuth {
    async fn sign_up(&self, email: &str, password: &str) -> HubResult<Session> {
        let email = normalize_email(email);
        if !email.contains('@') || email.len() > 254 {
            return Err(HubError::malformed("invalid email address"));
        }
        if password.len() < 8 {
            return Err(HubError::malformed("password must be at least 8 characters"));
        }
        let password = password.to_string();

        self.blocking(move |auth| {
            if auth
                .db
                .get_user_by_email(&email)
                .map_err(HubError::unavailable)?
                .is_some()
            {
                return Err(HubError::denied("email already registered"));
            }

            // Hash password with Argon2id
            let salt = SaltString::generate(&mut OsRng);
            let password_hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| HubError::unavailable(format!("password hashing failed: {}", e)))?
                .to_string();

            let user_id = Uuid::new_v4();
            let display_name = email.split('@').next().unwrap_or_default();
            auth.db
                .register_user(
                    &user_id.to_string(),
                    &email,
                    &password_hash,
                    &paths::profile(&user_id.to_string())?,
                    &json!({ "uid": user_id.to_string(), "displayName": display_name }),
                )
                .map_err(devhub_db::into_hub)?;

            let token = auth.create_token(user_id, &email)?;
            info!("Registered {} ({})", email, user_id);
            Ok(Session {
                token,
                user_id: user_id.to_string(),
                email,
            })
        })
        .await
    }

    async fn sign_in(&self, email: &str, password: &str) -> HubResult<Session> {
        let email = normalize_email(email);
        let password = password.to_string();

        self.blocking(move |auth| {
            let user = auth
                .db
                .get_user_by_email(&email)
                .map_err(HubError::unavailable)?
                .ok_or(HubError::Unauthenticated)?;

            let parsed_hash = PasswordHash::new(&user.password)
                .map_err(|e| HubError::malformed(format!("stored hash for {}: {}", user.id, e)))?;

            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .map_err(|_| HubError::Unauthenticated)?;

            let user_id: Uuid = user
                .id
                .parse()
                .map_err(|_| HubError::malformed(format!("corrupt user id '{}'", user.id)))?;

            let token = auth.create_token(user_id, &user.email)?;
            Ok(Session {
                token,
                user_id: user.id,
                email: user.email,
            })
        })
        .await
    }

    async fn sign_out(&self, token: &str) -> HubResult<()> {
        let Some(claims) = self.decode_claims(token, false) else {
            return Ok(());
        };

        self.blocking(move |auth| {
            auth.db
                .revoke_token(&claims.jti.to_string(), &claims.sub.to_string())
                .map_err(HubError::unavailable)
        })
        .await
    }

    async fn verify(&self, token: &str) -> HubResult<Option<Session>> {
        let Some(claims) = self.decode_claims(token, true) else {
            return Ok(None);
        };
        let token = token.to_string();

        self.blocking(move |auth| {
            if auth
                .db
                .is_token_revoked(&claims.jti.to_string())
                .map_err(HubError::unavailable)?
            {
                return Ok(None);
            }
            let user = auth
                .db
                .get_user_by_id(&claims.sub.to_string())
                .map_err(HubError::unavailable)?;
            Ok(user.map(|u| Session {
                token,
                user_id: u.id,
                email: u.email,
            }))
        })
        .await
    }
}
