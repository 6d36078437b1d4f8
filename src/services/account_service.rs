use crate::adapters::database::UserStore;
use crate::config::AuthConfig;
use crate::domain::auth::{Claims, MIN_PASSWORD_LEN, Password};
use crate::domain::user::{NewUser, User, normalize_email};
use crate::error::{AppError, Result};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    users_registered_total: Counter<u64>,
    login_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("agora-server");
        Self {
            users_registered_total: meter
                .u64_counter("agora_users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
            login_total: meter
                .u64_counter("agora_auth_login_total")
                .with_description("Login attempts by outcome")
                .build(),
        }
    }
}

/// An issued access token together with the user it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub user: User,
}

#[derive(Clone, Debug)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    config: AuthConfig,
    metrics: Metrics,
}

impl AccountService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        Self { users, config, metrics: Metrics::new() }
    }

    /// # Errors
    /// Returns `AppError::BadRequest` for missing fields, a malformed email or a short password.
    /// Returns `AppError::Conflict` if the email is already registered.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, email, full_name, password),
        fields(user_id = tracing::field::Empty)
    )]
    pub async fn signup(&self, email: &str, full_name: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        let full_name = full_name.trim();

        if email.is_empty() || full_name.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest("All fields are required".into()));
        }
        if !is_plausible_email(&email) {
            return Err(AppError::BadRequest("Invalid email format".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!("Password must be at least {MIN_PASSWORD_LEN} characters")));
        }

        let password_hash = hash_password(password).await?;
        let user = self
            .users
            .create(NewUser { id: Uuid::new_v4(), email, full_name: full_name.to_string(), password_hash })
            .await?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        self.metrics.users_registered_total.add(1, &[]);

        self.issue(user)
    }

    /// # Errors
    /// Returns `AppError::AuthError` for an unknown email or a wrong password.
    #[tracing::instrument(err(level = "warn"), skip(self, email, password), fields(user_id = tracing::field::Empty))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let Some(user) = self.users.find_by_email(&normalize_email(email)).await? else {
            tracing::warn!("Login failed: user not found");
            self.metrics.login_total.add(1, &[KeyValue::new("status", "failure")]);
            return Err(AppError::AuthError);
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !verify_password(password, &user.password_hash).await? {
            tracing::warn!("Login failed: invalid password");
            self.metrics.login_total.add(1, &[KeyValue::new("status", "failure")]);
            return Err(AppError::AuthError);
        }

        self.metrics.login_total.add(1, &[KeyValue::new("status", "success")]);
        self.issue(user)
    }

    /// Resolves a bearer token to its user id.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` if the token is invalid or expired.
    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        Claims::decode(token, &self.config.jwt_secret).map(|claims| claims.sub)
    }

    /// # Errors
    /// Returns `AppError::AuthError` if the user behind a valid token no longer exists.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id))]
    pub async fn profile(&self, user_id: Uuid) -> Result<User> {
        self.users.find_by_id(user_id).await?.ok_or(AppError::AuthError)
    }

    /// Sidebar directory: every user except the caller.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id))]
    pub async fn directory(&self, user_id: Uuid) -> Result<Vec<User>> {
        self.users.list_except(user_id).await
    }

    fn issue(&self, user: User) -> Result<Session> {
        let claims = Claims::new(user.id, self.config.access_token_ttl_secs);
        let token = claims.encode(&self.config.jwt_secret)?;
        let expires_at = i64::try_from(claims.exp)
            .ok()
            .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
            .ok_or(AppError::Internal)?;
        Ok(Session { token, expires_at, user })
    }
}

fn is_plausible_email(email: &str) -> bool {
    email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    }) && !email.contains(char::is_whitespace)
}

async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || Password::hash(&password)).await.map_err(|_| AppError::Internal)?
}

async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
        .await
        .map_err(|_| AppError::Internal)?
}
