#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

use crate::adapters::database::{
    DbPool, ForumRepository, ForumStore, MessageRepository, MessageStore, UserRepository, UserStore,
};
use crate::adapters::image_host::{CloudinaryImageHost, ImageHost, S3ImageHost, s3};
use crate::adapters::local_store::LocalStaticStore;
use crate::api::ServiceContainer;
use crate::config::{Config, ImageBackend, ImageHostConfig};
use crate::services::account_service::AccountService;
use crate::services::forum_service::ForumService;
use crate::services::health_service::HealthService;
use crate::services::image_service::ImageService;
use crate::services::message_service::MessageService;
use crate::services::notification_service::NotificationService;
use crate::services::rate_limit_service::RateLimitService;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Fully wired services, ready to be mounted on the two routers.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    messages: Option<Arc<dyn MessageStore>>,
    users: Option<Arc<dyn UserStore>>,
    forum: Option<Arc<dyn ForumStore>>,
    image_host: Option<Arc<dyn ImageHost>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, messages: None, users: None, forum: None, image_host: None }
    }

    /// Backs every store with PostgreSQL.
    #[must_use]
    pub fn with_database(self, pool: DbPool) -> Self {
        self.with_stores(
            Arc::new(MessageRepository::new(pool.clone())),
            Arc::new(UserRepository::new(pool.clone())),
            Arc::new(ForumRepository::new(pool)),
        )
    }

    #[must_use]
    pub fn with_stores(
        mut self,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserStore>,
        forum: Arc<dyn ForumStore>,
    ) -> Self {
        self.messages = Some(messages);
        self.users = Some(users);
        self.forum = Some(forum);
        self
    }

    #[must_use]
    pub fn with_image_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.image_host = Some(host);
        self
    }

    /// Wires the services together and prepares the upload directory.
    ///
    /// # Errors
    /// Returns an error if a required component is missing or the upload directory cannot be created.
    pub async fn build(self) -> anyhow::Result<App> {
        let messages = self.messages.context("message store is required")?;
        let users = self.users.context("user store is required")?;
        let forum = self.forum.context("forum store is required")?;
        let image_host = self.image_host.context("image host is required")?;
        let config = self.config;

        let local_store = LocalStaticStore::new(config.uploads.dir.clone(), &config.uploads.public_prefix);
        local_store
            .ensure_dir()
            .await
            .with_context(|| format!("failed to create upload directory {}", config.uploads.dir.display()))?;

        let notification_service = NotificationService::new(config.websocket.outbound_buffer_size);
        let image_service =
            ImageService::new(Arc::clone(&image_host), Duration::from_secs(config.image_host.upload_timeout_secs));

        let message_service = MessageService::new(
            Arc::clone(&messages),
            Arc::clone(&users),
            image_service,
            local_store.clone(),
            notification_service.clone(),
        );
        let account_service = AccountService::new(users, config.auth.clone());
        let forum_service = ForumService::new(forum);
        let rate_limit_service = RateLimitService::new(config.server.trusted_proxies.clone());
        let health_service = HealthService::new(messages, image_host, config.health.clone());

        Ok(App {
            services: ServiceContainer {
                account_service,
                forum_service,
                message_service,
                notification_service,
                rate_limit_service,
                local_store,
            },
            health_service,
        })
    }
}

/// Builds the image host selected by configuration.
///
/// # Errors
/// Returns an error if the selected backend is missing required settings.
pub async fn build_image_host(config: &ImageHostConfig) -> anyhow::Result<Arc<dyn ImageHost>> {
    match config.backend {
        ImageBackend::Cloudinary => {
            let cloud_name = config.cloudinary_cloud_name.as_deref().context("cloudinary cloud name is required")?;
            let api_key = config.cloudinary_api_key.clone().context("cloudinary api key is required")?;
            let api_secret = config.cloudinary_api_secret.clone().context("cloudinary api secret is required")?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.upload_timeout_secs))
                .build()
                .context("failed to build HTTP client")?;

            tracing::info!(cloud_name, "Using Cloudinary image host");
            Ok(Arc::new(CloudinaryImageHost::new(
                client,
                &config.cloudinary_api_base,
                cloud_name,
                api_key,
                api_secret,
                config.cloudinary_signature_algorithm,
            )))
        }
        ImageBackend::S3 => {
            let bucket = config.s3_bucket.clone().context("s3 bucket is required")?;
            let public_base_url = config
                .s3_public_base_url
                .clone()
                .unwrap_or_else(|| s3::default_public_base_url(config, &bucket));
            let client = s3::build_client(config).await;

            tracing::info!(%bucket, "Using S3 image host");
            Ok(Arc::new(S3ImageHost::new(client, bucket, &public_base_url)))
        }
    }
}

/// Applies the embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations");
    sqlx::migrate!().run(pool).await.context("failed to run migrations")?;
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the configured log sink.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());

        tracing::error!(panic.location = %location, panic.payload = %payload, "Process panicked");
    }));
}
