#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc, clippy::must_use_candidate, unreachable_pub)]

use agora_server::adapters::database::{ForumStore, MessageStore, UserStore};
use agora_server::adapters::image_host::{ImageHost, ImageHostError, ImageSource};
use agora_server::api::MgmtState;
use agora_server::config::Config;
use agora_server::domain::forum::{NewPost, NewReply, Post, Reply};
use agora_server::domain::message::{Message, NewMessage};
use agora_server::domain::user::{AuthorSummary, NewUser, User};
use agora_server::error::{AppError, Result};
use agora_server::{AppBuilder, telemetry};
use async_trait::async_trait;
use clap::Parser;
use futures::StreamExt;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

pub const PASSWORD: &str = "password123";

#[derive(Debug, Default)]
pub struct MemoryMessages {
    rows: Mutex<Vec<Message>>,
    pub fail_writes: AtomicBool,
    pub fail_ping: AtomicBool,
}

impl MemoryMessages {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageStore for MemoryMessages {
    async fn insert(&self, message: NewMessage) -> Result<Message> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let message = message.into_message(OffsetDateTime::now_utc());
        self.rows.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryUsers(Mutex<Vec<User>>);

#[async_trait]
impl UserStore for MemoryUsers {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut rows = self.0.lock().unwrap();
        if rows.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already exists".into()));
        }
        let user = User {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            profile_pic: None,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.0.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.0.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn list_except(&self, id: Uuid) -> Result<Vec<User>> {
        let mut users: Vec<_> = self.0.lock().unwrap().iter().filter(|u| u.id != id).cloned().collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(users)
    }
}

#[derive(Debug)]
pub struct MemoryForum {
    users: Arc<MemoryUsers>,
    posts: Mutex<Vec<Post>>,
    replies: Mutex<Vec<Reply>>,
}

impl MemoryForum {
    fn author(&self, id: Uuid) -> AuthorSummary {
        self.users.0.lock().unwrap().iter().find(|u| u.id == id).map_or_else(
            || AuthorSummary { id, full_name: String::new(), profile_pic: None },
            AuthorSummary::from,
        )
    }
}

#[async_trait]
impl ForumStore for MemoryForum {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        Ok(self.posts.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let now = OffsetDateTime::now_utc();
        let post = Post {
            id: post.id,
            author: self.author(post.author_id),
            title: post.title,
            body: post.body,
            tags: post.tags,
            replies_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<()> {
        self.posts.lock().unwrap().retain(|p| p.id != id);
        self.replies.lock().unwrap().retain(|r| r.post_id != id);
        Ok(())
    }

    async fn list_replies(&self, post_id: Uuid) -> Result<Vec<Reply>> {
        Ok(self.replies.lock().unwrap().iter().filter(|r| r.post_id == post_id).cloned().collect())
    }

    async fn create_reply(&self, reply: NewReply) -> Result<Reply> {
        let author = self.author(reply.author_id);
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .iter_mut()
            .find(|p| p.id == reply.post_id)
            .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
        post.replies_count += 1;
        let reply =
            Reply { id: reply.id, post_id: reply.post_id, author, body: reply.body, created_at: OffsetDateTime::now_utc() };
        self.replies.lock().unwrap().push(reply.clone());
        Ok(reply)
    }
}

/// Image host double. Any staged file whose name contains "fail" is rejected.
#[derive(Debug, Default)]
pub struct FakeImageHost {
    uploads: AtomicUsize,
    pub healthy: AtomicBool,
}

impl FakeImageHost {
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, source: ImageSource) -> std::result::Result<String, ImageHostError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        match source {
            ImageSource::File { path, .. } => {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                if name.contains("fail") {
                    return Err(ImageHostError::Rejected("quota exceeded".into()));
                }
                // The staged copy must still exist while its upload runs.
                tokio::fs::metadata(&path).await?;
                Ok(format!("https://images.test/{n}-{name}"))
            }
            ImageSource::Inline { .. } => Ok(format!("https://images.test/inline-{n}")),
        }
    }

    async fn check(&self) -> std::result::Result<(), ImageHostError> {
        if self.healthy.load(Ordering::SeqCst) { Ok(()) } else { Err(ImageHostError::Transport("unreachable".into())) }
    }
}

pub fn setup_tracing() {
    telemetry::init_test_telemetry();
}

pub fn get_test_config() -> Config {
    let mut config = Config::try_parse_from([
        "agora-server",
        "--database-url",
        "postgres://unused@localhost/agora",
        "--jwt-secret",
        "test_secret",
    ])
    .unwrap();

    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.rate_limit.per_second = 10_000;
    config.rate_limit.burst = 10_000;
    config.rate_limit.auth_per_second = 10_000;
    config.rate_limit.auth_burst = 10_000;
    config.uploads.dir = std::env::temp_dir().join(format!("agora-test-{}", Uuid::new_v4()));
    config.image_host.upload_timeout_secs = 2;
    config
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug)]
pub struct TestApp {
    pub api_url: String,
    pub mgmt_url: String,
    pub ws_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub messages: Arc<MemoryMessages>,
    pub images: Arc<FakeImageHost>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let messages = Arc::new(MemoryMessages::default());
        let users = Arc::new(MemoryUsers::default());
        let forum = Arc::new(MemoryForum { users: Arc::clone(&users), posts: Mutex::default(), replies: Mutex::default() });
        let images = Arc::new(FakeImageHost { healthy: AtomicBool::new(true), ..Default::default() });

        let app = AppBuilder::new(config.clone())
            .with_stores(Arc::clone(&messages) as Arc<dyn MessageStore>, users, forum)
            .with_image_host(Arc::clone(&images) as Arc<dyn ImageHost>)
            .build()
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app_router = agora_server::api::app_router(config.clone(), app.services, shutdown_rx.clone());
        let mgmt_router = agora_server::api::mgmt_router(MgmtState { health_service: app.health_service });

        let api_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            api_url: format!("http://{api_addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            ws_url: format!("ws://{api_addr}/api/gateway"),
            client: reqwest::Client::new(),
            config,
            messages,
            images,
            shutdown_tx,
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.config.uploads.dir.clone()
    }

    pub fn staged_file_count(&self) -> usize {
        std::fs::read_dir(self.upload_dir()).map(Iterator::count).unwrap_or(0)
    }

    pub async fn register_user(&self, name: &str) -> TestUser {
        let resp = self
            .client
            .post(format!("{}/api/auth/signup", self.api_url))
            .json(&json!({ "email": format!("{name}@test.io"), "fullName": name, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED, "signup failed for {name}");

        let body: Value = resp.json().await.unwrap();
        TestUser {
            user_id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn send_text(&self, token: &str, recipient: Uuid, text: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/messages/{recipient}", self.api_url))
            .bearer_auth(token)
            .json(&json!({ "text": text }))
            .send()
            .await
            .unwrap()
    }

    pub async fn send_form(&self, token: &str, recipient: Uuid, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(format!("{}/api/messages/{recipient}", self.api_url))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn history(&self, token: &str, other: Uuid) -> Vec<Value> {
        let resp = self
            .client
            .get(format!("{}/api/messages/{other}", self.api_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    pub async fn connect_ws(&self, token: &str) -> TestWsClient {
        let (stream, _) =
            tokio_tungstenite::connect_async(format!("{}?token={token}", self.ws_url)).await.expect("Failed to connect WS");
        TestWsClient { stream }
    }
}

pub fn file_part(name: &str, media_type: &str, bytes: Vec<u8>) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes).file_name(name.to_string()).mime_str(media_type).unwrap()
}

#[derive(Debug)]
pub struct TestWsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    /// Next JSON event frame, skipping control frames.
    pub async fn receive_event_timeout(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let msg = tokio::time::timeout_at(deadline, self.stream.next()).await.ok()??.ok()?;
            match msg {
                WsMessage::Text(text) => return serde_json::from_str(text.as_str()).ok(),
                WsMessage::Close(_) => return None,
                _ => {}
            }
        }
    }

    pub async fn receive_event(&mut self) -> Option<Value> {
        self.receive_event_timeout(Duration::from_secs(5)).await
    }

    /// Waits for the server to close the session.
    pub async fn expect_closed(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Ok(None | Some(Err(_) | Ok(WsMessage::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
                Err(_) => return false,
            }
        }
    }
}
