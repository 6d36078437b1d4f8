use crate::adapters::image_host::{ImageHost, ImageHostError, ImageSource, extension_for};
use crate::config::ImageHostConfig;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

const KEY_PREFIX: &str = "images";

/// Builds an S3 client from the image host settings.
pub async fn build_client(config: &ImageHostConfig) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.s3_region.clone()));

    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.s3_access_key, &config.s3_secret_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "agora-static",
        ));
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.s3_force_path_style).build();

    Client::from_conf(s3_config)
}

/// Public URL base for objects when none is configured explicitly.
#[must_use]
pub fn default_public_base_url(config: &ImageHostConfig, bucket: &str) -> String {
    match &config.s3_endpoint {
        Some(endpoint) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
        None => format!("https://{bucket}.s3.{}.amazonaws.com", config.s3_region),
    }
}

#[derive(Clone, Debug)]
pub struct S3ImageHost {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageHost {
    #[must_use]
    pub fn new(client: Client, bucket: String, public_base_url: &str) -> Self {
        Self { client, bucket, public_base_url: public_base_url.trim_end_matches('/').to_string() }
    }

    fn object_key(media_type: &str) -> String {
        format!("{KEY_PREFIX}/{}.{}", Uuid::new_v4(), extension_for(media_type))
    }
}

#[async_trait]
impl ImageHost for S3ImageHost {
    #[tracing::instrument(level = "debug", skip(self, source), fields(media_type = %source.media_type()))]
    async fn upload(&self, source: ImageSource) -> Result<String, ImageHostError> {
        let (bytes, media_type) = source.into_bytes().await?;
        let key = Self::object_key(&media_type);
        let len = i64::try_from(bytes.len()).unwrap_or(i64::MAX);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(media_type)
            .content_length(len)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %DisplayErrorContext(&e), key = %key, "S3 put_object failed");
                ImageHostError::Transport(DisplayErrorContext(&e).to_string())
            })?;

        Ok(format!("{}/{key}", self.public_base_url))
    }

    async fn check(&self) -> Result<(), ImageHostError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| ImageHostError::Transport(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
