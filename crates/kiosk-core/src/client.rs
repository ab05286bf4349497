//! Recognition Client: typed JSON calls to the detection/recognition service.
//!
//! One request per call, no retries. Non-2xx responses and undecodable bodies
//! surface as `ServiceError`.

use crate::error::ServiceError;
use crate::models::{
    DataTemplate, DetectRequest, DetectResponse, FaceDetection, RecognitionResult, RecognizeRequest,
    RegisterRequest, RegisterResponse, ServiceStatus, UserCountResponse, UserListResponse,
    UserSummary,
};
use async_trait::async_trait;
use kiosk_voice::CollectedData;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote face service used by the pipeline.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    async fn get_status(&self) -> Result<ServiceStatus, ServiceError>;

    async fn get_template(&self) -> Result<DataTemplate, ServiceError>;

    async fn detect(&self, image: &str) -> Result<DetectResponse, ServiceError>;

    async fn recognize(
        &self,
        image: &str,
        face: &FaceDetection,
    ) -> Result<RecognitionResult, ServiceError>;

    async fn register(
        &self,
        image: &str,
        face: &FaceDetection,
        data: &CollectedData,
    ) -> Result<RegisterResponse, ServiceError>;

    async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError>;

    async fn user_count(&self) -> Result<u64, ServiceError>;
}

/// HTTP implementation of `RecognitionService`.
#[derive(Debug, Clone)]
pub struct RecognitionClient {
    base_url: String,
    client: reqwest::Client,
}

impl RecognitionClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ServiceError::Transport {
                path: "(client)".to_string(),
                source,
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        debug!("GET {}", path);
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                path: path.to_string(),
                source,
            })?;
        Self::decode(path, res).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        debug!("POST {}", path);
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|source| ServiceError::Transport {
                path: path.to_string(),
                source,
            })?;
        Self::decode(path, res).await
    }

    async fn decode<T: DeserializeOwned>(path: &str, res: reqwest::Response) -> Result<T, ServiceError> {
        let status = res.status();
        let body = res.text().await.map_err(|source| ServiceError::Transport {
            path: path.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: error_message(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| ServiceError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// The service reports failures as `{"error": "..."}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl RecognitionService for RecognitionClient {
    async fn get_status(&self) -> Result<ServiceStatus, ServiceError> {
        self.get_json("/api/status").await
    }

    async fn get_template(&self) -> Result<DataTemplate, ServiceError> {
        self.get_json("/api/template").await
    }

    async fn detect(&self, image: &str) -> Result<DetectResponse, ServiceError> {
        self.post_json("/api/face/detect", &DetectRequest { image })
            .await
    }

    async fn recognize(
        &self,
        image: &str,
        face: &FaceDetection,
    ) -> Result<RecognitionResult, ServiceError> {
        self.post_json("/api/face/recognize", &RecognizeRequest { image, face })
            .await
    }

    async fn register(
        &self,
        image: &str,
        face: &FaceDetection,
        data: &CollectedData,
    ) -> Result<RegisterResponse, ServiceError> {
        let body = RegisterRequest {
            image,
            face,
            user_data: data,
        };
        self.post_json("/api/face/register", &body).await
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError> {
        let res: UserListResponse = self.get_json("/api/user/list").await?;
        Ok(res.users)
    }

    async fn user_count(&self) -> Result<u64, ServiceError> {
        let res: UserCountResponse = self.get_json("/api/user/count").await?;
        Ok(res.count)
    }
}
