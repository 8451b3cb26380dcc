use crate::common::{AttendanceError, Result, ServiceConfig};
use crate::core::orchestrator::AttendanceEvent;
use crate::service::protocol::{VerificationResult, VerifyResponse};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Port to the remote face recognition service: one captured JPEG in, one
/// structured verification result out. The orchestrator only ever holds one
/// call open at a time.
#[async_trait]
pub trait VerificationClient: Send + Sync {
    async fn verify(&self, image_jpeg: Vec<u8>) -> Result<VerificationResult>;
}

/// HTTP implementation talking to the verification backend.
pub struct HttpVerificationClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpVerificationClient {
    pub fn new(mut config: ServiceConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AttendanceError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpVerificationClient { client, config })
    }

    /// Report an accepted attendance event to the attendance service.
    ///
    /// This is the external reporting collaborator's interface; failures
    /// here never affect the capture loop itself.
    pub async fn record_attendance(&self, event: &AttendanceEvent) -> Result<()> {
        let body = serde_json::json!({
            "user_id": event.employee_id,
            "company_id": self.config.company_id,
            "device_id": self.config.device_id,
            "attendance_type": event.kind,
            "confidence": event.confidence,
        });

        let url = format!("{}/api/v1/attendance/", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.auth_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttendanceError::Transport(format!("Attendance request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AttendanceError::Transport(format!(
                "Attendance service returned {}",
                response.status()
            )));
        }

        debug!(employee = %event.employee_id, "attendance event reported");
        Ok(())
    }
}

#[async_trait]
impl VerificationClient for HttpVerificationClient {
    async fn verify(&self, image_jpeg: Vec<u8>) -> Result<VerificationResult> {
        let part = reqwest::multipart::Part::bytes(image_jpeg)
            .file_name("capture.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| AttendanceError::Transport(format!("Invalid image part: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("company_id", self.config.company_id.clone())
            .text("device_id", self.config.device_id.clone())
            .text("search_mode", self.config.search_mode.clone())
            .text("top_k", self.config.top_k.to_string());

        let url = format!("{}/api/v1/face/verify/upload", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.auth_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AttendanceError::Transport(format!("Verify request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttendanceError::Transport(format!(
                "Verify endpoint returned {}: {}",
                status, body
            )));
        }

        let envelope: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AttendanceError::Transport(format!("Verify response parse failed: {}", e)))?;

        debug!(code = envelope.code, "verification response received");
        Ok(envelope.into_result())
    }
}
