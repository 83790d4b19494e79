//! HTTP recognition client and capture payload encoding.
//!
//! The recognition service is an opaque endpoint: one form-urlencoded
//! POST carrying the captured frame as a JPEG data URL, one JSON reply
//! with success/message/confidence. No client-side timeout is applied
//! to the call; a stalled request keeps the session suspended, which is
//! the documented tradeoff of this flow.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use facegate_core::RecognitionOutcome;
use facegate_hw::Frame;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

/// JPEG quality for the capture payload (lossy, 0.8 of full scale).
const JPEG_QUALITY: u8 = 80;
/// Form field carrying the data URL.
const IMAGE_FIELD: &str = "image_base64";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bad response: {0}")]
    BadResponse(#[from] serde_json::Error),
}

/// A compressed capture payload derived from one frame.
///
/// Built at capture time and dropped after the recognition call
/// resolves; never reused across attempts.
pub struct CapturedImage {
    data_url: String,
}

impl CapturedImage {
    /// Encode a grayscale frame as a JPEG data URL.
    pub fn from_frame(frame: &Frame) -> Result<Self, ClientError> {
        let mut jpeg = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
        encoder.write_image(&frame.data, frame.width, frame.height, ExtendedColorType::L8)?;

        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg));
        Ok(Self { data_url })
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }
}

/// Seam for the remote recognition call, so the session can be driven
/// with a scripted client in tests.
pub trait RecognitionClient {
    fn recognize(
        &self,
        image: &CapturedImage,
    ) -> impl std::future::Future<Output = Result<RecognitionOutcome, ClientError>> + Send;
}

/// Production client: POSTs the payload to the configured endpoint.
pub struct HttpRecognitionClient {
    http: reqwest::Client,
    url: String,
}

impl HttpRecognitionClient {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

impl RecognitionClient for HttpRecognitionClient {
    async fn recognize(&self, image: &CapturedImage) -> Result<RecognitionOutcome, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .form(&[(IMAGE_FIELD, image.as_data_url())])
            .send()
            .await?
            .error_for_status()?;

        // Decode via text so schema problems surface as BadResponse,
        // distinct from transport failures in the logs.
        let body = response.text().await?;
        let outcome: RecognitionOutcome = serde_json::from_str(&body)?;

        tracing::debug!(
            success = outcome.success,
            message = %outcome.message,
            "recognition outcome"
        );
        Ok(outcome)
    }
}
