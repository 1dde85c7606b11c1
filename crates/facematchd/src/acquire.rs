//! Image acquisition: remote fetch or inline base64, then decode + normalize.
//!
//! Every stage runs under its own ceiling clipped to the comparison deadline.

use std::fmt;
use std::time::Duration;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use facematch_core::NormalizedImage;
use thiserror::Error;

use crate::config::Config;
use crate::deadline::{Deadline, Expired};

/// Standard alphabet, padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("image fetch failed with HTTP status {0}")]
    FetchStatus(u16),
    #[error("image fetch failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image fetch timed out after {0:?}")]
    FetchTimeout(Duration),
    #[error("remote image exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image decode timed out after {0:?}")]
    DecodeTimeout(Duration),
    /// The comparison deadline, not a stage ceiling, ran out.
    #[error("comparison deadline reached during image acquisition")]
    BudgetExhausted,
}

/// Where one of the two compared images comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    Remote(String),
    /// Base64 payload, optionally prefixed with `data:image/<type>;base64,`.
    Inline(String),
}

impl ImageSource {
    /// How the image is referred to in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            ImageSource::Remote(_) => "URL image",
            ImageSource::Inline(_) => "uploaded image",
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
            ImageSource::Inline(data) => write!(f, "Inline({} chars)", data.len()),
        }
    }
}

/// Fetches and decodes images. Cheap to clone; the HTTP client is shared.
#[derive(Clone)]
pub struct Acquirer {
    client: reqwest::Client,
    fetch_timeout: Duration,
    decode_timeout: Duration,
    max_bytes: usize,
    max_edge: u32,
}

impl Acquirer {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("facematchd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            fetch_timeout: config.timeouts.fetch,
            decode_timeout: config.timeouts.decode,
            max_bytes: config.max_body_bytes,
            max_edge: config.max_image_edge,
        })
    }

    /// Obtain a normalized image from `source` within `deadline`.
    pub async fn acquire(
        &self,
        source: &ImageSource,
        deadline: &Deadline,
    ) -> Result<NormalizedImage, AcquireError> {
        let bytes = match source {
            ImageSource::Remote(url) => self.fetch(url, deadline).await?,
            ImageSource::Inline(data) => decode_inline(data)?,
        };

        let max_edge = self.max_edge;
        self.decode_with(deadline, move || decode_bytes(&bytes, max_edge))
            .await
    }

    async fn fetch(&self, url: &str, deadline: &Deadline) -> Result<Vec<u8>, AcquireError> {
        let request = async {
            let mut response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(AcquireError::FetchStatus(status.as_u16()));
            }

            let limit = self.max_bytes;
            if response.content_length().is_some_and(|len| len > limit as u64) {
                return Err(AcquireError::TooLarge { limit });
            }

            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if body.len() + chunk.len() > limit {
                    return Err(AcquireError::TooLarge { limit });
                }
                body.extend_from_slice(&chunk);
            }
            Ok::<_, AcquireError>(body)
        };

        let body = match deadline.stage(self.fetch_timeout, request).await {
            Ok(result) => result?,
            Err(Expired::Stage) => return Err(AcquireError::FetchTimeout(self.fetch_timeout)),
            Err(Expired::Overall) => return Err(AcquireError::BudgetExhausted),
        };

        tracing::debug!(url, bytes = body.len(), "fetched remote image");
        Ok(body)
    }

    /// Run a decode job on the blocking pool under the decode ceiling.
    ///
    /// On timeout the job is detached, not awaited; its buffers are freed when
    /// it finishes and its result is dropped.
    async fn decode_with<F>(&self, deadline: &Deadline, job: F) -> Result<NormalizedImage, AcquireError>
    where
        F: FnOnce() -> Result<NormalizedImage, AcquireError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(job);
        match deadline.stage(self.decode_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AcquireError::Decode(format!("decoder task failed: {join_err}"))),
            Err(Expired::Stage) => Err(AcquireError::DecodeTimeout(self.decode_timeout)),
            Err(Expired::Overall) => Err(AcquireError::BudgetExhausted),
        }
    }
}

/// Turn an inline payload into raw image bytes.
pub fn decode_inline(data: &str) -> Result<Vec<u8>, AcquireError> {
    let payload: String = strip_data_url(data.trim())
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = LENIENT_BASE64
        .decode(payload.as_bytes())
        .map_err(|e| AcquireError::Decode(format!("invalid base64 payload: {e}")))?;

    if bytes.is_empty() {
        return Err(AcquireError::Decode("empty image payload".into()));
    }
    Ok(bytes)
}

/// Strip a `data:image/<type>;base64,` header if present.
fn strip_data_url(data: &str) -> &str {
    data.strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .filter(|(kind, _)| {
            !kind.is_empty()
                && kind
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
        .map_or(data, |(_, payload)| payload)
}

fn decode_bytes(bytes: &[u8], max_edge: u32) -> Result<NormalizedImage, AcquireError> {
    let image = image::load_from_memory(bytes).map_err(|e| AcquireError::Decode(e.to_string()))?;
    Ok(NormalizedImage::fit(image, max_edge))
}
