use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use facematch_core::DetectionConfig;

/// Time budgets for one comparison and the connection carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Remote fetch: connect plus full body transfer.
    pub fetch: Duration,
    /// Decoding one image.
    pub decode: Duration,
    /// Both detections, measured from when detection starts.
    pub detection: Duration,
    /// Whole comparison, measured from entry.
    pub comparison: Duration,
    /// Whole HTTP request, as seen by the client.
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(15),
            decode: Duration::from_secs(5),
            detection: Duration::from_secs(20),
            comparison: Duration::from_secs(25),
            request: Duration::from_secs(30),
        }
    }
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Ceiling for request bodies and fetched remote images.
    pub max_body_bytes: usize,
    /// Longer-edge cap applied to every decoded image.
    pub max_image_edge: u32,
    pub detection: DetectionConfig,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 4000,
            model_dir: facematch_core::default_model_dir(),
            max_body_bytes: 10 * 1024 * 1024,
            max_image_edge: facematch_core::normalize::DEFAULT_MAX_EDGE,
            detection: DetectionConfig::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Load configuration from `FACEMATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let t = defaults.timeouts;

        let port = std::env::var("FACEMATCH_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            bind_addr: env_parse("FACEMATCH_BIND_ADDR", defaults.bind_addr),
            port,
            model_dir: std::env::var("FACEMATCH_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            max_body_bytes: env_parse("FACEMATCH_MAX_BODY_BYTES", defaults.max_body_bytes),
            max_image_edge: env_parse("FACEMATCH_MAX_IMAGE_EDGE", defaults.max_image_edge),
            detection: DetectionConfig {
                input_size: env_parse("FACEMATCH_DETECTOR_INPUT_SIZE", defaults.detection.input_size),
                score_threshold: env_parse(
                    "FACEMATCH_DETECTOR_SCORE_THRESHOLD",
                    defaults.detection.score_threshold,
                ),
            },
            timeouts: Timeouts {
                fetch: env_millis("FACEMATCH_FETCH_TIMEOUT_MS", t.fetch),
                decode: env_millis("FACEMATCH_DECODE_TIMEOUT_MS", t.decode),
                detection: env_millis("FACEMATCH_DETECTION_TIMEOUT_MS", t.detection),
                comparison: env_millis("FACEMATCH_COMPARISON_TIMEOUT_MS", t.comparison),
                request: env_millis("FACEMATCH_REQUEST_TIMEOUT_MS", t.request),
            },
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
