use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use facematch_core::FaceAnalyzer;

use crate::acquire::Acquirer;
use crate::config::Config;
use crate::engine::Comparator;

/// Process-wide state shared by all handlers.
///
/// The analyzer is published once after loading and only read afterwards;
/// everything else is fixed at startup.
pub struct AppState {
    config: Config,
    acquirer: Acquirer,
    analyzer: OnceLock<Arc<dyn FaceAnalyzer>>,
    started: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let acquirer = Acquirer::new(&config)?;
        Ok(Self {
            config,
            acquirer,
            analyzer: OnceLock::new(),
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Make the model available to requests. Returns `false` if one was
    /// already published.
    pub fn publish_analyzer(&self, analyzer: Arc<dyn FaceAnalyzer>) -> bool {
        self.analyzer.set(analyzer).is_ok()
    }

    pub fn is_ready(&self) -> bool {
        self.analyzer.get().is_some()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// A comparator bound to the loaded model, or `None` while loading.
    pub fn comparator(&self) -> Option<Comparator> {
        let analyzer = Arc::clone(self.analyzer.get()?);
        Some(Comparator::new(analyzer, self.acquirer.clone(), self.config.timeouts))
    }
}
