use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::SnapshotError;

pub const DEFAULT_OUTPUT_DIR: &str = "scraped_content";
pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Everything a single snapshot run needs to know.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub seed_url: Url,
    pub output_dir: PathBuf,
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl RunConfig {
    /// Builds a config with default settings for `seed_url`.
    pub fn new(seed_url: &str, output_dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let seed_url = Url::parse(seed_url).map_err(|source| SnapshotError::InvalidUrl {
            url: seed_url.to_string(),
            source,
        })?;

        Ok(Self {
            seed_url,
            output_dir: output_dir.as_ref().to_path_buf(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        // A zero-sized pool would never make progress.
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
