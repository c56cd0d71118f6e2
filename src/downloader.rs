use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::*;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use reqwest::{Client, ClientBuilder, Response};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::error::DownloadError;
use crate::file_manager::map_local_path;
use crate::html_parser::{resolve_reference, ResourceReference};

/// Resource bodies are written in chunks of this size.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// A reference paired with where it is fetched from and where it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub reference: ResourceReference,
    pub full_url: String,
    pub local_path: PathBuf,
}

impl ResolvedTarget {
    pub fn resolve(reference: ResourceReference, base_url: &Url, output_dir: &Path) -> Self {
        let full_url = resolve_reference(&reference.raw, base_url);
        let local_path = map_local_path(reference.kind, &reference.raw, output_dir);

        Self {
            reference,
            full_url,
            local_path,
        }
    }
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Success(ResolvedTarget),
    Failure(ResolvedTarget, DownloadError),
}

/// Outcomes of a whole batch, each list in completion order.
#[derive(Debug, Default)]
pub struct DownloadResults {
    pub succeeded: Vec<ResolvedTarget>,
    pub failed: Vec<(ResolvedTarget, DownloadError)>,
}

impl DownloadResults {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    fn record(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Success(target) => self.succeeded.push(target),
            DownloadOutcome::Failure(target, cause) => self.failed.push((target, cause)),
        }
    }
}

/// One GET of one URL into one file.
///
/// Implementations report every problem through the returned `Result`; the
/// coordinator relies on a call never panicking or hanging past its timeout.
pub trait Downloader: Send + Sync {
    fn download(
        &self,
        url: &str,
        local_path: &Path,
    ) -> impl Future<Output = Result<(), DownloadError>> + Send;
}

impl<D: Downloader> Downloader for &D {
    fn download(
        &self,
        url: &str,
        local_path: &Path,
    ) -> impl Future<Output = Result<(), DownloadError>> + Send {
        (**self).download(url, local_path)
    }
}

/// The real downloader: streams a reqwest response to disk.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    timeout: Duration,
}

impl HttpDownloader {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Sends a GET and waits for the response head, rejecting non-2xx statuses.
    pub async fn get(&self, url: &str) -> Result<Response, DownloadError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| self.timeout_error(url))?
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }

    /// Reads a whole response body, applying the timeout to each read.
    pub async fn read_body(&self, url: &str, response: Response) -> Result<Vec<u8>, DownloadError> {
        let mut body = Box::pin(response.bytes_stream());
        let mut buffer = Vec::new();

        while let Some(bytes) = self.next_chunk(url, &mut body).await? {
            buffer.extend_from_slice(&bytes);
        }

        Ok(buffer)
    }

    async fn next_chunk<S, B>(&self, url: &str, body: &mut S) -> Result<Option<B>, DownloadError>
    where
        S: futures::Stream<Item = Result<B, reqwest::Error>> + Unpin,
    {
        tokio::time::timeout(self.timeout, body.next())
            .await
            .map_err(|_| self.timeout_error(url))?
            .transpose()
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })
    }

    fn timeout_error(&self, url: &str) -> DownloadError {
        DownloadError::Timeout {
            url: url.to_string(),
            secs: self.timeout.as_secs(),
        }
    }
}

impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, local_path: &Path) -> Result<(), DownloadError> {
        let io_error = |source| DownloadError::Io {
            path: local_path.to_path_buf(),
            source,
        };

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let response = self.get(url).await?;

        let file = fs::File::create(local_path).await.map_err(io_error)?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut body = Box::pin(response.bytes_stream());

        while let Some(bytes) = self.next_chunk(url, &mut body).await? {
            for piece in bytes.chunks(CHUNK_SIZE) {
                writer.write_all(piece).await.map_err(io_error)?;
            }
        }

        writer.flush().await.map_err(io_error)?;
        Ok(())
    }
}

/// Runs a batch of downloads through a fixed number of concurrent slots.
pub struct DownloadCoordinator<D> {
    downloader: D,
    max_concurrent: usize,
    progress: ProgressBar,
}

impl<D: Downloader> DownloadCoordinator<D> {
    pub fn new(downloader: D, max_concurrent: usize) -> Self {
        Self {
            downloader,
            max_concurrent: max_concurrent.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    /// Advances `progress` by one for every finished download.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn resolve_targets(
        base_url: &Url,
        resources: BTreeSet<ResourceReference>,
        output_dir: &Path,
    ) -> Vec<ResolvedTarget> {
        resources
            .into_iter()
            .map(|reference| ResolvedTarget::resolve(reference, base_url, output_dir))
            .collect()
    }

    /// Downloads every resource and waits for the whole batch.
    ///
    /// Each input yields exactly one outcome. A failure never stops the
    /// remaining downloads from being issued.
    pub async fn download_all(
        &self,
        base_url: &Url,
        resources: BTreeSet<ResourceReference>,
        output_dir: &Path,
    ) -> DownloadResults {
        let targets = Self::resolve_targets(base_url, resources, output_dir);
        self.progress.set_length(targets.len() as u64);

        let downloader = &self.downloader;
        let mut outcomes = stream::iter(targets)
            .map(|target| async move {
                match downloader.download(&target.full_url, &target.local_path).await {
                    Ok(()) => DownloadOutcome::Success(target),
                    Err(cause) => DownloadOutcome::Failure(target, cause),
                }
            })
            .buffer_unordered(self.max_concurrent);

        let mut results = DownloadResults::default();
        while let Some(outcome) = outcomes.next().await {
            self.report_progress(&outcome);
            results.record(outcome);
        }

        self.progress.finish_and_clear();
        results
    }

    fn report_progress(&self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Success(target) => {
                tracing::debug!("downloaded {} -> {}", target.full_url, target.local_path.display());
                self.progress.suspend(|| {
                    println!("✅ Downloaded: {}", target.local_path.display());
                });
            }
            DownloadOutcome::Failure(target, cause) => {
                tracing::warn!("download failed for {}: {}", target.full_url, cause);
                self.progress.suspend(|| {
                    eprintln!("{} {}: {}", "❌ Failed".red(), target.full_url, cause);
                });
            }
        }
        self.progress.inc(1);
    }
}
