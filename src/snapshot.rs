use std::fmt;

use chrono::Local;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::CONTENT_TYPE;

use crate::config::RunConfig;
use crate::downloader::{DownloadCoordinator, Downloader, HttpDownloader};
use crate::error::SnapshotError;
use crate::file_manager::FileManager;
use crate::html_parser::{decode_html, HtmlParser, ParsedPage};
use crate::report::{SnapshotReport, REPORT_FILE};

pub const PAGE_FILE: &str = "page.html";
pub const CONTENT_FILE: &str = "content.txt";
pub const INFO_FILE: &str = "info.txt";
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPhase {
    Fetching,
    Parsing,
    PersistingArtifacts,
    ExtractingResources,
    Downloading,
    ReportingDone,
    Failed,
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SnapshotPhase::Fetching => "fetching",
            SnapshotPhase::Parsing => "parsing",
            SnapshotPhase::PersistingArtifacts => "persisting artifacts",
            SnapshotPhase::ExtractingResources => "extracting resources",
            SnapshotPhase::Downloading => "downloading",
            SnapshotPhase::ReportingDone => "reporting",
            SnapshotPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a finished run hands back to its caller.
#[derive(Debug)]
pub struct SnapshotSummary {
    pub title: String,
    pub resources_found: usize,
    /// `None` when the page referenced no resources.
    pub report: Option<SnapshotReport>,
}

/// Drives one snapshot from seed fetch to report.
pub struct PageSnapshot<D = HttpDownloader> {
    config: RunConfig,
    http: HttpDownloader,
    downloader: D,
    file_manager: FileManager,
    phase: SnapshotPhase,
}

impl PageSnapshot<HttpDownloader> {
    pub fn new(config: RunConfig) -> Result<Self, SnapshotError> {
        let http = HttpDownloader::new(&config.user_agent, config.timeout)
            .map_err(SnapshotError::Client)?;
        Self::with_downloader(config, http.clone(), http)
    }
}

impl<D: Downloader> PageSnapshot<D> {
    /// Uses `http` for the seed page and `downloader` for resources.
    pub fn with_downloader(
        config: RunConfig,
        http: HttpDownloader,
        downloader: D,
    ) -> Result<Self, SnapshotError> {
        let file_manager = FileManager::new(&config.output_dir)?;

        Ok(Self {
            config,
            http,
            downloader,
            file_manager,
            phase: SnapshotPhase::Fetching,
        })
    }

    pub fn phase(&self) -> SnapshotPhase {
        self.phase
    }

    fn enter(&mut self, phase: SnapshotPhase) {
        tracing::info!("snapshot phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs every phase in order and ends in `ReportingDone` or `Failed`.
    ///
    /// Only a seed fetch or artifact write error fails the run; individual
    /// resource failures show up in the report.
    pub async fn run(&mut self) -> Result<SnapshotSummary, SnapshotError> {
        let result = self.run_phases().await;
        if let Err(e) = &result {
            tracing::error!("snapshot failed while {}: {}", self.phase, e);
            self.phase = SnapshotPhase::Failed;
        }
        result
    }

    async fn run_phases(&mut self) -> Result<SnapshotSummary, SnapshotError> {
        let seed_url = self.config.seed_url.clone();
        println!("🚀 Starting page snapshot for: {}", seed_url.as_str().blue());
        println!("📁 Output directory: {:?}", self.config.output_dir);

        let body = self.fetch_seed_page().await?;

        self.enter(SnapshotPhase::Parsing);
        let parser = HtmlParser::new(seed_url.clone());
        let page = parser.parse_page(&body);

        self.enter(SnapshotPhase::PersistingArtifacts);
        let title = self.persist_artifacts(&body, &page)?;
        println!("📄 Page saved, title: {}", title.bold());

        self.enter(SnapshotPhase::ExtractingResources);
        let resources = page.resources;
        let resources_found = resources.len();
        println!("🔍 Found {} resource files", resources_found);

        if resources.is_empty() {
            self.enter(SnapshotPhase::ReportingDone);
            return Ok(SnapshotSummary {
                title,
                resources_found,
                report: None,
            });
        }

        self.enter(SnapshotPhase::Downloading);
        println!("⚡ Downloading with up to {} concurrent requests", self.config.max_concurrent);
        let results = {
            let coordinator = DownloadCoordinator::new(&self.downloader, self.config.max_concurrent)
                .with_progress(download_progress_bar(resources_found as u64));
            coordinator
                .download_all(&seed_url, resources, self.file_manager.base_dir())
                .await
        };

        self.enter(SnapshotPhase::ReportingDone);
        let report = SnapshotReport::new(resources_found, results);
        print_summary(&report);
        self.file_manager.save_text(REPORT_FILE, &report.render())?;

        Ok(SnapshotSummary {
            title,
            resources_found,
            report: Some(report),
        })
    }

    async fn fetch_seed_page(&self) -> Result<String, SnapshotError> {
        let url = self.config.seed_url.as_str();
        println!("🌐 Fetching page: {}", url);

        let response = self.http.get(url).await.map_err(SnapshotError::Fetch)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok());
        if let Some(declared) = &content_type {
            if declared.subtype() != mime::HTML {
                tracing::warn!("{} declared content type {}, parsing as HTML anyway", url, declared);
            }
        }
        let charset = content_type
            .as_ref()
            .and_then(|declared| declared.get_param(mime::CHARSET))
            .map(|charset| charset.as_str().to_string());

        let body = self.http.read_body(url, response).await.map_err(SnapshotError::Fetch)?;
        Ok(decode_html(&body, charset.as_deref()))
    }

    fn persist_artifacts(&self, body: &str, page: &ParsedPage) -> Result<String, SnapshotError> {
        self.file_manager.save_text(PAGE_FILE, body)?;
        self.file_manager.save_text(CONTENT_FILE, &page.text)?;

        let title = page.title.clone().unwrap_or_else(|| UNTITLED.to_string());
        let info = format!(
            "Title: {}\nURL: {}\nCaptured at: {}\n",
            title,
            self.config.seed_url,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.file_manager.save_text(INFO_FILE, &info)?;

        Ok(title)
    }
}

fn download_progress_bar(len: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner} [{bar:40}] {pos}/{len} {msg}") {
        progress_bar.set_style(style);
    }
    progress_bar
}

fn print_summary(report: &SnapshotReport) {
    println!("\n📊 Download results:");
    println!("{} {} files", "✅ Succeeded:".green(), report.succeeded());
    if report.failed() > 0 {
        println!("{} {} files", "⚠️  Failed:".yellow(), report.failed());
        for (target, _) in &report.results.failed {
            println!("  - {}: {}", target.reference.kind, target.reference.raw);
        }
    }
}
