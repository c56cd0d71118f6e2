pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod file_manager;
pub mod html_parser;
pub mod logging;
pub mod report;
pub mod snapshot;

// Re-export main types for convenience
pub use cli::SnapshotCommand;
pub use config::RunConfig;
pub use downloader::{
    DownloadCoordinator, DownloadOutcome, DownloadResults, Downloader, HttpDownloader,
    ResolvedTarget,
};
pub use error::{DownloadError, SnapshotError};
pub use file_manager::{map_local_path, FileManager};
pub use html_parser::{resolve_reference, HtmlParser, ResourceKind, ResourceReference};
pub use report::SnapshotReport;
pub use snapshot::{PageSnapshot, SnapshotPhase, SnapshotSummary};
