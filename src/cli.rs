use clap::builder::TypedValueParser;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    RunConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_OUTPUT_DIR, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use crate::error::SnapshotError;

#[derive(Parser, Debug)]
#[command(
    name = "page-snapshot",
    about = "A CLI utility to snapshot a single web page and its static resources",
    version,
    long_about = "Fetches one web page, saves its HTML, visible text and metadata, then downloads every stylesheet, script, image, audio and video file it references into a local mirror tree with a download report."
)]
pub struct SnapshotCommand {
    /// The URL of the page to snapshot
    #[arg(required = true, env = "PAGE_SNAPSHOT_URL")]
    pub url: String,

    /// Output directory for the snapshot
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Maximum concurrent resource downloads
    #[arg(
        short = 'c',
        long,
        default_value_t = DEFAULT_MAX_CONCURRENT,
        value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize)
    )]
    pub max_concurrent: usize,

    /// Timeout in seconds for connecting and for each read
    #[arg(
        long,
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// User agent string to use for requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl SnapshotCommand {
    pub fn into_config(self) -> Result<RunConfig, SnapshotError> {
        Ok(RunConfig::new(&self.url, &self.output_dir)?
            .with_max_concurrent(self.max_concurrent)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_user_agent(self.user_agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_args() {
        let args = SnapshotCommand::try_parse_from(&[
            "page-snapshot",
            "https://example.com",
        ]).unwrap();

        assert_eq!(args.url, "https://example.com");
        assert_eq!(args.output_dir, PathBuf::from("scraped_content"));
        assert_eq!(args.max_concurrent, 5);
        assert_eq!(args.timeout, 30);
        assert_eq!(args.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_parse_all_args() {
        let args = SnapshotCommand::try_parse_from(&[
            "page-snapshot",
            "https://example.com",
            "-o", "./output",
            "-c", "8",
            "--timeout", "10",
            "--user-agent", "SnapshotBot/1.0",
        ]).unwrap();

        assert_eq!(args.output_dir, PathBuf::from("./output"));
        assert_eq!(args.max_concurrent, 8);
        assert_eq!(args.timeout, 10);
        assert_eq!(args.user_agent, "SnapshotBot/1.0");
    }

    #[test]
    fn test_parse_invalid_concurrent() {
        let result = SnapshotCommand::try_parse_from(&[
            "page-snapshot",
            "https://example.com",
            "-c", "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_timeout() {
        let result = SnapshotCommand::try_parse_from(&[
            "page-snapshot",
            "https://example.com",
            "--timeout", "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_config() {
        let config = SnapshotCommand::try_parse_from(&[
            "page-snapshot",
            "https://example.com/news/",
            "-o", "snap",
            "-c", "2",
            "--timeout", "7",
        ])
        .unwrap()
        .into_config()
        .unwrap();

        assert_eq!(config.seed_url.as_str(), "https://example.com/news/");
        assert_eq!(config.output_dir, PathBuf::from("snap"));
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_into_config_rejects_bad_url() {
        let result = SnapshotCommand::try_parse_from(&["page-snapshot", "::nope::"])
            .unwrap()
            .into_config();
        assert!(result.is_err());
    }
}
