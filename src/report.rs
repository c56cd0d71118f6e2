use std::fmt::Write;

use crate::downloader::DownloadResults;

pub const REPORT_FILE: &str = "download_report.txt";

/// Final tally of a download batch, rendered into `download_report.txt`.
#[derive(Debug)]
pub struct SnapshotReport {
    pub total: usize,
    pub results: DownloadResults,
}

impl SnapshotReport {
    pub fn new(total: usize, results: DownloadResults) -> Self {
        Self { total, results }
    }

    pub fn succeeded(&self) -> usize {
        self.results.succeeded.len()
    }

    pub fn failed(&self) -> usize {
        self.results.failed.len()
    }

    pub fn render(&self) -> String {
        let mut report = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(report, "Resource download report");
        let _ = writeln!(report, "Total resources: {}", self.total);
        let _ = writeln!(report, "Succeeded: {}", self.succeeded());
        let _ = writeln!(report, "Failed: {}", self.failed());

        if !self.results.succeeded.is_empty() {
            let _ = writeln!(report, "\nDownloaded files:");
            for target in &self.results.succeeded {
                let _ = writeln!(
                    report,
                    "  [{}] {} -> {}",
                    target.reference.kind,
                    target.reference.raw,
                    target.local_path.display()
                );
            }
        }

        if !self.results.failed.is_empty() {
            let _ = writeln!(report, "\nFailed downloads:");
            for (target, _) in &self.results.failed {
                let _ = writeln!(
                    report,
                    "  [{}] {} ({})",
                    target.reference.kind, target.reference.raw, target.full_url
                );
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::ResolvedTarget;
    use crate::error::DownloadError;
    use crate::html_parser::{ResourceKind, ResourceReference};
    use std::path::PathBuf;

    fn target(kind: ResourceKind, raw: &str, url: &str, path: &str) -> ResolvedTarget {
        ResolvedTarget {
            reference: ResourceReference::new(kind, raw),
            full_url: url.to_string(),
            local_path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_render_successes_and_failures() {
        let results = DownloadResults {
            succeeded: vec![target(
                ResourceKind::Stylesheet,
                "/a.css",
                "https://example.com/a.css",
                "out/a.css",
            )],
            failed: vec![(
                target(ResourceKind::Image, "b.png", "https://example.com/b.png", "out/b.png"),
                DownloadError::Timeout {
                    url: "https://example.com/b.png".to_string(),
                    secs: 30,
                },
            )],
        };

        let report = SnapshotReport::new(2, results);

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.render(),
            "Resource download report\n\
             Total resources: 2\n\
             Succeeded: 1\n\
             Failed: 1\n\
             \n\
             Downloaded files:\n  [stylesheet] /a.css -> out/a.css\n\
             \n\
             Failed downloads:\n  [image] b.png (https://example.com/b.png)\n"
        );
    }

    #[test]
    fn test_render_without_failures_omits_section() {
        let results = DownloadResults {
            succeeded: vec![target(ResourceKind::Script, "x.js", "https://e.com/x.js", "out/x.js")],
            failed: Vec::new(),
        };

        let rendered = SnapshotReport::new(1, results).render();

        assert!(rendered.contains("Failed: 0"));
        assert!(!rendered.contains("Failed downloads"));
    }
}
