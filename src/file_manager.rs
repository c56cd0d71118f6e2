use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::SnapshotError;
use crate::html_parser::ResourceKind;

/// Stand-in base used only to split relative references into a path.
const PLACEHOLDER_BASE: &str = "http://placeholder.invalid/";

fn placeholder_base() -> &'static Url {
    static BASE: OnceLock<Url> = OnceLock::new();
    BASE.get_or_init(|| Url::parse(PLACEHOLDER_BASE).expect("placeholder base is a valid URL"))
}

#[derive(Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    /// Creates the output directory if needed; an existing one is reused as-is.
    pub fn new(base_dir: &Path) -> Result<Self, SnapshotError> {
        let base_dir = base_dir.to_path_buf();
        fs::create_dir_all(&base_dir).map_err(|source| SnapshotError::Filesystem {
            path: base_dir.clone(),
            source,
        })?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes a UTF-8 artifact directly under the output directory.
    pub fn save_text(&self, file_name: &str, content: &str) -> Result<PathBuf, SnapshotError> {
        let file_path = self.base_dir.join(file_name);
        fs::write(&file_path, content).map_err(|source| SnapshotError::Filesystem {
            path: file_path.clone(),
            source,
        })?;

        tracing::debug!("saved {}", file_path.display());
        Ok(file_path)
    }
}

/// Maps a raw resource reference to its place in the mirror tree.
///
/// Only the URL path matters: host, query and fragment are dropped, so two
/// references that differ only there share a file. Stylesheets and scripts
/// without an extension get `.css` / `.js`.
pub fn map_local_path(kind: ResourceKind, raw: &str, output_dir: &Path) -> PathBuf {
    let url_path = reference_path(raw);

    let mut local_path = output_dir.to_path_buf();
    let mut pushed = false;
    for segment in url_path.split('/') {
        let decoded = percent_decode_str(segment).decode_utf8_lossy();
        if decoded.is_empty() || decoded == "." || decoded == ".." {
            continue;
        }
        local_path.push(decoded.replace(['/', '\\'], "_"));
        pushed = true;
    }

    if !pushed {
        local_path.push("index");
    }

    if local_path.extension().is_none() {
        match kind {
            ResourceKind::Stylesheet => {
                local_path.set_extension("css");
            }
            ResourceKind::Script => {
                local_path.set_extension("js");
            }
            _ => {}
        }
    }

    local_path
}

fn reference_path(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => placeholder_base()
            .join(raw)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn map(kind: ResourceKind, raw: &str) -> PathBuf {
        map_local_path(kind, raw, Path::new("out"))
    }

    #[test]
    fn test_path_mapping() {
        let test_cases = vec![
            (ResourceKind::Image, "/images/logo.png", "out/images/logo.png"),
            (ResourceKind::Image, "images/logo.png", "out/images/logo.png"),
            (ResourceKind::Script, "https://cdn.example.com/lib/app.min.js?v=3", "out/lib/app.min.js"),
            (ResourceKind::Image, "//cdn.example.com/img/a.gif#frag", "out/img/a.gif"),
            (ResourceKind::Video, "/media/my%20clip.mp4", "out/media/my clip.mp4"),
        ];

        for (kind, raw, expected) in test_cases {
            assert_eq!(map(kind, raw), PathBuf::from(expected), "Failed for input: {}", raw);
        }
    }

    #[test]
    fn test_extension_inference() {
        assert_eq!(map(ResourceKind::Stylesheet, "/css/theme"), PathBuf::from("out/css/theme.css"));
        assert_eq!(map(ResourceKind::Script, "/js/bundle?x=1"), PathBuf::from("out/js/bundle.js"));
        assert_eq!(map(ResourceKind::Image, "/img/pixel"), PathBuf::from("out/img/pixel"));
        assert_eq!(map(ResourceKind::StyleUrl, "/fonts/icons"), PathBuf::from("out/fonts/icons"));
        // An existing suffix is never replaced
        assert_eq!(map(ResourceKind::Stylesheet, "/style.php"), PathBuf::from("out/style.php"));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let first = map(ResourceKind::Script, "../lib/x");
        let second = map(ResourceKind::Script, "../lib/x");
        assert_eq!(first, second);
    }

    #[test]
    fn test_paths_stay_inside_output_dir() {
        assert_eq!(map(ResourceKind::Image, "../../etc/passwd"), PathBuf::from("out/etc/passwd"));
        assert_eq!(map(ResourceKind::Image, "/a/%2e%2e/%2e%2e/b.png"), PathBuf::from("out/b.png"));
        assert_eq!(map(ResourceKind::Image, "/x%2Fy.png"), PathBuf::from("out/x_y.png"));
    }

    #[test]
    fn test_empty_path_maps_to_index() {
        assert_eq!(map(ResourceKind::Stylesheet, "https://fonts.example.com"), PathBuf::from("out/index.css"));
        assert_eq!(map(ResourceKind::Image, "/"), PathBuf::from("out/index"));
    }

    #[test]
    fn test_save_text() {
        let temp_dir = tempdir().unwrap();
        let output = temp_dir.path().join("snapshot");
        let file_manager = FileManager::new(&output).unwrap();

        let saved = file_manager.save_text("info.txt", "hello\n").unwrap();

        assert_eq!(saved, output.join("info.txt"));
        assert_eq!(fs::read_to_string(&saved).unwrap(), "hello\n");
    }

    #[test]
    fn test_existing_output_dir_is_reused() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("stale.txt"), "old").unwrap();

        let file_manager = FileManager::new(temp_dir.path()).unwrap();

        assert_eq!(file_manager.base_dir(), temp_dir.path());
        assert!(temp_dir.path().join("stale.txt").exists());
    }
}
