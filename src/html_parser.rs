use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use select::document::Document;
use select::node::Node;
use select::predicate::{Name, Text};
use url::Url;

/// Classification of a downloadable asset referenced by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Stylesheet,
    Script,
    Image,
    Audio,
    Video,
    /// A `url(...)` found inside a `<style>` block.
    StyleUrl,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Script => "script",
            ResourceKind::Image => "image",
            ResourceKind::Audio => "audio",
            ResourceKind::Video => "video",
            ResourceKind::StyleUrl => "style-url",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource exactly as it was referenced in the markup.
///
/// Identity is the `(kind, raw)` pair: the same reference under two kinds is
/// two resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceReference {
    pub kind: ResourceKind,
    pub raw: String,
}

impl ResourceReference {
    pub fn new(kind: ResourceKind, raw: impl Into<String>) -> Self {
        Self { kind, raw: raw.into() }
    }
}

/// The pieces of a fetched page the snapshot persists.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub text: String,
    pub resources: BTreeSet<ResourceReference>,
}

/// Elements whose text never renders.
const INVISIBLE_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

fn css_url_regex() -> &'static Regex {
    static CSS_URL: OnceLock<Regex> = OnceLock::new();
    CSS_URL.get_or_init(|| {
        Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s]+))\s*\)"#)
            .expect("css url pattern is valid")
    })
}

/// How far into the body a `<meta>` charset declaration is looked for.
const META_SNIFF_LEN: usize = 4096;

fn meta_charset_regex() -> &'static regex::bytes::Regex {
    static META_CHARSET: OnceLock<regex::bytes::Regex> = OnceLock::new();
    META_CHARSET.get_or_init(|| {
        // Covers both <meta charset=...> and http-equiv content="...; charset=..."
        regex::bytes::Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#)
            .expect("meta charset pattern is valid")
    })
}

/// Finds the encoding a page declares for itself in its first few KiB.
pub fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_SNIFF_LEN)];
    meta_charset_regex()
        .captures(head)
        .and_then(|cap| cap.get(1))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
}

/// Decodes a page body: a BOM wins, then the header charset, then the
/// markup's own `<meta>` declaration, then UTF-8.
pub fn decode_html(body: &[u8], declared_charset: Option<&str>) -> String {
    let encoding = declared_charset
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .or_else(|| sniff_meta_charset(body))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::warn!("page body is not valid {}, some characters were replaced", used.name());
    }
    text.into_owned()
}

#[derive(Clone)]
pub struct HtmlParser {
    base_url: Url,
}

impl HtmlParser {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Parses `html_content` once and pulls out everything the snapshot needs.
    pub fn parse_page(&self, html_content: &str) -> ParsedPage {
        let document = Document::from(html_content);

        ParsedPage {
            title: extract_title(&document),
            text: extract_text(&document),
            resources: self.extract_resources(&document),
        }
    }

    pub fn resolve_url(&self, raw: &str) -> String {
        resolve_reference(raw, &self.base_url)
    }

    /// Collects every stylesheet, script, image, audio/video source and
    /// `<style>`-embedded `url(...)` in the document.
    pub fn extract_resources(&self, document: &Document) -> BTreeSet<ResourceReference> {
        let mut resources = BTreeSet::new();

        // Stylesheets
        for link in document.find(Name("link")) {
            let is_stylesheet = link
                .attr("rel")
                .map(|rel| {
                    rel.split_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                })
                .unwrap_or(false);

            if is_stylesheet {
                insert_attr(&mut resources, ResourceKind::Stylesheet, &link, "href");
            }
        }

        for script in document.find(Name("script")) {
            insert_attr(&mut resources, ResourceKind::Script, &script, "src");
        }

        for img in document.find(Name("img")) {
            insert_attr(&mut resources, ResourceKind::Image, &img, "src");
        }

        // Media sources live on nested <source> elements
        for (element, kind) in [("audio", ResourceKind::Audio), ("video", ResourceKind::Video)] {
            for media in document.find(Name(element)) {
                for source in media.find(Name("source")) {
                    insert_attr(&mut resources, kind, &source, "src");
                }
            }
        }

        let style_content: String = document.find(Name("style")).map(|style| style.text()).collect();
        for css_url in extract_css_urls(&style_content) {
            resources.insert(ResourceReference::new(ResourceKind::StyleUrl, css_url));
        }

        resources
    }
}

fn insert_attr(
    resources: &mut BTreeSet<ResourceReference>,
    kind: ResourceKind,
    node: &Node,
    attr: &str,
) {
    if let Some(value) = node.attr(attr) {
        if !value.is_empty() {
            resources.insert(ResourceReference::new(kind, value));
        }
    }
}

/// Turns a reference found in markup into a fetchable URL.
///
/// Protocol-relative references always get `https:`; absolute http(s)
/// references pass through untouched; anything else is joined onto `base`.
/// Never fails: an unjoinable reference is returned as-is and simply fails to
/// download later.
pub fn resolve_reference(raw: &str, base: &Url) -> String {
    if raw.starts_with("//") {
        return format!("https:{}", raw);
    }

    if has_http_scheme(raw) {
        return raw.to_string();
    }

    match base.join(raw) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::debug!("could not join {:?} onto {}: {}", raw, base, e);
            raw.to_string()
        }
    }
}

fn has_http_scheme(raw: &str) -> bool {
    let lower = raw.get(..8).unwrap_or(raw).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Pulls every `url(...)` target, quoted or not, out of CSS text.
pub fn extract_css_urls(css_content: &str) -> Vec<String> {
    css_url_regex()
        .captures_iter(css_content)
        // Double-quoted, single-quoted or bare value
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3)))
        .map(|m| m.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn extract_title(document: &Document) -> Option<String> {
    document
        .find(Name("title"))
        .next()
        .map(|title| title.text().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Visible text, one trimmed text node per line.
pub fn extract_text(document: &Document) -> String {
    document
        .find(Text)
        .filter(|node| !inside_invisible_element(node))
        .filter_map(|node| node.as_text().map(str::trim))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn inside_invisible_element(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.name().map_or(false, |name| INVISIBLE_ELEMENTS.contains(&name)) {
            return true;
        }
        current = parent.parent();
    }
    false
}
