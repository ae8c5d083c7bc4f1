//! Template store — parses the flat template source into an immutable
//! title → body table.
//!
//! Source text is split on the literal `---` token into blocks. Each block
//! yields at most one template; the header rule is chosen by [`HeaderFormat`].
//! Later blocks overwrite earlier ones with the same title.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use regex::Regex;

use crate::error::RelayError;

/// Block separator in the template source.
pub const SEPARATOR: &str = "---";

/// Header marker used by the decorated source format.
pub const DEFAULT_MARKER: &str = "{Button}";

/// How the first line of a block is turned into a title.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HeaderFormat {
    /// The first line is the title, verbatim apart from trimming.
    #[default]
    Plain,
    /// The first line must start with the marker, optionally followed by `=`,
    /// e.g. `{Button} = Eval Scheduled`. Blocks without the marker are dropped.
    Marker(MarkerHeader),
}

impl HeaderFormat {
    /// Marker format for `marker`, compiled up front so a bad marker fails
    /// start-up instead of loading nothing.
    pub fn marker(marker: &str) -> crate::Result<Self> {
        MarkerHeader::new(marker).map(HeaderFormat::Marker)
    }
}

/// A header marker and its compiled matcher.
#[derive(Debug, Clone)]
pub struct MarkerHeader {
    marker: String,
    matcher: Regex,
}

impl MarkerHeader {
    fn new(marker: &str) -> crate::Result<Self> {
        if marker.trim().is_empty() {
            return Err(invalid_marker("marker format requires a non-empty marker"));
        }
        let pattern = format!(r"^{}\s*=?\s*(.*)$", regex::escape(marker));
        let matcher = Regex::new(&pattern).map_err(|e| invalid_marker(&e.to_string()))?;
        Ok(Self {
            marker: marker.to_string(),
            matcher,
        })
    }
}

impl PartialEq for MarkerHeader {
    fn eq(&self, other: &Self) -> bool {
        self.marker == other.marker
    }
}

impl Eq for MarkerHeader {}

fn invalid_marker(message: &str) -> RelayError {
    RelayError::InvalidConfig("templates.marker".to_string(), message.to_string())
}

/// Immutable table of templates, built once at start-up.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, String>,
}

impl TemplateStore {
    /// Parse template source text. Never fails; unusable blocks are skipped.
    pub fn load(source: &str, format: &HeaderFormat) -> Self {
        let mut templates = HashMap::new();

        for block in source.split(SEPARATOR) {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }

            let parsed = match format {
                HeaderFormat::Plain => parse_plain(block),
                HeaderFormat::Marker(header) => parse_marked(block, &header.matcher),
            };

            if let Some((title, body)) = parsed {
                templates.insert(title, body);
            }
        }

        Self { templates }
    }

    /// Read and parse a template source file.
    ///
    /// A missing file is not an error: the store comes back empty and callers
    /// decide whether to fall back to something else. Any other read failure
    /// is returned.
    pub fn load_path(path: &Path, format: &HeaderFormat) -> crate::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let store = Self::load(&text, format);
                tracing::info!(
                    path = %path.display(),
                    templates = store.len(),
                    "loaded template source"
                );
                Ok(store)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "template source not found, starting empty");
                Ok(Self::default())
            }
            Err(e) => Err(RelayError::TemplateSource(
                path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    /// Raw body for a title.
    pub fn get(&self, title: &str) -> Option<&str> {
        self.templates.get(title).map(String::as_str)
    }

    /// All titles, sorted ascending.
    pub fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self.templates.keys().cloned().collect();
        titles.sort();
        titles
    }

    /// `(title, body)` pairs in title order.
    pub fn iter_sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .templates
            .iter()
            .map(|(t, b)| (t.as_str(), b.as_str()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// First line is the title; the rest, minus leading newlines, is the body.
fn parse_plain(block: &str) -> Option<(String, String)> {
    let mut lines = block.lines();
    let title = lines.next()?.trim();
    if title.is_empty() {
        return None;
    }
    let rest: Vec<&str> = lines.collect();
    let body = rest.join("\n").trim_start_matches('\n').to_string();
    Some((title.to_string(), body))
}

/// Header must match the marker pattern; the body is fully trimmed.
fn parse_marked(block: &str, matcher: &Regex) -> Option<(String, String)> {
    let mut lines = block.lines();
    let header = lines.next()?.trim();
    let title = matcher.captures(header)?.get(1)?.as_str().trim();
    if title.is_empty() {
        return None;
    }
    let rest: Vec<&str> = lines.collect();
    Some((title.to_string(), rest.join("\n").trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn marker() -> HeaderFormat {
        HeaderFormat::marker(DEFAULT_MARKER).unwrap()
    }

    #[test]
    fn test_empty_and_separator_only_sources() {
        for source in ["", "   \n\n", "---", "---\n---\n\n---"] {
            let store = TemplateStore::load(source, &HeaderFormat::Plain);
            assert!(store.is_empty(), "source {:?} should load nothing", source);
        }
    }

    #[test]
    fn test_two_blocks() {
        let store = TemplateStore::load(
            "Eval Scheduled\nSee you on {DAY}.\n---\nFollow-Up Visit\nCall back.\n",
            &HeaderFormat::Plain,
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("Eval Scheduled"), Some("See you on {DAY}."));
        assert_eq!(store.get("Follow-Up Visit"), Some("Call back."));
    }

    #[test]
    fn test_title_trimmed_and_leading_blank_lines_skipped() {
        let store = TemplateStore::load("\n\n   New Patient  \n\n\nWelcome!\nBye", &HeaderFormat::Plain);
        assert_eq!(store.get("New Patient"), Some("Welcome!\nBye"));
    }

    #[test]
    fn test_multiline_body_preserved() {
        let store = TemplateStore::load("T\nline 1\n\nline 3\n---\n", &HeaderFormat::Plain);
        assert_eq!(store.get("T"), Some("line 1\n\nline 3"));
    }

    #[test]
    fn test_title_only_block_has_empty_body() {
        let store = TemplateStore::load("Just A Title\n---\nOther\nx", &HeaderFormat::Plain);
        assert_eq!(store.get("Just A Title"), Some(""));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_title_last_wins() {
        let store = TemplateStore::load("A\nfirst\n---\nB\nb\n---\nA\nsecond", &HeaderFormat::Plain);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("A"), Some("second"));
    }

    #[test]
    fn test_titles_sorted() {
        let store = TemplateStore::load("zeta\n1\n---\nAlpha\n2\n---\nbeta\n3", &HeaderFormat::Plain);
        assert_eq!(store.titles(), vec!["Alpha", "beta", "zeta"]);
        let pairs = store.iter_sorted();
        assert_eq!(pairs[0], ("Alpha", "2"));
        assert_eq!(pairs[2], ("zeta", "1"));
    }

    #[test]
    fn test_marker_format_parses_headers() {
        let source = "{Button} = Eval Scheduled\n\nSee you {DAY}.\n\n---\n{Button}=Follow-Up Visit\nCall back.";
        let store = TemplateStore::load(source, &marker());
        assert_eq!(store.get("Eval Scheduled"), Some("See you {DAY}."));
        assert_eq!(store.get("Follow-Up Visit"), Some("Call back."));
    }

    #[test]
    fn test_marker_format_drops_unmarked_and_empty_titles() {
        let source = "Plain Title\nbody\n---\n{Button} =\nno title\n---\n{Button} Kept\nyes";
        let store = TemplateStore::load(source, &marker());
        assert_eq!(store.titles(), vec!["Kept"]);
    }

    #[test]
    fn test_marker_with_regex_metacharacters() {
        let format = HeaderFormat::marker("[*]").unwrap();
        let store = TemplateStore::load("[*] = Star\nshine", &format);
        assert_eq!(store.get("Star"), Some("shine"));
    }

    #[test]
    fn test_blank_marker_rejected() {
        for marker in ["", "   "] {
            let result = HeaderFormat::marker(marker);
            assert!(
                matches!(result, Err(RelayError::InvalidConfig(field, _)) if field == "templates.marker"),
                "marker {:?} should be rejected",
                marker
            );
        }
    }

    #[test]
    fn test_marker_too_large_to_compile_rejected() {
        let result = HeaderFormat::marker(&"x".repeat(2_000_000));
        assert!(
            matches!(result, Err(RelayError::InvalidConfig(field, _)) if field == "templates.marker")
        );
    }

    #[test]
    fn test_marker_equality_ignores_compiled_form() {
        assert_eq!(marker(), HeaderFormat::marker("{Button}").unwrap());
        assert_ne!(marker(), HeaderFormat::marker("[*]").unwrap());
    }

    #[test]
    fn test_plain_format_keeps_marker_header_verbatim() {
        let store = TemplateStore::load("{Button} = Eval\nbody", &HeaderFormat::Plain);
        assert_eq!(store.get("{Button} = Eval"), Some("body"));
    }

    #[test]
    fn test_load_path_reads_file() {
        let mut temp = NamedTempFile::new().expect("create temp file");
        write!(temp, "Hello\nWorld\n---\nBye\nNow").expect("write to temp file");
        let store = TemplateStore::load_path(temp.path(), &HeaderFormat::Plain).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("Hello"), Some("World"));
    }

    #[test]
    fn test_load_path_missing_file_is_empty() {
        let path = Path::new("/nonexistent/path/templates.txt");
        let store = TemplateStore::load_path(path, &HeaderFormat::Plain).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_path_invalid_utf8_fails() {
        let mut temp = NamedTempFile::new().expect("create temp file");
        temp.write_all(&[0xff, 0xfe, b'\n']).expect("write to temp file");
        let result = TemplateStore::load_path(temp.path(), &HeaderFormat::Plain);
        assert!(matches!(result, Err(RelayError::TemplateSource(_, _))));
    }
}
