//! Repository-tree marker scanning: walk a directory tree, excluding
//! vendor/build output, and collect `TODO|FIXME|HACK|NOTE:` comments.

use std::path::Path;

use grep_matcher::Matcher;
use grep_regex::RegexMatcher;
use grep_searcher::Searcher;
use grep_searcher::sinks::UTF8;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;

const DEFAULT_EXCLUDES: &[&str] = &["node_modules", ".git", "target", "dist", "build", ".next", "vendor"];

const MARKER_PATTERN: &str = r"(?i)\b(TODO|FIXME|HACK|NOTE)\b:?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarkerKind {
    Todo,
    Fixme,
    Hack,
    Note,
}

impl MarkerKind {
    fn parse(word: &str) -> Option<Self> {
        match word.to_uppercase().as_str() {
            "TODO" => Some(MarkerKind::Todo),
            "FIXME" => Some(MarkerKind::Fixme),
            "HACK" => Some(MarkerKind::Hack),
            "NOTE" => Some(MarkerKind::Note),
            _ => None,
        }
    }
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarkerKind::Todo => "TODO",
            MarkerKind::Fixme => "FIXME",
            MarkerKind::Hack => "HACK",
            MarkerKind::Note => "NOTE",
        };
        write!(f, "{s}")
    }
}

/// One marker comment found in a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    pub kind: MarkerKind,
    /// Path relative to the scan root.
    pub file: String,
    /// 1-based line number.
    pub line: u64,
    pub text: String,
}

fn is_excluded(entry: &DirEntry, extra_excludes: &[String]) -> bool {
    let name = entry.file_name().to_string_lossy();
    DEFAULT_EXCLUDES.contains(&name.as_ref()) || extra_excludes.iter().any(|e| e == name.as_ref())
}

/// Walk `root`, skipping `DEFAULT_EXCLUDES` and `extra_excludes`, and
/// collect every marker comment in text files, sorted by file then line.
pub fn scan_markers(root: impl AsRef<Path>, extra_excludes: &[String]) -> Result<Vec<Marker>, ScanError> {
    let root = root.as_ref();
    let matcher = RegexMatcher::new(MARKER_PATTERN).map_err(|e| ScanError::Pattern(e.to_string()))?;
    let mut markers = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|e| !is_excluded(e, extra_excludes));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "scan_markers: skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");

        let mut file_markers = Vec::new();
        let result = Searcher::new().search_path(
            &matcher,
            path,
            UTF8(|line_number, line| {
                if let Some(captures) = find_marker_word(&matcher, line)
                    && let Some(kind) = MarkerKind::parse(&captures)
                {
                    file_markers.push(Marker {
                        kind,
                        file: relative.clone(),
                        line: line_number,
                        text: line.trim().to_string(),
                    });
                }
                Ok(true)
            }),
        );

        match result {
            Ok(()) => markers.extend(file_markers),
            Err(e) => debug!(?path, error = %e, "scan_markers: skipping binary or unreadable file"),
        }
    }

    markers.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    Ok(markers)
}

fn find_marker_word(matcher: &RegexMatcher, line: &str) -> Option<String> {
    let found = matcher.find(line.as_bytes()).ok().flatten()?;
    let word = &line[found.start()..found.end()];
    Some(word.trim_end_matches(':').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_markers_across_multiple_files_sorted_by_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.rs"), "// TODO: fix this\nfn ok() {}\n").unwrap();
        fs::write(dir.path().join("a.rs"), "fn x() {}\n// FIXME: broken\n").unwrap();

        let markers = scan_markers(dir.path(), &[]).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].file, "a.rs");
        assert_eq!(markers[0].kind, MarkerKind::Fixme);
        assert_eq!(markers[1].file, "b.rs");
        assert_eq!(markers[1].kind, MarkerKind::Todo);
    }

    #[test]
    fn excluded_directories_are_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules").join("vendor.js"), "// TODO: never see this\n").unwrap();
        fs::write(dir.path().join("main.rs"), "// HACK: workaround\n").unwrap();

        let markers = scan_markers(dir.path(), &[]).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].file, "main.rs");
    }

    #[test]
    fn extra_excludes_are_honored() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("generated")).unwrap();
        fs::write(dir.path().join("generated").join("g.rs"), "// NOTE: skip me\n").unwrap();

        let markers = scan_markers(dir.path(), &["generated".to_string()]).unwrap();
        assert!(markers.is_empty());
    }
}
