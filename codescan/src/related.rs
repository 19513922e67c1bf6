//! Related-file gathering: cheap heuristics for populating a CodeGen
//! context's `relatedFiles` list without a full dependency graph.

use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Files likely relevant to editing `target`: siblings in the same
/// directory, and same-stem test files in conventional locations.
/// Returns paths relative to `root`, `target` itself excluded.
pub fn gather_related(root: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<Vec<String>, ScanError> {
    let root = root.as_ref();
    let target = target.as_ref();
    let mut related = Vec::new();

    if let Some(parent) = target.parent() {
        let pattern = root.join(parent).join("*");
        let pattern_str = pattern.to_string_lossy().to_string();
        for entry in glob::glob(&pattern_str).map_err(|e| ScanError::Glob { pattern: pattern_str.clone(), source: e })? {
            let Ok(path) = entry else { continue };
            if !path.is_file() || path == root.join(target) {
                continue;
            }
            related.push(to_relative(root, &path));
        }
    }

    if let Some(stem) = target.file_stem().and_then(|s| s.to_str()) {
        for candidate in test_file_candidates(root, target, stem) {
            if candidate.is_file() && !related.contains(&to_relative(root, &candidate)) {
                related.push(to_relative(root, &candidate));
            }
        }
    }

    related.sort();
    related.dedup();
    Ok(related)
}

fn test_file_candidates(root: &Path, target: &Path, stem: &str) -> Vec<PathBuf> {
    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    let ext = target.extension().and_then(|e| e.to_str()).unwrap_or("rs");
    vec![
        root.join(parent).join(format!("{stem}_test.{ext}")),
        root.join(parent).join(format!("test_{stem}.{ext}")),
        root.join("tests").join(format!("{stem}.{ext}")),
    ]
}

fn to_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn siblings_in_the_same_directory_are_related() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src").join("widget.rs"), "").unwrap();
        fs::write(dir.path().join("src").join("gadget.rs"), "").unwrap();

        let related = gather_related(dir.path(), "src/widget.rs").unwrap();
        assert!(related.contains(&"src/gadget.rs".to_string()));
        assert!(!related.contains(&"src/widget.rs".to_string()));
    }

    #[test]
    fn conventional_test_file_is_picked_up() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src").join("widget.rs"), "").unwrap();
        fs::write(dir.path().join("src").join("widget_test.rs"), "").unwrap();

        let related = gather_related(dir.path(), "src/widget.rs").unwrap();
        assert!(related.contains(&"src/widget_test.rs".to_string()));
    }
}
