// Workbook discovery.
//
// Expands glob patterns into an ordered, de-duplicated list of existing files,
// falling back to the conventional checklist file names when nothing matches.
use crate::types::CompanyType;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const QUOTATE_FILE: &str = "QUOTATE-KPI-OSS.xlsx";
pub const NON_QUOTATE_FILE: &str = "NON-QUOTATE-KPI-OSS.xlsx";
const QUOTATE_DIR: &str = "quotate";
const NON_QUOTATE_DIR: &str = "non_quotate";

/// Marker in a file path identifying unlisted companies.
const NON_LISTED_MARKER: &str = "NON";

/// Patterns used when none are configured.
pub fn default_patterns(dataset_dir: &Path) -> Vec<String> {
    if dataset_dir.is_dir() {
        vec![
            dataset_dir.join(QUOTATE_DIR).join("*.xlsx").display().to_string(),
            dataset_dir.join(NON_QUOTATE_DIR).join("*.xlsx").display().to_string(),
        ]
    } else {
        vec!["QUOTATE*.xlsx".to_string(), "*NON-QUOTATE*.xlsx".to_string()]
    }
}

pub fn fallback_files(dataset_dir: &Path) -> Vec<PathBuf> {
    vec![
        dataset_dir.join(QUOTATE_DIR).join(QUOTATE_FILE),
        dataset_dir.join(NON_QUOTATE_DIR).join(NON_QUOTATE_FILE),
        PathBuf::from(QUOTATE_FILE),
        PathBuf::from(NON_QUOTATE_FILE),
    ]
}

/// Resolve workbook paths. Matches of each pattern are sorted; patterns keep
/// their order; the first occurrence of a path wins.
pub fn scan_workbooks(patterns: &[String], dataset_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let entries = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "skipping invalid file pattern");
                continue;
            }
        };
        let mut matched: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(error = %e, "unreadable glob entry");
                    None
                }
            })
            .filter(|p| p.is_file())
            .collect();
        matched.sort();
        debug!(pattern = %pattern, matches = matched.len(), "expanded pattern");
        files.extend(matched);
    }
    if files.is_empty() {
        files = fallback_files(dataset_dir)
            .into_iter()
            .filter(|p| p.is_file())
            .collect();
        if !files.is_empty() {
            debug!(count = files.len(), "using fallback workbook names");
        }
    }
    dedupe_preserving_order(files)
}

fn dedupe_preserving_order(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    files.into_iter().filter(|p| seen.insert(p.clone())).collect()
}

/// Listing status implied by the workbook path.
pub fn company_type_for(path: &Path) -> CompanyType {
    if path.to_string_lossy().to_uppercase().contains(NON_LISTED_MARKER) {
        CompanyType::NonQuotate
    } else {
        CompanyType::Quotate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn sorts_each_pattern_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.xlsx"));
        touch(&dir.path().join("a.xlsx"));
        let all = dir.path().join("*.xlsx").display().to_string();
        let only_a = dir.path().join("a*.xlsx").display().to_string();

        let files = scan_workbooks(&[all, only_a], dir.path());
        assert_eq!(
            files,
            vec![dir.path().join("a.xlsx"), dir.path().join("b.xlsx")]
        );
    }

    #[test]
    fn falls_back_to_conventional_names() {
        let dir = tempfile::tempdir().unwrap();
        let quotate = dir.path().join(QUOTATE_DIR).join(QUOTATE_FILE);
        touch(&quotate);
        let nothing = dir.path().join("missing/*.xlsx").display().to_string();

        let files = scan_workbooks(&[nothing], dir.path());
        assert_eq!(files, vec![quotate]);
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("x.xlsx"));
        let good = dir.path().join("*.xlsx").display().to_string();
        let files = scan_workbooks(&["[".to_string(), good], dir.path());
        assert_eq!(files, vec![dir.path().join("x.xlsx")]);
    }

    #[test]
    fn default_patterns_use_dataset_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = default_patterns(dir.path());
        assert!(patterns[0].ends_with("*.xlsx"));
        assert!(patterns[1].contains(NON_QUOTATE_DIR));
        let missing = default_patterns(&dir.path().join("absent"));
        assert_eq!(missing, vec!["QUOTATE*.xlsx", "*NON-QUOTATE*.xlsx"]);
    }

    #[test]
    fn type_follows_path_marker() {
        assert_eq!(
            company_type_for(Path::new("datasets/non_quotate/2022.xlsx")),
            CompanyType::NonQuotate
        );
        assert_eq!(
            company_type_for(Path::new("QUOTATE-KPI-OSS.xlsx")),
            CompanyType::Quotate
        );
    }
}
