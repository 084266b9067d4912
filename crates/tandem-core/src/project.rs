//! Project structure analysis: architecture detection and a completion estimate.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory layouts recognized as known architectures, in detection order.
const ARCHITECTURE_RULES: [(&str, [&str; 3]); 2] = [
    ("clean_architecture", ["core", "infra", "ui"]),
    ("mvc", ["models", "views", "controllers"]),
];

pub const UNKNOWN_ARCHITECTURE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionReport {
    /// Architecture the estimate is measured against
    pub architecture: String,
    /// Share of that architecture's top-level directories present, 0-100
    pub completion: f64,
    pub missing_components: Vec<String>,
    pub file_count: usize,
}

pub struct ProjectAnalyzer {
    root: PathBuf,
}

impl ProjectAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First architecture whose expected directories all exist.
    pub fn detect_architecture(&self) -> String {
        if !self.root.is_dir() {
            warn!("Project directory {} does not exist", self.root.display());
            return UNKNOWN_ARCHITECTURE.to_string();
        }

        ARCHITECTURE_RULES
            .iter()
            .find(|(_, dirs)| dirs.iter().all(|d| self.root.join(d).is_dir()))
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| UNKNOWN_ARCHITECTURE.to_string())
    }

    /// Completion measured against the architecture the project most
    /// resembles (ties go to the earlier rule).
    pub fn calculate_completion(&self) -> CompletionReport {
        if !self.root.is_dir() {
            warn!("Project directory {} does not exist", self.root.display());
            return CompletionReport {
                architecture: UNKNOWN_ARCHITECTURE.to_string(),
                completion: 0.0,
                missing_components: Vec::new(),
                file_count: 0,
            };
        }

        let file_count = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();

        let mut best: Option<(&str, Vec<String>, usize)> = None;
        for (name, dirs) in ARCHITECTURE_RULES.iter() {
            let missing: Vec<String> = dirs
                .iter()
                .filter(|d| !self.root.join(d).is_dir())
                .map(|d| d.to_string())
                .collect();
            let present = dirs.len() - missing.len();
            let better = match &best {
                Some((_, _, best_present)) => present > *best_present,
                None => true,
            };
            if better {
                best = Some((*name, missing, present));
            }
        }

        let Some((name, missing_components, present)) = best else {
            return CompletionReport {
                architecture: UNKNOWN_ARCHITECTURE.to_string(),
                completion: 0.0,
                missing_components: Vec::new(),
                file_count,
            };
        };

        let expected = present + missing_components.len();
        let completion = (present as f64 / expected as f64 * 10000.0).round() / 100.0;
        debug!("{}: {}% of {} ({} files)", self.root.display(), completion, name, file_count);

        CompletionReport {
            architecture: name.to_string(),
            completion,
            missing_components,
            file_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_project_directory() {
        let dir = TempDir::new().unwrap();
        let analyzer = ProjectAnalyzer::new(dir.path().join("absent"));

        assert_eq!(analyzer.detect_architecture(), "unknown");
        let report = analyzer.calculate_completion();
        assert_eq!(report.completion, 0.0);
        assert!(report.missing_components.is_empty());
    }

    #[test]
    fn test_detects_mvc() {
        let dir = TempDir::new().unwrap();
        for d in ["models", "views", "controllers"] {
            fs::create_dir(dir.path().join(d)).unwrap();
        }
        fs::write(dir.path().join("models/user.py"), "").unwrap();

        let analyzer = ProjectAnalyzer::new(dir.path());
        assert_eq!(analyzer.detect_architecture(), "mvc");

        let report = analyzer.calculate_completion();
        assert_eq!(report.architecture, "mvc");
        assert_eq!(report.completion, 100.0);
        assert_eq!(report.file_count, 1);
    }

    #[test]
    fn test_partial_clean_architecture() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("core")).unwrap();

        let analyzer = ProjectAnalyzer::new(dir.path());
        assert_eq!(analyzer.detect_architecture(), "unknown");

        let report = analyzer.calculate_completion();
        assert_eq!(report.architecture, "clean_architecture");
        assert_eq!(report.completion, 33.33);
        assert_eq!(report.missing_components, vec!["infra".to_string(), "ui".to_string()]);
    }
}
