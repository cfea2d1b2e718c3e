use std::path::{Path, PathBuf};

/// On-disk layout of one case workspace.
///
/// ```text
/// <cases_root>/<case_id>/
///     case.sqlite          relational store
///     case.lock            write-lock file
///     raw/<source>/<run_id>.<ext>   append-only raw exports
/// ```
#[derive(Debug, Clone)]
pub struct CaseLayout {
    case_dir: PathBuf,
}

impl CaseLayout {
    pub fn new(cases_root: impl AsRef<Path>, case_id: &str) -> Self {
        Self {
            case_dir: cases_root.as_ref().join(case_id),
        }
    }

    #[must_use]
    pub fn case_dir(&self) -> &Path {
        &self.case_dir
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.case_dir.join("case.sqlite")
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.case_dir.join("case.lock")
    }

    #[must_use]
    pub fn raw_base(&self) -> PathBuf {
        self.case_dir.join("raw")
    }

    /// Destination for one raw export copy, keyed by run.
    #[must_use]
    pub fn raw_file_path(&self, source_system: &str, run_id: &str, extension: &str) -> PathBuf {
        let file_name = if extension.is_empty() {
            run_id.to_string()
        } else {
            format!("{run_id}.{}", extension.to_ascii_lowercase())
        };
        self.raw_base().join(source_system).join(file_name)
    }

    /// Raw path relative to the case directory, as stored in
    /// `query_runs.raw_path`.
    #[must_use]
    pub fn relative_raw_path(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.case_dir)
            .unwrap_or(absolute)
            .to_string_lossy()
            .replace('\\', "/")
    }
}
