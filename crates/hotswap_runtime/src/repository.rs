//! Versioned rule artifact sources.
//!
//! A [`RuleRepository`] answers one question: what is the newest rule
//! artifact available? The [`Scanner`](crate::Scanner) polls it and applies
//! newer versions to a running session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotswap_foundation::{Error, ErrorKind, Result};
use hotswap_language::{header_version, parse_rules};
use parking_lot::Mutex;
use tracing::{trace, warn};

/// File extension recognized by [`DirectoryRepository`].
pub const RULES_EXTENSION: &str = "rules";

/// A named, versioned piece of rule source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleArtifact {
    /// Artifact name (file name or deployment name)
    pub name: String,
    /// Version marker; higher is newer
    pub version: u64,
    /// Rule source text
    pub source: String,
}

impl RuleArtifact {
    /// Creates an artifact.
    pub fn new(name: impl Into<String>, version: u64, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            source: source.into(),
        }
    }
}

/// A source of rule artifacts.
pub trait RuleRepository {
    /// Returns the newest artifact, or `None` if nothing is deployed.
    ///
    /// # Errors
    /// Returns an error if the repository cannot be read.
    fn latest(&self) -> Result<Option<RuleArtifact>>;
}

// =============================================================================
// Memory Repository
// =============================================================================

/// In-memory repository. Clones share the same deployments.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository {
    artifacts: Arc<Mutex<Vec<RuleArtifact>>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys an artifact.
    pub fn deploy(&self, name: impl Into<String>, version: u64, source: impl Into<String>) {
        let artifact = RuleArtifact::new(name, version, source);
        trace!(name = %artifact.name, version, "artifact deployed");
        self.artifacts.lock().push(artifact);
    }

    /// Number of deployed artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    /// Returns true if nothing is deployed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }
}

impl RuleRepository for MemoryRepository {
    /// Highest version wins; among equal versions, the latest deployment.
    fn latest(&self) -> Result<Option<RuleArtifact>> {
        Ok(self
            .artifacts
            .lock()
            .iter()
            .max_by_key(|a| a.version)
            .cloned())
    }
}

// =============================================================================
// Directory Repository
// =============================================================================

/// Repository backed by `*.rules` files in one directory.
///
/// Each file's version comes from its `ruleset:` header (1 if absent).
#[derive(Clone, Debug)]
pub struct DirectoryRepository {
    dir: PathBuf,
}

impl DirectoryRepository {
    /// Creates a repository over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The watched directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn rule_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to read directory '{}': {e}",
                self.dir.display()
            )))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == RULES_EXTENSION)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Reads a rule file and returns it as an artifact versioned by its header.
///
/// # Errors
/// Returns an `IoError` if the file cannot be read, or the parse error.
pub fn read_artifact(path: &Path) -> Result<RuleArtifact> {
    let source = fs::read_to_string(path).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to read file '{}': {e}",
            path.display()
        )))
    })?;
    let version = parse_rules(&source)?.version();
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(RuleArtifact::new(name, version, source))
}

impl RuleRepository for DirectoryRepository {
    /// Highest header version wins; ties go to the last file name in order.
    ///
    /// A file that fails to parse is skipped when its header shows it is
    /// older than the winner. It is an error when it would have won, or
    /// when its version cannot be read at all.
    fn latest(&self) -> Result<Option<RuleArtifact>> {
        let mut best: Option<(usize, RuleArtifact)> = None;
        let mut broken: Vec<(usize, Option<u64>, Error)> = Vec::new();

        for (index, path) in self.rule_files()?.into_iter().enumerate() {
            match read_artifact(&path) {
                Ok(artifact) => {
                    trace!(name = %artifact.name, version = artifact.version, "found rule file");
                    if best.as_ref().is_none_or(|(_, b)| artifact.version >= b.version) {
                        best = Some((index, artifact));
                    }
                }
                Err(e) if matches!(e.kind, ErrorKind::IoError(_)) => return Err(e),
                Err(e) => {
                    let version = fs::read_to_string(&path)
                        .ok()
                        .and_then(|source| header_version(&source));
                    broken.push((index, version, e));
                }
            }
        }

        for (index, version, error) in broken {
            let stale = match (&best, version) {
                (Some((best_index, b)), Some(v)) => (v, index) < (b.version, *best_index),
                _ => false,
            };
            if !stale {
                return Err(error);
            }
            warn!(%error, ?version, "skipping stale rule file");
        }

        Ok(best.map(|(_, artifact)| artifact))
    }
}
