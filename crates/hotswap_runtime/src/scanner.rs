//! Polls a rule repository and hot-swaps newer rule sets into a session.

use hotswap_engine::{RuleCompiler, RuleSetDiff};
use hotswap_foundation::Result;
use tracing::{debug, info};

use crate::repository::{RuleArtifact, RuleRepository};
use crate::session::Session;

/// Result of one scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A newer artifact was applied.
    Updated(RuleSetDiff),
    /// The newest artifact is already applied.
    UpToDate,
    /// The repository holds nothing.
    Empty,
}

/// Applies the newest artifact of a repository to sessions on demand.
///
/// An artifact is applied when its version is higher than the last one
/// applied, or when it carries the same version with different source
/// (a redeploy under an unchanged version marker).
#[derive(Debug)]
pub struct Scanner<R> {
    repository: R,
    applied: Option<u64>,
    applied_source: Option<String>,
}

impl<R: RuleRepository> Scanner<R> {
    /// Creates a scanner that has applied nothing yet.
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            applied: None,
            applied_source: None,
        }
    }

    /// Treats `version` as already applied, whatever its source.
    #[must_use]
    pub fn with_applied_version(mut self, version: u64) -> Self {
        self.applied = Some(version);
        self
    }

    /// The last version applied, if any.
    #[must_use]
    pub fn applied_version(&self) -> Option<u64> {
        self.applied
    }

    /// The underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Checks the repository once and applies a newer artifact.
    ///
    /// # Errors
    /// Returns repository, parse and compile errors, and `SessionClosed`.
    /// On error the session keeps its rule set and the applied version is
    /// unchanged.
    pub fn scan_now(&mut self, session: &mut Session) -> Result<ScanOutcome> {
        let Some(artifact) = self.repository.latest()? else {
            debug!("rule repository is empty");
            return Ok(ScanOutcome::Empty);
        };

        if !self.is_new(&artifact) {
            debug!(version = artifact.version, "rules up to date");
            return Ok(ScanOutcome::UpToDate);
        }

        let rules = RuleCompiler::compile_source(&artifact.source)?.with_version(artifact.version);
        let diff = session.update_rules(rules)?;
        self.applied = Some(artifact.version);
        self.applied_source = Some(artifact.source.clone());

        info!(name = %artifact.name, version = artifact.version, %diff, "applied rule artifact");
        Ok(ScanOutcome::Updated(diff))
    }

    fn is_new(&self, artifact: &RuleArtifact) -> bool {
        match self.applied {
            None => true,
            Some(v) if artifact.version > v => true,
            Some(v) if artifact.version == v => self
                .applied_source
                .as_ref()
                .is_some_and(|source| *source != artifact.source),
            Some(_) => false,
        }
    }
}
