//! Scripted scenario replay.
//!
//! A scenario file is TOML:
//!
//! ```toml
//! [session]
//! retroactive = "all-facts"
//!
//! [[phase]]
//! name = "original rules"
//! rules = "original.rules"
//! events = [
//!     { id = "1", timestamp = 0 },
//!     { id = "2", timestamp = 5000, fields = { kind = "login" } },
//! ]
//! expect = { "SimpleTestRule-One" = 2, "SimpleTestRule-Two" = 0 }
//! ```
//!
//! The first phase with `rules` opens the session; later ones hot-swap the
//! rule set. Each event is inserted with `insert_and_advance` and followed
//! by `fire_all_rules`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use hotswap_engine::{RuleCompiler, RuleSet};
use hotswap_foundation::{Duration, Error, ErrorContext, ErrorKind, Event, Result, Value};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::session::Session;

/// An event as written in a scenario file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventSpec {
    /// Event id
    pub id: String,
    /// Timestamp in milliseconds
    pub timestamp: i64,
    /// Payload fields
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl EventSpec {
    /// Builds the event.
    #[must_use]
    pub fn to_event(&self) -> Event {
        self.fields
            .iter()
            .fold(Event::new(self.id.as_str(), self.timestamp), |e, (k, v)| {
                e.with_field(k.as_str(), v.clone())
            })
    }
}

/// One step of a scenario.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Phase {
    /// Display name
    pub name: Option<String>,
    /// Rule file to load, relative to the scenario file
    pub rules: Option<PathBuf>,
    /// Events inserted in order
    pub events: Vec<EventSpec>,
    /// Milliseconds to advance the clock after the events
    pub advance: Option<i64>,
    /// Expected fired count per rule name at the end of the phase
    pub expect: BTreeMap<String, u64>,
}

/// A parsed scenario file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Phases in order
    #[serde(default, rename = "phase")]
    pub phases: Vec<Phase>,
    /// Directory rule paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

/// What one phase produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseReport {
    /// Phase name
    pub name: String,
    /// Active rule set version at the end of the phase
    pub rules_version: u64,
    /// Rules fired during the phase
    pub fired: usize,
    /// Cumulative fired counts at the end of the phase
    pub counts: BTreeMap<String, u64>,
}

/// What a whole scenario produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Per-phase results
    pub phases: Vec<PhaseReport>,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for phase in &self.phases {
            writeln!(
                f,
                "{} (rules v{}): {} fired",
                phase.name, phase.rules_version, phase.fired
            )?;
            for (rule, count) in &phase.counts {
                writeln!(f, "  {rule}: {count}")?;
            }
        }
        Ok(())
    }
}

impl Scenario {
    /// Parses scenario text; rule paths resolve against `base_dir`.
    ///
    /// # Errors
    /// Returns a `SerializationError` for malformed TOML.
    pub fn parse(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut scenario: Self = toml::from_str(text)
            .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))?;
        scenario.base_dir = base_dir.into();
        Ok(scenario)
    }

    /// Reads and parses a scenario file.
    ///
    /// # Errors
    /// Returns an `IoError` or `SerializationError`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to read scenario '{}': {e}",
                path.display()
            )))
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&text, base_dir)
    }

    fn load_rules(&self, relative: &Path) -> Result<RuleSet> {
        let path = self.base_dir.join(relative);
        let source = fs::read_to_string(&path).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to read rules '{}': {e}",
                path.display()
            )))
        })?;
        RuleCompiler::compile_source(&source)
            .map_err(|e| e.with_context(ErrorContext::new().with_source(path.display().to_string())))
    }

    /// Replays every phase in a fresh session.
    ///
    /// # Errors
    /// Returns the first session, rule or I/O error, or `ScenarioMismatch`
    /// when a phase's expectations are not met.
    pub fn run(&self) -> Result<ScenarioReport> {
        let mut session: Option<Session> = None;
        let mut report = ScenarioReport::default();

        for (index, phase) in self.phases.iter().enumerate() {
            let name = phase
                .name
                .clone()
                .unwrap_or_else(|| format!("phase {}", index + 1));
            debug!(phase = %name, "starting phase");

            if let Some(rules_path) = &phase.rules {
                let rules = self.load_rules(rules_path)?;
                match session.as_mut() {
                    Some(s) => {
                        s.update_rules(rules)?;
                    }
                    None => session = Some(Session::open(rules, self.session.clone())),
                }
            }
            let s = session.get_or_insert_with(|| Session::open(RuleSet::empty(), self.session.clone()));

            let mut fired = 0;
            for spec in &phase.events {
                s.insert_and_advance(spec.to_event())?;
                fired += s.fire_all_rules()?;
            }
            if let Some(ms) = phase.advance {
                s.advance(Duration::from_millis(ms))?;
            }
            fired += s.fire_all_rules()?;

            for (rule, &expected) in &phase.expect {
                let actual = s.fired_count(rule)?;
                if actual != expected {
                    return Err(Error::new(ErrorKind::ScenarioMismatch {
                        rule: rule.clone(),
                        expected,
                        actual,
                    })
                    .with_context(ErrorContext::new().with_source(name)));
                }
            }

            info!(phase = %name, fired, "phase complete");
            report.phases.push(PhaseReport {
                name,
                rules_version: s.rule_set()?.version(),
                fired,
                counts: s.fired_counts()?,
            });
        }

        if let Some(mut s) = session {
            s.dispose();
        }
        Ok(report)
    }
}
