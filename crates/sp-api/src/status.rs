use std::collections::BTreeMap;

use sp_core::LoadOutcome;
use tracing::{error, info, warn};

const DEBUG_HINT: &str = "\n > Please enable debug in config for more info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub outcome: LoadOutcome,
    pub level: StatusLevel,
    pub message: String,
}

/// Outcomes of one load pass, grouped by classification.
#[derive(Debug, Clone, Default)]
pub struct LoadStatus {
    logs: BTreeMap<LoadOutcome, Vec<String>>,
}

impl LoadStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: impl Into<String>, outcome: LoadOutcome) {
        self.logs.entry(outcome).or_default().push(item.into());
    }

    pub fn pull(&self, outcome: LoadOutcome) -> &[String] {
        self.logs.get(&outcome).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// One line per non-empty bucket, in classification order.
    pub fn render(&self, debug: bool) -> Vec<StatusLine> {
        LoadOutcome::ALL
            .into_iter()
            .filter_map(|outcome| {
                let items = self.pull(outcome);
                if items.is_empty() {
                    return None;
                }
                let detail = if debug {
                    format!(": [{}]", items.join(", "))
                } else {
                    DEBUG_HINT.to_string()
                };
                let (level, summary) = describe(outcome, items.len());
                Some(StatusLine {
                    outcome,
                    level,
                    message: format!("{}{}", summary, detail),
                })
            })
            .collect()
    }

    pub fn emit(&self, debug: bool) {
        for line in self.render(debug) {
            match line.level {
                StatusLevel::Info => info!(outcome = line.outcome.label(), "{}", line.message),
                StatusLevel::Warn => warn!(outcome = line.outcome.label(), "{}", line.message),
                StatusLevel::Error => error!(outcome = line.outcome.label(), "{}", line.message),
            }
        }
    }
}

pub fn plural(amount: usize) -> &'static str {
    if amount > 1 {
        "s"
    } else {
        ""
    }
}

fn describe(outcome: LoadOutcome, count: usize) -> (StatusLevel, String) {
    let placeholders = format!("{} script placeholder{}", count, plural(count));
    match outcome {
        LoadOutcome::MissingFileSpec => (
            StatusLevel::Warn,
            format!("{} do not have a file specified", placeholders),
        ),
        LoadOutcome::FileCreated => (
            StatusLevel::Info,
            format!(
                "{} file{} created! Add your script to these files and reload to load them",
                count,
                plural(count)
            ),
        ),
        LoadOutcome::FileCreationFailed => (
            StatusLevel::Error,
            format!("{} had a problem creating their script file", placeholders),
        ),
        LoadOutcome::FileEmpty => (
            StatusLevel::Warn,
            format!("{} have empty scripts", placeholders),
        ),
        LoadOutcome::IdentifierInvalid => (
            StatusLevel::Warn,
            format!(
                "{} have an empty identifier or one containing the argument split token",
                placeholders
            ),
        ),
        LoadOutcome::EngineUnspecifiedDefaulted => (
            StatusLevel::Warn,
            format!(
                "{} did not specify a script engine and use the default engine",
                placeholders
            ),
        ),
        LoadOutcome::EngineInvalidDefaulted => (
            StatusLevel::Warn,
            format!(
                "{} have an invalid script engine and will be defaulted to the default engine",
                placeholders
            ),
        ),
        LoadOutcome::EngineResolutionFailed => (
            StatusLevel::Error,
            format!("{} have failed to set a script engine", placeholders),
        ),
        LoadOutcome::DataLoaded => (
            StatusLevel::Info,
            format!("{} have loaded their data", placeholders),
        ),
        LoadOutcome::PlaceholderLoaded => (
            StatusLevel::Info,
            format!("{} have been loaded", placeholders),
        ),
        LoadOutcome::PlaceholderDuplicateRejected => (
            StatusLevel::Warn,
            format!(
                "{} were rejected because their identifier is already registered",
                placeholders
            ),
        ),
    }
}
