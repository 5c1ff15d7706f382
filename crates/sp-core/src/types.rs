use serde::{Deserialize, Serialize};

/// Text returned to the caller whenever a script faults during evaluation.
pub const SCRIPT_ERROR_FALLBACK: &str = "Script error (check console)";

pub const DEFAULT_ARGUMENT_SPLIT: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionSettings {
    pub debug: bool,
    pub argument_split: String,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self {
            debug: false,
            argument_split: DEFAULT_ARGUMENT_SPLIT.to_string(),
        }
    }
}

impl ExpansionSettings {
    /// An underscore separates the identifier from its arguments, so it can
    /// never split arguments. Returns the rejected token when one was replaced.
    pub fn normalize(&mut self) -> Option<String> {
        if self.argument_split.is_empty() || self.argument_split == "_" {
            let rejected = std::mem::replace(
                &mut self.argument_split,
                DEFAULT_ARGUMENT_SPLIT.to_string(),
            );
            return Some(rejected);
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDefinition {
    pub identifier: String,
    pub source: String,
    pub engine: Option<String>,
}

impl ScriptDefinition {
    pub fn new(identifier: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: source.into(),
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn matches_identifier(&self, other: &str) -> bool {
        self.identifier.eq_ignore_ascii_case(other)
    }
}

/// Identity a script evaluates on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub name: String,
    pub unique_id: String,
    pub online: bool,
}

impl Requester {
    pub fn online(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            unique_id: format!("requester:{}", name.to_ascii_lowercase()),
            name,
            online: true,
        }
    }

    pub fn offline(name: impl Into<String>) -> Self {
        Self {
            online: false,
            ..Self::online(name)
        }
    }
}

/// Terminal classification of one configuration entry during a load pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadOutcome {
    MissingFileSpec,
    FileCreated,
    FileCreationFailed,
    FileEmpty,
    IdentifierInvalid,
    EngineUnspecifiedDefaulted,
    EngineInvalidDefaulted,
    EngineResolutionFailed,
    DataLoaded,
    PlaceholderLoaded,
    PlaceholderDuplicateRejected,
}

impl LoadOutcome {
    pub const ALL: [LoadOutcome; 11] = [
        Self::MissingFileSpec,
        Self::FileCreated,
        Self::FileCreationFailed,
        Self::FileEmpty,
        Self::IdentifierInvalid,
        Self::EngineUnspecifiedDefaulted,
        Self::EngineInvalidDefaulted,
        Self::EngineResolutionFailed,
        Self::DataLoaded,
        Self::PlaceholderLoaded,
        Self::PlaceholderDuplicateRejected,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::MissingFileSpec => "missing-file-spec",
            Self::FileCreated => "file-created",
            Self::FileCreationFailed => "file-creation-failed",
            Self::FileEmpty => "file-empty",
            Self::IdentifierInvalid => "identifier-invalid",
            Self::EngineUnspecifiedDefaulted => "engine-unspecified-defaulted",
            Self::EngineInvalidDefaulted => "engine-invalid-defaulted",
            Self::EngineResolutionFailed => "engine-resolution-failed",
            Self::DataLoaded => "data-loaded",
            Self::PlaceholderLoaded => "placeholder-loaded",
            Self::PlaceholderDuplicateRejected => "placeholder-duplicate-rejected",
        }
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn identifier_match_ignores_case() {
        let definition = ScriptDefinition::new("MyId", "1").with_engine("rhai");
        assert!(definition.matches_identifier("myid"));
        assert!(!definition.matches_identifier("myid2"));
        assert_eq!(definition.engine.as_deref(), Some("rhai"));
    }

    #[test]
    fn settings_reject_underscore_split() {
        let mut settings = ExpansionSettings {
            debug: true,
            argument_split: "_".to_string(),
        };
        assert_eq!(settings.normalize().as_deref(), Some("_"));
        assert_eq!(settings.argument_split, ",");
        assert_eq!(settings.normalize(), None);

        let parsed: ExpansionSettings =
            serde_json::from_str(r#"{"debug": true}"#).expect("settings should parse");
        assert!(parsed.debug);
        assert_eq!(parsed.argument_split, DEFAULT_ARGUMENT_SPLIT);
    }

    #[test]
    fn requester_constructors_set_online_flag() {
        assert!(Requester::online("Steve").online);
        let offline = Requester::offline("Alex");
        assert!(!offline.online);
        assert_eq!(offline.unique_id, "requester:alex");
    }

    #[test]
    fn outcome_labels_are_unique() {
        let mut labels = LoadOutcome::ALL.map(LoadOutcome::label).to_vec();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), LoadOutcome::ALL.len());
    }
}
