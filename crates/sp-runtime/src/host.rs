use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use sp_core::Requester;

/// Placeholder substitution provided by the hosting application.
pub trait PlaceholderHost: Send + Sync {
    /// Replaces `%name%` placeholders.
    fn set_placeholders(&self, requester: Option<&Requester>, text: &str) -> String;

    /// Replaces `{name}` placeholders.
    fn set_bracket_placeholders(&self, requester: Option<&Requester>, text: &str) -> String;

    fn set_relational_placeholders(
        &self,
        _one: Option<&Requester>,
        _two: Option<&Requester>,
        text: &str,
    ) -> String {
        text.to_string()
    }

    fn is_online(&self, requester: &Requester) -> bool {
        requester.online
    }
}

/// Host that only knows a handful of requester placeholders plus a fixed
/// table of values. Unknown placeholders are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SimpleHost {
    values: BTreeMap<String, String>,
}

fn percent_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"%([A-Za-z0-9_]+)%").expect("percent regex must compile"))
}

fn bracket_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("bracket regex must compile"))
}

fn relational_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"%rel_([A-Za-z0-9_]+)%").expect("relational regex must compile")
    })
}

impl SimpleHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    fn lookup(&self, requester: Option<&Requester>, key: &str) -> Option<String> {
        let key = key.to_ascii_lowercase();
        match (key.as_str(), requester) {
            ("requester_name", Some(requester)) => Some(requester.name.clone()),
            ("requester_uuid", Some(requester)) => Some(requester.unique_id.clone()),
            ("requester_online", Some(requester)) => Some(requester.online.to_string()),
            _ => self.values.get(&key).cloned(),
        }
    }

    fn replace(&self, pattern: &Regex, requester: Option<&Requester>, text: &str) -> String {
        pattern
            .replace_all(text, |captures: &Captures<'_>| {
                self.lookup(requester, &captures[1])
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .to_string()
    }
}

impl PlaceholderHost for SimpleHost {
    fn set_placeholders(&self, requester: Option<&Requester>, text: &str) -> String {
        self.replace(percent_regex(), requester, text)
    }

    fn set_bracket_placeholders(&self, requester: Option<&Requester>, text: &str) -> String {
        self.replace(bracket_regex(), requester, text)
    }

    fn set_relational_placeholders(
        &self,
        one: Option<&Requester>,
        two: Option<&Requester>,
        text: &str,
    ) -> String {
        let related = self.replace(relational_regex(), two, text);
        self.set_placeholders(one, &related)
    }
}
