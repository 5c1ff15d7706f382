use std::sync::Arc;

use sp_core::Requester;
use sp_runtime::ScriptBinding;
use tracing::{debug, warn};

/// Loaded script bindings addressed by case-insensitive identifier.
#[derive(Debug)]
pub struct PlaceholderRegistry {
    argument_split: String,
    bindings: Vec<Arc<ScriptBinding>>,
}

impl PlaceholderRegistry {
    pub fn new(argument_split: impl Into<String>) -> Self {
        Self {
            argument_split: argument_split.into(),
            bindings: Vec::new(),
        }
    }

    pub fn argument_split(&self) -> &str {
        &self.argument_split
    }

    /// Accepts a binding unless its identifier is unusable for routing or
    /// already taken. The first registration of an identifier always wins.
    pub fn register(&mut self, binding: Arc<ScriptBinding>) -> bool {
        let identifier = binding.identifier();
        if !self.is_valid_identifier(identifier) {
            warn!(identifier, "rejected placeholder with an invalid identifier");
            return false;
        }
        if self.get(identifier).is_some() {
            warn!(identifier, "rejected duplicate placeholder identifier");
            return false;
        }
        debug!(identifier, engine = binding.engine_name(), "registered placeholder");
        self.bindings.push(binding);
        true
    }

    /// Identifiers also name the data file, so path separators are refused.
    pub fn is_valid_identifier(&self, identifier: &str) -> bool {
        !identifier.trim().is_empty()
            && !identifier.contains(self.argument_split.as_str())
            && !identifier.contains(['/', '\\'])
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<ScriptBinding>> {
        self.bindings
            .iter()
            .find(|binding| binding.definition().matches_identifier(identifier))
    }

    pub fn bindings(&self) -> &[Arc<ScriptBinding>] {
        &self.bindings
    }

    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self
            .bindings
            .iter()
            .map(|binding| binding.identifier().to_string())
            .collect();
        identifiers.sort();
        identifiers
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) -> Vec<Arc<ScriptBinding>> {
        std::mem::take(&mut self.bindings)
    }

    /// Finds the binding a request body addresses along with its arguments.
    ///
    /// `id_rest` (case-sensitive prefix) carries arguments, a bare `id`
    /// (case-insensitive) carries none.
    pub fn route(&self, request: &str) -> Option<(Arc<ScriptBinding>, Vec<String>)> {
        for binding in &self.bindings {
            let identifier = binding.identifier();
            if let Some(rest) = request
                .strip_prefix(identifier)
                .and_then(|rest| rest.strip_prefix('_'))
            {
                let args = if rest.contains(self.argument_split.as_str()) {
                    split_arguments(rest, &self.argument_split)
                } else {
                    vec![rest.to_string()]
                };
                return Some((binding.clone(), args));
            }
            if binding.definition().matches_identifier(request) {
                return Some((binding.clone(), Vec::new()));
            }
        }
        None
    }

    /// `None` means no script matched; `Some("")` is a legitimate result.
    pub fn resolve(&self, requester: Option<&Requester>, request: &str) -> Option<String> {
        let Some(requester) = requester else {
            return Some(String::new());
        };
        if self.is_empty() {
            return Some(String::new());
        }
        let (binding, args) = self.route(request)?;
        Some(binding.evaluate(Some(requester), &args))
    }
}

/// Literal split that drops trailing empty segments.
pub fn split_arguments(text: &str, token: &str) -> Vec<String> {
    if token.is_empty() {
        return vec![text.to_string()];
    }
    let mut parts: Vec<String> = text.split(token).map(str::to_string).collect();
    while parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
    parts
}

#[cfg(test)]
mod registry_tests {
    use super::*;
    use sp_core::ScriptDefinition;
    use sp_runtime::{AppContext, EngineRegistry, SimpleHost};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!("script-placeholders-{}-{}", name, nanos))
    }

    fn context(name: &str) -> Arc<AppContext> {
        Arc::new(
            AppContext::new(temp_path(name), Default::default(), Arc::new(SimpleHost::new()))
                .expect("context should build"),
        )
    }

    fn binding(context: &Arc<AppContext>, identifier: &str, source: &str) -> Arc<ScriptBinding> {
        let engine = EngineRegistry::with_builtin()
            .create("rhai")
            .expect("default engine");
        Arc::new(
            ScriptBinding::new(
                engine,
                "rhai",
                ScriptDefinition::new(identifier, source),
                context.clone(),
            )
            .expect("binding should build"),
        )
    }

    fn echo_args(context: &Arc<AppContext>, identifier: &str) -> Arc<ScriptBinding> {
        binding(context, identifier, r#"`${args.len()}:${args}`"#)
    }

    #[test]
    fn duplicates_are_rejected_case_insensitively() {
        let ctx = context("registry-dup");
        let mut registry = PlaceholderRegistry::new(",");
        assert!(registry.register(binding(&ctx, "Stats", "\"first\"")));
        assert!(!registry.register(binding(&ctx, "stats", "\"second\"")));
        assert!(!registry.register(binding(&ctx, "STATS", "\"third\"")));

        assert_eq!(registry.len(), 1);
        let requester = Requester::online("alex");
        assert_eq!(
            registry.resolve(Some(&requester), "stats").as_deref(),
            Some("first")
        );
    }

    #[test]
    fn identifiers_containing_the_split_token_are_rejected() {
        let ctx = context("registry-token");
        let mut registry = PlaceholderRegistry::new(",");
        assert!(!registry.register(binding(&ctx, "a,b", "1")));
        assert!(registry.is_empty());
        assert!(registry.is_valid_identifier("a_b"));
        assert!(!registry.is_valid_identifier("  "));
        assert!(!registry.is_valid_identifier("../escape"));
        assert!(!registry.is_valid_identifier("nested\\id"));
    }

    #[test]
    fn prefixed_request_splits_arguments() {
        let ctx = context("registry-split");
        let mut registry = PlaceholderRegistry::new(",");
        registry.register(echo_args(&ctx, "myid"));

        let (found, args) = registry.route("myid_a,b,c").expect("should route");
        assert_eq!(found.identifier(), "myid");
        assert_eq!(args, ["a", "b", "c"]);

        let (_, single) = registry.route("myid_hello world").expect("should route");
        assert_eq!(single, ["hello world"]);
    }

    #[test]
    fn bare_identifier_routes_without_arguments() {
        let ctx = context("registry-bare");
        let mut registry = PlaceholderRegistry::new(",");
        registry.register(echo_args(&ctx, "myid"));

        let (_, args) = registry.route("MyId").expect("case-insensitive match");
        assert!(args.is_empty());

        let requester = Requester::online("alex");
        assert_eq!(
            registry.resolve(Some(&requester), "myid").as_deref(),
            Some("0:[]")
        );
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        let ctx = context("registry-prefix-case");
        let mut registry = PlaceholderRegistry::new(",");
        registry.register(echo_args(&ctx, "myid"));
        assert!(registry.route("MYID_a,b").is_none());
        assert!(registry.route("myidx").is_none());
    }

    #[test]
    fn unresolved_is_distinct_from_empty() {
        let ctx = context("registry-unresolved");
        let mut registry = PlaceholderRegistry::new(",");
        registry.register(binding(&ctx, "blank", "\"\""));

        let requester = Requester::online("alex");
        assert_eq!(registry.resolve(Some(&requester), "blank").as_deref(), Some(""));
        assert_eq!(registry.resolve(Some(&requester), "missing"), None);
    }

    #[test]
    fn missing_requester_or_empty_registry_short_circuits() {
        let ctx = context("registry-short");
        let empty = PlaceholderRegistry::new(",");
        let requester = Requester::online("alex");
        assert_eq!(empty.resolve(Some(&requester), "anything").as_deref(), Some(""));

        let mut registry = PlaceholderRegistry::new(",");
        registry.register(binding(&ctx, "boom", "throw \"never evaluated\""));
        assert_eq!(registry.resolve(None, "boom").as_deref(), Some(""));
    }

    #[test]
    fn clear_drains_bindings() {
        let ctx = context("registry-clear");
        let mut registry = PlaceholderRegistry::new(",");
        registry.register(binding(&ctx, "b", "1"));
        registry.register(binding(&ctx, "a", "2"));
        assert_eq!(registry.identifiers(), ["a", "b"]);

        let drained = registry.clear();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn split_drops_trailing_empty_segments() {
        assert_eq!(split_arguments("a,b,,", ","), ["a", "b"]);
        assert_eq!(split_arguments(",a", ","), ["", "a"]);
        assert_eq!(split_arguments("a::b", "::"), ["a", "b"]);
        assert!(split_arguments(",,", ",").is_empty());
    }
}
