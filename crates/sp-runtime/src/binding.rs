use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use sp_core::{DataValue, PlaceholderError, Requester, ScriptDefinition, SCRIPT_ERROR_FALLBACK};
use tracing::{debug, error};

use crate::bridge::{dynamic_to_value, map_to_values, values_to_map};
use crate::context::{AppContext, EvalContext};
use crate::data_file::DataDocument;
use crate::handles::{register_host_api, DataHandle, ExpansionHandle, HostHandle, PlaceholderHandle};

const INIT_HOOK: &str = "init";

/// Why an evaluation produced the fallback text instead of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalFault {
    Engine(String),
    ArgumentOutOfBounds(String),
}

impl EvalFault {
    fn from_eval(error: &EvalAltResult) -> Self {
        match error {
            EvalAltResult::ErrorArrayBounds(..) => Self::ArgumentOutOfBounds(error.to_string()),
            EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
            | EvalAltResult::ErrorInModule(_, inner, _) => match Self::from_eval(inner) {
                Self::ArgumentOutOfBounds(_) => Self::ArgumentOutOfBounds(error.to_string()),
                Self::Engine(_) => Self::Engine(error.to_string()),
            },
            _ => Self::Engine(error.to_string()),
        }
    }

    fn log(&self, identifier: &str) {
        match self {
            Self::Engine(message) => error!(
                identifier = %identifier,
                "An error occurred while executing the script '{}': {}",
                identifier,
                message
            ),
            Self::ArgumentOutOfBounds(message) => error!(
                identifier = %identifier,
                "Argument out of bound while executing script '{}': {}",
                identifier,
                message
            ),
        }
    }
}

impl fmt::Display for EvalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(message) => write!(f, "evaluation fault: {}", message),
            Self::ArgumentOutOfBounds(message) => write!(f, "argument out of bounds: {}", message),
        }
    }
}

/// One loaded script together with its private engine and data store.
///
/// All engine access goes through `state`, so concurrent `evaluate` calls on
/// the same binding run one at a time while different bindings never contend.
pub struct ScriptBinding {
    definition: ScriptDefinition,
    engine_name: String,
    context: Arc<AppContext>,
    data_path: PathBuf,
    state: Mutex<BindingState>,
    evaluating_on: Mutex<Option<ThreadId>>,
}

struct BindingState {
    engine: Engine,
    globals: Scope<'static>,
    ast: Option<AST>,
    data: Option<DataHandle>,
    document: Option<DataDocument>,
    first_init_done: bool,
}

impl ScriptBinding {
    pub fn new(
        mut engine: Engine,
        engine_name: &str,
        definition: ScriptDefinition,
        context: Arc<AppContext>,
    ) -> Result<Self, PlaceholderError> {
        if definition.identifier.trim().is_empty() {
            return Err(PlaceholderError::invalid_argument(
                "Identifier can not be empty",
            ));
        }
        if definition.identifier.contains(['/', '\\']) {
            return Err(PlaceholderError::invalid_argument(format!(
                "Identifier \"{}\" can not contain a path separator",
                definition.identifier
            )));
        }
        if definition.source.trim().is_empty() {
            return Err(PlaceholderError::invalid_argument(format!(
                "Script for \"{}\" can not be empty",
                definition.identifier
            )));
        }

        register_host_api(&mut engine);

        let mut globals = Scope::new();
        globals.push("Expansion", ExpansionHandle::new(context.clone()));
        globals.push(
            "Placeholder",
            PlaceholderHandle::new(&definition.identifier, engine_name, &definition.source),
        );
        globals.push("PlaceholderAPI", HostHandle::new(context.host().clone()));
        globals.push("UtilityParser", context.http().clone());

        let data_path = context
            .script_data_dir()
            .join(format!("{}_data.json", definition.identifier));

        Ok(Self {
            definition,
            engine_name: engine_name.to_string(),
            context,
            data_path,
            state: Mutex::new(BindingState {
                engine,
                globals,
                ast: None,
                data: Some(DataHandle::new()),
                document: None,
                first_init_done: false,
            }),
            evaluating_on: Mutex::new(None),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.definition.identifier
    }

    pub fn definition(&self) -> &ScriptDefinition {
        &self.definition
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// The data store, recreated empty if `cleanup` dropped it.
    pub fn data(&self) -> DataHandle {
        self.lock_state().data_handle()
    }

    pub fn first_init_done(&self) -> bool {
        self.lock_state().first_init_done
    }

    pub fn evaluate(&self, requester: Option<&Requester>, args: &[String]) -> String {
        if self.is_evaluating_on_current_thread() {
            error!(
                identifier = %self.definition.identifier,
                "Script '{}' tried to evaluate itself while already running",
                self.definition.identifier
            );
            return SCRIPT_ERROR_FALLBACK.to_string();
        }

        let host = self.context.host();
        let arguments = args
            .iter()
            .map(|arg| {
                if arg.is_empty() {
                    arg.clone()
                } else {
                    host.set_bracket_placeholders(requester, arg)
                }
            })
            .collect();
        let call = EvalContext::new(host.clone(), requester, arguments);

        let outcome = {
            let mut state = self.lock_state();
            let _owner = EvaluationOwner::claim(&self.evaluating_on);
            let outcome = state.run(&self.definition.source, call);
            if !state.first_init_done {
                state.first_init_done = true;
                state.run_init_hook(&self.definition.identifier);
            }
            outcome
        };

        match outcome {
            Ok(DataValue::Null) => String::new(),
            Ok(value) => host.set_placeholders(requester, &value.to_text()),
            Err(fault) => {
                fault.log(&self.definition.identifier);
                SCRIPT_ERROR_FALLBACK.to_string()
            }
        }
    }

    /// Replaces the durable mapping with the on-disk document. Returns true
    /// only when something was loaded.
    pub fn load_data(&self) -> bool {
        let mut state = self.lock_state();
        let document = match DataDocument::open(&self.data_path) {
            Ok((document, created)) => {
                if created {
                    debug!(
                        identifier = %self.definition.identifier,
                        path = %self.data_path.display(),
                        "created empty data file"
                    );
                }
                document
            }
            Err(error) => {
                error!(
                    identifier = %self.definition.identifier,
                    path = %self.data_path.display(),
                    error = %error,
                    "An error occurred while loading data for {}",
                    self.definition.identifier
                );
                return false;
            }
        };

        let entries = document.entries().clone();
        state.document = Some(document);
        if entries.is_empty() {
            return false;
        }

        let data = state.data_handle();
        let mut store = data.lock();
        store.clear();
        for (key, value) in entries {
            store.set(key, value);
        }
        !store.is_empty()
    }

    pub fn save_data(&self) {
        let mut state = self.lock_state();
        let Some(data) = state.data.clone() else {
            return;
        };
        let store = data.lock();
        if store.is_empty() {
            return;
        }
        let Some(document) = state.document.as_mut() else {
            return;
        };

        for (key, value) in store.durable() {
            document.set(key.clone(), value.clone());
        }
        if let Err(error) = document.save() {
            error!(
                identifier = %self.definition.identifier,
                path = %self.data_path.display(),
                error = %error,
                "An error occurred while saving data for {}",
                self.definition.identifier
            );
        }
    }

    pub fn cleanup(&self) {
        let mut state = self.lock_state();
        if let Some(data) = state.data.take() {
            let mut store = data.lock();
            store.clear();
            store.clear_temp();
        }
        state.document = None;
    }

    fn lock_state(&self) -> MutexGuard<'_, BindingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_evaluating_on_current_thread(&self) -> bool {
        let owner = self
            .evaluating_on
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *owner == Some(thread::current().id())
    }
}

/// Marks the current thread as the one running the binding's script until
/// dropped. Only set while the state lock is held.
struct EvaluationOwner<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> EvaluationOwner<'a> {
    fn claim(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for EvaluationOwner<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl fmt::Debug for ScriptBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBinding")
            .field("identifier", &self.definition.identifier)
            .field("engine_name", &self.engine_name)
            .field("data_path", &self.data_path)
            .finish()
    }
}

impl BindingState {
    fn data_handle(&mut self) -> DataHandle {
        self.data.get_or_insert_with(DataHandle::new).clone()
    }

    fn run(&mut self, source: &str, call: EvalContext) -> Result<DataValue, EvalFault> {
        let data = self.data_handle();
        let before = data.lock().durable().clone();

        let mut scope = self.globals.clone();
        scope.push("Data", data.clone());
        scope.push_dynamic("DataVar", Dynamic::from_map(values_to_map(&before)));
        call.inject(&mut scope);

        if self.ast.is_none() {
            let ast = self
                .engine
                .compile_with_scope(&scope, source)
                .map_err(|error| EvalFault::Engine(error.to_string()))?;
            self.ast = Some(ast);
        }
        let Some(ast) = self.ast.as_ref() else {
            return Err(EvalFault::Engine("script is not compiled".to_string()));
        };

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .map_err(|error| EvalFault::from_eval(&error))?;

        if let Some(after) = scope.get_value::<Map>("DataVar") {
            data.lock().merge_durable(&before, map_to_values(after));
        }
        Ok(dynamic_to_value(result))
    }

    /// Calls the script's zero-argument `init` function with `this` bound to
    /// the data accessor. Absence or failure is ignored.
    fn run_init_hook(&mut self, identifier: &str) {
        let mut this = Dynamic::from(self.data_handle());
        let Some(ast) = self.ast.as_ref() else {
            return;
        };
        let mut scope = Scope::new();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut this);
        if let Err(error) =
            self.engine
                .call_fn_with_options::<Dynamic>(options, &mut scope, ast, INIT_HOOK, ())
        {
            debug!(identifier = %identifier, error = %error, "init hook skipped");
        }
    }
}

#[cfg(test)]
mod binding_tests {
    use super::*;
    use crate::engines::EngineRegistry;
    use crate::host::{PlaceholderHost, SimpleHost};
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

    fn binding_in(context: &Arc<AppContext>, identifier: &str, source: &str) -> ScriptBinding {
        let engine = EngineRegistry::with_builtin()
            .create("rhai")
            .expect("default engine");
        ScriptBinding::new(
            engine,
            "rhai",
            ScriptDefinition::new(identifier, source),
            context.clone(),
        )
        .expect("binding should build")
    }

    fn binding(identifier: &str, source: &str) -> ScriptBinding {
        binding_in(&context(identifier), identifier, source)
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn construction_rejects_empty_identifier_or_source() {
        let context = context("invalid");
        let engine = Engine::new();
        let error = ScriptBinding::new(engine, "rhai", ScriptDefinition::new(" ", "1"), context.clone())
            .expect_err("empty identifier should fail");
        assert_eq!(error.code, "BINDING_INVALID_ARGUMENT");

        let error = ScriptBinding::new(Engine::new(), "rhai", ScriptDefinition::new("x", ""), context.clone())
            .expect_err("empty source should fail");
        assert_eq!(error.code, "BINDING_INVALID_ARGUMENT");

        let error = ScriptBinding::new(
            Engine::new(),
            "rhai",
            ScriptDefinition::new("../escape", "1"),
            context,
        )
        .expect_err("path separator should fail");
        assert_eq!(error.code, "BINDING_INVALID_ARGUMENT");
    }

    /// Resolves `%self%` by evaluating the registered binding again.
    #[derive(Default)]
    struct LoopbackHost {
        binding: std::sync::OnceLock<std::sync::Weak<ScriptBinding>>,
    }

    impl PlaceholderHost for LoopbackHost {
        fn set_placeholders(&self, requester: Option<&Requester>, text: &str) -> String {
            if !text.contains("%self%") {
                return text.to_string();
            }
            let inner = self
                .binding
                .get()
                .and_then(std::sync::Weak::upgrade)
                .map(|binding| binding.evaluate(requester, &args(&["leaf"])))
                .unwrap_or_default();
            text.replace("%self%", &inner)
        }

        fn set_bracket_placeholders(&self, _requester: Option<&Requester>, text: &str) -> String {
            text.to_string()
        }
    }

    #[test]
    fn self_reentry_returns_fallback_instead_of_blocking() {
        let host = Arc::new(LoopbackHost::default());
        let context = Arc::new(
            AppContext::new(temp_path("reentry"), Default::default(), host.clone())
                .expect("context should build"),
        );
        let engine = EngineRegistry::with_builtin()
            .create("rhai")
            .expect("default engine");
        let binding = Arc::new(
            ScriptBinding::new(
                engine,
                "rhai",
                ScriptDefinition::new(
                    "me",
                    r#"if args.len() == 0 { "outer:" + Parser.parse("%self%") } else { "inner" }"#,
                ),
                context,
            )
            .expect("binding should build"),
        );
        host.binding
            .set(Arc::downgrade(&binding))
            .expect("binding slot should be empty");

        let (sender, receiver) = std::sync::mpsc::channel();
        let worker = binding.clone();
        thread::spawn(move || {
            let requester = Requester::online("alex");
            let _ = sender.send(worker.evaluate(Some(&requester), &[]));
        });
        let result = receiver
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("evaluate should not block on itself");
        assert_eq!(result, format!("outer:{}", SCRIPT_ERROR_FALLBACK));

        assert_eq!(binding.evaluate(None, &args(&["leaf"])), "inner");
    }

    #[test]
    fn evaluate_exposes_arguments() {
        let binding = binding(
            "join",
            r#"let out = ""; for a in args { out += a + "|"; } out + args.len()"#,
        );
        assert_eq!(binding.evaluate(None, &args(&["a", "b", ""])), "a|b||3");
        assert_eq!(binding.evaluate(None, &[]), "0");
    }

    #[test]
    fn unit_result_becomes_empty_text() {
        let binding = binding("unit", "let x = 1;");
        assert_eq!(binding.evaluate(None, &[]), "");
    }

    #[test]
    fn arguments_and_results_pass_through_host_substitution() {
        let binding = binding("greet", r#"args[0] + " says %requester_name%""#);
        let steve = Requester::online("Steve");
        assert_eq!(
            binding.evaluate(Some(&steve), &args(&["{requester_name}"])),
            "Steve says Steve"
        );
    }

    #[test]
    fn requester_handles_follow_online_state() {
        let binding = binding(
            "who",
            r#"if type_of(Player) == "()" { "offline:" + Requester.name() } else { "online:" + Player.name() }"#,
        );
        assert_eq!(
            binding.evaluate(Some(&Requester::online("Steve")), &[]),
            "online:Steve"
        );
        assert_eq!(
            binding.evaluate(Some(&Requester::offline("Alex")), &[]),
            "offline:Alex"
        );
        assert_eq!(
            binding.evaluate(None, &[]),
            SCRIPT_ERROR_FALLBACK,
            "calling a method on an absent requester is an evaluation fault"
        );
    }

    #[test]
    fn faults_yield_fallback_and_keep_the_binding_usable() {
        let binding = binding(
            "faulty",
            r#"Data.set("before", 1); if args.len() > 0 && args[0] == "boom" { throw "boom"; } "ok""#,
        );
        assert_eq!(binding.evaluate(None, &args(&["boom"])), SCRIPT_ERROR_FALLBACK);
        assert_eq!(binding.data().lock().get("before"), DataValue::Int(1));
        assert_eq!(binding.evaluate(None, &[]), "ok");
    }

    #[test]
    fn out_of_bounds_argument_is_contained() {
        let binding = binding("bounds", "args[3]");
        assert_eq!(binding.evaluate(None, &args(&["only"])), SCRIPT_ERROR_FALLBACK);

        let fault = EvalFault::from_eval(&EvalAltResult::ErrorArrayBounds(
            1,
            3,
            rhai::Position::NONE,
        ));
        assert!(matches!(fault, EvalFault::ArgumentOutOfBounds(_)));
    }

    #[test]
    fn out_of_bounds_inside_script_function_keeps_its_class() {
        let engine = Engine::new();
        let error = engine
            .eval::<Dynamic>("fn pick(a) { a[5] } pick([1])")
            .expect_err("index should be out of bounds");
        assert!(matches!(
            EvalFault::from_eval(&error),
            EvalFault::ArgumentOutOfBounds(_)
        ));

        let error = engine
            .eval::<Dynamic>(r#"throw "nope""#)
            .expect_err("throw should fail");
        assert!(matches!(EvalFault::from_eval(&error), EvalFault::Engine(_)));
    }

    #[test]
    fn syntax_errors_are_evaluation_faults() {
        let binding = binding("syntax", "let = ;");
        assert_eq!(binding.evaluate(None, &[]), SCRIPT_ERROR_FALLBACK);
    }

    #[test]
    fn init_hook_runs_once_after_first_evaluation() {
        let binding = binding(
            "hooked",
            r#"
            fn init() {
                let n = this.get("inits");
                if type_of(n) == "()" { this.set("inits", 1); } else { this.set("inits", n + 1); }
            }
            Data.exists("inits")
            "#,
        );
        assert!(!binding.first_init_done());
        assert_eq!(binding.evaluate(None, &[]), "false");
        assert!(binding.first_init_done());
        assert_eq!(binding.evaluate(None, &[]), "true");
        assert_eq!(binding.evaluate(None, &[]), "true");
        assert_eq!(binding.data().lock().get("inits"), DataValue::Int(1));
    }

    #[test]
    fn missing_init_hook_is_ignored() {
        let binding = binding("nohook", "1 + 1");
        assert_eq!(binding.evaluate(None, &[]), "2");
        assert!(binding.first_init_done());
    }

    #[test]
    fn raw_data_mapping_writes_back() {
        let binding = binding(
            "rawmap",
            r#"DataVar.visits = if "visits" in DataVar { DataVar.visits + 1 } else { 1 }; DataVar.visits"#,
        );
        assert_eq!(binding.evaluate(None, &[]), "1");
        assert_eq!(binding.evaluate(None, &[]), "2");
        assert_eq!(binding.data().lock().get("visits"), DataValue::Int(2));
    }

    #[test]
    fn structured_results_render_as_json() {
        let binding = binding("structured", r#"#{ a: 1, b: [true, "x"] }"#);
        assert_eq!(binding.evaluate(None, &[]), r#"{"a":1,"b":[true,"x"]}"#);
    }

    #[test]
    fn save_then_load_round_trips_durable_data() {
        let context = context("persist");
        let first = binding_in(&context, "persist", r#"Data.set("list", [1, "two"]); Data.set("n", 2.5); Data.setTemp("t", 1); """#);
        assert!(!first.load_data(), "a fresh data file holds nothing");
        assert!(first.data_path().exists());
        first.evaluate(None, &[]);
        first.save_data();

        let second = binding_in(&context, "persist", "1");
        assert!(second.load_data());
        let loaded = second.data();
        let store = loaded.lock();
        assert_eq!(store.durable(), first.data().lock().durable());
        assert!(store.is_temp_empty());
    }

    #[test]
    fn save_without_load_is_a_no_op() {
        let binding = binding("unsaved", r#"Data.set("k", 1); """#);
        binding.evaluate(None, &[]);
        binding.save_data();
        assert!(!binding.data_path().exists());
    }

    #[test]
    fn corrupt_data_file_is_reported_not_overwritten() {
        let context = context("corrupt");
        let binding = binding_in(&context, "corrupt", r#"Data.set("k", 1); """#);
        std::fs::create_dir_all(context.script_data_dir()).expect("data dir");
        std::fs::write(binding.data_path(), "{ not json").expect("write corrupt");

        assert!(!binding.load_data());
        binding.evaluate(None, &[]);
        binding.save_data();
        let raw = std::fs::read_to_string(binding.data_path()).expect("read back");
        assert_eq!(raw, "{ not json");
    }

    #[test]
    fn cleanup_is_idempotent_and_drops_data() {
        let binding = binding("cleanup", r#"Data.set("k", 1); Data.exists("k")"#);
        assert!(!binding.load_data());
        assert_eq!(binding.evaluate(None, &[]), "true");
        binding.cleanup();
        binding.cleanup();
        assert!(binding.data().lock().is_empty());
        binding.save_data();
        let raw = std::fs::read_to_string(binding.data_path()).expect("data file exists");
        assert!(raw.is_empty());
    }

    #[test]
    fn concurrent_callers_see_only_their_own_context() {
        let binding = Arc::new(binding(
            "concurrent",
            r#"
            let me = Requester.name() + "/" + args[0];
            let spin = 0;
            for i in 0..200 { spin += i; }
            me + "/" + Requester.name() + "/" + args[0]
            "#,
        ));

        let handles = (0..8)
            .map(|index| {
                let binding = Arc::clone(&binding);
                thread::spawn(move || {
                    let requester = Requester::online(format!("user{}", index));
                    let arg = format!("arg{}", index);
                    let result = binding.evaluate(Some(&requester), &[arg.clone()]);
                    (requester.name, arg, result)
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let (name, arg, result) = handle.join().expect("thread should finish");
            assert_eq!(result, format!("{name}/{arg}/{name}/{arg}"));
        }
    }
}
