use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rhai::{Array, Dynamic, Scope};
use sp_core::{ExpansionSettings, PlaceholderError, Requester};
use tracing::warn;

use crate::handles::{ParserHandle, RequesterHandle};
use crate::host::PlaceholderHost;
use crate::http::HttpUtility;

const CONFIG_FILE: &str = "placeholders.json";
const SCRIPTS_DIR: &str = "scripts";
const SCRIPT_DATA_DIR: &str = "script_data";

/// Everything a binding needs from the hosting application, passed in
/// explicitly at construction.
pub struct AppContext {
    data_folder: PathBuf,
    settings: ExpansionSettings,
    host: Arc<dyn PlaceholderHost>,
    http: HttpUtility,
    version: String,
}

impl AppContext {
    pub fn new(
        data_folder: impl Into<PathBuf>,
        mut settings: ExpansionSettings,
        host: Arc<dyn PlaceholderHost>,
    ) -> Result<Self, PlaceholderError> {
        if let Some(rejected) = settings.normalize() {
            warn!(
                rejected = %rejected,
                "argument split token is not allowed, defaulting to '{}'",
                settings.argument_split
            );
        }
        Ok(Self {
            data_folder: data_folder.into(),
            settings,
            host,
            http: HttpUtility::new()?,
            version: crate::VERSION.to_string(),
        })
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_folder.join(CONFIG_FILE)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.data_folder.join(SCRIPTS_DIR)
    }

    pub fn script_data_dir(&self) -> PathBuf {
        self.scripts_dir().join(SCRIPT_DATA_DIR)
    }

    pub fn settings(&self) -> &ExpansionSettings {
        &self.settings
    }

    pub fn argument_split(&self) -> &str {
        &self.settings.argument_split
    }

    pub fn debug(&self) -> bool {
        self.settings.debug
    }

    pub fn host(&self) -> &Arc<dyn PlaceholderHost> {
        &self.host
    }

    pub fn http(&self) -> &HttpUtility {
        &self.http
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("data_folder", &self.data_folder)
            .field("settings", &self.settings)
            .field("version", &self.version)
            .finish()
    }
}

/// Values that change with every call: the arguments and who is asking.
pub struct EvalContext {
    pub args: Vec<String>,
    pub requester: Option<Requester>,
    pub online: bool,
    host: Arc<dyn PlaceholderHost>,
}

impl EvalContext {
    pub fn new(
        host: Arc<dyn PlaceholderHost>,
        requester: Option<&Requester>,
        args: Vec<String>,
    ) -> Self {
        let online = requester.is_some_and(|requester| host.is_online(requester));
        Self {
            args,
            requester: requester.cloned(),
            online,
            host,
        }
    }

    /// Exposes the call values as script globals.
    pub(crate) fn inject(self, scope: &mut Scope<'static>) {
        let args = self
            .args
            .into_iter()
            .map(Dynamic::from)
            .collect::<Array>();
        scope.push_dynamic("args", Dynamic::from_array(args));

        let requester = self.requester.clone().map(RequesterHandle::new);
        match &requester {
            Some(handle) if self.online => {
                scope.push("Player", handle.clone());
            }
            _ => {
                scope.push_dynamic("Player", Dynamic::UNIT);
            }
        }
        match requester {
            Some(handle) => scope.push("Requester", handle),
            None => scope.push_dynamic("Requester", Dynamic::UNIT),
        };
        scope.push("Parser", ParserHandle::new(self.host, self.requester));
    }
}
