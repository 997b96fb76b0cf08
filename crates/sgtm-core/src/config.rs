//! sgtm.toml configuration parser.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{ConfigError, ConfigResult};
use crate::settings::Environment;

pub const DEFAULT_STACK_NAME: &str = "ServerSideGTMFargateStack";
pub const DEFAULT_ASSET_DIR: &str = "docker";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFile {
    pub stack: StackSection,
    #[serde(default)]
    pub context: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSection {
    pub name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    /// Container build context, relative to the config file.
    pub asset_dir: Option<String>,
}

impl StackFile {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The `[context]` table as the lowest context layer.
    pub fn context(&self) -> ConfigResult<Context> {
        Context::from_table(&self.context)
    }

    pub fn asset_dir(&self) -> &str {
        self.stack.asset_dir.as_deref().unwrap_or(DEFAULT_ASSET_DIR)
    }

    /// Target account/region: the file wins, then `CDK_DEFAULT_*` from `vars`.
    pub fn environment<I, K, V>(&self, vars: I) -> Environment
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut env = Environment::from_vars(vars);
        if let Some(account) = &self.stack.account {
            env.account = Some(account.clone());
        }
        if let Some(region) = &self.stack.region {
            env.region = Some(region.clone());
        }
        env
    }

    /// Scaffold a minimal sgtm.toml.
    pub fn scaffold(name: &str) -> Self {
        let mut context = BTreeMap::new();
        context.insert("cpu".to_string(), toml::Value::Integer(256));
        context.insert("mem".to_string(), toml::Value::Integer(512));
        context.insert("desiredNodeCount".to_string(), toml::Value::Integer(1));
        context.insert("taskMinCapacity".to_string(), toml::Value::Integer(1));
        context.insert("taskMaxCapacity".to_string(), toml::Value::Integer(2));
        context.insert("targetCpuUtilization".to_string(), toml::Value::Integer(80));
        context.insert(
            "containerConfig".to_string(),
            toml::Value::String(String::new()),
        );

        StackFile {
            stack: StackSection {
                name: name.to_string(),
                account: None,
                region: None,
                asset_dir: Some(DEFAULT_ASSET_DIR.to_string()),
            },
            context,
        }
    }
}

impl Default for StackFile {
    fn default() -> Self {
        Self::scaffold(DEFAULT_STACK_NAME)
    }
}
