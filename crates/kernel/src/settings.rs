use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::store::{Credential, NewUser, RoleGrant};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "POKEBATTLE_ENV";
const CONFIG_DIR_ENV: &str = "POKEBATTLE_CONFIG_DIR";
const ENV_PREFIX: &str = "POKEBATTLE";

/// Container variables consumed by the bootstrap and the setting each one
/// overrides. They win over every other configuration source.
pub const CONTAINER_ENV: &[(&str, &str)] = &[
    ("MONGO_INITDB_ROOT_USERNAME", "bootstrap.admin_username"),
    ("MONGO_INITDB_ROOT_PASSWORD", "bootstrap.admin_password"),
    ("MONGO_USER", "bootstrap.app_username"),
    ("MONGO_PASSWORD", "bootstrap.app_password"),
    ("MONGO_DB", "bootstrap.app_database"),
];

/// Deployment environment the bootstrap is running in.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `POKEBATTLE_*` variables and finally the container variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        Self::load_from_env(utf8_vars(std::env::vars_os()))
    }

    /// Same layering as [`Settings::load`], reading variables from `vars`
    /// instead of the process environment.
    pub fn load_from_env(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let environment = vars
            .get(ENV_VAR_NAME)
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let config_dir = match vars.get(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let mut builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(Some(vars.clone())),
            );

        for (var, key) in CONTAINER_ENV {
            builder = builder
                .set_override_option(*key, vars.get(*var).cloned())
                .with_context(|| format!("failed to apply {}", var))?;
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }

    /// Resolved settings as JSON with every password replaced.
    pub fn redacted(&self) -> serde_json::Value {
        fn mask(secret: &str) -> &'static str {
            if secret.is_empty() {
                ""
            } else {
                "<redacted>"
            }
        }

        serde_json::json!({
            "environment": self.environment,
            "database": {
                "uri": self.database.redacted_uri(),
                "auth_source": self.database.auth_source,
                "auth_mechanism": self.database.auth_mechanism,
                "app_name": self.database.app_name,
            },
            "bootstrap": {
                "admin_username": self.bootstrap.admin_username,
                "admin_password": mask(&self.bootstrap.admin_password),
                "app_username": self.bootstrap.app_username,
                "app_password": mask(&self.bootstrap.app_password),
                "app_database": self.bootstrap.app_database,
                "role_database": self.bootstrap.role_database(),
                "collection": self.bootstrap.collection,
            },
            "telemetry": self.telemetry,
        })
    }
}

/// Keep the variables whose name and value are valid UTF-8; any other cannot
/// hold a setting.
fn utf8_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> HashMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// How to reach the database service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_auth_source")]
    pub auth_source: String,
    #[serde(default)]
    pub auth_mechanism: AuthMechanism,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://mongo:27017".to_string()
    }

    fn default_auth_source() -> String {
        "admin".to_string()
    }

    fn default_app_name() -> String {
        "pokebattle-init".to_string()
    }

    /// Connection string with any `user:password@` userinfo masked.
    pub fn redacted_uri(&self) -> String {
        let Some(scheme_end) = self.uri.find("://").map(|i| i + 3) else {
            return self.uri.clone();
        };
        let rest = &self.uri[scheme_end..];
        let authority_end = rest.find(|c| c == '/' || c == '?').unwrap_or(rest.len());
        match rest[..authority_end].rfind('@') {
            Some(at) => format!("{}<redacted>{}", &self.uri[..scheme_end], &rest[at..]),
            None => self.uri.clone(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            auth_source: Self::default_auth_source(),
            auth_mechanism: AuthMechanism::default(),
            app_name: Self::default_app_name(),
        }
    }
}

/// SASL mechanism used for the administrative login.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum AuthMechanism {
    #[serde(rename = "SCRAM-SHA-1")]
    ScramSha1,
    #[default]
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
}

/// The five provisioning inputs plus the collection to create.
///
/// Fields default to empty strings; emptiness is rejected by the step that
/// consumes the value, not at load time.
#[derive(Clone, Deserialize)]
pub struct BootstrapSettings {
    #[serde(default)]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: String,
    #[serde(default)]
    pub app_username: String,
    #[serde(default)]
    pub app_password: String,
    #[serde(default)]
    pub app_database: String,
    /// Database the `readWrite` grant is scoped to, when it must differ from
    /// `app_database`.
    #[serde(default)]
    pub role_database: Option<String>,
    #[serde(default = "BootstrapSettings::default_collection")]
    pub collection: String,
}

impl BootstrapSettings {
    pub fn new(
        admin: Credential,
        app: Credential,
        app_database: impl Into<String>,
    ) -> Self {
        Self {
            admin_username: admin.username,
            admin_password: admin.password,
            app_username: app.username,
            app_password: app.password,
            app_database: app_database.into(),
            role_database: None,
            collection: Self::default_collection(),
        }
    }

    fn default_collection() -> String {
        "battle".to_string()
    }

    pub fn admin_credential(&self) -> Credential {
        Credential::new(&self.admin_username, &self.admin_password)
    }

    pub fn app_credential(&self) -> Credential {
        Credential::new(&self.app_username, &self.app_password)
    }

    pub fn role_database(&self) -> &str {
        self.role_database.as_deref().unwrap_or(&self.app_database)
    }

    /// The application user with its single `readWrite` grant.
    pub fn app_user(&self) -> NewUser {
        NewUser {
            credential: self.app_credential(),
            roles: vec![RoleGrant::read_write(self.role_database())],
        }
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self::new(
            Credential::new("", ""),
            Credential::new("", ""),
            String::new(),
        )
    }
}

impl std::fmt::Debug for BootstrapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapSettings")
            .field("admin", &self.admin_credential())
            .field("app", &self.app_credential())
            .field("app_database", &self.app_database)
            .field("role_database", &self.role_database)
            .field("collection", &self.collection)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
