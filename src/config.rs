use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_SQLITE_PATH: &str = "./docdigest.db";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_SUMMARIZER_MODEL: &str = "llama3.2";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_MAX_INPUT_CHARS: usize = 12_000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },
    /// Configuration was installed twice.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Where documents are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// Full connection URL (`sqlite:` or `mysql:` scheme).
    Url(String),
    /// Embedded SQLite file, created when missing.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// MySQL server assembled from discrete settings.
    MySql {
        /// Login user.
        user: String,
        /// Login password, possibly empty.
        password: String,
        /// Server host name.
        host: String,
        /// Server port.
        port: u16,
        /// Database (schema) name.
        database: String,
    },
}

impl DatabaseTarget {
    /// Human-readable description with credentials removed.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => match url.split_once("://") {
                Some((scheme, rest)) => match rest.rsplit_once('@') {
                    Some((_, host)) => format!("{scheme}://***@{host}"),
                    None => url.clone(),
                },
                None => url.clone(),
            },
            Self::Sqlite { path } => format!("sqlite:{}", path.display()),
            Self::MySql {
                host,
                port,
                database,
                ..
            } => format!("mysql://{host}:{port}/{database}"),
        }
    }
}

/// Runtime configuration for the docdigest server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Document store connection target.
    pub database: DatabaseTarget,
    /// Upper bound on pooled database connections.
    pub db_max_connections: u32,
    /// Directory receiving raw uploads.
    pub upload_dir: PathBuf,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
    /// Summarization model identifier passed to Ollama.
    pub summarizer_model: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Characters of extracted text sent to the model; longer input is truncated.
    pub summarizer_max_input_chars: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        Ok(Self {
            database: database_target(&vars)?,
            db_max_connections: vars
                .parse("DB_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            upload_dir: vars
                .get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_upload_bytes: vars
                .parse("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            summarizer_model: vars
                .get("SUMMARIZER_MODEL")
                .unwrap_or_else(|| DEFAULT_SUMMARIZER_MODEL.to_string()),
            ollama_url: vars
                .get("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            summarizer_max_input_chars: vars
                .parse("SUMMARIZER_MAX_INPUT_CHARS")?
                .unwrap_or(DEFAULT_MAX_INPUT_CHARS),
            server_port: vars.parse("SERVER_PORT")?,
        })
    }
}

fn database_target(vars: &Vars<'_>) -> Result<DatabaseTarget, ConfigError> {
    if let Some(url) = vars.get("DATABASE_URL") {
        return Ok(DatabaseTarget::Url(url));
    }

    if uses_sqlite(vars) {
        let path = vars
            .get("SQLITE_PATH")
            .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string());
        return Ok(DatabaseTarget::Sqlite {
            path: PathBuf::from(path),
        });
    }

    Ok(DatabaseTarget::MySql {
        user: vars.get("DB_USER").unwrap_or_else(|| "root".to_string()),
        password: vars.raw("DB_PASSWORD").unwrap_or_default(),
        host: vars.get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
        port: vars.parse("DB_PORT")?.unwrap_or(3306),
        database: vars.get("DB_NAME").unwrap_or_else(|| "docdigest".to_string()),
    })
}

fn uses_sqlite(vars: &Vars<'_>) -> bool {
    let engine_is_sqlite = vars
        .get("DB_ENGINE")
        .is_some_and(|engine| engine.eq_ignore_ascii_case("sqlite"));
    let testing = vars
        .get("TESTING")
        .is_some_and(|flag| matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes"));
    engine_is_sqlite || testing
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| {
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
            })
            .transpose()
    }
}

/// Outcome of `docdigest check-env`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnvReport {
    /// Required variables that are absent.
    pub missing: Vec<&'static str>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
}

impl EnvReport {
    /// Whether every required variable is present.
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check that the variables needed for a production deployment are present.
///
/// Database credentials are only required when neither `DATABASE_URL` nor SQLite mode is set.
pub fn check_env<F>(lookup: F) -> EnvReport
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars(&lookup);
    let mut report = EnvReport::default();

    if vars.get("DATABASE_URL").is_none() && !uses_sqlite(&vars) {
        for key in ["DB_USER", "DB_NAME"] {
            if vars.get(key).is_none() {
                report.missing.push(key);
            }
        }
    }
    if vars.get("UPLOAD_DIR").is_none() {
        report.missing.push("UPLOAD_DIR");
    }
    if vars.get("SUMMARIZER_MODEL").is_none() {
        report.warnings.push(format!(
            "SUMMARIZER_MODEL not set; default model '{DEFAULT_SUMMARIZER_MODEL}' will be used"
        ));
    }

    report
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        database = %config.database.describe(),
        upload_dir = %config.upload_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        summarizer_model = %config.summarizer_model,
        ollama_url = %config.ollama_url,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
}
