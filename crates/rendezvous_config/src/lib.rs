//! Configuration for the Rendezvous backend.
//!
//! Values are layered, later sources winning:
//!
//! 1. `config/default.{toml,yaml,json}`
//! 2. `config/{RUN_ENV}.{toml,yaml,json}` (`RUN_ENV` defaults to `debug`)
//! 3. environment variables prefixed with `RENDEZVOUS`, sections separated by `__`
//!    (e.g. `RENDEZVOUS__SERVER__PORT=9000`)
//!
//! A `.env` file (or the file named by `DOTENV_OVERRIDE`) is loaded once before
//! the environment is read.

use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::OnceCell;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod models;
pub use models::*;

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "RENDEZVOUS";

/// Separator between nested keys in environment variable names.
pub const ENV_SEPARATOR: &str = "__";

/// Loads the configuration from `CONFIG_DIR` (default `config`), the run
/// environment's overlay file and the process environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let config_dir = env::var("CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    load_config_from(&config_dir)
}

/// Loads the configuration rooted at an explicit directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(&run_env);

    debug!(
        "Loading configuration from {} (run env: {})",
        config_dir.display(),
        run_env
    );

    let builder = Config::builder()
        .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_path.to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

    builder.build()?.try_deserialize()
}

/// Parses a TOML document into an [`AppConfig`], applying all defaults.
///
/// Mostly useful for tests and tooling that carry their configuration inline.
pub fn load_config_from_toml(source: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// The file named by `DOTENV_OVERRIDE` takes precedence, falling back to
/// `.env` in the working directory. Loading happens at most once per process;
/// a missing file is not an error.
///
/// Returns the path that was (or would have been) loaded.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}
