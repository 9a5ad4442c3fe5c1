mod config;
mod directory;

pub use config::{
    CONFIG_FILE_NAME, ChapelConfig, DEFAULT_CONFIG_TOML, DEFAULT_SECRET_ENV, MemberConfig,
    RestrictedScope, RouteConfig, SessionConfig, default_config_dir, load_config_from_dir,
    load_config_from_file, parse_config, path_has_prefix, validate_config,
    write_default_config_file,
};
pub use directory::{
    DEFAULT_MAX_MEMBERS, HASH_ITERATIONS, MemberDirectory, SALT_BYTES, generate_salt,
    hash_password,
};

use chapel_api::{ChapelError, SecretStore};

pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, secret_ref: &str) -> Result<String, ChapelError> {
        std::env::var(secret_ref)
            .map_err(|_| ChapelError::NotFound(format!("missing secret env var {secret_ref}")))
    }
}

/// Read the session secret once. Absent or blank values are a config error.
pub fn load_session_secret(
    store: &dyn SecretStore,
    cfg: &SessionConfig,
) -> Result<String, ChapelError> {
    match store.get(&cfg.secret_env) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        Ok(_) | Err(ChapelError::NotFound(_)) => Err(ChapelError::Config(format!(
            "session secret {} is not set",
            cfg.secret_env
        ))),
        Err(e) => Err(e),
    }
}
