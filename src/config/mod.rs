// Configuration module entry point
// Manages application configuration and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, ValidationStrategy};

/// Default config file, looked up without extension
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("SERVER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    fn defaults() -> Result<
        config::ConfigBuilder<config::builder::DefaultState>,
        config::ConfigError,
    > {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9898)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "etagd/0.1")?
            .set_default("files.root_dir", ".")?
            .set_default("files.default_document", "index.html")?
            .set_default("files.validation", "etag")?
            .set_default("files.max_file_size", 104_857_600)? // 100MB
            .set_default("files.fingerprint_cache", false)?
            .set_default("files.fingerprint_cache_capacity", 1024)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
impl Config {
    /// Built-in defaults with the file root pointed at `root_dir`
    pub fn for_root(root_dir: &std::path::Path) -> Self {
        let mut cfg: Self = Self::defaults()
            .and_then(|builder| builder.build())
            .and_then(config::Config::try_deserialize)
            .expect("built-in defaults deserialize");
        cfg.files.root_dir = root_dir.display().to_string();
        cfg.logging.access_log = false;
        cfg
    }
}
