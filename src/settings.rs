use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub routes: Routes,
    #[serde(default)]
    pub storage: Storage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

/// Backend API that owns credentials and identity records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upstream {
    /// Base URL of the admin API, e.g. http://localhost:9000
    pub base_url: String,
    /// Request timeout for identity calls, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// Navigation policy knobs consumed by the guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Where unauthenticated navigations are sent.
    pub login_path: String,
    /// Default landing location after login.
    pub landing_path: String,
    /// Generic not-found location.
    pub not_found_path: String,
    /// Paths reachable without a credential.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
    /// Role that bypasses route filtering entirely.
    #[serde(default = "default_super_role")]
    pub super_role: String,
}

fn default_public_paths() -> Vec<String> {
    vec!["/login".to_string(), "/404".to_string()]
}

fn default_super_role() -> String {
    "superAdmin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routes {
    /// Path to the KDL route document.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    /// Path to persist the session mirror (credential + identity). Default: data/session.json
    pub session_path: PathBuf,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8088,
        }
    }
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            landing_path: "/dashboard".to_string(),
            not_found_path: "/404".to_string(),
            public_paths: default_public_paths(),
            super_role: default_super_role(),
        }
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            path: PathBuf::from("routes.kdl"),
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            session_path: PathBuf::from("data/session.json"),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default("upstream.base_url", Upstream::default().base_url)
            .into_diagnostic()?
            .set_default("auth.login_path", AuthSettings::default().login_path)
            .into_diagnostic()?
            .set_default("auth.landing_path", AuthSettings::default().landing_path)
            .into_diagnostic()?
            .set_default("auth.not_found_path", AuthSettings::default().not_found_path)
            .into_diagnostic()?
            .set_default(
                "routes.path",
                Routes::default().path.to_string_lossy().to_string(),
            )
            .into_diagnostic()?
            .set_default(
                "storage.session_path",
                Storage::default()
                    .session_path
                    .to_string_lossy()
                    .to_string(),
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: GATEHOUSE__SERVER__PORT=9090, etc.
        builder =
            builder.add_source(config::Environment::with_prefix("GATEHOUSE").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        // Normalize storage/route paths to be relative to current dir
        if s.routes.path.is_relative() {
            s.routes.path = std::env::current_dir()
                .into_diagnostic()?
                .join(&s.routes.path);
        }
        if s.storage.session_path.is_relative() {
            s.storage.session_path = std::env::current_dir()
                .into_diagnostic()?
                .join(&s.storage.session_path);
        }

        Ok(s)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
