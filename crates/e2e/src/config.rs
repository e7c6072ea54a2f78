//! Runner configuration
//!
//! Loaded from `rwa-e2e.toml` when present, then overridden from the
//! environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::{Viewport, DEFAULT_MOBILE_BREAKPOINT};
use crate::error::{E2eError, E2eResult};
use crate::seed::DEFAULT_FIXTURE_PASSWORD;
use crate::visual::VisualConfig;
use crate::webdriver::BrowserKind;

pub const DEFAULT_CONFIG_FILE: &str = "rwa-e2e.toml";

pub const ENV_BASE_URL: &str = "RWA_BASE_URL";
pub const ENV_API_URL: &str = "RWA_API_URL";
pub const ENV_WEBDRIVER_URL: &str = "RWA_WEBDRIVER_URL";
pub const ENV_SEED_COMMAND: &str = "RWA_SEED_COMMAND";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    /// Results file and per-run artifacts
    pub output_dir: OutputConfig,
    pub app: AppConfig,
    pub browser: BrowserConfig,
    pub timeouts: TimeoutConfig,
    pub seed: SeedConfig,
    pub proxy: ProxyConfig,
    pub visual: VisualConfig,
}

/// Application under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frontend origin paths are resolved against
    pub base_url: String,

    /// Backend API origin; exposed to suites as `{{apiUrl}}`
    pub api_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:3001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: BrowserKind,

    /// Attach to an existing WebDriver server instead of spawning one
    pub webdriver_url: Option<String>,

    /// Driver binary to spawn when no URL is given
    pub driver_binary: Option<PathBuf>,

    pub headless: bool,
    pub viewport: Viewport,

    /// Widths below this collapse the side navigation
    pub mobile_breakpoint: u32,

    /// `data-test` id of the side navigation toggle
    pub nav_toggle: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Chrome,
            webdriver_url: None,
            driver_binary: None,
            headless: true,
            viewport: Viewport::DESKTOP,
            mobile_breakpoint: DEFAULT_MOBILE_BREAKPOINT,
            nav_toggle: "sidenav-toggle".to_string(),
        }
    }
}

impl BrowserConfig {
    pub fn driver_binary(&self) -> PathBuf {
        self.driver_binary
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.kind.driver_binary()))
    }
}

/// All values in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Implicit wait for elements and assertions
    pub command_ms: u64,
    /// Default for `wait` steps
    pub request_ms: u64,
    pub page_load_ms: u64,
    /// Whole-scenario budget
    pub scenario_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_ms: 4_000,
            request_ms: 5_000,
            page_load_ms: 60_000,
            scenario_ms: 120_000,
        }
    }
}

impl TimeoutConfig {
    pub fn command(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    /// `POST {apiUrl}/testData/seed`
    #[default]
    Http,
    /// Run `seed.command`
    Command,
    /// Suites run against whatever data exists
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub mode: SeedMode,
    pub command: Vec<String>,
    pub find_user_command: Vec<String>,
    /// Password seeded users are created with
    pub password: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            mode: SeedMode::Http,
            command: Vec::new(),
            find_user_command: Vec::new(),
            password: DEFAULT_FIXTURE_PASSWORD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Route browser traffic through the intercept proxy
    pub enabled: bool,
    pub listen: SocketAddr,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputConfig(pub PathBuf);

impl Default for OutputConfig {
    fn default() -> Self {
        Self(PathBuf::from("test-results"))
    }
}

impl E2eConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Load, apply environment overrides, validate
    pub fn resolve(path: &Path) -> E2eResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.app.base_url = url;
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.app.api_url = url;
        }
        if let Some(url) = non_empty(ENV_WEBDRIVER_URL) {
            self.browser.webdriver_url = Some(url);
        }
        if let Some(cmd) = non_empty(ENV_SEED_COMMAND) {
            self.seed.mode = SeedMode::Command;
            self.seed.command = cmd.split_whitespace().map(String::from).collect();
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        url::Url::parse(&self.app.base_url)
            .map_err(|e| E2eError::InvalidConfig(format!("app.base_url: {}", e)))?;
        url::Url::parse(&self.app.api_url)
            .map_err(|e| E2eError::InvalidConfig(format!("app.api_url: {}", e)))?;
        if self.seed.mode == SeedMode::Command && self.seed.command.is_empty() {
            return Err(E2eError::InvalidConfig(
                "seed.mode is 'command' but seed.command is empty".to_string(),
            ));
        }
        if self.timeouts.command_ms == 0 || self.timeouts.scenario_ms == 0 {
            return Err(E2eError::InvalidConfig("timeouts must be non-zero".to_string()));
        }
        if !(0.0..=100.0).contains(&self.visual.threshold) {
            return Err(E2eError::InvalidConfig(
                "visual.threshold must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir.0
    }

    /// `{{apiUrl}}/graphql`
    pub fn graphql_endpoint(&self) -> String {
        format!("{}/graphql", self.app.api_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = E2eConfig::default();
        assert_eq!(config.graphql_endpoint(), "http://localhost:3001/graphql");
        assert_eq!(config.browser.viewport, Viewport::DESKTOP);
        assert_eq!(config.seed.password, "s3cret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = E2eConfig::default();
        config.apply_env(|key| match key {
            ENV_API_URL => Some("http://api.test:4000/".to_string()),
            ENV_SEED_COMMAND => Some("yarn db:seed:dev".to_string()),
            ENV_BASE_URL => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.graphql_endpoint(), "http://api.test:4000/graphql");
        assert_eq!(config.app.base_url, "http://localhost:3000");
        assert_eq!(config.seed.mode, SeedMode::Command);
        assert_eq!(config.seed.command, vec!["yarn", "db:seed:dev"]);
    }

    #[test]
    fn test_partial_toml_and_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rwa-e2e.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "out"

[browser]
kind = "firefox"
viewport = { width = 375, height = 667 }

[timeouts]
command_ms = 10000
"#,
        )
        .unwrap();

        let config = E2eConfig::load(&path).unwrap();
        assert_eq!(config.browser.kind, BrowserKind::Firefox);
        assert_eq!(config.browser.viewport, Viewport::MOBILE);
        assert_eq!(config.browser.driver_binary(), PathBuf::from("geckodriver"));
        assert_eq!(config.timeouts.command_ms, 10_000);
        assert_eq!(config.timeouts.scenario_ms, 120_000);
        assert_eq!(config.output_dir(), Path::new("out"));

        let saved = dir.path().join("saved.toml");
        config.save(&saved).unwrap();
        let reloaded = E2eConfig::load(&saved).unwrap();
        assert_eq!(reloaded.timeouts.command_ms, 10_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = E2eConfig::default();
        config.seed.mode = SeedMode::Command;
        assert!(config.validate().is_err());

        let mut config = E2eConfig::default();
        config.app.api_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
