//! Wires a runner to real collaborators from [`E2eConfig`]
//!
//! Starts (or attaches to) a WebDriver server, puts the intercept proxy in
//! front of the browser and picks the configured seeder.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::config::{E2eConfig, SeedMode};
use crate::driver::{DriverConfig, DriverHandle};
use crate::error::{E2eError, E2eResult};
use crate::intercept::InterceptLedger;
use crate::proxy::InterceptProxy;
use crate::runner::{RunSettings, ScenarioRunner};
use crate::seed::{CommandSeeder, HttpSeeder, NoopSeeder, Seeder};
use crate::webdriver::{SessionOptions, WebDriverClient, WebDriverLauncher};

/// Timeout for a single WebDriver command that is not a page load
const WEBDRIVER_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A runner plus the processes and servers it depends on
pub struct Harness {
    runner: ScenarioRunner,
    proxy: Option<InterceptProxy>,
    driver: Option<DriverHandle>,
}

impl Harness {
    pub async fn start(config: &E2eConfig) -> E2eResult<Self> {
        let ledger = Arc::new(InterceptLedger::new());

        let proxy = if config.proxy.enabled {
            let upstream = Url::parse(&config.app.base_url)?;
            Some(InterceptProxy::start(config.proxy.listen, upstream, ledger.clone()).await?)
        } else {
            warn!("Intercept proxy disabled; wait steps will time out");
            None
        };

        let (driver, webdriver_url) = match &config.browser.webdriver_url {
            Some(url) => {
                info!("Attaching to WebDriver at {}", url);
                (None, url.clone())
            }
            None => {
                let handle = DriverHandle::spawn(DriverConfig {
                    binary_path: config.browser.driver_binary(),
                    ..Default::default()
                })
                .await?;
                let url = handle.base_url().to_string();
                (Some(handle), url)
            }
        };

        let client = WebDriverClient::new(
            &webdriver_url,
            config.timeouts.page_load().max(WEBDRIVER_COMMAND_TIMEOUT),
        )?;
        if driver.is_none() && !client.ready().await? {
            return Err(E2eError::DriverStartup(format!(
                "WebDriver at {} is not accepting sessions",
                webdriver_url
            )));
        }

        let options = SessionOptions {
            browser: config.browser.kind,
            headless: config.browser.headless,
            proxy: proxy.as_ref().map(InterceptProxy::addr),
            page_load_timeout: config.timeouts.page_load(),
        };
        let launcher = Arc::new(WebDriverLauncher::new(client, options));

        let runner = ScenarioRunner::new(
            RunSettings::from_config(config)?,
            launcher,
            seeder_for(config)?,
            ledger,
        );

        Ok(Self {
            runner,
            proxy,
            driver,
        })
    }

    pub fn runner(&self) -> &ScenarioRunner {
        &self.runner
    }

    /// Replace the runner, e.g. to force a viewport
    pub fn map_runner(mut self, f: impl FnOnce(ScenarioRunner) -> ScenarioRunner) -> Self {
        self.runner = f(self.runner);
        self
    }

    pub async fn shutdown(mut self) -> E2eResult<()> {
        if let Some(proxy) = self.proxy.take() {
            proxy.shutdown().await;
        }
        if let Some(mut driver) = self.driver.take() {
            driver.stop().await?;
        }
        Ok(())
    }
}

/// Seeder selected by `seed.mode`
pub fn seeder_for(config: &E2eConfig) -> E2eResult<Arc<dyn Seeder>> {
    Ok(match config.seed.mode {
        SeedMode::Http => Arc::new(HttpSeeder::new(
            &config.app.api_url,
            config.seed.password.clone(),
            config.timeouts.request(),
        )?),
        SeedMode::Command => {
            let find_user = if config.seed.find_user_command.is_empty() {
                None
            } else {
                Some(config.seed.find_user_command.clone())
            };
            Arc::new(CommandSeeder::new(
                config.seed.command.clone(),
                find_user,
                config.seed.password.clone(),
            )?)
        }
        SeedMode::Disabled => Arc::new(NoopSeeder),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeder_for_modes() {
        let mut config = E2eConfig::default();
        assert!(seeder_for(&config).is_ok());

        config.seed.mode = SeedMode::Command;
        assert!(seeder_for(&config).is_err());

        config.seed.command = vec!["true".to_string()];
        assert!(seeder_for(&config).is_ok());

        config.seed.mode = SeedMode::Disabled;
        assert!(seeder_for(&config).is_ok());
    }
}
