//! WebDriver server management - spawning and health checking chromedriver/geckodriver

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::webdriver::WebDriverClient;

/// Handle to a running WebDriver server process
pub struct DriverHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl DriverHandle {
    /// Spawn the driver binary on a free (or configured) port
    pub async fn spawn(config: DriverConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.arg(format!("--port={}", port));
        cmd.args(&config.extra_args);

        cmd.stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::DriverStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        // Browser logs go to the driver's stderr; a full pipe would block it
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "rwa_e2e::driver", "{}", line);
                }
            });
        }

        let mut handle = DriverHandle {
            child,
            base_url: base_url.clone(),
            port,
        };

        if let Err(e) = handle.wait_for_ready(config.startup_timeout).await {
            handle.stop().await?;
            return Err(e);
        }

        info!("WebDriver is ready at {}", base_url);
        Ok(handle)
    }

    /// Poll `/status` until the driver accepts sessions
    async fn wait_for_ready(&self, timeout_duration: Duration) -> E2eResult<()> {
        let client = WebDriverClient::new(&self.base_url, Duration::from_secs(2))?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.ready().await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    warn!("WebDriver reports not ready");
                }
                Err(E2eError::Http(e)) => {
                    if attempts == 1 {
                        info!("Waiting for WebDriver to start...");
                    }
                    // Connection refused is expected while the driver is starting
                    if !e.is_connect() {
                        warn!("WebDriver status error: {}", e);
                    }
                }
                Err(e) => {
                    warn!("WebDriver status error: {}", e);
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::DriverHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the driver: SIGTERM, a short grace period, then kill
    pub async fn stop(&mut self) -> E2eResult<()> {
        let Some(id) = self.child.id() else {
            // Already reaped
            return Ok(());
        };
        info!("Stopping WebDriver (pid: {})", id);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(id as i32), Signal::SIGTERM).is_ok() {
                if let Ok(status) = tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
                    debug!("WebDriver exited: {:?}", status);
                    return Ok(());
                }
            }
        }

        let _ = self.child.kill().await;
        Ok(())
    }
}

/// How long a SIGTERMed driver gets before it is killed
const STOP_GRACE: Duration = Duration::from_millis(300);

/// Configuration for spawning a driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Path to chromedriver / geckodriver
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Additional command line arguments
    pub extra_args: Vec<String>,

    /// Timeout for driver startup
    pub startup_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("chromedriver"),
            port: None,
            extra_args: Vec::new(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Find a free port to use
pub fn find_free_port() -> E2eResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
