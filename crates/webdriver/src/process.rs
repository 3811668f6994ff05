//! Driver process management - spawning and readiness checking a WebDriver
//! binary (chromedriver, msedgedriver, geckodriver)

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{SessionError, SessionResult};

/// Handle to a running driver process
pub struct DriverProcess {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl DriverProcess {
    /// Spawn the driver binary and wait until it accepts sessions
    pub async fn spawn(config: DriverProcessConfig) -> SessionResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.arg(format!("--port={}", port))
            .args(&config.extra_args)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| {
            SessionError::DriverStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let mut handle = DriverProcess {
            child,
            base_url: base_url.clone(),
            port,
        };

        if let Err(e) = handle.wait_until_ready(config.startup_timeout).await {
            let _ = handle.stop();
            return Err(e);
        }

        info!("Driver is ready at {}", base_url);
        Ok(handle)
    }

    /// Poll `GET /status` until the driver reports `value.ready`
    async fn wait_until_ready(&mut self, timeout_duration: Duration) -> SessionResult<()> {
        let status_url = format!("{}/status", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            if let Some(status) = self.child.try_wait()? {
                return Err(SessionError::DriverStartup(format!("driver exited early with {}", status)));
            }

            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: serde_json::Value = resp.json().await?;
                    if is_ready(&body) {
                        return Ok(());
                    }
                }
                Ok(resp) => {
                    warn!("Status check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for driver to start...");
                    }
                    // Connection refused is expected while the driver is starting
                    if !e.is_connect() {
                        warn!("Status check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(SessionError::DriverHealthCheck(attempts))
    }

    /// Get the WebDriver endpoint for this process
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the driver
    pub fn stop(&mut self) -> SessionResult<()> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }

        info!("Stopping driver (pid: {})", self.child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        // Force kill if still running
        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a driver
#[derive(Debug, Clone)]
pub struct DriverProcessConfig {
    /// Path to the driver binary
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Extra command-line arguments
    pub extra_args: Vec<String>,

    /// Timeout for driver startup
    pub startup_timeout: Duration,
}

impl Default for DriverProcessConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("chromedriver"),
            port: None,
            extra_args: Vec::new(),
            startup_timeout: Duration::from_secs(20),
        }
    }
}

/// `{"value": {"ready": true, ...}}` per the W3C status endpoint
fn is_ready(body: &serde_json::Value) -> bool {
    body.pointer("/value/ready")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Find a free port to use
fn find_free_port() -> SessionResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
