//! Test relay management.
//!
//! Spawns the chanrelay binary with a generated configuration.

use super::free_port;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A running relay process.
pub struct TestRelay {
    child: Child,
    pub api_port: u16,
    #[allow(dead_code)]
    pub metrics_port: u16,
    _data_dir: TempDir,
}

impl TestRelay {
    /// Spawn a relay wired to the given bridge and intake URLs.
    pub async fn spawn(platform_url: &str, writer_url: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let api_port = free_port();
        let metrics_port = free_port();

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[api]
port = {api_port}
request_timeout_ms = 5000

[metrics]
port = {metrics_port}

[platform]
url = "{platform_url}"
timeout_ms = 2000
poll_timeout_secs = 1

[writer]
url = "{writer_url}"
timeout_ms = 2000

[database]
path = "{db}"

[replica]
name = "chanrelay-0"
range = 1

[delivery]
retry_initial_ms = 10
retry_max_elapsed_ms = 500

[reconcile]
interval_secs = 1

[log]
filter = "chanrelay=debug"
"#,
            db = data_dir.path().join("relay.db").display(),
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_chanrelay"))
            .arg(&config_path)
            .spawn()?;

        let relay = Self {
            child,
            api_port,
            metrics_port,
            _data_dir: data_dir,
        };
        relay.wait_until_ready().await?;
        Ok(relay)
    }

    /// Wait until the control plane is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.api_port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Relay failed to start within 5 seconds")
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.api_port, path)
    }

    /// Value of the `chanrelay_channels_joined` gauge.
    #[allow(dead_code)]
    pub async fn joined_channels(&self) -> Option<i64> {
        let body = reqwest::get(format!("http://127.0.0.1:{}/metrics", self.metrics_port))
            .await
            .ok()?
            .text()
            .await
            .ok()?;
        body.lines()
            .find_map(|line| line.strip_prefix("chanrelay_channels_joined "))
            .and_then(|v| v.trim().parse().ok())
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
