//! `threadrelay status`: check whether a relay is running and what it tracks.

use std::path::Path;
use std::time::Duration;

use threadrelay_protocol::HealthResponse;

use crate::VERSION;

pub async fn run(url: &str, data_dir: &Path) -> anyhow::Result<()> {
    let health_url = format!("{}/health", url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(1))
        .timeout(Duration::from_secs(2))
        .build()?;

    let health = match client.get(&health_url).send().await {
        Ok(response) if response.status().is_success() => {
            Ok(response.json::<HealthResponse>().await?)
        }
        Ok(response) => Err(format!("HTTP {}", response.status())),
        Err(err) => Err(err.to_string()),
    };

    println!();
    for line in status_lines(&health_url, data_dir, &health) {
        println!("  {line}");
    }
    println!();
    Ok(())
}

fn status_lines(
    health_url: &str,
    data_dir: &Path,
    health: &Result<HealthResponse, String>,
) -> Vec<String> {
    let mut lines = vec![
        format!("threadrelay v{VERSION}"),
        format!("Data dir: {}", data_dir.display()),
    ];
    match health {
        Ok(health) => {
            lines.push(format!("Health: {} ({health_url})", health.status));
            lines.push(format!("Linked issues: {}", health.mapped_issues));
            lines.push(format!("Cached states: {}", health.cached_states));
        }
        Err(reason) => {
            lines.push(format!("Health: unreachable ({reason})"));
            lines.push("Relay is not running. Start with: threadrelay serve".to_string());
        }
    }
    lines
}
