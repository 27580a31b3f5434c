//! `chatrelay health` — check every configured backend.

use std::path::Path;

use chatrelay_config::AppConfig;
use chatrelay_relay::Relay;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(config_path)?;
    let relay = Relay::from_config(&config);

    let report = relay.health().await;
    for line in render(&report) {
        println!("{line}");
    }

    if report.iter().any(|(_, healthy)| !healthy) {
        return Err("one or more backends are unreachable".into());
    }
    Ok(())
}

/// One line per backend, in failover order.
fn render(report: &[(String, bool)]) -> Vec<String> {
    report
        .iter()
        .enumerate()
        .map(|(idx, (name, healthy))| {
            let status = if *healthy { "✅ ok" } else { "❌ unreachable" };
            format!("  [{idx}] {name:<16} {status}")
        })
        .collect()
}
