//! `chatrelay config` — validate and show the effective configuration.

use std::path::Path;

use chatrelay_config::AppConfig;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration: {}", config_path.display());

    let config = match AppConfig::load_with_env(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();
    if config.allowed_users.is_empty() {
        warnings.push("allowed_users is empty: every user will be blocked".to_string());
    }
    for backend in config.backends.iter().filter(|b| b.api_key.is_none()) {
        warnings.push(format!("Backend '{}' has no API key", backend.name));
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Language:  {}", config.default_language.code());
    println!("   Users:     {}", describe_users(&config.allowed_users));
    println!(
        "   Retry:     {} attempts, {}ms base delay ×{}, {}s per attempt",
        config.retry.max_attempts,
        config.retry.base_delay_ms,
        config.retry.backoff_factor,
        config.retry.per_attempt_timeout_secs
    );
    println!("   Context:   {} chars", config.context.max_chars);
    for (index, backend) in config.backends.iter().enumerate() {
        println!("   Backend {index}: {backend:?}");
    }

    Ok(())
}

fn describe_users(users: &[String]) -> String {
    if users.iter().any(|u| u == "*") {
        "everyone".into()
    } else if users.is_empty() {
        "nobody".into()
    } else {
        format!("{} allowed", users.len())
    }
}
