//! `chatrelay init` — write the default configuration file.

use std::path::Path;

use chatrelay_config::AppConfig;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("ChatRelay — Setup");
    println!("=================\n");

    if let Some(dir) = config_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run init.\n");
        return Ok(());
    }

    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("✅ Created config at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Add the user ids allowed to chat to `allowed_users`");
    println!("   2. Set a backend key (or export CHATRELAY_API_KEY / HF_API_TOKEN)");
    println!("   3. Run: chatrelay chat --user <ID>\n");

    Ok(())
}
