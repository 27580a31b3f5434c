//! `chatrelay ask` — relay a single question.

use std::path::Path;

use chatrelay_config::AppConfig;
use chatrelay_relay::{Query, Relay};

pub async fn run(
    config_path: &Path,
    user: String,
    message: String,
    lang: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(config_path)?;
    let relay = Relay::from_config(&config);

    let mut query = Query::new(user, message);
    if let Some(lang) = lang {
        query = query.with_language(lang);
    }

    let reply = relay.handle(query).await;
    println!("{}", reply.text);

    Ok(())
}
