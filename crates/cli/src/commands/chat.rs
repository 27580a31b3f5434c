//! `chatrelay chat` — interactive session for one user.
//!
//! Plain lines are questions. Slash commands map to relay operations:
//! `/reset`, `/rephrase`, `/lang CODE`, `/quit`.

use std::io::Write;
use std::path::Path;

use chatrelay_config::AppConfig;
use chatrelay_core::UserId;
use chatrelay_relay::{Query, Relay, Reply};
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Ask(String),
    Reset,
    Rephrase,
    Language(String),
    Quit,
    Help,
}

fn parse_line(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Ask(line.to_string()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    Some(match name {
        "reset" | "start" => Input::Reset,
        "rephrase" => Input::Rephrase,
        "lang" | "language" => Input::Language(arg.to_string()),
        "quit" | "exit" | "q" => Input::Quit,
        "help" => Input::Help,
        // Unknown commands are sent as questions.
        _ => Input::Ask(line.to_string()),
    })
}

pub async fn run(config_path: &Path, user: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(config_path)?;
    let relay = Relay::from_config(&config);
    let user_id = UserId::new(user);

    println!();
    println!("  ChatRelay — Interactive Mode");
    println!();
    println!("  User:      {user_id}");
    println!("  Backends:  {}", describe_backends(&config));
    println!();
    println!("  Type your question and press Enter.");
    println!("  /reset, /rephrase, /lang CODE, /quit");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let Some(input) = parse_line(&line) else {
            prompt()?;
            continue;
        };

        let reply = match input {
            Input::Quit => break,
            Input::Help => {
                println!("  /reset        clear history and start over");
                println!("  /rephrase     ask the backend to clarify your last question");
                println!("  /lang CODE    switch language (en, ar)");
                println!("  /quit         leave");
                prompt()?;
                continue;
            }
            Input::Ask(text) => {
                eprint!("  ...");
                let reply = relay.handle(Query::new(user_id.clone(), text)).await;
                eprint!("\r     \r");
                reply
            }
            Input::Reset => relay.reset(&user_id).await,
            Input::Rephrase => relay.rephrase(&user_id).await,
            Input::Language(code) => relay.set_language(&user_id, &code).await,
        };

        print_reply(&reply);
        prompt()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_reply(reply: &Reply) {
    println!();
    let label = if reply.is_generated() { "Assistant" } else { "Relay" };
    for line in reply.text.lines() {
        println!("  {label} > {line}");
    }
    println!();
}

fn describe_backends(config: &AppConfig) -> String {
    config
        .backends
        .iter()
        .map(|b| b.name.as_str())
        .collect::<Vec<_>>()
        .join(" → ")
}
