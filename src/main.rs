//! folio - book recommendations in the terminal
//!
//! USAGE:
//!   folio                         # interactive chat
//!   folio ask "<query>"           # one turn in the newest chat
//!   folio list                    # list stored chats
//!   folio export [DIR]            # write book-chats-<date>.json
//!   folio import <FILE>           # merge an export into local chats
//!   folio doctor                  # check config, storage, network

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use folio::chat::ChatManager;
use folio::client::{self, HttpRecommender, RecommendationService};
use folio::config::{self, Config, Theme};
use folio::models::Role;
use folio::render;
use folio::store::{self, ChatStore};
use folio::sync::{HttpSync, SyncClient};
use folio::{logging, tui, TurnResult};

// ═══════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, PartialEq)]
enum Command {
    Interactive,
    Ask { query: String },
    List,
    Show { id: String },
    New,
    Delete { id: String },
    Export { dir: PathBuf },
    Import { file: PathBuf },
    Theme { name: String },
    ConfigSet { key: String, value: String },
    Doctor,
    Help,
}

fn parse_args(args: &[String]) -> (Command, u8) {
    let verbose = args
        .iter()
        .map(|a| match a.as_str() {
            "-v" | "--verbose" => 1,
            "-vv" => 2,
            _ => 0,
        })
        .sum::<u8>();
    let args: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !matches!(*a, "-v" | "-vv" | "--verbose"))
        .collect();

    if args.iter().any(|a| *a == "--help" || *a == "-h") {
        return (Command::Help, verbose);
    }

    let arg = |i: usize| args.get(i).map(|s| s.to_string()).unwrap_or_default();
    let command = match args.first().copied() {
        None => Command::Interactive,
        Some("ask") => Command::Ask {
            query: args[1..].join(" "),
        },
        Some("list") => Command::List,
        Some("show") => Command::Show { id: arg(1) },
        Some("new") => Command::New,
        Some("delete") => Command::Delete { id: arg(1) },
        Some("export") => Command::Export {
            dir: PathBuf::from(args.get(1).copied().unwrap_or(".")),
        },
        Some("import") => Command::Import {
            file: PathBuf::from(arg(1)),
        },
        Some("theme") => Command::Theme { name: arg(1) },
        Some("config") if args.get(1).copied() == Some("set") => Command::ConfigSet {
            key: arg(2),
            value: arg(3),
        },
        Some("doctor") => Command::Doctor,
        Some(_) => Command::Help,
    };
    (command, verbose)
}

fn print_help() {
    println!(r#"folio - book recommendations in the terminal

USAGE:
    folio                         # interactive chat
    folio ask "<query>"           # one turn in the newest chat
    folio list                    # list stored chats, newest first
    folio show <id>               # print a chat
    folio new                     # start an empty chat
    folio delete <id>             # delete a chat
    folio export [DIR]            # write book-chats-<date>.json
    folio import <FILE>           # merge an export into local chats
    folio theme <light|dark>      # set the color theme
    folio config set <key> <val>  # keys: endpoint, sync
    folio doctor                  # check config, storage, network

FLAGS:
    -v, --verbose           More logging (repeat for trace)
    -h, --help              Show this help

FILES:
    ~/.config/folio/config.json       Endpoint, sync, theme
    ~/.local/state/folio/chats.json   Stored chats
    ~/.local/state/folio/folio.log    Interactive mode log

ENVIRONMENT:
    FOLIO_ENDPOINT          Override the service endpoint
    RUST_LOG                Override the log filter

CONTROLS (interactive mode):
    Enter       Send            Ctrl+N  New chat
    Up/Down     Select chat     Ctrl+O  Open selected chat
    Ctrl+D      Delete chat     Ctrl+F  Search chats
    Ctrl+R      Retry           Ctrl+T  Toggle theme
    Ctrl+E      Export          F1-F4   Send a suggestion
    Tab         Switch focus    Esc     Clear input
    Ctrl+Q      Quit
"#);
}

// ═══════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, verbose) = parse_args(&args);

    if command == Command::Interactive {
        logging::init_file(&config::log_path()?, verbose)?;
    } else {
        logging::init_stderr(verbose);
    }

    match command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Interactive => run_interactive().await,
        Command::Ask { query } => run_ask(&query).await,
        Command::List => run_list(),
        Command::Show { id } => run_show(&id),
        Command::New => run_new(),
        Command::Delete { id } => run_delete(&id),
        Command::Export { dir } => run_export(&dir),
        Command::Import { file } => run_import(&file),
        Command::Theme { name } => run_theme(&name),
        Command::ConfigSet { key, value } => run_config_set(&key, &value),
        Command::Doctor => run_doctor().await,
    }
}

// ═══════════════════════════════════════════════════════════════
// WIRING
// ═══════════════════════════════════════════════════════════════

fn sync_client(cfg: &Config) -> SyncClient {
    if cfg.sync_enabled {
        SyncClient::new(Arc::new(HttpSync::new(
            &cfg.effective_endpoint(),
            cfg.request_timeout(),
        )))
    } else {
        SyncClient::disabled()
    }
}

fn open_manager(cfg: &Config) -> Result<ChatManager> {
    let store = ChatStore::open_default()?;
    let manager = ChatManager::open(store, sync_client(cfg))
        .context("Failed to open chats")?
        .with_casual_delay(cfg.casual_delay());
    Ok(manager)
}

// ═══════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════

async fn run_interactive() -> Result<()> {
    let cfg = Config::load()?;
    let manager = open_manager(&cfg)?;
    let service: Arc<dyn RecommendationService> = Arc::new(HttpRecommender::new(
        &cfg.effective_endpoint(),
        cfg.request_timeout(),
    ));
    tracing::info!(endpoint = %cfg.effective_endpoint(), "starting interactive chat");
    tui::run_tui(manager, service, cfg).await
}

async fn run_ask(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("Nothing to ask. Usage: folio ask \"<query>\"");
    }
    let cfg = Config::load()?;
    let mut manager = open_manager(&cfg)?;
    let service = HttpRecommender::new(&cfg.effective_endpoint(), cfg.request_timeout());

    let report = manager.submit(query, &service).await?;
    if let Some(TurnResult::Failed(e)) = report.as_ref().map(|r| &r.result) {
        eprintln!("Request failed: {}", e);
    }

    let view = manager.view();
    if let Some(reply) = view.transcript.messages.last() {
        println!("{}\n", reply.text());
    }
    if let Some(panel) = &view.transcript.panel {
        println!("{}\n", panel.heading);
        for card in &panel.cards {
            println!("  {} ({})", card.title, card.category);
            println!("    {}\n", card.summary);
        }
    }
    Ok(())
}

fn run_list() -> Result<()> {
    let store = ChatStore::open_default()?;
    let chats = store.load();
    let active = folio::models::newest_session_id(&chats).unwrap_or_default();
    let entries = render::render_session_list(&chats, &active);

    if entries.is_empty() {
        println!("No chats yet. Run `folio` to start one.");
    }
    for entry in entries {
        println!("{}  {:<14} {}", entry.id, entry.date, entry.preview);
    }
    Ok(())
}

fn run_show(id: &str) -> Result<()> {
    let store = ChatStore::open_default()?;
    let messages = store
        .messages(id)
        .with_context(|| format!("No chat with id {}", id))?;

    let transcript = render::render_transcript(&messages);
    for (message, rendered) in messages
        .iter()
        .filter(|m| m.role != Role::Recommendations)
        .zip(&transcript.messages)
    {
        let who = match message.role {
            Role::User => "you",
            Role::Error => "error",
            _ => "folio",
        };
        println!("[{}] {}: {}\n", message.timestamp.format("%H:%M"), who, rendered.text());
    }
    if let Some(panel) = transcript.panel {
        println!("{}", panel.heading);
        for card in panel.cards {
            println!("  {} ({})", card.title, card.category);
        }
    }
    Ok(())
}

fn run_new() -> Result<()> {
    let cfg = Config::load()?;
    let mut manager = open_manager(&cfg)?;
    let id = manager.new_session()?;
    println!("Started chat {}", id);
    Ok(())
}

fn run_delete(id: &str) -> Result<()> {
    let cfg = Config::load()?;
    let mut manager = open_manager(&cfg)?;
    if !manager.delete_session(id)? {
        anyhow::bail!("No chat with id {}", id);
    }
    println!("Deleted chat {}", id);
    Ok(())
}

fn run_export(dir: &std::path::Path) -> Result<()> {
    let store = ChatStore::open_default()?;
    let path = dir.join(store::export_file_name(chrono::Local::now().date_naive()));
    std::fs::write(&path, store.export()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Exported chats to {}", path.display());
    Ok(())
}

fn run_import(file: &std::path::Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let cfg = Config::load()?;
    let mut manager = open_manager(&cfg)?;
    let total = manager.import(&bytes)?;
    println!("Imported {} ({} chats stored)", file.display(), total);
    Ok(())
}

fn run_theme(name: &str) -> Result<()> {
    let theme: Theme = name.parse()?;
    let mut cfg = Config::load()?;
    cfg.theme = theme;
    cfg.save()?;
    println!("Theme set to: {}", theme.name());
    Ok(())
}

fn run_config_set(key: &str, value: &str) -> Result<()> {
    let mut cfg = Config::load()?;

    match key {
        "endpoint" => {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                anyhow::bail!("Endpoint must be an http(s) URL: {}", value);
            }
            cfg.endpoint = value.trim_end_matches('/').to_string();
            cfg.save()?;
            println!("Endpoint set to: {}", cfg.endpoint);
        }
        "sync" => {
            cfg.sync_enabled = match value {
                "on" | "true" | "yes" => true,
                "off" | "false" | "no" => false,
                other => anyhow::bail!("Expected on or off, got: {}", other),
            };
            cfg.save()?;
            println!("Sync {}", if cfg.sync_enabled { "enabled" } else { "disabled" });
        }
        _ => {
            anyhow::bail!("Unknown config key: {}. Valid keys: endpoint, sync", key);
        }
    }
    Ok(())
}

async fn run_doctor() -> Result<()> {
    println!("folio doctor\n");

    let cfg = Config::load()?;
    println!("[✓] Config: {}", config::config_path()?.display());
    println!("[✓] Theme: {}", cfg.theme.name());

    let chats_path = config::chats_path()?;
    let chats = ChatStore::open(&chats_path).load();
    println!(
        "[{}] Chats: {} ({} stored)",
        if chats_path.exists() { "✓" } else { "✗" },
        chats_path.display(),
        chats.len()
    );

    let endpoint = cfg.effective_endpoint();
    println!(
        "[{}] Sync: {}",
        if cfg.sync_enabled { "✓" } else { "-" },
        if cfg.sync_enabled { "enabled" } else { "disabled" }
    );

    print!("[?] Service: checking {}...", endpoint);
    match client::check_connectivity(&endpoint).await {
        Ok(()) => println!("\r[✓] Service: {} reachable         ", endpoint),
        Err(e) => println!("\r[✗] Service: {:#}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_interactive_default() {
        assert_eq!(parse_args(&[]), (Command::Interactive, 0));
        assert_eq!(parse_args(&args(&["-v"])), (Command::Interactive, 1));
    }

    #[test]
    fn test_parse_ask_joins_words() {
        let (cmd, _) = parse_args(&args(&["ask", "fantasy", "books"]));
        assert_eq!(cmd, Command::Ask { query: "fantasy books".into() });
    }

    #[test]
    fn test_parse_export_defaults_to_cwd() {
        let (cmd, _) = parse_args(&args(&["export"]));
        assert_eq!(cmd, Command::Export { dir: PathBuf::from(".") });
    }

    #[test]
    fn test_parse_config_set() {
        let (cmd, verbose) = parse_args(&args(&["config", "set", "sync", "off", "--verbose"]));
        assert_eq!(cmd, Command::ConfigSet { key: "sync".into(), value: "off".into() });
        assert_eq!(verbose, 1);
    }

    #[test]
    fn test_parse_unknown_shows_help() {
        assert_eq!(parse_args(&args(&["frobnicate"])).0, Command::Help);
        assert_eq!(parse_args(&args(&["list", "--help"])).0, Command::Help);
    }
}
