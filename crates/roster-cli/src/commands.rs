use anyhow::{anyhow, Context};
use colored::Colorize;
use roster_store::{open_store, Player, PlayerStore, StoreConfig};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let store = open_store(&config).with_context(|| {
        format!("failed to open {} store at {}", config.backend, config.path.display())
    })?;
    let result = dispatch(store.as_ref(), cli.command, &cli.format);
    store.close()?;
    result
}

/// Merge the optional config file with command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let base = match &cli.config {
        Some(path) => Some(
            StoreConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
        ),
        None => None,
    };
    let backend = cli
        .backend
        .or(base.as_ref().map(|c| c.backend))
        .ok_or_else(|| anyhow!("no backend selected: pass --backend or --config"))?;
    let path = cli
        .file
        .clone()
        .or(base.as_ref().map(|c| c.path.clone()))
        .ok_or_else(|| anyhow!("no store file selected: pass --file or --config"))?;
    let sync = cli.sync || base.is_some_and(|c| c.sync_writes);
    Ok(StoreConfig::new(backend, path).with_sync_writes(sync))
}

fn dispatch(
    store: &dyn PlayerStore,
    command: Command,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Command::Add(args) => cmd_add(store, args, format),
        Command::Remove(args) => cmd_remove(store, args.id, format),
        Command::Update(args) => cmd_update(store, args, format),
        Command::Get(args) => cmd_get(store, args.id, format),
        Command::List => cmd_list(store, format),
    }
}

fn cmd_add(store: &dyn PlayerStore, args: AddArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let player = Player::new(args.id, args.nick, args.experience, args.life_level, args.coins);
    let added = store.add(&player)?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "id": player.id, "added": added })),
        OutputFormat::Text if added => {
            println!("{} Added player {}", "✓".green().bold(), player.id)
        }
        OutputFormat::Text => {
            println!("{} Player {} already exists", "!".yellow().bold(), player.id)
        }
    }
    Ok(())
}

fn cmd_remove(store: &dyn PlayerStore, id: i32, format: &OutputFormat) -> anyhow::Result<()> {
    let removed = store.remove(id)?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "id": id, "removed": removed })),
        OutputFormat::Text if removed => println!("{} Removed player {}", "✓".green().bold(), id),
        OutputFormat::Text => println!("Player {} not found", id),
    }
    Ok(())
}

fn cmd_update(
    store: &dyn PlayerStore,
    args: UpdateArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let Some(current) = store.get(args.id)? else {
        match format {
            OutputFormat::Json => println!("{}", json!({ "id": args.id, "updated": false })),
            OutputFormat::Text => println!("Player {} not found", args.id),
        }
        return Ok(());
    };
    let player = Player {
        nick: args.nick.unwrap_or(current.nick),
        experience: args.experience.unwrap_or(current.experience),
        life_level: args.life_level.unwrap_or(current.life_level),
        coins: args.coins.unwrap_or(current.coins),
        ..current
    };
    store.update(args.id, &player)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&player)?),
        OutputFormat::Text => println!("{} Updated {}", "✓".green().bold(), player),
    }
    Ok(())
}

fn cmd_get(store: &dyn PlayerStore, id: i32, format: &OutputFormat) -> anyhow::Result<()> {
    let player = store.get(id)?;
    match (format, player) {
        (OutputFormat::Json, player) => println!("{}", serde_json::to_string_pretty(&player)?),
        (OutputFormat::Text, Some(player)) => println!("{}", player.to_string().cyan()),
        (OutputFormat::Text, None) => println!("Player {} not found", id),
    }
    Ok(())
}

fn cmd_list(store: &dyn PlayerStore, format: &OutputFormat) -> anyhow::Result<()> {
    let players = store.list()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&players)?),
        OutputFormat::Text if players.is_empty() => println!("No players."),
        OutputFormat::Text => {
            for player in &players {
                println!("{}", player);
            }
            println!("{} player(s)", players.len().to_string().bold());
        }
    }
    Ok(())
}
