use botflow::error::PersistenceError;
use botflow::prelude::*;
use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type CliResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Inspect scenario files and manage bots on a botflow backend
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Editor config JSON. Environment variables override the backend section.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Where scenarios are kept when a push fails
    #[arg(long, global = true, default_value = ".botflow-drafts")]
    draft_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise a scenario file: blocks per type, unknown types, broken edges
    Inspect { file: String },
    /// Download a scenario
    Pull {
        bot: String,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Upload a scenario file
    Push { bot: String, file: String },
    /// Create a bot with the starter scenario
    Create {
        bot: String,
        #[arg(long)]
        token: String,
    },
    Rename { old: String, new: String },
    Delete {
        bot: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Write scenario and token to a JSON bundle, or fetch the server archive
    Export {
        bot: String,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        archive: bool,
    },
    /// Create a bot from an exported bundle
    Import { file: String },
    Run { bot: String },
    Stop { bot: String },
    Restart { bot: String },
    Status { bot: String },
    List,
    /// List locally kept drafts, or discard one
    Drafts {
        #[arg(long)]
        discard: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        exit_with_error(&e.to_string());
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> std::result::Result<EditorConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => EditorConfig::from_file(path)?,
        None => EditorConfig::default(),
    };
    config.backend = config.backend.with_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

async fn run(cli: Cli) -> CliResult {
    if let Command::Inspect { file } = &cli.command {
        return inspect(file);
    }
    if let Command::Drafts { discard } = &cli.command {
        return drafts(&cli.draft_dir, discard.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let backend = HttpBackend::new(&config.backend)?;
    let adapter = PersistenceAdapter::new(backend.clone());

    match cli.command {
        Command::Pull { bot, output } => {
            let scenario = adapter.load(&bot).await.map_err(user_facing)?;
            let json = ScenarioDocument::from_scenario(&scenario).to_json_pretty()?;
            write_output(output.as_deref(), json.as_bytes())?;
        }
        Command::Push { bot, file } => {
            let json = fs::read_to_string(&file)?;
            let scenario = ScenarioDocument::from_json(&json)?.into_scenario(&bot, adapter.registry())?;
            if let Err(e) = adapter.save(&scenario).await {
                let store = DraftStore::open(&cli.draft_dir)?;
                let draft = Draft::new(&bot, None, &ScenarioDocument::from_scenario(&scenario))?;
                let path = store.save(&draft)?;
                eprintln!("Scenario kept as a local draft at '{}'", path.display());
                return Err(user_facing(e).into());
            }
            println!("Saved scenario for '{}'", bot);
        }
        Command::Create { bot, token } => {
            let scenario = adapter.create_bot(&bot, &token).await.map_err(user_facing)?;
            println!(
                "Created '{}' with {} blocks",
                scenario.bot_id,
                scenario.blocks.len()
            );
        }
        Command::Rename { old, new } => {
            let existing = adapter.list_bots().await.map_err(user_facing)?;
            match adapter.rename_scenario(&old, &new, &existing).await.map_err(user_facing)? {
                Some(ack) => println!("{}", ack.message.unwrap_or_else(|| format!("Renamed '{}' to '{}'", old, new))),
                None => println!("'{}' already has that name", old),
            }
        }
        Command::Delete { bot, yes } => {
            if !yes && !confirm(&format!("Delete bot \"{}\"?", bot))? {
                println!("Cancelled");
                return Ok(());
            }
            adapter.delete_scenario(&bot).await.map_err(user_facing)?;
            println!("Deleted '{}'", bot);
        }
        Command::Export {
            bot,
            output,
            archive,
        } => {
            if archive {
                let bytes = adapter.export_archive(&bot).await.map_err(user_facing)?;
                let output = output.unwrap_or_else(|| format!("{}.zip", bot));
                write_output(Some(&output), &bytes)?;
            } else {
                let bundle = adapter.export_scenario(&bot).await.map_err(user_facing)?;
                let json = serde_json::to_string_pretty(&bundle)?;
                write_output(output.as_deref(), json.as_bytes())?;
            }
        }
        Command::Import { file } => {
            let upload: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let receipt = adapter.import_scenario(upload).await.map_err(user_facing)?;
            println!(
                "{}",
                receipt
                    .message
                    .unwrap_or_else(|| format!("Imported '{}'", receipt.bot_id))
            );
        }
        Command::Run { bot } => report(BotController::new(backend, bot).run().await?),
        Command::Stop { bot } => report(BotController::new(backend, bot).stop().await?),
        Command::Restart { bot } => report(BotController::new(backend, bot).restart().await?),
        Command::Status { bot } => {
            let controller = BotController::new(backend, bot);
            if let ControlOutcome::Completed(running) = controller.status().await {
                println!(
                    "'{}' is {}",
                    controller.bot_id(),
                    if running { "running" } else { "stopped" }
                );
            }
        }
        Command::List => {
            let bots = adapter.list_bots().await.map_err(user_facing)?;
            if bots.is_empty() {
                println!("No bots");
            }
            for bot in bots {
                println!("{}", bot);
            }
        }
        Command::Inspect { .. } | Command::Drafts { .. } => {}
    }
    Ok(())
}

fn inspect(file: &str) -> CliResult {
    let json = fs::read_to_string(file)?;
    let registry = BlockRegistry::new();
    let scenario = ScenarioDocument::from_json(&json)?.into_scenario("inspect", &registry)?;

    println!("--- Scenario '{}' ---", file);
    println!("Blocks: {}", scenario.blocks.len());
    for (tag, count) in scenario
        .blocks
        .iter()
        .map(|b| b.tag())
        .counts()
        .into_iter()
        .sorted()
    {
        let lookup = registry.lookup(tag);
        let marker = if lookup.is_known() { "" } else { "  (unknown type)" };
        println!("  {:<20} {:>4}  {}{}", tag, count, lookup.label(), marker);
    }

    println!("Edges: {}", scenario.edges.len());
    let dangling = scenario.dangling_edges();
    let misrouted = scenario.misrouted_edges();
    let parallel = scenario
        .edges
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| a.parallels(b))
        .count();
    println!("  dangling:  {}", dangling.len());
    println!("  misrouted: {}", misrouted.len());
    println!("  parallel:  {}", parallel);
    for edge in dangling {
        println!("  ! {} -> {} references a missing block", edge.source, edge.target);
    }
    for edge in misrouted {
        println!("  ! {} leaves '{}' from unknown handle '{}'", edge.id, edge.source, edge.handle());
    }
    if let Some(chat) = scenario.admin_chat_id() {
        println!("Admin chat: {}", chat);
    }
    Ok(())
}

fn drafts(dir: &Path, discard: Option<&str>) -> CliResult {
    let store = DraftStore::open(dir)?;
    if let Some(bot) = discard {
        if store.discard(bot)? {
            println!("Discarded draft for '{}'", bot);
        } else {
            println!("No draft for '{}'", bot);
        }
        return Ok(());
    }
    let bots = store.list()?;
    if bots.is_empty() {
        println!("No drafts in '{}'", store.dir().display());
    }
    for bot in bots {
        if let Some(draft) = store.load(&bot)? {
            let blocks = draft.document().map(|d| d.nodes.len()).unwrap_or_default();
            println!("{:<24} {:>4} blocks  saved at {}", bot, blocks, draft.saved_at);
        }
    }
    Ok(())
}

fn report(outcome: ControlOutcome<botflow::persistence::BackendAck>) {
    match outcome {
        ControlOutcome::Completed(ack) => println!("{}", ack.message.unwrap_or_else(|| "Done".to_string())),
        ControlOutcome::Superseded => println!("A newer request replaced this one"),
    }
}

fn user_facing(e: PersistenceError) -> String {
    e.user_message()
}

fn write_output(path: Option<&str>, bytes: &[u8]) -> io::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, bytes)?;
            eprintln!("Wrote '{}'", path);
            Ok(())
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.write_all(b"\n")
        }
    }
}

/// Ask a yes/no question on stdin. Anything but "y"/"yes" is a no.
fn confirm(question: &str) -> io::Result<bool> {
    print!("> {} [y/N]: ", question);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
