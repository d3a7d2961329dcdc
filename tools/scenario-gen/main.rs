use botflow::block::BlockKind;
use botflow::graph::{GraphStore, Position, Scenario};
use botflow::persistence::ScenarioDocument;
use clap::Parser;
use rand::rngs::ThreadRng;
use rand::seq::IndexedRandom;
use rand::{Rng, rng};
use serde_json::json;
use std::fs;

/// A CLI tool to generate random but well-formed bot scenarios
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated scenario JSON to
    #[arg(short, long, default_value = "generated_scenario.json")]
    output: String,

    /// Bot id recorded in the generated scenario
    #[arg(long, default_value = "generated_bot")]
    bot: String,

    /// Number of blocks to add on top of the starter scenario
    #[arg(long, default_value_t = 40)]
    blocks: usize,

    /// Maximum number of outgoing edges per exit handle
    #[arg(long, default_value_t = 1)]
    fan_out: usize,
}

const BUTTON_LABELS: &[&str] = &["Yes", "No", "Maybe", "Menu", "Help", "Back", "Contact us"];
const MESSAGES: &[&str] = &[
    "Hello! How can I help?",
    "Please choose an option.",
    "Thanks, we got your answer.",
    "An operator will reply shortly.",
    "See you next time!",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if cli.fan_out == 0 {
        eprintln!("Error: --fan-out must be at least 1");
        std::process::exit(1);
    }
    let mut rng = rng();

    println!(
        "Generating scenario '{}' with {} extra blocks...",
        cli.bot, cli.blocks
    );

    let mut store = GraphStore::from_scenario(Scenario::template(&cli.bot));
    add_blocks(&mut rng, &mut store, cli.blocks)?;
    println!("-> Added {} blocks.", cli.blocks);
    let edges = wire_blocks(&mut rng, &mut store, cli.fan_out)?;
    println!("-> Added {} edges.", edges);

    let document = ScenarioDocument::from_scenario(&store.into_scenario(cli.bot));
    fs::write(&cli.output, document.to_json_pretty()?)?;

    println!(
        "Successfully generated and saved scenario to '{}'",
        cli.output
    );
    Ok(())
}

/// Adds random blocks laid out on a grid below the starter blocks.
fn add_blocks(
    rng: &mut ThreadRng,
    store: &mut GraphStore,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    // `start` only ever appears once, at the top.
    let kinds: Vec<BlockKind> = BlockKind::ALL
        .iter()
        .copied()
        .filter(|k| *k != BlockKind::Start)
        .collect();

    for i in 0..count {
        let kind = *kinds.choose(rng).ok_or("block catalog is empty")?;
        let position = Position::new(
            (i % 6) as f64 * 220.0 + rng.random_range(-20.0..20.0),
            320.0 + (i / 6) as f64 * 160.0 + rng.random_range(-20.0..20.0),
        );
        let id = store.add_block(kind, position).id().to_string();
        store.update_block_data(&id, &random_fields(rng, kind))?;
    }
    Ok(())
}

fn random_fields(rng: &mut ThreadRng, kind: BlockKind) -> serde_json::Value {
    let text = *MESSAGES.choose(rng).unwrap_or(&"");
    match kind {
        BlockKind::Button | BlockKind::InlineButton => {
            let buttons: Vec<_> = (0..rng.random_range(1..=4))
                .map(|i| {
                    let label = *BUTTON_LABELS.choose(rng).unwrap_or(&"Option");
                    json!({ "label": label, "callbackData": format!("btn_{}", i) })
                })
                .collect();
            json!({
                "label": text,
                "buttons": buttons,
                "buttonLayout": if rng.random_bool(0.5) { "row" } else { "column" },
                "buttonsPerRow": rng.random_range(1..=8),
            })
        }
        BlockKind::Condition => json!({ "condition": format!("score > {}", rng.random_range(0..100)) }),
        BlockKind::Delay => json!({
            "hours": rng.random_range(0..3),
            "minutes": rng.random_range(0..60),
            "seconds": rng.random_range(0..60),
        }),
        BlockKind::Input => json!({ "label": text, "variableName": format!("answer_{}", rng.random_range(1..100)) }),
        BlockKind::KeywordProcessor => json!({
            "keywords": ["price", "order", "help"],
            "caseSensitive": rng.random_bool(0.2),
            "matchMode": if rng.random_bool(0.5) { "exact" } else { "partial" },
        }),
        BlockKind::Api => json!({ "url": "https://example.com/hook", "method": "POST" }),
        _ => json!({ "label": text }),
    }
}

/// Connects each block's exits to random later blocks, so the result has no
/// cycles and every edge leaves from a handle its source actually has.
fn wire_blocks(
    rng: &mut ThreadRng,
    store: &mut GraphStore,
    fan_out: usize,
) -> Result<usize, Box<dyn std::error::Error>> {
    // `end` blocks have nowhere to go.
    let plan: Vec<(String, Vec<String>)> = store
        .blocks()
        .iter()
        .map(|b| match b.kind() {
            Some(BlockKind::End) => (b.id().to_string(), Vec::new()),
            _ => (b.id().to_string(), b.exit_handles()),
        })
        .collect();
    let ids: Vec<String> = plan.iter().map(|(id, _)| id.clone()).collect();

    let mut added = 0;
    for (index, (source, handles)) in plan.iter().enumerate() {
        let later = ids.get(index + 1..).unwrap_or_default();
        if later.is_empty() {
            continue;
        }
        for handle in handles {
            for _ in 0..rng.random_range(1..=fan_out) {
                let Some(target) = later.choose(rng) else {
                    continue;
                };
                if store
                    .outgoing(source)
                    .any(|e| e.target == *target && e.handle() == handle.as_str())
                {
                    continue;
                }
                store.add_edge(source, target, Some(handle.as_str()))?;
                added += 1;
            }
        }
    }
    Ok(added)
}
