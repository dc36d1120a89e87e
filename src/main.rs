use anyhow::{bail, Context, Result};
use clap::Parser;
use steam_inventory::inventory::{AggregateInventory, FetchRun, InventoryFetcher, RunOutcome};
use steam_inventory::tracing::init_tracing;
use steam_inventory::util::env::{env_flag, init_env};
use steam_inventory::InventoryConfig;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "steam-inventory",
    version,
    about = "Fetch every Steam community inventory a profile exposes"
)]
struct Cli {
    /// 64-bit Steam id of the profile owner
    steam_id: u64,
    /// Only fetch these app ids (repeatable)
    #[arg(long = "app")]
    apps: Vec<u32>,
    /// Also fetch another user's inventory as `steamid:appid:contextid` (needs STEAM_SESSION_ID)
    #[arg(long = "foreign", value_parser = parse_foreign)]
    foreign: Vec<ForeignTarget>,
    /// Print the aggregate as JSON instead of a summary (env: INVENTORY_OUTPUT_JSON)
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug)]
struct ForeignTarget {
    steam_id: u64,
    app_id: u32,
    context_id: u64,
}

fn parse_foreign(raw: &str) -> Result<ForeignTarget> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [steam_id, app_id, context_id] = parts.as_slice() else {
        bail!("expected steamid:appid:contextid, got {raw:?}");
    };
    Ok(ForeignTarget {
        steam_id: steam_id.parse::<u64>().context("steamid")?,
        app_id: app_id.parse::<u32>().context("appid")?,
        context_id: context_id.parse::<u64>().context("contextid")?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env();
    init_tracing("info,steam_inventory=info")?;
    let cli = Cli::parse();
    let json = cli.json || env_flag("INVENTORY_OUTPUT_JSON", false);

    let config = InventoryConfig::from_env();
    info!(
        base = %config.community_base,
        max_concurrency = config.max_concurrency,
        max_attempts = config.max_attempts,
        "starting inventory fetch"
    );
    let fetcher = InventoryFetcher::from_config(&config)?;
    let filter = (!cli.apps.is_empty()).then(|| cli.apps.clone());
    let run = fetcher.fetch_inventories(cli.steam_id, filter);

    let aggregate = run.get_aggregate().await;
    let outcome = run.outcome().await;
    if outcome.is_private {
        warn!(steam_id = cli.steam_id, "profile inventory is private");
    }

    let aggregate = if cli.foreign.is_empty() {
        aggregate
    } else {
        add_foreign(&run, &cli.foreign).await;
        run.get_aggregate().await
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&aggregate)?);
    } else {
        print_summary(cli.steam_id, &outcome, &aggregate);
    }

    if !outcome.success {
        std::process::exit(2);
    }
    Ok(())
}

async fn add_foreign(run: &FetchRun, targets: &[ForeignTarget]) {
    for t in targets {
        let added = run
            .add_foreign_inventory(t.steam_id, t.app_id, t.context_id)
            .await;
        info!(
            steam_id = t.steam_id,
            app_id = t.app_id,
            context_id = t.context_id,
            added,
            "foreign inventory"
        );
    }
}

fn print_summary(steam_id: u64, outcome: &RunOutcome, aggregate: &AggregateInventory) {
    println!(
        "steam id {steam_id}: {} of {} inventories loaded ({} already present, {} failed){}",
        outcome.stored,
        outcome.discovered,
        outcome.already_present,
        outcome.failed,
        if outcome.is_private { ", profile private" } else { "" }
    );
    for (pair, inventory) in aggregate.iter() {
        println!(
            "  {pair} owner={} items={} currency={} descriptions={}",
            inventory.owner_id,
            inventory.regular_items().count(),
            inventory.currency_items().count(),
            inventory.descriptions().len(),
        );
    }
}
