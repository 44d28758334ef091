use anyhow::{Context, Result};
use kalshi_entry::config::{self, Config};
use kalshi_entry::engine::EntryModel;
use kalshi_entry::execution::{OrderExecutor, TradeGuards};
use kalshi_entry::feed::EspnFeed;
use kalshi_entry::kalshi::{auth::KalshiAuth, rest::KalshiRest};
use kalshi_entry::pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "kalshi-entry.log";

struct Args {
    live: bool,
    once: bool,
    cancel_resting: bool,
    config: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        live: false,
        once: false,
        cancel_resting: false,
        config: PathBuf::from("config.toml"),
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--live" => args.live = true,
            "--once" => args.once = true,
            "--cancel-resting" => args.cancel_resting = true,
            "--config" => {
                let path = it.next().context("--config needs a path")?;
                args.config = PathBuf::from(path);
            }
            other => anyhow::bail!(
                "unknown argument: {other}\nusage: kalshi-entry [--live] [--once] [--cancel-resting] [--config <path>]"
            ),
        }
    }
    Ok(args)
}

/// Cancel every resting order on the account, then return.
async fn cancel_resting(rest: &KalshiRest) -> Result<()> {
    let orders = rest.get_resting_orders().await?;
    println!("{} resting order(s)", orders.len());
    for order in &orders {
        match rest.cancel_order(&order.order_id).await {
            Ok(()) => println!(
                "  cancelled {} {} {} ({} left)",
                order.order_id, order.ticker, order.side, order.remaining_count
            ),
            Err(e) => {
                tracing::warn!(order_id = %order.order_id, error = %e, "cancel failed");
                println!("  ✗ cancel failed {}: {:#}", order.order_id, e);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;

    let log_file = std::fs::File::create(LOG_FILE)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kalshi_entry=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let config = Config::load(&args.config)?;
    Config::load_env_file();

    println!();
    println!("  Kalshi Entry Engine");
    println!("  ───────────────────");
    println!();

    if args.live {
        let answer = config::prompt("LIVE MODE — type 'yes' to confirm").unwrap_or_default();
        if !config::is_confirmed(&answer) {
            println!("Aborted.");
            return Ok(());
        }
    }
    let dry_run = !args.live;
    println!("Mode: {}", if dry_run { "DRY RUN" } else { "LIVE" });

    let api_key = Config::kalshi_api_key()?;
    let pk_pem = Config::kalshi_private_key_pem()?;
    let auth = Arc::new(KalshiAuth::new(api_key, &pk_pem)?);
    let timeout = Duration::from_millis(config.execution.request_timeout_ms);
    let rest = Arc::new(KalshiRest::new(auth, &config.kalshi.api_base, timeout)?);

    if args.cancel_resting {
        if dry_run {
            println!("--cancel-resting touches the account; rerun with --live");
            return Ok(());
        }
        return cancel_resting(&rest).await;
    }

    let feed = EspnFeed::new(config.leagues.clone(), timeout)?;
    let model = EntryModel::new(config.engine.clone(), config.fees.clone());
    let guards = TradeGuards::from_config(&config.engine, &config.execution);
    let mut executor = OrderExecutor::new(rest.clone(), guards, dry_run);

    let mut leagues: Vec<&String> = config.leagues.keys().collect();
    leagues.sort();
    tracing::info!(
        dry_run = executor.is_dry_run(),
        leagues = ?leagues,
        bankroll = config.engine.bankroll,
        "starting"
    );

    let poll = Duration::from_secs(config.execution.poll_interval_s.max(1));
    let mut session_day = chrono::Local::now().date_naive();
    loop {
        // a new slate of games starts a new session
        let today = chrono::Local::now().date_naive();
        if today != session_day {
            tracing::info!(%today, "new day, clearing traded set");
            executor.reset_session();
            session_day = today;
        }
        println!("{}  bankroll ${:.0}", today.format("%Y-%m-%d"), config.engine.bankroll);
        println!();
        for league in &leagues {
            if let Err(e) = pipeline::run_league(league, &config, &feed, &rest, &model, &mut executor).await {
                tracing::warn!(league = %league, error = %e, "league pass failed");
                println!("== {} ==  ERROR: {:#}", league.to_uppercase(), e);
                println!();
            }
        }
        if args.once {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}
