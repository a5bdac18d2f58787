//! # zkmarket CLI
//!
//! Command-line driver for the private prediction-market ledger. Every
//! invocation loads the ledger from a JSON state file, applies one operation,
//! and writes the state back.

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use zkmarket_core::{
    commit_random, utils::*, BetId, BetStatus, BettorHandle, Category, Commitment, Decommitment,
    Ledger, LedgerConfig, LedgerSnapshot, MarketFilter, MarketId, MarketParams, MarketStatus,
    MarketView, OpeningVerifier, Outcome, Reveal, SystemClock,
};

#[derive(Parser)]
#[command(name = "zkmarket")]
#[command(about = "Private prediction markets with committed wagers")]
#[command(version)]
struct Cli {
    /// Ledger state file
    #[arg(long, global = true, default_value = "zkmarket.json")]
    state: PathBuf,

    /// Ledger configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Identifies a bettor either directly or by hashing a wallet identity.
#[derive(clap::Args)]
struct BettorArgs {
    /// Bettor handle
    #[arg(long, conflicts_with = "wallet")]
    bettor: Option<String>,
    /// Wallet identity to derive the handle from
    #[arg(long, requires = "salt")]
    wallet: Option<String>,
    /// Salt for handle derivation
    #[arg(long)]
    salt: Option<String>,
}

impl BettorArgs {
    fn handle(&self) -> Result<BettorHandle> {
        match (&self.bettor, &self.wallet, &self.salt) {
            (Some(bettor), _, _) => Ok(BettorHandle::new(bettor.as_str())),
            (None, Some(wallet), Some(salt)) => Ok(BettorHandle::derive(wallet, salt)),
            _ => anyhow::bail!("pass --bettor, or --wallet with --salt"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new prediction market
    Create {
        /// Market question
        #[arg(short, long)]
        question: String,
        /// Longer description and resolution criteria
        #[arg(short, long)]
        description: String,
        /// Category (crypto, sports, politics, finance, entertainment)
        #[arg(short, long)]
        category: Category,
        /// Closing time (Unix timestamp or RFC 3339)
        #[arg(long, conflicts_with = "closes_in")]
        closes_at: Option<String>,
        /// Closing time as minutes from now
        #[arg(long)]
        closes_in: Option<i64>,
        /// Where the outcome will be read from
        #[arg(short, long)]
        resolution_source: String,
        /// Creator handle, checked against the creator policy
        #[arg(long)]
        creator: Option<String>,
    },
    /// Commit to a wager locally; nothing is recorded in the ledger
    Commit {
        /// Outcome to back (yes or no)
        outcome: Outcome,
        /// Wager amount
        amount: u64,
    },
    /// Place a bet with a commitment
    Place {
        /// Market ID
        #[arg(short, long)]
        market: MarketId,
        #[command(flatten)]
        bettor: BettorArgs,
        /// Commitment (hex)
        #[arg(long)]
        commitment: String,
    },
    /// Close a market ahead of its closing time
    Close {
        /// Market ID
        market_id: MarketId,
    },
    /// Reveal a bet's wager after its market has closed
    Reveal {
        /// Bet ID
        bet_id: BetId,
        /// Decommitment secret (hex) from `commit`
        #[arg(long)]
        secret: String,
    },
    /// Resolve a market and settle its bets
    Resolve {
        /// Market ID
        market_id: MarketId,
        /// Winning outcome (yes or no)
        outcome: Outcome,
    },
    /// Claim the payout of a winning bet
    Claim {
        /// Bet ID
        bet_id: BetId,
        /// Decommitment secret (hex) from `commit`
        #[arg(long)]
        secret: String,
    },
    /// List markets
    Markets {
        /// Only this category
        #[arg(short, long)]
        category: Option<Category>,
        /// Only this status (open, closed, settled)
        #[arg(short, long)]
        status: Option<MarketStatus>,
        /// Substring of the question
        #[arg(long)]
        search: Option<String>,
    },
    /// Show market information
    Show {
        /// Market ID
        market_id: MarketId,
    },
    /// List a bettor's bets
    Bets {
        #[command(flatten)]
        bettor: BettorArgs,
        /// Only this status (pending, won, lost)
        #[arg(short, long)]
        status: Option<BetStatus>,
    },
    /// Show a bettor's statistics
    Stats {
        #[command(flatten)]
        bettor: BettorArgs,
    },
    /// Show bets settled as lost for want of a usable reveal
    Exceptions {
        /// Market ID
        market_id: MarketId,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let ledger = load_ledger(&cli.state, config)?;

    match cli.command {
        Commands::Commit { outcome, amount } => return print_commitment(outcome, amount),

        Commands::Create {
            question,
            description,
            category,
            closes_at,
            closes_in,
            resolution_source,
            creator,
        } => {
            let closing_time = match (closes_at, closes_in) {
                (Some(at), _) => parse_timestamp(&at)?,
                (None, Some(minutes)) => chrono::Utc::now() + Duration::minutes(minutes),
                (None, None) => anyhow::bail!("pass --closes-at or --closes-in"),
            };

            println!("{}", "Creating new prediction market...".green().bold());
            let market_id = ledger.create_market(MarketParams {
                question,
                description,
                category,
                closing_time,
                resolution_source,
                creator,
            })?;

            println!();
            println!("{}", "Market Created Successfully!".green().bold());
            print_market(&ledger.get_market(market_id)?);
        }

        Commands::Place {
            market,
            bettor,
            commitment,
        } => {
            let commitment = Commitment::from_hex(&commitment)?;
            let bet_id = ledger.place_bet(market, bettor.handle()?, commitment)?;

            println!("{}: {}", "Bet Placed".green().bold(), bet_id.to_string().cyan());
            println!(
                "{}",
                "Keep your decommitment secret: you need it to reveal and to claim.".bright_blue()
            );
        }

        Commands::Close { market_id } => {
            let view = ledger.close_market(market_id)?;
            println!("{}: {}", "Market Closed".green().bold(), view.id);
            println!("{}: {}", "Status".yellow().bold(), view.status);
        }

        Commands::Reveal { bet_id, secret } => {
            let decommitment = Decommitment::from_hex(&secret)?;
            ledger.submit_reveal(
                bet_id,
                Reveal {
                    outcome: decommitment.outcome,
                    amount: decommitment.amount,
                    proof: decommitment.blinding.as_bytes().to_vec(),
                },
            )?;
            println!("{}: {}", "Reveal Recorded".green().bold(), bet_id);
        }

        Commands::Resolve { market_id, outcome } => {
            let report = ledger.resolve_market(market_id, outcome)?;

            println!("{}", "Market Settled!".green().bold());
            println!("{}", "═".repeat(50).bright_black());
            println!("{}: {}", "Outcome".yellow().bold(), report.outcome.to_string().cyan());
            println!("{}: {}", "Winning Pool".yellow().bold(), report.winning_pool);
            println!("{}: {}", "Losing Pool".yellow().bold(), report.losing_pool);
            println!("{}: {}", "Winners".yellow().bold(), report.winners.len());
            println!("{}: {}", "Losers".yellow().bold(), report.losers.len());
            if !report.exceptions.is_empty() {
                println!(
                    "{}: {}",
                    "Exceptions".red().bold(),
                    report.exceptions.len()
                );
            }
            println!("{}", "═".repeat(50).bright_black());
        }

        Commands::Claim { bet_id, secret } => {
            let decommitment = Decommitment::from_hex(&secret)?;
            let payout = ledger.claim_winnings(bet_id, &decommitment)?;
            println!(
                "{}: {} paid out for bet {}",
                "Claimed".green().bold(),
                payout.to_string().cyan(),
                bet_id
            );
        }

        Commands::Markets {
            category,
            status,
            search,
        } => {
            let markets = ledger.list_markets(&MarketFilter {
                category,
                status,
                search,
            });

            if markets.is_empty() {
                println!("{}", "No markets found.".yellow());
            }
            for market in markets {
                println!(
                    "{} [{}] {} ({}, closes {})",
                    market.id.to_string().cyan(),
                    status_label(market.status),
                    market.question,
                    market.category,
                    format_timestamp(market.closing_time)
                );
            }
        }

        Commands::Show { market_id } => {
            print_market(&ledger.get_market(market_id)?);
        }

        Commands::Bets { bettor, status } => {
            let handle = bettor.handle()?;
            let bets = ledger.get_bets_for_bettor(&handle, status);

            if bets.is_empty() {
                println!("{}", "No bets found.".yellow());
            }
            for bet in bets {
                let claim = if bet.claimed { " (claimed)" } else { "" };
                println!(
                    "{} on {} [{}] payout {}{}",
                    bet.id.to_string().cyan(),
                    bet.market_id,
                    bet.status,
                    bet.payout,
                    claim
                );
            }
        }

        Commands::Stats { bettor } => {
            let handle = bettor.handle()?;
            let stats = ledger.bettor_stats(&handle);

            println!("{}: {}", "Bettor".green().bold(), handle.short().cyan());
            println!("{}", "═".repeat(50).bright_black());
            println!("{}: {}", "Total Bets".yellow().bold(), stats.total);
            println!("{}: {}", "Pending".yellow().bold(), stats.pending);
            println!("{}: {}", "Won".yellow().bold(), stats.won);
            println!("{}: {}", "Lost".yellow().bold(), stats.lost);
            println!("{}: {:.1}%", "Win Rate".yellow().bold(), stats.win_rate * 100.0);
            println!(
                "{}: {} ({} bets)",
                "Claimed".yellow().bold(),
                stats.claimed_payout,
                stats.claimed
            );
            println!("{}", "═".repeat(50).bright_black());
        }

        Commands::Exceptions { market_id } => {
            let exceptions = ledger.settlement_exceptions(market_id)?;
            if exceptions.is_empty() {
                println!("{}", "No settlement exceptions.".green());
            }
            for exception in exceptions {
                println!(
                    "{} {}",
                    exception.bet_id.to_string().cyan(),
                    exception.reason.to_string().red()
                );
            }
        }
    }

    save_ledger(&cli.state, &ledger.snapshot())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(LedgerConfig::from_json(&json)?)
        }
        None => Ok(LedgerConfig::default()),
    }
}

fn load_ledger(path: &Path, config: LedgerConfig) -> Result<Ledger> {
    let snapshot = if path.exists() {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading state {}", path.display()))?;
        LedgerSnapshot::from_json(&json)?
    } else {
        info!(state = %path.display(), "No state file, starting an empty ledger");
        LedgerSnapshot::default()
    };
    debug!(markets = snapshot.markets.len(), "State loaded");

    Ok(Ledger::restore(
        snapshot,
        config,
        Arc::new(SystemClock),
        Arc::new(OpeningVerifier),
    ))
}

fn save_ledger(path: &Path, snapshot: &LedgerSnapshot) -> Result<()> {
    std::fs::write(path, snapshot.to_json()?)
        .with_context(|| format!("writing state {}", path.display()))?;
    debug!(state = %path.display(), markets = snapshot.markets.len(), "State saved");
    Ok(())
}

fn print_commitment(outcome: Outcome, amount: u64) -> Result<()> {
    let (commitment, decommitment) = commit_random(outcome, amount)?;

    println!("{}", "Wager Committed".green().bold());
    println!("{}", "═".repeat(50).bright_black());
    println!("{}: {}", "Commitment".yellow().bold(), commitment.to_hex().cyan());
    println!("{}: {}", "Secret".red().bold(), decommitment.to_hex());
    println!("{}: {}", "Wager Level".yellow().bold(), decommitment.level());
    println!("{}", "═".repeat(50).bright_black());
    println!();
    println!("{}", "Publish the commitment with `zkmarket place`.".bright_blue());
    println!("{}", "Store the secret privately; the ledger never sees it.".bright_blue());
    Ok(())
}

fn print_market(market: &MarketView) {
    println!("{}", "═".repeat(50).bright_black());
    println!("{}: {}", "Market ID".yellow().bold(), market.id.to_string().cyan());
    println!("{}: {}", "Question".yellow().bold(), market.question);
    println!("{}: {}", "Description".yellow().bold(), market.description);
    println!("{}: {}", "Category".yellow().bold(), market.category);
    println!("{}: {}", "Resolution Source".yellow().bold(), market.resolution_source);
    println!("{}: {}", "Created".yellow().bold(), format_timestamp(market.created_at));
    println!("{}: {}", "Closes".yellow().bold(), format_timestamp(market.closing_time));
    println!("{}: {}", "Status".yellow().bold(), status_label(market.status));
    if let Some(outcome) = market.outcome {
        println!("{}: {}", "Outcome".yellow().bold(), outcome.to_string().cyan());
    }
    println!("{}: {}", "Bets".yellow().bold(), market.bet_count);
    println!("{}", "═".repeat(50).bright_black());
}

fn status_label(status: MarketStatus) -> ColoredString {
    match status {
        MarketStatus::Open => status.to_string().green(),
        MarketStatus::Closed => status.to_string().yellow(),
        MarketStatus::Settled => status.to_string().bright_black(),
    }
}
