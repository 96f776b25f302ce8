//! zStake CLI
//!
//! Run modes:
//!   zstake config                          - Print the effective configuration
//!   zstake simulate [--accounts N] [--days D] [--amount A] [--db PATH]
//!                                          - Run a scripted staking scenario on a manual clock
//!   zstake inspect [--db PATH]             - List persisted positions and pending withdrawals

use clap::{Parser, Subcommand};
use std::sync::Arc;

use zstake::common::logging::init_from_config;
use zstake::types::{parse_units, units_to_display, SECONDS_PER_DAY};
use zstake::{
    AccountId, Clock, LedgerStore, LocalStack, ManualClock, MemoryLedgerStore, SqliteLedgerStore, StakingService,
    SystemClock, ZStakeConfig, ZStakeError,
};

#[derive(Parser)]
#[command(name = "zstake")]
#[command(about = "Confidential staking ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config,

    /// Stake, accrue, claim and withdraw for a set of simulated accounts
    Simulate {
        /// Number of accounts
        #[arg(short, long, default_value = "3")]
        accounts: u32,

        /// Days the clock advances between staking and claiming
        #[arg(short, long, default_value = "30")]
        days: u64,

        /// Tokens staked by the first account; account i stakes i times this
        #[arg(long, default_value = "1.5")]
        amount: String,

        /// Persist ledger and collaborator state to this SQLite database; reruns resume from it
        #[arg(long)]
        db: Option<String>,
    },

    /// List persisted positions and pending withdrawals
    Inspect {
        /// SQLite database path (default: ZSTAKE_DB_PATH)
        #[arg(long)]
        db: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ZStakeConfig::from_env()?;
    init_from_config(&config)?;

    match cli.command {
        Commands::Config => config.print_summary(),
        Commands::Simulate {
            accounts,
            days,
            amount,
            db,
        } => run_simulation(&config, accounts, days, &amount, db).await?,
        Commands::Inspect { db } => {
            let path = db.unwrap_or_else(|| config.db_path.clone());
            run_inspect(&path).await?;
        }
    }

    Ok(())
}

async fn run_simulation(
    config: &ZStakeConfig,
    accounts: u32,
    days: u64,
    amount: &str,
    db: Option<String>,
) -> Result<(), ZStakeError> {
    let unit = parse_units(amount).ok_or_else(|| ZStakeError::validation(format!("invalid amount: {}", amount)))?;

    let store: Arc<dyn LedgerStore> = match &db {
        Some(path) => Arc::new(SqliteLedgerStore::new(path)?),
        None => Arc::new(MemoryLedgerStore::new()),
    };

    // Start no earlier than anything already persisted
    let persisted_clock = store
        .load_positions()
        .await?
        .iter()
        .map(|(_, position)| position.last_accrual_time)
        .max()
        .unwrap_or(0);
    let clock = ManualClock::new(SystemClock.now().max(persisted_clock));
    let stack = LocalStack::new(config.ledger_id(), Arc::new(clock.clone()));
    let service =
        StakingService::open_local(stack.clone(), config.ledger_id(), config.accrual_params(), store).await?;

    let participants: Vec<AccountId> = (1..=accounts)
        .map(|i| AccountId::from_label(&format!("sim-{}", i)))
        .collect();

    println!("=== zStake Simulation ===");
    println!("Accounts: {}  Days: {}  Rate: {}/unit/day", accounts, days, config.reward_rate);
    println!();

    for (i, account) in participants.iter().enumerate() {
        let stake = unit * (i as u128 + 1);
        let receipt = service.stake(*account, stake).await?;
        println!(
            "[stake]    {} staked {} (principal {}, handle {})",
            account.short(),
            units_to_display(stake),
            units_to_display(u128::from(receipt.plain_amount)),
            receipt.handle
        );
    }

    clock.advance(days.saturating_mul(SECONDS_PER_DAY));
    println!();
    println!("... {} days later", days);
    println!();

    for account in &participants {
        match service.claim_interest(*account).await? {
            Some(claim) => {
                let balance = stack.confidential.decrypt_for(&claim.balance_handle, account).unwrap_or(0);
                println!("[claim]    {} minted {} reward units (balance {})", account.short(), claim.amount, balance);
            }
            None => println!("[claim]    {} nothing owed", account.short()),
        }
    }

    for account in &participants {
        let request = service.request_withdraw(*account).await?;
        let (values, proof) = stack
            .confidential
            .disclose(&[request.handle])
            .map_err(zstake::LedgerError::from)?;
        let receipt = service.finalize_withdraw(request.handle, values[0], &proof).await?;
        println!(
            "[withdraw] {} released {}",
            account.short(),
            units_to_display(u128::from(receipt.amount))
        );
    }

    let vault = stack.vault.stats();
    println!();
    println!("=== Summary ===");
    println!("Deposited:      {}", units_to_display(vault.total_deposited));
    println!("Released:       {}", units_to_display(vault.total_released));
    println!("Vault balance:  {}", units_to_display(vault.held));
    println!("Still staked:   {}", units_to_display(service.total_staked().await));
    println!("Reward supply:  {} units", stack.token.total_supply());
    println!("Ciphertexts:    {}", stack.confidential.len());
    if let Some(path) = db {
        println!("Persisted to:   {}", path);
    }

    service.check_consistency().await
}

async fn run_inspect(path: &str) -> Result<(), ZStakeError> {
    let store = SqliteLedgerStore::new(path)?;
    let positions = store.load_positions().await?;
    let registrations = store.load_registrations().await?;
    let collaborator_state = store.load_collaborator_state().await?;

    println!("=== Positions ({}) ===", positions.len());
    for (account, position) in &positions {
        println!(
            "{}  staked={}  rewards={}  last_accrual={}  state={}",
            account,
            units_to_display(u128::from(position.plain_amount())),
            position.accrued_rewards,
            position.last_accrual_time,
            position.state
        );
    }

    println!();
    println!("=== Pending Withdrawals ({}) ===", registrations.len());
    for (handle, owner) in &registrations {
        println!("{} -> {}", handle, owner);
    }

    println!();
    match collaborator_state {
        Some(state) => println!("Collaborator state: {} bytes", state.len()),
        None => println!("Collaborator state: none"),
    }

    Ok(())
}
