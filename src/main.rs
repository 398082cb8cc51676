//! Quorum ledger CLI application
//!
//! A command-line interface for a multi-party authorization ledger.

use clap::{Parser, Subcommand};
use quorum_ledger::api::{create_router, ApiState};
use quorum_ledger::cli::{self, AppState};
use quorum_ledger::ledger::{Effect, MembershipChange, OperationId};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ledger")]
#[command(version)]
#[command(about = "M-of-N authorization ledger with signed approvals", long_about = None)]
struct Cli {
    /// Data directory for ledger storage
    #[arg(short, long, global = true, default_value = ".ledger_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a principal key pair
    Keygen,

    /// Initialize a new ledger
    Init {
        /// Approvals required to execute an operation
        #[arg(short, long)]
        threshold: usize,

        /// Principal address or public key (repeat for each principal)
        #[arg(short, long = "principal", required = true)]
        principals: Vec<String>,

        /// Human-readable label
        #[arg(short, long)]
        label: Option<String>,

        /// Initial treasury balance
        #[arg(short, long, default_value = "0")]
        balance: u64,

        /// Replace an existing ledger
        #[arg(long)]
        force: bool,
    },

    /// Display ledger information
    Info,

    /// Propose an operation
    Submit {
        /// Private key of the submitting principal (hex)
        #[arg(short, long, env = "LEDGER_KEY")]
        key: String,

        #[command(subcommand)]
        effect: SubmitCommands,
    },

    /// Approve a pending operation
    Approve {
        #[arg(short, long, env = "LEDGER_KEY")]
        key: String,

        #[arg(short, long)]
        id: OperationId,
    },

    /// Withdraw your approval of a pending operation
    Revoke {
        #[arg(short, long, env = "LEDGER_KEY")]
        key: String,

        #[arg(short, long)]
        id: OperationId,
    },

    /// Execute an operation whose quorum is met
    Execute {
        #[arg(short, long, env = "LEDGER_KEY")]
        key: String,

        #[arg(short, long)]
        id: OperationId,
    },

    /// Cancel an operation you submitted
    Cancel {
        #[arg(short, long, env = "LEDGER_KEY")]
        key: String,

        #[arg(short, long)]
        id: OperationId,
    },

    /// Show one operation with its approvals
    Show {
        #[arg(short, long)]
        id: OperationId,
    },

    /// List operations
    List {
        /// Only operations still collecting approvals
        #[arg(long)]
        pending: bool,
    },

    /// Show treasury balances
    Treasury,

    /// Add funds to the treasury
    Deposit {
        #[arg(short, long)]
        amount: u64,
    },

    /// Allow a named action to be invoked on a target
    RegisterAction {
        #[arg(short, long)]
        target: String,

        #[arg(short, long)]
        action: String,
    },

    /// Run the REST API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum SubmitCommands {
    /// Move value from the treasury to a recipient
    Transfer {
        #[arg(short, long)]
        to: String,

        #[arg(short, long)]
        amount: u64,
    },

    /// Invoke a named action on a target
    Invoke {
        #[arg(short, long)]
        target: String,

        #[arg(short, long)]
        action: String,

        /// Action argument (repeatable)
        #[arg(long = "arg")]
        args: Vec<String>,
    },

    /// Add a principal
    AddPrincipal {
        /// Address or public key
        #[arg(short, long)]
        principal: String,
    },

    /// Remove a principal
    RemovePrincipal {
        #[arg(short, long)]
        principal: String,
    },

    /// Change the approval threshold
    SetThreshold {
        #[arg(short, long)]
        threshold: usize,
    },
}

impl SubmitCommands {
    /// Target and effect; `None` targets the ledger itself
    fn into_effect(self) -> (Option<String>, Effect) {
        match self {
            SubmitCommands::Transfer { to, amount } => {
                (Some(to), Effect::TransferValue { amount })
            }
            SubmitCommands::Invoke {
                target,
                action,
                args,
            } => (Some(target), Effect::InvokeNamedAction { action, args }),
            SubmitCommands::AddPrincipal { principal } => (
                None,
                Effect::ChangeMembership(MembershipChange::AddPrincipal {
                    principal: cli::parse_principal(&principal),
                }),
            ),
            SubmitCommands::RemovePrincipal { principal } => (
                None,
                Effect::ChangeMembership(MembershipChange::RemovePrincipal {
                    principal: cli::parse_principal(&principal),
                }),
            ),
            SubmitCommands::SetThreshold { threshold } => (
                None,
                Effect::ChangeMembership(MembershipChange::SetThreshold { threshold }),
            ),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Commands that don't need a loaded ledger
    match &cli.command {
        Commands::Keygen => return cli::cmd_keygen(),
        Commands::Init {
            threshold,
            principals,
            label,
            balance,
            force,
        } => {
            return cli::cmd_init(
                &cli.data_dir,
                *threshold,
                principals,
                label.clone(),
                *balance,
                *force,
            );
        }
        Commands::Serve { port } => return run_server(*port, &cli.data_dir),
        _ => {}
    }

    let mut state = AppState::load(cli.data_dir.clone())?;

    match cli.command {
        Commands::Keygen | Commands::Init { .. } | Commands::Serve { .. } => unreachable!(),

        Commands::Info => cli::cmd_info(&state)?,

        Commands::Submit { key, effect } => {
            let key = cli::parse_key(&key)?;
            let (target, effect) = effect.into_effect();
            cli::cmd_submit(&mut state, &key, target, effect)?;
        }

        Commands::Approve { key, id } => {
            cli::cmd_approve(&mut state, &cli::parse_key(&key)?, id)?;
        }

        Commands::Revoke { key, id } => {
            cli::cmd_revoke(&mut state, &cli::parse_key(&key)?, id)?;
        }

        Commands::Execute { key, id } => {
            cli::cmd_execute(&mut state, &cli::parse_key(&key)?, id)?;
        }

        Commands::Cancel { key, id } => {
            cli::cmd_cancel(&mut state, &cli::parse_key(&key)?, id)?;
        }

        Commands::Show { id } => cli::cmd_show(&state, id)?,

        Commands::List { pending } => cli::cmd_list(&state, pending)?,

        Commands::Treasury => cli::cmd_treasury(&state)?,

        Commands::Deposit { amount } => cli::cmd_deposit(&mut state, amount)?,

        Commands::RegisterAction { target, action } => {
            cli::cmd_register_action(&mut state, &target, &action)?;
        }
    }

    Ok(())
}

fn run_server(port: u16, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let AppState {
            ledger,
            treasury,
            storage,
            ..
        } = AppState::load(data_dir.to_path_buf())?;

        println!("📂 Loaded ledger {}", ledger.address());
        println!("   Policy: {}", ledger.principal_set().description());

        let state = ApiState::new(ledger, treasury, storage);
        let shutdown_state = state.clone();
        let app = create_router(state);

        let addr = format!("0.0.0.0:{}", port);
        println!("🚀 REST API server starting on http://localhost:{}", port);
        println!();
        println!("📖 Available endpoints:");
        println!("   GET  /health                           - Health check");
        println!("   GET  /ws                               - Ledger events");
        println!("   GET  /api/ledger                       - Ledger info");
        println!("   GET  /api/operations[?pending=true]    - List operations");
        println!("   GET  /api/operations/{{id}}              - Operation status");
        println!("   GET  /api/principals/{{addr}}/nonce      - Next call nonce");
        println!("   POST /api/calls                        - Apply a signed call");
        println!("   GET  /api/treasury                     - Treasury balances");
        println!();

        // Save on Ctrl+C
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down API server...");

            let ledger = shutdown_state.ledger.read().await;
            let treasury = shutdown_state.treasury.read().await;
            match shutdown_state.storage.save(&ledger, &treasury) {
                Ok(()) => println!("✅ Data saved successfully!"),
                Err(e) => log::error!("Failed to save ledger: {}", e),
            }
            std::process::exit(0);
        });

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
