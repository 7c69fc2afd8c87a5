//! ssUSD Module CLI
//!
//! Drives the ssUSD module outside a host ledger: prints the default genesis,
//! replays blocks of messages from a JSON file, and answers queries against a
//! persisted store.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use ssusd::bank::InMemoryBank;
use ssusd::cli::NodeConfig;
use ssusd::core::genesis::GenesisState;
use ssusd::protocol::{Msg, MsgResponse, Query, QueryResponse, SsusdModule};
use ssusd::storage::backend::{FileStore, InMemoryStore, StorageBackend};

/// Bank balances kept next to the file store
const BANK_FILE: &str = "bank.json";

/// ssUSD module CLI - reserve-backed stablecoin ledger module
#[derive(Parser)]
#[command(name = "ssusd")]
#[command(version = ssusd::VERSION)]
#[command(about = "Replay and inspect the ssUSD ledger module", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Node configuration file (JSON)
    #[arg(short, long, env = "SSUSD_CONFIG")]
    config: Option<PathBuf>,

    /// Persistent data directory; in-memory when omitted
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Genesis file; the default genesis when omitted
    #[arg(short, long)]
    genesis: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default genesis state as JSON
    Genesis,

    /// Apply blocks of messages and print the results
    Replay {
        /// JSON file holding a list of blocks
        #[arg(short, long)]
        blocks: PathBuf,
    },

    /// Run a query against the persisted store
    Query {
        /// Query as JSON, e.g. '"reserve_composition"' or '{"rebalance_history":{"limit":5}}'
        query: String,
    },
}

/// One block of the replay file
#[derive(Debug, Deserialize)]
struct Block {
    height: u64,
    time: u64,
    #[serde(default)]
    messages: Vec<Msg>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum TxResult {
    Ok(MsgResponse),
    Err { code: u32, message: String },
}

#[derive(Debug, Serialize)]
struct EventOutput {
    r#type: &'static str,
    attributes: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct BlockOutput {
    height: u64,
    time: u64,
    results: Vec<TxResult>,
    events: Vec<EventOutput>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    blocks: Vec<BlockOutput>,
    state_hash: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::resolve(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(genesis) = cli.genesis {
        config.genesis_path = Some(genesis);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Genesis => {
            println!("{}", serde_json::to_string_pretty(&GenesisState::default())?);
        }
        Commands::Replay { blocks } => {
            let content = std::fs::read_to_string(&blocks)
                .with_context(|| format!("reading {}", blocks.display()))?;
            let blocks: Vec<Block> =
                serde_json::from_str(&content).context("parsing replay blocks")?;
            let output = match &config.data_dir {
                Some(dir) => {
                    let store = FileStore::new(dir)?;
                    let bank = load_bank(dir)?;
                    let mut module = open(store, bank, &config)?;
                    let output = replay(&mut module, blocks)?;
                    save_bank(dir, module.bank())?;
                    output
                }
                None => {
                    let mut module = open(InMemoryStore::new(), InMemoryBank::new(), &config)?;
                    replay(&mut module, blocks)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Query { query } => {
            let Some(dir) = &config.data_dir else {
                bail!("query needs a data directory");
            };
            let query: Query = serde_json::from_str(&query).context("parsing query")?;
            let module = open(FileStore::new(dir)?, load_bank(dir)?, &config)?;
            let response: QueryResponse = module.query(&query)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn open<B: StorageBackend>(
    store: B,
    bank: InMemoryBank,
    config: &NodeConfig,
) -> anyhow::Result<SsusdModule<B, InMemoryBank>> {
    let mut module = SsusdModule::new(store, bank);
    if !module.state().is_initialized()? {
        let genesis = match &config.genesis_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&content).context("parsing genesis")?
            }
            None => GenesisState::default(),
        };
        module.init_genesis(&genesis)?;
    }
    Ok(module)
}

fn replay<B: StorageBackend>(
    module: &mut SsusdModule<B, InMemoryBank>,
    blocks: Vec<Block>,
) -> anyhow::Result<ReplayOutput> {
    let mut outputs = Vec::with_capacity(blocks.len());

    for block in blocks {
        module.begin_block(block.height, block.time)?;

        let results = block
            .messages
            .into_iter()
            .map(|msg| match module.execute(msg) {
                Ok(response) => TxResult::Ok(response),
                Err(e) => TxResult::Err {
                    code: e.code(),
                    message: e.to_string(),
                },
            })
            .collect();

        let events = module
            .end_block()?
            .events()
            .iter()
            .map(|record| EventOutput {
                r#type: record.event_type(),
                attributes: record.attributes(),
            })
            .collect();

        outputs.push(BlockOutput {
            height: block.height,
            time: block.time,
            results,
            events,
        });
    }

    Ok(ReplayOutput {
        blocks: outputs,
        state_hash: module.state_hash()?,
    })
}

fn load_bank(dir: &Path) -> anyhow::Result<InMemoryBank> {
    let path = dir.join(BANK_FILE);
    if !path.exists() {
        return Ok(InMemoryBank::new());
    }
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn save_bank(dir: &Path, bank: &InMemoryBank) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(BANK_FILE), serde_json::to_string_pretty(bank)?)?;
    Ok(())
}
