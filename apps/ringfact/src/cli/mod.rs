//! # ringfact CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `compute` - Evaluate one ring operation
//! - `derive` - Derive a term and mint its derivation id
//! - `query` - Run a query against the default knowledge graph
//! - `validate` - Run the conformance battery
//! - `identity` - Check the critical identity

mod commands;

use clap::{Parser, Subcommand};
use ringfact_core::{RingfactError, primitives::DEFAULT_QUANTUM};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ringfact - content-addressed ring algebra
///
/// Every value, derivation and stored object carries an identifier anyone
/// can recompute.
#[derive(Parser, Debug)]
#[command(name = "ringfact")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Persist observers to this redb file (default: in memory)
        #[arg(long)]
        observers: Option<PathBuf>,
    },

    /// Evaluate one ring operation
    Compute {
        /// Operation name (neg, bnot, succ, pred, add, sub, mul, xor, and, or, shl, shr)
        #[arg(short, long)]
        op: String,

        /// First operand
        #[arg(short)]
        x: u64,

        /// Second operand (binary operations only)
        #[arg(short)]
        y: Option<u64>,

        /// Ring quantum (bits)
        #[arg(short, long, default_value_t = DEFAULT_QUANTUM)]
        n: u32,
    },

    /// Derive a term, e.g. "add(mul(3,5),neg(1))"
    Derive {
        /// The term
        term: String,

        /// Ring quantum (bits)
        #[arg(short, long, default_value_t = DEFAULT_QUANTUM)]
        n: u32,
    },

    /// Query the knowledge graph of the default ring
    Query {
        /// SELECT query
        q: String,
    },

    /// Run the conformance battery
    Validate {
        /// Ring quantum (bits)
        #[arg(short, long, default_value_t = DEFAULT_QUANTUM)]
        n: u32,
    },

    /// Check neg(bnot(x)) = succ(x) at one element or over the ring
    Identity {
        /// Ring quantum (bits, up to 32)
        #[arg(short, long, default_value_t = DEFAULT_QUANTUM)]
        n: u32,

        /// A single element to witness
        #[arg(short)]
        x: Option<u64>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RingfactError> {
    let json_mode = cli.json_mode;
    let verbose = cli.verbose;

    match cli.command {
        Some(Commands::Server {
            host,
            port,
            config,
            observers,
        }) => cmd_server(&host, port, config, observers).await,
        Some(Commands::Compute { op, x, y, n }) => cmd_compute(&op, x, y, n, json_mode, verbose),
        Some(Commands::Derive { term, n }) => cmd_derive(&term, n, json_mode),
        Some(Commands::Query { q }) => cmd_query(&q, json_mode),
        Some(Commands::Validate { n }) => cmd_validate(n, json_mode, verbose),
        Some(Commands::Identity { n, x }) => cmd_identity(n, x, json_mode),
        // No subcommand - validate the default ring
        None => cmd_validate(DEFAULT_QUANTUM, json_mode, verbose),
    }
}
