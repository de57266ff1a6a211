//! odfce CLI - ODF to FCE chunk generator.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;
mod setup;

use display::Format;

#[derive(Parser)]
#[command(name = "odfce")]
#[command(about = "Aggregates minute-resolution ODF data into quantized FCE chunks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file (YAML). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate every ODF into FCE chunks
    Run {
        /// Only process this symbol group
        #[arg(short, long)]
        group: Option<String>,

        /// Ask for confirmation before processing
        #[arg(long)]
        ask: bool,

        /// Log each ODF name as it is processed
        #[arg(long)]
        show: bool,

        /// Only log each ODF's FIFO; nothing is processed
        #[arg(short = 'p', long)]
        print_fifo: bool,

        /// Maximum symbols processed concurrently
        #[arg(long, default_value = "4")]
        parallel_symbols: usize,

        /// Publish FCE rows to the key-value store
        #[arg(long)]
        kv: bool,
    },

    /// Convert text ODFs to binary, or upload them to the key-value store
    Export {
        /// Only export this symbol group
        #[arg(short, long)]
        group: Option<String>,

        /// Upload rows to the key-value store instead of converting
        #[arg(long)]
        kv: bool,

        /// Overwrite existing binary ODFs
        #[arg(long)]
        force: bool,
    },

    /// Print an ODF, FIFO, FCE header or chunk
    Print {
        /// Output format
        #[arg(short, long, value_enum, default_value = "csv", global = true)]
        format: Format,

        #[command(subcommand)]
        target: PrintTarget,
    },

    /// List the interval table with enable state
    Intervals {
        /// Trading start recno used for the daily shift
        #[arg(long, default_value = "1")]
        trading_start: u32,
    },
}

/// Objects the `print` command can dump.
#[derive(Subcommand)]
enum PrintTarget {
    /// ODF headers and records
    Odf {
        /// Symbol group
        group: String,
        /// ODF basename (e.g. EURUSD-1856460)
        name: String,
    },

    /// FIFO header and window
    Fifo {
        /// Symbol group
        group: String,
        /// ODF basename
        name: String,
    },

    /// Decrypted FCE header scalars
    Fce {
        /// Symbol group
        group: String,
        /// Symbol
        symbol: String,
        /// ODF week (jsunnoon)
        epoch: u32,
    },

    /// Chunk cells
    Chunk {
        /// Symbol group
        group: String,
        /// Symbol
        symbol: String,
        /// Interval code (31..98)
        l_code: u16,
        /// FCE epoch (jsunnoon)
        epoch: u32,
        /// Chunk number within the epoch
        chunk: u32,

        /// Read the short chunk and dequantize it instead of the long chunk
        #[arg(long)]
        short: bool,

        /// Tick used to dequantize a short chunk
        #[arg(long, default_value = "1")]
        tick: u32,

        /// OHLC divider used to dequantize a short chunk
        #[arg(long, default_value = "1")]
        divider: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup::init_tracing(cli.verbose);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = setup::load_settings(cli.settings.as_deref())?;

    match command {
        Commands::Run {
            group,
            ask,
            show,
            print_fifo,
            parallel_symbols,
            kv,
        } => {
            let options = commands::run::RunOptions {
                group,
                ask,
                show,
                print_fifo,
                parallel_symbols,
                kv,
                quiet: cli.quiet,
            };
            commands::run::run(settings, options).await
        }
        Commands::Export { group, kv, force } => {
            commands::export::export(&settings, group.as_deref(), kv, force, cli.quiet)
        }
        Commands::Print { format, target } => match target {
            PrintTarget::Odf { group, name } => {
                commands::print::print_odf(&settings, &group, &name, format)
            }
            PrintTarget::Fifo { group, name } => {
                commands::print::print_fifo(&settings, &group, &name, format)
            }
            PrintTarget::Fce {
                group,
                symbol,
                epoch,
            } => commands::print::print_fce(&settings, &group, &symbol, epoch, format),
            PrintTarget::Chunk {
                group,
                symbol,
                l_code,
                epoch,
                chunk,
                short,
                tick,
                divider,
            } => {
                let address = commands::print::ChunkArgs {
                    group,
                    symbol,
                    l_code,
                    epoch,
                    chunk,
                    short,
                    tick,
                    divider,
                };
                commands::print::print_chunk(&settings, &address, format)
            }
        },
        Commands::Intervals { trading_start } => {
            commands::intervals::list_intervals(&settings, trading_start);
            Ok(())
        }
    }
}
