use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use chain_lens::cli::output;
use chain_lens::error::LensError;
use chain_lens::report::assemble::{analyze_block_files, analyze_transaction};
use chain_lens::report::types::TxRequest;
use chain_lens::server;

#[derive(Parser)]
#[command(name = "chain-lens", about = "Bitcoin transaction and block file analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single raw transaction from a fixture JSON file
    Tx {
        /// Fixture file: {"network", "raw_tx", "prevouts": [...]}
        fixture: PathBuf,
    },
    /// Analyze a blk file together with its undo file and XOR key
    Block {
        /// blk*.dat file (may hold several blocks)
        blk: PathBuf,
        /// rev*.dat undo file
        rev: PathBuf,
        /// xor.dat obfuscation key
        xor: PathBuf,
        /// Report merkle mismatches per block instead of aborting
        #[arg(long)]
        lenient: bool,
    },
    /// Start the HTTP server exposing the analyzer as a JSON API
    Serve {
        /// Port to listen on (defaults to $PORT, then 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tx { fixture } => run_tx_mode(&fixture),
        Commands::Block {
            blk,
            rev,
            xor,
            lenient,
        } => run_block_mode(&blk, &rev, &xor, !lenient),
        Commands::Serve { port } => {
            let port = port
                .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
                .unwrap_or(3000);
            let app = server::create_router();
            let addr = format!("0.0.0.0:{port}");
            eprintln!("Starting server on {addr}");
            eprintln!("  Endpoints:");
            eprintln!("    GET  /api/health");
            eprintln!("    POST /api/analyze");
            eprintln!("    POST /api/analyze_block  (multipart: blk, rev, xor)");

            let listener = TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
            Ok(())
        }
    }
}

fn run_tx_mode(fixture_path: &PathBuf) -> Result<()> {
    let body = match fs::read(fixture_path) {
        Ok(body) => body,
        Err(e) => fail(LensError::InvalidFixture(format!(
            "cannot read fixture {}: {e}",
            fixture_path.display()
        ))),
    };

    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => fail(LensError::InvalidJson(format!("invalid fixture JSON: {e}"))),
    };
    let request: TxRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => fail(LensError::InvalidFixture(format!("bad fixture: {e}"))),
    };

    let report = match analyze_transaction(&request) {
        Ok(report) => report,
        Err(e) => fail(e),
    };

    output::write_tx_report(&report)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_block_mode(blk: &PathBuf, rev: &PathBuf, xor: &PathBuf, strict: bool) -> Result<()> {
    let read = |path: &PathBuf| -> Vec<u8> {
        match fs::read(path) {
            Ok(data) => data,
            Err(e) => fail(LensError::InvalidBlock(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    };
    let blk_data = read(blk);
    let rev_data = read(rev);
    let xor_key = read(xor);

    let reports = match analyze_block_files(&blk_data, &rev_data, &xor_key, strict) {
        Ok(reports) => reports,
        Err(e) => fail(e),
    };

    for report in &reports {
        output::write_block_report(report)?;
        output::print_block_summary(report);
    }
    Ok(())
}

/// Print the failure envelope to stdout and exit 1.
fn fail(err: LensError) -> ! {
    let envelope = serde_json::to_string(&err.to_envelope())
        .unwrap_or_else(|_| r#"{"ok":false,"error":{"code":"INTERNAL","message":"serialization failure"}}"#.to_string());
    println!("{envelope}");
    std::process::exit(1);
}
