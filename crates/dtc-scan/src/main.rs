//! dtc-scan - OBD-II trouble codes and live data over CAN-bus

use std::process::ExitCode;

use clap::Parser;
use dtc_scan::{init_logging, run, Cli};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    info!("=== dtc-scan v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Interface {} tx 0x{:03X} rx 0x{:03X}",
        cli.interface, cli.txid, cli.rxid
    );

    run(&cli).await.into()
}
