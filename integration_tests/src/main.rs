//! End-to-end tests for the ColorControl bridge firmware.
//!
//! Run after flashing the firmware, with a USB-serial adapter wired to the
//! bridge UART in place of the Uno and a Bluetooth adapter in range.

mod ble_client;
mod device;
mod protocol;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::ColorControlClient;
use device::{resolve_port, UnoLink};
use tests::{print_results, run_all_tests, Rig};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "End-to-end tests for the ColorControl bridge firmware")]
struct Args {
    /// Serial port wired to the bridge UART (use "auto" to auto-detect)
    #[arg(short, long, default_value = "auto")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// BLE device name
    #[arg(long, default_value = "ColorControl")]
    ble_name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let port = resolve_port(&args.port)?;
    let scan_timeout = Duration::from_secs(args.scan_timeout);

    println!("{}", "ColorControl Bridge Integration Tests".bold());
    println!("UART: {} @ {}", port, args.baud);
    println!("BLE:  scanning for \"{}\"", args.ble_name);
    println!();

    println!("Opening UART...");
    let mut uno = UnoLink::new(&port, args.baud)?;
    uno.drain_buffer()?;
    println!("{}", "  UART open!".green());

    println!("Scanning for BLE device \"{}\"...", args.ble_name);
    let app = ColorControlClient::connect_by_name(&args.ble_name, scan_timeout).await?;
    println!("{}", "  BLE connected!".green());

    let mut rig = Rig {
        uno,
        app,
        ble_name: args.ble_name,
        scan_timeout,
    };

    println!("\n{}", "Running tests...".bold());
    println!();

    let results = run_all_tests(&mut rig).await;
    print_results(&results);

    if let Err(e) = rig.app.disconnect().await {
        println!("{}", format!("Disconnect failed: {}", e).yellow());
    }

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
