//! Example: Reading a Mi Flora sensor once
//!
//! Discovers the sensor by address, queries it a single time through the
//! same poll cycle the service uses, and prints the resulting status.
//!
//! Run with: `cargo run --example read_sensor -- <DEVICE_ADDRESS>`

use std::env;
use std::sync::Arc;

use flora_core::{BleTransport, PollOutcome, RadioArbiter, SensorConfig, SensorPoller};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let address = if args.len() > 1 {
        &args[1]
    } else {
        eprintln!("Usage: {} <DEVICE_ADDRESS>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} C4:7C:8D:6A:12:34", args[0]);
        std::process::exit(1);
    };

    let transport = Arc::new(BleTransport::new().await?);
    let poller = SensorPoller::new(SensorConfig::new(address), RadioArbiter::default(), transport);

    println!("Polling {}...", address);
    match poller.poll_once().await {
        PollOutcome::Updated => {}
        PollOutcome::Skipped => {
            eprintln!("No device found");
            std::process::exit(1);
        }
        PollOutcome::QueryFailed => {
            eprintln!("Device found but the query failed");
            std::process::exit(1);
        }
    }

    let status = poller.status();
    println!();
    println!("Current Readings:");
    println!("  Temperature: {:.1} °C", status.temperature());
    println!("  Light:       {} lux", status.light_level());
    println!("  Moisture:    {}%", status.moisture());
    println!("  Fertility:   {} µS/cm", status.fertility());
    println!("  Battery:     {}%", status.battery_level());
    println!("  Firmware:    {}", status.firmware_version());

    Ok(())
}
