use std::{env, process::exit};

use scpi_bench::{
    channel::ChannelMap,
    config::Resource,
    instrument::{SourceMeter, drivers::Keithley2600},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        println!("Usage: ... <uri>");
        println!("  <uri>:");
        println!("    tcp://<host>[:<port>]: SCPI over raw TCP (default port 5025)");
        println!("    serial:<port>[?baud=<baud>]: SCPI over serial (default 19200 baud)");
        println!("  Optional parameters: timeout_ms=<ms>, eol=lf|crlf|cr");
        exit(1);
    }

    let resource: Resource = args[1].parse()?;
    let mut smu = Keithley2600::connect(&resource).await?;

    println!("Firmware: {}", smu.software_version().await?);

    smu.current_setup().await?;
    for ch in 1..=smu.channels().channel_count() {
        println!("Channel {ch}:");
        println!("  current: {} A", smu.read_current(ch).await?);
        println!("  voltage: {} V", smu.read_voltage(ch).await?);
    }

    smu.close().await?;
    Ok(())
}
