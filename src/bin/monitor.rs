use clap::{Arg, Command};
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use dali_master as dali;

use dali::device::commands::configure_event_sources;
use dali::device::events::event_stream;
use dali::device::sensors;
use dali::drivers::driver::DaliDriver;
use dali::drivers::simulator::config::Topology;
use dali::utils::address_assignment::{enumerate_bus, AllocateOptions};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let matches = Command::new("monitor")
        .about("Walk the input devices on a simulated bus and print sensor events")
        .arg(
            Arg::new("inputs")
                .long("inputs")
                .value_parser(clap::value_parser!(usize))
                .default_value("2")
                .help("Number of simulated input devices"),
        )
        .get_matches();

    let topology = Topology::simple(0, *matches.get_one::<usize>("inputs").unwrap());
    let (mut sim, handles) = match topology.build() {
        Ok(built) => built,
        Err(e) => {
            println!("Failed to build the bus: {}", e);
            return;
        }
    };

    let inventory = match enumerate_bus(&mut sim, &AllocateOptions::default()).await {
        Ok(inventory) => inventory,
        Err(e) => {
            println!("Enumeration failed: {}", e);
            return;
        }
    };
    let devices = inventory.input_device_addresses();
    println!("Found {} input devices", devices.len());

    let records = match configure_event_sources(&mut sim, &devices).await {
        Ok(records) => records,
        Err(e) => {
            println!("Device walk failed: {}", e);
            return;
        }
    };
    for record in &records {
        println!(
            "{}:{} {} ({})",
            record.device,
            record.instance,
            record.kind,
            if record.enabled { "enabled" } else { "disabled" }
        );
    }

    // Seed some telemetry and read it back
    for (i, handle) in handles.iter().enumerate() {
        handle.set_temperature(20.0 + i as f32 * 1.5);
        handle.set_humidity(40.0 + i as f32 * 5.0);
    }
    for &device in &devices {
        if let Ok(Some(temperature)) = sensors::read_temperature(&mut sim, device).await {
            println!("{}: {:.1} C", device, temperature);
        }
        if let Ok(Some(humidity)) = sensors::read_humidity(&mut sim, device).await {
            println!("{}: {:.1} %", device, humidity);
        }
    }

    // Simulate some movement and drain the resulting events
    for handle in &handles {
        handle.trigger_occupancy(0, true);
        handle.trigger_occupancy(0, false);
    }
    let driver: Arc<Mutex<Box<dyn DaliDriver>>> = Arc::new(Mutex::new(Box::new(sim)));
    let mut events = event_stream(driver);
    loop {
        match tokio::time::timeout(Duration::from_millis(100), events.next()).await {
            Ok(Some(event)) => println!("Event: {}", event),
            _ => break,
        }
    }
}
