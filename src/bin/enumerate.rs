use clap::{Arg, ArgAction, Command};

use dali_master as dali;

use dali::drivers::simulator::config::Topology;
use dali::utils::address_assignment::{enumerate_bus, AllocateOptions, DuplicatePolicy};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let matches = Command::new("enumerate")
        .about("Assign short addresses to every device on a simulated DALI bus")
        .arg(
            Arg::new("TOPOLOGY")
                .short('t')
                .long("topology")
                .help("JSON file describing the simulated bus"),
        )
        .arg(
            Arg::new("gear")
                .long("gear")
                .value_parser(clap::value_parser!(usize))
                .default_value("3")
                .help("Number of simulated control gears"),
        )
        .arg(
            Arg::new("inputs")
                .long("inputs")
                .value_parser(clap::value_parser!(usize))
                .default_value("1")
                .help("Number of simulated input devices"),
        )
        .arg(
            Arg::new("incremental")
                .long("incremental")
                .action(ArgAction::SetTrue)
                .help("Keep existing short addresses and only number new devices"),
        )
        .arg(
            Arg::new("on_duplicate")
                .long("on-duplicate")
                .default_value("abort")
                .help("What to do about duplicate short addresses: abort, skip or overwrite"),
        )
        .get_matches();

    let topology = match matches.get_one::<String>("TOPOLOGY") {
        Some(path) => {
            let json = match std::fs::read_to_string(path) {
                Ok(json) => json,
                Err(e) => {
                    println!("Failed to read {}: {}", path, e);
                    return;
                }
            };
            match Topology::from_json(&json) {
                Ok(topology) => topology,
                Err(e) => {
                    println!("Bad topology file: {}", e);
                    return;
                }
            }
        }
        None => Topology::simple(
            *matches.get_one::<usize>("gear").unwrap(),
            *matches.get_one::<usize>("inputs").unwrap(),
        ),
    };

    let duplicates = match matches.get_one::<String>("on_duplicate").unwrap().as_str() {
        "abort" => DuplicatePolicy::Abort,
        "skip" => DuplicatePolicy::Skip,
        "overwrite" => DuplicatePolicy::Overwrite,
        other => {
            println!("Unknown duplicate policy: {}", other);
            return;
        }
    };

    let (mut sim, _handles) = match topology.build() {
        Ok(built) => built,
        Err(e) => {
            println!("Failed to build the bus: {}", e);
            return;
        }
    };

    let opts = AllocateOptions {
        incremental: matches.get_flag("incremental"),
        duplicates,
        first_short: 0,
    };
    match enumerate_bus(&mut sim, &opts).await {
        Ok(inventory) => {
            for report in [&inventory.gear, &inventory.input_devices] {
                for record in &report.assigned {
                    println!("{}: short address {}", record.class, record.short);
                }
            }
            println!(
                "{} gears ({} already addressed), {} input devices, {} left without an address",
                inventory.gear.assigned.len(),
                inventory.gear.existing,
                inventory.input_devices.assigned.len(),
                inventory.gear.withdrawn_unassigned + inventory.input_devices.withdrawn_unassigned
            );
            for report in [&inventory.gear, &inventory.input_devices] {
                for dup in &report.duplicates {
                    println!("Warning: duplicate short address {}", dup);
                }
            }
        }
        Err(e) => println!("Enumeration failed: {}", e),
    }
}
