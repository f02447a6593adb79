use crate::base::address::{Address, Short};
use crate::common::commands::{DeviceCommands, GearCommands};
use crate::defs::gear::cmd as gear_cmd;
use crate::device::commands::{self, InstanceType, OCCUPANCY_FILTER_MOVEMENT};
use crate::device::events::{next_event, EventMessage};
use crate::device::sensors;
use crate::drivers::driver::DaliFrame;
use crate::drivers::driver_utils::DaliDriverExt;
use crate::drivers::send_flags::{NO_FLAG, SEND_TWICE};
use crate::drivers::simulator::config::Topology;
use crate::drivers::simulator::gear::SimGear;
use crate::drivers::simulator::input::SimInputDevice;
use crate::drivers::simulator::simulator::DaliSim;
use crate::gear::commands as gear_ops;
use crate::utils::address_assignment::{
    assign_addresses, enumerate_bus, should_enumerate, AllocateOptions, DeviceClass,
    DuplicatePolicy, EnumerationPolicy, Error,
};
use std::collections::BTreeSet;
use std::time::Duration;

fn gear_bus(randoms: &[u32]) -> DaliSim {
    let mut sim = DaliSim::new();
    for &r in randoms {
        sim.add_device(Box::new(SimGear::with_random_address(r)));
    }
    sim
}

fn assigned_shorts(report: &crate::utils::address_assignment::AllocationReport) -> BTreeSet<u8> {
    report.assigned.iter().map(|r| r.short.value()).collect()
}

#[tokio::test]
async fn assigns_unique_addresses_to_all_devices() {
    let randoms = [0, 1, 0x123456, 0x123457, 0x800000, 0xfffffe, 0xffffff];
    let mut sim = gear_bus(&randoms);
    let report = {
        let mut commands = GearCommands::new(&mut sim);
        assign_addresses(&mut commands, DeviceClass::Gear, &AllocateOptions::default())
            .await
            .unwrap()
    };
    assert_eq!(report.assigned.len(), randoms.len());
    assert_eq!(
        assigned_shorts(&report),
        (0..randoms.len() as u8).collect::<BTreeSet<u8>>()
    );
    assert_eq!(report.withdrawn_unassigned, 0);
    assert!(report.duplicates.is_empty());
    assert_eq!(report.first_free, randoms.len() as u8);

    // Every assigned address answers queries, and exactly one device
    // answers each
    for a in 0..randoms.len() as u8 {
        let status = gear_ops::query_status(&mut sim, Address::Short(Short::new(a)))
            .await
            .unwrap();
        assert!(status.is_some());
    }
    assert_eq!(
        gear_ops::query_status(&mut sim, Address::Short(Short::new(randoms.len() as u8)))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn each_isolation_runs_exactly_24_descent_rounds() {
    let randoms = [0x000001, 0x654321, 0xfedcba];
    let mut sim = gear_bus(&randoms);
    {
        let mut commands = GearCommands::new(&mut sim);
        assign_addresses(&mut commands, DeviceClass::Gear, &AllocateOptions::default())
            .await
            .unwrap();
    }
    let compares = sim
        .frame_log()
        .iter()
        .filter(|f| matches!(f, DaliFrame::Frame16(b) if b == &gear_cmd::COMPARE().0))
        .count();
    // Per device: one termination check, 24 descent rounds, one
    // verification; plus the final check that ends the loop
    assert_eq!(compares, randoms.len() * 26 + 1);

    // One INITIALISE pair per outer iteration plus the opening one
    let initialise_frames = sim
        .frame_log()
        .iter()
        .filter(
            |f| matches!(f, DaliFrame::Frame16([a, _]) if *a == gear_cmd::special::INITIALISE),
        )
        .count();
    assert_eq!(initialise_frames, 2 * (randoms.len() + 1));
}

#[tokio::test]
async fn caps_at_63_addresses_and_withdraws_the_rest() {
    let mut sim = DaliSim::new();
    for i in 0..65u32 {
        sim.add_device(Box::new(SimGear::with_random_address(0x1000 + i * 17)));
    }
    let report = {
        let mut commands = GearCommands::new(&mut sim);
        assign_addresses(&mut commands, DeviceClass::Gear, &AllocateOptions::default())
            .await
            .unwrap()
    };
    assert_eq!(report.assigned.len(), 63);
    assert_eq!(report.withdrawn_unassigned, 2);
    assert_eq!(
        assigned_shorts(&report),
        (0..63u8).collect::<BTreeSet<u8>>()
    );
}

#[tokio::test]
async fn incremental_mode_keeps_existing_addresses() {
    let mut sim = DaliSim::new();
    // Three devices addressed in an earlier session
    for (i, r) in [0x111111u32, 0x222222, 0x333333].iter().enumerate() {
        sim.add_device(Box::new(SimGear::with_short_address(*r, i as u8)));
    }
    // Two factory-new devices
    sim.add_device(Box::new(SimGear::with_random_address(0x0a0a0a)));
    sim.add_device(Box::new(SimGear::with_random_address(0x0b0b0b)));

    let opts = AllocateOptions {
        incremental: true,
        ..AllocateOptions::default()
    };
    let report = {
        let mut commands = GearCommands::new(&mut sim);
        assign_addresses(&mut commands, DeviceClass::Gear, &opts)
            .await
            .unwrap()
    };
    assert_eq!(report.existing, 3);
    assert_eq!(assigned_shorts(&report), BTreeSet::from([3, 4]));
    assert_eq!(report.first_free, 5);

    // All five addresses answer, one device each
    for a in 0..5u8 {
        assert!(gear_ops::query_status(&mut sim, Address::Short(Short::new(a)))
            .await
            .unwrap()
            .is_some());
    }
    // And nobody is left without an address
    let mut commands = GearCommands::new(&mut sim);
    assert!(!should_enumerate(&mut commands, EnumerationPolicy::IfUnaddressed)
        .await
        .unwrap());
}

#[tokio::test]
async fn duplicate_addresses_abort_or_skip_by_policy() {
    let build = || {
        let mut sim = DaliSim::new();
        sim.add_device(Box::new(SimGear::with_short_address(0x111111, 2)));
        sim.add_device(Box::new(SimGear::with_short_address(0x222222, 2)));
        sim
    };

    let mut sim = build();
    let mut commands = GearCommands::new(&mut sim);
    let opts = AllocateOptions {
        incremental: true,
        ..AllocateOptions::default()
    };
    match assign_addresses(&mut commands, DeviceClass::Gear, &opts).await {
        Err(Error::DuplicateAddress(a)) => assert_eq!(a.value(), 2),
        other => panic!("expected a duplicate-address abort, got {:?}", other),
    }

    let mut sim = build();
    let mut commands = GearCommands::new(&mut sim);
    let opts = AllocateOptions {
        incremental: true,
        duplicates: DuplicatePolicy::Skip,
        ..AllocateOptions::default()
    };
    let report = assign_addresses(&mut commands, DeviceClass::Gear, &opts)
        .await
        .unwrap();
    assert_eq!(report.duplicates, vec![Short::new(2)]);
    assert!(report.assigned.is_empty());
}

#[tokio::test]
async fn write_twice_commands_hit_the_wire_as_identical_pairs() {
    let mut sim = gear_bus(&[0x123456]);
    {
        let mut commands = GearCommands::new(&mut sim);
        assign_addresses(&mut commands, DeviceClass::Gear, &AllocateOptions::default())
            .await
            .unwrap();
    }
    sim.clear_frame_log();
    let addr = Address::Short(Short::new(0));
    gear_ops::set_fade_time(&mut sim, addr, 5).await.unwrap();
    let log = sim.frame_log();
    // DTR0, then the committing frame twice, bit for bit
    assert_eq!(log.len(), 3);
    assert_eq!(log[0], DaliFrame::Frame16(gear_cmd::DTR0(5).0));
    assert_eq!(log[1], log[2]);
    assert_eq!(log[1], DaliFrame::Frame16(gear_cmd::SET_FADE_TIME(addr).0));
}

#[tokio::test]
async fn a_single_frame_of_a_twice_command_is_a_no_op() {
    let mut sim = gear_bus(&[0x123456]);
    {
        let mut commands = GearCommands::new(&mut sim);
        assign_addresses(&mut commands, DeviceClass::Gear, &AllocateOptions::default())
            .await
            .unwrap();
    }
    let addr = Address::Short(Short::new(0));
    let before = gear_ops::query_fade(&mut sim, addr).await.unwrap().unwrap();

    // The committing frame sent only once must change nothing
    sim.send_frame16(&gear_cmd::DTR0(5).0, NO_FLAG).await;
    sim.send_frame16(&gear_cmd::SET_FADE_TIME(addr).0, NO_FLAG)
        .await;
    assert_eq!(
        gear_ops::query_fade(&mut sim, addr).await.unwrap().unwrap(),
        before
    );

    // The proper pair commits
    sim.send_frame16(&gear_cmd::SET_FADE_TIME(addr).0, SEND_TWICE)
        .await;
    let after = gear_ops::query_fade(&mut sim, addr).await.unwrap().unwrap();
    assert_eq!(after.time, 5);
}

#[tokio::test]
async fn input_devices_are_numbered_after_the_gear() {
    let mut sim = DaliSim::new();
    for r in [0x111111u32, 0x222222, 0x333333] {
        sim.add_device(Box::new(SimGear::with_random_address(r)));
    }
    let occupancy = InstanceType::OccupancySensor.code();
    let (dev_a, handle_a) = SimInputDevice::with_random_address(&[occupancy], 0x000100);
    let (dev_b, handle_b) = SimInputDevice::with_random_address(&[occupancy], 0x000200);
    sim.add_device(Box::new(dev_a));
    sim.add_device(Box::new(dev_b));

    let inventory = enumerate_bus(&mut sim, &AllocateOptions::default())
        .await
        .unwrap();
    assert_eq!(assigned_shorts(&inventory.gear), BTreeSet::from([0, 1, 2]));
    assert_eq!(
        assigned_shorts(&inventory.input_devices),
        BTreeSet::from([3, 4])
    );
    // The lower random address is found first
    assert_eq!(handle_a.short_address(), Some(3));
    assert_eq!(handle_b.short_address(), Some(4));
}

#[tokio::test]
async fn the_device_walk_configures_sensors() {
    let mut sim = DaliSim::new();
    let kinds = [
        InstanceType::OccupancySensor.code(),
        InstanceType::LightSensor.code(),
        InstanceType::PushButton.code(),
    ];
    let (dev, handle) = SimInputDevice::with_random_address(&kinds, 0x004242);
    sim.add_device(Box::new(dev));

    let inventory = enumerate_bus(&mut sim, &AllocateOptions::default())
        .await
        .unwrap();
    let devices = inventory.input_device_addresses();
    let records = commands::configure_event_sources(&mut sim, &devices)
        .await
        .unwrap();

    assert_eq!(records.len(), 3);
    assert!(records[0].enabled && records[0].kind == InstanceType::OccupancySensor);
    assert!(!records[1].enabled && records[1].kind == InstanceType::LightSensor);
    assert!(records[2].enabled && records[2].kind == InstanceType::PushButton);

    // Occupancy got the movement-only filter, the light sensor stays
    // dark, and the global scheme reached every instance
    assert_eq!(handle.instance(0).event_filter, OCCUPANCY_FILTER_MOVEMENT);
    assert!(!handle.instance(1).enabled);
    assert_eq!(handle.instance(0).event_scheme, commands::EVENT_SCHEME_DEVICE);
    assert_eq!(handle.instance(2).event_scheme, commands::EVENT_SCHEME_DEVICE);
}

#[tokio::test]
async fn sensor_events_decode_to_address_type_info() {
    let mut sim = DaliSim::new();
    let kinds = [
        InstanceType::OccupancySensor.code(),
        InstanceType::LightSensor.code(),
    ];
    let (dev, handle) = SimInputDevice::with_random_address(&kinds, 0x004242);
    sim.add_device(Box::new(dev));

    let inventory = enumerate_bus(&mut sim, &AllocateOptions::default())
        .await
        .unwrap();
    let devices = inventory.input_device_addresses();
    commands::configure_event_sources(&mut sim, &devices)
        .await
        .unwrap();
    let short = handle.short_address().unwrap();

    handle.trigger_occupancy(0, true);
    let event = next_event(&mut sim).await.unwrap();
    assert_eq!(
        event,
        EventMessage {
            device: short,
            instance_type: InstanceType::OccupancySensor.code(),
            info: 1
        }
    );

    // The disabled light sensor generates nothing
    handle.trigger_occupancy(1, true);
    let quiet = tokio::time::timeout(Duration::from_millis(20), next_event(&mut sim)).await;
    assert!(quiet.is_err());
}

#[tokio::test]
async fn telemetry_reads_decode_to_physical_units() {
    let mut sim = DaliSim::new();
    let (dev, handle) =
        SimInputDevice::with_random_address(&[InstanceType::OccupancySensor.code()], 0x004242);
    sim.add_device(Box::new(dev));
    enumerate_bus(&mut sim, &AllocateOptions::default())
        .await
        .unwrap();
    let short = Short::new(handle.short_address().unwrap());

    handle.set_temperature(21.5);
    handle.set_humidity(55.0);
    let temperature = sensors::read_temperature(&mut sim, short)
        .await
        .unwrap()
        .unwrap();
    assert!((temperature - 21.5).abs() < 0.05);
    let humidity = sensors::read_humidity(&mut sim, short)
        .await
        .unwrap()
        .unwrap();
    assert!((humidity - 55.0).abs() < 0.5);
}

#[tokio::test]
async fn queries_into_silence_return_none() {
    let mut sim = DaliSim::new();
    assert_eq!(
        gear_ops::query_actual_level(&mut sim, Address::Broadcast)
            .await
            .unwrap(),
        None
    );
    let mut commands = DeviceCommands::new(&mut sim);
    assert!(!should_enumerate(&mut commands, EnumerationPolicy::IfUnaddressed)
        .await
        .unwrap());
}

#[tokio::test]
async fn unaddressed_devices_trigger_the_boot_policy() {
    let mut sim = gear_bus(&[0x123456]);
    {
        let mut commands = GearCommands::new(&mut sim);
        assert!(should_enumerate(&mut commands, EnumerationPolicy::IfUnaddressed)
            .await
            .unwrap());
        assert!(should_enumerate(&mut commands, EnumerationPolicy::Always)
            .await
            .unwrap());
        assign_addresses(&mut commands, DeviceClass::Gear, &AllocateOptions::default())
            .await
            .unwrap();
    }
    let mut commands = GearCommands::new(&mut sim);
    assert!(!should_enumerate(&mut commands, EnumerationPolicy::IfUnaddressed)
        .await
        .unwrap());
}

#[tokio::test]
async fn topology_files_build_working_buses() {
    let json = r#"{
        "gear": [{}, {}, {"random_address": 4660}],
        "inputs": [{"instances": ["occupancy", "light"]}]
    }"#;
    let topology = Topology::from_json(json).unwrap();
    let (mut sim, handles) = topology.build().unwrap();
    let inventory = enumerate_bus(&mut sim, &AllocateOptions::default())
        .await
        .unwrap();
    assert_eq!(inventory.gear.assigned.len(), 3);
    assert_eq!(inventory.input_devices.assigned.len(), 1);
    assert_eq!(handles.len(), 1);
    assert!(handles[0].short_address().is_some());
}
