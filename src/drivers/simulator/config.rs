//! Topology description for a simulated bus, loadable from JSON.

use super::gear::SimGear;
use super::input::{SimInputDevice, SimInputHandle};
use super::simulator::DaliSim;
use crate::device::commands::InstanceType;
use crate::error::DynResult;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub gear: Vec<GearSpec>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GearSpec {
    /// Fixed random address; drawn fresh if omitted
    pub random_address: Option<u32>,
    pub short_address: Option<u8>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InputSpec {
    pub random_address: Option<u32>,
    /// Instance types by name: "button", "occupancy", "light"
    pub instances: Vec<String>,
}

fn instance_kind(name: &str) -> DynResult<u8> {
    let kind = match name {
        "button" => InstanceType::PushButton,
        "occupancy" => InstanceType::OccupancySensor,
        "light" => InstanceType::LightSensor,
        other => return Err(format!("unknown instance type: {}", other).into()),
    };
    Ok(kind.code())
}

impl Topology {
    pub fn from_json(json: &str) -> DynResult<Topology> {
        Ok(serde_json::from_str(json)?)
    }

    /// A plain bus: `gear_count` gears and `input_count` sensors with
    /// one occupancy and one light instance each.
    pub fn simple(gear_count: usize, input_count: usize) -> Topology {
        Topology {
            gear: (0..gear_count).map(|_| GearSpec::default()).collect(),
            inputs: (0..input_count)
                .map(|_| InputSpec {
                    random_address: None,
                    instances: vec!["occupancy".to_string(), "light".to_string()],
                })
                .collect(),
        }
    }

    /// Build the simulated bus. The returned handles drive the input
    /// devices' stimuli from the outside.
    pub fn build(&self) -> DynResult<(DaliSim, Vec<SimInputHandle>)> {
        let mut rng = rand::thread_rng();
        let mut used = std::collections::HashSet::new();
        let mut draw = move |fixed: Option<u32>| match fixed {
            Some(addr) => addr,
            None => loop {
                let addr = rng.gen_range(0..0x1000000);
                if used.insert(addr) {
                    break addr;
                }
            },
        };
        let mut sim = DaliSim::new();
        for spec in &self.gear {
            let random = draw(spec.random_address);
            let gear = match spec.short_address {
                Some(short) => SimGear::with_short_address(random, short),
                None => SimGear::with_random_address(random),
            };
            sim.add_device(Box::new(gear));
        }
        let mut handles = Vec::new();
        for spec in &self.inputs {
            let kinds = spec
                .instances
                .iter()
                .map(|name| instance_kind(name))
                .collect::<DynResult<Vec<u8>>>()?;
            let random = draw(spec.random_address);
            let (device, handle) = SimInputDevice::with_random_address(&kinds, random);
            sim.add_device(Box::new(device));
            handles.push(handle);
        }
        Ok((sim, handles))
    }
}
