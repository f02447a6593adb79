use super::device::DaliSimDevice;
use crate::defs::common::{MASK, YES};
use crate::defs::device::cmd::{opcode, special, SPECIAL_ADDR};
use crate::device::events::EventMessage;
use crate::device::sensors;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Event filter bits of an occupancy sensor instance
pub const FILTER_MOVEMENT: u8 = 0x08;
pub const FILTER_NO_MOVEMENT: u8 = 0x10;

#[derive(Debug, Clone, Copy)]
pub struct SimInstance {
    /// Instance type code
    pub kind: u8,
    pub enabled: bool,
    pub event_filter: u8,
    pub event_scheme: u8,
}

struct InputState {
    powered: bool,
    short_address: u8,
    random_address: u32,
    /// Keep the seeded random address through RANDOMISE
    locked_random: bool,
    search_address: u32,
    initialised: bool,
    withdrawn: bool,
    instances: Vec<SimInstance>,
    dtr0: u8,
    dtr1: u8,
    dtr2: u8,
    /// Manufacturer memory bank with the sensor registers
    bank: [u8; 16],
    events: VecDeque<[u8; 3]>,
}

/// Simulated input device. Created together with a [`SimInputHandle`]
/// that stays outside the bus and drives sensor stimuli.
pub struct SimInputDevice {
    state: Arc<Mutex<InputState>>,
}

#[derive(Clone)]
pub struct SimInputHandle {
    state: Arc<Mutex<InputState>>,
}

impl SimInputDevice {
    pub fn new(kinds: &[u8]) -> (SimInputDevice, SimInputHandle) {
        let instances = kinds
            .iter()
            .map(|&kind| SimInstance {
                kind,
                enabled: false,
                event_filter: 0,
                event_scheme: 0,
            })
            .collect();
        let state = Arc::new(Mutex::new(InputState {
            powered: true,
            short_address: MASK,
            random_address: 0xffffff,
            locked_random: false,
            search_address: 0xffffff,
            initialised: false,
            withdrawn: false,
            instances,
            dtr0: 0,
            dtr1: 0,
            dtr2: 0,
            bank: [0; 16],
            events: VecDeque::new(),
        }));
        (
            SimInputDevice {
                state: state.clone(),
            },
            SimInputHandle { state },
        )
    }

    pub fn with_random_address(kinds: &[u8], addr: u32) -> (SimInputDevice, SimInputHandle) {
        let (dev, handle) = SimInputDevice::new(kinds);
        {
            let mut state = dev.state.lock().unwrap();
            state.random_address = addr;
            state.locked_random = true;
        }
        (dev, handle)
    }
}

impl SimInputHandle {
    pub fn short_address(&self) -> Option<u8> {
        let state = self.state.lock().unwrap();
        if state.short_address == MASK {
            None
        } else {
            Some(state.short_address)
        }
    }

    pub fn set_short_address(&self, short: u8) {
        self.state.lock().unwrap().short_address = short;
    }

    pub fn instance(&self, index: usize) -> SimInstance {
        self.state.lock().unwrap().instances[index]
    }

    /// Occupancy transition on instance `index`. Generates an event
    /// frame if the instance is enabled and its filter passes the
    /// transition.
    pub fn trigger_occupancy(&self, index: usize, movement: bool) {
        let mut state = self.state.lock().unwrap();
        if state.short_address == MASK {
            return;
        }
        let instance = state.instances[index];
        let filter_bit = if movement {
            FILTER_MOVEMENT
        } else {
            FILTER_NO_MOVEMENT
        };
        if !instance.enabled || instance.event_filter & filter_bit == 0 {
            return;
        }
        let message = EventMessage {
            device: state.short_address,
            instance_type: instance.kind,
            info: u16::from(movement),
        };
        let value = message.to_frame();
        let frame = [(value >> 16) as u8, (value >> 8) as u8, value as u8];
        state.events.push_back(frame);
    }

    pub fn set_temperature(&self, celsius: f32) {
        let raw = ((celsius * 10.0).round() + 50.0) as u16;
        let mut state = self.state.lock().unwrap();
        state.bank[sensors::TEMPERATURE_LOC as usize] = (raw >> 2) as u8;
        state.bank[sensors::TEMPERATURE_LOC as usize + 1] = ((raw & 0x03) << 6) as u8;
    }

    pub fn set_humidity(&self, percent: f32) {
        let mut state = self.state.lock().unwrap();
        state.bank[sensors::HUMIDITY_LOC as usize] = (percent * 2.0) as u8;
    }
}

fn yes_if(cond: bool) -> Option<u8> {
    if cond {
        Some(YES)
    } else {
        None
    }
}

fn special_cmd(state: &mut InputState, cmd: u8, data: u8, twice: bool) -> Option<u8> {
    match cmd {
        special::TERMINATE => {
            state.initialised = false;
            state.withdrawn = false;
            None
        }
        special::INITIALISE if twice => {
            // Withdrawn devices stay withdrawn until TERMINATE
            if data == 0x00
                || (data == MASK && state.short_address == MASK)
                || ((data & 0x81) == 0x01 && (data >> 1) == state.short_address)
            {
                state.initialised = true;
            }
            None
        }
        special::RANDOMISE if twice => {
            if state.initialised && !state.locked_random {
                state.random_address = rand::thread_rng().gen_range(0..0x1000000);
            }
            None
        }
        special::COMPARE => yes_if(
            state.initialised && !state.withdrawn && state.random_address <= state.search_address,
        ),
        special::WITHDRAW => {
            if state.initialised && state.random_address == state.search_address {
                state.withdrawn = true;
            }
            None
        }
        special::SEARCHADDRH => {
            if state.initialised {
                state.search_address = (state.search_address & 0x00ffff) | (u32::from(data) << 16);
            }
            None
        }
        special::SEARCHADDRM => {
            if state.initialised {
                state.search_address = (state.search_address & 0xff00ff) | (u32::from(data) << 8);
            }
            None
        }
        special::SEARCHADDRL => {
            if state.initialised {
                state.search_address = (state.search_address & 0xffff00) | u32::from(data);
            }
            None
        }
        special::PROGRAM_SHORT_ADDRESS => {
            if state.initialised && state.search_address == state.random_address {
                if (data & 0x81) == 0x01 {
                    state.short_address = data >> 1;
                } else if data == MASK {
                    state.short_address = MASK;
                }
            }
            None
        }
        special::VERIFY_SHORT_ADDRESS => yes_if(
            state.initialised && (data & 0x81) == 0x01 && state.short_address == data >> 1,
        ),
        special::QUERY_SHORT_ADDRESS => {
            if state.initialised && state.search_address == state.random_address {
                Some((state.short_address << 1) | 0x01)
            } else {
                None
            }
        }
        special::DTR0 => {
            state.dtr0 = data;
            None
        }
        special::DTR1 => {
            state.dtr1 = data;
            None
        }
        special::DTR2 => {
            state.dtr2 = data;
            None
        }
        _ => None,
    }
}

fn device_cmd(state: &mut InputState, cmd: u8) -> Option<u8> {
    match cmd {
        opcode::QUERY_DEVICE_STATUS => Some(0x00),
        opcode::QUERY_INPUT_DEVICE_ERROR => Some(0x00),
        opcode::QUERY_MISSING_SHORT_ADDRESS => yes_if(state.short_address == MASK),
        opcode::QUERY_NUMBER_OF_INSTANCES => Some(state.instances.len() as u8),
        opcode::QUERY_RANDOM_ADDRESS_H => Some((state.random_address >> 16) as u8),
        opcode::QUERY_RANDOM_ADDRESS_M => Some((state.random_address >> 8) as u8),
        opcode::QUERY_RANDOM_ADDRESS_L => Some(state.random_address as u8),
        opcode::READ_MEMORY_LOCATION => {
            if state.dtr1 == sensors::SENSOR_BANK && (state.dtr0 as usize) < state.bank.len() {
                let value = state.bank[state.dtr0 as usize];
                state.dtr0 += 1;
                Some(value)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn instance_cmd(state: &mut InputState, instance: u8, cmd: u8, twice: bool) -> Option<u8> {
    let indices: Vec<usize> = if instance == 0xff {
        (0..state.instances.len()).collect()
    } else if (instance as usize) < state.instances.len() {
        vec![instance as usize]
    } else {
        return None;
    };
    let mut answer = None;
    for index in indices {
        let dtr0 = state.dtr0;
        let inst = &mut state.instances[index];
        answer = match cmd {
            opcode::ENABLE_INSTANCE if twice => {
                inst.enabled = true;
                None
            }
            opcode::DISABLE_INSTANCE if twice => {
                inst.enabled = false;
                None
            }
            opcode::SET_EVENT_FILTER if twice => {
                inst.event_filter = dtr0;
                None
            }
            opcode::SET_EVENT_SCHEME if twice => {
                inst.event_scheme = dtr0;
                None
            }
            opcode::QUERY_INSTANCE_TYPE => Some(inst.kind),
            opcode::QUERY_INSTANCE_STATUS => Some(if inst.enabled { 0x01 } else { 0x00 }),
            opcode::QUERY_INSTANCE_ENABLED => Some(if inst.enabled { YES } else { 0x00 }),
            opcode::QUERY_EVENT_SCHEME => Some(inst.event_scheme),
            opcode::QUERY_EVENT_FILTER_0_7 => Some(inst.event_filter),
            _ => None,
        };
    }
    answer
}

impl DaliSimDevice for SimInputDevice {
    fn power(&mut self, on: bool) {
        self.state.lock().unwrap().powered = on;
    }

    fn forward24(&mut self, frame: &[u8; 3], twice: bool) -> Option<u8> {
        let mut state = self.state.lock().unwrap();
        if !state.powered {
            return None;
        }
        if frame[0] == SPECIAL_ADDR {
            return special_cmd(&mut state, frame[1], frame[2], twice);
        }
        if frame[0] & 0x01 == 0 {
            return None;
        }
        let addressed = match frame[0] >> 1 {
            a @ 0x00..=0x3f => a == state.short_address,
            0x7e => state.short_address == MASK,
            0x7f => true,
            _ => false,
        };
        if !addressed {
            return None;
        }
        match frame[1] {
            0xfe => device_cmd(&mut state, frame[2]),
            instance => instance_cmd(&mut state, instance, frame[2], twice),
        }
    }

    fn poll_event(&mut self) -> Option<[u8; 3]> {
        self.state.lock().unwrap().events.pop_front()
    }
}
