use super::device::DaliSimDevice;
use crate::defs::common::{MASK, YES};
use crate::defs::gear::cmd::{opcode, special};
use crate::defs::gear::status;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialisationState {
    Enabled,
    Disabled,
    Withdrawn,
}

/// Simulated control gear with the state the controller exercises:
/// levels, scenes, groups, fade registers and the enumeration window.
pub struct SimGear {
    pub powered: bool,
    pub actual_level: u8,
    pub min_level: u8,
    pub max_level: u8,
    pub phm: u8,
    /// bits 0-3 fade rate, 4-7 fade time
    pub fade: u8,
    pub short_address: u8,
    pub random_address: u32,
    /// Keep the seeded random address through RANDOMISE so test buses
    /// stay deterministic
    pub locked_random: bool,
    pub search_address: u32,
    pub initialisation_state: InitialisationState,
    pub gear_groups: u16,
    pub scene: [u8; 16],
    pub dtr0: u8,
    pub dtr1: u8,
    pub dtr2: u8,
    pub status: u8,
}

impl SimGear {
    pub fn new() -> SimGear {
        SimGear {
            powered: true,
            actual_level: 0xfe,
            min_level: 0x01,
            max_level: 0xfe,
            phm: 0x01,
            fade: 0x07,
            short_address: MASK,
            random_address: 0xffffff,
            locked_random: false,
            search_address: 0xffffff,
            initialisation_state: InitialisationState::Disabled,
            gear_groups: 0x0000,
            scene: [MASK; 16],
            dtr0: 0,
            dtr1: 0,
            dtr2: 0,
            status: 0x00,
        }
    }

    pub fn with_random_address(addr: u32) -> SimGear {
        let mut gear = SimGear::new();
        gear.random_address = addr;
        gear.locked_random = true;
        gear
    }

    pub fn with_short_address(addr: u32, short: u8) -> SimGear {
        let mut gear = SimGear::with_random_address(addr);
        gear.short_address = short;
        gear
    }
}

impl Default for SimGear {
    fn default() -> Self {
        Self::new()
    }
}

fn update_status(dev: &mut SimGear) {
    dev.status = (dev.status & !(status::LAMP_ON | status::NO_ADDRESS))
        | if dev.actual_level > 0 { status::LAMP_ON } else { 0 }
        | if dev.short_address == MASK {
            status::NO_ADDRESS
        } else {
            0
        };
}

fn yes_if(cond: bool) -> Option<u8> {
    if cond {
        Some(YES)
    } else {
        None
    }
}

fn device_cmd(dev: &mut SimGear, cmd: u8, twice: bool) -> Option<u8> {
    match cmd {
        opcode::OFF => {
            dev.actual_level = 0;
            None
        }
        opcode::UP | opcode::ON_AND_STEP_UP => {
            dev.actual_level = dev.actual_level.saturating_add(1).min(dev.max_level);
            None
        }
        opcode::DOWN => {
            dev.actual_level = dev.actual_level.saturating_sub(1).max(dev.min_level);
            None
        }
        opcode::RECALL_MAX_LEVEL => {
            dev.actual_level = dev.max_level;
            None
        }
        opcode::RECALL_MIN_LEVEL => {
            dev.actual_level = dev.min_level;
            None
        }
        c if (opcode::GO_TO_SCENE..opcode::GO_TO_SCENE + 16).contains(&c) => {
            let level = dev.scene[(c & 0x0f) as usize];
            if level != MASK {
                dev.actual_level = level;
            }
            None
        }
        opcode::SET_MAX_LEVEL if twice => {
            dev.max_level = dev.dtr0;
            None
        }
        opcode::SET_MIN_LEVEL if twice => {
            dev.min_level = dev.dtr0;
            None
        }
        opcode::SET_FADE_TIME if twice => {
            dev.fade = (dev.fade & 0x0f) | (dev.dtr0 << 4);
            None
        }
        opcode::SET_FADE_RATE if twice => {
            dev.fade = (dev.fade & 0xf0) | (dev.dtr0 & 0x0f);
            None
        }
        c if twice && (opcode::SET_SCENE..opcode::SET_SCENE + 16).contains(&c) => {
            dev.scene[(c & 0x0f) as usize] = dev.dtr0;
            None
        }
        c if twice && (opcode::REMOVE_FROM_SCENE..opcode::REMOVE_FROM_SCENE + 16).contains(&c) => {
            dev.scene[(c & 0x0f) as usize] = MASK;
            None
        }
        c if twice && (opcode::ADD_TO_GROUP..opcode::ADD_TO_GROUP + 16).contains(&c) => {
            dev.gear_groups |= 1 << (c & 0x0f);
            None
        }
        c if twice && (opcode::REMOVE_FROM_GROUP..opcode::REMOVE_FROM_GROUP + 16).contains(&c) => {
            dev.gear_groups &= !(1 << (c & 0x0f));
            None
        }
        opcode::QUERY_STATUS => {
            update_status(dev);
            Some(dev.status)
        }
        opcode::QUERY_CONTROL_GEAR_PRESENT => Some(YES),
        opcode::QUERY_LAMP_FAILURE => yes_if(dev.status & status::LAMP_FAILURE != 0),
        opcode::QUERY_LAMP_POWER_ON => yes_if(dev.actual_level > 0),
        opcode::QUERY_MISSING_SHORT_ADDRESS => yes_if(dev.short_address == MASK),
        opcode::QUERY_PHYSICAL_MINIMUM => Some(dev.phm),
        opcode::QUERY_ACTUAL_LEVEL => Some(dev.actual_level),
        opcode::QUERY_MAX_LEVEL => Some(dev.max_level),
        opcode::QUERY_MIN_LEVEL => Some(dev.min_level),
        opcode::QUERY_FADE => Some(dev.fade),
        c if (opcode::QUERY_SCENE_LEVEL..opcode::QUERY_SCENE_LEVEL + 16).contains(&c) => {
            Some(dev.scene[(c & 0x0f) as usize])
        }
        opcode::QUERY_GROUPS_0_7 => Some((dev.gear_groups & 0xff) as u8),
        opcode::QUERY_GROUPS_8_15 => Some((dev.gear_groups >> 8) as u8),
        opcode::QUERY_RANDOM_ADDRESS_H => Some((dev.random_address >> 16) as u8),
        opcode::QUERY_RANDOM_ADDRESS_M => Some((dev.random_address >> 8) as u8),
        opcode::QUERY_RANDOM_ADDRESS_L => Some(dev.random_address as u8),
        _ => None,
    }
}

fn special_cmd(dev: &mut SimGear, cmd: u8, data: u8, twice: bool) -> Option<u8> {
    match cmd {
        special::TERMINATE => {
            dev.initialisation_state = InitialisationState::Disabled;
            None
        }
        special::INITIALISE if twice => {
            // Reopens the window but does not resurrect withdrawn
            // devices; only TERMINATE does that.
            if dev.initialisation_state != InitialisationState::Withdrawn
                && (data == 0x00
                    || (data == MASK && dev.short_address == MASK)
                    || ((data & 0x81) == 0x01 && (data >> 1) == dev.short_address))
            {
                dev.initialisation_state = InitialisationState::Enabled;
            }
            None
        }
        special::RANDOMISE if twice => {
            if dev.initialisation_state != InitialisationState::Disabled && !dev.locked_random {
                dev.random_address = rand::thread_rng().gen_range(0..0x1000000);
            }
            None
        }
        special::COMPARE => yes_if(
            dev.initialisation_state == InitialisationState::Enabled
                && dev.random_address <= dev.search_address,
        ),
        special::WITHDRAW => {
            if dev.initialisation_state == InitialisationState::Enabled
                && dev.random_address == dev.search_address
            {
                dev.initialisation_state = InitialisationState::Withdrawn;
            }
            None
        }
        special::SEARCHADDRH => {
            if dev.initialisation_state != InitialisationState::Disabled {
                dev.search_address = (dev.search_address & 0x00ffff) | (u32::from(data) << 16);
            }
            None
        }
        special::SEARCHADDRM => {
            if dev.initialisation_state != InitialisationState::Disabled {
                dev.search_address = (dev.search_address & 0xff00ff) | (u32::from(data) << 8);
            }
            None
        }
        special::SEARCHADDRL => {
            if dev.initialisation_state != InitialisationState::Disabled {
                dev.search_address = (dev.search_address & 0xffff00) | u32::from(data);
            }
            None
        }
        special::PROGRAM_SHORT_ADDRESS => {
            // Only the selected device takes a new address
            if dev.initialisation_state != InitialisationState::Disabled
                && dev.search_address == dev.random_address
            {
                if (data & 0x81) == 0x01 {
                    dev.short_address = data >> 1;
                } else if data == MASK {
                    dev.short_address = MASK;
                }
            }
            None
        }
        special::VERIFY_SHORT_ADDRESS => yes_if(
            dev.initialisation_state != InitialisationState::Disabled
                && (data & 0x81) == 0x01
                && dev.short_address == data >> 1,
        ),
        special::QUERY_SHORT_ADDRESS => {
            if dev.initialisation_state != InitialisationState::Disabled
                && dev.search_address == dev.random_address
            {
                Some((dev.short_address << 1) | 0x01)
            } else {
                None
            }
        }
        special::DTR0 => {
            dev.dtr0 = data;
            None
        }
        special::DTR1 => {
            dev.dtr1 = data;
            None
        }
        special::DTR2 => {
            dev.dtr2 = data;
            None
        }
        _ => None,
    }
}

impl DaliSimDevice for SimGear {
    fn power(&mut self, on: bool) {
        self.powered = on;
    }

    fn forward16(&mut self, frame: &[u8; 2], twice: bool) -> Option<u8> {
        if !self.powered {
            return None;
        }
        if frame[0] & 0x01 == 0 {
            // Direct arc power
            let addressed = match frame[0] >> 1 {
                a @ 0x00..=0x3f => a == self.short_address,
                a @ 0x40..=0x4f => self.gear_groups & (1 << (a & 0x0f)) != 0,
                0x7f => true,
                _ => false,
            };
            if addressed && frame[1] != MASK {
                self.actual_level = frame[1];
            }
            return None;
        }
        match frame[0] >> 1 {
            addr @ 0x00..=0x3f => {
                if addr == self.short_address {
                    return device_cmd(self, frame[1], twice);
                }
            }
            addr @ 0x40..=0x4f => {
                if self.gear_groups & (1 << (addr & 0x0f)) != 0 {
                    return device_cmd(self, frame[1], twice);
                }
            }
            0x7e => {
                if self.short_address == MASK {
                    return device_cmd(self, frame[1], twice);
                }
            }
            0x7f => {
                return device_cmd(self, frame[1], twice);
            }
            _ => {
                return special_cmd(self, frame[0], frame[1], twice);
            }
        }
        None
    }
}
