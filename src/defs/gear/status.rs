pub const GEAR_FAILURE: u8 = 0x01;
pub const LAMP_FAILURE: u8 = 0x02;
pub const LAMP_ON: u8 = 0x04;
pub const LIMIT_ERROR: u8 = 0x08;
pub const FADE_RUNNING: u8 = 0x10;
pub const RESET_STATE: u8 = 0x20;
pub const NO_ADDRESS: u8 = 0x40;
pub const POWER_CYCLE: u8 = 0x80;

/// Mask for the error bits of a status reply
pub const ERROR_MASK: u8 = GEAR_FAILURE | LAMP_FAILURE;
