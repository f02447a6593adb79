use crate::defs::common::{AddressByte, INSTANCE_DEVICE};

/// 24-bit forward frame for input devices, carrying an instance byte
/// between the address and the opcode.
pub struct Command<const ANSWER: bool, const TWICE: bool>(pub [u8; 3]);

macro_rules! cmd_type {
    () => {Command<false,false>};
    (Answer) => {Command<true,false>};
    (Twice) => {Command<false,true>};
}

// Commands addressed to the device itself rather than one of its
// instances.
macro_rules! dev_cmd_def {
    ($sym: ident, $opcode: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub fn $sym<A>(addr: A) -> cmd_type!($($attr)?)
        where
            A: Into<AddressByte>,
        {
            Command([addr.into().0, INSTANCE_DEVICE.0, $opcode])
        }
    };
}

// Commands addressed to a single instance of a device.
macro_rules! inst_cmd_def {
    ($sym: ident, $opcode: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub fn $sym<A, I>(addr: A, instance: I) -> cmd_type!($($attr)?)
        where
            A: Into<AddressByte>,
            I: Into<crate::defs::common::InstanceByte>,
        {
            Command([addr.into().0, instance.into().0, $opcode])
        }
    };
}

macro_rules! special_cmd_def {
    ($sym: ident, $opcode: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub const fn $sym() -> cmd_type!($($attr)?) {
            Command([SPECIAL_ADDR, $opcode, 0x00])
        }
    };
}

macro_rules! special_data_cmd_def {
    ($sym: ident, $opcode: expr $(,$attr: ident)?) => {
        #[allow(non_snake_case)]
        #[inline(always)]
        pub const fn $sym(data: u8) -> cmd_type!($($attr)?) {
            Command([SPECIAL_ADDR, $opcode, data])
        }
    };
}

/// Address byte shared by all input-device special commands
pub const SPECIAL_ADDR: u8 = 0xc1;

dev_cmd_def!(IDENTIFY_DEVICE, 0x00, Twice);
dev_cmd_def!(QUERY_DEVICE_STATUS, 0x30, Answer);
dev_cmd_def!(QUERY_INPUT_DEVICE_ERROR, 0x32, Answer);
dev_cmd_def!(QUERY_MISSING_SHORT_ADDRESS, 0x33, Answer);
dev_cmd_def!(QUERY_NUMBER_OF_INSTANCES, 0x35, Answer);
dev_cmd_def!(QUERY_RANDOM_ADDRESS_H, 0x39, Answer);
dev_cmd_def!(QUERY_RANDOM_ADDRESS_M, 0x3a, Answer);
dev_cmd_def!(QUERY_RANDOM_ADDRESS_L, 0x3b, Answer);
dev_cmd_def!(READ_MEMORY_LOCATION, 0x3c, Answer);

inst_cmd_def!(ENABLE_INSTANCE, 0x62, Twice);
inst_cmd_def!(DISABLE_INSTANCE, 0x63, Twice);
inst_cmd_def!(SET_EVENT_SCHEME, 0x67, Twice);
inst_cmd_def!(SET_EVENT_FILTER, 0x68, Twice);

inst_cmd_def!(QUERY_INSTANCE_TYPE, 0x80, Answer);
inst_cmd_def!(QUERY_INSTANCE_STATUS, 0x83, Answer);
inst_cmd_def!(QUERY_INSTANCE_ENABLED, 0x86, Answer);
inst_cmd_def!(QUERY_EVENT_SCHEME, 0x8b, Answer);
inst_cmd_def!(QUERY_INPUT_VALUE, 0x8c, Answer);
inst_cmd_def!(QUERY_EVENT_FILTER_0_7, 0x90, Answer);

special_cmd_def!(TERMINATE, 0x00);
special_data_cmd_def!(INITIALISE, 0x01, Twice);
special_cmd_def!(RANDOMISE, 0x02, Twice);
special_cmd_def!(COMPARE, 0x03, Answer);
special_cmd_def!(WITHDRAW, 0x04);
special_data_cmd_def!(SEARCHADDRH, 0x05);
special_data_cmd_def!(SEARCHADDRM, 0x06);
special_data_cmd_def!(SEARCHADDRL, 0x07);
special_data_cmd_def!(PROGRAM_SHORT_ADDRESS, 0x08);
special_data_cmd_def!(VERIFY_SHORT_ADDRESS, 0x09, Answer);
special_cmd_def!(QUERY_SHORT_ADDRESS, 0x0a, Answer);
special_data_cmd_def!(DTR0, 0x30);
special_data_cmd_def!(DTR1, 0x31);
special_data_cmd_def!(DTR2, 0x32);

/// INITIALISE data byte selecting every input device on the bus
pub const INITIALISE_ALL: u8 = 0x00;
/// INITIALISE data byte selecting only devices without a short address
pub const INITIALISE_UNADDRESSED: u8 = 0xff;

/// Raw special-command opcodes (the instance byte of a frame with the
/// special address), for receivers matching incoming frames.
pub mod special {
    pub const TERMINATE: u8 = 0x00;
    pub const INITIALISE: u8 = 0x01;
    pub const RANDOMISE: u8 = 0x02;
    pub const COMPARE: u8 = 0x03;
    pub const WITHDRAW: u8 = 0x04;
    pub const SEARCHADDRH: u8 = 0x05;
    pub const SEARCHADDRM: u8 = 0x06;
    pub const SEARCHADDRL: u8 = 0x07;
    pub const PROGRAM_SHORT_ADDRESS: u8 = 0x08;
    pub const VERIFY_SHORT_ADDRESS: u8 = 0x09;
    pub const QUERY_SHORT_ADDRESS: u8 = 0x0a;
    pub const DTR0: u8 = 0x30;
    pub const DTR1: u8 = 0x31;
    pub const DTR2: u8 = 0x32;
}

/// Raw opcodes of the addressed commands.
pub mod opcode {
    pub const IDENTIFY_DEVICE: u8 = 0x00;
    pub const QUERY_DEVICE_STATUS: u8 = 0x30;
    pub const QUERY_INPUT_DEVICE_ERROR: u8 = 0x32;
    pub const QUERY_MISSING_SHORT_ADDRESS: u8 = 0x33;
    pub const QUERY_NUMBER_OF_INSTANCES: u8 = 0x35;
    pub const QUERY_RANDOM_ADDRESS_H: u8 = 0x39;
    pub const QUERY_RANDOM_ADDRESS_M: u8 = 0x3a;
    pub const QUERY_RANDOM_ADDRESS_L: u8 = 0x3b;
    pub const READ_MEMORY_LOCATION: u8 = 0x3c;
    pub const ENABLE_INSTANCE: u8 = 0x62;
    pub const DISABLE_INSTANCE: u8 = 0x63;
    pub const SET_EVENT_SCHEME: u8 = 0x67;
    pub const SET_EVENT_FILTER: u8 = 0x68;
    pub const QUERY_INSTANCE_TYPE: u8 = 0x80;
    pub const QUERY_INSTANCE_STATUS: u8 = 0x83;
    pub const QUERY_INSTANCE_ENABLED: u8 = 0x86;
    pub const QUERY_EVENT_SCHEME: u8 = 0x8b;
    pub const QUERY_INPUT_VALUE: u8 = 0x8c;
    pub const QUERY_EVENT_FILTER_0_7: u8 = 0x90;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::address::Short;

    #[test]
    fn instance_byte_sits_between_address_and_opcode() {
        let cmd = QUERY_INSTANCE_TYPE(Short::new(2), 1u8);
        assert_eq!(cmd.0, [0x05, 0x01, 0x80]);
    }

    #[test]
    fn device_commands_use_the_device_instance() {
        let cmd = QUERY_NUMBER_OF_INSTANCES(Short::new(0));
        assert_eq!(cmd.0, [0x01, 0xfe, 0x35]);
    }

    #[test]
    fn special_commands_share_the_special_address() {
        assert_eq!(COMPARE().0, [0xc1, 0x03, 0x00]);
        assert_eq!(SEARCHADDRL(0xab).0, [0xc1, 0x07, 0xab]);
    }
}
