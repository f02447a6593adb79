/// Reply value meaning "yes" for status style queries.
pub const YES: u8 = 0xff;

/// All-ones byte, used as "no value" for addresses, scene levels etc.
pub const MASK: u8 = 0xff;

/// First byte of a forward frame. The low bit selects standard command
/// versus direct arc power, the top bit group/broadcast addressing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AddressByte(pub u8);

impl From<u8> for AddressByte {
    fn from(b: u8) -> AddressByte {
        AddressByte(b)
    }
}

impl From<AddressByte> for u8 {
    fn from(b: AddressByte) -> u8 {
        b.0
    }
}

/// Middle byte of a 24-bit forward frame, selecting an instance on an
/// input device. 0xfe addresses the device itself, 0xff all instances.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InstanceByte(pub u8);

pub const INSTANCE_DEVICE: InstanceByte = InstanceByte(0xfe);
pub const INSTANCE_ALL: InstanceByte = InstanceByte(0xff);

impl From<u8> for InstanceByte {
    fn from(b: u8) -> InstanceByte {
        InstanceByte(b)
    }
}

impl From<InstanceByte> for u8 {
    fn from(b: InstanceByte) -> u8 {
        b.0
    }
}
