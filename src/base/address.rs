use crate::defs::common::AddressByte;
use core::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AddressError {
    NotShort,
    NotGroup,
    InvalidAddress,
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AddressError::NotShort => write!(fmt, "Not a short address"),
            AddressError::NotGroup => write!(fmt, "Not a group address"),
            AddressError::InvalidAddress => write!(fmt, "Invalid address"),
        }
    }
}

impl std::error::Error for AddressError {}

/// Individual device address, 0..=63, unique within one device class.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Short(u8);

impl Short {
    pub fn new(a: u8) -> Short {
        assert!(a < 64);
        Short(a)
    }

    pub fn try_new(a: u8) -> Result<Short, AddressError> {
        if a < 64 {
            Ok(Short(a))
        } else {
            Err(AddressError::NotShort)
        }
    }

    /// Address 0..64
    pub fn value(&self) -> u8 {
        self.0
    }

    /// The address byte for a standard command to this device
    pub fn bus_address(&self) -> u8 {
        (self.0 << 1) | 1
    }
}

impl From<Short> for AddressByte {
    fn from(short: Short) -> AddressByte {
        AddressByte((short.0 << 1) | 1)
    }
}

impl std::fmt::Display for Short {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(fmt)
    }
}

impl FromStr for Short {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u8::from_str(s)
            .map_err(|_| AddressError::InvalidAddress)
            .and_then(Short::try_new)
    }
}

/// Group address, 0..=15. More than one device may act on a group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Group(u8);

impl Group {
    pub fn new(g: u8) -> Group {
        assert!(g < 16);
        Group(g)
    }

    pub fn try_new(g: u8) -> Result<Group, AddressError> {
        if g < 16 {
            Ok(Group(g))
        } else {
            Err(AddressError::NotGroup)
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl From<Group> for AddressByte {
    // Top bit marks that more than one device may respond
    fn from(group: Group) -> AddressByte {
        AddressByte((group.0 << 1) | 0x81)
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(fmt)
    }
}

/// 24-bit random search address, only meaningful during enumeration.
pub type Long = u32;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Address {
    Short(Short),
    Group(Group),
    Broadcast,
    BroadcastUnaddressed,
}

impl Address {
    pub fn from_bus_address(bus: u8) -> Result<Address, AddressError> {
        match bus >> 1 {
            a @ 0..=0x3f => Ok(Address::Short(Short::new(a))),
            a @ 0x40..=0x4f => Ok(Address::Group(Group::new(a & 0x0f))),
            0x7f => Ok(Address::Broadcast),
            0x7e => Ok(Address::BroadcastUnaddressed),
            _ => Err(AddressError::InvalidAddress),
        }
    }
}

impl From<Short> for Address {
    fn from(a: Short) -> Address {
        Address::Short(a)
    }
}

impl From<Group> for Address {
    fn from(g: Group) -> Address {
        Address::Group(g)
    }
}

impl From<Address> for AddressByte {
    fn from(addr: Address) -> AddressByte {
        match addr {
            Address::Short(a) => a.into(),
            Address::Group(g) => g.into(),
            Address::Broadcast => AddressByte(0xff),
            Address::BroadcastUnaddressed => AddressByte(0xfd),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Address::Short(a) => write!(fmt, "{}", a),
            Address::Group(g) => write!(fmt, "G{}", g),
            Address::Broadcast => write!(fmt, "Broadcast"),
            Address::BroadcastUnaddressed => write!(fmt, "Unaddressed"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_bus_address() {
        assert_eq!(AddressByte::from(Short::new(0)).0, 0x01);
        assert_eq!(AddressByte::from(Short::new(3)).0, 0x07);
        assert_eq!(AddressByte::from(Short::new(63)).0, 0x7f);
    }

    #[test]
    fn group_bus_address() {
        assert_eq!(AddressByte::from(Group::new(0)).0, 0x81);
        assert_eq!(AddressByte::from(Group::new(15)).0, 0x9f);
    }

    #[test]
    fn round_trip() {
        for a in 0..64u8 {
            let byte = AddressByte::from(Short::new(a));
            assert_eq!(
                Address::from_bus_address(byte.0),
                Ok(Address::Short(Short::new(a)))
            );
        }
        assert_eq!(Address::from_bus_address(0xff), Ok(Address::Broadcast));
    }
}
