//! The special-command surface shared by the two device classes.
//! Control gear listens in the 16-bit command space, input devices in
//! the 24-bit one; the enumeration algorithm is identical over either.

use crate::base::address::{Address, Short};
use crate::defs::common::MASK;
use crate::defs::device::cmd as device_cmd;
use crate::defs::gear::cmd as gear_cmd;
use crate::drivers::driver::{DaliDriver, DaliFrame, DaliSendResult, YesNo};
use crate::drivers::send_flags::{EXPECT_ANSWER, NO_FLAG, SEND_TWICE};

/// Which devices an INITIALISE opens the enumeration window for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialiseScope {
    All,
    /// Only devices that do not have a short address yet. This is what
    /// makes incremental re-enumeration non-destructive.
    Unaddressed,
}

/// Special commands of one device class, driven by the allocator.
pub trait Commands: Send {
    async fn initialise(&mut self, scope: InitialiseScope) -> Result<(), DaliSendResult>;
    async fn terminate(&mut self) -> Result<(), DaliSendResult>;
    async fn randomise(&mut self) -> Result<(), DaliSendResult>;
    async fn compare(&mut self) -> Result<YesNo, DaliSendResult>;
    async fn withdraw(&mut self) -> Result<(), DaliSendResult>;
    async fn searchaddr_h(&mut self, b: u8) -> Result<(), DaliSendResult>;
    async fn searchaddr_m(&mut self, b: u8) -> Result<(), DaliSendResult>;
    async fn searchaddr_l(&mut self, b: u8) -> Result<(), DaliSendResult>;
    /// Program the selected device's short address.
    async fn program_short_address(&mut self, addr: Short) -> Result<(), DaliSendResult>;
    /// Remove the selected device's short address.
    async fn clear_short_address(&mut self) -> Result<(), DaliSendResult>;
    async fn verify_short_address(&mut self, addr: Short) -> Result<YesNo, DaliSendResult>;
    /// Read the selected device's short address, `None` if it has none.
    async fn query_short_address(&mut self) -> Result<Option<Short>, DaliSendResult>;
    /// Broadcast probe: does any device lack a short address?
    async fn query_missing_short_address(&mut self) -> Result<YesNo, DaliSendResult>;
}

fn short_from_reply(reply: u8) -> Option<Short> {
    if reply == MASK {
        None
    } else {
        Some(Short::new((reply >> 1) & 0x3f))
    }
}

/// [`Commands`] in the 16-bit control-gear space.
pub struct GearCommands<'a> {
    driver: &'a mut dyn DaliDriver,
}

impl<'a> GearCommands<'a> {
    pub fn new(driver: &'a mut dyn DaliDriver) -> Self {
        GearCommands { driver }
    }

    async fn send<const TWICE: bool>(
        &mut self,
        cmd: gear_cmd::Command<false, TWICE>,
    ) -> Result<(), DaliSendResult> {
        self.driver
            .send_frame(
                DaliFrame::Frame16(cmd.0),
                if TWICE { SEND_TWICE } else { NO_FLAG },
            )
            .await
            .check_send()
    }

    async fn query(&mut self, cmd: gear_cmd::Command<true, false>) -> Result<u8, DaliSendResult> {
        self.driver
            .send_frame(DaliFrame::Frame16(cmd.0), EXPECT_ANSWER)
            .await
            .check_answer()
    }

    async fn query_yes_no(
        &mut self,
        cmd: gear_cmd::Command<true, false>,
    ) -> Result<YesNo, DaliSendResult> {
        self.driver
            .send_frame(DaliFrame::Frame16(cmd.0), EXPECT_ANSWER)
            .await
            .check_yes_no()
    }
}

impl Commands for GearCommands<'_> {
    async fn initialise(&mut self, scope: InitialiseScope) -> Result<(), DaliSendResult> {
        let data = match scope {
            InitialiseScope::All => gear_cmd::INITIALISE_ALL,
            InitialiseScope::Unaddressed => gear_cmd::INITIALISE_UNADDRESSED,
        };
        self.send(gear_cmd::INITIALISE(data)).await
    }

    async fn terminate(&mut self) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::TERMINATE()).await
    }

    async fn randomise(&mut self) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::RANDOMISE()).await
    }

    async fn compare(&mut self) -> Result<YesNo, DaliSendResult> {
        self.query_yes_no(gear_cmd::COMPARE()).await
    }

    async fn withdraw(&mut self) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::WITHDRAW()).await
    }

    async fn searchaddr_h(&mut self, b: u8) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::SEARCHADDRH(b)).await
    }

    async fn searchaddr_m(&mut self, b: u8) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::SEARCHADDRM(b)).await
    }

    async fn searchaddr_l(&mut self, b: u8) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::SEARCHADDRL(b)).await
    }

    async fn program_short_address(&mut self, addr: Short) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::PROGRAM_SHORT_ADDRESS(addr.bus_address()))
            .await
    }

    async fn clear_short_address(&mut self) -> Result<(), DaliSendResult> {
        self.send(gear_cmd::PROGRAM_SHORT_ADDRESS(MASK)).await
    }

    async fn verify_short_address(&mut self, addr: Short) -> Result<YesNo, DaliSendResult> {
        self.query_yes_no(gear_cmd::VERIFY_SHORT_ADDRESS(addr.bus_address()))
            .await
    }

    async fn query_short_address(&mut self) -> Result<Option<Short>, DaliSendResult> {
        Ok(short_from_reply(
            self.query(gear_cmd::QUERY_SHORT_ADDRESS()).await?,
        ))
    }

    async fn query_missing_short_address(&mut self) -> Result<YesNo, DaliSendResult> {
        self.query_yes_no(gear_cmd::QUERY_MISSING_SHORT_ADDRESS(Address::Broadcast))
            .await
    }
}

/// [`Commands`] in the 24-bit input-device space.
pub struct DeviceCommands<'a> {
    driver: &'a mut dyn DaliDriver,
}

impl<'a> DeviceCommands<'a> {
    pub fn new(driver: &'a mut dyn DaliDriver) -> Self {
        DeviceCommands { driver }
    }

    async fn send<const TWICE: bool>(
        &mut self,
        cmd: device_cmd::Command<false, TWICE>,
    ) -> Result<(), DaliSendResult> {
        self.driver
            .send_frame(
                DaliFrame::Frame24(cmd.0),
                if TWICE { SEND_TWICE } else { NO_FLAG },
            )
            .await
            .check_send()
    }

    async fn query(
        &mut self,
        cmd: device_cmd::Command<true, false>,
    ) -> Result<u8, DaliSendResult> {
        self.driver
            .send_frame(DaliFrame::Frame24(cmd.0), EXPECT_ANSWER)
            .await
            .check_answer()
    }

    async fn query_yes_no(
        &mut self,
        cmd: device_cmd::Command<true, false>,
    ) -> Result<YesNo, DaliSendResult> {
        self.driver
            .send_frame(DaliFrame::Frame24(cmd.0), EXPECT_ANSWER)
            .await
            .check_yes_no()
    }
}

impl Commands for DeviceCommands<'_> {
    async fn initialise(&mut self, scope: InitialiseScope) -> Result<(), DaliSendResult> {
        let data = match scope {
            InitialiseScope::All => device_cmd::INITIALISE_ALL,
            InitialiseScope::Unaddressed => device_cmd::INITIALISE_UNADDRESSED,
        };
        self.send(device_cmd::INITIALISE(data)).await
    }

    async fn terminate(&mut self) -> Result<(), DaliSendResult> {
        self.send(device_cmd::TERMINATE()).await
    }

    async fn randomise(&mut self) -> Result<(), DaliSendResult> {
        self.send(device_cmd::RANDOMISE()).await
    }

    async fn compare(&mut self) -> Result<YesNo, DaliSendResult> {
        self.query_yes_no(device_cmd::COMPARE()).await
    }

    async fn withdraw(&mut self) -> Result<(), DaliSendResult> {
        self.send(device_cmd::WITHDRAW()).await
    }

    async fn searchaddr_h(&mut self, b: u8) -> Result<(), DaliSendResult> {
        self.send(device_cmd::SEARCHADDRH(b)).await
    }

    async fn searchaddr_m(&mut self, b: u8) -> Result<(), DaliSendResult> {
        self.send(device_cmd::SEARCHADDRM(b)).await
    }

    async fn searchaddr_l(&mut self, b: u8) -> Result<(), DaliSendResult> {
        self.send(device_cmd::SEARCHADDRL(b)).await
    }

    async fn program_short_address(&mut self, addr: Short) -> Result<(), DaliSendResult> {
        self.send(device_cmd::PROGRAM_SHORT_ADDRESS(addr.bus_address()))
            .await
    }

    async fn clear_short_address(&mut self) -> Result<(), DaliSendResult> {
        self.send(device_cmd::PROGRAM_SHORT_ADDRESS(MASK)).await
    }

    async fn verify_short_address(&mut self, addr: Short) -> Result<YesNo, DaliSendResult> {
        self.query_yes_no(device_cmd::VERIFY_SHORT_ADDRESS(addr.bus_address()))
            .await
    }

    async fn query_short_address(&mut self) -> Result<Option<Short>, DaliSendResult> {
        Ok(short_from_reply(
            self.query(device_cmd::QUERY_SHORT_ADDRESS()).await?,
        ))
    }

    async fn query_missing_short_address(&mut self) -> Result<YesNo, DaliSendResult> {
        self.query_yes_no(device_cmd::QUERY_MISSING_SHORT_ADDRESS(Address::Broadcast))
            .await
    }
}
