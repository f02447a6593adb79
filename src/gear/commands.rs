//! Control-gear command surface: thin encodings over the 16-bit
//! command table. Queries answer `Ok(None)` when no device replies;
//! silence on this bus is an ordinary outcome.

use crate::base::address::{Address, Group, Short};
use crate::defs::gear::cmd;
use crate::defs::gear::status;
use crate::drivers::driver::{DaliDriver, DaliSendResult};
use crate::drivers::driver_utils::DaliDriverExt;
use crate::drivers::send_flags::{EXPECT_ANSWER, NO_FLAG, SEND_TWICE};

async fn send<const TWICE: bool>(
    driver: &mut dyn DaliDriver,
    cmd: cmd::Command<false, TWICE>,
) -> Result<(), DaliSendResult> {
    driver
        .send_frame16(&cmd.0, if TWICE { SEND_TWICE } else { NO_FLAG })
        .await
        .check_send()
}

async fn query(
    driver: &mut dyn DaliDriver,
    cmd: cmd::Command<true, false>,
) -> Result<Option<u8>, DaliSendResult> {
    match driver.send_frame16(&cmd.0, EXPECT_ANSWER).await {
        DaliSendResult::Answer(value) => Ok(Some(value)),
        DaliSendResult::Timeout => Ok(None),
        other => Err(other),
    }
}

/// Set the light output directly. The device fades to `level` with its
/// programmed fade settings.
pub async fn set_level(
    driver: &mut dyn DaliDriver,
    addr: Address,
    level: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DAPC(addr, level)).await
}

pub async fn turn_off(driver: &mut dyn DaliDriver, addr: Address) -> Result<(), DaliSendResult> {
    send(driver, cmd::OFF(addr)).await
}

pub async fn turn_on(driver: &mut dyn DaliDriver, addr: Address) -> Result<(), DaliSendResult> {
    send(driver, cmd::ON_AND_STEP_UP(addr)).await
}

/// Fade time index 1..=15, see the dimming tables of the standard.
pub async fn set_fade_time(
    driver: &mut dyn DaliDriver,
    addr: Address,
    time: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DTR0(time)).await?;
    send(driver, cmd::SET_FADE_TIME(addr)).await
}

/// Fade rate index 1..=15.
pub async fn set_fade_rate(
    driver: &mut dyn DaliDriver,
    addr: Address,
    rate: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DTR0(rate)).await?;
    send(driver, cmd::SET_FADE_RATE(addr)).await
}

pub async fn set_max_level(
    driver: &mut dyn DaliDriver,
    addr: Address,
    level: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DTR0(level)).await?;
    send(driver, cmd::SET_MAX_LEVEL(addr)).await
}

pub async fn set_min_level(
    driver: &mut dyn DaliDriver,
    addr: Address,
    level: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DTR0(level)).await?;
    send(driver, cmd::SET_MIN_LEVEL(addr)).await
}

/// Store the output for scene `scene` (0..=15).
pub async fn define_scene(
    driver: &mut dyn DaliDriver,
    addr: Address,
    scene: u8,
    level: u8,
) -> Result<(), DaliSendResult> {
    assert!(scene < 16);
    send(driver, cmd::DTR0(level)).await?;
    send(driver, cmd::SET_SCENE(addr, scene)).await
}

pub async fn remove_from_scene(
    driver: &mut dyn DaliDriver,
    addr: Address,
    scene: u8,
) -> Result<(), DaliSendResult> {
    assert!(scene < 16);
    send(driver, cmd::REMOVE_FROM_SCENE(addr, scene)).await
}

pub async fn go_to_scene(
    driver: &mut dyn DaliDriver,
    addr: Address,
    scene: u8,
) -> Result<(), DaliSendResult> {
    assert!(scene < 16);
    send(driver, cmd::GO_TO_SCENE(addr, scene)).await
}

/// Read back the group-membership bit for `group`.
async fn group_bit(
    driver: &mut dyn DaliDriver,
    addr: Short,
    group: Group,
) -> Result<Option<bool>, DaliSendResult> {
    let reply = if group.value() < 8 {
        query(driver, cmd::QUERY_GROUPS_0_7(addr)).await?
    } else {
        query(driver, cmd::QUERY_GROUPS_8_15(addr)).await?
    };
    Ok(reply.map(|bits| bits & (1 << (group.value() & 7)) != 0))
}

/// Add a device to a group and verify membership through the group
/// bits. `Some(true)` means the device confirmed it, `None` that it
/// never answered.
pub async fn add_to_group(
    driver: &mut dyn DaliDriver,
    addr: Short,
    group: Group,
) -> Result<Option<bool>, DaliSendResult> {
    send(driver, cmd::ADD_TO_GROUP(addr, group.value())).await?;
    group_bit(driver, addr, group).await
}

/// Remove a device from a group; `Some(true)` means the bit is gone.
pub async fn remove_from_group(
    driver: &mut dyn DaliDriver,
    addr: Short,
    group: Group,
) -> Result<Option<bool>, DaliSendResult> {
    send(driver, cmd::REMOVE_FROM_GROUP(addr, group.value())).await?;
    Ok(group_bit(driver, addr, group).await?.map(|set| !set))
}

/// Both group-membership bytes as one 16-bit set.
pub async fn query_groups(
    driver: &mut dyn DaliDriver,
    addr: Short,
) -> Result<Option<u16>, DaliSendResult> {
    let Some(low) = query(driver, cmd::QUERY_GROUPS_0_7(addr)).await? else {
        return Ok(None);
    };
    let Some(high) = query(driver, cmd::QUERY_GROUPS_8_15(addr)).await? else {
        return Ok(None);
    };
    Ok(Some(u16::from(high) << 8 | u16::from(low)))
}

pub async fn query_actual_level(
    driver: &mut dyn DaliDriver,
    addr: Address,
) -> Result<Option<u8>, DaliSendResult> {
    query(driver, cmd::QUERY_ACTUAL_LEVEL(addr)).await
}

/// Lowest output the gear can physically run at.
pub async fn query_physical_minimum(
    driver: &mut dyn DaliDriver,
    addr: Address,
) -> Result<Option<u8>, DaliSendResult> {
    query(driver, cmd::QUERY_PHYSICAL_MINIMUM(addr)).await
}

/// Programmed fade time and rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeStatus {
    pub time: u8,
    pub rate: u8,
}

pub async fn query_fade(
    driver: &mut dyn DaliDriver,
    addr: Address,
) -> Result<Option<FadeStatus>, DaliSendResult> {
    Ok(query(driver, cmd::QUERY_FADE(addr)).await?.map(|v| FadeStatus {
        time: v >> 4,
        rate: v & 0x0f,
    }))
}

/// Decoded status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GearStatus(pub u8);

impl GearStatus {
    pub fn gear_failure(&self) -> bool {
        self.0 & status::GEAR_FAILURE != 0
    }
    pub fn lamp_failure(&self) -> bool {
        self.0 & status::LAMP_FAILURE != 0
    }
    pub fn lamp_on(&self) -> bool {
        self.0 & status::LAMP_ON != 0
    }
    pub fn limit_error(&self) -> bool {
        self.0 & status::LIMIT_ERROR != 0
    }
    pub fn fade_running(&self) -> bool {
        self.0 & status::FADE_RUNNING != 0
    }
    pub fn missing_short_address(&self) -> bool {
        self.0 & status::NO_ADDRESS != 0
    }
}

pub async fn query_status(
    driver: &mut dyn DaliDriver,
    addr: Address,
) -> Result<Option<GearStatus>, DaliSendResult> {
    Ok(query(driver, cmd::QUERY_STATUS(addr)).await?.map(GearStatus))
}

/// The failure bits of the status reply, masked down to the two error
/// flags.
pub async fn query_error_status(
    driver: &mut dyn DaliDriver,
    addr: Address,
) -> Result<Option<u8>, DaliSendResult> {
    Ok(query(driver, cmd::QUERY_STATUS(addr))
        .await?
        .map(|v| v & status::ERROR_MASK))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fade_status_splits_nibbles() {
        let v = 0x72u8;
        let fade = FadeStatus {
            time: v >> 4,
            rate: v & 0x0f,
        };
        assert_eq!(fade, FadeStatus { time: 7, rate: 2 });
    }

    #[test]
    fn gear_status_bits() {
        let s = GearStatus(status::LAMP_ON | status::NO_ADDRESS);
        assert!(s.lamp_on());
        assert!(s.missing_short_address());
        assert!(!s.lamp_failure());
        assert!(!s.fade_running());
    }
}
