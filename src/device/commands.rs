//! Input-device command surface and the post-enumeration walk that
//! configures event sources.

use crate::base::address::{Address, Short};
use crate::defs::common::{InstanceByte, INSTANCE_ALL, YES};
use crate::defs::device::cmd;
use crate::drivers::driver::{DaliDriver, DaliSendResult};
use crate::drivers::driver_utils::DaliDriverExt;
use crate::drivers::send_flags::{EXPECT_ANSWER, NO_FLAG, SEND_TWICE};
use log::{debug, warn};

/// Instance types this controller knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    PushButton,
    /// Motion (PIR) sensor
    OccupancySensor,
    /// Ambient light sensor
    LightSensor,
    Other(u8),
}

impl InstanceType {
    pub fn from_code(code: u8) -> InstanceType {
        match code {
            1 => InstanceType::PushButton,
            3 => InstanceType::OccupancySensor,
            4 => InstanceType::LightSensor,
            other => InstanceType::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            InstanceType::PushButton => 1,
            InstanceType::OccupancySensor => 3,
            InstanceType::LightSensor => 4,
            InstanceType::Other(code) => *code,
        }
    }
}

impl std::fmt::Display for InstanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InstanceType::PushButton => write!(f, "push button"),
            InstanceType::OccupancySensor => write!(f, "occupancy sensor"),
            InstanceType::LightSensor => write!(f, "light sensor"),
            InstanceType::Other(code) => write!(f, "type {}", code),
        }
    }
}

/// One instance found during the device walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRecord {
    pub device: Short,
    pub instance: u8,
    pub kind: InstanceType,
    pub enabled: bool,
}

/// Event filter for occupancy sensors passing only the movement and
/// no-movement transitions.
pub const OCCUPANCY_FILTER_MOVEMENT: u8 = 0x18;

/// Event scheme where every frame carries the device short address,
/// the instance type and the event info.
pub const EVENT_SCHEME_DEVICE: u8 = 0x01;

async fn send<const TWICE: bool>(
    driver: &mut dyn DaliDriver,
    cmd: cmd::Command<false, TWICE>,
) -> Result<(), DaliSendResult> {
    driver
        .send_frame24(&cmd.0, if TWICE { SEND_TWICE } else { NO_FLAG })
        .await
        .check_send()
}

async fn query(
    driver: &mut dyn DaliDriver,
    cmd: cmd::Command<true, false>,
) -> Result<Option<u8>, DaliSendResult> {
    match driver.send_frame24(&cmd.0, EXPECT_ANSWER).await {
        DaliSendResult::Answer(value) => Ok(Some(value)),
        DaliSendResult::Timeout => Ok(None),
        other => Err(other),
    }
}

pub async fn query_instance_count(
    driver: &mut dyn DaliDriver,
    device: Short,
) -> Result<Option<u8>, DaliSendResult> {
    query(driver, cmd::QUERY_NUMBER_OF_INSTANCES(device)).await
}

pub async fn query_instance_type(
    driver: &mut dyn DaliDriver,
    device: Short,
    instance: u8,
) -> Result<Option<InstanceType>, DaliSendResult> {
    Ok(query(driver, cmd::QUERY_INSTANCE_TYPE(device, instance))
        .await?
        .map(InstanceType::from_code))
}

pub async fn query_instance_status(
    driver: &mut dyn DaliDriver,
    device: Short,
    instance: u8,
) -> Result<Option<u8>, DaliSendResult> {
    query(driver, cmd::QUERY_INSTANCE_STATUS(device, instance)).await
}

pub async fn query_instance_enabled(
    driver: &mut dyn DaliDriver,
    device: Short,
    instance: u8,
) -> Result<Option<bool>, DaliSendResult> {
    Ok(query(driver, cmd::QUERY_INSTANCE_ENABLED(device, instance))
        .await?
        .map(|v| v == YES))
}

pub async fn enable_instance(
    driver: &mut dyn DaliDriver,
    device: Short,
    instance: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::ENABLE_INSTANCE(device, instance)).await
}

pub async fn disable_instance(
    driver: &mut dyn DaliDriver,
    device: Short,
    instance: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DISABLE_INSTANCE(device, instance)).await
}

/// Program which transitions of an instance generate events.
pub async fn set_event_filter(
    driver: &mut dyn DaliDriver,
    device: Short,
    instance: u8,
    filter: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DTR0(filter)).await?;
    send(driver, cmd::SET_EVENT_FILTER(device, instance)).await
}

/// Program the event addressing scheme for one instance.
pub async fn set_event_scheme(
    driver: &mut dyn DaliDriver,
    device: Short,
    instance: u8,
    scheme: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DTR0(scheme)).await?;
    send(driver, cmd::SET_EVENT_SCHEME(device, instance)).await
}

/// Program the event scheme for every instance of every device.
pub async fn set_event_scheme_all(
    driver: &mut dyn DaliDriver,
    scheme: u8,
) -> Result<(), DaliSendResult> {
    send(driver, cmd::DTR0(scheme)).await?;
    send(
        driver,
        cmd::SET_EVENT_SCHEME(Address::Broadcast, InstanceByte::from(INSTANCE_ALL.0)),
    )
    .await
}

/// Error flags of an input device, masked to the two error bits.
pub async fn query_input_device_error(
    driver: &mut dyn DaliDriver,
    device: Short,
) -> Result<Option<u8>, DaliSendResult> {
    Ok(query(driver, cmd::QUERY_INPUT_DEVICE_ERROR(device))
        .await?
        .map(|v| v & 0x03))
}

pub async fn identify(driver: &mut dyn DaliDriver, device: Short) -> Result<(), DaliSendResult> {
    send(driver, cmd::IDENTIFY_DEVICE(device)).await
}

/// Walk all enumerated input devices: discover their instances,
/// disable ambient light sensors (their events would chase the very
/// illumination this controller changes), enable everything else, give
/// occupancy sensors a movement-only event filter, and finally program
/// the global event scheme.
pub async fn configure_event_sources(
    driver: &mut dyn DaliDriver,
    devices: &[Short],
) -> Result<Vec<InstanceRecord>, DaliSendResult> {
    let mut records = Vec::new();
    for &device in devices {
        let Some(count) = query_instance_count(driver, device).await? else {
            warn!("input device {} did not report its instances", device);
            continue;
        };
        debug!("input device {} has {} instances", device, count);
        for instance in 0..count {
            let Some(kind) = query_instance_type(driver, device, instance).await? else {
                warn!("no type reply for {}:{}", device, instance);
                continue;
            };
            let enabled = match kind {
                InstanceType::LightSensor => {
                    disable_instance(driver, device, instance).await?;
                    false
                }
                kind => {
                    enable_instance(driver, device, instance).await?;
                    if kind == InstanceType::OccupancySensor {
                        set_event_filter(driver, device, instance, OCCUPANCY_FILTER_MOVEMENT)
                            .await?;
                    }
                    true
                }
            };
            debug!("{}:{} is a {}, enabled: {}", device, instance, kind, enabled);
            records.push(InstanceRecord {
                device,
                instance,
                kind,
                enabled,
            });
        }
    }
    set_event_scheme_all(driver, EVENT_SCHEME_DEVICE).await?;
    Ok(records)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instance_type_codes_round_trip() {
        for code in 0..=255u8 {
            assert_eq!(InstanceType::from_code(code).code(), code);
        }
    }
}
