//! Telemetry reads from sensor heads: temperature and humidity
//! registers exposed through the memory-bank access path.

use crate::base::address::Short;
use crate::defs::device::cmd;
use crate::drivers::driver::{DaliDriver, DaliSendResult};
use crate::drivers::driver_utils::DaliDriverExt;
use crate::drivers::send_flags::{EXPECT_ANSWER, NO_FLAG};

/// Manufacturer bank holding the sensor registers
pub const SENSOR_BANK: u8 = 0x02;
/// Temperature high byte; the low byte follows at the next location
pub const TEMPERATURE_LOC: u8 = 0x05;
/// Relative humidity, half-percent steps
pub const HUMIDITY_LOC: u8 = 0x07;

/// Two register reads carry a left-aligned 10-bit temperature value.
pub fn combine_temperature_raw(high: u8, low: u8) -> u16 {
    (u16::from(high) << 2) | (u16::from(low) >> 6)
}

/// Raw 10-bit reading to degrees Celsius, offset by -5 °C in 0.1 °C
/// steps.
pub fn temperature_celsius(raw: u16) -> f32 {
    (f32::from(raw) - 50.0) * 0.1
}

pub fn humidity_percent(raw: u8) -> f32 {
    f32::from(raw) / 2.0
}

async fn select_location(
    driver: &mut dyn DaliDriver,
    location: u8,
) -> Result<(), DaliSendResult> {
    driver
        .send_frame24(&cmd::DTR1(SENSOR_BANK).0, NO_FLAG)
        .await
        .check_send()?;
    driver
        .send_frame24(&cmd::DTR0(location).0, NO_FLAG)
        .await
        .check_send()
}

/// Read the selected memory location; the location register increments
/// after every read.
async fn read_memory(
    driver: &mut dyn DaliDriver,
    device: Short,
) -> Result<Option<u8>, DaliSendResult> {
    match driver
        .send_frame24(&cmd::READ_MEMORY_LOCATION(device).0, EXPECT_ANSWER)
        .await
    {
        DaliSendResult::Answer(value) => Ok(Some(value)),
        DaliSendResult::Timeout => Ok(None),
        other => Err(other),
    }
}

/// Temperature in degrees Celsius, `None` if the device does not
/// carry the register or never answers.
pub async fn read_temperature(
    driver: &mut dyn DaliDriver,
    device: Short,
) -> Result<Option<f32>, DaliSendResult> {
    select_location(driver, TEMPERATURE_LOC).await?;
    let Some(high) = read_memory(driver, device).await? else {
        return Ok(None);
    };
    let Some(low) = read_memory(driver, device).await? else {
        return Ok(None);
    };
    Ok(Some(temperature_celsius(combine_temperature_raw(high, low))))
}

/// Relative humidity in percent.
pub async fn read_humidity(
    driver: &mut dyn DaliDriver,
    device: Short,
) -> Result<Option<f32>, DaliSendResult> {
    select_location(driver, HUMIDITY_LOC).await?;
    Ok(read_memory(driver, device).await?.map(humidity_percent))
}

#[cfg(test)]
mod test {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn temperature_scale() {
        assert!(close(temperature_celsius(50), 0.0));
        assert!(close(temperature_celsius(0), -5.0));
        assert!(close(temperature_celsius(1023), 97.3));
    }

    #[test]
    fn temperature_bytes_combine_left_aligned() {
        // 10 bits spread over high byte and top two bits of low byte
        assert_eq!(combine_temperature_raw(0xff, 0xc0), 1023);
        assert_eq!(combine_temperature_raw(0x00, 0x40), 1);
        assert_eq!(combine_temperature_raw(0x01, 0x00), 4);
    }

    #[test]
    fn humidity_scale() {
        assert!(close(humidity_percent(0), 0.0));
        assert!(close(humidity_percent(100), 50.0));
        assert!(close(humidity_percent(0xc8), 100.0));
    }
}
