//! Decoding of unsolicited sensor event frames.

use crate::drivers::driver::{DaliBusEventType, DaliDriver};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

/// A decoded event frame. The 24 payload bits split into the device
/// short address (top 7 bits), the instance type (next 7 bits) and the
/// event info (low 10 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMessage {
    pub device: u8,
    pub instance_type: u8,
    pub info: u16,
}

impl EventMessage {
    pub fn from_frame(value: u32) -> EventMessage {
        EventMessage {
            device: ((value >> 17) & 0x7f) as u8,
            instance_type: ((value >> 10) & 0x7f) as u8,
            info: (value & 0x3ff) as u16,
        }
    }

    pub fn from_bytes(frame: &[u8; 3]) -> EventMessage {
        Self::from_frame(
            (u32::from(frame[0]) << 16) | (u32::from(frame[1]) << 8) | u32::from(frame[2]),
        )
    }

    pub fn to_frame(&self) -> u32 {
        (u32::from(self.device & 0x7f) << 17)
            | (u32::from(self.instance_type & 0x7f) << 10)
            | u32::from(self.info & 0x3ff)
    }
}

impl std::fmt::Display for EventMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "device {} type {} info {:#05x}",
            self.device, self.instance_type, self.info
        )
    }
}

/// Wait for the next event frame, skipping over other bus traffic.
pub async fn next_event(
    driver: &mut dyn DaliDriver,
) -> Result<EventMessage, Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let event = driver.next_bus_event().await?;
        if let DaliBusEventType::Frame24(frame) = event.event_type {
            return Ok(EventMessage::from_bytes(&frame));
        }
    }
}

/// All future events as a stream. The driver stays locked for as long
/// as the stream is alive; drop the stream to release it.
pub fn event_stream(
    driver: Arc<Mutex<Box<dyn DaliDriver>>>,
) -> Pin<Box<dyn Stream<Item = EventMessage> + Send>> {
    let (tx, rx) = tokio::sync::mpsc::channel(64);
    tokio::spawn(async move {
        let mut driver = driver.lock().await;
        loop {
            match next_event(driver.as_mut()).await {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payload_splits_into_address_type_info() {
        let message = EventMessage::from_frame(0b0000001_0000011_0000000001);
        assert_eq!(
            message,
            EventMessage {
                device: 1,
                instance_type: 3,
                info: 1
            }
        );
    }

    #[test]
    fn encode_decode_round_trip() {
        let message = EventMessage {
            device: 42,
            instance_type: 3,
            info: 0x3ff,
        };
        assert_eq!(EventMessage::from_frame(message.to_frame()), message);
    }

    #[test]
    fn bytes_and_frame_agree() {
        let value = (7u32 << 17) | (4 << 10) | 123;
        let bytes = [
            (value >> 16) as u8,
            (value >> 8) as u8,
            value as u8,
        ];
        assert_eq!(
            EventMessage::from_bytes(&bytes),
            EventMessage::from_frame(value)
        );
    }
}
