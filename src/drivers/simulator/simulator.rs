//! Transaction-level bus simulator: devices see every forward frame,
//! their answers are aggregated the way a shared line garbles
//! simultaneous replies.

use super::device::DaliSimDevice;
use crate::drivers::driver::{
    DaliBusEvent, DaliBusEventResult, DaliBusEventType, DaliDriver, DaliFrame, DaliSendResult,
};
use crate::drivers::send_flags::Flags;
use crate::utils::dyn_future::DynFuture;
use std::future;
use std::time::{Duration, Instant};

pub struct DaliSim {
    devices: Vec<Box<dyn DaliSimDevice>>,
    /// Every physical frame put on the bus, send-twice pairs included
    log: Vec<DaliFrame>,
}

impl DaliSim {
    pub fn new() -> DaliSim {
        DaliSim {
            devices: Vec::new(),
            log: Vec::new(),
        }
    }

    pub fn add_device(&mut self, device: Box<dyn DaliSimDevice>) {
        self.devices.push(device);
    }

    pub fn set_power(&mut self, on: bool) {
        for device in &mut self.devices {
            device.power(on);
        }
    }

    pub fn frame_log(&self) -> &[DaliFrame] {
        &self.log
    }

    pub fn clear_frame_log(&mut self) {
        self.log.clear();
    }

    fn dispatch(&mut self, frame: &DaliFrame, flags: &Flags) -> DaliSendResult {
        let twice = flags.send_twice();
        self.log.push(frame.clone());
        if twice {
            self.log.push(frame.clone());
        }
        let mut answers = Vec::new();
        for device in &mut self.devices {
            let answer = match frame {
                DaliFrame::Frame16(f) => device.forward16(f, twice),
                DaliFrame::Frame24(f) => device.forward24(f, twice),
                DaliFrame::Frame8(_) => None,
            };
            if let Some(a) = answer {
                answers.push(a);
            }
        }
        if flags.expect_answer() {
            match answers.len() {
                0 => DaliSendResult::Timeout,
                // Several devices drive the line at once and the
                // backward frame comes out garbled
                1 => DaliSendResult::Answer(answers[0]),
                _ => DaliSendResult::Framing,
            }
        } else {
            DaliSendResult::Ok
        }
    }
}

impl Default for DaliSim {
    fn default() -> Self {
        Self::new()
    }
}

impl DaliDriver for DaliSim {
    fn send_frame(&mut self, cmd: DaliFrame, flags: Flags) -> DynFuture<'_, DaliSendResult> {
        let result = self.dispatch(&cmd, &flags);
        Box::pin(future::ready(result))
    }

    fn next_bus_event(&mut self) -> DynFuture<'_, DaliBusEventResult> {
        Box::pin(async move {
            loop {
                for device in &mut self.devices {
                    if let Some(frame) = device.poll_event() {
                        return Ok(DaliBusEvent {
                            timestamp: Instant::now(),
                            event_type: DaliBusEventType::Frame24(frame),
                        });
                    }
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    }
}
