//! `DaliDriver` backed by the Manchester transceiver. The blocking,
//! timing-critical PHY work runs on a dedicated thread; transactions
//! are handed over through a channel and answered one oneshot each.

use crate::drivers::driver::{
    DaliBusEvent, DaliBusEventResult, DaliBusEventType, DaliDriver, DaliFrame, DaliSendResult,
};
use crate::drivers::send_flags::Flags;
use crate::phy::hal::BusLine;
use crate::phy::transceiver::{Reply, Transceiver, REPLY_BITS};
use crate::utils::dyn_future::DynFuture;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tokio::sync::oneshot;

enum Request {
    Transaction {
        frame: DaliFrame,
        flags: Flags,
        reply: oneshot::Sender<DaliSendResult>,
    },
    Attach,
    Detach,
    Shutdown,
}

pub struct ManchesterDriver {
    requests: mpsc::Sender<Request>,
    events: tokio::sync::mpsc::UnboundedReceiver<DaliBusEvent>,
    join: Option<thread::JoinHandle<()>>,
}

impl ManchesterDriver {
    pub fn new<L: BusLine + 'static>(transceiver: Transceiver<L>) -> ManchesterDriver {
        let (req_tx, req_rx) = mpsc::channel();
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let join = thread::spawn(move || phy_thread(transceiver, req_rx, event_tx));
        ManchesterDriver {
            requests: req_tx,
            events: event_rx,
            join: Some(join),
        }
    }

    /// Start listening for unsolicited event frames. They arrive
    /// through [`DaliDriver::next_bus_event`].
    pub fn attach_events(&self) {
        let _ = self.requests.send(Request::Attach);
    }

    /// Stop listening for event frames.
    pub fn detach_events(&self) {
        let _ = self.requests.send(Request::Detach);
    }
}

impl Drop for ManchesterDriver {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn frame_word(frame: &DaliFrame) -> (u32, u8) {
    match frame {
        DaliFrame::Frame8(b) => (u32::from(*b), 8),
        DaliFrame::Frame16(f) => ((u32::from(f[0]) << 8) | u32::from(f[1]), 16),
        DaliFrame::Frame24(f) => {
            (
                (u32::from(f[0]) << 16) | (u32::from(f[1]) << 8) | u32::from(f[2]),
                24,
            )
        }
    }
}

fn run_transaction<L: BusLine>(
    t: &mut Transceiver<L>,
    frame: DaliFrame,
    flags: Flags,
) -> DaliSendResult {
    let (word, bits) = frame_word(&frame);
    // A query must not race the asynchronous event path
    let was_attached = t.is_attached();
    if was_attached {
        t.detach();
    }
    t.send(word, bits);
    if flags.send_twice() {
        // The identical second frame follows immediately; holding the
        // transceiver keeps other traffic out of the pair.
        t.send(word, bits);
    }
    let result = if flags.expect_answer() {
        match t.recv_reply(REPLY_BITS) {
            Reply::Value(v) => DaliSendResult::Answer(v as u8),
            Reply::Garbled => DaliSendResult::Framing,
            Reply::Silence => DaliSendResult::Timeout,
        }
    } else {
        DaliSendResult::Ok
    };
    if was_attached {
        t.reattach();
    }
    result
}

fn phy_thread<L: BusLine>(
    mut transceiver: Transceiver<L>,
    requests: mpsc::Receiver<Request>,
    events: tokio::sync::mpsc::UnboundedSender<DaliBusEvent>,
) {
    while let Ok(request) = requests.recv() {
        match request {
            Request::Transaction {
                frame,
                flags,
                reply,
            } => {
                let result = run_transaction(&mut transceiver, frame, flags);
                let _ = reply.send(result);
            }
            Request::Attach => {
                let tx = events.clone();
                transceiver.attach(Box::new(move |value| {
                    let _ = tx.send(DaliBusEvent {
                        timestamp: Instant::now(),
                        event_type: DaliBusEventType::Frame24([
                            (value >> 16) as u8,
                            (value >> 8) as u8,
                            value as u8,
                        ]),
                    });
                }));
            }
            Request::Detach => transceiver.detach(),
            Request::Shutdown => break,
        }
    }
}

impl DaliDriver for ManchesterDriver {
    fn send_frame(&mut self, cmd: DaliFrame, flags: Flags) -> DynFuture<'_, DaliSendResult> {
        let (tx, rx) = oneshot::channel();
        let queued = self.requests.send(Request::Transaction {
            frame: cmd,
            flags,
            reply: tx,
        });
        Box::pin(async move {
            if queued.is_err() {
                return DaliSendResult::DriverError("PHY thread is gone".into());
            }
            match rx.await {
                Ok(result) => result,
                Err(_) => DaliSendResult::DriverError("PHY thread dropped the request".into()),
            }
        })
    }

    fn next_bus_event(&mut self) -> DynFuture<'_, DaliBusEventResult> {
        Box::pin(async move {
            self.events
                .recv()
                .await
                .ok_or_else(|| "PHY thread is gone".into())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drivers::driver_utils::DaliDriverExt;
    use crate::drivers::send_flags::{EXPECT_ANSWER, SEND_TWICE};
    use crate::phy::hal::NullRxControl;
    use crate::phy::loopback::{decode, LoopbackLine};
    use crate::phy::transceiver::{PhyConfig, Transceiver};

    #[tokio::test]
    async fn transactions_cross_the_thread_boundary() {
        let config = PhyConfig::default();
        let (line, log) = LoopbackLine::new(config.idle_level);
        let transceiver = Transceiver::new(line, Box::new(NullRxControl), &config);
        let timing = *transceiver.timing();
        let mut driver = ManchesterDriver::new(transceiver);

        log.clear();
        let result = driver.send_frame16(&[0xa5, 0x00], SEND_TWICE).await;
        assert!(matches!(result, DaliSendResult::Ok));
        // Both frames of the pair reached the wire, bit for bit
        let frames = decode(&log.transitions(), config.idle_level, timing, 16);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[0].value, 0xa500);

        // A query into silence times out instead of hanging
        let result = driver.send_frame16(&[0xa9, 0x00], EXPECT_ANSWER).await;
        assert!(matches!(result, DaliSendResult::Timeout));
    }
}
