use crate::drivers::send_flags::Flags;
use crate::utils::dyn_future::DynFuture;
use std::time::Instant;

/// A frame as it appears on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum DaliFrame {
    /// Backward (reply) frame
    Frame8(u8),
    /// Forward frame to control gear
    Frame16([u8; 2]),
    /// Forward frame to input devices
    Frame24([u8; 3]),
}

impl DaliFrame {
    pub fn bit_length(&self) -> u8 {
        match self {
            DaliFrame::Frame8(_) => 8,
            DaliFrame::Frame16(_) => 16,
            DaliFrame::Frame24(_) => 24,
        }
    }
}

/// Outcome of one bus transaction. A missing reply is an ordinary
/// outcome, not a failure; only `DriverError` means the transaction
/// could not be carried out at all.
#[derive(Debug)]
pub enum DaliSendResult {
    /// Frame sent, no answer requested
    Ok,
    /// The requested 8-bit backward frame
    Answer(u8),
    /// No backward frame arrived within the timeout budget
    Timeout,
    /// A backward frame arrived but was garbled, typically because
    /// more than one device answered at once
    Framing,
    DriverError(Box<dyn std::error::Error + Send + Sync>),
}

/// Decoded yes/no style reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
    /// Garbled reply, more than one device answered yes
    Multiple,
}

impl DaliSendResult {
    pub fn check_send(self) -> Result<(), DaliSendResult> {
        match self {
            DaliSendResult::Ok => Ok(()),
            e => Err(e),
        }
    }

    pub fn check_answer(self) -> Result<u8, DaliSendResult> {
        match self {
            DaliSendResult::Answer(r) => Ok(r),
            e => Err(e),
        }
    }

    /// Interpret the outcome of a query where silence means no and any
    /// reply, even a collision of several, means at least one yes.
    pub fn check_yes_no(self) -> Result<YesNo, DaliSendResult> {
        match self {
            DaliSendResult::Answer(_) => Ok(YesNo::Yes),
            DaliSendResult::Framing => Ok(YesNo::Multiple),
            DaliSendResult::Timeout => Ok(YesNo::No),
            e => Err(e),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DaliSendResult::Timeout)
    }

    pub fn is_framing_error(&self) -> bool {
        matches!(self, DaliSendResult::Framing)
    }
}

impl std::fmt::Display for DaliSendResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DaliSendResult::Ok => write!(f, "OK"),
            DaliSendResult::Answer(a) => write!(f, "Answer: {:02x}", a),
            DaliSendResult::Timeout => write!(f, "No reply"),
            DaliSendResult::Framing => write!(f, "Framing error"),
            DaliSendResult::DriverError(e) => write!(f, "Driver error: {}", e),
        }
    }
}

impl std::error::Error for DaliSendResult {}

/// Traffic observed on the bus outside a transaction, most importantly
/// unsolicited event frames from input devices.
#[derive(Debug, Clone)]
pub enum DaliBusEventType {
    Frame8(u8),
    Frame16([u8; 2]),
    Frame24([u8; 3]),
    FramingError,
    /// An event was dropped because the previous one was not consumed
    Overrun,
}

#[derive(Debug, Clone)]
pub struct DaliBusEvent {
    pub timestamp: Instant,
    pub event_type: DaliBusEventType,
}

pub type DaliBusEventResult = Result<DaliBusEvent, Box<dyn std::error::Error + Send + Sync>>;

/// A bus master. One transaction at a time; the exclusive reference
/// keeps transactions, including send-twice pairs, from interleaving.
pub trait DaliDriver: Send {
    /// Send a frame and, depending on `flags`, wait for an answer.
    fn send_frame(&mut self, cmd: DaliFrame, flags: Flags) -> DynFuture<'_, DaliSendResult>;

    /// Wait for the next unsolicited frame on the bus.
    fn next_bus_event(&mut self) -> DynFuture<'_, DaliBusEventResult>;
}
