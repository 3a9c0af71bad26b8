//! # Close Reasons
//!
//! [`DisconnectReason`] is the code carried by a Disconnect packet.
//! [`CloseReason`] records *why* a channel went down locally, which decides
//! what (if anything) is sent to the remote and how the scheduler reacts.

use std::fmt;

/// Reason code of a Disconnect packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DisconnectReason {
    /// Orderly shutdown.
    Normal = 0,
    /// Protocol version not supported.
    Unsupported = 1,
    /// Identity could not be authenticated.
    Authentication = 64,
    /// Internal error on the sending side.
    UnexpectedFailure = 65,
    /// Handshake aborted (unknown peer, out-of-order packet).
    Cancelled = 66,
    /// A session with this peer already exists.
    Duplicate = 67,
    /// No free session slot.
    Busy = 68,
    /// Rejected by policy (rate limit).
    NotAllowed = 69,
    /// The handshake did not complete in time.
    Timeout = 70,
}

impl DisconnectReason {
    /// Wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Normal,
            1 => Self::Unsupported,
            64 => Self::Authentication,
            65 => Self::UnexpectedFailure,
            66 => Self::Cancelled,
            67 => Self::Duplicate,
            68 => Self::Busy,
            69 => Self::NotAllowed,
            70 => Self::Timeout,
            _ => return None,
        })
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "NORMAL",
            Self::Unsupported => "UNSUPPORTED",
            Self::Authentication => "AUTHENTICATION",
            Self::UnexpectedFailure => "UNEXPECTED_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::Duplicate => "DUPLICATE",
            Self::Busy => "BUSY",
            Self::NotAllowed => "NOT_ALLOWED",
            Self::Timeout => "TIMEOUT",
        };
        f.write_str(name)
    }
}

/// Why a channel was closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Decided locally; announced to the remote.
    Local(DisconnectReason),
    /// Announced by the remote; never echoed back.
    Remote(DisconnectReason),
    /// Handshake deadline elapsed.
    Timeout,
    /// The connection dropped underneath us (EOF, reset, TLS error).
    Transport(String),
    /// Something went wrong on our side.
    Failure(String),
}

impl CloseReason {
    /// Reason to put in the farewell Disconnect packet, if any.
    pub fn outgoing(&self) -> Option<DisconnectReason> {
        match self {
            Self::Local(reason) => Some(*reason),
            Self::Timeout => Some(DisconnectReason::Timeout),
            Self::Failure(_) => Some(DisconnectReason::UnexpectedFailure),
            Self::Remote(_) | Self::Transport(_) => None,
        }
    }

    /// Disconnect reason used to classify a failed handshake.
    ///
    /// `None` means the failure happened below the protocol (transport error).
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            Self::Local(reason) | Self::Remote(reason) => Some(*reason),
            Self::Timeout => Some(DisconnectReason::Timeout),
            Self::Failure(_) => Some(DisconnectReason::UnexpectedFailure),
            Self::Transport(_) => None,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(reason) => write!(f, "closed locally ({reason})"),
            Self::Remote(reason) => write!(f, "closed by remote ({reason})"),
            Self::Timeout => write!(f, "handshake timed out"),
            Self::Transport(cause) => write!(f, "transport failure: {cause}"),
            Self::Failure(cause) => write!(f, "internal failure: {cause}"),
        }
    }
}
