/// Errors that can occur in the TCP/TLS transport and frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    BindFailed {
        /// The address we tried to bind to.
        addr: String,
        /// Error description.
        reason: String,
    },
    /// Connection attempt timed out.
    ConnectionTimeout {
        /// Remote address.
        remote: String,
    },
    /// Connection attempt failed.
    ConnectFailed {
        /// Remote address.
        remote: String,
        /// Error description.
        reason: String,
    },
    /// TLS handshake or configuration failed.
    TlsError {
        /// Error description.
        reason: String,
    },
    /// Certificate generation failed.
    CertificateError {
        /// Error description.
        reason: String,
    },
    /// Remote violated the framing or packet table.
    ProtocolViolation {
        /// Error description.
        reason: String,
    },
    /// Packet does not fit into one frame.
    FrameTooLarge {
        /// Encoded size.
        size: usize,
    },
    /// Read or write failed.
    Io {
        /// Error description.
        reason: String,
    },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BindFailed { addr, reason } => {
                write!(f, "failed to bind to {}: {}", addr, reason)
            }
            Self::ConnectionTimeout { remote } => {
                write!(f, "connection to {} timed out", remote)
            }
            Self::ConnectFailed { remote, reason } => {
                write!(f, "connection to {} failed: {}", remote, reason)
            }
            Self::TlsError { reason } => write!(f, "TLS error: {}", reason),
            Self::CertificateError { reason } => write!(f, "certificate error: {}", reason),
            Self::ProtocolViolation { reason } => write!(f, "protocol violation: {}", reason),
            Self::FrameTooLarge { size } => {
                write!(f, "frame of {} bytes exceeds the 65535 byte limit", size)
            }
            Self::Io { reason } => write!(f, "I/O error: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl TransportError {
    pub(crate) fn violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason: reason.into(),
        }
    }
}
