use std::fmt;

use thiserror::Error;

use crate::types::ReplyCode;

/// Handshake phase in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Method negotiation
    Greeting,
    /// Username/password subnegotiation
    Authentication,
    /// CONNECT request and reply
    Connect,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Greeting => "greeting",
            Phase::Authentication => "authentication",
            Phase::Connect => "connect",
        };
        f.write_str(name)
    }
}

/// Classifies handshake errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Could not establish the underlying connection to the proxy
    TransportUnavailable,
    /// The proxy closed the stream before a frame was fully received
    TransportClosed,
    /// I/O error other than a close (reset, timeout, ...)
    TransportError,
    /// Bad version in the greeting reply, or no acceptable method
    GreetingRejected,
    /// Credentials required but absent, or the proxy refused them
    AuthenticationRejected,
    /// The proxy answered the CONNECT with a non-success reply
    ConnectRejected(ReplyCode),
    /// The reply carried a bound address type this client cannot parse
    UnsupportedBoundAddress,
    /// Any other structural mismatch in a received frame
    ProtocolViolation,
    /// Local input failed validation before anything was sent
    InvalidInput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::TransportUnavailable => f.write_str("transport unavailable"),
            FailureKind::TransportClosed => f.write_str("transport closed"),
            FailureKind::TransportError => f.write_str("transport error"),
            FailureKind::GreetingRejected => f.write_str("greeting rejected"),
            FailureKind::AuthenticationRejected => f.write_str("authentication rejected"),
            FailureKind::ConnectRejected(rep) => write!(f, "connect rejected ({})", rep),
            FailureKind::UnsupportedBoundAddress => f.write_str("unsupported bound address"),
            FailureKind::ProtocolViolation => f.write_str("protocol violation"),
            FailureKind::InvalidInput => f.write_str("invalid input"),
        }
    }
}

/// SOCKS5 client error types
#[derive(Error, Debug)]
pub enum Socks5Error {
    #[error("SOCKS5 {phase} failed: {message}")]
    Handshake {
        kind: FailureKind,
        phase: Phase,
        message: String,
    },

    #[error("Failed to connect to proxy {addr}: {source}")]
    TransportUnavailable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SOCKS5 handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl Socks5Error {
    pub(crate) fn handshake(kind: FailureKind, phase: Phase, message: impl Into<String>) -> Self {
        Socks5Error::Handshake {
            kind,
            phase,
            message: message.into(),
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Socks5Error::Handshake { kind, .. } => *kind,
            Socks5Error::TransportUnavailable { .. } => FailureKind::TransportUnavailable,
            Socks5Error::HandshakeTimeout(_) => FailureKind::TransportError,
            Socks5Error::InvalidInput(_) | Socks5Error::ConfigError(_) => FailureKind::InvalidInput,
        }
    }

    /// Phase the handshake was in, if the error came from the handshake.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Socks5Error::Handshake { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Proxy reply code, if the CONNECT was rejected.
    pub fn reply_code(&self) -> Option<ReplyCode> {
        match self.kind() {
            FailureKind::ConnectRejected(rep) => Some(rep),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Socks5Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_error_kind_is_matchable() {
        let err = Socks5Error::handshake(
            FailureKind::GreetingRejected,
            Phase::Greeting,
            "no acceptable method",
        );
        assert_eq!(err.kind(), FailureKind::GreetingRejected);
        assert_eq!(err.phase(), Some(Phase::Greeting));
        assert!(err.reply_code().is_none());
    }

    #[test]
    fn test_connect_rejected_preserves_reply_code() {
        let rep = ReplyCode::ConnectionRefused;
        let err =
            Socks5Error::handshake(FailureKind::ConnectRejected(rep), Phase::Connect, "refused");
        match err.kind() {
            FailureKind::ConnectRejected(code) => assert_eq!(code, ReplyCode::ConnectionRefused),
            other => panic!("expected ConnectRejected, got {:?}", other),
        }
        assert_eq!(err.reply_code(), Some(ReplyCode::ConnectionRefused));
    }

    #[test]
    fn test_transport_unavailable_kind() {
        let err = Socks5Error::TransportUnavailable {
            addr: "127.0.0.1:1080".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(err.kind(), FailureKind::TransportUnavailable);
        assert!(err.phase().is_none());
        assert!(err.to_string().contains("127.0.0.1:1080"));
    }

    #[test]
    fn test_handshake_timeout_is_transport_error() {
        let err = Socks5Error::HandshakeTimeout(std::time::Duration::from_secs(10));
        assert_eq!(err.kind(), FailureKind::TransportError);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_handshake_error_display_includes_phase_and_message() {
        let err = Socks5Error::handshake(
            FailureKind::AuthenticationRejected,
            Phase::Authentication,
            "proxy returned status 1",
        );
        let display = format!("{}", err);
        assert!(display.contains("authentication"), "got: {}", display);
        assert!(display.contains("status 1"), "got: {}", display);
    }

    #[test]
    fn test_failure_kind_display_names_reply() {
        let kind = FailureKind::ConnectRejected(ReplyCode::HostUnreachable);
        assert_eq!(kind.to_string(), "connect rejected (host unreachable)");
    }
}
