use std::fmt;
use std::net::SocketAddrV4;

use crate::error::{Result, Socks5Error};

/// Largest value a single-byte length field can carry.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Authentication method offered by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    None,
    UsernamePassword,
}

impl AuthMethod {
    pub fn as_u8(self) -> u8 {
        match self {
            AuthMethod::None => 0x00,
            AuthMethod::UsernamePassword => 0x02,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(AuthMethod::None),
            0x02 => Some(AuthMethod::UsernamePassword),
            _ => None,
        }
    }
}

/// Address type field of requests and replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    IPv4,
    Domain,
    IPv6,
}

impl AddressType {
    pub fn as_u8(self) -> u8 {
        match self {
            AddressType::IPv4 => 0x01,
            AddressType::Domain => 0x03,
            AddressType::IPv6 => 0x04,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(AddressType::IPv4),
            0x03 => Some(AddressType::Domain),
            0x04 => Some(AddressType::IPv6),
            _ => None,
        }
    }
}

/// SOCKS5 request command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Bind,
    UdpAssociate,
}

impl Command {
    pub fn as_u8(self) -> u8 {
        match self {
            Command::Connect => 0x01,
            Command::Bind => 0x02,
            Command::UdpAssociate => 0x03,
        }
    }
}

/// Reply code of a SOCKS5 request (RFC 1928 section 6).
///
/// Values outside the nine assigned codes are kept as `Unassigned` so the
/// caller still sees what the proxy actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyCode {
    Succeeded,
    GeneralFailure,
    NotAllowed,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
    Unassigned(u8),
}

impl ReplyCode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => ReplyCode::Succeeded,
            0x01 => ReplyCode::GeneralFailure,
            0x02 => ReplyCode::NotAllowed,
            0x03 => ReplyCode::NetworkUnreachable,
            0x04 => ReplyCode::HostUnreachable,
            0x05 => ReplyCode::ConnectionRefused,
            0x06 => ReplyCode::TtlExpired,
            0x07 => ReplyCode::CommandNotSupported,
            0x08 => ReplyCode::AddressTypeNotSupported,
            other => ReplyCode::Unassigned(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ReplyCode::Succeeded => 0x00,
            ReplyCode::GeneralFailure => 0x01,
            ReplyCode::NotAllowed => 0x02,
            ReplyCode::NetworkUnreachable => 0x03,
            ReplyCode::HostUnreachable => 0x04,
            ReplyCode::ConnectionRefused => 0x05,
            ReplyCode::TtlExpired => 0x06,
            ReplyCode::CommandNotSupported => 0x07,
            ReplyCode::AddressTypeNotSupported => 0x08,
            ReplyCode::Unassigned(value) => value,
        }
    }

    /// Human-readable description of the reply code.
    pub fn description(self) -> &'static str {
        match self {
            ReplyCode::Succeeded => "succeeded",
            ReplyCode::GeneralFailure => "general SOCKS server failure",
            ReplyCode::NotAllowed => "connection not allowed by ruleset",
            ReplyCode::NetworkUnreachable => "network unreachable",
            ReplyCode::HostUnreachable => "host unreachable",
            ReplyCode::ConnectionRefused => "connection refused",
            ReplyCode::TtlExpired => "TTL expired",
            ReplyCode::CommandNotSupported => "command not supported",
            ReplyCode::AddressTypeNotSupported => "address type not supported",
            ReplyCode::Unassigned(_) => "unassigned",
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyCode::Unassigned(value) => write!(f, "unassigned reply 0x{:02x}", value),
            rep => f.write_str(rep.description()),
        }
    }
}

/// Username/password pair for RFC 1929 authentication.
///
/// Each field must fit a single length byte. The password never appears in
/// `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: Vec<u8>,
    password: Vec<u8>,
}

impl Credentials {
    /// Create credentials, rejecting fields longer than 255 bytes.
    pub fn new(username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.len() > MAX_FIELD_LEN {
            return Err(Socks5Error::InvalidInput(format!(
                "username is {} bytes, at most {} allowed",
                username.len(),
                MAX_FIELD_LEN
            )));
        }
        if password.len() > MAX_FIELD_LEN {
            return Err(Socks5Error::InvalidInput(format!(
                "password is {} bytes, at most {} allowed",
                password.len(),
                MAX_FIELD_LEN
            )));
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &[u8] {
        &self.username
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Destination host name sent in the CONNECT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationHost(Vec<u8>);

impl DestinationHost {
    /// Validate a host name: non-empty, at most 255 bytes.
    pub fn new(host: impl Into<Vec<u8>>) -> Result<Self> {
        let host = host.into();
        if host.is_empty() {
            return Err(Socks5Error::InvalidInput(
                "destination host is empty".to_string(),
            ));
        }
        if host.len() > MAX_FIELD_LEN {
            return Err(Socks5Error::InvalidInput(format!(
                "destination host is {} bytes, at most {} allowed",
                host.len(),
                MAX_FIELD_LEN
            )));
        }
        Ok(Self(host))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DestinationHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Address the proxy reports having bound on its side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAddr {
    Ipv4(SocketAddrV4),
    Domain(String, u16),
}

impl BoundAddr {
    pub fn port(&self) -> u16 {
        match self {
            BoundAddr::Ipv4(addr) => addr.port(),
            BoundAddr::Domain(_, port) => *port,
        }
    }
}

impl fmt::Display for BoundAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundAddr::Ipv4(addr) => write!(f, "{}", addr),
            BoundAddr::Domain(host, port) => write!(f, "{}:{}", host, port),
        }
    }
}

/// Successful handshake outcome; the stream now relays to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Established {
    pub bound_addr: BoundAddr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_reply_code_mapping() {
        assert_eq!(ReplyCode::from_u8(0x00), ReplyCode::Succeeded);
        assert_eq!(ReplyCode::from_u8(0x05), ReplyCode::ConnectionRefused);
        assert_eq!(ReplyCode::from_u8(0x08), ReplyCode::AddressTypeNotSupported);
        assert_eq!(ReplyCode::from_u8(0x2a), ReplyCode::Unassigned(0x2a));
        for value in 0..=u8::MAX {
            assert_eq!(ReplyCode::from_u8(value).as_u8(), value);
        }
    }

    #[test]
    fn test_reply_code_display() {
        assert_eq!(ReplyCode::TtlExpired.to_string(), "TTL expired");
        assert_eq!(ReplyCode::Unassigned(0x2a).to_string(), "unassigned reply 0x2a");
    }

    #[test]
    fn test_auth_method_codes() {
        assert_eq!(AuthMethod::None.as_u8(), 0x00);
        assert_eq!(AuthMethod::UsernamePassword.as_u8(), 0x02);
        assert_eq!(AuthMethod::from_u8(0x02), Some(AuthMethod::UsernamePassword));
        assert_eq!(AuthMethod::from_u8(0x01), None);
        assert_eq!(AuthMethod::from_u8(0xff), None);
    }

    #[test]
    fn test_address_type_codes() {
        assert_eq!(AddressType::from_u8(0x01), Some(AddressType::IPv4));
        assert_eq!(AddressType::from_u8(0x03), Some(AddressType::Domain));
        assert_eq!(AddressType::from_u8(0x04), Some(AddressType::IPv6));
        assert_eq!(AddressType::from_u8(0x02), None);
        assert_eq!(Command::Connect.as_u8(), 0x01);
    }

    #[test]
    fn test_credentials_length_limits() {
        assert!(Credentials::new("user", "pass").is_ok());
        assert!(Credentials::new(vec![b'u'; 255], vec![b'p'; 255]).is_ok());

        let err = Credentials::new(vec![b'u'; 256], "pass").unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
        let err = Credentials::new("user", vec![b'p'; 256]).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_destination_host_validation() {
        assert_eq!(DestinationHost::new("example.com").unwrap().len(), 11);
        assert!(DestinationHost::new(vec![b'a'; 255]).is_ok());
        assert_eq!(
            DestinationHost::new("").unwrap_err().kind(),
            FailureKind::InvalidInput
        );
        assert_eq!(
            DestinationHost::new(vec![b'a'; 256]).unwrap_err().kind(),
            FailureKind::InvalidInput
        );
    }

    #[test]
    fn test_bound_addr_display() {
        let v4 = BoundAddr::Ipv4("10.0.0.1:8080".parse().unwrap());
        assert_eq!(v4.to_string(), "10.0.0.1:8080");
        assert_eq!(v4.port(), 8080);
        let domain = BoundAddr::Domain("proxy.local".into(), 443);
        assert_eq!(domain.to_string(), "proxy.local:443");
    }
}
