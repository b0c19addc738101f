//! SOCKS5 wire codec.
//!
//! Pure frame encoding and decoding for the three handshake phases. Nothing
//! in here touches a stream; the handshake engines feed it the exact bytes
//! they read and send whatever it produces.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{FailureKind, Phase, Result, Socks5Error};
use crate::types::{
    AddressType, AuthMethod, BoundAddr, Command, Credentials, DestinationHost, ReplyCode,
};

pub const SOCKS5_VERSION: u8 = 0x05;
pub const SOCKS5_AUTH_NO_ACCEPTABLE: u8 = 0xFF;
pub const SOCKS5_RESERVED: u8 = 0x00;

/// RFC 1929 subnegotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;
pub const SOCKS5_AUTH_SUCCESS: u8 = 0x00;

pub const METHOD_SELECTION_LEN: usize = 2;
pub const AUTH_STATUS_LEN: usize = 2;
/// VER, REP, RSV, ATYP and the first byte of BND.ADDR
pub const REPLY_HEADER_LEN: usize = 5;

/// Methods offered in the greeting. `None` always comes first so the proxy
/// may skip authentication even when credentials are available.
pub fn offered_methods(credentials: Option<&Credentials>) -> Vec<AuthMethod> {
    match credentials {
        Some(_) => vec![AuthMethod::None, AuthMethod::UsernamePassword],
        None => vec![AuthMethod::None],
    }
}

/// Append a single length byte followed by `field`.
fn push_len_prefixed(buf: &mut Vec<u8>, field: &[u8], what: &str) -> Result<()> {
    let len = u8::try_from(field.len()).map_err(|_| {
        Socks5Error::InvalidInput(format!(
            "{} is {} bytes, at most {} allowed",
            what,
            field.len(),
            u8::MAX
        ))
    })?;
    buf.push(len);
    buf.extend_from_slice(field);
    Ok(())
}

/// Encode the greeting: `VER NMETHODS METHODS...`.
pub fn encode_greeting(methods: &[AuthMethod]) -> Result<Vec<u8>> {
    if methods.is_empty() {
        return Err(Socks5Error::InvalidInput(
            "at least one authentication method must be offered".to_string(),
        ));
    }
    let codes: Vec<u8> = methods.iter().map(|m| m.as_u8()).collect();
    let mut req = Vec::with_capacity(2 + codes.len());
    req.push(SOCKS5_VERSION);
    push_len_prefixed(&mut req, &codes, "method list")?;
    Ok(req)
}

/// Decode the proxy's method selection.
pub fn decode_method_selection(reply: [u8; METHOD_SELECTION_LEN]) -> Result<AuthMethod> {
    if reply[0] != SOCKS5_VERSION {
        return Err(Socks5Error::handshake(
            FailureKind::GreetingRejected,
            Phase::Greeting,
            format!("Invalid SOCKS version: {}", reply[0]),
        ));
    }

    match reply[1] {
        SOCKS5_AUTH_NO_ACCEPTABLE => Err(Socks5Error::handshake(
            FailureKind::GreetingRejected,
            Phase::Greeting,
            "No acceptable authentication method",
        )),
        method => AuthMethod::from_u8(method).ok_or_else(|| {
            Socks5Error::handshake(
                FailureKind::GreetingRejected,
                Phase::Greeting,
                format!("Unsupported authentication method: {}", method),
            )
        }),
    }
}

/// Encode the RFC 1929 request: `VER ULEN UNAME PLEN PASSWD`.
pub fn encode_auth_request(credentials: &Credentials) -> Result<Vec<u8>> {
    let mut req =
        Vec::with_capacity(3 + credentials.username().len() + credentials.password().len());
    req.push(SOCKS5_AUTH_VERSION);
    push_len_prefixed(&mut req, credentials.username(), "username")?;
    push_len_prefixed(&mut req, credentials.password(), "password")?;
    Ok(req)
}

/// Decode the RFC 1929 reply: `VER STATUS`.
pub fn decode_auth_status(reply: [u8; AUTH_STATUS_LEN]) -> Result<()> {
    if reply[0] != SOCKS5_AUTH_VERSION {
        return Err(Socks5Error::handshake(
            FailureKind::AuthenticationRejected,
            Phase::Authentication,
            format!("Invalid authentication version: {}", reply[0]),
        ));
    }
    if reply[1] != SOCKS5_AUTH_SUCCESS {
        return Err(Socks5Error::handshake(
            FailureKind::AuthenticationRejected,
            Phase::Authentication,
            format!("Proxy rejected credentials (status {})", reply[1]),
        ));
    }
    Ok(())
}

/// Encode a CONNECT request addressed by domain name.
pub fn encode_connect_request(host: &DestinationHost, port: u16) -> Result<Vec<u8>> {
    let mut req = Vec::with_capacity(7 + host.len());
    req.extend_from_slice(&[
        SOCKS5_VERSION,
        Command::Connect.as_u8(),
        SOCKS5_RESERVED,
        AddressType::Domain.as_u8(),
    ]);
    push_len_prefixed(&mut req, host.as_bytes(), "destination host")?;
    req.extend_from_slice(&port.to_be_bytes());
    Ok(req)
}

/// Fixed part of a successful reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub address_type: AddressType,
    /// First address octet for IPv4, name length for Domain
    pub first: u8,
}

impl ReplyHeader {
    /// Bytes still to be read after the 5-byte header, port included.
    pub fn remaining_len(&self) -> usize {
        match self.address_type {
            AddressType::IPv4 => 3 + 2,
            AddressType::Domain => self.first as usize + 2,
            // Rejected by decode_reply_header.
            AddressType::IPv6 => 0,
        }
    }
}

/// Decode the 5-byte reply header.
///
/// Fails on a wrong version, a non-success reply, or a bound address type
/// other than IPv4 or Domain.
pub fn decode_reply_header(header: [u8; REPLY_HEADER_LEN]) -> Result<ReplyHeader> {
    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::handshake(
            FailureKind::ProtocolViolation,
            Phase::Connect,
            format!("Invalid SOCKS version in response: {}", header[0]),
        ));
    }

    let rep = ReplyCode::from_u8(header[1]);
    if rep != ReplyCode::Succeeded {
        return Err(Socks5Error::handshake(
            FailureKind::ConnectRejected(rep),
            Phase::Connect,
            format!("SOCKS5 request failed: {}", rep),
        ));
    }

    let address_type = match AddressType::from_u8(header[3]) {
        Some(atyp @ (AddressType::IPv4 | AddressType::Domain)) => atyp,
        _ => {
            return Err(Socks5Error::handshake(
                FailureKind::UnsupportedBoundAddress,
                Phase::Connect,
                format!("Unsupported bound address type: {}", header[3]),
            ));
        }
    };

    Ok(ReplyHeader {
        address_type,
        first: header[4],
    })
}

/// Decode the bound address from the bytes following the header.
pub fn decode_bound_addr(header: &ReplyHeader, rest: &[u8]) -> Result<BoundAddr> {
    if header.address_type == AddressType::IPv6 {
        return Err(Socks5Error::handshake(
            FailureKind::UnsupportedBoundAddress,
            Phase::Connect,
            "IPv6 bound addresses are not supported",
        ));
    }

    let expected = header.remaining_len();
    if rest.len() != expected {
        return Err(Socks5Error::handshake(
            FailureKind::ProtocolViolation,
            Phase::Connect,
            format!(
                "Bound address is {} bytes, expected {}",
                rest.len(),
                expected
            ),
        ));
    }

    let (addr, port) = rest.split_at(expected - 2);
    let port = u16::from_be_bytes([port[0], port[1]]);

    match header.address_type {
        AddressType::IPv4 => {
            let ip = Ipv4Addr::new(header.first, addr[0], addr[1], addr[2]);
            Ok(BoundAddr::Ipv4(SocketAddrV4::new(ip, port)))
        }
        _ => Ok(BoundAddr::Domain(
            String::from_utf8_lossy(addr).into_owned(),
            port,
        )),
    }
}
