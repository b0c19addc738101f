//! SOCKS5 handshake state machine.
//!
//! Drives greeting, optional RFC 1929 authentication and the CONNECT request
//! over a caller-owned stream. The engine borrows the stream for one attempt
//! and never closes it; on failure the caller decides what to do with it.

use log::{debug, trace, warn};

use crate::error::{FailureKind, Phase, Result, Socks5Error};
use crate::protocol::{self, ReplyHeader, AUTH_STATUS_LEN, METHOD_SELECTION_LEN, REPLY_HEADER_LEN};
use crate::stream::Stream;
use crate::types::{AuthMethod, BoundAddr, Credentials, DestinationHost, Established};

#[cfg(feature = "async")]
use crate::stream::AsyncStream;

/// Outcome of one handshake attempt.
pub type HandshakeResult = Result<Established>;

/// Handshake states. `Established` and `Failed` are terminal.
#[derive(Debug)]
enum State {
    Greeting,
    Authenticating,
    Connecting,
    Established(BoundAddr),
    Failed(Socks5Error),
}

impl State {
    fn from_result(result: Result<State>) -> State {
        result.unwrap_or_else(State::Failed)
    }
}

fn greeting_frame(credentials: Option<&Credentials>) -> Result<Vec<u8>> {
    let methods = protocol::offered_methods(credentials);
    debug!("SOCKS5 greeting: offering {:?}", methods);
    protocol::encode_greeting(&methods)
}

fn after_method_selection(reply: [u8; METHOD_SELECTION_LEN]) -> Result<State> {
    match protocol::decode_method_selection(reply)? {
        AuthMethod::None => {
            debug!("SOCKS5 proxy selected no authentication");
            Ok(State::Connecting)
        }
        AuthMethod::UsernamePassword => {
            debug!("SOCKS5 proxy selected username/password authentication");
            Ok(State::Authenticating)
        }
    }
}

fn auth_frame(credentials: Option<&Credentials>) -> Result<Vec<u8>> {
    let credentials = credentials.ok_or_else(|| {
        Socks5Error::handshake(
            FailureKind::AuthenticationRejected,
            Phase::Authentication,
            "Server requires authentication but no credentials provided",
        )
    })?;
    trace!(
        "SOCKS5 auth: username {} bytes, password {} bytes",
        credentials.username().len(),
        credentials.password().len()
    );
    protocol::encode_auth_request(credentials)
}

fn connect_frame(destination: &DestinationHost, port: u16) -> Result<Vec<u8>> {
    debug!("SOCKS5 connect: requesting {}:{}", destination, port);
    protocol::encode_connect_request(destination, port)
}

fn check_reply_header(header: [u8; REPLY_HEADER_LEN]) -> Result<ReplyHeader> {
    protocol::decode_reply_header(header).inspect_err(|e| {
        if let FailureKind::ConnectRejected(rep) = e.kind() {
            warn!("SOCKS5 proxy rejected connect: {}", rep);
        }
    })
}

/// Blocking handshake over a [`Stream`].
///
/// Created per connection attempt; [`run`](Self::run) consumes it.
pub struct HandshakeEngine<'a, S: Stream + ?Sized> {
    stream: &'a mut S,
    destination: DestinationHost,
    port: u16,
    credentials: Option<&'a Credentials>,
}

impl<'a, S: Stream + ?Sized> HandshakeEngine<'a, S> {
    pub fn new(
        stream: &'a mut S,
        destination: DestinationHost,
        port: u16,
        credentials: Option<&'a Credentials>,
    ) -> Self {
        Self {
            stream,
            destination,
            port,
            credentials,
        }
    }

    /// Run all phases to completion or first failure.
    pub fn run(mut self) -> HandshakeResult {
        let mut state = State::Greeting;
        loop {
            state = match state {
                State::Greeting => State::from_result(self.greet()),
                State::Authenticating => State::from_result(self.authenticate()),
                State::Connecting => State::from_result(self.connect()),
                State::Established(bound_addr) => {
                    debug!("SOCKS5 relay established, proxy bound {}", bound_addr);
                    return Ok(Established { bound_addr });
                }
                State::Failed(err) => {
                    debug!("SOCKS5 handshake failed: {}", err);
                    return Err(err);
                }
            };
        }
    }

    fn send(&mut self, frame: &[u8], phase: Phase, action: &str) -> Result<()> {
        trace!("SOCKS5 {}: sending {} bytes", phase, frame.len());
        self.stream
            .send(frame)
            .map_err(|e| e.into_handshake_error(phase, action))
    }

    fn recv(&mut self, buf: &mut [u8], phase: Phase, action: &str) -> Result<()> {
        self.stream
            .recv_exact(buf)
            .map_err(|e| e.into_handshake_error(phase, action))?;
        trace!("SOCKS5 {}: received {} bytes", phase, buf.len());
        Ok(())
    }

    fn greet(&mut self) -> Result<State> {
        let req = greeting_frame(self.credentials)?;
        self.send(&req, Phase::Greeting, "send negotiation")?;

        let mut resp = [0u8; METHOD_SELECTION_LEN];
        self.recv(&mut resp, Phase::Greeting, "read negotiation response")?;
        after_method_selection(resp)
    }

    fn authenticate(&mut self) -> Result<State> {
        let req = auth_frame(self.credentials)?;
        self.send(&req, Phase::Authentication, "send auth")?;

        let mut resp = [0u8; AUTH_STATUS_LEN];
        self.recv(&mut resp, Phase::Authentication, "read auth response")?;
        protocol::decode_auth_status(resp)?;
        Ok(State::Connecting)
    }

    fn connect(&mut self) -> Result<State> {
        let req = connect_frame(&self.destination, self.port)?;
        self.send(&req, Phase::Connect, "send request")?;

        let mut header = [0u8; REPLY_HEADER_LEN];
        self.recv(&mut header, Phase::Connect, "read response")?;
        let header = check_reply_header(header)?;

        let mut rest = vec![0u8; header.remaining_len()];
        self.recv(&mut rest, Phase::Connect, "read bound address")?;
        let bound = protocol::decode_bound_addr(&header, &rest)?;
        Ok(State::Established(bound))
    }
}

/// Validate `host` and run a blocking handshake on `stream`.
///
/// Nothing is written if `host` is empty or longer than 255 bytes.
pub fn handshake<S: Stream + ?Sized>(
    stream: &mut S,
    host: impl Into<Vec<u8>>,
    port: u16,
    credentials: Option<&Credentials>,
) -> HandshakeResult {
    let destination = DestinationHost::new(host)?;
    HandshakeEngine::new(stream, destination, port, credentials).run()
}

/// Async handshake over an [`AsyncStream`].
#[cfg(feature = "async")]
pub struct AsyncHandshakeEngine<'a, S: AsyncStream + ?Sized> {
    stream: &'a mut S,
    destination: DestinationHost,
    port: u16,
    credentials: Option<&'a Credentials>,
}

#[cfg(feature = "async")]
impl<'a, S: AsyncStream + ?Sized> AsyncHandshakeEngine<'a, S> {
    pub fn new(
        stream: &'a mut S,
        destination: DestinationHost,
        port: u16,
        credentials: Option<&'a Credentials>,
    ) -> Self {
        Self {
            stream,
            destination,
            port,
            credentials,
        }
    }

    /// Async: run all phases to completion or first failure.
    pub async fn run(mut self) -> HandshakeResult {
        let mut state = State::Greeting;
        loop {
            state = match state {
                State::Greeting => State::from_result(self.greet().await),
                State::Authenticating => State::from_result(self.authenticate().await),
                State::Connecting => State::from_result(self.connect().await),
                State::Established(bound_addr) => {
                    debug!("SOCKS5 relay established, proxy bound {}", bound_addr);
                    return Ok(Established { bound_addr });
                }
                State::Failed(err) => {
                    debug!("SOCKS5 handshake failed: {}", err);
                    return Err(err);
                }
            };
        }
    }

    async fn send(&mut self, frame: &[u8], phase: Phase, action: &str) -> Result<()> {
        trace!("SOCKS5 {}: sending {} bytes", phase, frame.len());
        self.stream
            .send(frame)
            .await
            .map_err(|e| e.into_handshake_error(phase, action))
    }

    async fn recv(&mut self, buf: &mut [u8], phase: Phase, action: &str) -> Result<()> {
        self.stream
            .recv_exact(buf)
            .await
            .map_err(|e| e.into_handshake_error(phase, action))?;
        trace!("SOCKS5 {}: received {} bytes", phase, buf.len());
        Ok(())
    }

    async fn greet(&mut self) -> Result<State> {
        let req = greeting_frame(self.credentials)?;
        self.send(&req, Phase::Greeting, "send negotiation").await?;

        let mut resp = [0u8; METHOD_SELECTION_LEN];
        self.recv(&mut resp, Phase::Greeting, "read negotiation response")
            .await?;
        after_method_selection(resp)
    }

    async fn authenticate(&mut self) -> Result<State> {
        let req = auth_frame(self.credentials)?;
        self.send(&req, Phase::Authentication, "send auth").await?;

        let mut resp = [0u8; AUTH_STATUS_LEN];
        self.recv(&mut resp, Phase::Authentication, "read auth response")
            .await?;
        protocol::decode_auth_status(resp)?;
        Ok(State::Connecting)
    }

    async fn connect(&mut self) -> Result<State> {
        let req = connect_frame(&self.destination, self.port)?;
        self.send(&req, Phase::Connect, "send request").await?;

        let mut header = [0u8; REPLY_HEADER_LEN];
        self.recv(&mut header, Phase::Connect, "read response").await?;
        let header = check_reply_header(header)?;

        let mut rest = vec![0u8; header.remaining_len()];
        self.recv(&mut rest, Phase::Connect, "read bound address")
            .await?;
        let bound = protocol::decode_bound_addr(&header, &rest)?;
        Ok(State::Established(bound))
    }
}

/// Async: validate `host` and run a handshake on `stream`.
#[cfg(feature = "async")]
pub async fn async_handshake<S: AsyncStream + ?Sized>(
    stream: &mut S,
    host: impl Into<Vec<u8>>,
    port: u16,
    credentials: Option<&Credentials>,
) -> HandshakeResult {
    let destination = DestinationHost::new(host)?;
    AsyncHandshakeEngine::new(stream, destination, port, credentials)
        .run()
        .await
}
