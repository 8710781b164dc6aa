//! Client side of the control-plane datagram protocol spoken by the proxy.

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::path::PathBuf;

use anyhow::Context;
use tokio::net::UdpSocket;
use tokio::net::UnixDatagram;
use tracing::debug;

use crate::error::ActionError;

pub const CONTROL_MAGIC: u32 = 0x6304_6101;
pub const DEFAULT_CONTROL_PORT: u16 = 5478;
const HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ControlCommand {
    FadeChildren = 8,
    FlushHttpCache = 15,
}

/// Where control datagrams are sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlAddress {
    Inet(SocketAddr),
    Local(PathBuf),
}

impl ControlAddress {
    /// Parses `host[:port]`, `[v6addr]:port` or an absolute socket path.
    /// Host names are resolved once, here.
    pub fn resolve(address: &str) -> anyhow::Result<Self> {
        if address.starts_with('/') {
            return Ok(Self::Local(PathBuf::from(address)));
        }
        if let Ok(addr) = address.parse::<SocketAddr>() {
            return Ok(Self::Inet(addr));
        }
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(Self::Inet(SocketAddr::new(ip, DEFAULT_CONTROL_PORT)));
        }

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .with_context(|| format!("invalid port in control address {address:?}"))?;
                (host, port)
            }
            None => (address, DEFAULT_CONTROL_PORT),
        };
        (host, port)
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve control address {address:?}"))?
            .next()
            .map(Self::Inet)
            .with_context(|| format!("control address {address:?} resolved to nothing"))
    }
}

impl fmt::Display for ControlAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet(addr) => write!(f, "{addr}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Encodes one control datagram: a big-endian header of magic, payload
/// length and command, then the payload padded to a multiple of four bytes.
pub fn encode_control_datagram(
    command: ControlCommand,
    payload: &[u8],
) -> Result<Vec<u8>, ActionError> {
    let length = u16::try_from(payload.len())
        .map_err(|_| ActionError::validation("Control payload too long"))?;

    let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len().next_multiple_of(4));
    datagram.extend_from_slice(&CONTROL_MAGIC.to_be_bytes());
    datagram.extend_from_slice(&length.to_be_bytes());
    datagram.extend_from_slice(&(command as u16).to_be_bytes());
    datagram.extend_from_slice(payload);
    datagram.resize(HEADER_LEN + payload.len().next_multiple_of(4), 0);
    Ok(datagram)
}

pub async fn send_control(
    address: &ControlAddress,
    command: ControlCommand,
    payload: &[u8],
) -> Result<(), ActionError> {
    let datagram = encode_control_datagram(command, payload)?;
    debug!("sending {command:?} to {address}");
    let sent = match address {
        ControlAddress::Inet(addr) => {
            let local: IpAddr = match addr {
                SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
                SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
            };
            let socket = UdpSocket::bind(SocketAddr::new(local, 0))
                .await
                .map_err(ActionError::Control)?;
            socket.send_to(&datagram, addr).await
        }
        ControlAddress::Local(path) => {
            let socket = UnixDatagram::unbound().map_err(ActionError::Control)?;
            socket.send_to(&datagram, path).await
        }
    }
    .map_err(ActionError::Control)?;

    if sent != datagram.len() {
        return Err(ActionError::Control(io::Error::new(
            io::ErrorKind::WriteZero,
            "short send",
        )));
    }
    Ok(())
}
