use std::io;
use std::mem::size_of;
use std::os::fd::AsRawFd;
use std::os::fd::OwnedFd;
use std::path::Path;

use socket2::Domain;
use socket2::SockAddr;
use socket2::Socket;
use socket2::Type;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use crate::ancillary::receive_message;
use crate::ancillary::send_message;

/// Size of the receive buffer; larger datagrams are rejected.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Identity of the process on the other end, as recorded by the kernel when
/// the connection was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerCredentials {
    pub pid: i32,
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug)]
pub struct ReceivedDatagram {
    /// Empty when the peer has hung up.
    pub payload: Vec<u8>,
    pub fds: Vec<OwnedFd>,
}

impl ReceivedDatagram {
    pub fn is_hangup(&self) -> bool {
        self.payload.is_empty()
    }
}

pub struct AsyncSeqpacketSocket {
    inner: AsyncFd<Socket>,
}

impl AsyncSeqpacketSocket {
    pub fn new(socket: Socket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            inner: AsyncFd::new(socket)?,
        })
    }

    pub fn pair() -> io::Result<(Self, Self)> {
        let (first, second) = Socket::pair(Domain::UNIX, Type::SEQPACKET, None)?;
        Ok((Self::new(first)?, Self::new(second)?))
    }

    pub fn connect(path: &Path) -> io::Result<Self> {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        socket.connect(&SockAddr::unix(path)?)?;
        Self::new(socket)
    }

    pub fn peer_credentials(&self) -> io::Result<PeerCredentials> {
        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = size_of::<libc::ucred>() as libc::socklen_t;
        // SAFETY: `cred` and `len` describe a valid, writable ucred.
        let rc = unsafe {
            libc::getsockopt(
                self.inner.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&raw mut cred).cast(),
                &mut len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(PeerCredentials {
            pid: cred.pid,
            uid: cred.uid,
            gid: cred.gid,
        })
    }

    pub async fn send(&self, payload: &[u8]) -> io::Result<()> {
        self.send_with_fds(payload, &[]).await
    }

    /// Sends one datagram with `fds` attached. The caller keeps ownership of
    /// its copies; dropping them after this returns is what completes the
    /// hand-off.
    pub async fn send_with_fds(&self, payload: &[u8], fds: &[OwnedFd]) -> io::Result<()> {
        let sent = self
            .inner
            .async_io(Interest::WRITABLE, |socket| {
                send_message(socket.as_raw_fd(), payload, fds)
            })
            .await?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send: {sent} of {} bytes", payload.len()),
            ));
        }
        Ok(())
    }

    /// Receives one datagram. Cancel safe: if the future is dropped before
    /// it completes, no datagram has been consumed.
    pub async fn receive_with_fds(&self) -> io::Result<ReceivedDatagram> {
        let mut buffer = vec![0; MAX_DATAGRAM_SIZE];
        let (len, fds) = self
            .inner
            .async_io(Interest::READABLE, |socket| {
                receive_message(socket.as_raw_fd(), &mut buffer)
            })
            .await?;
        buffer.truncate(len);
        Ok(ReceivedDatagram {
            payload: buffer,
            fds,
        })
    }
}
