//! Async `AF_UNIX`/`SOCK_SEQPACKET` sockets for the passage protocol.
//!
//! Every send is one datagram and every receive returns exactly one datagram,
//! optionally with file descriptors attached via `SCM_RIGHTS`. A zero-length
//! receive means the peer has closed its end.

mod ancillary;
mod listener;
mod socket;

pub use ancillary::MAX_FDS;
pub use listener::SeqpacketListener;
pub use socket::AsyncSeqpacketSocket;
pub use socket::MAX_DATAGRAM_SIZE;
pub use socket::PeerCredentials;
pub use socket::ReceivedDatagram;
