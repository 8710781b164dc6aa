use std::io;
use std::sync::Arc;

use passage_protocol::parse_entity;
use passage_utils_seqpacket::AsyncSeqpacketSocket;
use passage_utils_seqpacket::PeerCredentials;
use passage_utils_seqpacket::ReceivedDatagram;
use tracing::Instrument;
use tracing::debug;
use tracing::error;
use tracing::field;
use tracing::info_span;
use tracing::warn;

use crate::executor::ActionExecutor;
use crate::reply::Reply;
use crate::request::Request;
use crate::resolver::Resolver;

pub const ANOTHER_DATAGRAM_MESSAGE: &str = "Received another datagram while handling request";

/// The obligation to answer one received datagram.
///
/// Only [`Connection::serve`] creates these, one per datagram, and sending
/// consumes the token, so no datagram can be answered twice.
#[must_use = "every received datagram must be answered"]
struct PendingResponse(());

impl PendingResponse {
    fn new() -> Self {
        Self(())
    }

    /// Sends `reply` and closes the local copies of its descriptors. A failed
    /// send is logged and not retried.
    async fn send(self, socket: &AsyncSeqpacketSocket, reply: Reply) {
        let Reply { entity, fds } = reply;
        if let Err(err) = socket.send_with_fds(&entity.serialize(), &fds).await {
            warn!("failed to send {} reply: {err}", entity.command);
        }
    }
}

enum Received {
    Datagram(ReceivedDatagram),
    /// The datagram could not be read in full; it still gets an answer.
    Unreadable(io::Error),
    Closed,
}

/// One accepted client socket. Requests are handled one at a time, in order.
pub struct Connection {
    socket: AsyncSeqpacketSocket,
    peer: Option<PeerCredentials>,
    resolver: Arc<dyn Resolver>,
    executor: Arc<ActionExecutor>,
}

impl Connection {
    pub fn new(
        socket: AsyncSeqpacketSocket,
        resolver: Arc<dyn Resolver>,
        executor: Arc<ActionExecutor>,
    ) -> Self {
        let peer = match socket.peer_credentials() {
            Ok(peer) => Some(peer),
            Err(err) => {
                warn!("failed to get peer credentials: {err}");
                None
            }
        };
        Self {
            socket,
            peer,
            resolver,
            executor,
        }
    }

    /// Serves requests until the client hangs up or a request fails.
    pub async fn run(self) {
        let span = info_span!("connection", pid = field::Empty, uid = field::Empty);
        if let Some(peer) = self.peer {
            span.record("pid", peer.pid);
            span.record("uid", peer.uid);
        }
        self.serve().instrument(span).await;
    }

    /// Answers requests until one fails or the client hangs up. A failed
    /// request gets its ERROR reply and then the socket is closed.
    async fn serve(&self) {
        loop {
            let payload = match self.receive().await {
                Received::Datagram(datagram) => {
                    if !datagram.fds.is_empty() {
                        debug!("ignoring {} descriptors sent by client", datagram.fds.len());
                    }
                    datagram.payload
                }
                Received::Unreadable(err) => {
                    PendingResponse::new()
                        .send(&self.socket, Reply::error(Some(err.to_string())))
                        .await;
                    return;
                }
                Received::Closed => return,
            };

            let pending = PendingResponse::new();
            match self.handle_until_done(payload).await {
                Some(Ok(reply)) => pending.send(&self.socket, reply).await,
                Some(Err(reply)) => {
                    pending.send(&self.socket, reply).await;
                    return;
                }
                // Cancelled; nobody is left to answer.
                None => return,
            }
        }
    }

    async fn receive(&self) -> Received {
        match self.socket.receive_with_fds().await {
            Ok(datagram) if datagram.is_hangup() => {
                debug!("client hung up");
                Received::Closed
            }
            Ok(datagram) => Received::Datagram(datagram),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!("rejecting datagram: {err}");
                Received::Unreadable(err)
            }
            Err(err) => {
                warn!("failed to receive datagram: {err}");
                Received::Closed
            }
        }
    }

    /// Handles one request while watching the socket for more traffic.
    ///
    /// Datagrams arriving in the meantime are rejected without disturbing the
    /// request in flight. Returns `None` if the client went away, in which
    /// case the request has been dropped along with any descriptors it had
    /// already opened.
    async fn handle_until_done(&self, payload: Vec<u8>) -> Option<Result<Reply, Reply>> {
        let handling = self.handle_request(payload);
        tokio::pin!(handling);

        loop {
            tokio::select! {
                reply = &mut handling => return Some(reply),
                received = self.receive() => match received {
                    Received::Datagram(_) => {
                        warn!("{ANOTHER_DATAGRAM_MESSAGE}");
                        PendingResponse::new()
                            .send(
                                &self.socket,
                                Reply::error(Some(ANOTHER_DATAGRAM_MESSAGE.to_string())),
                            )
                            .await;
                    }
                    Received::Unreadable(err) => {
                        PendingResponse::new()
                            .send(&self.socket, Reply::error(Some(err.to_string())))
                            .await;
                    }
                    Received::Closed => return None,
                },
            }
        }
    }

    /// `Err` carries the ERROR reply of a request that failed to parse,
    /// resolve or execute.
    async fn handle_request(&self, payload: Vec<u8>) -> Result<Reply, Reply> {
        let entity = match parse_entity(&payload) {
            Ok(entity) => entity,
            Err(err) => {
                warn!("malformed request: {err}");
                return Err(Reply::error(Some(err.to_string())));
            }
        };

        let request = Request::new(entity, self.peer);
        let action = match self.resolver.resolve(&request).await {
            Ok(action) => action,
            Err(err) => {
                error!("failed to resolve {}: {err:#}", request.command());
                return Err(Reply::error(None));
            }
        };

        let kind = action.kind();
        debug!("{} resolved to {kind}", request.command());
        self.executor.execute(action).await.map_err(|err| {
            warn!("{kind} failed: {err:?}");
            Reply::error(Some(err.to_string()))
        })
    }
}
