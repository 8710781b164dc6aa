use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use passage_daemon::Action;
use passage_daemon::ActionExecutor;
use passage_daemon::Connection;
use passage_daemon::Request;
use passage_daemon::Resolver;
use passage_protocol::Entity;
use passage_protocol::parse_entity;
use passage_utils_seqpacket::AsyncSeqpacketSocket;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

mod connection;
mod exec_pipe;
mod http;
mod listener;

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves every request to the same action.
pub struct StaticResolver(pub Action);

#[async_trait::async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, _request: &Request) -> anyhow::Result<Action> {
        Ok(self.0.clone())
    }
}

/// Holds every request until the test hands out a permit, then echoes the
/// request command back as an error message.
pub struct GatedResolver {
    pub entered: Arc<Semaphore>,
    pub gate: Arc<Semaphore>,
}

impl GatedResolver {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Semaphore::new(0)),
            gate: Arc::new(Semaphore::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl Resolver for GatedResolver {
    async fn resolve(&self, request: &Request) -> anyhow::Result<Action> {
        self.entered.add_permits(1);
        self.gate.acquire().await?.forget();
        Ok(Action::error(request.command()))
    }
}

pub struct FailingResolver;

#[async_trait::async_trait]
impl Resolver for FailingResolver {
    async fn resolve(&self, _request: &Request) -> anyhow::Result<Action> {
        anyhow::bail!("rule evaluation blew up")
    }
}

pub struct TestConnection {
    pub client: AsyncSeqpacketSocket,
    pub executor: Arc<ActionExecutor>,
    pub task: JoinHandle<()>,
}

pub fn start_connection(resolver: impl Resolver + 'static) -> anyhow::Result<TestConnection> {
    let (server, client) = AsyncSeqpacketSocket::pair()?;
    let executor = Arc::new(ActionExecutor::new(Duration::from_secs(5))?);
    let connection = Connection::new(server, Arc::new(resolver), Arc::clone(&executor));
    Ok(TestConnection {
        client,
        executor,
        task: tokio::spawn(connection.run()),
    })
}

pub async fn request(
    client: &AsyncSeqpacketSocket,
    entity: &Entity,
) -> anyhow::Result<(Entity, Vec<OwnedFd>)> {
    client.send(&entity.serialize()).await?;
    receive_reply(client).await
}

pub async fn receive_reply(client: &AsyncSeqpacketSocket) -> anyhow::Result<(Entity, Vec<OwnedFd>)> {
    let datagram = tokio::time::timeout(TIMEOUT, client.receive_with_fds())
        .await
        .context("timed out waiting for reply")??;
    anyhow::ensure!(!datagram.is_hangup(), "server hung up");
    Ok((parse_entity(&datagram.payload)?, datagram.fds))
}

/// Waits for the server side to finish and checks that it closed the socket
/// without sending anything else.
pub async fn expect_hangup(connection: TestConnection) -> anyhow::Result<()> {
    tokio::time::timeout(TIMEOUT, connection.task)
        .await
        .context("connection is still being served")??;
    let datagram = tokio::time::timeout(TIMEOUT, connection.client.receive_with_fds())
        .await
        .context("timed out waiting for hangup")??;
    anyhow::ensure!(
        datagram.is_hangup(),
        "expected hangup, got {:?}",
        String::from_utf8_lossy(&datagram.payload)
    );
    Ok(())
}
