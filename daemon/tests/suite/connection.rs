use std::collections::BTreeMap;

use passage_daemon::ANOTHER_DATAGRAM_MESSAGE;
use passage_daemon::Action;
use passage_daemon::ErrorAction;
use passage_protocol::Entity;
use pretty_assertions::assert_eq;

use super::FailingResolver;
use super::GatedResolver;
use super::StaticResolver;
use super::TIMEOUT;
use super::expect_hangup;
use super::receive_reply;
use super::request;
use super::start_connection;

#[tokio::test]
async fn malformed_request_gets_error_reply_and_hangup() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(Action::error("unused")))?;

    connection.client.send(b"f@o").await?;
    let (reply, fds) = receive_reply(&connection.client).await?;
    assert_eq!(Entity::error(Some("Malformed command".to_string())), reply);
    assert!(fds.is_empty());

    expect_hangup(connection).await
}

#[tokio::test]
async fn bad_quoting_gets_error_reply_and_hangup() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(Action::error("unused")))?;

    connection.client.send(b"FOO \"open").await?;
    let (reply, _) = receive_reply(&connection.client).await?;
    assert_eq!(Entity::error(Some("Closing quote missing".to_string())), reply);

    expect_hangup(connection).await
}

#[tokio::test]
async fn error_action_carries_headers_and_body() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(Action::Error(ErrorAction {
        message: Some("Go away".to_string()),
        headers: BTreeMap::from([("retry-after".to_string(), "60".to_string())]),
        body: Some(b"details".to_vec()),
    })))?;

    let (reply, _) = request(&connection.client, &Entity::new("FOO")).await?;
    assert_eq!(
        Entity::error(Some("Go away".to_string()))
            .with_header("retry-after", "60")
            .with_body(b"details".to_vec()),
        reply
    );
    Ok(())
}

#[tokio::test]
async fn resolver_failure_gets_bare_error() -> anyhow::Result<()> {
    let connection = start_connection(FailingResolver)?;
    let (reply, _) = request(&connection.client, &Entity::new("FOO")).await?;
    assert_eq!(Entity::error(None), reply);

    expect_hangup(connection).await
}

#[tokio::test]
async fn requests_on_one_connection_are_answered_in_order() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(Action::error("same")))?;
    for _ in 0..3 {
        let (reply, _) = request(&connection.client, &Entity::new("FOO")).await?;
        assert_eq!(Entity::error(Some("same".to_string())), reply);
    }
    Ok(())
}

#[tokio::test]
async fn second_datagram_while_pending_is_rejected() -> anyhow::Result<()> {
    let resolver = GatedResolver::new();
    let gate = resolver.gate.clone();
    let entered = resolver.entered.clone();
    let connection = start_connection(resolver)?;

    connection.client.send(&Entity::new("FIRST").serialize()).await?;
    tokio::time::timeout(TIMEOUT, entered.acquire())
        .await??
        .forget();
    connection.client.send(&Entity::new("SECOND").serialize()).await?;

    let (reply, _) = receive_reply(&connection.client).await?;
    assert_eq!(
        Entity::error(Some(ANOTHER_DATAGRAM_MESSAGE.to_string())),
        reply
    );

    gate.add_permits(1);
    let (reply, _) = receive_reply(&connection.client).await?;
    assert_eq!(Entity::error(Some("FIRST".to_string())), reply);

    // Nothing else is queued: the next reply belongs to the next request.
    gate.add_permits(1);
    let (reply, _) = request(&connection.client, &Entity::new("THIRD")).await?;
    assert_eq!(Entity::error(Some("THIRD".to_string())), reply);
    Ok(())
}

#[tokio::test]
async fn empty_datagram_tears_down_without_reply() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(Action::error("unused")))?;

    connection.client.send(b"").await?;
    tokio::time::timeout(TIMEOUT, connection.task).await??;

    // The server end is gone, so the only thing left to read is the hangup.
    let datagram = connection.client.receive_with_fds().await?;
    assert!(datagram.is_hangup());
    Ok(())
}

#[tokio::test]
async fn hangup_cancels_pending_request() -> anyhow::Result<()> {
    let resolver = GatedResolver::new();
    let entered = resolver.entered.clone();
    let connection = start_connection(resolver)?;

    connection.client.send(&Entity::new("FOO").serialize()).await?;
    tokio::time::timeout(TIMEOUT, entered.acquire())
        .await??
        .forget();

    // The gate is never opened; the task can only finish by cancelling.
    drop(connection.client);
    tokio::time::timeout(TIMEOUT, connection.task).await??;
    Ok(())
}
