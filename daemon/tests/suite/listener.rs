use std::fs::File;
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::Duration;

use passage_daemon::Action;
use passage_daemon::ActionExecutor;
use passage_daemon::DaemonConfig;
use passage_daemon::RuleTableResolver;
use passage_daemon::serve;
use passage_protocol::Entity;
use passage_utils_seqpacket::AsyncSeqpacketSocket;
use passage_utils_seqpacket::SeqpacketListener;
use pretty_assertions::assert_eq;

use super::StaticResolver;
use super::receive_reply;
use super::request;

#[tokio::test]
async fn serves_configured_rules() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let socket_path = dir.path().join("passage.socket");
    let config = DaemonConfig::parse(&format!(
        r#"
[[listener]]
path = "{}"

[[rule]]
command = "DENIED"
action = "error"
message = "Not allowed"
"#,
        socket_path.display()
    ))?;

    let listener = SeqpacketListener::bind(&config.listeners[0].path, config.listeners[0].mode)?;
    let resolver = Arc::new(RuleTableResolver::from_config(&config.rules)?);
    let executor = Arc::new(ActionExecutor::new(Duration::from_secs(5))?);
    let server = tokio::spawn(serve(listener, resolver, executor));

    let first = AsyncSeqpacketSocket::connect(&socket_path)?;
    let second = AsyncSeqpacketSocket::connect(&socket_path)?;

    let (reply, _) = request(&first, &Entity::new("DENIED")).await?;
    assert_eq!(Entity::error(Some("Not allowed".to_string())), reply);

    let (reply, _) = request(&second, &Entity::new("OTHER").with_arg("x")).await?;
    assert_eq!(Entity::error(Some("Unknown command".to_string())), reply);

    server.abort();
    Ok(())
}

#[tokio::test]
async fn descriptors_sent_by_client_are_ignored() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let socket_path = dir.path().join("passage.socket");
    let listener = SeqpacketListener::bind(&socket_path, 0o600)?;
    let executor = Arc::new(ActionExecutor::new(Duration::from_secs(5))?);
    let server = tokio::spawn(serve(
        listener,
        Arc::new(StaticResolver(Action::error("resolved"))),
        executor,
    ));

    let client = AsyncSeqpacketSocket::connect(&socket_path)?;
    let fds = vec![OwnedFd::from(File::open("/dev/null")?)];
    client
        .send_with_fds(&Entity::new("FOO").serialize(), &fds)
        .await?;
    let (reply, _) = receive_reply(&client).await?;
    assert_eq!(Entity::error(Some("resolved".to_string())), reply);

    let (reply, _) = request(&client, &Entity::new("FOO")).await?;
    assert_eq!(Entity::error(Some("resolved".to_string())), reply);

    server.abort();
    Ok(())
}
