use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::os::fd::OwnedFd;

use passage_daemon::Action;
use passage_daemon::ExecPipeAction;
use passage_daemon::MAX_EXEC_ARGS;
use passage_daemon::StderrMode;
use passage_protocol::Entity;
use pretty_assertions::assert_eq;

use super::StaticResolver;
use super::expect_hangup;
use super::request;
use super::start_connection;

fn exec_pipe(argv: Vec<String>, stderr: StderrMode) -> Action {
    Action::ExecPipe(ExecPipeAction {
        argv,
        env: BTreeMap::new(),
        stderr,
    })
}

fn read_all(fd: OwnedFd) -> anyhow::Result<String> {
    let mut output = String::new();
    File::from(fd).read_to_string(&mut output)?;
    Ok(output)
}

#[tokio::test]
async fn stdout_pipe_is_passed_back() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(exec_pipe(
        vec!["/bin/echo".to_string(), "hello".to_string()],
        StderrMode::Journal,
    )))?;

    let (reply, mut fds) = request(&connection.client, &Entity::new("RUN")).await?;
    assert_eq!(Entity::ok(), reply);
    assert_eq!(1, fds.len());
    assert_eq!("hello\n", read_all(fds.remove(0))?);
    Ok(())
}

#[tokio::test]
async fn stderr_pipe_is_passed_second() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(exec_pipe(
        vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "echo out; echo err >&2".to_string(),
        ],
        StderrMode::Pipe,
    )))?;

    let (reply, mut fds) = request(&connection.client, &Entity::new("RUN")).await?;
    assert_eq!(Entity::ok(), reply);
    assert_eq!(2, fds.len());
    let stderr = fds.remove(1);
    assert_eq!("out\n", read_all(fds.remove(0))?);
    assert_eq!("err\n", read_all(stderr)?);
    Ok(())
}

#[tokio::test]
async fn too_many_arguments_is_rejected_without_spawning() -> anyhow::Result<()> {
    let argv = std::iter::once("/bin/echo".to_string())
        .chain((0..MAX_EXEC_ARGS).map(|i| i.to_string()))
        .collect();
    let connection = start_connection(StaticResolver(exec_pipe(argv, StderrMode::Journal)))?;

    let (reply, fds) = request(&connection.client, &Entity::new("RUN")).await?;
    assert_eq!(
        Entity::error(Some("Too many EXEC_PIPE arguments".to_string())),
        reply
    );
    assert!(fds.is_empty());
    assert!(connection.executor.children().running().is_empty());
    expect_hangup(connection).await
}

#[tokio::test]
async fn spawn_failure_is_reported() -> anyhow::Result<()> {
    let connection = start_connection(StaticResolver(exec_pipe(
        vec!["/nonexistent/passage-test".to_string()],
        StderrMode::Journal,
    )))?;

    let (reply, fds) = request(&connection.client, &Entity::new("RUN")).await?;
    assert!(reply.is_error());
    let message = reply.args.first().cloned().unwrap_or_default();
    assert!(
        message.starts_with("Failed to execute /nonexistent/passage-test"),
        "{message}"
    );
    assert!(fds.is_empty());
    expect_hangup(connection).await
}
