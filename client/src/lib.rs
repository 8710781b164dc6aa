//! Command-line client for the passage daemon.

use std::fs::File;
use std::io;
use std::io::Write;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use passage_protocol::Entity;
use passage_protocol::check_command;
use passage_protocol::parse_entity;
use passage_utils_seqpacket::AsyncSeqpacketSocket;
use tracing::debug;

pub const DEFAULT_SERVER_PATH: &str = "/run/passage/socket";

#[derive(Debug, Parser)]
#[command(name = "passage", about = "Sends one request to the passage daemon")]
pub struct Cli {
    /// Path of the daemon's socket.
    #[arg(long, default_value = DEFAULT_SERVER_PATH)]
    pub server: PathBuf,

    /// Request header, may be repeated.
    #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    pub command: String,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((name, value)) if !name.is_empty() && !name.contains('\n') && !value.contains('\n') => {
            Ok((name.to_string(), value.trim_start().to_string()))
        }
        _ => Err(format!("expected NAME:VALUE, got {s:?}")),
    }
}

impl Cli {
    pub fn to_request(&self) -> Result<Entity> {
        check_command(&self.command).with_context(|| format!("invalid command {:?}", self.command))?;

        let mut request = Entity::new(self.command.as_str());
        request.args = self.args.clone();
        request.headers = self.headers.iter().cloned().collect();
        Ok(request)
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let request = cli.to_request()?;
    let socket = AsyncSeqpacketSocket::connect(&cli.server)
        .with_context(|| format!("failed to connect to {}", cli.server.display()))?;

    socket
        .send(&request.serialize())
        .await
        .context("failed to send request")?;
    let datagram = socket
        .receive_with_fds()
        .await
        .context("failed to receive reply")?;
    if datagram.is_hangup() {
        bail!("Server closed the connection");
    }

    let reply = parse_entity(&datagram.payload).context("Malformed response")?;
    debug!("received {} with {} descriptors", reply.command, datagram.fds.len());
    handle_reply(reply, datagram.fds).await
}

async fn handle_reply(reply: Entity, fds: Vec<OwnedFd>) -> Result<ExitCode> {
    if reply.is_error() {
        match reply.args.first() {
            Some(message) => eprintln!("Server error: {message}"),
            None => eprintln!("Server error"),
        }
        return Ok(ExitCode::FAILURE);
    }
    if !reply.is_ok() {
        bail!("Malformed response");
    }

    if let Some(body) = &reply.body {
        let mut stdout = io::stdout().lock();
        stdout.write_all(body)?;
        stdout.flush()?;
    }

    let mut fds = fds.into_iter();
    let stdout_copy = fds.next().map(|fd| {
        tokio::task::spawn_blocking(move || copy_to(fd, io::stdout()))
    });
    let stderr_copy = fds.next().map(|fd| {
        tokio::task::spawn_blocking(move || copy_to(fd, io::stderr()))
    });
    for copy in [stdout_copy, stderr_copy].into_iter().flatten() {
        copy.await??;
    }
    Ok(ExitCode::SUCCESS)
}

/// Copies everything from a received pipe until the writer closes it.
fn copy_to(fd: OwnedFd, mut output: impl Write) -> io::Result<u64> {
    let mut input = File::from(fd);
    let copied = io::copy(&mut input, &mut output)?;
    output.flush()?;
    Ok(copied)
}
