use std::fs::File;
use std::io;
use std::io::Read;
use std::os::fd::FromRawFd;
use std::os::fd::OwnedFd;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::action::ExecPipeAction;
use crate::action::StderrMode;
use crate::children::ChildRegistry;
use crate::error::ActionError;

/// Read ends of the pipes connected to a freshly spawned child.
#[derive(Debug)]
pub struct ChildPipes {
    pub stdout: OwnedFd,
    pub stderr: Option<OwnedFd>,
}

/// Returns `(read_end, write_end)`, both close-on-exec.
pub(crate) fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0; 2];
    // SAFETY: `fds` has room for both ends.
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe2() just handed us ownership of both descriptors.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Blocks until every copy of the sync pipe's write end is gone.
///
/// The child inherits a close-on-exec copy, so EOF means it has replaced its
/// image (or died). This is the one deliberately blocking call on the
/// request path; it lasts as long as `execve` takes.
fn wait_for_exec(sync_read: OwnedFd) -> io::Result<()> {
    let mut file = File::from(sync_read);
    let mut byte = [0u8; 1];
    loop {
        match file.read(&mut byte) {
            Ok(0) => return Ok(()),
            Ok(_) => continue,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Spawns `argv[0]` with its stdout (and optionally stderr) connected to new
/// pipes and returns their read ends.
pub fn spawn_exec_pipe(
    action: &ExecPipeAction,
    children: &ChildRegistry,
) -> Result<ChildPipes, ActionError> {
    let Some((program, args)) = action.argv.split_first() else {
        return Err(ActionError::validation("EXEC_PIPE without program"));
    };

    let (stdout_read, stdout_write) = pipe().map_err(ActionError::Pipe)?;
    let (stderr_read, stderr) = match action.stderr {
        StderrMode::Journal => (None, Stdio::inherit()),
        StderrMode::Pipe => {
            let (read, write) = pipe().map_err(ActionError::Pipe)?;
            (Some(read), Stdio::from(write))
        }
    };
    let (sync_read, sync_write) = pipe().map_err(ActionError::Pipe)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .env_clear()
        .envs(&action.env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_write))
        .stderr(stderr);

    let spawned = command.spawn();
    // The command holds our copies of the write ends; the pipes only see EOF
    // once they are closed.
    drop(command);
    drop(sync_write);

    let child = spawned.map_err(|source| ActionError::Spawn {
        program: program.clone(),
        source,
    })?;
    wait_for_exec(sync_read).map_err(|source| ActionError::Spawn {
        program: program.clone(),
        source,
    })?;

    debug!("spawned {program} as pid {:?}", child.id());
    children.register(child, program.clone());

    Ok(ChildPipes {
        stdout: stdout_read,
        stderr: stderr_read,
    })
}
