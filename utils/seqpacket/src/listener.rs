use std::fs;
use std::io;
use std::mem::size_of;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;

use socket2::Domain;
use socket2::SockAddr;
use socket2::Socket;
use socket2::Type;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::debug;

use crate::socket::AsyncSeqpacketSocket;

const LISTEN_BACKLOG: i32 = 64;

/// A listening `SOCK_SEQPACKET` socket bound to a filesystem path.
pub struct SeqpacketListener {
    inner: AsyncFd<Socket>,
    path: PathBuf,
}

impl SeqpacketListener {
    /// Binds to `path`, replacing a stale socket left behind by a previous
    /// run, and applies `mode` to the socket file.
    pub fn bind(path: &Path, mode: u32) -> io::Result<Self> {
        remove_stale_socket(path)?;

        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        socket.bind(&SockAddr::unix(path)?)?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        set_passcred(&socket)?;
        socket.listen(LISTEN_BACKLOG)?;
        socket.set_nonblocking(true)?;
        debug!("listening on {}", path.display());

        Ok(Self {
            inner: AsyncFd::new(socket)?,
            path: path.to_path_buf(),
        })
    }

    pub async fn accept(&self) -> io::Result<AsyncSeqpacketSocket> {
        let (socket, _) = self
            .inner
            .async_io(Interest::READABLE, |listener| listener.accept())
            .await?;
        AsyncSeqpacketSocket::new(socket)
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() => fs::remove_file(path),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn set_passcred(socket: &Socket) -> io::Result<()> {
    let enable: libc::c_int = 1;
    // SAFETY: `enable` is a valid c_int for the duration of the call.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_PASSCRED,
            (&raw const enable).cast(),
            size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
