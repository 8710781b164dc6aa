use std::collections::BTreeMap;
use std::sync::OnceLock;

use passage_protocol::Entity;
use passage_utils_seqpacket::PeerCredentials;

use crate::cgroup::read_process_cgroup;

/// A parsed request plus what is known about the process that sent it.
#[derive(Debug)]
pub struct Request {
    entity: Entity,
    peer: Option<PeerCredentials>,
    cgroup: OnceLock<Option<String>>,
}

impl Request {
    pub fn new(entity: Entity, peer: Option<PeerCredentials>) -> Self {
        Self {
            entity,
            peer,
            cgroup: OnceLock::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.entity.command
    }

    pub fn args(&self) -> &[String] {
        &self.entity.args
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.entity.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.entity.body.as_deref()
    }

    pub fn peer(&self) -> Option<PeerCredentials> {
        self.peer
    }

    pub fn pid(&self) -> Option<i32> {
        self.peer.map(|peer| peer.pid)
    }

    pub fn uid(&self) -> Option<u32> {
        self.peer.map(|peer| peer.uid)
    }

    pub fn gid(&self) -> Option<u32> {
        self.peer.map(|peer| peer.gid)
    }

    /// The peer's cgroup path, looked up on first use.
    ///
    /// The lookup is a blocking read of `/proc/PID/cgroup` on the calling
    /// task. procfs serves it from memory, so it never waits on a disk.
    pub fn cgroup(&self) -> Option<&str> {
        self.cgroup
            .get_or_init(|| self.pid().and_then(read_process_cgroup))
            .as_deref()
    }
}
