use std::os::fd::OwnedFd;

use passage_protocol::Entity;

/// A response together with the descriptors that travel with it.
///
/// The descriptors are owned here until the reply is sent; sending closes the
/// local copies.
#[derive(Debug)]
pub struct Reply {
    pub entity: Entity,
    pub fds: Vec<OwnedFd>,
}

impl Reply {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            fds: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Entity::ok())
    }

    pub fn error(message: Option<String>) -> Self {
        Self::new(Entity::error(message))
    }

    pub fn with_fd(mut self, fd: OwnedFd) -> Self {
        self.fds.push(fd);
        self
    }
}
