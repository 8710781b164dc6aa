//! Wire format shared by the passage daemon and its clients.
//!
//! Every datagram carries exactly one [`Entity`]:
//!
//! ```text
//! <command>[ <arg>]*\n
//! [<header-name>:<header-value>\n]*
//! \n
//! \0<raw body bytes>
//! ```
//!
//! The header block and the body are optional; the smallest valid message is
//! a bare command without a trailing newline. Replies use the same format and
//! their command is always [`OK`] or [`ERROR`].

mod entity;
mod error;
mod parser;
mod verify;

pub use entity::Entity;
pub use error::ProtocolError;
pub use parser::parse_entity;
pub use verify::check_command;
pub use verify::is_valid_command_char;

/// Command of a successful reply.
pub const OK: &str = "OK";

/// Command of a failed reply.
pub const ERROR: &str = "ERROR";
