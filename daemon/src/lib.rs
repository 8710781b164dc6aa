//! The passage daemon: turns requests received on a local seqpacket socket
//! into privileged actions and answers each with exactly one reply.

mod action;
mod cgroup;
mod children;
mod config;
mod connection;
mod control;
mod error;
mod exec_pipe;
mod executor;
mod http_request;
mod reply;
mod request;
mod resolver;
mod rules;
mod server;

pub use action::Action;
pub use action::ControlAction;
pub use action::ErrorAction;
pub use action::ExecPipeAction;
pub use action::HttpMethod;
pub use action::HttpRequestAction;
pub use action::MAX_EXEC_ARGS;
pub use action::StderrMode;
pub use cgroup::parse_cgroup_file;
pub use children::ChildRegistry;
pub use config::ActionConfig;
pub use config::DEFAULT_CONFIG_PATH;
pub use config::DaemonConfig;
pub use config::HttpConfig;
pub use config::ListenerConfig;
pub use config::RuleConfig;
pub use connection::ANOTHER_DATAGRAM_MESSAGE;
pub use connection::Connection;
pub use control::ControlAddress;
pub use control::ControlCommand;
pub use control::DEFAULT_CONTROL_PORT;
pub use control::encode_control_datagram;
pub use error::ActionError;
pub use exec_pipe::ChildPipes;
pub use exec_pipe::spawn_exec_pipe;
pub use executor::ActionExecutor;
pub use http_request::MAX_RESPONSE_BODY;
pub use reply::Reply;
pub use request::Request;
pub use resolver::Resolver;
pub use rules::RuleTableResolver;
pub use server::serve;
