use std::time::Duration;

use passage_protocol::Entity;

use crate::action::Action;
use crate::children::ChildRegistry;
use crate::control::ControlCommand;
use crate::control::send_control;
use crate::error::ActionError;
use crate::exec_pipe::spawn_exec_pipe;
use crate::http_request::HttpExecutor;
use crate::reply::Reply;

/// Carries out resolved actions. Shared by all connections.
#[derive(Debug)]
pub struct ActionExecutor {
    http: HttpExecutor,
    children: ChildRegistry,
}

impl ActionExecutor {
    pub fn new(http_timeout: Duration) -> Result<Self, ActionError> {
        Ok(Self {
            http: HttpExecutor::new(http_timeout)?,
            children: ChildRegistry::new(),
        })
    }

    pub fn children(&self) -> &ChildRegistry {
        &self.children
    }

    pub async fn execute(&self, action: Action) -> Result<Reply, ActionError> {
        action.validate()?;

        match action {
            Action::Error(error) => {
                let mut entity = Entity::error(error.message);
                entity.headers = error.headers;
                entity.body = error.body;
                Ok(Reply::new(entity))
            }
            Action::FadeChildren(control) => {
                let tag = control.tag.unwrap_or_default();
                send_control(&control.address, ControlCommand::FadeChildren, tag.as_bytes())
                    .await?;
                Ok(Reply::ok())
            }
            Action::FlushHttpCache(control) => {
                let tag = control.tag.unwrap_or_default();
                send_control(
                    &control.address,
                    ControlCommand::FlushHttpCache,
                    tag.as_bytes(),
                )
                .await?;
                Ok(Reply::ok())
            }
            Action::ExecPipe(exec) => {
                let pipes = spawn_exec_pipe(&exec, &self.children)?;
                let mut reply = Reply::ok().with_fd(pipes.stdout);
                if let Some(stderr) = pipes.stderr {
                    reply = reply.with_fd(stderr);
                }
                Ok(reply)
            }
            Action::HttpRequest(http) => Ok(Reply::new(self.http.execute(&http).await?)),
        }
    }
}
