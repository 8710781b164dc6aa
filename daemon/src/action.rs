use std::collections::BTreeMap;

use url::Url;

use crate::control::ControlAddress;
use crate::error::ActionError;

/// Maximum number of `argv` entries for [`Action::ExecPipe`].
pub const MAX_EXEC_ARGS: usize = 32;

/// What a request resolved to. Constructed per request and consumed by the
/// executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Error(ErrorAction),
    FadeChildren(ControlAction),
    FlushHttpCache(ControlAction),
    ExecPipe(ExecPipeAction),
    HttpRequest(HttpRequestAction),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorAction {
    pub message: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlAction {
    pub address: ControlAddress,
    pub tag: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    /// The child inherits the daemon's stderr, which is the journal.
    #[default]
    Journal,
    /// A second pipe is passed back to the client.
    Pipe,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecPipeAction {
    pub argv: Vec<String>,
    /// The complete environment of the child.
    pub env: BTreeMap<String, String>,
    pub stderr: StderrMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequestAction {
    pub url: Url,
    pub query: BTreeMap<String, String>,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl Action {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorAction {
            message: Some(message.into()),
            ..Default::default()
        })
    }

    /// The name used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error(_) => "ERROR",
            Self::FadeChildren(_) => "FADE_CHILDREN",
            Self::FlushHttpCache(_) => "FLUSH_HTTP_CACHE",
            Self::ExecPipe(_) => "EXEC_PIPE",
            Self::HttpRequest(_) => "HTTP_REQUEST",
        }
    }

    /// Checks the input constraints of each kind before anything is executed.
    pub fn validate(&self) -> Result<(), ActionError> {
        match self {
            Self::Error(_) => Ok(()),
            Self::FadeChildren(control) => check_tag(control.tag.as_deref()),
            Self::FlushHttpCache(control) => match control.tag.as_deref() {
                Some(tag) => check_tag(Some(tag)),
                None => Err(ActionError::validation("FLUSH_HTTP_CACHE requires a tag")),
            },
            Self::ExecPipe(exec) => exec.validate(),
            Self::HttpRequest(http) => match http.url.scheme() {
                "http" | "https" => Ok(()),
                scheme => Err(ActionError::validation(format!(
                    "Unsupported URL scheme: {scheme}"
                ))),
            },
        }
    }
}

fn check_tag(tag: Option<&str>) -> Result<(), ActionError> {
    match tag {
        Some(tag) if tag.len() > usize::from(u16::MAX) => {
            Err(ActionError::validation("Control tag too long"))
        }
        _ => Ok(()),
    }
}

impl ExecPipeAction {
    fn validate(&self) -> Result<(), ActionError> {
        let Some(program) = self.argv.first() else {
            return Err(ActionError::validation("EXEC_PIPE without program"));
        };
        if self.argv.len() > MAX_EXEC_ARGS {
            return Err(ActionError::validation("Too many EXEC_PIPE arguments"));
        }
        if !program.starts_with('/') {
            return Err(ActionError::validation(
                "EXEC_PIPE program must be an absolute path",
            ));
        }
        if self
            .argv
            .iter()
            .chain(self.env.keys())
            .chain(self.env.values())
            .any(|s| s.contains('\0'))
        {
            return Err(ActionError::validation("EXEC_PIPE argument contains NUL"));
        }
        Ok(())
    }
}
