use std::collections::BTreeMap;

use anyhow::Context;
use anyhow::Result;
use tracing::debug;
use url::Url;

use crate::action::Action;
use crate::action::ControlAction;
use crate::action::ErrorAction;
use crate::action::ExecPipeAction;
use crate::action::HttpMethod;
use crate::action::HttpRequestAction;
use crate::action::StderrMode;
use crate::config::ActionConfig;
use crate::config::RuleConfig;
use crate::control::ControlAddress;
use crate::request::Request;
use crate::resolver::Resolver;

/// Resolves requests against an ordered list of rules; the first matching
/// rule wins.
#[derive(Debug, Default)]
pub struct RuleTableResolver {
    rules: Vec<Rule>,
}

#[derive(Debug)]
struct Rule {
    command: String,
    uids: Option<Vec<u32>>,
    gids: Option<Vec<u32>>,
    cgroup_prefix: Option<String>,
    template: ActionTemplate,
}

#[derive(Debug)]
enum ActionTemplate {
    Error {
        message: Option<String>,
    },
    FadeChildren {
        address: ControlAddress,
        tag: Option<String>,
    },
    FlushHttpCache {
        address: ControlAddress,
        tag: Option<String>,
    },
    ExecPipe {
        argv: Vec<String>,
        env: BTreeMap<String, String>,
        stderr: StderrMode,
        append_args: bool,
    },
    HttpRequest {
        url: Url,
        method: HttpMethod,
        query: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
        forward_body: bool,
    },
}

impl RuleTableResolver {
    /// Builds the table, resolving control addresses and parsing URLs.
    pub fn from_config(rules: &[RuleConfig]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|config| {
                Rule::from_config(config)
                    .with_context(|| format!("rule for command {:?}", config.command))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    fn find(&self, request: &Request) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(request))
    }
}

#[async_trait::async_trait]
impl Resolver for RuleTableResolver {
    async fn resolve(&self, request: &Request) -> Result<Action> {
        match self.find(request) {
            Some(rule) => Ok(rule.template.instantiate(request)),
            None => {
                debug!("no rule matches {}", request.command());
                Ok(Action::error("Unknown command"))
            }
        }
    }
}

impl Rule {
    fn from_config(config: &RuleConfig) -> Result<Self> {
        Ok(Self {
            command: config.command.clone(),
            uids: config.uids.clone(),
            gids: config.gids.clone(),
            cgroup_prefix: config.cgroup_prefix.clone(),
            template: ActionTemplate::from_config(&config.action)?,
        })
    }

    fn matches(&self, request: &Request) -> bool {
        if self.command != request.command() {
            return false;
        }
        if let Some(uids) = &self.uids
            && !request.uid().is_some_and(|uid| uids.contains(&uid))
        {
            return false;
        }
        if let Some(gids) = &self.gids
            && !request.gid().is_some_and(|gid| gids.contains(&gid))
        {
            return false;
        }
        if let Some(prefix) = &self.cgroup_prefix
            && !request
                .cgroup()
                .is_some_and(|cgroup| cgroup.starts_with(prefix.as_str()))
        {
            return false;
        }
        true
    }
}

impl ActionTemplate {
    fn from_config(config: &ActionConfig) -> Result<Self> {
        Ok(match config {
            ActionConfig::Error { message } => Self::Error {
                message: message.clone(),
            },
            ActionConfig::FadeChildren { address, tag } => Self::FadeChildren {
                address: ControlAddress::resolve(address)?,
                tag: tag.clone(),
            },
            ActionConfig::FlushHttpCache { address, tag } => Self::FlushHttpCache {
                address: ControlAddress::resolve(address)?,
                tag: tag.clone(),
            },
            ActionConfig::ExecPipe {
                argv,
                env,
                stderr,
                append_args,
            } => Self::ExecPipe {
                argv: argv.clone(),
                env: env.clone(),
                stderr: *stderr,
                append_args: *append_args,
            },
            ActionConfig::HttpRequest {
                url,
                method,
                query,
                headers,
                forward_body,
            } => {
                let url = Url::parse(url).with_context(|| format!("invalid URL {url:?}"))?;
                if !matches!(url.scheme(), "http" | "https") {
                    anyhow::bail!("unsupported URL scheme in {url}");
                }
                Self::HttpRequest {
                    url,
                    method: *method,
                    query: query.clone(),
                    headers: headers.clone(),
                    forward_body: *forward_body,
                }
            }
        })
    }

    fn instantiate(&self, request: &Request) -> Action {
        let tag_or_first_arg =
            |tag: &Option<String>| tag.clone().or_else(|| request.args().first().cloned());

        match self {
            Self::Error { message } => Action::Error(ErrorAction {
                message: message.clone(),
                ..Default::default()
            }),
            Self::FadeChildren { address, tag } => Action::FadeChildren(ControlAction {
                address: address.clone(),
                tag: tag_or_first_arg(tag),
            }),
            Self::FlushHttpCache { address, tag } => Action::FlushHttpCache(ControlAction {
                address: address.clone(),
                tag: tag_or_first_arg(tag),
            }),
            Self::ExecPipe {
                argv,
                env,
                stderr,
                append_args,
            } => {
                let mut argv = argv.clone();
                if *append_args {
                    argv.extend(request.args().iter().cloned());
                }
                Action::ExecPipe(ExecPipeAction {
                    argv,
                    env: env.clone(),
                    stderr: *stderr,
                })
            }
            Self::HttpRequest {
                url,
                method,
                query,
                headers,
                forward_body,
            } => Action::HttpRequest(HttpRequestAction {
                url: url.clone(),
                query: query.clone(),
                method: *method,
                headers: headers.clone(),
                body: if *forward_body {
                    request.body().map(<[u8]>::to_vec)
                } else {
                    None
                },
            }),
        }
    }
}
