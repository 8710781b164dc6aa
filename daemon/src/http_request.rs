use std::time::Duration;

use passage_protocol::Entity;
use tracing::debug;

use crate::action::HttpMethod;
use crate::action::HttpRequestAction;
use crate::error::ActionError;

/// Largest response body that still fits into a reply datagram along with
/// its headers.
pub const MAX_RESPONSE_BODY: usize = 60 * 1024;

#[derive(Clone, Debug)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(timeout: Duration) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Issues the request and turns the response into an `OK <status>` reply
    /// carrying the response headers and body.
    pub async fn execute(&self, action: &HttpRequestAction) -> Result<Entity, ActionError> {
        let mut url = action.url.clone();
        if !action.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&action.query);
        }

        let method = match action.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        debug!("{method} {url}");

        let mut request = self.client.request(method, url);
        for (name, value) in &action.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &action.body {
            request = request.body(body.clone());
        }

        let mut response = request.send().await?;
        let mut reply = Entity::ok().with_arg(response.status().as_u16().to_string());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                reply.headers.insert(name.to_string(), value.to_string());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_RESPONSE_BODY {
                return Err(ActionError::ResponseTooLarge {
                    limit: MAX_RESPONSE_BODY,
                });
            }
            body.extend_from_slice(&chunk);
        }
        if !body.is_empty() {
            reply.body = Some(body);
        }
        Ok(reply)
    }
}
