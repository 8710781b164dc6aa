use std::collections::BTreeMap;

use passage_daemon::Action;
use passage_daemon::HttpMethod;
use passage_daemon::HttpRequestAction;
use passage_daemon::MAX_RESPONSE_BODY;
use passage_protocol::Entity;
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

use super::StaticResolver;
use super::request;
use super::start_connection;

fn http_get(url: Url) -> Action {
    Action::HttpRequest(HttpRequestAction {
        url,
        query: BTreeMap::new(),
        method: HttpMethod::Get,
        headers: BTreeMap::new(),
        body: None,
    })
}

#[tokio::test]
async fn response_becomes_ok_reply() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(vec![0u8, 1, 2, 0xff]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&server.uri())?.join("/stats")?;
    let connection = start_connection(StaticResolver(http_get(url)))?;

    let (reply, fds) = request(&connection.client, &Entity::new("STATS")).await?;
    assert!(reply.is_ok());
    assert_eq!(vec!["200".to_string()], reply.args);
    assert_eq!(
        Some(&"application/octet-stream".to_string()),
        reply.headers.get("content-type")
    );
    assert_eq!(Some(vec![0u8, 1, 2, 0xff]), reply.body);
    assert!(fds.is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_response_becomes_error_reply() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 2 * MAX_RESPONSE_BODY]))
        .mount(&server)
        .await;

    let connection = start_connection(StaticResolver(http_get(Url::parse(&server.uri())?)))?;

    let (reply, _) = request(&connection.client, &Entity::new("STATS")).await?;
    assert_eq!(
        Entity::error(Some(format!(
            "HTTP response body exceeds {MAX_RESPONSE_BODY} bytes"
        ))),
        reply
    );
    Ok(())
}
