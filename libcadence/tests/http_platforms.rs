//! HTTP publisher and generator tests against a local canned-response server
//!
//! The server answers each incoming request with the next queued response
//! and records the request line, headers and body for inspection.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use libcadence::config::{GeneratorConfig, GraphConfig, LinkedinConfig};
use libcadence::error::{GenerationError, PlatformError};
use libcadence::generator::{ChatCompletionGenerator, ContentGenerator};
use libcadence::platforms::instagram::InstagramPlatform;
use libcadence::platforms::linkedin::LinkedinPlatform;
use libcadence::platforms::threads::ThreadsPlatform;
use libcadence::platforms::Platform;
use libcadence::types::Credentials;
use reqwest::Client;
use secrecy::SecretString;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl RecordedRequest {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

struct CannedResponse {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
}

fn respond(status: u16, body: &str) -> CannedResponse {
    CannedResponse {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    async fn start(responses: Vec<CannedResponse>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                if let Some(request) = read_request(&mut stream).await {
                    recorded.lock().unwrap().push(request);
                }
                let _ = write_response(&mut stream, &response).await;
            }
        });

        Ok(Self { base_url, requests })
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let body = String::from_utf8_lossy(&buffer[header_end..]).to_string();
    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

async fn write_response(stream: &mut TcpStream, response: &CannedResponse) -> std::io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(response.body.as_bytes()).await?;
    stream.shutdown().await
}

fn graph_config(base_url: &str, version: &str, settle_delay_secs: u64) -> GraphConfig {
    GraphConfig {
        base_url: base_url.to_string(),
        api_version: version.to_string(),
        settle_delay_secs,
        image_url: None,
    }
}

fn threads_credentials() -> Credentials {
    let mut credentials = Credentials::empty("alice");
    credentials.threads_app_id = Some("1789".to_string());
    credentials.threads_access_token = Some(SecretString::from("threads-token".to_string()));
    credentials
}

fn instagram_credentials() -> Credentials {
    let mut credentials = Credentials::empty("alice");
    credentials.instagram_user_id = Some("4242".to_string());
    credentials.instagram_access_token = Some(SecretString::from("ig-token".to_string()));
    credentials
}

fn linkedin_credentials() -> Credentials {
    let mut credentials = Credentials::empty("alice");
    credentials.linkedin_access_token = Some(SecretString::from("li-token".to_string()));
    credentials
}

#[tokio::test]
async fn test_threads_two_phase_publish() -> Result<()> {
    let server = CannedServer::start(vec![
        respond(200, r#"{"id":"container-1"}"#),
        respond(200, r#"{"id":"post-99"}"#),
    ])
    .await?;
    let platform = ThreadsPlatform::new(Client::new(), graph_config(&server.base_url, "v1.0", 0));

    let post_id = platform
        .publish("Hello #world", &threads_credentials())
        .await?;

    assert_eq!(post_id, "post-99");
    let requests = server.requests();
    assert_eq!(requests.len(), 2);

    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v1.0/1789/threads");
    let create = requests[0].json();
    assert_eq!(create["media_type"], "TEXT");
    assert_eq!(create["text"], "Hello #world");
    assert_eq!(create["access_token"], "threads-token");

    assert_eq!(requests[1].path, "/v1.0/1789/threads_publish");
    let publish = requests[1].json();
    assert_eq!(publish["creation_id"], "container-1");
    assert_eq!(publish["access_token"], "threads-token");
    Ok(())
}

#[tokio::test]
async fn test_threads_waits_settle_delay_between_phases() -> Result<()> {
    let server = CannedServer::start(vec![
        respond(200, r#"{"id":"container-1"}"#),
        respond(200, r#"{"id":"post-1"}"#),
    ])
    .await?;
    let platform = ThreadsPlatform::new(Client::new(), graph_config(&server.base_url, "v1.0", 1));

    let started = Instant::now();
    platform.publish("text", &threads_credentials()).await?;

    assert!(started.elapsed() >= Duration::from_millis(950));
    Ok(())
}

#[tokio::test]
async fn test_threads_container_failure_is_terminal() -> Result<()> {
    let server = CannedServer::start(vec![respond(
        400,
        r#"{"error":{"message":"Invalid OAuth access token"}}"#,
    )])
    .await?;
    let platform = ThreadsPlatform::new(Client::new(), graph_config(&server.base_url, "v1.0", 0));

    let err = platform
        .publish("text", &threads_credentials())
        .await
        .unwrap_err();

    match err {
        PlatformError::Api {
            phase,
            status,
            body,
        } => {
            assert_eq!(phase, "Threads container creation");
            assert_eq!(status, 400);
            assert!(body.contains("Invalid OAuth access token"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
    assert_eq!(server.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_threads_publish_failure_reports_publish_phase() -> Result<()> {
    let server = CannedServer::start(vec![
        respond(200, r#"{"id":"container-1"}"#),
        respond(500, "backend exploded"),
    ])
    .await?;
    let platform = ThreadsPlatform::new(Client::new(), graph_config(&server.base_url, "v1.0", 0));

    let err = platform
        .publish("text", &threads_credentials())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    assert!(err.to_string().starts_with("Threads publish returned HTTP 500"));
    Ok(())
}

#[tokio::test]
async fn test_threads_success_without_id_is_invalid_response() -> Result<()> {
    let server = CannedServer::start(vec![respond(200, r#"{"ok":true}"#)]).await?;
    let platform = ThreadsPlatform::new(Client::new(), graph_config(&server.base_url, "v1.0", 0));

    let err = platform
        .publish("text", &threads_credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::InvalidResponse(_)));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() -> Result<()> {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let platform = ThreadsPlatform::new(Client::new(), graph_config(&base_url, "v1.0", 0));
    let err = platform
        .publish("text", &threads_credentials())
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::Network(_)));
    Ok(())
}

#[tokio::test]
async fn test_instagram_uses_media_edges_and_caption() -> Result<()> {
    let server = CannedServer::start(vec![
        respond(200, r#"{"id":"ig-container"}"#),
        respond(200, r#"{"id":"ig-post"}"#),
    ])
    .await?;
    let mut config = graph_config(&server.base_url, "v21.0", 0);
    config.image_url = Some("https://example.com/card.png".to_string());
    let platform = InstagramPlatform::new(Client::new(), config);

    let post_id = platform
        .publish("Caption text", &instagram_credentials())
        .await?;

    assert_eq!(post_id, "ig-post");
    let requests = server.requests();
    assert_eq!(requests[0].path, "/v21.0/4242/media");
    let create = requests[0].json();
    assert_eq!(create["caption"], "Caption text");
    assert_eq!(create["image_url"], "https://example.com/card.png");
    assert_eq!(create["access_token"], "ig-token");

    assert_eq!(requests[1].path, "/v21.0/4242/media_publish");
    assert_eq!(requests[1].json()["creation_id"], "ig-container");
    Ok(())
}

#[tokio::test]
async fn test_linkedin_resolves_author_then_shares() -> Result<()> {
    let server = CannedServer::start(vec![
        respond(200, r#"{"sub":"abc123","name":"Alice"}"#),
        respond(201, r#"{"id":"urn:li:share:777"}"#),
    ])
    .await?;
    let platform = LinkedinPlatform::new(
        Client::new(),
        LinkedinConfig {
            base_url: server.base_url.clone(),
        },
    );

    let post_id = platform
        .publish("Professional update", &linkedin_credentials())
        .await?;

    assert_eq!(post_id, "urn:li:share:777");
    let requests = server.requests();

    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/v2/userinfo");
    assert_eq!(requests[0].header("authorization"), Some("Bearer li-token"));

    assert_eq!(requests[1].path, "/v2/ugcPosts");
    assert_eq!(requests[1].header("x-restli-protocol-version"), Some("2.0.0"));
    let share = requests[1].json();
    assert_eq!(share["author"], "urn:li:person:abc123");
    assert_eq!(
        share["specificContent"]["com.linkedin.ugc.ShareContent"]["shareCommentary"]["text"],
        "Professional update"
    );
    Ok(())
}

#[tokio::test]
async fn test_linkedin_falls_back_to_restli_header() -> Result<()> {
    let server = CannedServer::start(vec![
        respond(200, r#"{"sub":"abc123"}"#),
        CannedResponse {
            status: 201,
            headers: vec![("x-restli-id", "urn:li:share:888")],
            body: String::new(),
        },
    ])
    .await?;
    let platform = LinkedinPlatform::new(
        Client::new(),
        LinkedinConfig {
            base_url: server.base_url.clone(),
        },
    );

    let post_id = platform
        .publish("text", &linkedin_credentials())
        .await?;

    assert_eq!(post_id, "urn:li:share:888");
    Ok(())
}

#[tokio::test]
async fn test_linkedin_expired_token_fails_at_userinfo() -> Result<()> {
    let server = CannedServer::start(vec![respond(401, r#"{"message":"Expired token"}"#)]).await?;
    let platform = LinkedinPlatform::new(
        Client::new(),
        LinkedinConfig {
            base_url: server.base_url.clone(),
        },
    );

    let err = platform
        .publish("text", &linkedin_credentials())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert!(err.to_string().contains("LinkedIn profile lookup"));
    assert_eq!(server.requests().len(), 1);
    Ok(())
}

fn generator_config(base_url: &str) -> GeneratorConfig {
    GeneratorConfig {
        endpoint: format!("{}/v1/chat/completions", base_url),
        model: "test-model".to_string(),
        api_key_env: "CADENCE_TEST_GENERATOR_KEY".to_string(),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_generator_sends_prompts_and_trims_reply() -> Result<()> {
    let server = CannedServer::start(vec![respond(
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"  ¡Hola mundo! #saludos \n"}}]}"#,
    )])
    .await?;
    let generator = ChatCompletionGenerator::with_api_key(
        &generator_config(&server.base_url),
        Some(SecretString::from("gen-key".to_string())),
    )?;

    let text = generator.generate("Say hello", Some("es")).await?;

    assert_eq!(text, "¡Hola mundo! #saludos");
    let requests = server.requests();
    assert_eq!(requests[0].path, "/v1/chat/completions");
    assert_eq!(requests[0].header("authorization"), Some("Bearer gen-key"));

    let body = requests[0].json();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("Written in es"));
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "Say hello");
    Ok(())
}

#[tokio::test]
async fn test_generator_non_success_is_error() -> Result<()> {
    let server = CannedServer::start(vec![respond(429, r#"{"error":"rate limited"}"#)]).await?;
    let generator = ChatCompletionGenerator::with_api_key(
        &generator_config(&server.base_url),
        Some(SecretString::from("gen-key".to_string())),
    )?;

    let err = generator.generate("Say hello", None).await.unwrap_err();

    assert_eq!(
        err,
        GenerationError::Api {
            status: 429,
            body: r#"{"error":"rate limited"}"#.to_string(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_generator_empty_completion_is_error() -> Result<()> {
    let server = CannedServer::start(vec![respond(
        200,
        r#"{"choices":[{"message":{"content":"   "}}]}"#,
    )])
    .await?;
    let generator = ChatCompletionGenerator::with_api_key(
        &generator_config(&server.base_url),
        Some(SecretString::from("gen-key".to_string())),
    )?;

    let err = generator.generate("Say hello", None).await.unwrap_err();

    assert_eq!(err, GenerationError::EmptyResponse);
    Ok(())
}
