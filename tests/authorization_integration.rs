//! End-to-end behavior of the authorization service: cache hits, collapsed
//! concurrent loads, expiry, bounds, and the fallback contract.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_test::traced_test;

use authz_gate::{
    AuthorizationService, AuthzConfig, DecisionRequest, MockDecisionClient, Resource,
    SessionContext,
};

fn request(principal: &str, topic: &str) -> DecisionRequest {
    DecisionRequest::new(
        "Read",
        Resource::new("Topic", topic),
        SessionContext::new(principal).with_client_address("10.0.0.7"),
    )
}

/// Answer one HTTP request with a canned JSON body, then close.
async fn serve_once(listener: TcpListener, body: &'static str) {
    let (mut socket, _) = listener.accept().await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length: usize = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.shutdown().await.ok();
}

/// The documented default scenario: the first call blocks on one HTTP POST
/// and returns true; a second call within the TTL answers from the cache
/// with zero additional HTTP calls.
#[tokio::test]
async fn test_default_config_scenario_over_http() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    // the stub serves exactly one request; a second POST would fail and
    // surface as the fail-closed fallback
    tokio::spawn(serve_once(listener, r#"{"result": true}"#));

    let config = AuthzConfig {
        url: format!("http://{addr}"),
        ..Default::default()
    };
    let service = AuthorizationService::new(config)?;

    assert!(service.authorize(&request("alice", "payments")).await);
    assert!(service.authorize(&request("alice", "payments")).await);

    let stats = service.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.remote_errors, 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_remote_call() -> Result<()> {
    let client =
        Arc::new(MockDecisionClient::allowing(true).with_delay(Duration::from_millis(100)));
    let service = Arc::new(AuthorizationService::with_client(
        AuthzConfig::default(),
        client.clone(),
    )?);

    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.authorize(&request("alice", "payments")).await
        }));
    }

    for handle in handles {
        assert!(handle.await?);
    }
    assert_eq!(client.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_lookups_for_different_keys_do_not_serialize() -> Result<()> {
    let client =
        Arc::new(MockDecisionClient::allowing(true).with_delay(Duration::from_millis(150)));
    let service = Arc::new(AuthorizationService::with_client(
        AuthzConfig::default(),
        client.clone(),
    )?);

    let started = std::time::Instant::now();
    let mut handles = Vec::new();
    for topic in ["a", "b", "c", "d"] {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.authorize(&request("alice", topic)).await
        }));
    }
    for handle in handles {
        assert!(handle.await?);
    }

    // four distinct keys load concurrently, not back to back
    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(client.calls(), 4);
    Ok(())
}

#[tokio::test]
async fn test_expired_entry_triggers_one_new_call() -> Result<()> {
    let client = Arc::new(MockDecisionClient::allowing(true));
    let config = AuthzConfig {
        cache_expire_after_ms: 60,
        ..Default::default()
    };
    let service = AuthorizationService::with_client(config, client.clone())?;

    service.authorize(&request("alice", "payments")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    service.authorize(&request("alice", "payments")).await;

    assert_eq!(client.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_entry_count_never_exceeds_maximum_size() -> Result<()> {
    let client = Arc::new(MockDecisionClient::allowing(true));
    let config = AuthzConfig {
        cache_maximum_size: 5,
        ..Default::default()
    };
    let service = AuthorizationService::with_client(config, client.clone())?;

    for i in 0..6 {
        service.authorize(&request("alice", &format!("topic-{i}"))).await;
    }

    let stats = service.stats();
    assert!(stats.entries <= 5);
    assert_eq!(stats.evictions, 1);
    assert_eq!(client.calls(), 6);
    Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_fail_closed_denies_and_logs_loudly() -> Result<()> {
    let client = Arc::new(MockDecisionClient::allowing(true));
    client.set_failing(true);
    let service = AuthorizationService::with_client(AuthzConfig::default(), client.clone())?;

    assert!(!service.authorize(&request("alice", "payments")).await);
    assert!(logs_contain("policy service unavailable"));

    // the failure is not cached: a later successful call re-asks the service
    client.set_failing(false);
    assert!(service.authorize(&request("alice", "payments")).await);
    assert_eq!(client.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_fail_open_allows_when_remote_is_down() -> Result<()> {
    let client = Arc::new(MockDecisionClient::allowing(false));
    client.set_failing(true);
    let config = AuthzConfig {
        fail_open: true,
        ..Default::default()
    };
    let service = AuthorizationService::with_client(config, client.clone())?;

    assert!(service.authorize(&request("alice", "payments")).await);
    assert_eq!(service.stats().remote_errors, 1);
    Ok(())
}
