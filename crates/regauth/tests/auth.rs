use std::collections::VecDeque;
use std::sync::Arc;

use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{Response as HttpResponse, StatusCode, Uri};
use regauth::token::TokenOptions;
use regauth::{
    Auth, AuthError, BasicFactory, BearerFactory, Credentials, HttpClient, StaticCredentials,
};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MockClient {
    // Queue of HTTP responses to pop for each send_http call
    queue: Arc<Mutex<VecDeque<HttpResponse<Vec<u8>>>>>,
    // Capture requests for assertions
    log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
}

impl MockClient {
    async fn push(&self, resp: HttpResponse<Vec<u8>>) {
        self.queue.lock().await.push_back(resp);
    }
    async fn take_log(&self) -> Vec<http::Request<Vec<u8>>> {
        std::mem::take(&mut *self.log.lock().await)
    }
}

impl HttpClient for MockClient {
    type Error = std::convert::Infallible;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl core::future::Future<
        Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
    > + Send {
        let log = self.log.clone();
        let queue = self.queue.clone();
        async move {
            log.lock().await.push(request);
            Ok(queue.lock().await.pop_front().expect("no queued response"))
        }
    }
}

const REGISTRY: &str = "https://registry.example.com/v2/library/alpine/manifests/latest";
const BEARER_PULL: &str = r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:library/alpine:pull""#;

fn uri(s: &str) -> Uri {
    s.parse().unwrap()
}

fn unauthorized(challenges: &[&str]) -> HttpResponse<Vec<u8>> {
    let mut builder = HttpResponse::builder().status(StatusCode::UNAUTHORIZED);
    for challenge in challenges {
        builder = builder.header(WWW_AUTHENTICATE, *challenge);
    }
    builder.body(Vec::new()).unwrap()
}

fn token_ok(body: serde_json::Value) -> HttpResponse<Vec<u8>> {
    HttpResponse::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(serde_json::to_vec(&body).unwrap())
        .unwrap()
}

fn get(s: &str) -> http::Request<Vec<u8>> {
    http::Request::get(s).body(Vec::new()).unwrap()
}

fn alice() -> StaticCredentials {
    StaticCredentials::new().with_host("registry.example.com", Credentials::new("alice", "wonderland"))
}

#[tokio::test]
async fn non_401_is_unsupported() {
    let auth = Auth::new(MockClient::default());
    let ok = HttpResponse::builder()
        .status(StatusCode::OK)
        .header(WWW_AUTHENTICATE, r#"Basic realm="x""#)
        .body(Vec::<u8>::new())
        .unwrap();
    let err = auth.handle_response(&uri(REGISTRY), &ok).await.unwrap_err();
    assert!(matches!(err, AuthError::Unsupported));
    assert!(!auth.has_handler("registry.example.com", "basic").await);
}

#[tokio::test]
async fn relative_uri_is_unsupported() {
    let auth = Auth::new(MockClient::default());
    let err = auth
        .handle_response(&uri("/v2/"), &unauthorized(&[r#"Basic realm="x""#]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unsupported));
}

#[tokio::test]
async fn basic_challenge_then_header() {
    let auth = Auth::builder(MockClient::default())
        .credentials(alice())
        .build();
    let resp = unauthorized(&[r#"Basic realm="Registry Realm""#]);

    auth.handle_response(&uri(REGISTRY), &resp).await.unwrap();
    assert!(auth.has_handler("registry.example.com", "Basic").await);

    let mut req = get(REGISTRY);
    assert!(auth.update_request(&mut req).await);
    assert_eq!(
        req.headers().get(AUTHORIZATION).unwrap(),
        "Basic YWxpY2U6d29uZGVybGFuZA=="
    );

    // the same challenge again teaches nothing
    let err = auth.handle_response(&uri(REGISTRY), &resp).await.unwrap_err();
    assert!(matches!(err, AuthError::NoNewChallenge));
}

#[tokio::test]
async fn credentials_are_looked_up_once_per_handler() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let provider = {
        let calls = calls.clone();
        let seen = seen.clone();
        move |host: &str| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            seen.lock().unwrap().push(host.to_string());
            ("bob".to_string(), "builder".to_string())
        }
    };
    let auth = Auth::builder(MockClient::default())
        .credentials(provider)
        .build();
    let local = "http://localhost:5000/v2/";

    auth.handle_response(&uri(local), &unauthorized(&[r#"Basic realm="a""#]))
        .await
        .unwrap();
    auth.handle_response(&uri(local), &unauthorized(&[r#"Basic realm="b""#]))
        .await
        .unwrap();

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec!["localhost:5000".to_string()]);
}

#[tokio::test]
async fn unknown_schemes_are_skipped() {
    let auth = Auth::builder(MockClient::default())
        .credentials(alice())
        .build();

    // only bearer is offered, and bearer is not registered by default
    let err = auth
        .handle_response(&uri(REGISTRY), &unauthorized(&[BEARER_PULL]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoNewChallenge));
    assert!(!auth.has_handler("registry.example.com", "bearer").await);

    // an unknown scheme alongside a known one is fine
    auth.handle_response(
        &uri(REGISTRY),
        &unauthorized(&[r#"Negotiate Basic realm="r""#]),
    )
    .await
    .unwrap();
    assert!(auth.has_handler("registry.example.com", "basic").await);
}

#[tokio::test]
async fn parse_failure_propagates() {
    let auth = Auth::new(MockClient::default());
    let err = auth
        .handle_response(
            &uri(REGISTRY),
            &unauthorized(&[r#"Basic realm="ok""#, "Basic realm=bad;value"]),
        )
        .await
        .unwrap_err();
    let AuthError::Parse(parse) = &err else {
        panic!("expected parse failure, got {err:?}");
    };
    assert_eq!(parse.header(), "Basic realm=bad;value");
    // nothing is learned from a batch that does not parse
    assert!(!auth.has_handler("registry.example.com", "basic").await);
}

#[tokio::test]
async fn handler_error_aborts_but_keeps_earlier_state() {
    let auth = Auth::builder(MockClient::default())
        .credentials(alice())
        .build();
    let err = auth
        .handle_response(
            &uri(REGISTRY),
            &unauthorized(&[r#"Basic realm="first""#, r#"Basic charset="UTF-8""#]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidChallenge(_)));

    // the first challenge was already folded in
    let mut req = get(REGISTRY);
    assert!(auth.update_request(&mut req).await);
    let err = auth
        .handle_response(&uri(REGISTRY), &unauthorized(&[r#"Basic realm="first""#]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoNewChallenge));
}

#[tokio::test]
async fn unknown_host_is_left_alone() {
    let auth = Auth::builder(MockClient::default())
        .credentials(alice())
        .build();
    auth.handle_response(&uri(REGISTRY), &unauthorized(&[r#"Basic realm="r""#]))
        .await
        .unwrap();

    for other in ["https://other.example.com/v2/", "https://registry.example.com:8443/v2/"] {
        let mut req = get(other);
        assert!(!auth.update_request(&mut req).await);
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }
}

#[tokio::test]
async fn anonymous_basic_adds_nothing() {
    let auth = Auth::new(MockClient::default());
    auth.handle_response(&uri(REGISTRY), &unauthorized(&[r#"Basic realm="r""#]))
        .await
        .unwrap();
    let mut req = get(REGISTRY);
    assert!(!auth.update_request(&mut req).await);
    assert!(req.headers().get(AUTHORIZATION).is_none());
}

#[tokio::test]
async fn bearer_token_exchange_and_cache() {
    let client = MockClient::default();
    let auth = Auth::builder(client.clone())
        .credentials(alice())
        .handler("bearer", BearerFactory::new())
        .build();

    auth.handle_response(&uri(REGISTRY), &unauthorized(&[BEARER_PULL]))
        .await
        .unwrap();
    let err = auth
        .handle_response(&uri(REGISTRY), &unauthorized(&[BEARER_PULL]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoNewChallenge));

    client
        .push(token_ok(serde_json::json!({ "token": "tok1", "expires_in": 300 })))
        .await;

    for _ in 0..2 {
        let mut req = get(REGISTRY);
        assert!(auth.update_request(&mut req).await);
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer tok1");
    }

    // one token request, reused for the second call
    let log = client.take_log().await;
    assert_eq!(log.len(), 1);
    let token_req = &log[0];
    assert_eq!(token_req.uri().host(), Some("auth.example.com"));
    assert_eq!(token_req.uri().path(), "/token");
    assert_eq!(
        token_req.uri().query(),
        Some("service=registry.example.com&scope=repository%3Alibrary%2Falpine%3Apull")
    );
    assert_eq!(
        token_req.headers().get(AUTHORIZATION).unwrap(),
        "Basic YWxpY2U6d29uZGVybGFuZA=="
    );
}

#[tokio::test]
async fn new_scope_refreshes_token() {
    let client = MockClient::default();
    let auth = Auth::builder(client.clone())
        .handler("bearer", BearerFactory::new())
        .build();

    auth.handle_response(&uri(REGISTRY), &unauthorized(&[BEARER_PULL]))
        .await
        .unwrap();
    client
        .push(token_ok(serde_json::json!({ "token": "pull-only" })))
        .await;
    let mut req = get(REGISTRY);
    auth.update_request(&mut req).await;
    assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer pull-only");

    auth.handle_response(
        &uri(REGISTRY),
        &unauthorized(&[
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:library/alpine:pull,push""#,
        ]),
    )
    .await
    .unwrap();
    client
        .push(token_ok(serde_json::json!({ "access_token": "pull-push" })))
        .await;
    let mut req = get(REGISTRY);
    auth.update_request(&mut req).await;
    assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer pull-push");

    let log = client.take_log().await;
    assert_eq!(log.len(), 2);
    // anonymous token requests carry no credentials
    assert!(log.iter().all(|r| r.headers().get(AUTHORIZATION).is_none()));
    let url = url::Url::parse(&log[1].uri().to_string()).unwrap();
    let scopes: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| k == "scope")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(
        scopes,
        ["repository:library/alpine:pull", "repository:library/alpine:pull,push"]
    );
}

#[tokio::test]
async fn expired_token_is_refetched() {
    let client = MockClient::default();
    let options = TokenOptions::new()
        .leeway(chrono::Duration::zero())
        .build();
    let auth = Auth::builder(client.clone())
        .handler("bearer", BearerFactory::with_options(options))
        .build();
    auth.handle_response(&uri(REGISTRY), &unauthorized(&[BEARER_PULL]))
        .await
        .unwrap();

    client
        .push(token_ok(serde_json::json!({ "token": "short", "expires_in": 0 })))
        .await;
    client
        .push(token_ok(serde_json::json!({ "token": "next", "expires_in": 0 })))
        .await;

    let mut first = get(REGISTRY);
    auth.update_request(&mut first).await;
    let mut second = get(REGISTRY);
    auth.update_request(&mut second).await;

    assert_eq!(first.headers().get(AUTHORIZATION).unwrap(), "Bearer short");
    assert_eq!(second.headers().get(AUTHORIZATION).unwrap(), "Bearer next");
    assert_eq!(client.take_log().await.len(), 2);
}

#[tokio::test]
async fn priority_follows_registration_order() {
    let client = MockClient::default();
    let auth = Auth::builder(client.clone())
        .credentials(alice())
        .handler("bearer", BearerFactory::new())
        .handler("basic", BasicFactory)
        .build();
    assert_eq!(auth.schemes(), ["bearer", "basic"]);

    // both schemes offered in separate header lines
    auth.handle_response(
        &uri(REGISTRY),
        &unauthorized(&[r#"Basic realm="r""#, BEARER_PULL]),
    )
    .await
    .unwrap();

    client
        .push(token_ok(serde_json::json!({ "token": "preferred" })))
        .await;
    let mut req = get(REGISTRY);
    assert!(auth.update_request(&mut req).await);
    assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer preferred");
}

#[tokio::test]
async fn failed_exchange_falls_back_to_next_scheme() {
    let client = MockClient::default();
    let auth = Auth::builder(client.clone())
        .credentials(alice())
        .handler("bearer", BearerFactory::new())
        .handler("basic", BasicFactory)
        .build();
    auth.handle_response(
        &uri(REGISTRY),
        &unauthorized(&[BEARER_PULL, r#"Basic realm="r""#]),
    )
    .await
    .unwrap();

    client
        .push(
            HttpResponse::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Vec::new())
                .unwrap(),
        )
        .await;
    let mut req = get(REGISTRY);
    assert!(auth.update_request(&mut req).await);
    assert_eq!(
        req.headers().get(AUTHORIZATION).unwrap(),
        "Basic YWxpY2U6d29uZGVybGFuZA=="
    );

    // a token response without a token is a failure too
    client.push(token_ok(serde_json::json!({ "expires_in": 60 }))).await;
    let mut req = get(REGISTRY);
    assert!(auth.update_request(&mut req).await);
    assert!(
        req.headers()
            .get(AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("Basic ")
    );

    // an expiry beyond what a timestamp can hold is a failure, not a crash
    for expires_in in [i64::MAX, 100_000_000_000_000] {
        client
            .push(token_ok(serde_json::json!({ "token": "t", "expires_in": expires_in })))
            .await;
        let mut req = get(REGISTRY);
        assert!(auth.update_request(&mut req).await);
        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap(),
            "Basic YWxpY2U6d29uZGVybGFuZA=="
        );
    }
}

#[tokio::test]
async fn bearer_realm_conflict_is_invalid() {
    let auth = Auth::builder(MockClient::default())
        .handler("bearer", BearerFactory::new())
        .build();
    auth.handle_response(&uri(REGISTRY), &unauthorized(&[BEARER_PULL]))
        .await
        .unwrap();
    let err = auth
        .handle_response(
            &uri(REGISTRY),
            &unauthorized(&[
                r#"Bearer realm="https://evil.example.com/token",service="registry.example.com",scope="repository:x:pull""#,
            ]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidChallenge(_)));
}
