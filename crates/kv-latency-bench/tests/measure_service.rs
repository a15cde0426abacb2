// Numan Thabit 2025
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::Result;
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};
use kv_latency_bench::{
    bench::write_report, run_benchmark, run_phase, BenchConfig, Console, HttpExecutor,
    MeasureExecutor, PhaseDescriptor, RequestError, RequestKind,
};
use tokio::net::TcpListener;
use url::Url;

#[derive(Default)]
struct FakeKv {
    put_ms: AtomicU64,
    seen: Mutex<Vec<(String, String)>>,
    /// 1-based read number that answers without a timing signal.
    blank_read: Option<usize>,
    reads: AtomicU64,
}

impl FakeKv {
    fn record(&self, route: &str, headers: &HeaderMap) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.seen.lock().expect("seen lock").push((route.to_string(), auth));
    }
}

async fn put(State(kv): State<Arc<FakeKv>>, headers: HeaderMap) -> impl IntoResponse {
    kv.record("put", &headers);
    let ms = kv.put_ms.fetch_add(10, Ordering::SeqCst) + 10;
    ([("X-KV-Write-Ms", ms.to_string())], "stored")
}

async fn read(State(kv): State<Arc<FakeKv>>, headers: HeaderMap) -> Html<String> {
    kv.record("get", &headers);
    let n = kv.reads.fetch_add(1, Ordering::SeqCst) as usize + 1;
    if kv.blank_read == Some(n) {
        return Html("<p>value missing</p>".to_string());
    }
    Html(format!("<html><body>Read timing is {} ms</body></html>", n % 4 + 1))
}

async fn moved(State(kv): State<Arc<FakeKv>>, headers: HeaderMap) -> Redirect {
    kv.record("moved", &headers);
    Redirect::permanent("/elsewhere")
}

async fn elsewhere(State(kv): State<Arc<FakeKv>>, headers: HeaderMap) -> impl IntoResponse {
    kv.record("elsewhere", &headers);
    ([("X-KV-Write-Ms", "5")], "stored elsewhere")
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "too late"
}

async fn spawn_service(router: Router) -> Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(Url::parse(&format!("http://{addr}/"))?)
}

fn kv_router(kv: Arc<FakeKv>) -> Router {
    Router::new()
        .route("/measure/put/", get(put))
        .route("/measure/get/", get(read))
        .with_state(kv)
}

fn buffer_console() -> Console<Vec<u8>, Vec<u8>> {
    Console {
        out: Vec::new(),
        diag: Vec::new(),
    }
}

fn config(base_url: Url, token_count: usize) -> BenchConfig {
    BenchConfig {
        base_url,
        token_count,
        output_json: None,
        dry_run: false,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn executor_returns_headers_and_body() -> Result<()> {
    let kv = Arc::new(FakeKv::default());
    let base = spawn_service(kv_router(kv.clone())).await?;
    let executor = HttpExecutor::new(&base)?;

    let raw = executor
        .execute(RequestKind::Write, "fake-token-00000")
        .await
        .expect("put succeeds");
    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(raw.to_ascii_lowercase().contains("x-kv-write-ms: 10\r\n"));
    assert!(raw.ends_with("\r\n\r\nstored"));
    assert_eq!(kv_latency_bench::parse_timing_ms(&raw), Some(10));

    let raw = executor
        .execute(RequestKind::Read, "fake-token-00000")
        .await
        .expect("get succeeds");
    assert_eq!(kv_latency_bench::parse_timing_ms(&raw), Some(2));

    let seen = kv.seen.lock().expect("seen lock").clone();
    assert_eq!(
        seen,
        [
            ("put".to_string(), "Bearer fake-token-00000".to_string()),
            ("get".to_string(), "Bearer fake-token-00000".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn redirects_are_not_followed() -> Result<()> {
    let kv = Arc::new(FakeKv::default());
    let router = Router::new()
        .route("/measure/put/", get(moved))
        .route("/elsewhere", get(elsewhere))
        .with_state(kv.clone());
    let base = spawn_service(router).await?;
    let executor = HttpExecutor::new(&base)?;

    let raw = executor
        .execute(RequestKind::Write, "t")
        .await
        .expect("redirect is returned as a response");
    assert!(raw.starts_with("HTTP/1.1 308 Permanent Redirect\r\n"));
    assert!(raw.to_ascii_lowercase().contains("location: /elsewhere\r\n"));
    assert_eq!(kv_latency_bench::parse_timing_ms(&raw), None);
    assert_eq!(kv.seen.lock().expect("seen lock").len(), 1);

    let phase = PhaseDescriptor {
        name: "redirected writes".into(),
        kind: RequestKind::Write,
        tokens: vec!["t".into(), "u".into()],
        token_label: None,
    };
    let mut console = buffer_console();
    let result = run_phase(&executor, &phase, &mut console).await;

    assert_eq!(result.failed, 2);
    assert_eq!(result.cumulative_ms, 0);
    let seen = kv.seen.lock().expect("seen lock").clone();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(route, _)| route == "moved"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn executor_reports_timeout() -> Result<()> {
    let router = Router::new().route("/measure/get/", get(slow));
    let base = spawn_service(router).await?;
    let executor = HttpExecutor::with_timeout(&base, Duration::from_millis(200))?;

    let err = executor
        .execute(RequestKind::Read, "fake-token-00000")
        .await
        .expect_err("slow endpoint must time out");
    assert_eq!(err, RequestError::Timeout);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn executor_reports_connection_failure() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let base = Url::parse(&format!("http://{addr}/"))?;
    let executor = HttpExecutor::new(&base)?;

    match executor.execute(RequestKind::Write, "fake-token-00000").await {
        Err(RequestError::Transport(cause)) => assert!(!cause.is_empty()),
        other => panic!("expected transport error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_run_against_local_service() -> Result<()> {
    let kv = Arc::new(FakeKv::default());
    let base = spawn_service(kv_router(kv.clone())).await?;
    let executor = HttpExecutor::new(&base)?;
    let mut console = buffer_console();

    let report = run_benchmark(&executor, &config(base, 3), &mut console).await;

    assert_eq!(report.exit_code(), 0);
    let put = report.results().next().expect("put phase");
    assert_eq!(put.cumulative_ms, 60);
    assert_eq!(put.failed, 0);
    assert_eq!(put.average_ms(), Some(20.0));

    let seen = kv.seen.lock().expect("seen lock").clone();
    assert_eq!(seen.len(), 9);
    let same_key: Vec<_> = seen[6..].iter().map(|(_, auth)| auth.as_str()).collect();
    assert_eq!(same_key, ["Bearer fake-token-00002"; 3]);

    let out = String::from_utf8(console.out)?;
    assert!(out.contains("  PUT  cumulative ms: 60  avg ms: 20.00  (failed: 0)"));
    assert!(out.contains("Failed: 0 token=fake-token-00002"));
    assert!(console.diag.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_timing_fails_the_run_and_is_reported() -> Result<()> {
    let kv = Arc::new(FakeKv {
        blank_read: Some(5),
        ..FakeKv::default()
    });
    let base = spawn_service(kv_router(kv)).await?;
    let executor = HttpExecutor::new(&base)?;
    let mut console = buffer_console();

    let report = run_benchmark(&executor, &config(base, 3), &mut console).await;

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.total_failed, 1);
    let failed: Vec<usize> = report.results().map(|r| r.failed).collect();
    assert_eq!(failed, [0, 0, 1]);
    // Missing timing counts as a failure but emits no transport diagnostic.
    assert!(console.diag.is_empty());

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("reports/run.json");
    write_report(&path, &report)?;
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(json["total_failed"], 1);
    assert_eq!(json["token_count"], 3);
    let phases = json["phases"].as_array().expect("phases array");
    assert_eq!(phases.len(), 3);
    assert_eq!(phases[0]["cumulative_ms"], 60);
    assert_eq!(phases[0]["average_ms"], 20.0);
    assert_eq!(phases[2]["failed"], 1);
    assert_eq!(phases[2]["token_label"], "fake-token-00002");
    Ok(())
}
