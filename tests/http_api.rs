//! End-to-end tests against the real router on an ephemeral port

use finrisk::api::ApiServer;
use finrisk::config::AppConfig;
use finrisk::db::sqlite::SqliteDb;
use finrisk::state::AppState;
use finrisk::worker::WorkerPoolHandle;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

const API_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

struct TestApp {
    base: String,
    client: reqwest::Client,
    server: ApiServer,
    workers: WorkerPoolHandle,
}

impl TestApp {
    async fn spawn(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::default();
        config.server.port = 0;
        config.queue.poll_interval = Duration::from_millis(20);
        config.rate_limit.max_requests = 10_000;
        config.bootstrap_api_key = Some(API_KEY.to_string());
        configure(&mut config);

        let sqlite = Arc::new(SqliteDb::open_in_memory().unwrap());
        let state = Arc::new(AppState::new(sqlite, config));
        state.ensure_api_key().unwrap();
        state.connect().await.unwrap();

        let workers = state.worker_pool().spawn();
        let mut server = ApiServer::new(state);
        let addr = server.start().await.unwrap();

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            server,
            workers,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn upload(&self, body: String) -> reqwest::Response {
        self.client
            .post(self.url("/api/uploadFinancialData"))
            .bearer_auth(API_KEY)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(API_KEY)
            .send()
            .await
            .unwrap()
    }

    async fn wait_for_empty_queue(&self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let stats: Value = self.get("/api/queue/stats").await.json().await.unwrap();
            if stats == json!({"waiting": 0, "active": 0, "exhausted": 0}) {
                return;
            }
            assert!(Instant::now() < deadline, "queue not drained: {}", stats);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn shutdown(self) {
        let TestApp {
            client,
            mut server,
            workers,
            ..
        } = self;
        drop(client);
        server.stop().await;
        workers.shutdown().await;
    }
}

fn record(company_id: &str) -> Value {
    json!({
        "company_id": company_id,
        "company_name": "TechCorp",
        "reporting_period": "2023-Q4",
        "industry_sector": "Technology",
        "total_assets": 5000000,
        "total_liabilities": 2000000,
        "revenue": 1500000,
        "net_profit": 300000,
        "cash_flow": 500000,
        "interest_coverage_ratio": 3.5
    })
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = TestApp::spawn(|_| {}).await;

    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queue"], true);

    app.shutdown().await;
}

#[tokio::test]
async fn test_missing_and_invalid_tokens() {
    let app = TestApp::spawn(|_| {}).await;

    let res = app
        .client
        .get(app.url("/api/getRiskAssessment"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"success": false, "message": "Token is missing"}));

    let res = app
        .client
        .get(app.url("/api/getRiskAssessment"))
        .bearer_auth("not-a-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Token is invalid");

    let res = app
        .client
        .get(app.url("/api/queue/stats"))
        .header("cookie", format!("token={}", API_KEY))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    app.shutdown().await;
}

#[tokio::test]
async fn test_upload_then_assess() {
    let app = TestApp::spawn(|_| {}).await;

    let mut broken = record("C9");
    broken["net_profit"] = Value::Null;
    let batch = json!([record("C1001"), broken, record("C1002")]);

    let res = app.upload(batch.to_string()).await;
    assert_eq!(res.status(), 200);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["message"], "Data enqueued successfully");
    assert_eq!(receipt["recordCount"], 3);
    assert!(receipt["jobId"].is_string());

    app.wait_for_empty_queue().await;

    let res = app.get("/api/getRiskAssessment?company_id=C1001").await;
    assert_eq!(res.status(), 200);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["currentPage"], 1);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["totalRecords"], 1);
    assert_eq!(page["data"][0]["company_id"], "C1001");
    assert_eq!(page["data"][0]["risk_score"], 70);

    let res = app.get("/api/getRiskAssessment?industry_sector=Technology&limit=1&page=2").await;
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["totalRecords"], 2);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["data"][0]["company_id"], "C1002");

    app.shutdown().await;
}

#[tokio::test]
async fn test_rejected_uploads() {
    let app = TestApp::spawn(|_| {}).await;

    let oversized = Value::Array((0..501).map(|i| record(&format!("C{}", i))).collect());
    let res = app.upload(oversized.to_string()).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Batch size exceeds the limit of 500 records.");

    let res = app.upload(record("C1").to_string()).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid data format. Expected an array.");

    let res = app.upload("[{".to_string()).await;
    assert_eq!(res.status(), 400);

    let stats: Value = app.get("/api/queue/stats").await.json().await.unwrap();
    assert_eq!(stats["waiting"], 0);

    let full = Value::Array((0..500).map(|i| record(&format!("C{}", i))).collect());
    assert_eq!(app.upload(full.to_string()).await.status(), 200);

    app.shutdown().await;
}

#[tokio::test]
async fn test_invalid_pagination() {
    let app = TestApp::spawn(|_| {}).await;

    let res = app.get("/api/getRiskAssessment?page=0").await;
    assert_eq!(res.status(), 400);
    let res = app.get("/api/getRiskAssessment?limit=abc").await;
    assert_eq!(res.status(), 400);

    app.shutdown().await;
}

#[tokio::test]
async fn test_unknown_job_and_route() {
    let app = TestApp::spawn(|_| {}).await;

    assert_eq!(app.get("/api/jobs/does-not-exist").await.status(), 404);

    let res = app
        .client
        .post(app.url("/api/jobs/does-not-exist/retry"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let exhausted: Value = app.get("/api/queue/exhausted").await.json().await.unwrap();
    assert_eq!(exhausted, json!([]));

    let res = app.client.get(app.url("/nope")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    app.shutdown().await;
}

#[tokio::test]
async fn test_rate_limit() {
    let app = TestApp::spawn(|config| config.rate_limit.max_requests = 3).await;

    for _ in 0..3 {
        let res = app.get("/api/queue/stats").await;
        assert_eq!(res.status(), 200);
        assert!(res.headers().contains_key("ratelimit-remaining"));
    }

    let res = app.get("/api/queue/stats").await;
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Too many requests, please try again later.");

    app.shutdown().await;
}

#[tokio::test]
async fn test_auth_can_be_disabled() {
    let app = TestApp::spawn(|config| config.server.auth_required = false).await;

    let res = app
        .client
        .get(app.url("/api/queue/stats"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    app.shutdown().await;
}
