//! End-to-end tests: the real router served on an ephemeral port over a
//! seeded in-memory store, driven with `reqwest`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use ocular_sensor_api::store::StoreResult;
use ocular_sensor_api::{
    router, DataPatch, DataRecord, MemoryStore, NewDataRecord, SharedStore, Store, TimeFilter,
    User, UserPatch,
};

struct TestApp {
    base: String,
    client: Client,
    store: MemoryStore,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let resp = self.client.get(self.url(path)).send().await?;
        Ok((resp.status(), resp.json().await?))
    }

    async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let resp = self.client.post(self.url(path)).json(&body).send().await?;
        Ok((resp.status(), resp.json().await?))
    }

    async fn put(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let resp = self.client.put(self.url(path)).json(&body).send().await?;
        Ok((resp.status(), resp.json().await?))
    }

    async fn delete(&self, path: &str) -> Result<(StatusCode, Value)> {
        let resp = self.client.delete(self.url(path)).send().await?;
        Ok((resp.status(), resp.json().await?))
    }
}

async fn spawn_app() -> Result<TestApp> {
    // ---
    let store = MemoryStore::new();
    store
        .insert_user(User {
            user_id: 1,
            email: "test_user@example.com".into(),
            password: "test123".into(),
        })
        .await?;
    store
        .insert_user(User {
            user_id: 2,
            email: "other@example.com".into(),
            password: "hunter2".into(),
        })
        .await?;

    let base = serve(Arc::new(store.clone())).await?;

    Ok(TestApp {
        base,
        client: Client::new(),
        store,
    })
}

/// Serve the router over `store` on an ephemeral port and return its base URL.
async fn serve(store: SharedStore) -> Result<String> {
    let app = router(store);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(format!("http://{addr}"))
}

/// Reports a fixed, out-of-date maximum id, as a concurrent insert would see
/// it; everything else goes to the wrapped store.
struct StaleMaxId {
    inner: MemoryStore,
    stale_max: i64,
}

#[async_trait]
impl Store for StaleMaxId {
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        self.inner.find_user_by_credentials(email, password).await
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn update_user(&self, user_id: i64, patch: &UserPatch) -> StoreResult<Option<User>> {
        self.inner.update_user(user_id, patch).await
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<()> {
        self.inner.delete_user(user_id).await
    }

    async fn max_data_id(&self) -> StoreResult<Option<i64>> {
        Ok(Some(self.stale_max))
    }

    async fn insert_data(&self, record: &NewDataRecord) -> StoreResult<Vec<DataRecord>> {
        self.inner.insert_data(record).await
    }

    async fn data_for_client(
        &self,
        client_id: i64,
        filter: &TimeFilter,
    ) -> StoreResult<Vec<DataRecord>> {
        self.inner.data_for_client(client_id, filter).await
    }

    async fn find_data(&self, id: i64) -> StoreResult<Option<DataRecord>> {
        self.inner.find_data(id).await
    }

    async fn update_data(&self, id: i64, patch: &DataPatch) -> StoreResult<Option<DataRecord>> {
        self.inner.update_data(id, patch).await
    }

    async fn delete_data(&self, id: i64) -> StoreResult<()> {
        self.inner.delete_data(id).await
    }
}

fn record(id: i64, client_id: i64, created_at: DateTime<Utc>) -> DataRecord {
    DataRecord {
        id,
        client_id,
        avg_blink_rate: 15.0,
        avg_temp: 36.0,
        left_eye_redness: 5.0,
        right_eye_redness: 4.0,
        created_at,
    }
}

fn sensor_body() -> Value {
    json!({
        "client_id": 1,
        "avg_blink_rate": 15,
        "avg_temp": 36,
        "left_eye_redness": 5,
        "right_eye_redness": 4
    })
}

fn ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["id"].as_i64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_reports_healthy() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let (status, body) = app.get("/health").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["message"], "API is running");
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn login_succeeds_without_echoing_password() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let (status, body) = app
        .post(
            "/login",
            json!({"email": "test_user@example.com", "password": "test123"}),
        )
        .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user_id"], 1);
    assert_eq!(body["email"], "test_user@example.com");
    assert!(body.get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn login_failure_does_not_reveal_which_field() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    let (wrong_pw_status, wrong_pw) = app
        .post(
            "/login",
            json!({"email": "test_user@example.com", "password": "nope"}),
        )
        .await?;
    let (wrong_email_status, wrong_email) = app
        .post(
            "/login",
            json!({"email": "nobody@example.com", "password": "test123"}),
        )
        .await?;

    assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_email_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw, wrong_email);
    assert_eq!(wrong_pw["error"], "Invalid credentials");
    Ok(())
}

#[tokio::test]
async fn login_requires_email_and_password() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let (status, body) = app
        .post("/login", json!({"email": "test_user@example.com"}))
        .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("password"));

    // Credentials are compared exactly
    let (status, _) = app
        .post(
            "/login",
            json!({"email": "TEST_USER@example.com", "password": "test123"}),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn insert_assigns_next_id() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    let (status, body) = app.post("/data", sensor_body()).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Data inserted successfully");
    assert_eq!(ids(&body), vec![1]);
    assert_eq!(body["data"][0]["client_id"], 1);
    assert!(body["data"][0]["created_at"].is_string());

    let (_, body) = app.post("/data", sensor_body()).await?;
    assert_eq!(ids(&body), vec![2]);

    app.store.insert_record(record(40, 2, Utc::now())).await?;
    let (_, body) = app.post("/data", sensor_body()).await?;
    assert_eq!(ids(&body), vec![41]);
    Ok(())
}

#[tokio::test]
async fn insert_names_first_missing_field() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    for field in [
        "client_id",
        "avg_blink_rate",
        "avg_temp",
        "left_eye_redness",
        "right_eye_redness",
    ] {
        let mut body = sensor_body();
        if let Some(o) = body.as_object_mut() {
            o.remove(field);
        }

        let (status, resp) = app.post("/data", body).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], format!("Missing required field: {field}"));
    }

    let mut body = sensor_body();
    if let Some(o) = body.as_object_mut() {
        o.remove("avg_temp");
        o.remove("left_eye_redness");
    }
    let (_, resp) = app.post("/data", body).await?;
    assert_eq!(resp["error"], "Missing required field: avg_temp");

    // Nothing was written
    let (_, resp) = app.get("/data/1").await?;
    assert_eq!(resp["count"], 0);
    Ok(())
}

#[tokio::test]
async fn named_ranges_filter_by_age() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let now = Utc::now();
    for seed in [
        record(1, 1, now - Duration::hours(2)),
        record(2, 1, now - Duration::days(3)),
        record(3, 1, now - Duration::days(10)),
        record(4, 1, now - Duration::days(40)),
        record(5, 2, now - Duration::hours(1)),
    ] {
        app.store.insert_record(seed).await?;
    }

    let (status, body) = app.get("/data/1?range=day").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client_id"], 1);
    assert_eq!(body["count"], 1);
    assert_eq!(ids(&body), vec![1]);

    let (_, body) = app.get("/data/1?range=week").await?;
    assert_eq!(ids(&body), vec![1, 2]);

    let (_, body) = app.get("/data/1?range=month").await?;
    assert_eq!(ids(&body), vec![1, 2, 3]);

    let (_, body) = app.get("/data/1?range=all").await?;
    assert_eq!(ids(&body), vec![1, 2, 3, 4]);
    assert_eq!(body["count"], 4);

    let (_, body) = app.get("/data/1").await?;
    assert_eq!(ids(&body), vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn explicit_dates_override_range() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let mid_jan = Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap();
    let early_feb = Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap();
    app.store.insert_record(record(1, 1, mid_jan)).await?;
    app.store.insert_record(record(2, 1, early_feb)).await?;

    let (_, body) = app.get("/data/1?range=day").await?;
    assert_eq!(body["count"], 0);

    let (status, body) = app
        .get("/data/1?range=day&start_date=2025-01-01&end_date=2025-01-31")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1]);

    // The range is not even validated once both dates are given
    let (status, _) = app
        .get("/data/1?range=bogus&start_date=2025-01-01&end_date=2025-01-31")
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn bad_range_and_partial_dates() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    app.store
        .insert_record(record(1, 1, Utc::now() - Duration::days(90)))
        .await?;

    let (status, body) = app.get("/data/1?range=bogus").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("Invalid range"));

    // A lone start_date is ignored and the default range "all" applies
    let (status, body) = app.get("/data/1?start_date=2099-01-01").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1]);
    Ok(())
}

#[tokio::test]
async fn user_crud_never_exposes_password() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    let (status, body) = app.get("/users/1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "test_user@example.com");
    assert!(body["user"].get("password").is_none());

    let (status, body) = app
        .put("/users/1", json!({"email": "renamed@example.com", "user_id": 77}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User updated successfully");
    assert_eq!(body["user"]["user_id"], 1);
    assert_eq!(body["user"]["email"], "renamed@example.com");
    assert!(body["user"].get("password").is_none());

    let (status, _) = app
        .put("/users/1", json!({"password": "changed"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(
            "/login",
            json!({"email": "renamed@example.com", "password": "changed"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn user_update_rejects_empty_patch() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    let (status, body) = app.put("/users/1", json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No valid fields to update");

    let (status, _) = app.put("/users/1", json!({"role": "admin"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Existence is checked before the patch
    let (status, body) = app.put("/users/999", json!({})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
    Ok(())
}

#[tokio::test]
async fn deleting_user_removes_their_records() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    app.store.insert_record(record(1, 2, Utc::now())).await?;

    let (status, body) = app.delete("/users/2").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], 2);

    let (status, _) = app.get("/users/2").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/data/record/1").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.delete("/users/2").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
    Ok(())
}

#[tokio::test]
async fn record_crud() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    app.store.insert_record(record(3, 1, Utc::now())).await?;

    let (status, body) = app.get("/data/record/3").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 3);

    let (status, body) = app
        .put(
            "/data/record/3",
            json!({"avg_temp": 37.5, "client_id": 2, "id": 9}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["avg_temp"], 37.5);
    assert_eq!(body["data"]["client_id"], 1);
    assert_eq!(body["data"]["id"], 3);

    let (status, body) = app.put("/data/record/3", json!({"client_id": 2})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No valid fields to update");

    let (status, body) = app.delete("/data/record/3").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_id"], 3);

    let (status, body) = app.get("/data/record/3").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Data record not found");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_json_404s() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    for path in ["/nope", "/users/abc", "/data/record/xyz"] {
        let (status, body) = app.get(path).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body, json!({"error": "Endpoint not found"}), "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let resp = app
        .client
        .post(app.url("/data"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.starts_with("Invalid JSON body"));
    Ok(())
}

#[tokio::test]
async fn cors_allows_any_origin() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let resp = app
        .client
        .get(app.url("/health"))
        .header("origin", "https://dashboard.example.org")
        .send()
        .await?;

    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    Ok(())
}

#[tokio::test]
async fn repeated_query_key_uses_first_value() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let now = Utc::now();
    app.store.insert_record(record(1, 1, now - Duration::hours(2))).await?;
    app.store.insert_record(record(2, 1, now - Duration::days(3))).await?;

    let (status, body) = app.get("/data/1?range=day&range=week").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1]);

    let (status, body) = app.get("/data/1?range=bogus&range=all").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn wrong_method_is_a_json_405() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let (status, body) = app.post("/health", json!({})).await?;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "Method not allowed"}));
    Ok(())
}

#[tokio::test]
async fn wrongly_typed_field_is_a_bad_request() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let mut body = sensor_body();
    body["avg_temp"] = json!("36.5");

    let (status, resp) = app.post("/data", body).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = resp["error"].as_str().unwrap_or_default();
    assert!(error.starts_with("Invalid JSON body"));
    Ok(())
}

#[tokio::test]
async fn colliding_id_surfaces_store_error() -> Result<()> {
    // ---
    let inner = MemoryStore::new();
    inner.insert_record(record(5, 1, Utc::now())).await?;
    inner.insert_record(record(6, 1, Utc::now())).await?;

    // max + 1 = 6, which already exists
    let store = StaleMaxId {
        inner: inner.clone(),
        stale_max: 5,
    };
    let base = serve(Arc::new(store)).await?;

    let resp = Client::new()
        .post(format!("{base}/data"))
        .json(&sensor_body())
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "duplicate key: data.id 6 already exists");

    // The existing row is untouched
    let existing = inner.find_data(6).await?;
    assert_eq!(existing.map(|r| r.avg_temp), Some(36.0));
    Ok(())
}
