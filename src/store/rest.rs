//! [`Store`] over a hosted database's PostgREST-style HTTP interface.
//!
//! Every table lives at `{base}/rest/v1/{table}`. Filters are query
//! parameters of the form `column=op.value`; writes ask for the affected rows
//! back with `Prefer: return=representation`.

use std::fmt::Display;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{de::DeserializeOwned, Deserialize};

use super::{Store, StoreError, StoreResult};
use crate::models::{DataPatch, DataRecord, NewDataRecord, User, UserPatch};
use crate::window::TimeFilter;

const USERS: &str = "users";
const DATA: &str = "data";

type Params = Vec<(&'static str, String)>;

// ---

#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

impl RestStore {
    /// Build a client that sends `key` both as `apikey` and as a bearer token.
    pub fn new(base_url: &str, key: &str) -> anyhow::Result<Self> {
        // ---
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(key)?;
        api_key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &Params,
    ) -> StoreResult<Vec<T>> {
        // ---
        tracing::debug!("GET {} {:?}", table, params);
        let response = self
            .client
            .get(self.table_url(table))
            .query(params)
            .send()
            .await?;
        decode_rows(response).await
    }

    async fn patch<T, B>(&self, table: &str, params: &Params, body: &B) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        tracing::debug!("PATCH {} {:?}", table, params);
        let response = self
            .client
            .patch(self.table_url(table))
            .query(params)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        decode_rows(response).await
    }

    async fn delete(&self, table: &str, params: &Params) -> StoreResult<()> {
        tracing::debug!("DELETE {} {:?}", table, params);
        let response = self
            .client
            .delete(self.table_url(table))
            .query(params)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Fail with the store's own message on any non-2xx answer.
async fn check_status(response: reqwest::Response) -> StoreResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected { status, body })
}

async fn decode_rows<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<Vec<T>> {
    let bytes = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

fn credentials_params(email: &str, password: &str) -> Params {
    vec![
        ("select", "*".to_string()),
        ("email", eq(email)),
        ("password", eq(password)),
        ("limit", "1".to_string()),
    ]
}

fn by_key(column: &'static str, value: i64) -> Params {
    vec![("select", "*".to_string()), (column, eq(value))]
}

fn max_id_params() -> Params {
    vec![
        ("select", "id".to_string()),
        ("order", "id.desc".to_string()),
        ("limit", "1".to_string()),
    ]
}

/// Query parameters for one client's records under `filter`, newest first.
fn client_data_params(client_id: i64, filter: &TimeFilter) -> Params {
    // ---
    let mut params = vec![("select", "*".to_string()), ("client_id", eq(client_id))];

    match filter {
        TimeFilter::Unbounded => {}
        TimeFilter::Since(cutoff) => {
            let cutoff = cutoff.to_rfc3339_opts(SecondsFormat::Micros, true);
            params.push(("created_at", format!("gte.{cutoff}")));
        }
        TimeFilter::Between { start, end } => {
            params.push(("created_at", format!("gte.{start}")));
            params.push(("created_at", format!("lte.{end}")));
        }
    }

    params.push(("order", "created_at.desc".to_string()));
    params
}

#[async_trait]
impl Store for RestStore {
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        let rows: Vec<User> = self.select(USERS, &credentials_params(email, password)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let rows: Vec<User> = self.select(USERS, &by_key("user_id", user_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_user(&self, user_id: i64, patch: &UserPatch) -> StoreResult<Option<User>> {
        let rows: Vec<User> = self.patch(USERS, &by_key("user_id", user_id), patch).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<()> {
        self.delete(USERS, &vec![("user_id", eq(user_id))]).await
    }

    async fn max_data_id(&self) -> StoreResult<Option<i64>> {
        let rows: Vec<IdRow> = self.select(DATA, &max_id_params()).await?;
        Ok(rows.first().map(|row| row.id))
    }

    async fn insert_data(&self, record: &NewDataRecord) -> StoreResult<Vec<DataRecord>> {
        // ---
        tracing::debug!("POST {} id={}", DATA, record.id);
        let response = self
            .client
            .post(self.table_url(DATA))
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await?;
        decode_rows(response).await
    }

    async fn data_for_client(
        &self,
        client_id: i64,
        filter: &TimeFilter,
    ) -> StoreResult<Vec<DataRecord>> {
        self.select(DATA, &client_data_params(client_id, filter)).await
    }

    async fn find_data(&self, id: i64) -> StoreResult<Option<DataRecord>> {
        let rows: Vec<DataRecord> = self.select(DATA, &by_key("id", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_data(&self, id: i64, patch: &DataPatch) -> StoreResult<Option<DataRecord>> {
        let rows: Vec<DataRecord> = self.patch(DATA, &by_key("id", id), patch).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_data(&self, id: i64) -> StoreResult<()> {
        self.delete(DATA, &vec![("id", eq(id))]).await
    }
}
