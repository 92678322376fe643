use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::models::{DataRecord, InsertDataRequest, NewDataRecord};
use crate::store::{SharedStore, Store, StoreResult};
use crate::window::WindowQuery;

// ---

pub fn router() -> Router<SharedStore> {
    // ---
    Router::new()
        .route("/data", post(insert))
        .route("/data/{client_id}", get(by_client))
}

#[derive(Debug, Serialize)]
struct InsertResponse {
    message: &'static str,
    data: Vec<DataRecord>,
}

#[derive(Debug, Serialize)]
struct ClientDataResponse {
    client_id: i64,
    count: usize,
    data: Vec<DataRecord>,
}

/// Handle `POST /data`.
async fn insert(
    State(store): State<SharedStore>,
    body: Result<Json<InsertDataRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<InsertResponse>)> {
    // ---
    let Json(request) = body?;
    let readings = request.validate()?;

    // Read-then-write, not atomic: two concurrent inserts can compute the same
    // id, and the store's primary key decides which one fails.
    let id = next_data_id(store.as_ref()).await?;
    debug!("POST /data - assigning id {}", id);

    let data = store.insert_data(&NewDataRecord { id, readings }).await?;
    info!(
        "POST /data - stored record {} for client {}",
        id, readings.client_id
    );

    Ok((
        StatusCode::CREATED,
        Json(InsertResponse {
            message: "Data inserted successfully",
            data,
        }),
    ))
}

/// One past the current maximum `data.id`, or 1 for an empty table.
async fn next_data_id(store: &dyn Store) -> StoreResult<i64> {
    Ok(store.max_data_id().await?.map_or(1, |max| max + 1))
}

/// Handle `GET /data/{client_id}`.
async fn by_client(
    State(store): State<SharedStore>,
    client_id: Result<Path<i64>, PathRejection>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<Json<ClientDataResponse>> {
    // ---
    let Path(client_id) = client_id?;
    let Query(pairs) = pairs?;
    let filter = WindowQuery::from_pairs(pairs).resolve(Utc::now())?;
    debug!("GET /data/{} - filter {:?}", client_id, filter);

    let data = store.data_for_client(client_id, &filter).await?;
    info!("GET /data/{} - returning {} records", client_id, data.len());

    Ok(Json(ClientDataResponse {
        client_id,
        count: data.len(),
        data,
    }))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::SensorReadings;
    use crate::store::MemoryStore;
    use tokio_test::block_on;

    fn readings() -> SensorReadings {
        SensorReadings {
            client_id: 1,
            avg_blink_rate: 15.0,
            avg_temp: 36.0,
            left_eye_redness: 5.0,
            right_eye_redness: 4.0,
        }
    }

    #[test]
    fn first_id_in_empty_table_is_one() {
        let store = MemoryStore::new();
        assert_eq!(block_on(next_data_id(&store)).unwrap(), 1);
    }

    #[test]
    fn next_id_follows_current_maximum() {
        // ---
        let store = MemoryStore::new();
        block_on(async {
            for id in [41, 7] {
                let record = NewDataRecord {
                    id,
                    readings: readings(),
                };
                store.insert_data(&record).await.unwrap();
            }

            assert_eq!(next_data_id(&store).await.unwrap(), 42);
        });
    }
}
