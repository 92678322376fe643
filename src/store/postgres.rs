//! [`Store`] over a direct Postgres connection pool.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use super::{Store, StoreResult};
use crate::models::{DataPatch, DataRecord, NewDataRecord, User, UserPatch};
use crate::schema;
use crate::window::TimeFilter;

const DATA_COLUMNS: &str =
    "id, client_id, avg_blink_rate, avg_temp, left_eye_redness, right_eye_redness, created_at";

// ---

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool and make sure the schema exists.
    pub async fn connect(db_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        // ---
        tracing::info!("Attempting to connect to database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

        tracing::info!("Successfully connected to database");

        schema::create_schema(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        // ---
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, password FROM users WHERE email = $1 AND password = $2 LIMIT 1",
        )
        .bind(email)
        .bind(password)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, password FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(&self, user_id: i64, patch: &UserPatch) -> StoreResult<Option<User>> {
        // ---
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email    = COALESCE($2, email),
                   password = COALESCE($3, password)
             WHERE user_id = $1
            RETURNING user_id, email, password
            "#,
        )
        .bind(user_id)
        .bind(patch.email.as_deref())
        .bind(patch.password.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn max_data_id(&self) -> StoreResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM data ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn insert_data(&self, record: &NewDataRecord) -> StoreResult<Vec<DataRecord>> {
        // ---
        let r = &record.readings;
        let sql = format!(
            r#"
            INSERT INTO data (
                id, client_id, avg_blink_rate, avg_temp,
                left_eye_redness, right_eye_redness
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DATA_COLUMNS}
            "#
        );

        let rows = sqlx::query_as::<_, DataRecord>(&sql)
            .bind(record.id)
            .bind(r.client_id)
            .bind(r.avg_blink_rate)
            .bind(r.avg_temp)
            .bind(r.left_eye_redness)
            .bind(r.right_eye_redness)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn data_for_client(
        &self,
        client_id: i64,
        filter: &TimeFilter,
    ) -> StoreResult<Vec<DataRecord>> {
        // ---
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {DATA_COLUMNS} FROM data WHERE client_id = "
        ));
        qb.push_bind(client_id);

        match filter {
            TimeFilter::Unbounded => {}
            TimeFilter::Since(cutoff) => {
                qb.push(" AND created_at >= ").push_bind(*cutoff);
            }
            // Bounds go to the database as text and are interpreted there
            TimeFilter::Between { start, end } => {
                qb.push(" AND created_at >= ")
                    .push_bind(start.clone())
                    .push("::timestamptz AND created_at <= ")
                    .push_bind(end.clone())
                    .push("::timestamptz");
            }
        }

        qb.push(" ORDER BY created_at DESC");

        let rows = qb
            .build_query_as::<DataRecord>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("client {} has {} matching records", client_id, rows.len());
        Ok(rows)
    }

    async fn find_data(&self, id: i64) -> StoreResult<Option<DataRecord>> {
        let sql = format!("SELECT {DATA_COLUMNS} FROM data WHERE id = $1");
        let row = sqlx::query_as::<_, DataRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_data(&self, id: i64, patch: &DataPatch) -> StoreResult<Option<DataRecord>> {
        // ---
        let sql = format!(
            r#"
            UPDATE data
               SET avg_blink_rate    = COALESCE($2, avg_blink_rate),
                   avg_temp          = COALESCE($3, avg_temp),
                   left_eye_redness  = COALESCE($4, left_eye_redness),
                   right_eye_redness = COALESCE($5, right_eye_redness)
             WHERE id = $1
            RETURNING {DATA_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, DataRecord>(&sql)
            .bind(id)
            .bind(patch.avg_blink_rate)
            .bind(patch.avg_temp)
            .bind(patch.left_eye_redness)
            .bind(patch.right_eye_redness)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn delete_data(&self, id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM data WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
