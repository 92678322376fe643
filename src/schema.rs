//! Database schema management for `ocular-sensor-api`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once when the Postgres store connects.

use sqlx::PgPool;

// ---

/// Create the `users` and `data` tables if they do not exist (idempotent).
///
/// `data.client_id` references `users.user_id` with `ON DELETE CASCADE`, so
/// deleting a user removes their readings. `data.id` has no default: the
/// service assigns it.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id  BIGINT PRIMARY KEY,
            email    TEXT   NOT NULL,
            password TEXT   NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data (
            id                BIGINT           PRIMARY KEY,
            client_id         BIGINT           NOT NULL
                REFERENCES users (user_id) ON DELETE CASCADE,
            avg_blink_rate    DOUBLE PRECISION NOT NULL,
            avg_temp          DOUBLE PRECISION NOT NULL,
            left_eye_redness  DOUBLE PRECISION NOT NULL,
            right_eye_redness DOUBLE PRECISION NOT NULL,
            created_at        TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Per-client history, newest first
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_data_client_created
            ON data (client_id, created_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_email
            ON users (email);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
