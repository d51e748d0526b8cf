//! PostgreSQL schema for the durability mirror

use sqlx::PgPool;

/// Users table: one row per ledger account
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users_tb (
    user_id          BIGINT PRIMARY KEY,
    available_points BIGINT NOT NULL DEFAULT 0 CHECK (available_points >= 0),
    held_points      BIGINT NOT NULL DEFAULT 0 CHECK (held_points >= 0),
    balance_version  BIGINT NOT NULL DEFAULT 0,
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Exchanges table: one row per exchange request
pub const CREATE_EXCHANGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS exchanges_tb (
    exchange_id           TEXT PRIMARY KEY,
    sender_id             BIGINT NOT NULL,
    receiver_id           BIGINT NOT NULL,
    skill_id              BIGINT NOT NULL,
    price                 BIGINT NOT NULL,
    status                SMALLINT NOT NULL,
    sender_confirmed      BOOLEAN NOT NULL DEFAULT FALSE,
    receiver_confirmed    BOOLEAN NOT NULL DEFAULT FALSE,
    sender_confirmed_at   TIMESTAMPTZ,
    receiver_confirmed_at TIMESTAMPTZ,
    created_at            TIMESTAMPTZ NOT NULL
)
"#;

/// Index backing the receiver's inbox query (pending incoming requests)
pub const CREATE_INBOX_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_exchanges_receiver_status
    ON exchanges_tb (receiver_id, status)
"#;

/// Create all mirror tables if they don't exist
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_USERS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_EXCHANGES_TABLE).execute(pool).await?;
    sqlx::query(CREATE_INBOX_INDEX).execute(pool).await?;
    Ok(())
}
