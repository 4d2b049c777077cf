use std::str::FromStr;

use anyhow::Context;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::info;
use tokio_postgres::{error::SqlState, NoTls};

use crate::config::PostgresSettings;

/// Split SQL into statements, respecting dollar-quoted strings.
/// This handles PostgreSQL function definitions that use $$ ... $$ blocks.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_dollar_quote = false;
    let bytes = sql.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if i + 1 < bytes.len() && bytes[i] == b'$' && bytes[i + 1] == b'$' {
            in_dollar_quote = !in_dollar_quote;
            i += 2;
            continue;
        }

        if bytes[i] == b';' && !in_dollar_quote {
            let stmt = &sql[start..i];
            if !stmt.trim().is_empty() {
                statements.push(stmt);
            }
            start = i + 1;
        }
        i += 1;
    }

    if start < sql.len() {
        let stmt = &sql[start..];
        if !stmt.trim().is_empty() {
            statements.push(stmt);
        }
    }

    statements
}

/// Builds the driver config from either a connection url or discrete fields.
fn pg_config(settings: &PostgresSettings) -> anyhow::Result<tokio_postgres::Config> {
    if let Some(url) = settings.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return tokio_postgres::Config::from_str(url.trim())
            .context("Invalid PostgreSQL connection url");
    }

    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&settings.host)
        .port(settings.port)
        .user(&settings.user)
        .password(&settings.password)
        .dbname(&settings.database);
    Ok(pg_config)
}

/// True when `err` is PostgreSQL's "relation does not exist" (42P01).
///
/// Readers treat a missing table as "no data yet" rather than a failure.
pub fn is_undefined_table(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNDEFINED_TABLE)
}

/// PostgreSQL client with connection pooling.
///
/// Holds the cached dashboard tables (token metrics, chart data, token
/// valuations). Uses `deadpool-postgres` for connection management.
#[derive(Clone)]
pub struct PostgresClient {
    pub pool: Pool,
}

impl PostgresClient {
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL");

        let mut retries = 0;
        let max_retries = 3;
        #[allow(unused_assignments)]
        let mut last_error: Option<anyhow::Error> = None;

        loop {
            let mgr_config = ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            };

            let mgr = Manager::from_config(pg_config(&settings)?, NoTls, mgr_config);
            let pool = Pool::builder(mgr)
                .max_size(settings.pool_size)
                .build()
                .context("Failed to create PostgreSQL connection pool")?;

            match pool.get().await {
                Ok(_conn) => {
                    info!("Successfully connected to PostgreSQL");
                    return Ok(Self { pool });
                },
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("{}", e));
                    retries += 1;

                    if retries >= max_retries {
                        break;
                    }

                    let delay = std::time::Duration::from_millis(100 * 2_u64.pow(retries));
                    log::warn!(
                        "Failed to connect to PostgreSQL (attempt {}/{}), retrying in {:?}...",
                        retries,
                        max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }

        Err(anyhow::anyhow!(
            "Failed to connect to PostgreSQL after {} attempts: {}",
            max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string())
        ))
    }

    /// Health check - verify connection is still alive
    pub async fn health_check(&self) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT current_database(), NOW()", &[])
            .await
            .context("PostgreSQL health check failed")?;

        let database: String = row.get(0);
        let now: chrono::DateTime<chrono::Utc> = row.get(1);
        info!("Database {} reachable at {}", database, now);
        Ok(())
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        info!("Running PostgreSQL migrations");
        let client = self.pool.get().await?;

        let schema = tokio::fs::read_to_string("schema/postgres.sql")
            .await
            .context("Failed to read schema/postgres.sql")?;

        for stmt in split_sql_statements(&schema) {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            client
                .execute(stmt, &[])
                .await
                .with_context(|| format!("Failed to execute migration statement: {}", stmt))?;
        }

        info!("PostgreSQL migrations completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PostgresSettings {
        PostgresSettings {
            url: None,
            host: "db".to_string(),
            port: 6543,
            user: "dash".to_string(),
            password: "pw".to_string(),
            database: "dashboard".to_string(),
            pool_size: 4,
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = r#"
            CREATE SCHEMA IF NOT EXISTS dashboard;
            CREATE OR REPLACE FUNCTION dashboard.touch() RETURNS trigger AS $$
            BEGIN NEW.updated_at = NOW(); RETURN NEW; END;
            $$ LANGUAGE plpgsql;
            SELECT 1
        "#;

        let statements = split_sql_statements(sql);

        assert_eq!(statements.len(), 3);
        assert!(statements[1].contains("RETURN NEW; END;"));
        assert_eq!(statements[2].trim(), "SELECT 1");
    }

    #[test]
    fn test_pg_config_from_fields() {
        let config = pg_config(&settings()).unwrap();
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(config.get_dbname(), Some("dashboard"));
        assert_eq!(config.get_user(), Some("dash"));
    }

    #[test]
    fn test_pg_config_url_wins() {
        let mut s = settings();
        s.url = Some("postgres://alice:pw@example.com:5433/metrics".to_string());

        let config = pg_config(&s).unwrap();

        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_dbname(), Some("metrics"));
        assert_eq!(config.get_user(), Some("alice"));
    }

    #[test]
    fn test_pg_config_rejects_bad_url() {
        let mut s = settings();
        s.url = Some("postgres://host:notaport/db".to_string());
        assert!(pg_config(&s).is_err());
    }
}
