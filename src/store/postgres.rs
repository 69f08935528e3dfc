//! `PostgreSQL` credential store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{Instrument, info_span};

use super::{CredentialStore, InsertOutcome, InsertPolicy, User};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    /// Create the `users` table and its unique index if missing.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        for statement in schema_statements(SCHEMA_SQL) {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL",
                db.statement = statement
            );
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(span)
                .await
                .with_context(|| format!("failed to apply schema statement: {statement}"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn count_users(&self) -> Result<i64> {
        let query = "SELECT COUNT(*) AS count FROM users";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count users")?;
        Ok(row.get("count"))
    }

    async fn count_by_name(&self, name: &str) -> Result<i64> {
        let query = "SELECT COUNT(*) AS count FROM users WHERE name = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count users by name")?;
        Ok(row.get("count"))
    }

    async fn insert(&self, user: &User, policy: InsertPolicy) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await.context("begin insert transaction")?;

        if policy == InsertPolicy::BootstrapOnly {
            // Blocks concurrent writers until commit, so two bootstrap inserts
            // cannot both observe an empty table.
            let lock = "LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE";
            sqlx::query(lock)
                .execute(&mut *tx)
                .instrument(info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "LOCK",
                    db.statement = lock
                ))
                .await
                .context("failed to lock users table")?;

            let query = "SELECT COUNT(*) AS count FROM users";
            let row = sqlx::query(query)
                .fetch_one(&mut *tx)
                .instrument(info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "SELECT",
                    db.statement = query
                ))
                .await
                .context("failed to count users")?;
            let count: i64 = row.get("count");
            if count > 0 {
                let _ = tx.rollback().await;
                return Ok(InsertOutcome::Closed);
            }
        }

        let query = r"
            INSERT INTO users
                (id, name, password_digest, created_at)
            VALUES ($1, $2, $3, $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.password_digest)
            .bind(user.created_at)
            .execute(&mut *tx)
            .instrument(span)
            .await;

        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                let _ = tx.rollback().await;
                return Ok(InsertOutcome::Conflict);
            }
            Err(err) => return Err(err).context("failed to insert user"),
        }

        tx.commit().await.context("commit insert transaction")?;

        Ok(InsertOutcome::Created)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        let query = "SELECT id, name, password_digest, created_at FROM users WHERE name = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user")?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            name: row.get("name"),
            password_digest: row.get("password_digest"),
            created_at: row.get("created_at"),
        }))
    }

    async fn update_password(&self, id: &str, password_digest: &str) -> Result<bool> {
        let query = "UPDATE users SET password_digest = $2 WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_digest)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password")?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!("db.acquire", db.system = "postgresql"))
            .await
            .context("failed to acquire database connection")?;
        conn.ping()
            .instrument(info_span!("db.ping", db.system = "postgresql"))
            .await
            .context("database ping failed")
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Split a schema file into statements, skipping chunks that hold only comments.
fn schema_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|chunk| {
            chunk.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_is_sqlstate_23505() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("40001"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn schema_splits_into_statements() {
        let statements = schema_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(statements[1].starts_with("CREATE UNIQUE INDEX"));
        assert!(schema_statements("-- only a comment\n;\n").is_empty());
    }
}
