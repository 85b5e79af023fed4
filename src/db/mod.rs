// Managed MySQL access: explicit sessions and literal SQL execution

use crate::config::DatabaseConfig;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tracing::{debug, info, warn};

pub mod query;

pub use query::*;

/// Something that can run literal SQL and be released afterwards.
#[async_trait]
pub trait QueryExecutor: Send {
    async fn execute(&mut self, sql: &str) -> AppResult<QueryResult>;

    async fn close(self) -> AppResult<()>;
}

/// An open connection to one schema.
pub struct Session {
    conn: MySqlConnection,
    schema: String,
}

impl Session {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Yields rows as the server sends them instead of collecting them first.
    pub fn stream_query<'s>(&'s mut self, sql: &'s str) -> BoxStream<'s, AppResult<Row>> {
        debug!(schema = %self.schema, sql, "Streaming query");
        sqlx::raw_sql(sql)
            .fetch(&mut self.conn)
            .map(|row| -> AppResult<Row> { decode_row(&row?) })
            .boxed()
    }
}

#[async_trait]
impl QueryExecutor for Session {
    async fn execute(&mut self, sql: &str) -> AppResult<QueryResult> {
        let rows: Vec<_> = sqlx::raw_sql(sql).fetch(&mut self.conn).try_collect().await?;
        QueryResult::from_mysql_rows(rows)
    }

    async fn close(self) -> AppResult<()> {
        self.conn.close().await?;
        info!(schema = %self.schema, "Session closed");
        Ok(())
    }
}

/// Connection parameters for one database host.
#[derive(Clone)]
pub struct DatabaseClient {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl std::fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl DatabaseClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| AppError::Config("RDS_HOST must be set".to_string()))?;
        let username = config
            .username
            .clone()
            .ok_or_else(|| AppError::Config("RDS_USERNAME must be set".to_string()))?;

        Ok(Self::new(
            host,
            config.port,
            username,
            config.password.clone().unwrap_or_default(),
        ))
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
    }

    /// Opens a connection with `schema` as the default database.
    ///
    /// The caller owns the session and should release it with
    /// [`QueryExecutor::close`]; [`DatabaseClient::with_session`] does that
    /// automatically.
    pub async fn connect(&self, schema: &str) -> AppResult<Session> {
        debug!(host = %self.host, port = self.port, schema, "Connecting");
        let options = self.connect_options().database(schema);
        let conn = MySqlConnection::connect_with(&options).await?;
        info!(host = %self.host, schema, "Session opened");

        Ok(Session {
            conn,
            schema: schema.to_string(),
        })
    }

    /// Runs `sql` verbatim on an open connection and collects every row.
    pub async fn run_query<E: QueryExecutor>(&self, conn: &mut E, sql: &str) -> AppResult<QueryResult> {
        debug!(sql, "Running query");
        let result = conn.execute(sql).await?;
        debug!(rows = result.len(), "Query finished");
        Ok(result)
    }

    /// Opens a session on `schema`, runs `f`, and closes the session on every
    /// exit path.
    pub async fn with_session<T, F>(&self, schema: &str, f: F) -> AppResult<T>
    where
        F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, AppResult<T>>,
    {
        let session = self.connect(schema).await?;
        scoped(session, f).await
    }

    /// Connects without selecting a schema and runs `SELECT 1`.
    pub async fn health_check(&self) -> AppResult<bool> {
        let mut conn = MySqlConnection::connect_with(&self.connect_options()).await?;
        let result: Result<Vec<_>, _> = sqlx::raw_sql("SELECT 1").fetch(&mut conn).try_collect().await;
        conn.close().await?;
        Ok(!result?.is_empty())
    }
}

/// Runs `f` against `executor`, then closes it whether or not `f` succeeded.
///
/// An error from `f` wins over an error from closing.
pub async fn scoped<E, T, F>(mut executor: E, f: F) -> AppResult<T>
where
    E: QueryExecutor,
    F: for<'c> FnOnce(&'c mut E) -> BoxFuture<'c, AppResult<T>>,
{
    let result = f(&mut executor).await;
    let closed = executor.close().await;

    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "Failed to close session after error");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Answers `select 1` and records whether it was closed.
    struct FakeConnection {
        closed: Arc<AtomicBool>,
        fail_close: bool,
    }

    impl FakeConnection {
        fn new() -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let conn = Self {
                closed: closed.clone(),
                fail_close: false,
            };
            (conn, closed)
        }
    }

    #[async_trait]
    impl QueryExecutor for FakeConnection {
        async fn execute(&mut self, sql: &str) -> AppResult<QueryResult> {
            match sql.trim().to_ascii_lowercase().as_str() {
                "select 1" => Ok(QueryResult::new(
                    vec!["1".to_string()],
                    vec![Row(vec![Value::Int(1)])],
                )),
                "show tables" => Ok(QueryResult::new(
                    vec!["Tables_in_air".to_string()],
                    vec![Row(vec![Value::Text("pollution".to_string())])],
                )),
                _ => Err(AppError::InvalidRequest(format!("syntax error near {:?}", sql))),
            }
        }

        async fn close(self) -> AppResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                return Err(AppError::Backend("connection reset".to_string()));
            }
            Ok(())
        }
    }

    fn client() -> DatabaseClient {
        DatabaseClient::new("db.example.internal", 3306, "admin", "secret")
    }

    #[tokio::test]
    async fn test_run_query_select_one() {
        let (mut conn, _) = FakeConnection::new();
        let result = client().run_query(&mut conn, "select 1").await.unwrap();

        assert_eq!(result.rows(), &[Row(vec![Value::Int(1)])]);
        assert_eq!(result.rows()[0].to_string(), "(1,)");
    }

    #[tokio::test]
    async fn test_run_query_surfaces_errors() {
        let (mut conn, _) = FakeConnection::new();
        let result = client().run_query(&mut conn, "selec 1").await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_scoped_closes_on_success() {
        let (conn, closed) = FakeConnection::new();
        let tables = scoped(conn, |c| Box::pin(async move { c.execute("show tables").await }))
            .await
            .unwrap();

        assert_eq!(tables.len(), 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_scoped_closes_on_error() {
        let (conn, closed) = FakeConnection::new();
        let result = scoped(conn, |c| Box::pin(async move { c.execute("drop everything").await })).await;

        assert!(result.is_err());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_scoped_reports_close_failure() {
        let (mut conn, closed) = FakeConnection::new();
        conn.fail_close = true;
        let result = scoped(conn, |c| Box::pin(async move { c.execute("select 1").await })).await;

        assert!(matches!(result, Err(AppError::Backend(_))));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_from_config_requires_host() {
        let config = DatabaseConfig {
            host: None,
            port: 3306,
            username: Some("admin".to_string()),
            password: None,
            schema: None,
        };
        assert!(matches!(
            DatabaseClient::from_config(&config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", client());
        assert!(rendered.contains("db.example.internal"));
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client = DatabaseClient::new("127.0.0.1", 1, "admin", "secret");
        assert!(client.connect("air").await.is_err());
        assert!(client.health_check().await.is_err());
    }

    /// Needs a reachable MySQL instance configured through `RDS_*` variables.
    #[tokio::test]
    #[ignore]
    async fn test_live_select_one() {
        let config = crate::config::Config::from_env().unwrap();
        let client = DatabaseClient::from_config(&config.database).unwrap();
        let schema = config.database.schema.unwrap_or_else(|| "mysql".to_string());

        let result = client
            .with_session(&schema, |session| {
                Box::pin(async move { session.execute("select 1").await })
            })
            .await
            .unwrap();

        assert_eq!(result.rows()[0], Row(vec![Value::Int(1)]));
    }
}
