//! Test fixtures for plateful integration tests.
//!
//! [`TestDb`] hands each test its own migrated database on a PostgreSQL
//! server shared by the whole test binary. The server is the one named by
//! `PLATEFUL_TEST_PG_URL` when set, otherwise a testcontainers instance.
//!
//! The `seeded_*` helpers build the users and signed-in sessions most tests
//! start from.

use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use plateful_core::session::{SessionConfig, open_session};
use plateful_db::config::DbConfig;
use plateful_db::models::User;
use plateful_db::pool;
use plateful_db::queries::users;

/// Env var naming an already-running server (no trailing database name).
pub const TEST_PG_URL_ENV: &str = "PLATEFUL_TEST_PG_URL";

struct Server {
    base_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn server() -> &'static Server {
    SERVER
        .get_or_init(|| async {
            if let Ok(url) = std::env::var(TEST_PG_URL_ENV) {
                return Server {
                    base_url: url.trim_end_matches('/').to_string(),
                    _container: None,
                };
            }
            let container = Postgres::default()
                .with_tag("17")
                .start()
                .await
                .expect("failed to start PostgreSQL container");
            let host = container.get_host().await.expect("container host");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("container port");
            Server {
                base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
                _container: Some(container),
            }
        })
        .await
}

/// A throwaway database with the plateful schema applied.
pub struct TestDb {
    pub pool: PgPool,
    config: DbConfig,
}

impl TestDb {
    /// Create and migrate a fresh `plateful_test_<uuid>` database.
    ///
    /// Goes through the same `ensure_database_exists` / `create_pool` /
    /// `run_migrations` path as `plateful db-init`.
    pub async fn new() -> Self {
        let name = format!("plateful_test_{}", Uuid::new_v4().simple());
        let config = DbConfig::new(format!("{}/{name}", server().await.base_url));

        pool::ensure_database_exists(&config)
            .await
            .unwrap_or_else(|e| panic!("failed to create {name}: {e:#}"));
        let pool = pool::create_pool(&config)
            .await
            .unwrap_or_else(|e| panic!("failed to connect to {name}: {e:#}"));
        pool::run_migrations(&pool)
            .await
            .expect("migrations should apply to a fresh database");

        Self { pool, config }
    }

    pub fn name(&self) -> &str {
        self.config.database_name().unwrap_or_default()
    }

    /// Close the pool and drop the database.
    pub async fn teardown(self) {
        self.pool.close().await;

        let Ok(maint) = PgPool::connect(&self.config.maintenance_url()).await else {
            return;
        };
        let name = self.name();
        let _ = sqlx::query(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = $1 AND pid <> pg_backend_pid()",
        )
        .bind(name)
        .execute(&maint)
        .await;
        let _ = maint
            .execute(format!("DROP DATABASE IF EXISTS {name}").as_str())
            .await;
        maint.close().await;
    }
}

/// Session settings with a fixed secret, for tests that mint tokens.
pub fn session_config() -> SessionConfig {
    SessionConfig::new(b"plateful-test-session-secret".to_vec())
}

/// Insert a user whose display name is the capitalised handle.
pub async fn seeded_user(pool: &PgPool, handle: &str) -> User {
    let mut chars = handle.chars();
    let display_name: String = chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default();
    users::insert_user(pool, handle, &display_name, None)
        .await
        .unwrap_or_else(|e| panic!("failed to seed user {handle}: {e:#}"))
}

/// Insert a user and open a session for them.
///
/// Returns the user and the signed cookie token for that session.
pub async fn seeded_user_with_session(
    pool: &PgPool,
    config: &SessionConfig,
    handle: &str,
) -> (User, String) {
    let user = seeded_user(pool, handle).await;
    let (_, token) = open_session(pool, config, user.id)
        .await
        .unwrap_or_else(|e| panic!("failed to open session for {handle}: {e:#}"));
    (user, token)
}
