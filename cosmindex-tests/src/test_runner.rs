use std::future::Future;

use cosmindex::{
    run_internal_migrations, CosmindexRepo, CosmindexRepoAsyncConnection, CosmindexRepoConn,
    CosmindexRepoPool, Repo,
};
use tokio::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use crate::db;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

pub async fn get_pool() -> CosmindexRepoPool {
    get_pool_of(1).await
}

pub async fn get_pool_of(size: u32) -> CosmindexRepoPool {
    new_repo().get_pool(size).await.unwrap()
}

/// Creates the test database and its tables once per test binary
pub async fn migrate_once() {
    init_tracing();

    MIGRATED
        .get_or_init(|| async {
            db::setup();

            let migration_pool = get_pool().await;
            let mut migration_conn = CosmindexRepo::get_conn(&migration_pool).await.unwrap();
            run_internal_migrations(&mut migration_conn).await.unwrap();
        })
        .await;
}

/// Runs `test_fn` inside a transaction that is never committed, so tests
/// cannot see each other's rows.
pub async fn run_test<'a, TestFn, Fut>(pool: &'a CosmindexRepoPool, test_fn: TestFn)
where
    TestFn: FnOnce(CosmindexRepoConn<'a>) -> Fut,
    Fut: Future<Output = ()>,
{
    migrate_once().await;

    let mut conn = CosmindexRepo::get_conn(pool).await.unwrap();
    conn.begin_test_transaction().await.unwrap();

    test_fn(conn).await;
}

pub fn new_repo() -> CosmindexRepo {
    CosmindexRepo::new(db::database_url().as_str())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
