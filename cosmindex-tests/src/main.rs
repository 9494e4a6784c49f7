use cosmindex::{run_internal_migrations, CosmindexRepo, Repo};
use cosmindex_tests::{db, test_runner};

/// Prepares the test database ahead of `cargo test`
#[tokio::main]
async fn main() {
    db::setup();

    let pool = test_runner::new_repo().get_pool(1).await.unwrap();
    let mut conn = CosmindexRepo::get_conn(&pool).await.unwrap();
    run_internal_migrations(&mut conn).await.unwrap();
}
