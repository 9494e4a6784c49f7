mod postgres_repo;
mod repo;

pub(crate) use postgres_repo::max_rows_per_batch;
pub use postgres_repo::{
    run_in_transaction, Conn as PostgresRepoConn, Pool as PostgresRepoPool, PostgresRepo,
};
pub use repo::{
    ExecutesWithRawQuery, Migratable, Repo, RepoError, RepoMigrations, SQLikeMigrations,
};
