mod migrations;
mod raw_queries;

use std::time::Duration;

use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError};
use diesel_async::scoped_futures::ScopedBoxFuture;
use diesel_async::{AsyncConnection, AsyncPgConnection};

use super::repo::{Repo, RepoError};
use crate::{
    block_persistence, chains, denoms, failed_blocks, gaps, txs, Address, Block, DecodedTx,
    FailedBlock, FailedEventBlock, UnsavedBlock, UnsavedChain, UnsavedDenomWithUnits,
    UnsavedIbcDenom,
};

pub type Conn<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Postgres caps a single statement at u16::MAX bind parameters
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

pub(crate) const fn max_rows_per_batch(field_count: usize) -> usize {
    MAX_BIND_PARAMS / field_count
}

#[derive(Clone, Debug)]
pub struct PostgresRepo {
    url: String,
    connection_timeout: Duration,
}

impl PostgresRepo {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            connection_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connection_timeout(mut self, connection_timeout: Duration) -> Self {
        self.connection_timeout = connection_timeout;

        self
    }
}

/// Runs `repo_ops` inside a database transaction that is committed only when
/// it returns `Ok`. Errors, panics and dropped futures all roll back.
pub async fn run_in_transaction<'a, 'conn, R, F>(
    conn: &'conn mut AsyncPgConnection,
    repo_ops: F,
) -> Result<R, RepoError>
where
    F: for<'r> FnOnce(&'r mut AsyncPgConnection) -> ScopedBoxFuture<'a, 'r, Result<R, RepoError>>
        + Send
        + 'a,
    R: Send + 'a,
    'a: 'conn,
{
    conn.transaction(repo_ops).await
}

impl From<PoolError> for RepoError {
    fn from(value: PoolError) -> Self {
        RepoError::NotConnected(value.to_string())
    }
}

impl From<bb8::RunError<PoolError>> for RepoError {
    fn from(value: bb8::RunError<PoolError>) -> Self {
        RepoError::NotConnected(value.to_string())
    }
}

#[async_trait::async_trait]
impl Repo for PostgresRepo {
    type Pool = Pool;
    type Conn<'a> = Conn<'a>;

    async fn get_pool(&self, max_size: u32) -> Result<Pool, RepoError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&self.url);

        let pool = bb8::Pool::builder()
            .max_size(max_size)
            .connection_timeout(self.connection_timeout)
            .build(manager)
            .await?;

        Ok(pool)
    }

    async fn get_conn<'a>(pool: &'a Pool) -> Result<Conn<'a>, RepoError> {
        let conn = pool.get().await?;

        Ok(conn)
    }

    async fn get_or_create_chain<'a>(
        conn: &mut Conn<'a>,
        chain: &UnsavedChain,
    ) -> Result<i64, RepoError> {
        chains::get_or_create_chain(conn, chain).await
    }

    async fn persist_block<'a>(
        conn: &mut Conn<'a>,
        block: &UnsavedBlock,
        txs: &[DecodedTx],
    ) -> Result<(), RepoError> {
        block_persistence::persist_block(conn, block, txs).await
    }

    async fn mark_block_events_indexed<'a>(
        conn: &mut Conn<'a>,
        block: &UnsavedBlock,
    ) -> Result<(), RepoError> {
        block_persistence::mark_block_events_indexed(conn, block).await
    }

    async fn get_highest_indexed_block<'a>(
        conn: &mut Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Option<Block>, RepoError> {
        gaps::get_highest_indexed_block(conn, blockchain_id).await
    }

    async fn get_highest_event_indexed_block<'a>(
        conn: &mut Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Option<Block>, RepoError> {
        gaps::get_highest_event_indexed_block(conn, blockchain_id).await
    }

    async fn get_first_missing_block_in_range<'a>(
        conn: &mut Conn<'a>,
        blockchain_id: i64,
        start: i64,
        end: i64,
    ) -> Result<i64, RepoError> {
        gaps::get_first_missing_block_in_range(conn, blockchain_id, start, end).await
    }

    async fn block_events_already_indexed<'a>(
        conn: &mut Conn<'a>,
        blockchain_id: i64,
        height: i64,
    ) -> Result<bool, RepoError> {
        gaps::block_events_already_indexed(conn, blockchain_id, height).await
    }

    async fn get_blocks_from_start<'a>(
        conn: &mut Conn<'a>,
        blockchain_id: i64,
        start: i64,
        end: Option<i64>,
    ) -> Result<Vec<Block>, RepoError> {
        gaps::get_blocks_from_start(conn, blockchain_id, start, end).await
    }

    async fn mark_failed_block<'a>(
        conn: &mut Conn<'a>,
        chain: &UnsavedChain,
        height: i64,
    ) -> Result<(), RepoError> {
        failed_blocks::mark_failed_block(conn, chain, height).await
    }

    async fn mark_failed_event_block<'a>(
        conn: &mut Conn<'a>,
        chain: &UnsavedChain,
        height: i64,
    ) -> Result<(), RepoError> {
        failed_blocks::mark_failed_event_block(conn, chain, height).await
    }

    async fn get_failed_blocks<'a>(
        conn: &mut Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Vec<FailedBlock>, RepoError> {
        failed_blocks::get_failed_blocks(conn, blockchain_id).await
    }

    async fn get_failed_event_blocks<'a>(
        conn: &mut Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Vec<FailedEventBlock>, RepoError> {
        failed_blocks::get_failed_event_blocks(conn, blockchain_id).await
    }

    async fn upsert_denoms<'a>(
        conn: &mut Conn<'a>,
        denoms: &[UnsavedDenomWithUnits],
    ) -> Result<(), RepoError> {
        denoms::upsert_denoms(conn, denoms).await
    }

    async fn upsert_ibc_denoms<'a>(
        conn: &mut Conn<'a>,
        ibc_denoms: &[UnsavedIbcDenom],
    ) -> Result<(), RepoError> {
        denoms::upsert_ibc_denoms(conn, ibc_denoms).await
    }

    async fn get_addresses<'a>(
        conn: &mut Conn<'a>,
        addresses: &[String],
    ) -> Result<Vec<Address>, RepoError> {
        txs::get_addresses(conn, addresses).await
    }
}
