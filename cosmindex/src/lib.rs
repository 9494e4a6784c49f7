mod block_persistence;
mod blocks;
mod chains;
mod config;
mod denoms;
pub mod diesels;
mod failed_blocks;
mod gaps;
mod messages;
mod reference_data;
mod repos;
mod txs;

pub use blocks::{sentinel_timestamp, Block, UnsavedBlock};
pub use chains::{Chain, UnsavedChain};
pub use config::{Config, ConfigError};
pub use denoms::{
    Denom, DenomUnit, IbcDenom, UnsavedDenom, UnsavedDenomUnit, UnsavedDenomWithUnits,
    UnsavedIbcDenom,
};
pub use failed_blocks::{FailedBlock, FailedEventBlock};
pub use gaps::gap_scan_range;
pub use messages::{Message, MessageEvent, MessageEventAttribute};
pub use reference_data::{
    BlockReferenceData, MessageEventAttributeKey, MessageEventType, MessageType, ReferenceKind,
    ResolvedReferenceData, UnsavedMessageEventAttributeKey, UnsavedMessageEventType,
    UnsavedMessageType,
};
pub use repos::*;
pub use txs::{
    unique_txs_by_hash, Address, DecodedMessage, DecodedMessageEvent,
    DecodedMessageEventAttribute, DecodedTx, Tx, UnsavedFee,
};

use tracing::info;

pub type CosmindexRepo = PostgresRepo;

pub type CosmindexRepoPool = PostgresRepoPool;

pub type CosmindexRepoConn<'a> = PostgresRepoConn<'a>;

pub use diesel_async::AsyncConnection as CosmindexRepoAsyncConnection;

#[derive(Debug, thiserror::Error)]
pub enum CosmindexError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("repo error: {0}")]
    Repo(#[from] RepoError),
}

/// What a block crawler needs to start persisting blocks
pub struct Setup {
    pub pool: CosmindexRepoPool,
    /// Surrogate key of the configured chain, if any
    pub blockchain_id: Option<i64>,
}

/// Validates `config`, connects, creates any missing table and registers the
/// configured chain. Safe to run on every boot.
pub async fn setup(config: &Config) -> Result<Setup, CosmindexError> {
    config.validate()?;

    let repo = config.get_repo();
    let pool = repo.get_pool(config.pool_size).await?;

    let blockchain_id = {
        let mut conn = CosmindexRepo::get_conn(&pool).await?;

        run_internal_migrations(&mut conn).await?;

        match &config.chain {
            Some(chain) => Some(CosmindexRepo::get_or_create_chain(&mut conn, chain).await?),
            None => None,
        }
    };

    info!(
        pool_size = config.pool_size,
        ?blockchain_id,
        "Cosmindex is set up"
    );

    Ok(Setup {
        pool,
        blockchain_id,
    })
}

pub async fn run_internal_migrations(
    conn: &mut CosmindexRepoConn<'_>,
) -> Result<(), RepoError> {
    CosmindexRepo::migrate(conn, &CosmindexRepo::get_internal_migrations()).await
}
