use std::fmt::Debug;

use crate::{
    Address, Block, DecodedTx, FailedBlock, FailedEventBlock, ReferenceKind, UnsavedBlock,
    UnsavedChain, UnsavedDenomWithUnits, UnsavedIbcDenom,
};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("repo is not connected: {0}")]
    NotConnected(String),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("{kind} `{key}` is used by a message but was never registered by the decoder")]
    UnregisteredReference { kind: ReferenceKind, key: String },
    #[error("no generated key was returned for {entity} `{key}`")]
    MissingGeneratedKey { entity: &'static str, key: String },
    #[error("{entity} index `{key}` appears more than once in the decoded block")]
    DuplicateIndex { entity: &'static str, key: String },
}

/// Everything the block crawler and the retry schedulers need from storage.
///
/// Implementations never retry internally. Any error returned from an operation
/// that writes guarantees that none of its writes are visible.
#[async_trait::async_trait]
pub trait Repo: Sync + Send + RepoMigrations + Clone + Debug {
    type Pool;
    type Conn<'a>;

    async fn get_pool(&self, max_size: u32) -> Result<Self::Pool, RepoError>;
    async fn get_conn<'a>(pool: &'a Self::Pool) -> Result<Self::Conn<'a>, RepoError>;

    async fn get_or_create_chain<'a>(
        conn: &mut Self::Conn<'a>,
        chain: &UnsavedChain,
    ) -> Result<i64, RepoError>;

    /// Atomically upserts a block and every tx, message, event and attribute
    /// in it, clearing the block's failure marker.
    async fn persist_block<'a>(
        conn: &mut Self::Conn<'a>,
        block: &UnsavedBlock,
        txs: &[DecodedTx],
    ) -> Result<(), RepoError>;
    async fn mark_block_events_indexed<'a>(
        conn: &mut Self::Conn<'a>,
        block: &UnsavedBlock,
    ) -> Result<(), RepoError>;

    async fn get_highest_indexed_block<'a>(
        conn: &mut Self::Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Option<Block>, RepoError>;
    async fn get_highest_event_indexed_block<'a>(
        conn: &mut Self::Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Option<Block>, RepoError>;
    /// Falls back to `start` when no height in range is missing, so callers
    /// have to re-check `start` before treating it as a gap.
    async fn get_first_missing_block_in_range<'a>(
        conn: &mut Self::Conn<'a>,
        blockchain_id: i64,
        start: i64,
        end: i64,
    ) -> Result<i64, RepoError>;
    async fn block_events_already_indexed<'a>(
        conn: &mut Self::Conn<'a>,
        blockchain_id: i64,
        height: i64,
    ) -> Result<bool, RepoError>;
    async fn get_blocks_from_start<'a>(
        conn: &mut Self::Conn<'a>,
        blockchain_id: i64,
        start: i64,
        end: Option<i64>,
    ) -> Result<Vec<Block>, RepoError>;

    async fn mark_failed_block<'a>(
        conn: &mut Self::Conn<'a>,
        chain: &UnsavedChain,
        height: i64,
    ) -> Result<(), RepoError>;
    async fn mark_failed_event_block<'a>(
        conn: &mut Self::Conn<'a>,
        chain: &UnsavedChain,
        height: i64,
    ) -> Result<(), RepoError>;
    async fn get_failed_blocks<'a>(
        conn: &mut Self::Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Vec<FailedBlock>, RepoError>;
    async fn get_failed_event_blocks<'a>(
        conn: &mut Self::Conn<'a>,
        blockchain_id: i64,
    ) -> Result<Vec<FailedEventBlock>, RepoError>;

    async fn upsert_denoms<'a>(
        conn: &mut Self::Conn<'a>,
        denoms: &[UnsavedDenomWithUnits],
    ) -> Result<(), RepoError>;
    async fn upsert_ibc_denoms<'a>(
        conn: &mut Self::Conn<'a>,
        ibc_denoms: &[UnsavedIbcDenom],
    ) -> Result<(), RepoError>;
    async fn get_addresses<'a>(
        conn: &mut Self::Conn<'a>,
        addresses: &[String],
    ) -> Result<Vec<Address>, RepoError>;
}

#[async_trait::async_trait]
pub trait ExecutesWithRawQuery {
    type RawQueryConn: Send;

    async fn execute_raw_query(conn: &mut Self::RawQueryConn, query: &str)
        -> Result<(), RepoError>;
}

#[async_trait::async_trait]
pub trait Migratable: ExecutesWithRawQuery + Sync + Send {
    async fn migrate(conn: &mut Self::RawQueryConn, migrations: &[&str]) -> Result<(), RepoError>
    where
        Self: Sized,
    {
        for migration in migrations {
            Self::execute_raw_query(conn, migration).await?;
        }

        Ok(())
    }
}

pub trait RepoMigrations: Migratable {
    fn create_chains_migration() -> &'static [&'static str];
    fn create_blocks_migration() -> &'static [&'static str];
    fn create_txes_migration() -> &'static [&'static str];
    fn create_messages_migration() -> &'static [&'static str];
    fn create_failed_blocks_migration() -> &'static [&'static str];
    fn create_denoms_migration() -> &'static [&'static str];

    fn get_internal_migrations() -> Vec<&'static str> {
        [
            Self::create_chains_migration(),
            Self::create_blocks_migration(),
            Self::create_txes_migration(),
            Self::create_messages_migration(),
            Self::create_failed_blocks_migration(),
            Self::create_denoms_migration(),
        ]
        .concat()
    }
}

pub struct SQLikeMigrations;

impl SQLikeMigrations {
    pub fn create_chains() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS chains (
                id BIGSERIAL PRIMARY KEY,
                chain_id TEXT NOT NULL,
                name TEXT NOT NULL
        )",
        "CREATE UNIQUE INDEX IF NOT EXISTS chains_chain_id_index ON chains(chain_id)"]
    }

    pub fn create_blocks() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS blocks (
                id BIGSERIAL PRIMARY KEY,
                height BIGINT NOT NULL,
                blockchain_id BIGINT NOT NULL REFERENCES chains(id),
                time_stamp TIMESTAMPTZ NOT NULL,
                tx_indexed BOOLEAN NOT NULL DEFAULT FALSE,
                block_events_indexed BOOLEAN NOT NULL DEFAULT FALSE
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS blocks_chain_height_index
            ON blocks(blockchain_id, height)",
        ]
    }

    pub fn create_txes() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS addresses (
                id BIGSERIAL PRIMARY KEY,
                address TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS addresses_address_index ON addresses(address)",
            "CREATE TABLE IF NOT EXISTS txes (
                id BIGSERIAL PRIMARY KEY,
                hash TEXT NOT NULL,
                code INTEGER NOT NULL,
                block_id BIGINT NOT NULL REFERENCES blocks(id),
                signer_address_id BIGINT REFERENCES addresses(id)
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS txes_hash_index ON txes(hash)",
            "CREATE INDEX IF NOT EXISTS txes_block_id_index ON txes(block_id)",
        ]
    }

    pub fn create_messages() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS message_types (
                id BIGSERIAL PRIMARY KEY,
                message_type TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS message_types_message_type_index
            ON message_types(message_type)",
            "CREATE TABLE IF NOT EXISTS messages (
                id BIGSERIAL PRIMARY KEY,
                tx_id BIGINT NOT NULL REFERENCES txes(id),
                message_type_id BIGINT NOT NULL REFERENCES message_types(id),
                message_index BIGINT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS messages_tx_message_index_index
            ON messages(tx_id, message_index)",
            "CREATE TABLE IF NOT EXISTS message_event_types (
                id BIGSERIAL PRIMARY KEY,
                event_type TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS message_event_types_event_type_index
            ON message_event_types(event_type)",
            "CREATE TABLE IF NOT EXISTS message_events (
                id BIGSERIAL PRIMARY KEY,
                message_id BIGINT NOT NULL REFERENCES messages(id),
                message_event_type_id BIGINT NOT NULL REFERENCES message_event_types(id),
                \"index\" BIGINT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS message_events_message_index_index
            ON message_events(message_id, \"index\")",
            "CREATE TABLE IF NOT EXISTS message_event_attribute_keys (
                id BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS message_event_attribute_keys_key_index
            ON message_event_attribute_keys(key)",
            "CREATE TABLE IF NOT EXISTS message_event_attributes (
                id BIGSERIAL PRIMARY KEY,
                message_event_id BIGINT NOT NULL REFERENCES message_events(id),
                message_event_attribute_key_id BIGINT NOT NULL
                    REFERENCES message_event_attribute_keys(id),
                \"index\" BIGINT NOT NULL,
                value TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS message_event_attributes_event_index_index
            ON message_event_attributes(message_event_id, \"index\")",
        ]
    }

    pub fn create_failed_blocks() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS failed_blocks (
                id BIGSERIAL PRIMARY KEY,
                height BIGINT NOT NULL,
                blockchain_id BIGINT NOT NULL REFERENCES chains(id)
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS failed_blocks_chain_height_index
            ON failed_blocks(blockchain_id, height)",
            "CREATE TABLE IF NOT EXISTS failed_event_blocks (
                id BIGSERIAL PRIMARY KEY,
                height BIGINT NOT NULL,
                blockchain_id BIGINT NOT NULL REFERENCES chains(id)
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS failed_event_blocks_chain_height_index
            ON failed_event_blocks(blockchain_id, height)",
        ]
    }

    pub fn create_denoms() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS denoms (
                id BIGSERIAL PRIMARY KEY,
                base TEXT NOT NULL,
                name TEXT NOT NULL,
                symbol TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS denoms_base_index ON denoms(base)",
            "CREATE TABLE IF NOT EXISTS denom_units (
                id BIGSERIAL PRIMARY KEY,
                denom_id BIGINT NOT NULL REFERENCES denoms(id),
                exponent BIGINT NOT NULL,
                name TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS denom_units_denom_name_index
            ON denom_units(denom_id, name)",
            "CREATE TABLE IF NOT EXISTS ibc_denoms (
                id BIGSERIAL PRIMARY KEY,
                hash TEXT NOT NULL,
                path TEXT NOT NULL,
                base_denom TEXT NOT NULL
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS ibc_denoms_hash_index ON ibc_denoms(hash)",
        ]
    }
}
