use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::diesels::schema::blocks;
use crate::RepoError;

/// Seconds between `0001-01-01T00:00:00Z` and the Unix epoch
const SENTINEL_TIMESTAMP_SECS: i64 = -62_135_596_800;

/// The zero timestamp. Block rows carrying it are placeholders and never count
/// as indexed.
pub fn sentinel_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(SENTINEL_TIMESTAMP_SECS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// One height's worth of chain data, as handed over by the decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsavedBlock {
    pub blockchain_id: i64,
    pub height: i64,
    pub time_stamp: DateTime<Utc>,
}

impl UnsavedBlock {
    pub fn new(blockchain_id: i64, height: i64, time_stamp: DateTime<Utc>) -> Self {
        Self {
            blockchain_id,
            height,
            time_stamp,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.time_stamp == sentinel_timestamp()
    }
}

#[derive(Insertable)]
#[diesel(table_name = blocks)]
struct NewBlock {
    height: i64,
    blockchain_id: i64,
    time_stamp: DateTime<Utc>,
    tx_indexed: bool,
    block_events_indexed: bool,
}

/// N/B: The order has to match ./diesels/schema.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = blocks)]
pub struct Block {
    pub id: i64,
    pub height: i64,
    pub blockchain_id: i64,
    pub time_stamp: DateTime<Utc>,
    pub tx_indexed: bool,
    pub block_events_indexed: bool,
}

impl Block {
    pub fn is_placeholder(&self) -> bool {
        self.time_stamp == sentinel_timestamp()
    }
}

/// Leaves `block_events_indexed` alone on existing rows
pub(crate) async fn upsert_tx_indexed_block(
    conn: &mut AsyncPgConnection,
    block: &UnsavedBlock,
) -> Result<i64, RepoError> {
    let new_block = NewBlock {
        height: block.height,
        blockchain_id: block.blockchain_id,
        time_stamp: block.time_stamp,
        tx_indexed: true,
        block_events_indexed: false,
    };

    let id = diesel::insert_into(blocks::table)
        .values(&new_block)
        .on_conflict((blocks::blockchain_id, blocks::height))
        .do_update()
        .set((
            blocks::tx_indexed.eq(true),
            blocks::time_stamp.eq(excluded(blocks::time_stamp)),
        ))
        .returning(blocks::id)
        .get_result::<i64>(conn)
        .await?;

    Ok(id)
}

/// Leaves `tx_indexed` alone on existing rows
pub(crate) async fn upsert_events_indexed_block(
    conn: &mut AsyncPgConnection,
    block: &UnsavedBlock,
) -> Result<i64, RepoError> {
    let new_block = NewBlock {
        height: block.height,
        blockchain_id: block.blockchain_id,
        time_stamp: block.time_stamp,
        tx_indexed: false,
        block_events_indexed: true,
    };

    let id = diesel::insert_into(blocks::table)
        .values(&new_block)
        .on_conflict((blocks::blockchain_id, blocks::height))
        .do_update()
        .set((
            blocks::block_events_indexed.eq(true),
            blocks::time_stamp.eq(excluded(blocks::time_stamp)),
        ))
        .returning(blocks::id)
        .get_result::<i64>(conn)
        .await?;

    Ok(id)
}
