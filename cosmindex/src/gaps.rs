//! Queries over `blocks` that tell the crawler which heights still need work.
//!
//! A block only counts as indexed when its flag is set and its timestamp is not
//! the sentinel; placeholder rows are invisible here.

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Timestamptz};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::diesels::schema::blocks;
use crate::{sentinel_timestamp, Block, RepoError};

#[derive(Debug, QueryableByName)]
struct MissingHeight {
    #[diesel(sql_type = BigInt)]
    height: i64,
}

const FIRST_MISSING_HEIGHT_QUERY: &str = "
    SELECT series.height
    FROM generate_series($1::BIGINT, $2::BIGINT) AS series(height)
    WHERE NOT EXISTS (
        SELECT 1 FROM blocks
        WHERE blocks.blockchain_id = $3
        AND blocks.height = series.height
        AND blocks.tx_indexed
        AND blocks.time_stamp <> $4
    )
    ORDER BY series.height
    LIMIT 1
";

/// Stretches `end` up to the height right after the highest indexed block so
/// that a scan never stops short of the indexed frontier.
pub fn gap_scan_range(start: i64, end: i64, highest_indexed_height: Option<i64>) -> (i64, i64) {
    match highest_indexed_height {
        Some(highest) if highest.saturating_add(1) > end => (start, highest.saturating_add(1)),
        _ => (start, end),
    }
}

pub(crate) async fn get_highest_indexed_block(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
) -> Result<Option<Block>, RepoError> {
    let highest_block = blocks::table
        .select(Block::as_select())
        .filter(blocks::blockchain_id.eq(blockchain_id))
        .filter(blocks::tx_indexed.eq(true))
        .filter(blocks::time_stamp.ne(sentinel_timestamp()))
        .order(blocks::height.desc())
        .first(conn)
        .await
        .optional()?;

    Ok(highest_block)
}

pub(crate) async fn get_highest_event_indexed_block(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
) -> Result<Option<Block>, RepoError> {
    let highest_block = blocks::table
        .select(Block::as_select())
        .filter(blocks::blockchain_id.eq(blockchain_id))
        .filter(blocks::block_events_indexed.eq(true))
        .filter(blocks::time_stamp.ne(sentinel_timestamp()))
        .order(blocks::height.desc())
        .first(conn)
        .await
        .optional()?;

    Ok(highest_block)
}

pub(crate) async fn get_first_missing_block_in_range(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
    start: i64,
    end: i64,
) -> Result<i64, RepoError> {
    let highest_indexed_height = get_highest_indexed_block(conn, blockchain_id)
        .await?
        .map(|block| block.height);
    let (start, end) = gap_scan_range(start, end, highest_indexed_height);

    let missing_height = diesel::sql_query(FIRST_MISSING_HEIGHT_QUERY)
        .bind::<BigInt, _>(start)
        .bind::<BigInt, _>(end)
        .bind::<BigInt, _>(blockchain_id)
        .bind::<Timestamptz, _>(sentinel_timestamp())
        .get_result::<MissingHeight>(conn)
        .await
        .optional()?;

    match missing_height {
        Some(MissingHeight { height }) => Ok(height),
        None => {
            debug!(blockchain_id, start, end, "No missing block in range");

            Ok(start)
        }
    }
}

pub(crate) async fn block_events_already_indexed(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
    height: i64,
) -> Result<bool, RepoError> {
    let already_indexed = diesel::select(exists(
        blocks::table
            .filter(blocks::blockchain_id.eq(blockchain_id))
            .filter(blocks::height.eq(height))
            .filter(blocks::block_events_indexed.eq(true))
            .filter(blocks::time_stamp.ne(sentinel_timestamp())),
    ))
    .get_result::<bool>(conn)
    .await?;

    Ok(already_indexed)
}

pub(crate) async fn get_blocks_from_start(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
    start: i64,
    end: Option<i64>,
) -> Result<Vec<Block>, RepoError> {
    let mut query = blocks::table
        .select(Block::as_select())
        .filter(blocks::blockchain_id.eq(blockchain_id))
        .filter(blocks::height.ge(start))
        .filter(blocks::time_stamp.ne(sentinel_timestamp()))
        .into_boxed();

    if let Some(end) = end {
        query = query.filter(blocks::height.le(end));
    }

    let found_blocks = query.order(blocks::height.asc()).load(conn).await?;

    Ok(found_blocks)
}
