use chrono::{DateTime, TimeZone, Utc};
use cosmindex::{sentinel_timestamp, UnsavedBlock};

const GENESIS_TIME_SECS: i64 = 1_700_000_000;
const BLOCK_TIME_SECS: i64 = 6;

pub fn block_time(height: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(GENESIS_TIME_SECS + height * BLOCK_TIME_SECS, 0)
        .unwrap()
}

pub fn block_at(blockchain_id: i64, height: i64) -> UnsavedBlock {
    UnsavedBlock::new(blockchain_id, height, block_time(height))
}

pub fn placeholder_block_at(blockchain_id: i64, height: i64) -> UnsavedBlock {
    UnsavedBlock::new(blockchain_id, height, sentinel_timestamp())
}
