use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::info;

use crate::chains::get_or_create_chain;
use crate::diesels::schema::{failed_blocks, failed_event_blocks};
use crate::repos::run_in_transaction;
use crate::{RepoError, UnsavedChain};

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = failed_blocks)]
struct UnsavedFailedBlock {
    height: i64,
    blockchain_id: i64,
}

/// A height whose tx persistence failed and has to be retried
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = failed_blocks)]
pub struct FailedBlock {
    pub id: i64,
    pub height: i64,
    pub blockchain_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = failed_event_blocks)]
struct UnsavedFailedEventBlock {
    height: i64,
    blockchain_id: i64,
}

/// A height whose block events failed to index
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = failed_event_blocks)]
pub struct FailedEventBlock {
    pub id: i64,
    pub height: i64,
    pub blockchain_id: i64,
}

pub(crate) async fn mark_failed_block(
    conn: &mut AsyncPgConnection,
    chain: &UnsavedChain,
    height: i64,
) -> Result<(), RepoError> {
    let blockchain_id = run_in_transaction(conn, move |conn| {
        async move {
            let blockchain_id = get_or_create_chain(conn, chain).await?;

            diesel::insert_into(failed_blocks::table)
                .values(UnsavedFailedBlock {
                    height,
                    blockchain_id,
                })
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;

            Ok(blockchain_id)
        }
        .scope_boxed()
    })
    .await?;

    info!(blockchain_id, height, "Marked block as failed");

    Ok(())
}

pub(crate) async fn mark_failed_event_block(
    conn: &mut AsyncPgConnection,
    chain: &UnsavedChain,
    height: i64,
) -> Result<(), RepoError> {
    let blockchain_id = run_in_transaction(conn, move |conn| {
        async move {
            let blockchain_id = get_or_create_chain(conn, chain).await?;

            diesel::insert_into(failed_event_blocks::table)
                .values(UnsavedFailedEventBlock {
                    height,
                    blockchain_id,
                })
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;

            Ok(blockchain_id)
        }
        .scope_boxed()
    })
    .await?;

    info!(blockchain_id, height, "Marked block events as failed");

    Ok(())
}

pub(crate) async fn get_failed_blocks(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
) -> Result<Vec<FailedBlock>, RepoError> {
    let found_failed_blocks = failed_blocks::table
        .select(FailedBlock::as_select())
        .filter(failed_blocks::blockchain_id.eq(blockchain_id))
        .order(failed_blocks::height.asc())
        .load(conn)
        .await?;

    Ok(found_failed_blocks)
}

pub(crate) async fn get_failed_event_blocks(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
) -> Result<Vec<FailedEventBlock>, RepoError> {
    let found_failed_event_blocks = failed_event_blocks::table
        .select(FailedEventBlock::as_select())
        .filter(failed_event_blocks::blockchain_id.eq(blockchain_id))
        .order(failed_event_blocks::height.asc())
        .load(conn)
        .await?;

    Ok(found_failed_event_blocks)
}

pub(crate) async fn delete_failed_block(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
    height: i64,
) -> Result<(), RepoError> {
    diesel::delete(failed_blocks::table)
        .filter(failed_blocks::blockchain_id.eq(blockchain_id))
        .filter(failed_blocks::height.eq(height))
        .execute(conn)
        .await?;

    Ok(())
}

pub(crate) async fn delete_failed_event_block(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
    height: i64,
) -> Result<(), RepoError> {
    diesel::delete(failed_event_blocks::table)
        .filter(failed_event_blocks::blockchain_id.eq(blockchain_id))
        .filter(failed_event_blocks::height.eq(height))
        .execute(conn)
        .await?;

    Ok(())
}
