pub mod db;
pub mod factory;
pub mod test_runner;

use cosmindex::diesels::schema::{
    blocks, chains, denom_units, denoms, failed_blocks, failed_event_blocks, ibc_denoms,
    message_event_attributes, message_events, message_types, messages, txes,
};
use cosmindex::{
    Block, Chain, Denom, DenomUnit, IbcDenom, Message, MessageEvent, MessageEventAttribute,
    MessageType, Tx,
};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

pub async fn find_chain(conn: &mut AsyncPgConnection, chain_id: &str) -> Option<Chain> {
    chains::table
        .select(Chain::as_select())
        .filter(chains::chain_id.eq(chain_id))
        .first(conn)
        .await
        .optional()
        .unwrap()
}

pub async fn find_block(
    conn: &mut AsyncPgConnection,
    blockchain_id: i64,
    height: i64,
) -> Option<Block> {
    blocks::table
        .select(Block::as_select())
        .filter(blocks::blockchain_id.eq(blockchain_id))
        .filter(blocks::height.eq(height))
        .first(conn)
        .await
        .optional()
        .unwrap()
}

pub async fn find_tx(conn: &mut AsyncPgConnection, hash: &str) -> Option<Tx> {
    txes::table
        .select(Tx::as_select())
        .filter(txes::hash.eq(hash))
        .first(conn)
        .await
        .optional()
        .unwrap()
}

pub async fn get_block_txes(conn: &mut AsyncPgConnection, block_id: i64) -> Vec<Tx> {
    txes::table
        .select(Tx::as_select())
        .filter(txes::block_id.eq(block_id))
        .order(txes::hash.asc())
        .load(conn)
        .await
        .unwrap()
}

pub async fn get_tx_messages(conn: &mut AsyncPgConnection, tx_id: i64) -> Vec<Message> {
    messages::table
        .select(Message::as_select())
        .filter(messages::tx_id.eq(tx_id))
        .order(messages::message_index.asc())
        .load(conn)
        .await
        .unwrap()
}

pub async fn get_message_events(
    conn: &mut AsyncPgConnection,
    message_id: i64,
) -> Vec<MessageEvent> {
    message_events::table
        .select(MessageEvent::as_select())
        .filter(message_events::message_id.eq(message_id))
        .order(message_events::index.asc())
        .load(conn)
        .await
        .unwrap()
}

pub async fn get_message_event_attributes(
    conn: &mut AsyncPgConnection,
    message_event_id: i64,
) -> Vec<MessageEventAttribute> {
    message_event_attributes::table
        .select(MessageEventAttribute::as_select())
        .filter(message_event_attributes::message_event_id.eq(message_event_id))
        .order(message_event_attributes::index.asc())
        .load(conn)
        .await
        .unwrap()
}

pub async fn get_message_types(
    conn: &mut AsyncPgConnection,
    message_type: &str,
) -> Vec<MessageType> {
    message_types::table
        .select(MessageType::as_select())
        .filter(message_types::message_type.eq(message_type))
        .load(conn)
        .await
        .unwrap()
}

pub async fn find_denom(conn: &mut AsyncPgConnection, base: &str) -> Option<Denom> {
    denoms::table
        .select(Denom::as_select())
        .filter(denoms::base.eq(base))
        .first(conn)
        .await
        .optional()
        .unwrap()
}

pub async fn get_denom_units(conn: &mut AsyncPgConnection, denom_id: i64) -> Vec<DenomUnit> {
    denom_units::table
        .select(DenomUnit::as_select())
        .filter(denom_units::denom_id.eq(denom_id))
        .order(denom_units::exponent.asc())
        .load(conn)
        .await
        .unwrap()
}

pub async fn find_ibc_denom(conn: &mut AsyncPgConnection, hash: &str) -> Option<IbcDenom> {
    ibc_denoms::table
        .select(IbcDenom::as_select())
        .filter(ibc_denoms::hash.eq(hash))
        .first(conn)
        .await
        .optional()
        .unwrap()
}

/// Removes a chain committed outside a test transaction, with every block,
/// tx, message, event and attribute under it. Reference rows are left behind.
pub async fn delete_chain(conn: &mut AsyncPgConnection, chain_id: &str) {
    let Some(chain) = find_chain(conn, chain_id).await else {
        return;
    };

    let block_ids: Vec<i64> = blocks::table
        .select(blocks::id)
        .filter(blocks::blockchain_id.eq(chain.id))
        .load(conn)
        .await
        .unwrap();
    let tx_ids: Vec<i64> = txes::table
        .select(txes::id)
        .filter(txes::block_id.eq_any(&block_ids))
        .load(conn)
        .await
        .unwrap();
    let message_ids: Vec<i64> = messages::table
        .select(messages::id)
        .filter(messages::tx_id.eq_any(&tx_ids))
        .load(conn)
        .await
        .unwrap();
    let event_ids: Vec<i64> = message_events::table
        .select(message_events::id)
        .filter(message_events::message_id.eq_any(&message_ids))
        .load(conn)
        .await
        .unwrap();

    diesel::delete(
        message_event_attributes::table
            .filter(message_event_attributes::message_event_id.eq_any(&event_ids)),
    )
    .execute(conn)
    .await
    .unwrap();
    diesel::delete(message_events::table.filter(message_events::id.eq_any(&event_ids)))
        .execute(conn)
        .await
        .unwrap();
    diesel::delete(messages::table.filter(messages::id.eq_any(&message_ids)))
        .execute(conn)
        .await
        .unwrap();
    diesel::delete(txes::table.filter(txes::id.eq_any(&tx_ids)))
        .execute(conn)
        .await
        .unwrap();
    diesel::delete(blocks::table.filter(blocks::id.eq_any(&block_ids)))
        .execute(conn)
        .await
        .unwrap();
    diesel::delete(failed_blocks::table.filter(failed_blocks::blockchain_id.eq(chain.id)))
        .execute(conn)
        .await
        .unwrap();
    diesel::delete(
        failed_event_blocks::table.filter(failed_event_blocks::blockchain_id.eq(chain.id)),
    )
    .execute(conn)
    .await
    .unwrap();
    diesel::delete(chains::table.filter(chains::id.eq(chain.id)))
        .execute(conn)
        .await
        .unwrap();
}
