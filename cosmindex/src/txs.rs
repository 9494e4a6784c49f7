use std::collections::{BTreeMap, BTreeSet, HashMap};

use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diesels::schema::{addresses, txes};
use crate::reference_data::{
    UnsavedMessageEventAttributeKey, UnsavedMessageEventType, UnsavedMessageType,
};
use crate::repos::max_rows_per_batch;
use crate::RepoError;

/// A transaction fully decoded from the chain, together with the reference
/// rows its messages introduce. The reference maps are keyed by natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTx {
    pub hash: String,
    pub code: i32,
    #[serde(default)]
    pub signer_address: Option<String>,
    #[serde(default)]
    pub fees: Vec<UnsavedFee>,
    #[serde(default)]
    pub messages: Vec<DecodedMessage>,
    #[serde(default)]
    pub unique_message_types: HashMap<String, UnsavedMessageType>,
    #[serde(default)]
    pub unique_message_event_types: HashMap<String, UnsavedMessageEventType>,
    #[serde(default)]
    pub unique_message_attribute_keys: HashMap<String, UnsavedMessageEventAttributeKey>,
}

impl DecodedTx {
    /// Builds a transaction and registers every message type, event type and
    /// attribute key its messages use.
    pub fn new(
        hash: &str,
        code: i32,
        signer_address: Option<&str>,
        messages: Vec<DecodedMessage>,
    ) -> Self {
        let mut tx = Self {
            hash: hash.to_string(),
            code,
            signer_address: signer_address.map(|a| a.to_string()),
            fees: vec![],
            messages: vec![],
            unique_message_types: HashMap::new(),
            unique_message_event_types: HashMap::new(),
            unique_message_attribute_keys: HashMap::new(),
        };

        for message in messages {
            tx.add_message(message);
        }

        tx
    }

    pub fn add_message(&mut self, message: DecodedMessage) {
        self.unique_message_types
            .entry(message.message_type.clone())
            .or_insert_with(|| UnsavedMessageType::new(&message.message_type));

        for event in message.events.iter() {
            self.unique_message_event_types
                .entry(event.event_type.clone())
                .or_insert_with(|| UnsavedMessageEventType::new(&event.event_type));

            for attribute in event.attributes.iter() {
                self.unique_message_attribute_keys
                    .entry(attribute.key.clone())
                    .or_insert_with(|| UnsavedMessageEventAttributeKey::new(&attribute.key));
            }
        }

        self.messages.push(message);
    }

    pub fn with_fees(mut self, fees: Vec<UnsavedFee>) -> Self {
        self.fees = fees;

        self
    }
}

/// Fees are decoded but not persisted yet; the payer address and the
/// denomination have to be stored before a fee row can reference them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsavedFee {
    pub amount: String,
    pub denom: String,
    pub payer_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub message_type: String,
    pub message_index: i64,
    #[serde(default)]
    pub events: Vec<DecodedMessageEvent>,
}

impl DecodedMessage {
    pub fn new(message_type: &str, message_index: i64, events: Vec<DecodedMessageEvent>) -> Self {
        Self {
            message_type: message_type.to_string(),
            message_index,
            events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMessageEvent {
    pub event_type: String,
    pub index: i64,
    #[serde(default)]
    pub attributes: Vec<DecodedMessageEventAttribute>,
}

impl DecodedMessageEvent {
    pub fn new(
        event_type: &str,
        index: i64,
        attributes: Vec<DecodedMessageEventAttribute>,
    ) -> Self {
        Self {
            event_type: event_type.to_string(),
            index,
            attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMessageEventAttribute {
    pub key: String,
    pub index: i64,
    pub value: String,
}

impl DecodedMessageEventAttribute {
    pub fn new(key: &str, index: i64, value: &str) -> Self {
        Self {
            key: key.to_string(),
            index,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = txes)]
pub(crate) struct UnsavedTx {
    pub hash: String,
    pub code: i32,
    pub block_id: i64,
    pub signer_address_id: Option<i64>,
}

impl UnsavedTx {
    const FIELD_COUNT: usize = 4;
}

/// N/B: The order has to match ./diesels/schema.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = txes)]
pub struct Tx {
    pub id: i64,
    pub hash: String,
    pub code: i32,
    pub block_id: i64,
    pub signer_address_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = addresses)]
struct UnsavedAddress {
    address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = addresses)]
pub struct Address {
    pub id: i64,
    pub address: String,
}

/// Collapses txs sharing a hash, keeping the last one seen. The result is
/// ordered by hash.
pub fn unique_txs_by_hash(txs: &[DecodedTx]) -> Vec<&DecodedTx> {
    let unique_txs: BTreeMap<&str, &DecodedTx> =
        txs.iter().map(|tx| (tx.hash.as_str(), tx)).collect();

    if unique_txs.len() != txs.len() {
        warn!(
            txs = txs.len(),
            unique_txs = unique_txs.len(),
            "Decoded block repeats tx hashes, keeping the last of each"
        );
    }

    unique_txs.into_values().collect()
}

/// Returns the surrogate key of every address, keyed by address
pub(crate) async fn upsert_addresses(
    conn: &mut AsyncPgConnection,
    unique_addresses: &BTreeSet<String>,
) -> Result<HashMap<String, i64>, RepoError> {
    let unsaved_addresses: Vec<_> = unique_addresses
        .iter()
        .map(|address| UnsavedAddress {
            address: address.clone(),
        })
        .collect();

    let mut address_ids = HashMap::with_capacity(unsaved_addresses.len());

    for chunk in unsaved_addresses.chunks(max_rows_per_batch(1)) {
        let saved_addresses: Vec<Address> = diesel::insert_into(addresses::table)
            .values(chunk)
            .on_conflict(addresses::address)
            .do_update()
            .set(addresses::address.eq(excluded(addresses::address)))
            .returning(Address::as_returning())
            .get_results(conn)
            .await?;

        address_ids.extend(saved_addresses.into_iter().map(|a| (a.address, a.id)));
    }

    Ok(address_ids)
}

/// Only `code`, `block_id` and `signer_address_id` are refreshed on existing txs
pub(crate) async fn upsert_txes(
    conn: &mut AsyncPgConnection,
    unsaved_txes: &[UnsavedTx],
) -> Result<Vec<Tx>, RepoError> {
    let mut saved_txes = Vec::with_capacity(unsaved_txes.len());

    for chunk in unsaved_txes.chunks(max_rows_per_batch(UnsavedTx::FIELD_COUNT)) {
        let mut saved_chunk: Vec<Tx> = diesel::insert_into(txes::table)
            .values(chunk)
            .on_conflict(txes::hash)
            .do_update()
            .set((
                txes::code.eq(excluded(txes::code)),
                txes::block_id.eq(excluded(txes::block_id)),
                txes::signer_address_id.eq(excluded(txes::signer_address_id)),
            ))
            .returning(Tx::as_returning())
            .get_results(conn)
            .await?;

        saved_txes.append(&mut saved_chunk);
    }

    Ok(saved_txes)
}

pub(crate) async fn get_addresses(
    conn: &mut AsyncPgConnection,
    address_values: &[String],
) -> Result<Vec<Address>, RepoError> {
    let found_addresses = addresses::table
        .select(Address::as_select())
        .filter(addresses::address.eq_any(address_values))
        .order(addresses::address.asc())
        .load(conn)
        .await?;

    Ok(found_addresses)
}
