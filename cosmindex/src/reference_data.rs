//! Block-wide deduplication of the lookup rows (message types, message event
//! types, attribute keys and signer addresses) that transactions share.
//!
//! Every decoded tx carries the reference rows it introduces. Before anything
//! is written, these are merged into one sorted set per kind so that each kind
//! costs a single batch upsert per block, no matter how many txs use it. The
//! upserts return the canonical surrogate keys, which the block persistence
//! then wires into messages, events and attributes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use derive_more::Display;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::diesels::schema::{message_event_attribute_keys, message_event_types, message_types};
use crate::repos::max_rows_per_batch;
use crate::{DecodedTx, RepoError};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    #[display("message type")]
    MessageType,
    #[display("message event type")]
    MessageEventType,
    #[display("message event attribute key")]
    MessageEventAttributeKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = message_types)]
pub struct UnsavedMessageType {
    pub message_type: String,
}

impl UnsavedMessageType {
    pub fn new(message_type: &str) -> Self {
        Self {
            message_type: message_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = message_types)]
pub struct MessageType {
    pub id: i64,
    pub message_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = message_event_types)]
pub struct UnsavedMessageEventType {
    pub event_type: String,
}

impl UnsavedMessageEventType {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = message_event_types)]
pub struct MessageEventType {
    pub id: i64,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = message_event_attribute_keys)]
pub struct UnsavedMessageEventAttributeKey {
    pub key: String,
}

impl UnsavedMessageEventAttributeKey {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = message_event_attribute_keys)]
pub struct MessageEventAttributeKey {
    pub id: i64,
    pub key: String,
}

/// Union of the reference rows introduced by a block's txs.
/// Sorted maps keep batch order, and so row lock order, stable across writers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockReferenceData {
    pub message_types: BTreeMap<String, UnsavedMessageType>,
    pub message_event_types: BTreeMap<String, UnsavedMessageEventType>,
    pub message_event_attribute_keys: BTreeMap<String, UnsavedMessageEventAttributeKey>,
    pub signer_addresses: BTreeSet<String>,
}

impl BlockReferenceData {
    pub fn collect<'a>(txs: impl IntoIterator<Item = &'a DecodedTx>) -> Self {
        txs.into_iter().fold(Self::default(), |mut reference_data, tx| {
            reference_data.message_types.extend(
                tx.unique_message_types.iter().map(|(key, row)| (key.clone(), row.clone())),
            );
            reference_data.message_event_types.extend(
                tx.unique_message_event_types.iter().map(|(key, row)| (key.clone(), row.clone())),
            );
            reference_data.message_event_attribute_keys.extend(
                tx.unique_message_attribute_keys
                    .iter()
                    .map(|(key, row)| (key.clone(), row.clone())),
            );
            if let Some(signer_address) = &tx.signer_address {
                reference_data.signer_addresses.insert(signer_address.clone());
            }

            reference_data
        })
    }
}

/// Saved reference rows of one block, keyed by natural key.
/// Only valid inside the transaction that produced them.
#[derive(Debug, Default, Clone)]
pub struct ResolvedReferenceData {
    message_types: HashMap<String, MessageType>,
    message_event_types: HashMap<String, MessageEventType>,
    message_event_attribute_keys: HashMap<String, MessageEventAttributeKey>,
}

impl ResolvedReferenceData {
    pub fn new(
        message_types: Vec<MessageType>,
        message_event_types: Vec<MessageEventType>,
        message_event_attribute_keys: Vec<MessageEventAttributeKey>,
    ) -> Self {
        Self {
            message_types: message_types.into_iter().map(|t| (t.message_type.clone(), t)).collect(),
            message_event_types: message_event_types
                .into_iter()
                .map(|t| (t.event_type.clone(), t))
                .collect(),
            message_event_attribute_keys: message_event_attribute_keys
                .into_iter()
                .map(|k| (k.key.clone(), k))
                .collect(),
        }
    }

    pub fn message_type_id(&self, message_type: &str) -> Result<i64, RepoError> {
        self.message_types
            .get(message_type)
            .map(|t| t.id)
            .ok_or_else(|| unregistered(ReferenceKind::MessageType, message_type))
    }

    pub fn message_event_type_id(&self, event_type: &str) -> Result<i64, RepoError> {
        self.message_event_types
            .get(event_type)
            .map(|t| t.id)
            .ok_or_else(|| unregistered(ReferenceKind::MessageEventType, event_type))
    }

    pub fn message_event_attribute_key_id(&self, key: &str) -> Result<i64, RepoError> {
        self.message_event_attribute_keys
            .get(key)
            .map(|k| k.id)
            .ok_or_else(|| unregistered(ReferenceKind::MessageEventAttributeKey, key))
    }
}

fn unregistered(kind: ReferenceKind, key: &str) -> RepoError {
    RepoError::UnregisteredReference {
        kind,
        key: key.to_string(),
    }
}

pub(crate) async fn index_reference_data(
    conn: &mut AsyncPgConnection,
    reference_data: &BlockReferenceData,
) -> Result<ResolvedReferenceData, RepoError> {
    let message_types = upsert_message_types(conn, &reference_data.message_types).await?;
    let message_event_types =
        upsert_message_event_types(conn, &reference_data.message_event_types).await?;
    let message_event_attribute_keys =
        upsert_message_event_attribute_keys(conn, &reference_data.message_event_attribute_keys)
            .await?;

    Ok(ResolvedReferenceData::new(
        message_types,
        message_event_types,
        message_event_attribute_keys,
    ))
}

// Rewriting the natural key on conflict is a no-op that still returns the row's id
async fn upsert_message_types(
    conn: &mut AsyncPgConnection,
    unique_message_types: &BTreeMap<String, UnsavedMessageType>,
) -> Result<Vec<MessageType>, RepoError> {
    let unsaved: Vec<_> = unique_message_types.values().cloned().collect();
    let mut saved = Vec::with_capacity(unsaved.len());

    for chunk in unsaved.chunks(max_rows_per_batch(1)) {
        let mut saved_chunk: Vec<MessageType> = diesel::insert_into(message_types::table)
            .values(chunk)
            .on_conflict(message_types::message_type)
            .do_update()
            .set(message_types::message_type.eq(excluded(message_types::message_type)))
            .returning(MessageType::as_returning())
            .get_results(conn)
            .await?;

        saved.append(&mut saved_chunk);
    }

    Ok(saved)
}

async fn upsert_message_event_types(
    conn: &mut AsyncPgConnection,
    unique_message_event_types: &BTreeMap<String, UnsavedMessageEventType>,
) -> Result<Vec<MessageEventType>, RepoError> {
    let unsaved: Vec<_> = unique_message_event_types.values().cloned().collect();
    let mut saved = Vec::with_capacity(unsaved.len());

    for chunk in unsaved.chunks(max_rows_per_batch(1)) {
        let mut saved_chunk: Vec<MessageEventType> =
            diesel::insert_into(message_event_types::table)
                .values(chunk)
                .on_conflict(message_event_types::event_type)
                .do_update()
                .set(message_event_types::event_type.eq(excluded(message_event_types::event_type)))
                .returning(MessageEventType::as_returning())
                .get_results(conn)
                .await?;

        saved.append(&mut saved_chunk);
    }

    Ok(saved)
}

async fn upsert_message_event_attribute_keys(
    conn: &mut AsyncPgConnection,
    unique_keys: &BTreeMap<String, UnsavedMessageEventAttributeKey>,
) -> Result<Vec<MessageEventAttributeKey>, RepoError> {
    let unsaved: Vec<_> = unique_keys.values().cloned().collect();
    let mut saved = Vec::with_capacity(unsaved.len());

    for chunk in unsaved.chunks(max_rows_per_batch(1)) {
        let mut saved_chunk: Vec<MessageEventAttributeKey> =
            diesel::insert_into(message_event_attribute_keys::table)
                .values(chunk)
                .on_conflict(message_event_attribute_keys::key)
                .do_update()
                .set(
                    message_event_attribute_keys::key
                        .eq(excluded(message_event_attribute_keys::key)),
                )
                .returning(MessageEventAttributeKey::as_returning())
                .get_results(conn)
                .await?;

        saved.append(&mut saved_chunk);
    }

    Ok(saved)
}
