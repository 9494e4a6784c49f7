//! Writes one decoded block in a single database transaction.
//!
//! Rows go in strictly in dependency order, each stage reading back the
//! surrogate keys the next one references:
//! block, signer addresses, txes, reference data, messages, message events and
//! finally message event attributes. Nothing is visible to other sessions
//! unless every stage succeeds.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncPgConnection;
use tracing::{debug, error, info, warn};

use crate::blocks::{upsert_events_indexed_block, upsert_tx_indexed_block};
use crate::failed_blocks::{delete_failed_block, delete_failed_event_block};
use crate::messages::{
    upsert_message_event_attributes, upsert_message_events, upsert_messages, UnsavedMessage,
    UnsavedMessageEvent, UnsavedMessageEventAttribute,
};
use crate::reference_data::{index_reference_data, BlockReferenceData, ResolvedReferenceData};
use crate::repos::run_in_transaction;
use crate::txs::{unique_txs_by_hash, upsert_addresses, upsert_txes, UnsavedTx};
use crate::{DecodedTx, RepoError, UnsavedBlock};

pub(crate) async fn persist_block(
    conn: &mut AsyncPgConnection,
    block: &UnsavedBlock,
    txs: &[DecodedTx],
) -> Result<(), RepoError> {
    run_in_transaction(conn, move |conn| {
        async move {
            delete_failed_block(conn, block.blockchain_id, block.height)
                .await
                .inspect_err(log_failed_stage("clear failed block", block))?;

            let block_id = upsert_tx_indexed_block(conn, block)
                .await
                .inspect_err(log_failed_stage("block", block))?;
            if block.is_placeholder() {
                debug!(height = block.height, "Block has no timestamp, gap scans skip it");
            }

            let unique_txs = unique_txs_by_hash(txs);
            warn_about_stripped_fees(&unique_txs, block);

            let reference_data = BlockReferenceData::collect(unique_txs.iter().copied());

            let address_ids = upsert_addresses(conn, &reference_data.signer_addresses)
                .await
                .inspect_err(log_failed_stage("signer addresses", block))?;
            debug!(
                addresses = address_ids.len(),
                height = block.height,
                "Upserted signer addresses"
            );

            let unsaved_txes = unique_txs
                .iter()
                .map(|tx| to_unsaved_tx(tx, block_id, &address_ids))
                .collect::<Result<Vec<_>, _>>()
                .inspect_err(log_failed_stage("txes", block))?;
            let saved_txes = upsert_txes(conn, &unsaved_txes)
                .await
                .inspect_err(log_failed_stage("txes", block))?;
            debug!(txes = saved_txes.len(), height = block.height, "Upserted txes");

            let tx_ids: HashMap<&str, i64> =
                saved_txes.iter().map(|tx| (tx.hash.as_str(), tx.id)).collect();

            let resolved_reference_data = index_reference_data(conn, &reference_data)
                .await
                .inspect_err(log_failed_stage("reference data", block))?;

            persist_messages(conn, &unique_txs, &tx_ids, &resolved_reference_data)
                .await
                .inspect_err(log_failed_stage("messages", block))?;

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    info!(
        blockchain_id = block.blockchain_id,
        height = block.height,
        txes = txs.len(),
        "Persisted block"
    );

    Ok(())
}

pub(crate) async fn mark_block_events_indexed(
    conn: &mut AsyncPgConnection,
    block: &UnsavedBlock,
) -> Result<(), RepoError> {
    run_in_transaction(conn, move |conn| {
        async move {
            delete_failed_event_block(conn, block.blockchain_id, block.height)
                .await
                .inspect_err(log_failed_stage("clear failed event block", block))?;

            upsert_events_indexed_block(conn, block)
                .await
                .inspect_err(log_failed_stage("events indexed block", block))?;

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    info!(
        blockchain_id = block.blockchain_id,
        height = block.height,
        "Marked block events as indexed"
    );

    Ok(())
}

fn log_failed_stage<'b>(
    stage: &'static str,
    block: &'b UnsavedBlock,
) -> impl FnOnce(&RepoError) + 'b {
    move |error| {
        error!(
            stage,
            blockchain_id = block.blockchain_id,
            height = block.height,
            %error,
            "Failed to persist block"
        );
    }
}

fn warn_about_stripped_fees(txs: &[&DecodedTx], block: &UnsavedBlock) {
    let fees = txs.iter().map(|tx| tx.fees.len()).sum::<usize>();

    if fees > 0 {
        warn!(fees, height = block.height, "Fees are not persisted, dropping them");
    }
}

fn to_unsaved_tx(
    tx: &DecodedTx,
    block_id: i64,
    address_ids: &HashMap<String, i64>,
) -> Result<UnsavedTx, RepoError> {
    let signer_address_id = tx
        .signer_address
        .as_ref()
        .map(|address| generated_key(address_ids.get(address), "address", address))
        .transpose()?;

    Ok(UnsavedTx {
        hash: tx.hash.clone(),
        code: tx.code,
        block_id,
        signer_address_id,
    })
}

fn generated_key(
    key: Option<&i64>,
    entity: &'static str,
    natural_key: &str,
) -> Result<i64, RepoError> {
    key.copied().ok_or_else(|| RepoError::MissingGeneratedKey {
        entity,
        key: natural_key.to_string(),
    })
}

async fn persist_messages(
    conn: &mut AsyncPgConnection,
    txs: &[&DecodedTx],
    tx_ids: &HashMap<&str, i64>,
    reference_data: &ResolvedReferenceData,
) -> Result<(), RepoError> {
    let unsaved_messages = build_messages(txs, tx_ids, reference_data)?;
    let message_ids: HashMap<(i64, i64), i64> = upsert_messages(conn, &unsaved_messages)
        .await?
        .into_iter()
        .map(|message| ((message.tx_id, message.message_index), message.id))
        .collect();
    debug!(messages = message_ids.len(), "Upserted messages");

    let unsaved_events = build_message_events(txs, tx_ids, &message_ids, reference_data)?;
    let event_ids: HashMap<(i64, i64), i64> = upsert_message_events(conn, &unsaved_events)
        .await?
        .into_iter()
        .map(|event| ((event.message_id, event.index), event.id))
        .collect();
    debug!(message_events = event_ids.len(), "Upserted message events");

    let unsaved_attributes =
        build_message_event_attributes(txs, tx_ids, &message_ids, &event_ids, reference_data)?;
    let attributes = upsert_message_event_attributes(conn, &unsaved_attributes).await?;
    debug!(message_event_attributes = attributes, "Upserted message event attributes");

    Ok(())
}

fn tx_id(tx_ids: &HashMap<&str, i64>, tx: &DecodedTx) -> Result<i64, RepoError> {
    generated_key(tx_ids.get(tx.hash.as_str()), "tx", &tx.hash)
}

fn message_id(
    message_ids: &HashMap<(i64, i64), i64>,
    tx_id: i64,
    message_index: i64,
) -> Result<i64, RepoError> {
    generated_key(
        message_ids.get(&(tx_id, message_index)),
        "message",
        &format!("{tx_id}/{message_index}"),
    )
}

// Keyed by conflict target so every batch comes out sorted. A repeated index
// means the decoder emitted two rows for one slot, which fails the block.
fn insert_unique<V>(
    rows: &mut BTreeMap<(i64, i64), V>,
    key: (i64, i64),
    row: V,
    entity: &'static str,
) -> Result<(), RepoError> {
    match rows.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(row);
            Ok(())
        }
        Entry::Occupied(_) => Err(RepoError::DuplicateIndex {
            entity,
            key: format!("{}/{}", key.0, key.1),
        }),
    }
}

fn build_messages(
    txs: &[&DecodedTx],
    tx_ids: &HashMap<&str, i64>,
    reference_data: &ResolvedReferenceData,
) -> Result<Vec<UnsavedMessage>, RepoError> {
    let mut unsaved_messages = BTreeMap::new();

    for tx in txs {
        let tx_id = tx_id(tx_ids, tx)?;

        for message in tx.messages.iter() {
            let unsaved_message = UnsavedMessage {
                tx_id,
                message_type_id: reference_data.message_type_id(&message.message_type)?,
                message_index: message.message_index,
            };

            insert_unique(
                &mut unsaved_messages,
                (tx_id, message.message_index),
                unsaved_message,
                "message",
            )?;
        }
    }

    Ok(unsaved_messages.into_values().collect())
}

fn build_message_events(
    txs: &[&DecodedTx],
    tx_ids: &HashMap<&str, i64>,
    message_ids: &HashMap<(i64, i64), i64>,
    reference_data: &ResolvedReferenceData,
) -> Result<Vec<UnsavedMessageEvent>, RepoError> {
    let mut unsaved_events = BTreeMap::new();

    for tx in txs {
        let tx_id = tx_id(tx_ids, tx)?;

        for message in tx.messages.iter() {
            let message_id = message_id(message_ids, tx_id, message.message_index)?;

            for event in message.events.iter() {
                let unsaved_event = UnsavedMessageEvent {
                    message_id,
                    message_event_type_id: reference_data
                        .message_event_type_id(&event.event_type)?,
                    index: event.index,
                };

                insert_unique(
                    &mut unsaved_events,
                    (message_id, event.index),
                    unsaved_event,
                    "message event",
                )?;
            }
        }
    }

    Ok(unsaved_events.into_values().collect())
}

fn build_message_event_attributes(
    txs: &[&DecodedTx],
    tx_ids: &HashMap<&str, i64>,
    message_ids: &HashMap<(i64, i64), i64>,
    event_ids: &HashMap<(i64, i64), i64>,
    reference_data: &ResolvedReferenceData,
) -> Result<Vec<UnsavedMessageEventAttribute>, RepoError> {
    let mut unsaved_attributes = BTreeMap::new();

    for tx in txs {
        let tx_id = tx_id(tx_ids, tx)?;

        for message in tx.messages.iter() {
            let message_id = message_id(message_ids, tx_id, message.message_index)?;

            for event in message.events.iter() {
                let message_event_id = generated_key(
                    event_ids.get(&(message_id, event.index)),
                    "message event",
                    &format!("{message_id}/{}", event.index),
                )?;

                for attribute in event.attributes.iter() {
                    let unsaved_attribute = UnsavedMessageEventAttribute {
                        message_event_id,
                        message_event_attribute_key_id: reference_data
                            .message_event_attribute_key_id(&attribute.key)?,
                        index: attribute.index,
                        value: attribute.value.clone(),
                    };

                    insert_unique(
                        &mut unsaved_attributes,
                        (message_event_id, attribute.index),
                        unsaved_attribute,
                        "message event attribute",
                    )?;
                }
            }
        }
    }

    Ok(unsaved_attributes.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_data::{MessageEventAttributeKey, MessageEventType, MessageType};
    use crate::{DecodedMessage, DecodedMessageEvent, DecodedMessageEventAttribute};

    fn resolved_reference_data() -> ResolvedReferenceData {
        ResolvedReferenceData::new(
            vec![MessageType {
                id: 1,
                message_type: "send".to_string(),
            }],
            vec![MessageEventType {
                id: 2,
                event_type: "transfer".to_string(),
            }],
            vec![MessageEventAttributeKey {
                id: 3,
                key: "amount".to_string(),
            }],
        )
    }

    fn send_tx(hash: &str, message_indexes: &[i64]) -> DecodedTx {
        let messages = message_indexes
            .iter()
            .map(|index| {
                DecodedMessage::new(
                    "send",
                    *index,
                    vec![DecodedMessageEvent::new(
                        "transfer",
                        0,
                        vec![DecodedMessageEventAttribute::new("amount", 0, "5uatom")],
                    )],
                )
            })
            .collect();

        DecodedTx::new(hash, 0, None, messages)
    }

    fn transfer_event(index: i64) -> DecodedMessageEvent {
        DecodedMessageEvent::new("transfer", index, vec![])
    }

    #[test]
    fn builds_messages_referencing_the_shared_message_type() {
        let txs = [send_tx("A", &[0]), send_tx("B", &[0])];
        let txs: Vec<_> = txs.iter().collect();
        let tx_ids = HashMap::from([("A", 10), ("B", 11)]);

        let messages = build_messages(&txs, &tx_ids, &resolved_reference_data()).unwrap();

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.message_type_id == 1));
        assert_eq!(messages[0].tx_id, 10);
        assert_eq!(messages[1].tx_id, 11);
    }

    #[test]
    fn sorts_messages_by_their_index() {
        let txs = [send_tx("A", &[1, 0, 2])];
        let txs: Vec<_> = txs.iter().collect();
        let tx_ids = HashMap::from([("A", 10)]);

        let messages = build_messages(&txs, &tx_ids, &resolved_reference_data()).unwrap();

        let indexes: Vec<_> = messages.iter().map(|m| m.message_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn rejects_two_messages_sharing_an_index() {
        let tx = DecodedTx::new(
            "A",
            0,
            None,
            vec![
                DecodedMessage::new("send", 0, vec![transfer_event(0)]),
                DecodedMessage::new("send", 0, vec![transfer_event(1)]),
            ],
        );
        let tx_ids = HashMap::from([("A", 10)]);

        let result = build_messages(&[&tx], &tx_ids, &resolved_reference_data());

        assert!(matches!(
            result,
            Err(RepoError::DuplicateIndex { entity: "message", ref key }) if key == "10/0"
        ));
    }

    #[test]
    fn rejects_two_events_sharing_an_index() {
        let tx = DecodedTx::new(
            "A",
            0,
            None,
            vec![DecodedMessage::new(
                "send",
                0,
                vec![transfer_event(0), transfer_event(0)],
            )],
        );
        let tx_ids = HashMap::from([("A", 10)]);
        let message_ids = HashMap::from([((10, 0), 20)]);

        let result =
            build_message_events(&[&tx], &tx_ids, &message_ids, &resolved_reference_data());

        assert!(matches!(
            result,
            Err(RepoError::DuplicateIndex { entity: "message event", ref key }) if key == "20/0"
        ));
    }

    #[test]
    fn rejects_two_attributes_sharing_an_index() {
        let tx = DecodedTx::new(
            "A",
            0,
            None,
            vec![DecodedMessage::new(
                "send",
                0,
                vec![DecodedMessageEvent::new(
                    "transfer",
                    0,
                    vec![
                        DecodedMessageEventAttribute::new("amount", 0, "5uatom"),
                        DecodedMessageEventAttribute::new("amount", 0, "7uatom"),
                    ],
                )],
            )],
        );
        let tx_ids = HashMap::from([("A", 10)]);
        let message_ids = HashMap::from([((10, 0), 20)]);
        let event_ids = HashMap::from([((20, 0), 30)]);

        let result = build_message_event_attributes(
            &[&tx],
            &tx_ids,
            &message_ids,
            &event_ids,
            &resolved_reference_data(),
        );

        assert!(matches!(
            result,
            Err(RepoError::DuplicateIndex { entity: "message event attribute", .. })
        ));
    }

    #[test]
    fn fails_when_a_tx_key_was_not_generated() {
        let txs = [send_tx("A", &[0])];
        let txs: Vec<_> = txs.iter().collect();

        let result = build_messages(&txs, &HashMap::new(), &resolved_reference_data());

        assert!(matches!(
            result,
            Err(RepoError::MissingGeneratedKey { entity: "tx", .. })
        ));
    }

    #[test]
    fn wires_attributes_to_their_events() {
        let txs = [send_tx("A", &[0])];
        let txs: Vec<_> = txs.iter().collect();
        let tx_ids = HashMap::from([("A", 10)]);
        let message_ids = HashMap::from([((10, 0), 20)]);
        let event_ids = HashMap::from([((20, 0), 30)]);

        let attributes = build_message_event_attributes(
            &txs,
            &tx_ids,
            &message_ids,
            &event_ids,
            &resolved_reference_data(),
        )
        .unwrap();

        assert_eq!(
            attributes,
            vec![UnsavedMessageEventAttribute {
                message_event_id: 30,
                message_event_attribute_key_id: 3,
                index: 0,
                value: "5uatom".to_string(),
            }]
        );
    }

    #[test]
    fn signer_addresses_resolve_to_their_keys() {
        let tx = DecodedTx::new("A", 0, Some("cosmos1signer"), vec![]);
        let address_ids = HashMap::from([("cosmos1signer".to_string(), 42)]);

        let unsaved_tx = to_unsaved_tx(&tx, 7, &address_ids).unwrap();

        assert_eq!(unsaved_tx.block_id, 7);
        assert_eq!(unsaved_tx.signer_address_id, Some(42));
    }
}
