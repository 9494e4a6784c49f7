use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::diesels::schema::{message_event_attributes, message_events, messages};
use crate::repos::max_rows_per_batch;
use crate::RepoError;

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = messages)]
pub(crate) struct UnsavedMessage {
    pub tx_id: i64,
    pub message_type_id: i64,
    pub message_index: i64,
}

impl UnsavedMessage {
    const FIELD_COUNT: usize = 3;
}

/// N/B: The order has to match ./diesels/schema.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: i64,
    pub tx_id: i64,
    pub message_type_id: i64,
    pub message_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = message_events)]
pub(crate) struct UnsavedMessageEvent {
    pub message_id: i64,
    pub message_event_type_id: i64,
    pub index: i64,
}

impl UnsavedMessageEvent {
    const FIELD_COUNT: usize = 3;
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = message_events)]
pub struct MessageEvent {
    pub id: i64,
    pub message_id: i64,
    pub message_event_type_id: i64,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = message_event_attributes)]
pub(crate) struct UnsavedMessageEventAttribute {
    pub message_event_id: i64,
    pub message_event_attribute_key_id: i64,
    pub index: i64,
    pub value: String,
}

impl UnsavedMessageEventAttribute {
    const FIELD_COUNT: usize = 4;
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = message_event_attributes)]
pub struct MessageEventAttribute {
    pub id: i64,
    pub message_event_id: i64,
    pub message_event_attribute_key_id: i64,
    pub index: i64,
    pub value: String,
}

// Each batch must not repeat a conflict target, Postgres refuses to update
// the same row twice in one statement.

pub(crate) async fn upsert_messages(
    conn: &mut AsyncPgConnection,
    unsaved_messages: &[UnsavedMessage],
) -> Result<Vec<Message>, RepoError> {
    let mut saved_messages = Vec::with_capacity(unsaved_messages.len());

    for chunk in unsaved_messages.chunks(max_rows_per_batch(UnsavedMessage::FIELD_COUNT)) {
        let mut saved_chunk: Vec<Message> = diesel::insert_into(messages::table)
            .values(chunk)
            .on_conflict((messages::tx_id, messages::message_index))
            .do_update()
            .set(messages::message_type_id.eq(excluded(messages::message_type_id)))
            .returning(Message::as_returning())
            .get_results(conn)
            .await?;

        saved_messages.append(&mut saved_chunk);
    }

    Ok(saved_messages)
}

pub(crate) async fn upsert_message_events(
    conn: &mut AsyncPgConnection,
    unsaved_events: &[UnsavedMessageEvent],
) -> Result<Vec<MessageEvent>, RepoError> {
    let mut saved_events = Vec::with_capacity(unsaved_events.len());

    for chunk in unsaved_events.chunks(max_rows_per_batch(UnsavedMessageEvent::FIELD_COUNT)) {
        let mut saved_chunk: Vec<MessageEvent> = diesel::insert_into(message_events::table)
            .values(chunk)
            .on_conflict((message_events::message_id, message_events::index))
            .do_update()
            .set(
                message_events::message_event_type_id
                    .eq(excluded(message_events::message_event_type_id)),
            )
            .returning(MessageEvent::as_returning())
            .get_results(conn)
            .await?;

        saved_events.append(&mut saved_chunk);
    }

    Ok(saved_events)
}

pub(crate) async fn upsert_message_event_attributes(
    conn: &mut AsyncPgConnection,
    unsaved_attributes: &[UnsavedMessageEventAttribute],
) -> Result<usize, RepoError> {
    let mut upserted = 0;

    for chunk in
        unsaved_attributes.chunks(max_rows_per_batch(UnsavedMessageEventAttribute::FIELD_COUNT))
    {
        upserted += diesel::insert_into(message_event_attributes::table)
            .values(chunk)
            .on_conflict((
                message_event_attributes::message_event_id,
                message_event_attributes::index,
            ))
            .do_update()
            .set((
                message_event_attributes::value.eq(excluded(message_event_attributes::value)),
                message_event_attributes::message_event_attribute_key_id.eq(excluded(
                    message_event_attributes::message_event_attribute_key_id,
                )),
            ))
            .execute(conn)
            .await?;
    }

    Ok(upserted)
}
