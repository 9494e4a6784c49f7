// N/B: Column order has to match the Queryable structs and the SQLikeMigrations in repos/repo.rs

diesel::table! {
  chains (id) {
      id -> Int8,
      chain_id -> Text,
      name -> Text,
  }
}

diesel::table! {
  blocks (id) {
      id -> Int8,
      height -> Int8,
      blockchain_id -> Int8,
      time_stamp -> Timestamptz,
      tx_indexed -> Bool,
      block_events_indexed -> Bool,
  }
}

diesel::table! {
  addresses (id) {
      id -> Int8,
      address -> Text,
  }
}

diesel::table! {
  txes (id) {
      id -> Int8,
      hash -> Text,
      code -> Int4,
      block_id -> Int8,
      signer_address_id -> Nullable<Int8>,
  }
}

diesel::table! {
  message_types (id) {
      id -> Int8,
      message_type -> Text,
  }
}

diesel::table! {
  messages (id) {
      id -> Int8,
      tx_id -> Int8,
      message_type_id -> Int8,
      message_index -> Int8,
  }
}

diesel::table! {
  message_event_types (id) {
      id -> Int8,
      event_type -> Text,
  }
}

diesel::table! {
  message_events (id) {
      id -> Int8,
      message_id -> Int8,
      message_event_type_id -> Int8,
      index -> Int8,
  }
}

diesel::table! {
  message_event_attribute_keys (id) {
      id -> Int8,
      key -> Text,
  }
}

diesel::table! {
  message_event_attributes (id) {
      id -> Int8,
      message_event_id -> Int8,
      message_event_attribute_key_id -> Int8,
      index -> Int8,
      value -> Text,
  }
}

diesel::table! {
  failed_blocks (id) {
      id -> Int8,
      height -> Int8,
      blockchain_id -> Int8,
  }
}

diesel::table! {
  failed_event_blocks (id) {
      id -> Int8,
      height -> Int8,
      blockchain_id -> Int8,
  }
}

diesel::table! {
  denoms (id) {
      id -> Int8,
      base -> Text,
      name -> Text,
      symbol -> Text,
  }
}

diesel::table! {
  denom_units (id) {
      id -> Int8,
      denom_id -> Int8,
      exponent -> Int8,
      name -> Text,
  }
}

diesel::table! {
  ibc_denoms (id) {
      id -> Int8,
      hash -> Text,
      path -> Text,
      base_denom -> Text,
  }
}

diesel::joinable!(blocks -> chains (blockchain_id));
diesel::joinable!(txes -> blocks (block_id));
diesel::joinable!(txes -> addresses (signer_address_id));
diesel::joinable!(messages -> txes (tx_id));
diesel::joinable!(messages -> message_types (message_type_id));
diesel::joinable!(message_events -> messages (message_id));
diesel::joinable!(message_events -> message_event_types (message_event_type_id));
diesel::joinable!(message_event_attributes -> message_events (message_event_id));
diesel::joinable!(
    message_event_attributes -> message_event_attribute_keys (message_event_attribute_key_id)
);
diesel::joinable!(failed_blocks -> chains (blockchain_id));
diesel::joinable!(failed_event_blocks -> chains (blockchain_id));
diesel::joinable!(denom_units -> denoms (denom_id));

diesel::allow_tables_to_appear_in_same_query!(
    chains,
    blocks,
    addresses,
    txes,
    message_types,
    messages,
    message_event_types,
    message_events,
    message_event_attribute_keys,
    message_event_attributes,
    failed_blocks,
    failed_event_blocks,
    denoms,
    denom_units,
    ibc_denoms,
);
