use cosmindex::{
    DecodedMessage, DecodedMessageEvent, DecodedMessageEventAttribute, DecodedTx, UnsavedFee,
};

use super::random_suffix;

/// Names of the reference rows a test uses, unique to that test
#[derive(Clone, Debug)]
pub struct TestNames {
    suffix: String,
}

impl TestNames {
    pub fn new() -> Self {
        Self {
            suffix: random_suffix(),
        }
    }

    pub fn message_type(&self, name: &str) -> String {
        format!("/cosmos.bank.v1beta1.{name}-{}", self.suffix)
    }

    pub fn event_type(&self, name: &str) -> String {
        format!("{name}-{}", self.suffix)
    }

    pub fn attribute_key(&self, name: &str) -> String {
        format!("{name}-{}", self.suffix)
    }

    pub fn address(&self, name: &str) -> String {
        format!("cosmos1{name}{}", self.suffix.to_lowercase())
    }

    pub fn tx_hash(&self, name: &str) -> String {
        format!("{name}{}", self.suffix.to_uppercase())
    }
}

impl Default for TestNames {
    fn default() -> Self {
        Self::new()
    }
}

pub fn transfer_event(names: &TestNames, index: i64, amount: &str) -> DecodedMessageEvent {
    DecodedMessageEvent::new(
        &names.event_type("transfer"),
        index,
        vec![
            DecodedMessageEventAttribute::new(
                &names.attribute_key("recipient"),
                0,
                &names.address("recipient"),
            ),
            DecodedMessageEventAttribute::new(&names.attribute_key("amount"), 1, amount),
        ],
    )
}

pub fn send_message(names: &TestNames, message_index: i64, amount: &str) -> DecodedMessage {
    DecodedMessage::new(
        &names.message_type("MsgSend"),
        message_index,
        vec![transfer_event(names, 0, amount)],
    )
}

/// A tx with one `MsgSend` signed by `signer`
pub fn send_tx(names: &TestNames, hash: &str, signer: &str, amount: &str) -> DecodedTx {
    DecodedTx::new(
        &names.tx_hash(hash),
        0,
        Some(&names.address(signer)),
        vec![send_message(names, 0, amount)],
    )
    .with_fees(vec![UnsavedFee {
        amount: "500".to_string(),
        denom: "uatom".to_string(),
        payer_address: Some(names.address(signer)),
    }])
}

/// Decoded txs as a decoder would serialize them, with every reference map
/// filled in
pub fn txs_from_json(names: &TestNames) -> Vec<DecodedTx> {
    let message_type = names.message_type("MsgDelegate");
    let event_type = names.event_type("delegate");
    let validator_key = names.attribute_key("validator");
    let amount_key = names.attribute_key("amount");

    let json = serde_json::json!([
        {
            "hash": names.tx_hash("DELEGATE"),
            "code": 0,
            "signer_address": names.address("delegator"),
            "messages": [
                {
                    "message_type": message_type,
                    "message_index": 0,
                    "events": [
                        {
                            "event_type": event_type,
                            "index": 0,
                            "attributes": [
                                { "key": validator_key, "index": 0, "value": "cosmosvaloper1xyz" },
                                { "key": amount_key, "index": 1, "value": "1000000uatom" }
                            ]
                        }
                    ]
                }
            ],
            "unique_message_types": {
                message_type.clone(): { "message_type": message_type }
            },
            "unique_message_event_types": {
                event_type.clone(): { "event_type": event_type }
            },
            "unique_message_attribute_keys": {
                validator_key.clone(): { "key": validator_key },
                amount_key.clone(): { "key": amount_key }
            }
        }
    ]);

    serde_json::from_value(json).unwrap()
}
