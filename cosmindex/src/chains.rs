use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::diesels::schema::chains;
use crate::RepoError;

/// Represents a Cosmos chain network
/// For example, `cosmoshub-4` named `Cosmos Hub`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = chains)]
pub struct UnsavedChain {
    pub chain_id: String,
    pub name: String,
}

impl UnsavedChain {
    /// # Example
    /// ```
    /// use cosmindex::UnsavedChain;
    ///
    /// UnsavedChain::new("osmosis-1", "Osmosis");
    /// ```
    pub fn new(chain_id: &str, name: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            name: name.to_string(),
        }
    }
}

/// N/B: The order has to match ./diesels/schema.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = chains)]
pub struct Chain {
    pub id: i64,
    pub chain_id: String,
    pub name: String,
}

/// Chains are identified by `chain_id` alone; the name of an existing chain
/// is never overwritten.
pub(crate) async fn get_or_create_chain(
    conn: &mut AsyncPgConnection,
    chain: &UnsavedChain,
) -> Result<i64, RepoError> {
    diesel::insert_into(chains::table)
        .values(chain)
        .on_conflict(chains::chain_id)
        .do_update()
        .set(chains::chain_id.eq(excluded(chains::chain_id)))
        .returning(chains::id)
        .get_result::<i64>(conn)
        .await
        .map_err(RepoError::from)
        .inspect_err(|error| {
            error!(chain_id = %chain.chain_id, %error, "Error getting/creating chain");
        })
}
