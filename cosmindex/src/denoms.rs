use std::collections::{BTreeMap, HashMap};

use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diesels::schema::{denom_units, denoms, ibc_denoms};
use crate::repos::{max_rows_per_batch, run_in_transaction};
use crate::RepoError;

/// A coin denomination as registered in the chain's bank metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = denoms)]
pub struct UnsavedDenom {
    pub base: String,
    pub name: String,
    pub symbol: String,
}

impl UnsavedDenom {
    const FIELD_COUNT: usize = 3;

    pub fn new(base: &str, name: &str, symbol: &str) -> Self {
        Self {
            base: base.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = denoms)]
pub struct Denom {
    pub id: i64,
    pub base: String,
    pub name: String,
    pub symbol: String,
}

/// A display unit of a denom, e.g. `atom` with exponent 6 for `uatom`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsavedDenomUnit {
    pub exponent: i64,
    pub name: String,
}

impl UnsavedDenomUnit {
    pub fn new(exponent: i64, name: &str) -> Self {
        Self {
            exponent,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = denom_units)]
struct NewDenomUnit {
    denom_id: i64,
    exponent: i64,
    name: String,
}

impl NewDenomUnit {
    const FIELD_COUNT: usize = 3;
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = denom_units)]
pub struct DenomUnit {
    pub id: i64,
    pub denom_id: i64,
    pub exponent: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsavedDenomWithUnits {
    pub denom: UnsavedDenom,
    #[serde(default)]
    pub units: Vec<UnsavedDenomUnit>,
}

impl UnsavedDenomWithUnits {
    pub fn new(denom: UnsavedDenom, units: Vec<UnsavedDenomUnit>) -> Self {
        Self { denom, units }
    }
}

/// A denom received over IBC, identified by the hash of its trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = ibc_denoms)]
pub struct UnsavedIbcDenom {
    pub hash: String,
    pub path: String,
    pub base_denom: String,
}

impl UnsavedIbcDenom {
    const FIELD_COUNT: usize = 3;

    pub fn new(hash: &str, path: &str, base_denom: &str) -> Self {
        Self {
            hash: hash.to_string(),
            path: path.to_string(),
            base_denom: base_denom.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = ibc_denoms)]
pub struct IbcDenom {
    pub id: i64,
    pub hash: String,
    pub path: String,
    pub base_denom: String,
}

/// Last one wins for a repeated base. Units of an existing denom are only ever
/// added, never updated.
pub(crate) async fn upsert_denoms(
    conn: &mut AsyncPgConnection,
    denoms_with_units: &[UnsavedDenomWithUnits],
) -> Result<(), RepoError> {
    let unique_denoms: BTreeMap<&str, &UnsavedDenomWithUnits> = denoms_with_units
        .iter()
        .map(|denom_with_units| (denom_with_units.denom.base.as_str(), denom_with_units))
        .collect();

    let denoms_count = run_in_transaction(conn, move |conn| {
        async move {
            let unsaved_denoms: Vec<_> =
                unique_denoms.values().map(|d| d.denom.clone()).collect();
            let mut denom_ids = HashMap::with_capacity(unsaved_denoms.len());

            for chunk in unsaved_denoms.chunks(max_rows_per_batch(UnsavedDenom::FIELD_COUNT)) {
                let saved_denoms: Vec<Denom> = diesel::insert_into(denoms::table)
                    .values(chunk)
                    .on_conflict(denoms::base)
                    .do_update()
                    .set((
                        denoms::name.eq(excluded(denoms::name)),
                        denoms::symbol.eq(excluded(denoms::symbol)),
                    ))
                    .returning(Denom::as_returning())
                    .get_results(conn)
                    .await?;

                denom_ids.extend(saved_denoms.into_iter().map(|d| (d.base, d.id)));
            }

            let new_units = unique_denoms
                .values()
                .map(|d| to_new_denom_units(d, &denom_ids))
                .collect::<Result<Vec<_>, _>>()?
                .concat();

            for chunk in new_units.chunks(max_rows_per_batch(NewDenomUnit::FIELD_COUNT)) {
                diesel::insert_into(denom_units::table)
                    .values(chunk)
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;
            }

            Ok(denom_ids.len())
        }
        .scope_boxed()
    })
    .await?;

    info!(denoms = denoms_count, "Upserted denoms");

    Ok(())
}

fn to_new_denom_units(
    denom_with_units: &UnsavedDenomWithUnits,
    denom_ids: &HashMap<String, i64>,
) -> Result<Vec<NewDenomUnit>, RepoError> {
    let base = &denom_with_units.denom.base;
    let denom_id = denom_ids
        .get(base)
        .copied()
        .ok_or_else(|| RepoError::MissingGeneratedKey {
            entity: "denom",
            key: base.clone(),
        })?;

    let mut unique_units = BTreeMap::new();
    for unit in denom_with_units.units.iter() {
        unique_units.insert(
            unit.name.as_str(),
            NewDenomUnit {
                denom_id,
                exponent: unit.exponent,
                name: unit.name.clone(),
            },
        );
    }

    Ok(unique_units.into_values().collect())
}

pub(crate) async fn upsert_ibc_denoms(
    conn: &mut AsyncPgConnection,
    unsaved_ibc_denoms: &[UnsavedIbcDenom],
) -> Result<(), RepoError> {
    let unique_ibc_denoms: Vec<UnsavedIbcDenom> = unsaved_ibc_denoms
        .iter()
        .map(|ibc_denom| (ibc_denom.hash.as_str(), ibc_denom))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .cloned()
        .collect();

    let upserted = run_in_transaction(conn, move |conn| {
        async move {
            let mut upserted = 0;

            for chunk in unique_ibc_denoms.chunks(max_rows_per_batch(UnsavedIbcDenom::FIELD_COUNT))
            {
                upserted += diesel::insert_into(ibc_denoms::table)
                    .values(chunk)
                    .on_conflict(ibc_denoms::hash)
                    .do_update()
                    .set((
                        ibc_denoms::path.eq(excluded(ibc_denoms::path)),
                        ibc_denoms::base_denom.eq(excluded(ibc_denoms::base_denom)),
                    ))
                    .execute(conn)
                    .await?;
            }

            Ok(upserted)
        }
        .scope_boxed()
    })
    .await?;

    info!(ibc_denoms = upserted, "Upserted IBC denoms");

    Ok(())
}
