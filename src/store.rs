//! Database handle and row codec
//!
//! Each entity lives in its own sled tree, the equivalent of a table. Rows owned
//! by a company are keyed `<company id> 0x00 <row id>`, so a prefix scan returns
//! exactly one company's rows. Rows are CBOR encoded.
//!
//! Trees:
//! - `companies`: company id -> [`Company`]
//! - `parties`: company/party -> [`Party`]
//! - `access`: user/company -> [`Role`](crate::master_data::Role)
//! - `offers`: company/offer -> [`OfferRecord`]
//! - `orders`: company/order -> [`OrderRecord`]
//! - `offer_links`: company/offer -> order id of the conversion
//! - `sequences`: company/kind/year -> last allocated document number
use super::config::Numbering;
use super::document::{Offer, OfferRecord, Order, OrderRecord};
use super::error::StorageError;
use super::master_data::{Company, Party};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult, TransactionalTree,
};
use std::path::Path;
use std::sync::Arc;

pub const SCHEMA_VERSION: u32 = 1;
const SCHEMA_KEY: &[u8] = b"schema_version";

#[derive(Clone)]
pub struct Store {
    instance: Arc<sled::Db>,
    pub(crate) companies: sled::Tree,
    pub(crate) parties: sled::Tree,
    pub(crate) access: sled::Tree,
    pub(crate) offers: sled::Tree,
    pub(crate) orders: sled::Tree,
    pub(crate) links: sled::Tree,
    pub(crate) sequences: sled::Tree,
    numbering: Numbering,
}

impl Store {
    /// Opens all trees and checks the schema version. This is the one-time
    /// initialisation step; there is no lazily checked global state.
    pub fn open(instance: Arc<sled::Db>, numbering: Numbering) -> Result<Self, StorageError> {
        check_schema(&instance)?;

        let store = Self {
            companies: instance.open_tree("companies")?,
            parties: instance.open_tree("parties")?,
            access: instance.open_tree("access")?,
            offers: instance.open_tree("offers")?,
            orders: instance.open_tree("orders")?,
            links: instance.open_tree("offer_links")?,
            sequences: instance.open_tree("sequences")?,
            instance,
            numbering,
        };
        tracing::debug!(schema = SCHEMA_VERSION, "store opened");
        Ok(store)
    }

    pub fn open_path(path: impl AsRef<Path>, numbering: Numbering) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::open(Arc::new(db), numbering)
    }

    pub fn numbering(&self) -> &Numbering {
        &self.numbering
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.instance.flush()?;
        Ok(())
    }
}

fn check_schema(db: &sled::Db) -> Result<(), StorageError> {
    let version = SCHEMA_VERSION.to_be_bytes();
    match db.compare_and_swap(SCHEMA_KEY, None as Option<&[u8]>, Some(&version[..]))? {
        Ok(()) => {
            tracing::info!(schema = SCHEMA_VERSION, "initialised empty database");
            Ok(())
        }
        Err(cas) => {
            let stored = cas
                .current
                .and_then(|v| <[u8; 4]>::try_from(v.as_ref()).ok())
                .map(u32::from_be_bytes)
                .ok_or_else(|| StorageError::Schema("malformed schema version".into()))?;
            if stored != SCHEMA_VERSION {
                return Err(StorageError::Schema(format!(
                    "database has schema version {stored}, expected {SCHEMA_VERSION}"
                )));
            }
            Ok(())
        }
    }
}

/// A value stored as one row of a tree.
pub trait Row: Sized {
    const ENTITY: &'static str;

    fn decode_row(bytes: &[u8]) -> Result<Self, StorageError>;
    fn encode_row(&self) -> Result<Vec<u8>, StorageError>;
}

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StorageError> {
    minicbor::to_vec(value).map_err(|e| StorageError::Encode(e.to_string()))
}

pub(crate) fn decode<T>(bytes: &[u8]) -> Result<T, StorageError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| StorageError::Decode(e.to_string()))
}

impl Row for Offer {
    const ENTITY: &'static str = "Offer";

    fn decode_row(bytes: &[u8]) -> Result<Self, StorageError> {
        decode::<OfferRecord>(bytes).map(Offer::restore)
    }
    fn encode_row(&self) -> Result<Vec<u8>, StorageError> {
        encode(&self.to_record())
    }
}

impl Row for Order {
    const ENTITY: &'static str = "Order";

    fn decode_row(bytes: &[u8]) -> Result<Self, StorageError> {
        decode::<OrderRecord>(bytes).map(Order::restore)
    }
    fn encode_row(&self) -> Result<Vec<u8>, StorageError> {
        encode(&self.to_record())
    }
}

impl Row for Company {
    const ENTITY: &'static str = "Company";

    fn decode_row(bytes: &[u8]) -> Result<Self, StorageError> {
        decode(bytes)
    }
    fn encode_row(&self) -> Result<Vec<u8>, StorageError> {
        encode(self)
    }
}

impl Row for Party {
    const ENTITY: &'static str = "Party";

    fn decode_row(bytes: &[u8]) -> Result<Self, StorageError> {
        decode(bytes)
    }
    fn encode_row(&self) -> Result<Vec<u8>, StorageError> {
        encode(self)
    }
}

pub(crate) fn scoped_key(scope: &str, id: &str) -> Vec<u8> {
    let mut key = scope_prefix(scope);
    key.extend_from_slice(id.as_bytes());
    key
}

pub(crate) fn scope_prefix(scope: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(scope.len() + 1);
    prefix.extend_from_slice(scope.as_bytes());
    prefix.push(0);
    prefix
}

pub(crate) fn sequence_key(company: &str, kind: &str, year: i32) -> Vec<u8> {
    let mut key = scoped_key(company, kind);
    key.push(0);
    key.extend_from_slice(year.to_string().as_bytes());
    key
}

pub(crate) fn get_row<T: Row>(tree: &sled::Tree, key: &[u8], id: &str) -> Result<T, StorageError> {
    let bytes = tree.get(key)?.ok_or_else(|| StorageError::NotFound {
        entity: T::ENTITY,
        id: id.to_string(),
    })?;
    T::decode_row(&bytes)
}

pub(crate) fn scan_rows<T: Row>(tree: &sled::Tree, prefix: &[u8]) -> Result<Vec<T>, StorageError> {
    tree.scan_prefix(prefix)
        .values()
        .map(|bytes| T::decode_row(&bytes?))
        .collect()
}

/// Read-modify-write of a single row. The write only lands if the row is still
/// the one `apply` saw, otherwise the row is re-read and `apply` runs again.
pub(crate) fn update_row<T, F>(
    tree: &sled::Tree,
    key: &[u8],
    id: &str,
    mut apply: F,
) -> anyhow::Result<T>
where
    T: Row,
    F: FnMut(&mut T) -> anyhow::Result<()>,
{
    loop {
        let current = tree
            .get(key)
            .map_err(StorageError::from)?
            .ok_or_else(|| StorageError::NotFound {
                entity: T::ENTITY,
                id: id.to_string(),
            })?;
        let mut row = T::decode_row(&current)?;
        apply(&mut row)?;
        let next = row.encode_row()?;

        match tree
            .compare_and_swap(key, Some(&current), Some(next))
            .map_err(StorageError::from)?
        {
            Ok(()) => return Ok(row),
            Err(_) => tracing::debug!(entity = T::ENTITY, id, "row changed concurrently, retrying"),
        }
    }
}

/// Increments the counter at `key` inside a transaction and returns the new value.
pub(crate) fn next_in_sequence<E>(
    sequences: &TransactionalTree,
    key: &[u8],
) -> ConflictableTransactionResult<u64, E>
where
    E: From<StorageError>,
{
    let current = match sequences.get(key)? {
        Some(v) => <[u8; 8]>::try_from(v.as_ref())
            .map(u64::from_be_bytes)
            .map_err(|_| {
                ConflictableTransactionError::Abort(
                    StorageError::Decode("malformed sequence counter".into()).into(),
                )
            })?,
        None => 0,
    };
    let next = current + 1;
    sequences.insert(key, next.to_be_bytes().to_vec())?;
    Ok(next)
}

/// Turns a transaction result back into the abort error the closure raised, or
/// a storage error when sled itself failed.
pub(crate) fn finish<T, E>(result: TransactionResult<T, E>) -> Result<T, E>
where
    E: From<StorageError>,
{
    result.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StorageError::Sled(e).into(),
    })
}

pub(crate) fn abort<T, E>(error: impl Into<E>) -> ConflictableTransactionResult<T, E> {
    Err(ConflictableTransactionError::Abort(error.into()))
}
