//! Offer to order conversion
//!
//! An accepted offer is converted into exactly one order. The `(company, offer)`
//! link written together with the order makes the conversion idempotent: a
//! second request returns the order created by the first one.
use super::document::{Offer, Order};
use super::error::{BusinessRuleError, StorageError};
use super::status::{DocumentStatus, OfferStatus};
use super::store::{
    Row, Store, abort, decode, encode, finish, get_row, next_in_sequence, scoped_key,
    sequence_key,
};
use super::types::{CompanyId, OfferId, OrderId};
use super::utils;
use chrono::Datelike;
use sled::transaction::{TransactionResult, Transactional};
use tracing::instrument;

/// Storage operations the conversion needs.
pub trait ConversionStore {
    fn load_offer(
        &self,
        company_id: &CompanyId,
        offer_id: &OfferId,
    ) -> Result<Offer, StorageError>;

    /// The order already linked to the offer, if any.
    fn linked_order(
        &self,
        company_id: &CompanyId,
        offer_id: &OfferId,
    ) -> Result<Option<OrderId>, StorageError>;

    /// Writes the order and its offer link in a single transaction and returns
    /// the id of the linked order. If another conversion linked an order first,
    /// nothing is written and that order's id is returned. The offer must still
    /// exist and be `Accepted` when the transaction commits.
    fn commit_conversion(&self, offer_id: &OfferId, order: &Order) -> anyhow::Result<OrderId>;
}

impl ConversionStore for Store {
    fn load_offer(
        &self,
        company_id: &CompanyId,
        offer_id: &OfferId,
    ) -> Result<Offer, StorageError> {
        let key = scoped_key(company_id.as_str(), offer_id.as_str());
        get_row(&self.offers, &key, offer_id.as_str())
    }

    fn linked_order(
        &self,
        company_id: &CompanyId,
        offer_id: &OfferId,
    ) -> Result<Option<OrderId>, StorageError> {
        let key = scoped_key(company_id.as_str(), offer_id.as_str());
        self.links
            .get(key)?
            .map(|bytes| decode::<OrderId>(&bytes))
            .transpose()
    }

    fn commit_conversion(&self, offer_id: &OfferId, order: &Order) -> anyhow::Result<OrderId> {
        let company = order.company_id().as_str();
        let year = order.created_at().to_datetime_utc().year();
        let seq_key = sequence_key(company, "order", year);
        let offer_key = scoped_key(company, offer_id.as_str());
        let order_key = scoped_key(company, order.id().as_str());
        let numbering = self.numbering();
        let link_value = encode(order.id())?;

        let trees = (&self.offers, &self.orders, &self.links, &self.sequences);
        let result: TransactionResult<OrderId, anyhow::Error> =
            trees.transaction(|(offers, orders, links, seqs)| {
                if let Some(existing) = links.get(offer_key.as_slice())? {
                    return match decode::<OrderId>(&existing) {
                        Ok(id) => Ok(id),
                        Err(e) => abort(e),
                    };
                }
                // the offer may have been deleted since it was loaded
                let Some(row) = offers.get(offer_key.as_slice())? else {
                    return abort(StorageError::NotFound {
                        entity: Offer::ENTITY,
                        id: offer_id.to_string(),
                    });
                };
                let offer = match Offer::decode_row(&row) {
                    Ok(offer) => offer,
                    Err(e) => return abort(e),
                };
                if offer.status() != OfferStatus::Accepted {
                    return abort(not_accepted(offer_id, offer.status()));
                }

                let sequence = next_in_sequence::<anyhow::Error>(seqs, &seq_key)?;
                let mut order = order.clone();
                order.assign_number(numbering.format(&numbering.order_prefix, year, sequence));
                let row = match order.encode_row() {
                    Ok(row) => row,
                    Err(e) => return abort(e),
                };
                orders.insert(order_key.as_slice(), row)?;
                links.insert(offer_key.as_slice(), link_value.as_slice())?;
                Ok(order.id().clone())
            });
        finish(result)
    }
}

fn not_accepted(offer_id: &OfferId, actual: OfferStatus) -> BusinessRuleError {
    BusinessRuleError::OfferNotAccepted {
        offer_id: offer_id.to_string(),
        required: OfferStatus::Accepted.to_db().to_string(),
        actual: actual.to_db().to_string(),
    }
}

pub struct ConversionService<S> {
    store: S,
}

impl<S: ConversionStore> ConversionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Converts an accepted offer into an order and returns the order id.
    ///
    /// Fails with [`BusinessRuleError::OfferNotAccepted`] unless the offer is
    /// `Accepted`. Calling it again for a converted offer returns the existing
    /// order without writing anything. Storage errors are returned as they are.
    #[instrument(skip_all, fields(offer_id = %offer_id, company_id = %company_id))]
    pub fn create_from_offer(
        &self,
        offer_id: &OfferId,
        company_id: &CompanyId,
    ) -> anyhow::Result<OrderId> {
        let offer = self.store.load_offer(company_id, offer_id)?;

        if offer.status() != OfferStatus::Accepted {
            return Err(not_accepted(offer_id, offer.status()).into());
        }

        if let Some(order_id) = self.store.linked_order(company_id, offer_id)? {
            tracing::debug!(order_id = %order_id, "offer already converted");
            return Ok(order_id);
        }

        let digest = utils::content_digest(&offer.positions())?;
        let order = Order::from_offer(OrderId::generate()?, &offer, digest);
        let order_id = self.store.commit_conversion(offer_id, &order)?;

        if &order_id == order.id() {
            tracing::info!(order_id = %order_id, "offer converted into order");
        } else {
            tracing::debug!(order_id = %order_id, "offer converted concurrently");
        }
        Ok(order_id)
    }
}
