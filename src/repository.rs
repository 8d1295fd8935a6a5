//! Company scoped repositories over the store trees
use super::document::{Offer, Order, Position};
use super::error::{AccessError, BusinessRuleError, StorageError};
use super::master_data::{Company, Party, PartyKind, Role};
use super::status::{OfferStatus, OrderStatus};
use super::store::{
    Row, Store, abort, decode, encode, finish, get_row, next_in_sequence, scan_rows,
    scope_prefix, scoped_key, sequence_key, update_row,
};
use super::types::{CompanyId, OfferId, OrderId, PartyId, UserId};
use chrono::Datelike;
use sled::transaction::{ConflictableTransactionError, TransactionResult, Transactional};

pub struct CompanyRepository {
    store: Store,
}

impl CompanyRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn insert(&self, company: &Company) -> Result<(), StorageError> {
        self.store
            .companies
            .insert(company.id.as_str(), company.encode_row()?)?;
        Ok(())
    }

    pub fn get(&self, id: &CompanyId) -> Result<Company, StorageError> {
        get_row(&self.store.companies, id.as_str().as_bytes(), id.as_str())
    }

    pub fn list(&self) -> Result<Vec<Company>, StorageError> {
        let mut companies: Vec<Company> = scan_rows(&self.store.companies, &[])?;
        companies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(companies)
    }

    pub fn set_active(&self, id: &CompanyId, active: bool) -> anyhow::Result<Company> {
        update_row(&self.store.companies, id.as_str().as_bytes(), id.as_str(), |c: &mut Company| {
            c.active = active;
            Ok(())
        })
    }
}

pub struct PartyRepository {
    store: Store,
}

impl PartyRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Validates and stores a party. The owning company must exist.
    pub fn insert(&self, party: &Party) -> anyhow::Result<()> {
        party.validate()?;
        CompanyRepository::new(self.store.clone()).get(&party.company_id)?;

        let key = scoped_key(party.company_id.as_str(), party.id.as_str());
        self.store
            .parties
            .insert(key, party.encode_row()?)
            .map_err(StorageError::from)?;
        Ok(())
    }

    pub fn get(&self, company_id: &CompanyId, id: &PartyId) -> Result<Party, StorageError> {
        let key = scoped_key(company_id.as_str(), id.as_str());
        get_row(&self.store.parties, &key, id.as_str())
    }

    pub fn list(
        &self,
        company_id: &CompanyId,
        kind: Option<PartyKind>,
    ) -> Result<Vec<Party>, StorageError> {
        let prefix = scope_prefix(company_id.as_str());
        let mut parties: Vec<Party> = scan_rows(&self.store.parties, &prefix)?;
        parties.retain(|p| kind.is_none_or(|k| p.kind == k));
        parties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parties)
    }

    pub fn set_active(
        &self,
        company_id: &CompanyId,
        id: &PartyId,
        active: bool,
    ) -> anyhow::Result<Party> {
        let key = scoped_key(company_id.as_str(), id.as_str());
        update_row(&self.store.parties, &key, id.as_str(), |p: &mut Party| {
            p.active = active;
            Ok(())
        })
    }

    /// Loads the party and checks it can be used as customer of a document.
    pub fn require_customer(&self, company_id: &CompanyId, id: &PartyId) -> anyhow::Result<Party> {
        let party = self.get(company_id, id)?;
        if party.kind != PartyKind::Customer {
            return Err(BusinessRuleError::NotACustomer(id.to_string()).into());
        }
        if !party.active {
            return Err(BusinessRuleError::InactiveCustomer(id.to_string()).into());
        }
        Ok(party)
    }
}

// keyed by user first so all companies of one user are a prefix scan
pub struct AccessRepository {
    store: Store,
}

impl AccessRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn grant(
        &self,
        user: &UserId,
        company_id: &CompanyId,
        role: Role,
    ) -> Result<(), StorageError> {
        let key = scoped_key(user.as_str(), company_id.as_str());
        self.store.access.insert(key, encode(&role)?)?;
        tracing::info!(user = %user, company_id = %company_id, %role, "access granted");
        Ok(())
    }

    /// Returns whether the user had access before.
    pub fn revoke(&self, user: &UserId, company_id: &CompanyId) -> Result<bool, StorageError> {
        let key = scoped_key(user.as_str(), company_id.as_str());
        let removed = self.store.access.remove(key)?.is_some();
        if removed {
            tracing::info!(user = %user, company_id = %company_id, "access revoked");
        }
        Ok(removed)
    }

    pub fn role(
        &self,
        user: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<Role>, StorageError> {
        let key = scoped_key(user.as_str(), company_id.as_str());
        self.store
            .access
            .get(key)?
            .map(|bytes| decode::<Role>(&bytes))
            .transpose()
    }

    pub fn require(
        &self,
        user: &UserId,
        company_id: &CompanyId,
        required: Role,
    ) -> anyhow::Result<Role> {
        match self.role(user, company_id)? {
            Some(role) if role >= required => Ok(role),
            _ => Err(AccessError::Denied {
                user: user.to_string(),
                company: company_id.to_string(),
                required: required.to_string(),
            }
            .into()),
        }
    }

    pub fn companies_of(&self, user: &UserId) -> Result<Vec<(CompanyId, Role)>, StorageError> {
        let prefix = scope_prefix(user.as_str());
        self.store
            .access
            .scan_prefix(&prefix)
            .map(|entry| {
                let (key, value) = entry?;
                let company = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                Ok((CompanyId::from(company), decode::<Role>(&value)?))
            })
            .collect()
    }
}

pub struct OfferRepository {
    store: Store,
}

impl OfferRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Stores a new offer, assigning the next offer number of its company.
    pub fn create(&self, offer: &Offer) -> Result<Offer, StorageError> {
        let company = offer.company_id().as_str();
        let year = offer.created_at().to_datetime_utc().year();
        let seq_key = sequence_key(company, "offer", year);
        let key = scoped_key(company, offer.id().as_str());
        let numbering = self.store.numbering();

        let result: TransactionResult<Offer, StorageError> =
            (&self.store.offers, &self.store.sequences).transaction(|(offers, seqs)| {
                let sequence = next_in_sequence::<StorageError>(seqs, &seq_key)?;
                let mut offer = offer.clone();
                offer.assign_number(numbering.format(&numbering.offer_prefix, year, sequence));
                let row = offer
                    .encode_row()
                    .map_err(ConflictableTransactionError::Abort)?;
                offers.insert(key.as_slice(), row)?;
                Ok(offer)
            });
        let offer = finish(result)?;
        tracing::info!(offer_id = %offer.id(), number = offer.number(), "offer created");
        Ok(offer)
    }

    pub fn get(&self, company_id: &CompanyId, id: &OfferId) -> Result<Offer, StorageError> {
        let key = scoped_key(company_id.as_str(), id.as_str());
        get_row(&self.store.offers, &key, id.as_str())
    }

    pub fn list(
        &self,
        company_id: &CompanyId,
        status: Option<OfferStatus>,
    ) -> Result<Vec<Offer>, StorageError> {
        let prefix = scope_prefix(company_id.as_str());
        let mut offers: Vec<Offer> = scan_rows(&self.store.offers, &prefix)?;
        offers.retain(|o| status.is_none_or(|s| o.status() == s));
        offers.sort_by(|a, b| a.number().cmp(b.number()));
        Ok(offers)
    }

    /// Persists a new status. Transitions outside the offer table are rejected
    /// with a [`TransitionError`](crate::error::TransitionError).
    pub fn set_status(
        &self,
        id: &OfferId,
        company_id: &CompanyId,
        status: OfferStatus,
    ) -> anyhow::Result<Offer> {
        let key = scoped_key(company_id.as_str(), id.as_str());
        let mut from = None;
        let offer = update_row(&self.store.offers, &key, id.as_str(), |offer: &mut Offer| {
            from = Some(offer.status());
            offer.set_status(status)?;
            Ok(())
        })?;
        tracing::info!(offer_id = %id, ?from, to = %status, "offer status changed");
        Ok(offer)
    }

    pub fn update_positions(
        &self,
        id: &OfferId,
        company_id: &CompanyId,
        positions: Vec<Position>,
    ) -> anyhow::Result<Offer> {
        let key = scoped_key(company_id.as_str(), id.as_str());
        update_row(&self.store.offers, &key, id.as_str(), |offer: &mut Offer| {
            offer.replace_positions(positions.clone())
        })
    }

    /// Deletes an offer that has not been converted into an order.
    pub fn delete(&self, id: &OfferId, company_id: &CompanyId) -> anyhow::Result<()> {
        let key = scoped_key(company_id.as_str(), id.as_str());

        let result: TransactionResult<(), anyhow::Error> =
            (&self.store.offers, &self.store.links).transaction(|(offers, links)| {
                if let Some(order) = links.get(key.as_slice())? {
                    let order_id: OrderId = decode(&order)
                        .map_err(|e| ConflictableTransactionError::Abort(anyhow::Error::from(e)))?;
                    return abort(BusinessRuleError::OfferAlreadyConverted {
                        offer_id: id.to_string(),
                        order_id: order_id.to_string(),
                    });
                }
                if offers.remove(key.as_slice())?.is_none() {
                    return abort(StorageError::NotFound {
                        entity: Offer::ENTITY,
                        id: id.to_string(),
                    });
                }
                Ok(())
            });
        finish(result)?;
        tracing::info!(offer_id = %id, "offer deleted");
        Ok(())
    }
}

pub struct OrderRepository {
    store: Store,
}

impl OrderRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Stores a new order, assigning the next order number of its company.
    pub fn create(&self, order: &Order) -> Result<Order, StorageError> {
        let company = order.company_id().as_str();
        let year = order.created_at().to_datetime_utc().year();
        let seq_key = sequence_key(company, "order", year);
        let key = scoped_key(company, order.id().as_str());
        let numbering = self.store.numbering();

        let result: TransactionResult<Order, StorageError> =
            (&self.store.orders, &self.store.sequences).transaction(|(orders, seqs)| {
                let sequence = next_in_sequence::<StorageError>(seqs, &seq_key)?;
                let mut order = order.clone();
                order.assign_number(numbering.format(&numbering.order_prefix, year, sequence));
                let row = order
                    .encode_row()
                    .map_err(ConflictableTransactionError::Abort)?;
                orders.insert(key.as_slice(), row)?;
                Ok(order)
            });
        let order = finish(result)?;
        tracing::info!(order_id = %order.id(), number = order.number(), "order created");
        Ok(order)
    }

    pub fn get(&self, company_id: &CompanyId, id: &OrderId) -> Result<Order, StorageError> {
        let key = scoped_key(company_id.as_str(), id.as_str());
        get_row(&self.store.orders, &key, id.as_str())
    }

    pub fn list(
        &self,
        company_id: &CompanyId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, StorageError> {
        let prefix = scope_prefix(company_id.as_str());
        let mut orders: Vec<Order> = scan_rows(&self.store.orders, &prefix)?;
        orders.retain(|o| status.is_none_or(|s| o.status() == s));
        orders.sort_by(|a, b| a.number().cmp(b.number()));
        Ok(orders)
    }

    /// The order an offer was converted into, if any.
    pub fn find_by_offer(
        &self,
        company_id: &CompanyId,
        offer_id: &OfferId,
    ) -> Result<Option<OrderId>, StorageError> {
        let key = scoped_key(company_id.as_str(), offer_id.as_str());
        self.store
            .links
            .get(key)?
            .map(|bytes| decode::<OrderId>(&bytes))
            .transpose()
    }

    /// Persists a new status. Transitions outside the order table are rejected
    /// with a [`TransitionError`](crate::error::TransitionError).
    pub fn set_status(
        &self,
        id: &OrderId,
        company_id: &CompanyId,
        status: OrderStatus,
    ) -> anyhow::Result<Order> {
        let key = scoped_key(company_id.as_str(), id.as_str());
        let mut from = None;
        let order = update_row(&self.store.orders, &key, id.as_str(), |order: &mut Order| {
            from = Some(order.status());
            order.set_status(status)?;
            Ok(())
        })?;
        tracing::info!(order_id = %id, ?from, to = %status, "order status changed");
        Ok(order)
    }

    /// Deletes an order together with the link to its source offer.
    pub fn delete(&self, id: &OrderId, company_id: &CompanyId) -> Result<(), StorageError> {
        let key = scoped_key(company_id.as_str(), id.as_str());

        let result: TransactionResult<(), StorageError> =
            (&self.store.orders, &self.store.links).transaction(|(orders, links)| {
                let Some(row) = orders.remove(key.as_slice())? else {
                    return abort(StorageError::NotFound {
                        entity: Order::ENTITY,
                        id: id.to_string(),
                    });
                };
                let order = Order::decode_row(&row).map_err(ConflictableTransactionError::Abort)?;
                if let Some(offer_id) = order.offer_id() {
                    links.remove(scoped_key(company_id.as_str(), offer_id.as_str()))?;
                }
                Ok(())
            });
        finish(result)?;
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }
}
