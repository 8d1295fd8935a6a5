//! Service layer API for the document workflow
use super::conversion::ConversionService;
use super::document::{DocumentDraft, Offer, Order, Position};
use super::error::{BusinessRuleError, ValidationError};
use super::master_data::{Company, Party, PartyKind, Role};
use super::repository::{
    AccessRepository, CompanyRepository, OfferRepository, OrderRepository, PartyRepository,
};
use super::status::{OfferStatus, OrderStatus};
use super::store::Store;
use super::types::{CompanyId, OfferId, OrderId, PartyId, UserId};
use tracing::instrument;

pub struct DocumentService {
    companies: CompanyRepository,
    parties: PartyRepository,
    access: AccessRepository,
    offers: OfferRepository,
    orders: OrderRepository,
    conversion: ConversionService<Store>,
}

impl DocumentService {
    pub fn new(store: Store) -> Self {
        Self {
            companies: CompanyRepository::new(store.clone()),
            parties: PartyRepository::new(store.clone()),
            access: AccessRepository::new(store.clone()),
            offers: OfferRepository::new(store.clone()),
            orders: OrderRepository::new(store.clone()),
            conversion: ConversionService::new(store),
        }
    }

    pub fn access(&self) -> &AccessRepository {
        &self.access
    }

    /// Create a company. The creating user becomes its admin.
    pub fn create_company(&self, name: &str, creator: &UserId) -> anyhow::Result<Company> {
        if name.trim().is_empty() {
            return Err(ValidationError::Empty("Company name").into());
        }
        let company = Company {
            id: CompanyId::generate()?,
            name: name.trim().to_string(),
            active: true,
        };
        self.companies.insert(&company)?;
        self.access.grant(creator, &company.id, Role::Admin)?;
        tracing::info!(company_id = %company.id, name = %company.name, "company created");
        Ok(company)
    }

    pub fn company(&self, id: &CompanyId) -> anyhow::Result<Company> {
        Ok(self.companies.get(id)?)
    }

    pub fn companies(&self) -> anyhow::Result<Vec<Company>> {
        Ok(self.companies.list()?)
    }

    /// Deactivated companies keep their documents readable, but no new parties,
    /// documents or conversions can be created for them.
    pub fn deactivate_company(&self, id: &CompanyId) -> anyhow::Result<Company> {
        self.companies.set_active(id, false)
    }

    fn require_active_company(&self, id: &CompanyId) -> anyhow::Result<()> {
        if !self.companies.get(id)?.active {
            return Err(BusinessRuleError::InactiveCompany(id.to_string()).into());
        }
        Ok(())
    }

    pub fn add_party(
        &self,
        company_id: &CompanyId,
        kind: PartyKind,
        name: &str,
        email: Option<String>,
    ) -> anyhow::Result<Party> {
        self.require_active_company(company_id)?;
        let party = Party {
            id: PartyId::generate()?,
            company_id: company_id.clone(),
            kind,
            name: name.trim().to_string(),
            email,
            active: true,
        };
        self.parties.insert(&party)?;
        tracing::info!(party_id = %party.id, %kind, "party added");
        Ok(party)
    }

    pub fn parties(
        &self,
        company_id: &CompanyId,
        kind: Option<PartyKind>,
    ) -> anyhow::Result<Vec<Party>> {
        Ok(self.parties.list(company_id, kind)?)
    }

    pub fn deactivate_party(&self, company_id: &CompanyId, id: &PartyId) -> anyhow::Result<Party> {
        self.parties.set_active(company_id, id, false)
    }

    /// Create an offer in `Draft` for an active customer of the draft's company
    pub fn create_offer(&self, draft: DocumentDraft) -> anyhow::Result<Offer> {
        self.check_customer(&draft)?;
        let offer = Offer::create(OfferId::generate()?, draft)?;
        Ok(self.offers.create(&offer)?)
    }

    /// Create an order in `Draft` that is not based on an offer
    pub fn create_order(&self, draft: DocumentDraft) -> anyhow::Result<Order> {
        self.check_customer(&draft)?;
        let order = Order::create(OrderId::generate()?, draft)?;
        Ok(self.orders.create(&order)?)
    }

    fn check_customer(&self, draft: &DocumentDraft) -> anyhow::Result<()> {
        self.require_active_company(draft.company_id())?;
        // a missing customer is reported by the draft validation
        if let Some(customer) = draft.customer_id() {
            self.parties.require_customer(draft.company_id(), customer)?;
        }
        Ok(())
    }

    pub fn offer(&self, company_id: &CompanyId, id: &OfferId) -> anyhow::Result<Offer> {
        Ok(self.offers.get(company_id, id)?)
    }

    pub fn offers(
        &self,
        company_id: &CompanyId,
        status: Option<OfferStatus>,
    ) -> anyhow::Result<Vec<Offer>> {
        Ok(self.offers.list(company_id, status)?)
    }

    pub fn order(&self, company_id: &CompanyId, id: &OrderId) -> anyhow::Result<Order> {
        Ok(self.orders.get(company_id, id)?)
    }

    pub fn orders(
        &self,
        company_id: &CompanyId,
        status: Option<OrderStatus>,
    ) -> anyhow::Result<Vec<Order>> {
        Ok(self.orders.list(company_id, status)?)
    }

    pub fn order_for_offer(
        &self,
        company_id: &CompanyId,
        offer_id: &OfferId,
    ) -> anyhow::Result<Option<OrderId>> {
        Ok(self.orders.find_by_offer(company_id, offer_id)?)
    }

    #[instrument(skip_all, fields(offer_id = %id, company_id = %company_id, status = %status))]
    pub fn set_offer_status(
        &self,
        id: &OfferId,
        company_id: &CompanyId,
        status: OfferStatus,
    ) -> anyhow::Result<Offer> {
        self.offers.set_status(id, company_id, status)
    }

    #[instrument(skip_all, fields(order_id = %id, company_id = %company_id, status = %status))]
    pub fn set_order_status(
        &self,
        id: &OrderId,
        company_id: &CompanyId,
        status: OrderStatus,
    ) -> anyhow::Result<Order> {
        self.orders.set_status(id, company_id, status)
    }

    pub fn send_offer(&self, id: &OfferId, company_id: &CompanyId) -> anyhow::Result<Offer> {
        self.set_offer_status(id, company_id, OfferStatus::Sent)
    }

    pub fn accept_offer(&self, id: &OfferId, company_id: &CompanyId) -> anyhow::Result<Offer> {
        self.set_offer_status(id, company_id, OfferStatus::Accepted)
    }

    pub fn reject_offer(&self, id: &OfferId, company_id: &CompanyId) -> anyhow::Result<Offer> {
        self.set_offer_status(id, company_id, OfferStatus::Rejected)
    }

    pub fn cancel_offer(&self, id: &OfferId, company_id: &CompanyId) -> anyhow::Result<Offer> {
        self.set_offer_status(id, company_id, OfferStatus::Cancelled)
    }

    /// Replace the positions of an offer that is still a draft
    pub fn update_offer_positions(
        &self,
        id: &OfferId,
        company_id: &CompanyId,
        positions: Vec<Position>,
    ) -> anyhow::Result<Offer> {
        self.offers.update_positions(id, company_id, positions)
    }

    /// Convert an accepted offer into an order, see [`ConversionService`]
    pub fn create_from_offer(
        &self,
        offer_id: &OfferId,
        company_id: &CompanyId,
    ) -> anyhow::Result<OrderId> {
        self.require_active_company(company_id)?;
        self.conversion.create_from_offer(offer_id, company_id)
    }

    pub fn delete_offer(&self, id: &OfferId, company_id: &CompanyId) -> anyhow::Result<()> {
        self.offers.delete(id, company_id)
    }

    pub fn delete_order(&self, id: &OrderId, company_id: &CompanyId) -> anyhow::Result<()> {
        Ok(self.orders.delete(id, company_id)?)
    }
}
