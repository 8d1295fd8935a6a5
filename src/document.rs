//! Offer and order documents
//!
//! Entities keep their fields private. New documents come from a validated draft,
//! stored ones are rebuilt from their row through `restore`, which takes every
//! persisted field.
use super::error::{BusinessRuleError, TransitionError, ValidationError};
use super::status::{DocumentStatus, OfferStatus, OrderStatus};
use super::types::{CompanyId, Currency, OfferId, OrderId, PartyId, TimeStamp};
use chrono::Utc;

const BASIS_POINTS: u128 = 10_000;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Position {
    #[n(0)]
    pub line: u32,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub quantity: u32,
    #[n(3)]
    pub unit_price: u64, // minor currency units
    #[n(4)]
    pub discount_bp: u32,
    #[n(5)]
    pub tax_rate_bp: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub net: u64,
    pub tax: u64,
    pub gross: u64,
}

impl Position {
    pub fn new(line: u32, description: impl Into<String>, quantity: u32, unit_price: u64) -> Self {
        Self {
            line,
            description: description.into(),
            quantity,
            unit_price,
            discount_bp: 0,
            tax_rate_bp: 0,
        }
    }
    pub fn with_discount(mut self, discount_bp: u32) -> Self {
        self.discount_bp = discount_bp;
        self
    }
    pub fn with_tax_rate(mut self, tax_rate_bp: u32) -> Self {
        self.tax_rate_bp = tax_rate_bp;
        self
    }

    // amounts are rounded half up to the minor unit
    fn amounts(&self) -> (u128, u128) {
        let list = self.quantity as u128 * self.unit_price as u128;
        let keep = BASIS_POINTS - (self.discount_bp as u128).min(BASIS_POINTS);
        let net = (list * keep + BASIS_POINTS / 2) / BASIS_POINTS;
        let tax = (net * self.tax_rate_bp as u128 + BASIS_POINTS / 2) / BASIS_POINTS;
        (net, tax)
    }

    fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if self.line as usize != index + 1 {
            return Err(ValidationError::LineNumbering {
                index,
                found: self.line,
            });
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::Empty("Position description"));
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity(self.line));
        }
        if self.discount_bp > 10_000 {
            return Err(ValidationError::RateOutOfRange {
                line: self.line,
                field: "discount",
                value: self.discount_bp,
            });
        }
        if self.tax_rate_bp > 10_000 {
            return Err(ValidationError::RateOutOfRange {
                line: self.line,
                field: "tax rate",
                value: self.tax_rate_bp,
            });
        }
        Ok(())
    }
}

/// Sums the positions. Fails if a total does not fit into `u64`.
pub fn totals(positions: &[Position]) -> Result<Totals, ValidationError> {
    let mut net: u128 = 0;
    let mut tax: u128 = 0;
    for p in positions {
        let (n, t) = p.amounts();
        net += n;
        tax += t;
        if net + tax > u64::MAX as u128 {
            return Err(ValidationError::Overflow(p.line));
        }
    }
    // bounded by the check above
    Ok(Totals {
        net: net as u64,
        tax: tax as u64,
        gross: (net + tax) as u64,
    })
}

/// Checks that the positions are non-empty, numbered 1..n and individually valid.
pub fn validate_positions(positions: &[Position]) -> Result<(), ValidationError> {
    if positions.is_empty() {
        return Err(ValidationError::NoPositions);
    }
    for (index, p) in positions.iter().enumerate() {
        p.validate(index)?;
    }
    totals(positions).map(|_| ())
}

// Shared draft used for offers and for orders created without an offer.
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    company_id: CompanyId,
    customer_id: Option<PartyId>,
    title: String,
    currency: Option<Currency>,
    positions: Vec<Position>,
}

impl DocumentDraft {
    /// Construct a new draft, this becomes the basis for an offer or order
    pub fn new(company_id: CompanyId) -> Self {
        Self {
            company_id,
            customer_id: None,
            title: String::new(),
            currency: None,
            positions: vec![],
        }
    }
    pub fn set_customer(mut self, customer_id: PartyId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }
    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
    pub fn set_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
    /// Appends a position without discount or tax; the line number is assigned.
    pub fn add_position(
        self,
        description: impl Into<String>,
        quantity: u32,
        unit_price: u64,
    ) -> Self {
        let line = self.positions.len() as u32 + 1;
        self.push_position(Position::new(line, description, quantity, unit_price))
    }
    /// Appends a position, renumbering it to the next free line.
    pub fn push_position(mut self, mut position: Position) -> Self {
        position.line = self.positions.len() as u32 + 1;
        self.positions.push(position);
        self
    }

    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
    pub fn customer_id(&self) -> Option<&PartyId> {
        self.customer_id.as_ref()
    }

    /// Checks fields and positions. Returns the parts a document is built from.
    pub fn validate(&self) -> Result<(PartyId, Currency), ValidationError> {
        let customer_id = self
            .customer_id
            .clone()
            .ok_or(ValidationError::Empty("Customer"))?;
        let currency = self.currency.ok_or(ValidationError::Empty("Currency"))?;
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty("Title"));
        }
        validate_positions(&self.positions)?;
        Ok((customer_id, currency))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OfferRecord {
    #[n(0)]
    pub id: OfferId,
    #[n(1)]
    pub company_id: CompanyId,
    #[n(2)]
    pub customer_id: PartyId,
    #[n(3)]
    pub number: String,
    #[n(4)]
    pub title: String,
    #[n(5)]
    pub currency: Currency,
    #[n(6)]
    pub positions: Vec<Position>,
    #[n(7)]
    pub status: String, // OfferStatus::to_db
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub updated_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    id: OfferId,
    company_id: CompanyId,
    customer_id: PartyId,
    number: String,
    title: String,
    currency: Currency,
    positions: Vec<Position>,
    status: OfferStatus,
    created_at: TimeStamp<Utc>,
    updated_at: TimeStamp<Utc>,
}

impl Offer {
    /// Builds a new offer in `Draft`. The number is assigned when it is stored.
    pub fn create(id: OfferId, draft: DocumentDraft) -> Result<Self, ValidationError> {
        let (customer_id, currency) = draft.validate()?;
        let now = TimeStamp::new();
        Ok(Self {
            id,
            company_id: draft.company_id,
            customer_id,
            number: String::new(),
            title: draft.title,
            currency,
            positions: draft.positions,
            status: OfferStatus::INITIAL,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn restore(record: OfferRecord) -> Self {
        Self {
            status: OfferStatus::from_db(&record.status),
            id: record.id,
            company_id: record.company_id,
            customer_id: record.customer_id,
            number: record.number,
            title: record.title,
            currency: record.currency,
            positions: record.positions,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn to_record(&self) -> OfferRecord {
        OfferRecord {
            id: self.id.clone(),
            company_id: self.company_id.clone(),
            customer_id: self.customer_id.clone(),
            number: self.number.clone(),
            title: self.title.clone(),
            currency: self.currency,
            positions: self.positions.clone(),
            status: self.status.to_db().to_string(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    pub fn id(&self) -> &OfferId {
        &self.id
    }
    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
    pub fn customer_id(&self) -> &PartyId {
        &self.customer_id
    }
    pub fn number(&self) -> &str {
        &self.number
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn currency(&self) -> Currency {
        self.currency
    }
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }
    pub fn status(&self) -> OfferStatus {
        self.status
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn updated_at(&self) -> &TimeStamp<Utc> {
        &self.updated_at
    }
    pub fn totals(&self) -> Result<Totals, ValidationError> {
        totals(&self.positions)
    }

    pub(crate) fn assign_number(&mut self, number: String) {
        self.number = number;
    }

    pub fn set_status(&mut self, to: OfferStatus) -> Result<(), TransitionError> {
        check_transition(self.status, to)?;
        self.status = to;
        self.updated_at = TimeStamp::new();
        Ok(())
    }

    /// Positions can only change while the offer is still a draft.
    pub fn replace_positions(&mut self, positions: Vec<Position>) -> anyhow::Result<()> {
        if self.status != OfferStatus::Draft {
            return Err(BusinessRuleError::NotEditable {
                kind: OfferStatus::KIND,
                id: self.id.to_string(),
                status: self.status.to_string(),
            }
            .into());
        }
        validate_positions(&positions)?;
        self.positions = positions;
        self.updated_at = TimeStamp::new();
        Ok(())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    #[n(0)]
    pub id: OrderId,
    #[n(1)]
    pub company_id: CompanyId,
    #[n(2)]
    pub customer_id: PartyId,
    #[n(3)]
    pub number: String,
    #[n(4)]
    pub title: String,
    #[n(5)]
    pub currency: Currency,
    #[n(6)]
    pub positions: Vec<Position>,
    #[n(7)]
    pub status: String, // OrderStatus::to_db
    #[n(8)]
    pub offer_id: Option<OfferId>,
    #[n(9)]
    pub source_digest: Option<String>,
    #[n(10)]
    pub created_at: TimeStamp<Utc>,
    #[n(11)]
    pub updated_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    company_id: CompanyId,
    customer_id: PartyId,
    number: String,
    title: String,
    currency: Currency,
    positions: Vec<Position>,
    status: OrderStatus,
    offer_id: Option<OfferId>,
    source_digest: Option<String>,
    created_at: TimeStamp<Utc>,
    updated_at: TimeStamp<Utc>,
}

impl Order {
    /// Builds a new order in `Draft` that has no source offer. The number is
    /// assigned when it is stored.
    pub fn create(id: OrderId, draft: DocumentDraft) -> Result<Self, ValidationError> {
        let (customer_id, currency) = draft.validate()?;
        let now = TimeStamp::new();
        Ok(Self {
            id,
            company_id: draft.company_id,
            customer_id,
            number: String::new(),
            title: draft.title,
            currency,
            positions: draft.positions,
            status: OrderStatus::INITIAL,
            offer_id: None,
            source_digest: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Builds the order for a converted offer, copying its positions.
    /// `source_digest` is the content hash of the copied positions.
    pub fn from_offer(id: OrderId, offer: &Offer, source_digest: String) -> Self {
        let now = TimeStamp::new();
        Self {
            id,
            company_id: offer.company_id.clone(),
            customer_id: offer.customer_id.clone(),
            number: String::new(),
            title: offer.title.clone(),
            currency: offer.currency,
            positions: offer.positions.clone(),
            status: OrderStatus::INITIAL,
            offer_id: Some(offer.id.clone()),
            source_digest: Some(source_digest),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn restore(record: OrderRecord) -> Self {
        Self {
            status: OrderStatus::from_db(&record.status),
            id: record.id,
            company_id: record.company_id,
            customer_id: record.customer_id,
            number: record.number,
            title: record.title,
            currency: record.currency,
            positions: record.positions,
            offer_id: record.offer_id,
            source_digest: record.source_digest,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id.clone(),
            company_id: self.company_id.clone(),
            customer_id: self.customer_id.clone(),
            number: self.number.clone(),
            title: self.title.clone(),
            currency: self.currency,
            positions: self.positions.clone(),
            status: self.status.to_db().to_string(),
            offer_id: self.offer_id.clone(),
            source_digest: self.source_digest.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }
    pub fn company_id(&self) -> &CompanyId {
        &self.company_id
    }
    pub fn customer_id(&self) -> &PartyId {
        &self.customer_id
    }
    pub fn number(&self) -> &str {
        &self.number
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn currency(&self) -> Currency {
        self.currency
    }
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }
    pub fn status(&self) -> OrderStatus {
        self.status
    }
    pub fn offer_id(&self) -> Option<&OfferId> {
        self.offer_id.as_ref()
    }
    pub fn source_digest(&self) -> Option<&str> {
        self.source_digest.as_deref()
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn updated_at(&self) -> &TimeStamp<Utc> {
        &self.updated_at
    }
    pub fn totals(&self) -> Result<Totals, ValidationError> {
        totals(&self.positions)
    }

    pub(crate) fn assign_number(&mut self, number: String) {
        self.number = number;
    }

    pub fn set_status(&mut self, to: OrderStatus) -> Result<(), TransitionError> {
        check_transition(self.status, to)?;
        self.status = to;
        self.updated_at = TimeStamp::new();
        Ok(())
    }
}

pub(crate) fn check_transition<S: DocumentStatus + std::fmt::Display>(
    from: S,
    to: S,
) -> Result<(), TransitionError> {
    if S::is_transition_allowed(from, to) {
        return Ok(());
    }
    Err(TransitionError::NotAllowed {
        kind: S::KIND,
        from: from.to_string(),
        to: to.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DocumentDraft {
        DocumentDraft::new(CompanyId::from("company1test"))
            .set_customer(PartyId::from("party1test"))
            .set_title("Office chairs")
            .set_currency(Currency::EUR)
            .add_position("Chair", 4, 12_500)
            .push_position(Position::new(0, "Delivery", 1, 4_000).with_tax_rate(1_900))
    }

    #[test]
    fn draft_assigns_line_numbers() {
        let offer = Offer::create(OfferId::from("offer1a"), draft()).unwrap();
        let lines: Vec<u32> = offer.positions().iter().map(|p| p.line).collect();
        assert_eq!(lines, vec![1, 2]);
        assert_eq!(offer.status(), OfferStatus::Draft);
    }

    #[test]
    fn draft_requires_customer_and_positions() {
        let no_customer = DocumentDraft::new(CompanyId::from("company1test"))
            .set_title("x")
            .set_currency(Currency::EUR)
            .add_position("a", 1, 1);
        assert_eq!(no_customer.validate(), Err(ValidationError::Empty("Customer")));

        let no_positions = DocumentDraft::new(CompanyId::from("company1test"))
            .set_customer(PartyId::from("party1test"))
            .set_title("x")
            .set_currency(Currency::EUR);
        assert_eq!(no_positions.validate(), Err(ValidationError::NoPositions));
    }

    #[test]
    fn totals_round_half_up() {
        // 3 x 333 = 999, 10% off = 899.1 -> 899, 19% tax = 170.81 -> 171
        let p = Position::new(1, "Widget", 3, 333)
            .with_discount(1_000)
            .with_tax_rate(1_900);
        let t = totals(&[p]).unwrap();
        assert_eq!(t, Totals { net: 899, tax: 171, gross: 1_070 });
    }

    #[test]
    fn rejects_bad_positions() {
        let zero = vec![Position::new(1, "a", 0, 10)];
        assert_eq!(validate_positions(&zero), Err(ValidationError::ZeroQuantity(1)));

        let gap = vec![Position::new(1, "a", 1, 10), Position::new(3, "b", 1, 10)];
        assert!(matches!(
            validate_positions(&gap),
            Err(ValidationError::LineNumbering { index: 1, found: 3 })
        ));

        let rate = vec![Position::new(1, "a", 1, 10).with_tax_rate(10_001)];
        assert!(matches!(
            validate_positions(&rate),
            Err(ValidationError::RateOutOfRange { .. })
        ));
    }

    #[test]
    fn totals_overflow_is_an_error() {
        let p = Position::new(1, "Huge", u32::MAX, u64::MAX);
        assert_eq!(totals(&[p]), Err(ValidationError::Overflow(1)));
    }

    #[test]
    fn offer_record_round_trip() {
        let offer = Offer::create(OfferId::from("offer1a"), draft()).unwrap();
        let cbor = minicbor::to_vec(offer.to_record()).unwrap();
        let record: OfferRecord = minicbor::decode(&cbor).unwrap();
        assert_eq!(Offer::restore(record), offer);
    }

    #[test]
    fn restore_with_unknown_status_is_draft() {
        let offer = Offer::create(OfferId::from("offer1a"), draft()).unwrap();
        let mut record = offer.to_record();
        record.status = "Archived".into();
        assert_eq!(Offer::restore(record).status(), OfferStatus::Draft);
    }

    #[test]
    fn offer_status_follows_table() {
        let mut offer = Offer::create(OfferId::from("offer1a"), draft()).unwrap();
        assert!(offer.set_status(OfferStatus::Accepted).is_err());
        offer.set_status(OfferStatus::Sent).unwrap();
        offer.set_status(OfferStatus::Accepted).unwrap();
        let err = offer.set_status(OfferStatus::Cancelled).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Offer status change from 'Accepted' to 'Cancelled' is not allowed"
        );
    }

    #[test]
    fn positions_frozen_after_draft() {
        let mut offer = Offer::create(OfferId::from("offer1a"), draft()).unwrap();
        offer
            .replace_positions(vec![Position::new(1, "Desk", 1, 30_000)])
            .unwrap();
        offer.set_status(OfferStatus::Sent).unwrap();
        let err = offer
            .replace_positions(vec![Position::new(1, "Desk", 2, 30_000)])
            .unwrap_err();
        assert!(err.downcast_ref::<BusinessRuleError>().is_some());
    }

    #[test]
    fn order_from_offer_copies_positions() {
        let offer = Offer::create(OfferId::from("offer1a"), draft()).unwrap();
        let order = Order::from_offer(
            OrderId::from("order1a"),
            &offer,
            "digest".into(),
        );
        assert_eq!(order.positions(), offer.positions());
        assert_eq!(order.offer_id(), Some(offer.id()));
        assert_eq!(order.status(), OrderStatus::Draft);
        assert_eq!(order.totals(), offer.totals());
    }
}
