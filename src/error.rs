/// Broken business rules. These are caller-visible and never retried.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BusinessRuleError {
    #[error("Offer {offer_id} must be in status '{required}' to be converted, but is '{actual}'")]
    OfferNotAccepted {
        offer_id: String,
        required: String,
        actual: String,
    },
    #[error("Company {0} is inactive")]
    InactiveCompany(String),
    #[error("Customer {0} is inactive")]
    InactiveCustomer(String),
    #[error("Party {0} is not a customer")]
    NotACustomer(String),
    #[error("Offer {offer_id} was already converted into order {order_id}")]
    OfferAlreadyConverted { offer_id: String, order_id: String },
    #[error("{kind} {id} can only be edited in status 'Draft', but is '{status}'")]
    NotEditable {
        kind: &'static str,
        id: String,
        status: String,
    },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{kind} status change from '{from}' to '{to}' is not allowed")]
    NotAllowed {
        kind: &'static str,
        from: String,
        to: String,
    },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("Document has no positions")]
    NoPositions,
    #[error("Position {0} has a zero quantity")]
    ZeroQuantity(u32),
    #[error("Position {line}: {field} of {value} basis points is out of range 0..=10000")]
    RateOutOfRange {
        line: u32,
        field: &'static str,
        value: u32,
    },
    #[error("Positions must be numbered 1..n without gaps, found line {found} at index {index}")]
    LineNumbering { index: usize, found: u32 },
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
    #[error("Amount overflow in position {0}")]
    Overflow(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Failed to encode row: {0}")]
    Encode(String),
    #[error("Failed to decode row: {0}")]
    Decode(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AccessError {
    #[error("User {user} needs role '{required}' in company {company}")]
    Denied {
        user: String,
        company: String,
        required: String,
    },
}
