//! Companies, business parties and user roles
use super::error::ValidationError;
use super::types::{CompanyId, PartyId};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Company {
    #[n(0)]
    pub id: CompanyId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub active: bool,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyKind {
    #[n(0)]
    Customer,
    #[n(1)]
    Supplier,
}

// a customer or supplier, always owned by one company
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Party {
    #[n(0)]
    pub id: PartyId,
    #[n(1)]
    pub company_id: CompanyId,
    #[n(2)]
    pub kind: PartyKind,
    #[n(3)]
    pub name: String,
    #[n(4)]
    pub email: Option<String>,
    #[n(5)]
    pub active: bool,
}

impl Party {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("Party name"));
        }
        if let Some(email) = &self.email {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
            if !valid {
                return Err(ValidationError::InvalidEmail(email.clone()));
            }
        }
        Ok(())
    }
}

/// Role of a user within one company. Roles are ordered: each one includes
/// the rights of the ones below it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    #[n(0)]
    Viewer,
    #[n(1)]
    Editor,
    #[n(2)]
    Admin,
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyKind::Customer => f.write_str("Customer"),
            PartyKind::Supplier => f.write_str("Supplier"),
        }
    }
}

impl FromStr for PartyKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(PartyKind::Customer),
            "supplier" => Ok(PartyKind::Supplier),
            _ => Err(ValidationError::UnknownValue {
                kind: "party kind",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Viewer => f.write_str("Viewer"),
            Role::Editor => f.write_str("Editor"),
            Role::Admin => f.write_str("Admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            _ => Err(ValidationError::UnknownValue {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(email: Option<&str>) -> Party {
        Party {
            id: PartyId::from("party1a"),
            company_id: CompanyId::from("company1a"),
            kind: PartyKind::Customer,
            name: "ACME GmbH".into(),
            email: email.map(str::to_string),
            active: true,
        }
    }

    #[test]
    fn email_needs_both_sides() {
        assert!(party(None).validate().is_ok());
        assert!(party(Some("sales@acme.example")).validate().is_ok());
        assert!(party(Some("sales@")).validate().is_err());
        assert!(party(Some("acme.example")).validate().is_err());
    }

    #[test]
    fn roles_are_ordered() {
        assert!(Role::Admin > Role::Editor);
        assert!(Role::Editor > Role::Viewer);
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
    }
}
