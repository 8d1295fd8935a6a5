//! Smoke tests for the master data repositories and role checks
//!
//! These run each repository on its own against a fresh database and mostly
//! cover the happy path.

use erp_documents::{
    config::Numbering,
    error::{AccessError, StorageError, ValidationError},
    master_data::{Company, Party, PartyKind, Role},
    repository::{AccessRepository, CompanyRepository, PartyRepository},
    store::Store,
    types::{CompanyId, PartyId, UserId},
    utils::new_uuid_to_bech32,
};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

fn open_store() -> (TempDir, Store) {
    let dir = tempdir().unwrap();
    let db = Arc::new(sled::open(dir.path().join("smoke.db")).unwrap());
    (dir, Store::open(db, Numbering::default()).unwrap())
}

fn company(name: &str) -> Company {
    Company {
        id: CompanyId::generate().unwrap(),
        name: name.into(),
        active: true,
    }
}

fn party(company_id: &CompanyId, kind: PartyKind, name: &str) -> Party {
    Party {
        id: PartyId::generate().unwrap(),
        company_id: company_id.clone(),
        kind,
        name: name.into(),
        email: None,
        active: true,
    }
}

// UTILS
#[test]
fn generated_ids_carry_their_prefix() {
    let id = new_uuid_to_bech32("offer").unwrap();
    assert!(id.starts_with("offer1"));
    assert_ne!(id, new_uuid_to_bech32("offer").unwrap());
    assert!(CompanyId::generate().unwrap().as_str().starts_with("company1"));
}

// COMPANIES
#[test]
fn companies_are_listed_by_name() {
    let (_dir, store) = open_store();
    let repo = CompanyRepository::new(store);
    let b = company("Bergmann KG");
    let a = company("Alpenblick AG");
    repo.insert(&b).unwrap();
    repo.insert(&a).unwrap();

    let names: Vec<_> = repo.list().unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["Alpenblick AG", "Bergmann KG"]);

    let updated = repo.set_active(&a.id, false).unwrap();
    assert!(!updated.active);
    assert!(!repo.get(&a.id).unwrap().active);
}

#[test]
fn missing_company_is_not_found() {
    let (_dir, store) = open_store();
    let repo = CompanyRepository::new(store);
    let err = repo.get(&CompanyId::from("company1missing")).unwrap_err();
    assert!(matches!(err, StorageError::NotFound { entity: "Company", .. }));
}

// PARTIES
#[test]
fn parties_filter_by_kind() {
    let (_dir, store) = open_store();
    let acme = company("Acme");
    CompanyRepository::new(store.clone()).insert(&acme).unwrap();
    let repo = PartyRepository::new(store);

    repo.insert(&party(&acme.id, PartyKind::Customer, "Zeller")).unwrap();
    repo.insert(&party(&acme.id, PartyKind::Customer, "Albrecht")).unwrap();
    repo.insert(&party(&acme.id, PartyKind::Supplier, "Metallbau Kurz")).unwrap();

    assert_eq!(repo.list(&acme.id, None).unwrap().len(), 3);
    let customers: Vec<_> = repo
        .list(&acme.id, Some(PartyKind::Customer))
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(customers, ["Albrecht", "Zeller"]);
    assert_eq!(repo.list(&acme.id, Some(PartyKind::Supplier)).unwrap().len(), 1);
}

#[test]
fn party_needs_existing_company_and_valid_email() {
    let (_dir, store) = open_store();
    let repo = PartyRepository::new(store.clone());

    let orphan = party(&CompanyId::from("company1nobody"), PartyKind::Customer, "Orphan");
    let err = repo.insert(&orphan).unwrap_err();
    assert!(err.downcast_ref::<StorageError>().is_some());

    let acme = company("Acme");
    CompanyRepository::new(store).insert(&acme).unwrap();
    let mut bad = party(&acme.id, PartyKind::Customer, "Bad Mail");
    bad.email = Some("no-at-sign".into());
    let err = repo.insert(&bad).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::InvalidEmail("no-at-sign".into()))
    );
}

// ACCESS
#[test]
fn roles_include_lower_roles() {
    let (_dir, store) = open_store();
    let access = AccessRepository::new(store);
    let user = UserId::from("user1editor");
    let acme = CompanyId::from("company1acme");

    access.grant(&user, &acme, Role::Editor).unwrap();

    assert_eq!(access.require(&user, &acme, Role::Viewer).unwrap(), Role::Editor);
    assert_eq!(access.require(&user, &acme, Role::Editor).unwrap(), Role::Editor);
    let err = access.require(&user, &acme, Role::Admin).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AccessError>(),
        Some(AccessError::Denied { .. })
    ));
}

#[test]
fn revoke_removes_access() {
    let (_dir, store) = open_store();
    let access = AccessRepository::new(store);
    let user = UserId::from("user1viewer");
    let acme = CompanyId::from("company1acme");
    let globex = CompanyId::from("company1globex");

    access.grant(&user, &acme, Role::Viewer).unwrap();
    access.grant(&user, &globex, Role::Admin).unwrap();
    assert_eq!(access.companies_of(&user).unwrap().len(), 2);

    assert!(access.revoke(&user, &acme).unwrap());
    assert!(!access.revoke(&user, &acme).unwrap());
    assert_eq!(access.role(&user, &acme).unwrap(), None);
    assert_eq!(access.companies_of(&user).unwrap(), vec![(globex, Role::Admin)]);
}

#[test]
fn users_with_shared_prefix_stay_apart() {
    let (_dir, store) = open_store();
    let access = AccessRepository::new(store);
    let acme = CompanyId::from("company1acme");

    access.grant(&UserId::from("user1a"), &acme, Role::Admin).unwrap();
    access.grant(&UserId::from("user1ab"), &acme, Role::Viewer).unwrap();

    assert_eq!(
        access.companies_of(&UserId::from("user1a")).unwrap(),
        vec![(acme, Role::Admin)]
    );
}
