//! Storage collaborator.
//!
//! # Responsibility
//! - Assign identities and persist people, companies and addresses.
//! - Own the two-sided association writes: every employment or address
//!   link changes both sides in one atomic step.
//! - Keep an audit trail of every association change.
//!
//! # Invariants
//! - `Person.company == Some(C)` iff `C.employees` contains that person.
//! - An address is listed on a person iff the person is in the address's
//!   back-reference set.
//! - Deleting a row first severs every association it takes part in.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{
    Address, AddressDraft, AddressId, Company, CompanyDraft, CompanyId, EntityKind, Person,
    PersonDraft, PersonId,
};
use crate::error::StoreResult;

/// Persistence operations the relationship services depend on.
///
/// Lookups return `Ok(None)` for unknown identifiers. Deletes of unknown
/// identifiers succeed and report `false`.
pub trait Repository {
    /// Insert a person. A `Some` company in the draft must already be
    /// resolved; it is linked on both sides in the same step.
    fn insert_person(&self, draft: &PersonDraft) -> StoreResult<PersonId>;

    fn find_person(&self, id: PersonId) -> StoreResult<Option<Person>>;

    /// Remove a person, its employment and its address links. Addresses
    /// left without any holder are removed too.
    fn delete_person(&self, id: PersonId) -> StoreResult<bool>;

    /// Create an address and append it to the person's collection.
    fn attach_address(&self, person: PersonId, address: &AddressDraft) -> StoreResult<AddressId>;

    fn find_address(&self, id: AddressId) -> StoreResult<Option<Address>>;

    fn insert_company(&self, draft: &CompanyDraft) -> StoreResult<CompanyId>;

    fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>>;

    /// Remove a company, clearing the employer pointer of anyone still
    /// employed there.
    fn delete_company(&self, id: CompanyId) -> StoreResult<bool>;

    /// Set `person.company = company` and add the person to the company's
    /// employees, together. Linking to the current employer is a no-op.
    fn link_employment(&self, person: PersonId, company: CompanyId) -> StoreResult<()>;

    /// Clear the person's employer and drop them from that company's
    /// employees, together. A no-op for unemployed people.
    fn unlink_employment(&self, person: PersonId) -> StoreResult<()>;

    /// Audit trail for one entity, newest first
    fn events_for(&self, kind: EntityKind, id: i64) -> StoreResult<Vec<AuditEvent>>;
}

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PersonCreated,
    CompanyCreated,
    AddressAttached,
    EmploymentLinked,
    EmploymentSevered,
    PersonDeleted,
    CompanyDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PersonCreated => "person_created",
            AuditAction::CompanyCreated => "company_created",
            AuditAction::AddressAttached => "address_attached",
            AuditAction::EmploymentLinked => "employment_linked",
            AuditAction::EmploymentSevered => "employment_severed",
            AuditAction::PersonDeleted => "person_deleted",
            AuditAction::CompanyDeleted => "company_deleted",
        }
    }

    pub fn parse(action: &str) -> Option<AuditAction> {
        match action {
            "person_created" => Some(AuditAction::PersonCreated),
            "company_created" => Some(AuditAction::CompanyCreated),
            "address_attached" => Some(AuditAction::AddressAttached),
            "employment_linked" => Some(AuditAction::EmploymentLinked),
            "employment_severed" => Some(AuditAction::EmploymentSevered),
            "person_deleted" => Some(AuditAction::PersonDeleted),
            "company_deleted" => Some(AuditAction::CompanyDeleted),
            _ => None,
        }
    }
}

/// Audit trail entry ("every change is an event")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    pub data: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        entity_kind: EntityKind,
        entity_id: i64,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action,
            entity_kind,
            entity_id,
            data,
        }
    }

    /// Pair of events for an employment change, one per side
    pub(crate) fn employment(action: AuditAction, person: PersonId, company: CompanyId) -> [Self; 2] {
        let data = serde_json::json!({
            "person_id": person.get(),
            "company_id": company.get(),
        });

        [
            AuditEvent::new(action, EntityKind::Person, person.get(), data.clone()),
            AuditEvent::new(action, EntityKind::Company, company.get(), data),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_roundtrip() {
        let all = [
            AuditAction::PersonCreated,
            AuditAction::CompanyCreated,
            AuditAction::AddressAttached,
            AuditAction::EmploymentLinked,
            AuditAction::EmploymentSevered,
            AuditAction::PersonDeleted,
            AuditAction::CompanyDeleted,
        ];

        for action in all {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("person_renamed"), None);
    }

    #[test]
    fn test_employment_events_cover_both_sides() {
        let [person_side, company_side] =
            AuditEvent::employment(AuditAction::EmploymentLinked, PersonId(3), CompanyId(8));

        assert_eq!(person_side.entity_kind, EntityKind::Person);
        assert_eq!(person_side.entity_id, 3);
        assert_eq!(company_side.entity_kind, EntityKind::Company);
        assert_eq!(company_side.entity_id, 8);
        assert_eq!(person_side.data, company_side.data);
        assert_ne!(person_side.event_id, company_side.event_id);
    }
}
