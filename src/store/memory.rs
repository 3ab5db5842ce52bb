// In-memory registry - integer-keyed arena of people, companies, addresses
//
// Same contract as the SQLite repository. Every write takes the single
// write lock, so both sides of a link always change together.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{AuditAction, AuditEvent, Repository};
use crate::entities::{
    Address, AddressDraft, AddressId, Company, CompanyDraft, CompanyId, EntityKind, Person,
    PersonDraft, PersonId,
};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct PersonRow {
    first_name: String,
    last_name: String,
    company: Option<CompanyId>,
    addresses: Vec<AddressId>,
}

#[derive(Debug, Clone)]
struct CompanyRow {
    name: String,
    /// Hire-ordered
    employees: Vec<PersonId>,
}

#[derive(Debug, Clone)]
struct AddressRow {
    fields: AddressDraft,
    people: Vec<PersonId>,
}

#[derive(Debug, Default)]
struct Tables {
    last_person: i64,
    last_company: i64,
    last_address: i64,
    people: BTreeMap<PersonId, PersonRow>,
    companies: BTreeMap<CompanyId, CompanyRow>,
    addresses: BTreeMap<AddressId, AddressRow>,
    /// Append-only
    events: Vec<AuditEvent>,
}

impl Tables {
    fn next_person_id(&mut self) -> PersonId {
        self.last_person += 1;
        PersonId(self.last_person)
    }

    fn next_company_id(&mut self) -> CompanyId {
        self.last_company += 1;
        CompanyId(self.last_company)
    }

    fn next_address_id(&mut self) -> AddressId {
        self.last_address += 1;
        AddressId(self.last_address)
    }

    fn address(&self, id: AddressId) -> Option<Address> {
        let row = self.addresses.get(&id)?;
        let mut address = Address::hydrate(id, row.fields.clone());
        for holder in &row.people {
            address.add_person(*holder);
        }
        Some(address)
    }

    fn person(&self, id: PersonId) -> StoreResult<Option<Person>> {
        let Some(row) = self.people.get(&id) else {
            return Ok(None);
        };

        let mut person = Person::hydrate(id, row.first_name.clone(), row.last_name.clone(), row.company);
        for address_id in &row.addresses {
            let address = self.address(*address_id).ok_or_else(|| {
                StoreError::Corrupt(format!("person {} lists missing address {}", id, address_id))
            })?;
            person.add_address(address);
        }

        Ok(Some(person))
    }

    /// Both sides at once: employer pointer and employee list
    fn set_employer(&mut self, person: PersonId, company: Option<CompanyId>) -> StoreResult<()> {
        let row = self
            .people
            .get_mut(&person)
            .ok_or_else(|| StoreError::Dangling(format!("person {}", person)))?;
        let previous = std::mem::replace(&mut row.company, company);

        if let Some(previous) = previous {
            if let Some(old) = self.companies.get_mut(&previous) {
                old.employees.retain(|p| *p != person);
            }
        }

        if let Some(company) = company {
            if let Some(new) = self.companies.get_mut(&company) {
                new.employees.push(person);
            }
        }

        Ok(())
    }
}

/// Integer-keyed in-memory storage collaborator
///
/// Cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }

    /// Count people currently stored
    pub fn person_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.people.len())
    }

    /// Count addresses currently stored
    pub fn address_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.addresses.len())
    }
}

impl Repository for MemoryRepository {
    fn insert_person(&self, draft: &PersonDraft) -> StoreResult<PersonId> {
        let mut tables = self.write()?;

        if let Some(company) = draft.company {
            if !tables.companies.contains_key(&company) {
                return Err(StoreError::Dangling(format!("company {}", company)));
            }
        }

        let id = tables.next_person_id();
        tables.people.insert(
            id,
            PersonRow {
                first_name: draft.first_name.clone(),
                last_name: draft.last_name.clone(),
                company: None,
                addresses: Vec::new(),
            },
        );
        tables.events.push(AuditEvent::new(
            AuditAction::PersonCreated,
            EntityKind::Person,
            id.get(),
            serde_json::json!({
                "firstname": draft.first_name,
                "lastname": draft.last_name,
            }),
        ));

        if let Some(company) = draft.company {
            tables.set_employer(id, Some(company))?;
            tables
                .events
                .extend(AuditEvent::employment(AuditAction::EmploymentLinked, id, company));
        }

        Ok(id)
    }

    fn find_person(&self, id: PersonId) -> StoreResult<Option<Person>> {
        self.read()?.person(id)
    }

    fn delete_person(&self, id: PersonId) -> StoreResult<bool> {
        let mut tables = self.write()?;

        let Some(company) = tables.people.get(&id).map(|row| row.company) else {
            return Ok(false);
        };

        if let Some(company) = company {
            tables.set_employer(id, None)?;
            tables
                .events
                .extend(AuditEvent::employment(AuditAction::EmploymentSevered, id, company));
        }

        let row = tables
            .people
            .remove(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("person {} vanished", id)))?;

        // Addresses never outlive their last holder
        for address_id in row.addresses {
            let orphaned = match tables.addresses.get_mut(&address_id) {
                Some(address) => {
                    address.people.retain(|p| *p != id);
                    address.people.is_empty()
                }
                None => false,
            };
            if orphaned {
                tables.addresses.remove(&address_id);
            }
        }

        tables.events.push(AuditEvent::new(
            AuditAction::PersonDeleted,
            EntityKind::Person,
            id.get(),
            serde_json::json!({}),
        ));

        Ok(true)
    }

    fn attach_address(&self, person: PersonId, address: &AddressDraft) -> StoreResult<AddressId> {
        let mut tables = self.write()?;

        if !tables.people.contains_key(&person) {
            return Err(StoreError::Dangling(format!("person {}", person)));
        }

        let address_id = tables.next_address_id();
        tables.addresses.insert(
            address_id,
            AddressRow {
                fields: address.clone(),
                people: vec![person],
            },
        );
        if let Some(row) = tables.people.get_mut(&person) {
            row.addresses.push(address_id);
        }

        let data = serde_json::json!({
            "person_id": person.get(),
            "address_id": address_id.get(),
        });
        tables.events.push(AuditEvent::new(
            AuditAction::AddressAttached,
            EntityKind::Person,
            person.get(),
            data.clone(),
        ));
        tables.events.push(AuditEvent::new(
            AuditAction::AddressAttached,
            EntityKind::Address,
            address_id.get(),
            data,
        ));

        Ok(address_id)
    }

    fn find_address(&self, id: AddressId) -> StoreResult<Option<Address>> {
        Ok(self.read()?.address(id))
    }

    fn insert_company(&self, draft: &CompanyDraft) -> StoreResult<CompanyId> {
        let mut tables = self.write()?;

        let id = tables.next_company_id();
        tables.companies.insert(
            id,
            CompanyRow {
                name: draft.name.clone(),
                employees: Vec::new(),
            },
        );
        tables.events.push(AuditEvent::new(
            AuditAction::CompanyCreated,
            EntityKind::Company,
            id.get(),
            serde_json::json!({ "name": draft.name }),
        ));

        Ok(id)
    }

    fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        let tables = self.read()?;

        let Some(row) = tables.companies.get(&id) else {
            return Ok(None);
        };

        let mut company = Company::hydrate(id, row.name.clone());
        for employee_id in &row.employees {
            let employee = tables.person(*employee_id)?.ok_or_else(|| {
                StoreError::Corrupt(format!("company {} lists missing person {}", id, employee_id))
            })?;
            company.add_employee(employee);
        }

        Ok(Some(company))
    }

    fn delete_company(&self, id: CompanyId) -> StoreResult<bool> {
        let mut tables = self.write()?;

        let Some(remaining) = tables.companies.get(&id).map(|row| row.employees.clone()) else {
            return Ok(false);
        };

        for person in remaining {
            tables.set_employer(person, None)?;
            tables
                .events
                .extend(AuditEvent::employment(AuditAction::EmploymentSevered, person, id));
        }

        tables.companies.remove(&id);
        tables.events.push(AuditEvent::new(
            AuditAction::CompanyDeleted,
            EntityKind::Company,
            id.get(),
            serde_json::json!({}),
        ));

        Ok(true)
    }

    fn link_employment(&self, person: PersonId, company: CompanyId) -> StoreResult<()> {
        let mut tables = self.write()?;

        let employer = tables
            .people
            .get(&person)
            .map(|row| row.company)
            .ok_or_else(|| StoreError::Dangling(format!("person {}", person)))?;

        if !tables.companies.contains_key(&company) {
            return Err(StoreError::Dangling(format!("company {}", company)));
        }

        if employer == Some(company) {
            return Ok(());
        }

        if let Some(previous) = employer {
            tables
                .events
                .extend(AuditEvent::employment(AuditAction::EmploymentSevered, person, previous));
        }

        tables.set_employer(person, Some(company))?;
        tables
            .events
            .extend(AuditEvent::employment(AuditAction::EmploymentLinked, person, company));

        Ok(())
    }

    fn unlink_employment(&self, person: PersonId) -> StoreResult<()> {
        let mut tables = self.write()?;

        let employer = tables
            .people
            .get(&person)
            .map(|row| row.company)
            .ok_or_else(|| StoreError::Dangling(format!("person {}", person)))?;

        let Some(company) = employer else {
            return Ok(());
        };

        tables.set_employer(person, None)?;
        tables
            .events
            .extend(AuditEvent::employment(AuditAction::EmploymentSevered, person, company));

        Ok(())
    }

    fn events_for(&self, kind: EntityKind, id: i64) -> StoreResult<Vec<AuditEvent>> {
        let tables = self.read()?;

        Ok(tables
            .events
            .iter()
            .rev()
            .filter(|e| e.entity_kind == kind && e.entity_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_assigns_sequential_ids() {
        let repo = MemoryRepository::new();

        assert_eq!(repo.insert_person(&PersonDraft::new("A", "A")).unwrap(), PersonId(1));
        assert_eq!(repo.insert_person(&PersonDraft::new("B", "B")).unwrap(), PersonId(2));
        assert_eq!(repo.insert_company(&CompanyDraft::new("Acme")).unwrap(), CompanyId(1));
    }

    #[test]
    fn test_clones_share_tables() {
        let repo = MemoryRepository::new();
        let other = repo.clone();

        let id = repo.insert_person(&PersonDraft::new("John", "Doe")).unwrap();

        assert!(other.find_person(id).unwrap().is_some());
        assert_eq!(other.person_count().unwrap(), 1);
    }

    #[test]
    fn test_link_keeps_both_sides_in_step() {
        let repo = MemoryRepository::new();
        let acme = repo.insert_company(&CompanyDraft::new("Acme")).unwrap();
        let globex = repo.insert_company(&CompanyDraft::new("Globex")).unwrap();
        let person = repo.insert_person(&PersonDraft::new("A", "A")).unwrap();

        repo.link_employment(person, acme).unwrap();
        assert!(repo.find_company(acme).unwrap().unwrap().employs(person));

        repo.link_employment(person, globex).unwrap();
        assert!(!repo.find_company(acme).unwrap().unwrap().employs(person));
        assert!(repo.find_company(globex).unwrap().unwrap().employs(person));
        assert_eq!(repo.find_person(person).unwrap().unwrap().company(), Some(globex));
    }

    #[test]
    fn test_link_same_company_twice_does_not_duplicate() {
        let repo = MemoryRepository::new();
        let acme = repo.insert_company(&CompanyDraft::new("Acme")).unwrap();
        let person = repo.insert_person(&PersonDraft::new("A", "A")).unwrap();

        repo.link_employment(person, acme).unwrap();
        repo.link_employment(person, acme).unwrap();

        assert_eq!(repo.find_company(acme).unwrap().unwrap().employees().len(), 1);
    }

    #[test]
    fn test_dangling_link_changes_nothing() {
        let repo = MemoryRepository::new();
        let person = repo.insert_person(&PersonDraft::new("A", "A")).unwrap();

        let result = repo.link_employment(person, CompanyId(9));

        assert!(matches!(result, Err(StoreError::Dangling(_))));
        assert_eq!(repo.find_person(person).unwrap().unwrap().company(), None);
    }

    #[test]
    fn test_delete_person_drops_orphaned_addresses() {
        let repo = MemoryRepository::new();
        let acme = repo.insert_company(&CompanyDraft::new("Acme")).unwrap();
        let person = repo
            .insert_person(&PersonDraft::new("A", "A").with_company(acme))
            .unwrap();
        let address = repo.attach_address(person, &AddressDraft::default()).unwrap();

        assert!(repo.delete_person(person).unwrap());
        assert!(!repo.delete_person(person).unwrap());

        assert!(repo.find_address(address).unwrap().is_none());
        assert_eq!(repo.address_count().unwrap(), 0);
        assert!(repo.find_company(acme).unwrap().unwrap().employees().is_empty());
    }

    #[test]
    fn test_address_back_reference() {
        let repo = MemoryRepository::new();
        let person = repo.insert_person(&PersonDraft::new("A", "A")).unwrap();

        let address = repo.attach_address(person, &AddressDraft::default()).unwrap();

        let loaded = repo.find_address(address).unwrap().unwrap();
        assert_eq!(loaded.people(), &[person]);
        assert_eq!(repo.find_person(person).unwrap().unwrap().addresses()[0].people(), &[person]);
    }

    #[test]
    fn test_delete_company_clears_employers() {
        let repo = MemoryRepository::new();
        let acme = repo.insert_company(&CompanyDraft::new("Acme")).unwrap();
        let a = repo.insert_person(&PersonDraft::new("A", "A").with_company(acme)).unwrap();
        let b = repo.insert_person(&PersonDraft::new("B", "B").with_company(acme)).unwrap();

        assert!(repo.delete_company(acme).unwrap());
        assert!(!repo.delete_company(acme).unwrap());

        assert_eq!(repo.find_person(a).unwrap().unwrap().company(), None);
        assert_eq!(repo.find_person(b).unwrap().unwrap().company(), None);
    }

    #[test]
    fn test_events_newest_first() {
        let repo = MemoryRepository::new();
        let acme = repo.insert_company(&CompanyDraft::new("Acme")).unwrap();
        let person = repo.insert_person(&PersonDraft::new("A", "A")).unwrap();
        repo.link_employment(person, acme).unwrap();

        let events = repo.events_for(EntityKind::Person, person.get()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::EmploymentLinked);
        assert_eq!(events[1].action, AuditAction::PersonCreated);
    }
}
