use log::{error, info, warn};

use super::UnresolvedCompany;
use crate::entities::{AddressDraft, Person, PersonDraft, PersonId};
use crate::error::{ServiceResult, StoreError};
use crate::lookup::Lookup;
use crate::store::Repository;

/// Person operations: create, address attachment, deletion, employer cleanup
pub struct PersonService<'r, R: Repository + ?Sized> {
    repo: &'r R,
    lookup: Lookup<'r, R>,
    unresolved_company: UnresolvedCompany,
}

impl<'r, R: Repository + ?Sized> PersonService<'r, R> {
    pub fn new(repo: &'r R, unresolved_company: UnresolvedCompany) -> Self {
        Self {
            repo,
            lookup: Lookup::new(repo),
            unresolved_company,
        }
    }

    pub(crate) fn repo(&self) -> &'r R {
        self.repo
    }

    pub fn unresolved_company(&self) -> UnresolvedCompany {
        self.unresolved_company
    }

    /// Create a person, optionally employed by `draft.company`.
    ///
    /// Returns `Ok(None)` only under [`UnresolvedCompany::Reject`] when the
    /// company does not exist.
    pub fn create(&self, draft: &PersonDraft) -> ServiceResult<Option<Person>> {
        info!(
            "Adding a new person - firstname {}, lastname {}",
            draft.first_name, draft.last_name
        );

        let mut draft = draft.clone();

        if let Some(company_id) = draft.company {
            if self.lookup.company(company_id)?.is_none() {
                match self.unresolved_company {
                    UnresolvedCompany::Orphan => {
                        warn!(
                            "Company {} does not exist; creating person without employer",
                            company_id
                        );
                        draft.company = None;
                    }
                    UnresolvedCompany::Reject => {
                        error!("Company {} does not exist; person not created", company_id);
                        return Ok(None);
                    }
                }
            }
        }

        let id = self.repo.insert_person(&draft)?;
        let person = self.reload(id)?;

        Ok(Some(person))
    }

    pub fn get_by_id(&self, id: PersonId) -> ServiceResult<Option<Person>> {
        Ok(self.lookup.person(id)?)
    }

    /// Append a new address to an existing person
    pub fn add_address(&self, id: PersonId, address: &AddressDraft) -> ServiceResult<Option<Person>> {
        if self.lookup.person(id)?.is_none() {
            return Ok(None);
        }

        info!("Adding new address to Person with id {}", id);

        self.repo.attach_address(id, address)?;
        Ok(Some(self.reload(id)?))
    }

    /// Delete a person. Unknown ids are a no-op.
    pub fn delete(&self, id: PersonId) -> ServiceResult<()> {
        info!("Deleting Person with id {}", id);

        if !self.repo.delete_person(id)? {
            info!("Person {} did not exist; nothing to delete", id);
        }

        Ok(())
    }

    /// Clear the person's employer, both on the stored rows and on `person`
    pub fn remove_company(&self, person: &mut Person) -> ServiceResult<()> {
        if let Some(company) = person.company() {
            info!("Removing Person {} from Company {}", person.id(), company);
        }

        self.repo.unlink_employment(person.id())?;
        person.set_company(None);

        Ok(())
    }

    /// Resolve a person by id and clear their employer
    pub fn leave_company(&self, id: PersonId) -> ServiceResult<Option<Person>> {
        let Some(mut person) = self.lookup.person(id)? else {
            return Ok(None);
        };

        self.remove_company(&mut person)?;
        Ok(Some(person))
    }

    fn reload(&self, id: PersonId) -> ServiceResult<Person> {
        let person = self
            .repo
            .find_person(id)?
            .ok_or_else(|| StoreError::Corrupt(format!("person {} missing right after write", id)))?;
        Ok(person)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CompanyDraft, CompanyId};
    use crate::store::{MemoryRepository, SqliteRepository};

    const FIRSTNAME: &str = "John";
    const LASTNAME: &str = "Doe";

    fn vancouver() -> AddressDraft {
        AddressDraft {
            street: "Main".to_string(),
            street_number: 123,
            zip_code: "A0B1C2".to_string(),
            city: "Vancouver".to_string(),
            country: "Canada".to_string(),
        }
    }

    fn burnaby() -> AddressDraft {
        AddressDraft {
            street: "Main street_2".to_string(),
            street_number: 234567891,
            zip_code: "A0B 1C3".to_string(),
            city: "Burnaby".to_string(),
            country: "Canada".to_string(),
        }
    }

    #[test]
    fn test_create_then_get_roundtrip() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);

        let draft = PersonDraft::new(FIRSTNAME, LASTNAME);
        let created = people.create(&draft).unwrap().unwrap();
        let fetched = people.get_by_id(created.id()).unwrap().unwrap();

        assert_eq!(fetched, created);
        assert!(fetched.matches_draft(&draft));
        assert_eq!(fetched.company(), None);
    }

    #[test]
    fn test_create_with_existing_company_employs_person() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let company = repo.insert_company(&CompanyDraft::new("Acme")).unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Reject);

        let person = people
            .create(&PersonDraft::new(FIRSTNAME, LASTNAME).with_company(company))
            .unwrap()
            .unwrap();

        assert_eq!(person.company(), Some(company));
        assert!(repo.find_company(company).unwrap().unwrap().employs(person.id()));
    }

    #[test]
    fn test_create_with_unknown_company_orphans_person() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);

        let person = people
            .create(&PersonDraft::new(FIRSTNAME, LASTNAME).with_company(CompanyId(99)))
            .unwrap()
            .unwrap();

        assert_eq!(person.company(), None);
        assert_eq!(person.first_name, FIRSTNAME);
    }

    #[test]
    fn test_create_with_unknown_company_rejected_under_reject_policy() {
        let repo = MemoryRepository::new();
        let people = PersonService::new(&repo, UnresolvedCompany::Reject);

        let created = people
            .create(&PersonDraft::new(FIRSTNAME, LASTNAME).with_company(CompanyId(99)))
            .unwrap();

        assert!(created.is_none());
        assert_eq!(repo.person_count().unwrap(), 0);
    }

    #[test]
    fn test_get_by_id_missing_returns_none() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);

        assert!(people.get_by_id(PersonId(2)).unwrap().is_none());
    }

    #[test]
    fn test_add_address_exact_fields() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);
        let person = people.create(&PersonDraft::new(FIRSTNAME, LASTNAME)).unwrap().unwrap();

        let updated = people.add_address(person.id(), &vancouver()).unwrap().unwrap();

        assert_eq!(updated.addresses().len(), 1);
        let address = &updated.addresses()[0];
        assert_eq!(address.street, "Main");
        assert_eq!(address.street_number, 123);
        assert_eq!(address.zip_code, "A0B1C2");
        assert_eq!(address.city, "Vancouver");
        assert_eq!(address.country, "Canada");
        assert!(address.is_held_by(person.id()));
    }

    #[test]
    fn test_add_address_is_cumulative_and_ordered() {
        let repo = MemoryRepository::new();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);
        let person = people.create(&PersonDraft::new(FIRSTNAME, LASTNAME)).unwrap().unwrap();

        people.add_address(person.id(), &vancouver()).unwrap();
        let updated = people.add_address(person.id(), &burnaby()).unwrap().unwrap();

        let drafts: Vec<AddressDraft> = updated.addresses().iter().map(|a| a.to_draft()).collect();
        assert_eq!(drafts, vec![vancouver(), burnaby()]);
    }

    #[test]
    fn test_add_address_to_missing_person_is_none() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);

        assert!(people.add_address(PersonId(7), &vancouver()).unwrap().is_none());
    }

    #[test]
    fn test_delete_twice_is_noop() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);
        let person = people.create(&PersonDraft::new(FIRSTNAME, LASTNAME)).unwrap().unwrap();

        people.delete(person.id()).unwrap();
        people.delete(person.id()).unwrap();
        people.delete(PersonId(1234)).unwrap();

        assert!(people.get_by_id(person.id()).unwrap().is_none());
    }

    #[test]
    fn test_remove_company_updates_both_copies() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let company = repo.insert_company(&CompanyDraft::new("Acme")).unwrap();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);
        let mut person = people
            .create(&PersonDraft::new(FIRSTNAME, LASTNAME).with_company(company))
            .unwrap()
            .unwrap();

        people.remove_company(&mut person).unwrap();

        assert_eq!(person.company(), None);
        assert_eq!(people.get_by_id(person.id()).unwrap().unwrap().company(), None);
        assert!(repo.find_company(company).unwrap().unwrap().employees().is_empty());
    }

    #[test]
    fn test_leave_company_missing_person_is_none() {
        let repo = MemoryRepository::new();
        let people = PersonService::new(&repo, UnresolvedCompany::Orphan);

        assert!(people.leave_company(PersonId(1)).unwrap().is_none());
    }
}
