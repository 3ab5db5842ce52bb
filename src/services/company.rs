use log::{error, info};

use super::PersonService;
use crate::entities::{Company, CompanyDraft, CompanyId, Person, PersonId};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::lookup::Lookup;
use crate::store::Repository;

/// Company operations: create, hire, employee listing, deletion
pub struct CompanyService<'r, R: Repository + ?Sized> {
    repo: &'r R,
    lookup: Lookup<'r, R>,
    people: PersonService<'r, R>,
}

impl<'r, R: Repository + ?Sized> CompanyService<'r, R> {
    pub fn new(people: PersonService<'r, R>) -> Self {
        let repo = people.repo();
        Self {
            repo,
            lookup: Lookup::new(repo),
            people,
        }
    }

    pub fn people(&self) -> &PersonService<'r, R> {
        &self.people
    }

    pub fn create(&self, draft: &CompanyDraft) -> ServiceResult<Company> {
        info!("Adding a new company - name {}", draft.name);

        let id = self.repo.insert_company(draft)?;
        let company = self
            .repo
            .find_company(id)?
            .ok_or_else(|| StoreError::Corrupt(format!("company {} missing right after write", id)))?;

        Ok(company)
    }

    pub fn get_by_id(&self, id: CompanyId) -> ServiceResult<Option<Company>> {
        Ok(self.lookup.company(id)?)
    }

    /// Hire-ordered employees, or `None` for an unknown company
    pub fn employees(&self, id: CompanyId) -> ServiceResult<Option<Vec<Person>>> {
        Ok(self.lookup.company(id)?.map(Company::into_employees))
    }

    /// Employ `person_id` at `company_id`.
    ///
    /// `Ok(None)` when either side does not resolve; the caller cannot tell
    /// which. Hiring someone the company already employs is a no-op. Hiring
    /// someone employed elsewhere fails with [`ServiceError::AlreadyEmployed`].
    pub fn add_employee(
        &self,
        company_id: CompanyId,
        person_id: PersonId,
    ) -> ServiceResult<Option<Company>> {
        if self.lookup.company(company_id)?.is_none() {
            return Ok(None);
        }

        let Some(person) = self.lookup.person(person_id)? else {
            return Ok(None);
        };

        match person.company() {
            Some(current) if current == company_id => {
                info!("Person {} already works for Company {}", person_id, company_id);
            }
            Some(current) => {
                error!(
                    "Person {} is employed by Company {}; cannot add to Company {}",
                    person_id, current, company_id
                );
                return Err(ServiceError::AlreadyEmployed {
                    person: person_id,
                    company: current,
                });
            }
            None => {
                info!("Adding Person {} in Company {}", person_id, company_id);
                self.repo.link_employment(person_id, company_id)?;
            }
        }

        Ok(self.lookup.company(company_id)?)
    }

    /// Delete a company after clearing every employee's employer.
    /// Unknown ids are a no-op.
    pub fn delete(&self, id: CompanyId) -> ServiceResult<()> {
        info!("Deleting Company with id {}", id);

        if let Some(company) = self.lookup.company(id)? {
            for mut employee in company.into_employees() {
                self.people.remove_company(&mut employee)?;
            }
        }

        self.repo.delete_company(id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{EntityKind, PersonDraft};
    use crate::services::UnresolvedCompany;
    use crate::store::{AuditAction, MemoryRepository, SqliteRepository};

    const COMPANY_NAME: &str = "Spring-Context";

    fn services<R: Repository + ?Sized>(repo: &R) -> CompanyService<'_, R> {
        CompanyService::new(PersonService::new(repo, UnresolvedCompany::Orphan))
    }

    /// Every employed person is listed by their employer, and every listed
    /// employee points back at the company
    fn assert_employment_consistent<R: Repository + ?Sized>(
        repo: &R,
        people: &[PersonId],
        companies: &[CompanyId],
    ) {
        for id in people {
            if let Some(person) = repo.find_person(*id).unwrap() {
                if let Some(company) = person.company() {
                    let company = repo.find_company(company).unwrap().expect("employer exists");
                    assert!(company.employs(*id), "company {} does not list {}", company.id(), id);
                }
            }
        }
        for id in companies {
            if let Some(company) = repo.find_company(*id).unwrap() {
                for employee in company.employees() {
                    let stored = repo.find_person(employee.id()).unwrap().expect("employee exists");
                    assert_eq!(stored.company(), Some(*id));
                }
            }
        }
    }

    #[test]
    fn test_create_company_starts_empty() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);

        let company = companies.create(&CompanyDraft::new(COMPANY_NAME)).unwrap();

        assert_eq!(company.name, COMPANY_NAME);
        assert!(company.employees().is_empty());
        assert_eq!(companies.get_by_id(company.id()).unwrap().unwrap(), company);
    }

    #[test]
    fn test_get_by_id_missing_returns_none() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);

        assert!(companies.get_by_id(CompanyId(2)).unwrap().is_none());
        assert!(companies.employees(CompanyId(2)).unwrap().is_none());
    }

    #[test]
    fn test_acme_scenario() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);
        let people = companies.people();

        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        assert_eq!(acme.id(), CompanyId(1));

        let john = people.create(&PersonDraft::new("John", "Doe")).unwrap().unwrap();
        assert_eq!(john.id(), PersonId(1));

        let acme = companies.add_employee(CompanyId(1), PersonId(1)).unwrap().unwrap();
        assert_eq!(acme.employee_ids(), vec![PersonId(1)]);
        assert_eq!(acme.employees()[0].company(), Some(CompanyId(1)));
        assert_employment_consistent(&repo, &[PersonId(1)], &[CompanyId(1)]);

        companies.delete(CompanyId(1)).unwrap();

        assert_eq!(people.get_by_id(PersonId(1)).unwrap().unwrap().company(), None);
        assert!(companies.get_by_id(CompanyId(1)).unwrap().is_none());
    }

    #[test]
    fn test_add_employee_unknown_company_leaves_person_untouched() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        let john = companies
            .people()
            .create(&PersonDraft::new("John", "Doe").with_company(acme.id()))
            .unwrap()
            .unwrap();

        let result = companies.add_employee(CompanyId(99), john.id()).unwrap();

        assert!(result.is_none());
        let stored = companies.people().get_by_id(john.id()).unwrap().unwrap();
        assert_eq!(stored.company(), Some(acme.id()));
    }

    #[test]
    fn test_add_employee_unknown_person_is_none() {
        let repo = MemoryRepository::new();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();

        assert!(companies.add_employee(acme.id(), PersonId(5)).unwrap().is_none());
        assert!(companies.employees(acme.id()).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_add_employee_twice_does_not_duplicate() {
        let repo = MemoryRepository::new();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        let john = companies.people().create(&PersonDraft::new("John", "Doe")).unwrap().unwrap();

        companies.add_employee(acme.id(), john.id()).unwrap();
        let acme = companies.add_employee(acme.id(), john.id()).unwrap().unwrap();

        assert_eq!(acme.employee_ids(), vec![john.id()]);
    }

    #[test]
    fn test_add_employee_employed_elsewhere_fails() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        let globex = companies.create(&CompanyDraft::new("Globex")).unwrap();
        let john = companies.people().create(&PersonDraft::new("John", "Doe")).unwrap().unwrap();
        companies.add_employee(acme.id(), john.id()).unwrap();

        let result = companies.add_employee(globex.id(), john.id());

        match result {
            Err(ServiceError::AlreadyEmployed { person, company }) => {
                assert_eq!(person, john.id());
                assert_eq!(company, acme.id());
            }
            other => panic!("expected AlreadyEmployed, got {:?}", other),
        }
        assert!(companies.employees(globex.id()).unwrap().unwrap().is_empty());
        assert_employment_consistent(&repo, &[john.id()], &[acme.id(), globex.id()]);
    }

    #[test]
    fn test_change_employer_by_leaving_first() {
        let repo = MemoryRepository::new();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        let globex = companies.create(&CompanyDraft::new("Globex")).unwrap();
        let john = companies.people().create(&PersonDraft::new("John", "Doe")).unwrap().unwrap();
        companies.add_employee(acme.id(), john.id()).unwrap();

        companies.people().leave_company(john.id()).unwrap();
        let globex = companies.add_employee(globex.id(), john.id()).unwrap().unwrap();

        assert!(globex.employs(john.id()));
        assert!(companies.employees(acme.id()).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_employees_are_hire_ordered() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        let first = companies.people().create(&PersonDraft::new("A", "A")).unwrap().unwrap();
        let second = companies.people().create(&PersonDraft::new("B", "B")).unwrap().unwrap();

        companies.add_employee(acme.id(), second.id()).unwrap();
        companies.add_employee(acme.id(), first.id()).unwrap();

        let ids: Vec<PersonId> = companies
            .employees(acme.id())
            .unwrap()
            .unwrap()
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(ids, vec![second.id(), first.id()]);
    }

    #[test]
    fn test_delete_company_unemploys_everyone() {
        let repo = MemoryRepository::new();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        let mut ids = Vec::new();
        for name in ["A", "B", "C"] {
            let person = companies.people().create(&PersonDraft::new(name, name)).unwrap().unwrap();
            companies.add_employee(acme.id(), person.id()).unwrap();
            ids.push(person.id());
        }

        companies.delete(acme.id()).unwrap();

        for id in &ids {
            let person = companies.people().get_by_id(*id).unwrap().unwrap();
            assert_ne!(person.company(), Some(acme.id()));
            assert_eq!(person.company(), None);
        }
        assert_employment_consistent(&repo, &ids, &[acme.id()]);
    }

    #[test]
    fn test_delete_company_twice_is_noop() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();

        companies.delete(acme.id()).unwrap();
        companies.delete(acme.id()).unwrap();
        companies.delete(CompanyId(77)).unwrap();

        assert!(companies.get_by_id(acme.id()).unwrap().is_none());
        let deletions = repo
            .events_for(EntityKind::Company, acme.id().get())
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::CompanyDeleted)
            .count();
        assert_eq!(deletions, 1);
    }

    #[test]
    fn test_delete_employee_keeps_company_consistent() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let companies = services(&repo);
        let acme = companies.create(&CompanyDraft::new("Acme")).unwrap();
        let john = companies.people().create(&PersonDraft::new("John", "Doe")).unwrap().unwrap();
        let jane = companies.people().create(&PersonDraft::new("Jane", "Doe")).unwrap().unwrap();
        companies.add_employee(acme.id(), john.id()).unwrap();
        companies.add_employee(acme.id(), jane.id()).unwrap();

        companies.people().delete(john.id()).unwrap();

        let employees = companies.employees(acme.id()).unwrap().unwrap();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].id(), jane.id());
        assert_employment_consistent(&repo, &[john.id(), jane.id()], &[acme.id()]);
    }
}
