//! Lookup facade: identifier to entity resolution.
//!
//! Absence is an expected outcome and comes back as `Ok(None)`. Only
//! storage failures are errors.

use log::{info, warn};

use crate::entities::{Address, AddressId, Company, CompanyId, Person, PersonId};
use crate::error::StoreResult;
use crate::store::Repository;

/// Read-only view over a repository
pub struct Lookup<'r, R: Repository + ?Sized> {
    repo: &'r R,
}

impl<'r, R: Repository + ?Sized> Clone for Lookup<'r, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'r, R: Repository + ?Sized> Copy for Lookup<'r, R> {}

impl<'r, R: Repository + ?Sized> Lookup<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    pub fn person(&self, id: PersonId) -> StoreResult<Option<Person>> {
        info!("Trying to fetch Person with id {}", id);

        let person = self.repo.find_person(id)?;
        if person.is_none() {
            warn!("No person found with id {}", id);
        }
        Ok(person)
    }

    pub fn company(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        info!("Trying to fetch Company with id {}", id);

        let company = self.repo.find_company(id)?;
        if company.is_none() {
            warn!("No company found with id {}", id);
        }
        Ok(company)
    }

    pub fn address(&self, id: AddressId) -> StoreResult<Option<Address>> {
        let address = self.repo.find_address(id)?;
        if address.is_none() {
            warn!("No address found with id {}", id);
        }
        Ok(address)
    }
}
