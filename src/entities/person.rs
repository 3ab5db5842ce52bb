// Person Entity - owning side of both associations
//
// A person points at (at most) one employer and holds an ordered list of
// addresses. The employer pointer is only ever changed by the storage
// layer's link/unlink operations, so it is read-only from outside the crate.

use serde::{Deserialize, Serialize};

use super::{Address, CompanyId, PersonId};

/// Construction request for a new person (no identity yet)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDraft {
    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    /// Optional employer reference, resolved through the lookup facade
    #[serde(default)]
    pub company: Option<CompanyId>,
}

impl PersonDraft {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        PersonDraft {
            first_name: first_name.into(),
            last_name: last_name.into(),
            company: None,
        }
    }

    pub fn with_company(mut self, company: CompanyId) -> Self {
        self.company = Some(company);
        self
    }
}

/// Persisted person
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    id: PersonId,

    pub first_name: String,

    pub last_name: String,

    company: Option<CompanyId>,

    /// Insertion-ordered
    addresses: Vec<Address>,
}

impl Person {
    /// Rebuild a person from a stored row. Addresses are attached separately.
    pub(crate) fn hydrate(
        id: PersonId,
        first_name: String,
        last_name: String,
        company: Option<CompanyId>,
    ) -> Self {
        Person {
            id,
            first_name,
            last_name,
            company,
            addresses: Vec::new(),
        }
    }

    pub fn id(&self) -> PersonId {
        self.id
    }

    pub fn company(&self) -> Option<CompanyId> {
        self.company
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn is_employed(&self) -> bool {
        self.company.is_some()
    }

    /// Append an address to this person's collection.
    ///
    /// One-sided: the address's back-reference is not touched here.
    pub(crate) fn add_address(&mut self, address: Address) {
        self.addresses.push(address);
    }

    /// Mirror a stored employment change onto this in-memory copy
    pub(crate) fn set_company(&mut self, company: Option<CompanyId>) {
        self.company = company;
    }

    /// Check the draft fields survived persistence
    pub fn matches_draft(&self, draft: &PersonDraft) -> bool {
        self.first_name == draft.first_name && self.last_name == draft.last_name
    }
}
