// Company Entity - inverse side of employment
//
// The employee list is a derived view of every person whose employer
// pointer names this company. It has a read accessor only.

use serde::{Deserialize, Serialize};

use super::{CompanyId, Person, PersonId};

/// Construction request for a new company
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDraft {
    #[serde(default)]
    pub name: String,
}

impl CompanyDraft {
    pub fn new(name: impl Into<String>) -> Self {
        CompanyDraft { name: name.into() }
    }
}

/// Persisted company
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    id: CompanyId,

    pub name: String,

    /// Hire-ordered
    employees: Vec<Person>,
}

impl Company {
    pub(crate) fn hydrate(id: CompanyId, name: String) -> Self {
        Company {
            id,
            name,
            employees: Vec::new(),
        }
    }

    pub fn id(&self) -> CompanyId {
        self.id
    }

    pub fn employees(&self) -> &[Person] {
        &self.employees
    }

    pub fn employee_ids(&self) -> Vec<PersonId> {
        self.employees.iter().map(|p| p.id()).collect()
    }

    pub fn employs(&self, person: PersonId) -> bool {
        self.employees.iter().any(|p| p.id() == person)
    }

    /// Append an employee to the derived collection.
    ///
    /// One-sided: the person's employer pointer is not touched here.
    pub(crate) fn add_employee(&mut self, employee: Person) {
        self.employees.push(employee);
    }

    pub fn into_employees(self) -> Vec<Person> {
        self.employees
    }
}
