// Address Entity - inverse side of the person/address association
//
// Addresses are only ever created through a person (AddAddress). The set of
// people holding an address is a back-reference filled in by storage.

use serde::{Deserialize, Serialize};

use super::{AddressId, PersonId};

/// Address fields as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDraft {
    #[serde(default)]
    pub street: String,

    #[serde(default)]
    pub street_number: i32,

    #[serde(default)]
    pub zip_code: String,

    #[serde(default)]
    pub city: String,

    #[serde(default)]
    pub country: String,
}

/// Persisted address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    id: AddressId,
    pub street: String,
    pub street_number: i32,
    pub zip_code: String,
    pub city: String,
    pub country: String,

    /// Back-reference: people holding this address
    people: Vec<PersonId>,
}

impl Address {
    pub(crate) fn hydrate(id: AddressId, draft: AddressDraft) -> Self {
        Address {
            id,
            street: draft.street,
            street_number: draft.street_number,
            zip_code: draft.zip_code,
            city: draft.city,
            country: draft.country,
            people: Vec::new(),
        }
    }

    pub fn id(&self) -> AddressId {
        self.id
    }

    pub fn people(&self) -> &[PersonId] {
        &self.people
    }

    pub fn is_held_by(&self, person: PersonId) -> bool {
        self.people.contains(&person)
    }

    pub(crate) fn add_person(&mut self, person: PersonId) {
        if !self.people.contains(&person) {
            self.people.push(person);
        }
    }

    /// Field values without identity or back-references
    pub fn to_draft(&self) -> AddressDraft {
        AddressDraft {
            street: self.street.clone(),
            street_number: self.street_number,
            zip_code: self.zip_code.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
        }
    }
}
