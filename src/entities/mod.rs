// Entity Models - persons, companies, addresses
//
// Each entity has:
// - Integer identity assigned by the storage layer, never by callers
// - Plain values (names, address lines) with empty-string defaults
// - One-sided attach helpers; the other side of an association is the
//   storage layer's job (see store::Repository)

pub mod address;
pub mod company;
pub mod person;

pub use address::{Address, AddressDraft};
pub use company::{Company, CompanyDraft};
pub use person::{Person, PersonDraft};

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                $name(raw)
            }
        }
    };
}

entity_id!(
    /// Identity of a [`Person`] row
    PersonId
);
entity_id!(
    /// Identity of a [`Company`] row
    CompanyId
);
entity_id!(
    /// Identity of an [`Address`] row
    AddressId
);

/// Entity kinds, used to key the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Company,
    Address,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Company => "company",
            EntityKind::Address => "address",
        }
    }

    pub fn parse(kind: &str) -> Option<EntityKind> {
        match kind.to_lowercase().as_str() {
            "person" | "people" => Some(EntityKind::Person),
            "company" | "companies" => Some(EntityKind::Company),
            "address" | "addresses" => Some(EntityKind::Address),
            _ => None,
        }
    }
}
