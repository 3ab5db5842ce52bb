//! Relationship services.
//!
//! # Responsibility
//! - Create people and companies.
//! - Resolve references through the lookup facade before mutating.
//! - Drive two-sided association changes through the repository.
//!
//! # Invariants
//! - An unresolved reference surfaces as `Ok(None)`, never as a partial write.
//! - A person moves between employers only by leaving one and joining another.

pub mod company;
pub mod person;

pub use company::CompanyService;
pub use person::PersonService;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What `PersonService::create` does with a company id that does not resolve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedCompany {
    /// Create the person without an employer
    #[default]
    Orphan,

    /// Refuse the creation and report the reference as not found
    Reject,
}

impl UnresolvedCompany {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedCompany::Orphan => "orphan",
            UnresolvedCompany::Reject => "reject",
        }
    }
}

impl fmt::Display for UnresolvedCompany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnresolvedCompany {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "orphan" => Ok(UnresolvedCompany::Orphan),
            "reject" => Ok(UnresolvedCompany::Reject),
            other => Err(format!(
                "unknown unresolved-company policy `{}` (expected `orphan` or `reject`)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!("orphan".parse::<UnresolvedCompany>(), Ok(UnresolvedCompany::Orphan));
        assert_eq!(" Reject ".parse::<UnresolvedCompany>(), Ok(UnresolvedCompany::Reject));
        assert!("fail".parse::<UnresolvedCompany>().is_err());
    }

    #[test]
    fn test_policy_default_is_orphan() {
        assert_eq!(UnresolvedCompany::default(), UnresolvedCompany::Orphan);
        assert_eq!(UnresolvedCompany::Reject.to_string(), "reject");
    }
}
