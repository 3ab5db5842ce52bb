// Roster - Core Library
// Persons, companies and addresses with consistent two-sided associations.
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod entities;
pub mod error;
pub mod import;
pub mod logging;
pub mod lookup;
pub mod services;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use entities::{
    Address, AddressDraft, AddressId,
    Company, CompanyDraft, CompanyId,
    EntityKind,
    Person, PersonDraft, PersonId,
};
pub use error::{ServiceError, ServiceResult, StoreError, StoreResult};
pub use import::{import_people, import_people_csv, ImportSummary};
pub use logging::init_logging;
pub use lookup::Lookup;
pub use services::{CompanyService, PersonService, UnresolvedCompany};
pub use store::{
    AuditAction, AuditEvent, MemoryRepository, Repository, SqliteRepository,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
