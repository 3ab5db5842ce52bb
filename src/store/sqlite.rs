use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::{AuditAction, AuditEvent, Repository};
use crate::entities::{
    Address, AddressDraft, AddressId, Company, CompanyDraft, CompanyId, EntityKind, Person,
    PersonDraft, PersonId,
};
use crate::error::{StoreError, StoreResult};

/// SQLite-backed storage collaborator
///
/// Every multi-row write runs inside one transaction, so the two sides of
/// an association are never observable half-written.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        info!("Opened roster database at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    /// Wrap an already-configured connection
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Entity tables
    // AUTOINCREMENT keeps deleted identifiers from ever being handed out again
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            firstname TEXT NOT NULL DEFAULT '',
            lastname TEXT NOT NULL DEFAULT '',
            company_id INTEGER REFERENCES companies(id),
            employment_seq INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            street TEXT NOT NULL DEFAULT '',
            street_number INTEGER NOT NULL DEFAULT 0,
            zip_code TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Person <-> Address join table (people own the link)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS person_addresses (
            person_id INTEGER NOT NULL REFERENCES people(id),
            address_id INTEGER NOT NULL REFERENCES addresses(id),
            position INTEGER NOT NULL,
            PRIMARY KEY (person_id, address_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            entity_kind TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_people_company ON people(company_id, employment_seq)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_person_addresses_address ON person_addresses(address_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_kind, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &AuditEvent) -> StoreResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, action, entity_kind, entity_id, data
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.action.as_str(),
            event.entity_kind.as_str(),
            event.entity_id,
            data_json,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    kind: EntityKind,
    entity_id: i64,
) -> StoreResult<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, action, entity_kind, entity_id, data
         FROM events
         WHERE entity_kind = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![kind.as_str(), entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let action_str: String = row.get(2)?;
            let kind_str: String = row.get(3)?;
            let data_json: String = row.get(5)?;

            Ok(AuditEvent {
                event_id: row.get(0)?,
                timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                    .with_timezone(&chrono::Utc),
                action: AuditAction::parse(&action_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        Type::Text,
                        format!("unknown audit action `{action_str}`").into(),
                    )
                })?,
                entity_kind: EntityKind::parse(&kind_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        Type::Text,
                        format!("unknown entity kind `{kind_str}`").into(),
                    )
                })?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn record(conn: &Connection, events: &[AuditEvent]) -> StoreResult<()> {
    for event in events {
        insert_event(conn, event)?;
    }
    Ok(())
}

/// `None` when the person row is missing, `Some(employer)` otherwise
fn current_employer(conn: &Connection, person: PersonId) -> StoreResult<Option<Option<CompanyId>>> {
    let row = conn
        .query_row(
            "SELECT company_id FROM people WHERE id = ?1",
            [person.get()],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?;

    Ok(row.map(|company| company.map(CompanyId)))
}

fn company_exists(conn: &Connection, company: CompanyId) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM companies WHERE id = ?1",
        [company.get()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn next_employment_seq(conn: &Connection, company: CompanyId) -> StoreResult<i64> {
    let seq: i64 = conn.query_row(
        "SELECT COALESCE(MAX(employment_seq), 0) + 1 FROM people WHERE company_id = ?1",
        [company.get()],
        |row| row.get(0),
    )?;
    Ok(seq)
}

fn load_address_holders(conn: &Connection, address: AddressId) -> StoreResult<Vec<PersonId>> {
    let mut stmt = conn.prepare(
        "SELECT person_id FROM person_addresses WHERE address_id = ?1 ORDER BY person_id",
    )?;

    let holders = stmt
        .query_map([address.get()], |row| row.get::<_, i64>(0))?
        .map(|id| id.map(PersonId))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(holders)
}

fn address_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Address> {
    let id: i64 = row.get(0)?;
    Ok(Address::hydrate(
        AddressId(id),
        AddressDraft {
            street: row.get(1)?,
            street_number: row.get(2)?,
            zip_code: row.get(3)?,
            city: row.get(4)?,
            country: row.get(5)?,
        },
    ))
}

fn load_address(conn: &Connection, id: AddressId) -> StoreResult<Option<Address>> {
    let address = conn
        .query_row(
            "SELECT id, street, street_number, zip_code, city, country
             FROM addresses
             WHERE id = ?1",
            [id.get()],
            address_from_row,
        )
        .optional()?;

    let Some(mut address) = address else {
        return Ok(None);
    };

    for holder in load_address_holders(conn, id)? {
        address.add_person(holder);
    }

    Ok(Some(address))
}

fn load_person(conn: &Connection, id: PersonId) -> StoreResult<Option<Person>> {
    let person = conn
        .query_row(
            "SELECT id, firstname, lastname, company_id FROM people WHERE id = ?1",
            [id.get()],
            |row| {
                let company: Option<i64> = row.get(3)?;
                Ok(Person::hydrate(
                    PersonId(row.get(0)?),
                    row.get(1)?,
                    row.get(2)?,
                    company.map(CompanyId),
                ))
            },
        )
        .optional()?;

    let Some(mut person) = person else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT a.id, a.street, a.street_number, a.zip_code, a.city, a.country
         FROM person_addresses pa
         JOIN addresses a ON a.id = pa.address_id
         WHERE pa.person_id = ?1
         ORDER BY pa.position",
    )?;

    let addresses = stmt
        .query_map([id.get()], address_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for mut address in addresses {
        for holder in load_address_holders(conn, address.id())? {
            address.add_person(holder);
        }
        person.add_address(address);
    }

    Ok(Some(person))
}

fn load_company(conn: &Connection, id: CompanyId) -> StoreResult<Option<Company>> {
    let company = conn
        .query_row(
            "SELECT id, name FROM companies WHERE id = ?1",
            [id.get()],
            |row| Ok(Company::hydrate(CompanyId(row.get(0)?), row.get(1)?)),
        )
        .optional()?;

    let Some(mut company) = company else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id FROM people WHERE company_id = ?1 ORDER BY employment_seq, id",
    )?;

    let employee_ids = stmt
        .query_map([id.get()], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for employee_id in employee_ids {
        let employee = load_person(conn, PersonId(employee_id))?.ok_or_else(|| {
            StoreError::Corrupt(format!("employee {} vanished while loading", employee_id))
        })?;
        company.add_employee(employee);
    }

    Ok(Some(company))
}

fn set_employer(conn: &Connection, person: PersonId, company: Option<CompanyId>) -> StoreResult<()> {
    let seq = match company {
        Some(company) => Some(next_employment_seq(conn, company)?),
        None => None,
    };

    conn.execute(
        "UPDATE people SET company_id = ?1, employment_seq = ?2 WHERE id = ?3",
        params![company.map(CompanyId::get), seq, person.get()],
    )?;

    Ok(())
}

impl Repository for SqliteRepository {
    fn insert_person(&self, draft: &PersonDraft) -> StoreResult<PersonId> {
        let tx = self.conn.unchecked_transaction()?;

        if let Some(company) = draft.company {
            if !company_exists(&tx, company)? {
                return Err(StoreError::Dangling(format!("company {}", company)));
            }
        }

        tx.execute(
            "INSERT INTO people (firstname, lastname) VALUES (?1, ?2)",
            params![draft.first_name, draft.last_name],
        )?;
        let id = PersonId(tx.last_insert_rowid());

        record(
            &tx,
            &[AuditEvent::new(
                AuditAction::PersonCreated,
                EntityKind::Person,
                id.get(),
                serde_json::json!({
                    "firstname": draft.first_name,
                    "lastname": draft.last_name,
                }),
            )],
        )?;

        if let Some(company) = draft.company {
            set_employer(&tx, id, Some(company))?;
            record(&tx, &AuditEvent::employment(AuditAction::EmploymentLinked, id, company))?;
        }

        tx.commit()?;
        debug!("Inserted person {}", id);
        Ok(id)
    }

    fn find_person(&self, id: PersonId) -> StoreResult<Option<Person>> {
        load_person(&self.conn, id)
    }

    fn delete_person(&self, id: PersonId) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(employer) = current_employer(&tx, id)? else {
            return Ok(false);
        };

        if let Some(company) = employer {
            record(&tx, &AuditEvent::employment(AuditAction::EmploymentSevered, id, company))?;
        }

        let address_ids: Vec<i64> = {
            let mut stmt =
                tx.prepare("SELECT address_id FROM person_addresses WHERE person_id = ?1")?;
            let ids = stmt
                .query_map([id.get()], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        tx.execute("DELETE FROM person_addresses WHERE person_id = ?1", [id.get()])?;
        tx.execute("DELETE FROM people WHERE id = ?1", [id.get()])?;

        // Addresses never outlive their last holder
        for address_id in address_ids {
            tx.execute(
                "DELETE FROM addresses
                 WHERE id = ?1
                   AND NOT EXISTS (SELECT 1 FROM person_addresses WHERE address_id = ?1)",
                [address_id],
            )?;
        }

        record(
            &tx,
            &[AuditEvent::new(
                AuditAction::PersonDeleted,
                EntityKind::Person,
                id.get(),
                serde_json::json!({}),
            )],
        )?;

        tx.commit()?;
        Ok(true)
    }

    fn attach_address(&self, person: PersonId, address: &AddressDraft) -> StoreResult<AddressId> {
        let tx = self.conn.unchecked_transaction()?;

        if current_employer(&tx, person)?.is_none() {
            return Err(StoreError::Dangling(format!("person {}", person)));
        }

        tx.execute(
            "INSERT INTO addresses (street, street_number, zip_code, city, country)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                address.street,
                address.street_number,
                address.zip_code,
                address.city,
                address.country,
            ],
        )?;
        let address_id = AddressId(tx.last_insert_rowid());

        tx.execute(
            "INSERT INTO person_addresses (person_id, address_id, position)
             VALUES (?1, ?2, (SELECT COALESCE(MAX(position), 0) + 1
                              FROM person_addresses WHERE person_id = ?1))",
            params![person.get(), address_id.get()],
        )?;

        let data = serde_json::json!({
            "person_id": person.get(),
            "address_id": address_id.get(),
        });
        record(
            &tx,
            &[
                AuditEvent::new(AuditAction::AddressAttached, EntityKind::Person, person.get(), data.clone()),
                AuditEvent::new(AuditAction::AddressAttached, EntityKind::Address, address_id.get(), data),
            ],
        )?;

        tx.commit()?;
        Ok(address_id)
    }

    fn find_address(&self, id: AddressId) -> StoreResult<Option<Address>> {
        load_address(&self.conn, id)
    }

    fn insert_company(&self, draft: &CompanyDraft) -> StoreResult<CompanyId> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("INSERT INTO companies (name) VALUES (?1)", [&draft.name])?;
        let id = CompanyId(tx.last_insert_rowid());

        record(
            &tx,
            &[AuditEvent::new(
                AuditAction::CompanyCreated,
                EntityKind::Company,
                id.get(),
                serde_json::json!({ "name": draft.name }),
            )],
        )?;

        tx.commit()?;
        Ok(id)
    }

    fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        load_company(&self.conn, id)
    }

    fn delete_company(&self, id: CompanyId) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;

        if !company_exists(&tx, id)? {
            return Ok(false);
        }

        let remaining: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM people WHERE company_id = ?1")?;
            let ids = stmt
                .query_map([id.get()], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        for person in remaining {
            set_employer(&tx, PersonId(person), None)?;
            record(
                &tx,
                &AuditEvent::employment(AuditAction::EmploymentSevered, PersonId(person), id),
            )?;
        }

        tx.execute("DELETE FROM companies WHERE id = ?1", [id.get()])?;

        record(
            &tx,
            &[AuditEvent::new(
                AuditAction::CompanyDeleted,
                EntityKind::Company,
                id.get(),
                serde_json::json!({}),
            )],
        )?;

        tx.commit()?;
        Ok(true)
    }

    fn link_employment(&self, person: PersonId, company: CompanyId) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        let employer = current_employer(&tx, person)?
            .ok_or_else(|| StoreError::Dangling(format!("person {}", person)))?;

        if !company_exists(&tx, company)? {
            return Err(StoreError::Dangling(format!("company {}", company)));
        }

        if employer == Some(company) {
            return Ok(());
        }

        if let Some(previous) = employer {
            record(&tx, &AuditEvent::employment(AuditAction::EmploymentSevered, person, previous))?;
        }

        set_employer(&tx, person, Some(company))?;
        record(&tx, &AuditEvent::employment(AuditAction::EmploymentLinked, person, company))?;

        tx.commit()?;
        Ok(())
    }

    fn unlink_employment(&self, person: PersonId) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        let employer = current_employer(&tx, person)?
            .ok_or_else(|| StoreError::Dangling(format!("person {}", person)))?;

        let Some(company) = employer else {
            return Ok(());
        };

        set_employer(&tx, person, None)?;
        record(&tx, &AuditEvent::employment(AuditAction::EmploymentSevered, person, company))?;

        tx.commit()?;
        Ok(())
    }

    fn events_for(&self, kind: EntityKind, id: i64) -> StoreResult<Vec<AuditEvent>> {
        get_events_for_entity(&self.conn, kind, id)
    }
}
