//! Bulk import of people from CSV.
//!
//! Each row goes through `PersonService::create`, so company references are
//! resolved and the unresolved-company policy applies exactly as it does for
//! single creations.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::entities::{CompanyId, PersonDraft};
use crate::services::PersonService;
use crate::store::Repository;

/// One CSV row: `firstname,lastname,company`
#[derive(Debug, Deserialize)]
struct PersonRow {
    #[serde(default)]
    firstname: String,

    #[serde(default)]
    lastname: String,

    #[serde(default)]
    company: Option<i64>,
}

impl From<PersonRow> for PersonDraft {
    fn from(row: PersonRow) -> Self {
        PersonDraft {
            first_name: row.firstname,
            last_name: row.lastname,
            company: row.company.map(CompanyId),
        }
    }
}

/// Outcome of an import run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    /// Rows refused because their company did not resolve
    pub rejected: usize,
}

pub fn import_people_csv<R: Repository + ?Sized>(
    people: &PersonService<'_, R>,
    csv_path: &Path,
) -> Result<ImportSummary> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    import_people(people, file)
}

pub fn import_people<R: Repository + ?Sized, In: Read>(
    people: &PersonService<'_, R>,
    input: In,
) -> Result<ImportSummary> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);

    let mut summary = ImportSummary::default();

    for (line, result) in rdr.deserialize::<PersonRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to deserialize person on row {}", line + 1))?;
        let draft = PersonDraft::from(row);

        match people.create(&draft)? {
            Some(_) => summary.created += 1,
            None => {
                warn!("Row {} skipped: company reference did not resolve", line + 1);
                summary.rejected += 1;
            }
        }
    }

    info!(
        "Imported {} people ({} rejected)",
        summary.created, summary.rejected
    );

    Ok(summary)
}
