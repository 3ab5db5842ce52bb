use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::Path;

use roster::{
    import_people_csv, init_logging, CompanyId, CompanyService, Config, EntityKind,
    PersonId, PersonService, Repository, SqliteRepository,
};

const USAGE: &str = "usage:
  roster init
  roster import <people.csv>
  roster person <id>
  roster company <id>
  roster events <person|company> <id>";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let config = Config::from_env()?;
    init_logging(&config.log_level, config.log_dir.as_deref())?;

    let Some(command) = args.first() else {
        bail!("{}", USAGE);
    };

    let repo = SqliteRepository::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    match command.as_str() {
        "init" => {
            println!("✓ Database ready: {}", config.database_path.display());
        }
        "import" => {
            let path = args.get(1).ok_or_else(|| anyhow!("{}", USAGE))?;
            run_import(&repo, &config, Path::new(path))?;
        }
        "person" => {
            let id = parse_id(args.get(1))?;
            let people = PersonService::new(&repo, config.unresolved_company);
            match people.get_by_id(PersonId(id))? {
                Some(person) => println!("{}", serde_json::to_string_pretty(&person)?),
                None => bail!("No person found with id {}", id),
            }
        }
        "company" => {
            let id = parse_id(args.get(1))?;
            let companies = CompanyService::new(PersonService::new(&repo, config.unresolved_company));
            match companies.get_by_id(CompanyId(id))? {
                Some(company) => println!("{}", serde_json::to_string_pretty(&company)?),
                None => bail!("No company found with id {}", id),
            }
        }
        "events" => {
            let kind = args
                .get(1)
                .and_then(|k| EntityKind::parse(k))
                .ok_or_else(|| anyhow!("{}", USAGE))?;
            let id = parse_id(args.get(2))?;
            let events = repo.events_for(kind, id)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        other => bail!("unknown command `{}`\n{}", other, USAGE),
    }

    Ok(())
}

fn parse_id(raw: Option<&String>) -> Result<i64> {
    let raw = raw.ok_or_else(|| anyhow!("{}", USAGE))?;
    raw.parse()
        .with_context(|| format!("`{}` is not a valid identifier", raw))
}

fn run_import(repo: &SqliteRepository, config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Importing people from {}", csv_path.display());
    println!("   Unresolved company policy: {}", config.unresolved_company);

    let people = PersonService::new(repo, config.unresolved_company);
    let summary = import_people_csv(&people, csv_path)?;

    println!("✓ Created: {} people", summary.created);
    if summary.rejected > 0 {
        println!("✓ Rejected (unknown company): {}", summary.rejected);
    }

    Ok(())
}
