use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use eureka::config::{self, NotebookConfig};
use eureka::model::{CustomField, NarrativeField, NewObservation, Table};
use eureka::validation::validate_draft;
use eureka::{FileStorage, NotebookError, Query, SortKey, Store};
use std::path::{Path, PathBuf};
use std::process;

/// Eureka CLI: keep a research notebook of daily observations
#[derive(Parser)]
#[command(name = "eureka", version, about)]
struct Cli {
    /// Path to the notebook data directory
    #[arg(long, env = "EUREKA_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Config file (default: <data-dir>/notebook.yaml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Id,
    Date,
    Researcher,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Id => SortKey::Id,
            SortArg::Date => SortKey::Date,
            SortArg::Researcher => SortKey::Researcher,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum NarrativeArg {
    Problem,
    Solution,
    Outcome,
}

impl From<NarrativeArg> for NarrativeField {
    fn from(arg: NarrativeArg) -> Self {
        match arg {
            NarrativeArg::Problem => NarrativeField::Problem,
            NarrativeArg::Solution => NarrativeField::Solution,
            NarrativeArg::Outcome => NarrativeField::Outcome,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Record a new observation
    New {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        researcher: String,
        /// Date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        problem: String,
        #[arg(long, default_value = "")]
        solution: String,
        #[arg(long, default_value = "")]
        outcome: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Text field (e.g. --text Setup="Helium-neon laser")
        #[arg(long = "text", value_parser = parse_key_value)]
        texts: Vec<(String, String)>,
        /// Number field (e.g. --number Wavelength=632.8)
        #[arg(long = "number", value_parser = parse_key_value)]
        numbers: Vec<(String, String)>,
        /// Table field with its header cells (e.g. --table Readings="t,x")
        #[arg(long = "table", value_parser = parse_key_value)]
        tables: Vec<(String, String)>,
    },

    /// Replace fields of an existing observation
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        researcher: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        problem: Option<String>,
        #[arg(long)]
        solution: Option<String>,
        #[arg(long)]
        outcome: Option<String>,
        /// Empty a narrative field
        #[arg(long)]
        clear: Vec<NarrativeArg>,
    },

    /// Delete an observation
    Delete {
        id: String,
        /// Show what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Show one observation
    Show { id: String },

    /// List observations, optionally filtered and sorted
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "id")]
        sort: SortArg,
        #[arg(long)]
        tag: Option<String>,
    },

    /// Add or remove tags
    Tag {
        id: String,
        #[arg(long)]
        add: Vec<String>,
        #[arg(long)]
        remove: Vec<String>,
    },

    /// Edit a table field
    Table {
        id: String,
        field: String,
        #[command(subcommand)]
        op: TableOp,
    },

    /// Remove a custom field
    RemoveField { id: String, field: String },

    /// Total, today's and researcher counts
    Stats,

    /// Show or update the researcher profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        designation: Option<String>,
        #[arg(long)]
        organization: Option<String>,
    },

    /// Dump the whole collection in its stored layout
    Export,
}

#[derive(Subcommand)]
enum TableOp {
    AddRow,
    AddColumn,
    Set {
        row: usize,
        column: usize,
        value: String,
    },
    RemoveRow {
        row: usize,
    },
    RemoveColumn {
        column: usize,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> eureka::Result<NotebookConfig> {
    match &cli.config {
        Some(path) => config::parse_config(path),
        None => config::load_from_dir(&cli.data_dir),
    }
}

fn open_store(data_dir: &Path, config: NotebookConfig) -> eureka::Result<Store<FileStorage>> {
    let storage = FileStorage::open(data_dir)?;
    log::info!("Opening notebook at: {}", storage.root().display());
    Store::open(storage, config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let mut store = open_store(&cli.data_dir, config)?;

    match cli.command {
        Command::New {
            title,
            researcher,
            date,
            problem,
            solution,
            outcome,
            tags,
            texts,
            numbers,
            tables,
        } => {
            let mut draft = NewObservation {
                title,
                researcher,
                problem,
                solution,
                outcome,
                ..Default::default()
            };
            if let Some(date) = date {
                draft.date = date;
            }
            for tag in &tags {
                draft.add_tag(tag);
            }
            for (label, value) in texts {
                draft.custom_fields.push(CustomField::text(label, value));
            }
            for (label, value) in numbers {
                let number = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| format!("'{value}' is not a finite number"))?;
                draft.custom_fields.push(CustomField::number(label, number));
            }
            for (label, headers) in tables {
                let table = Table::new(headers.split(',').map(str::trim));
                draft.custom_fields.push(CustomField::table(label, table));
            }

            for warning in validate_draft(&draft, store.config().schema_variant).into_result()? {
                log::warn!("{warning}");
            }
            let created = store.create(draft)?;
            print_output(&serde_json::to_value(&created)?, &cli.format)?;
        }

        Command::Edit {
            id,
            title,
            researcher,
            date,
            problem,
            solution,
            outcome,
            clear,
        } => {
            let changed = store.modify(&id, |obs| {
                if let Some(title) = title {
                    obs.title = title;
                }
                if let Some(researcher) = researcher {
                    obs.researcher = researcher;
                }
                if let Some(date) = date {
                    obs.date = date;
                }
                if let Some(problem) = problem {
                    obs.problem = problem;
                }
                if let Some(solution) = solution {
                    obs.solution = solution;
                }
                if let Some(outcome) = outcome {
                    obs.outcome = outcome;
                }
                for field in clear {
                    obs.clear(field.into());
                }
                Ok(())
            })?;
            print_output(&serde_json::json!({ "ok": changed, "id": id }), &cli.format)?;
        }

        Command::Delete { id, dry_run } => {
            if dry_run {
                let doc = store.get_required(&id)?;
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": id,
                        "observation": doc,
                    }),
                    &cli.format,
                )?;
            } else {
                let deleted = store.delete(&id)?;
                print_output(&serde_json::json!({ "ok": deleted, "deleted": id }), &cli.format)?;
            }
        }

        Command::Show { id } => {
            let doc = store.get_required(&id)?;
            print_output(&serde_json::to_value(doc)?, &cli.format)?;
        }

        Command::List {
            search,
            date,
            sort,
            tag,
        } => {
            let query = Query {
                search,
                date,
                sort: sort.into(),
                tag,
            };
            let results = store.query(&query);
            print_output(&serde_json::to_value(&results)?, &cli.format)?;
        }

        Command::Tag { id, add, remove } => {
            let changed = store.modify(&id, |obs| {
                for tag in &add {
                    obs.add_tag(tag);
                }
                for tag in &remove {
                    obs.remove_tag(tag);
                }
                Ok(())
            })?;
            print_output(&serde_json::json!({ "ok": changed, "id": id }), &cli.format)?;
        }

        Command::Table { id, field, op } => {
            let changed = store.modify(&id, |obs| {
                let table = obs
                    .custom_field_mut(&field)
                    .and_then(|f| f.table_mut())
                    .ok_or_else(|| {
                        NotebookError::InvalidField(format!("'{field}' is not a table field"))
                    })?;
                match op {
                    TableOp::AddRow => table.add_row(),
                    TableOp::AddColumn => table.add_column(),
                    TableOp::Set { row, column, value } => table.set_cell(row, column, value)?,
                    TableOp::RemoveRow { row } => table.remove_row(row)?,
                    TableOp::RemoveColumn { column } => table.remove_column(column)?,
                }
                Ok(())
            })?;
            print_output(&serde_json::json!({ "ok": changed, "id": id }), &cli.format)?;
        }

        Command::RemoveField { id, field } => {
            let changed = store.modify(&id, |obs| {
                obs.remove_custom_field(&field);
                Ok(())
            })?;
            print_output(&serde_json::json!({ "ok": changed, "id": id }), &cli.format)?;
        }

        Command::Stats => {
            print_output(&serde_json::to_value(store.stats())?, &cli.format)?;
        }

        Command::Profile {
            name,
            designation,
            organization,
        } => {
            let mut profile = store.profile()?;
            let updating = name.is_some() || designation.is_some() || organization.is_some();
            if let Some(name) = name {
                profile.name = name;
            }
            if let Some(designation) = designation {
                profile.designation = designation;
            }
            if let Some(organization) = organization {
                profile.organization = organization;
            }
            if updating {
                store.save_profile(&profile)?;
            }
            print_output(&serde_json::to_value(&profile)?, &cli.format)?;
        }

        Command::Export => {
            print_output(&serde_json::to_value(store.observations())?, &cli.format)?;
        }
    }

    Ok(())
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
