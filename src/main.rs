use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rubrica::config::{Config, DEFAULT_CONFIG_FILE, StorageMode};
use rubrica::draft::{self, EvaluationDraft};
use rubrica::scoring::{self, Criterion, Scores, TEMPLATES};
use rubrica::{DetailFilter, SortOrder, import, seed, store};

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the evaluations table if needed
    Init,
    /// Show rubric templates, their weights and the level legend
    Templates,
    /// Score one subject and save the evaluation
    Add {
        #[arg(long)]
        course: String,
        #[arg(long)]
        evaluation: String,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        subject: String,
        /// Rubric template, defaults to the configured one
        #[arg(long)]
        template: Option<String>,
        /// criterion=value, e.g. estructura=4 (repeatable)
        #[arg(long = "score", value_parser = parse_score_arg)]
        scores: Vec<(Criterion, f64)>,
        #[arg(long, default_value = "")]
        observations: String,
    },
    /// Save one unscored row per roster line
    Roster {
        #[arg(long)]
        course: String,
        #[arg(long)]
        evaluation: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        template: Option<String>,
        /// File with one group or student per line
        file: PathBuf,
    },
    /// List id, date, subject and final score
    List {
        #[arg(long, default_value = "DESC")]
        order: SortOrder,
    },
    /// List full records as JSON, optionally filtered
    Detail {
        /// Case-insensitive text in course, evaluation, subject or observations
        #[arg(long)]
        text: Option<String>,
        /// Exact date, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "DESC")]
        order: SortOrder,
    },
    /// Export every record to CSV
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a timestamped CSV backup
    Backup {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Bulk-load a CSV file into the database
    Import { csv: PathBuf },
    /// Insert five sample evaluations
    Seed,
}

#[derive(Parser, Debug)]
#[command(name = "rubrica")]
#[command(about = "Rubric grade entry and reporting", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Use the flat CSV ledger instead of SQLite for this run
    #[arg(long, global = true)]
    csv_only: bool,

    #[command(subcommand)]
    command: Command,
}

fn parse_score_arg(s: &str) -> Result<(Criterion, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected criterion=value, got '{s}'"))?;
    let criterion: Criterion = name.parse()?;
    let value = scoring::parse_score(criterion, value).map_err(|e| e.to_string())?;
    Ok((criterion, value))
}

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rubrica=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config);
    let mode = if cli.csv_only {
        StorageMode::Csv
    } else {
        config.storage.mode
    };

    match run(cli.command, &config, mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config, mode: StorageMode) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Templates => {
            for t in &TEMPLATES {
                println!("{}", t.name);
                for c in Criterion::ALL {
                    println!("  {:<13} {:>3}%  {}", c.column(), t.weight(c), t.description(c));
                }
            }
            println!("{}", scoring::levels_legend());
        }
        Command::Init => {
            store::open(config, mode)?;
            println!("Store ready ({mode:?})");
        }
        Command::Add {
            course,
            evaluation,
            date,
            subject,
            template,
            scores,
            observations,
        } => {
            let draft = EvaluationDraft {
                template: template.unwrap_or_else(|| config.rubric.template.clone()),
                course,
                evaluation,
                date: date.unwrap_or_else(today),
                subject,
                scores: scores.into_iter().collect::<Scores>(),
                observations,
            };
            let preview = draft.preview();
            if let Some(warning) = &preview.warning {
                tracing::warn!("{warning}");
            }
            let new = draft.to_new_evaluation()?;
            let id = store::open(config, mode)?.insert(&new)?;
            println!("Saved evaluation id={id} nota_final={}", preview.value);
        }
        Command::Roster {
            course,
            evaluation,
            date,
            template,
            file,
        } => {
            let header = EvaluationDraft {
                template: template.unwrap_or_else(|| config.rubric.template.clone()),
                course,
                evaluation,
                date: date.unwrap_or_else(today),
                ..Default::default()
            };
            let roster = std::fs::read_to_string(&file)?;
            let store = store::open(config, mode)?;
            let mut saved = 0;
            for row in draft::roster_placeholders(&header, &roster) {
                match store.insert(&row) {
                    Ok(_) => saved += 1,
                    Err(e) => tracing::warn!("{e}"),
                }
            }
            println!("Saved {saved} evaluations ({mode:?})");
        }
        Command::List { order } => {
            let store = store::open(config, mode)?;
            println!("id\tfecha\tgrupo_o_estudiante\tnota_final");
            for s in store.list_summary(order)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    s.id,
                    s.date.unwrap_or_default(),
                    s.subject.unwrap_or_default(),
                    s.final_score.map(|v| v.to_string()).unwrap_or_default()
                );
            }
        }
        Command::Detail { text, date, order } => {
            let store = store::open(config, mode)?;
            let records = store.list_detail(&DetailFilter { text, date, order })?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Export { out } => {
            let path = store::open(config, mode)?.export_all(out.as_deref())?;
            println!("Exported to {}", path.display());
        }
        Command::Backup { dir } => {
            let path = store::open(config, mode)?.backup_timestamped(dir.as_deref())?;
            println!("Backup written to {}", path.display());
        }
        Command::Import { csv } => {
            let outcome = import::import_csv(&store::database(config), &csv)?;
            println!(
                "Inserted {} rows, skipped {} duplicates, {} invalid",
                outcome.summary.inserted_count, outcome.summary.skipped_count, outcome.rejected
            );
            println!("Report: {}", outcome.report_path.display());
            println!("Summary: {}", outcome.summary_path.display());
        }
        Command::Seed => {
            let store = store::open(config, mode)?;
            let ids = seed::seed_demo(store.as_ref())?;
            println!("Inserted {} demo evaluations", ids.len());
        }
    }
    Ok(())
}
