use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod bmi;
mod cohort;
mod config;
mod db;
mod export;
mod filters;
mod logging;
mod models;
mod report;
mod risk;
mod validation;

use models::{AlertFilters, Severity, SubCategory};

#[derive(Parser)]
#[command(name = "school-health")]
#[command(about = "BMI alert feed for school sport cohorts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Deep-link query, e.g. "esporte=Futsal&sub=Sub-10"; replaces the other flags
    #[arg(long, conflicts_with_all = ["esporte", "sub", "severidade"])]
    query: Option<String>,
    /// Comma-separated sport keys, e.g. Futsal,Basquete
    #[arg(long)]
    esporte: Option<String>,
    /// Comma-separated subcategories, e.g. Sub-10,Sub-12
    #[arg(long)]
    sub: Option<String>,
    /// Comma-separated severities: Crítico, Atenção, Monitorar
    #[arg(long)]
    severidade: Option<String>,
}

impl FilterArgs {
    fn to_filters(&self) -> AlertFilters {
        if let Some(query) = self.query.as_deref() {
            return filters::parse_filter_query(query);
        }
        AlertFilters {
            sports: filters::parse_multi_param(self.esporte.as_deref()),
            subcategories: filters::parse_multi_param(self.sub.as_deref()),
            severities: filters::parse_multi_param(self.severidade.as_deref()),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load reference data and sample students
    Seed,
    /// Import students from a CSV file
    ImportStudents {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the prioritized alert feed
    Alerts {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Export the filtered alert feed as CSV
    ExportAlerts {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown alert report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "alertas.md")]
        out: PathBuf,
    },
    /// Show the per-subcategory breakdown of one sport
    Sport {
        /// Sport route, e.g. futsal
        route: String,
        #[arg(long)]
        json: bool,
    },
    /// Export students as CSV
    ExportStudents {
        /// Search by name, registration code or sport
        #[arg(long)]
        q: Option<String>,
        /// Restrict to one sport key
        #[arg(long)]
        sport: Option<String>,
        /// Comma-separated student ids to export
        #[arg(long)]
        ids: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export teachers as CSV
    ExportTeachers {
        #[arg(long)]
        q: Option<String>,
        /// Comma-separated teacher ids to export
        #[arg(long)]
        ids: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the deep link for a filtered alert view
    Link {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

async fn load_alerts(
    pool: &sqlx::PgPool,
    selection: &AlertFilters,
) -> anyhow::Result<Vec<models::AlertItem>> {
    for label in selection.subcategories.iter() {
        if let Err(err) = label.parse::<SubCategory>() {
            tracing::warn!(error = %err, "subcategory filter matches no cohort");
        }
    }
    for label in selection.severities.iter() {
        if let Err(err) = label.parse::<Severity>() {
            tracing::warn!(error = %err, "severity filter matches no cohort");
        }
    }

    let (students, sports, ideal) = tokio::try_join!(
        db::fetch_students(pool),
        db::fetch_sports(pool),
        db::fetch_ideal_bmi(pool),
    )?;

    let alerts = risk::build_alerts(&students, &sports, &cohort::ideal_table(&ideal));
    let filtered = filters::filter_alerts(&alerts, selection);
    tracing::info!(
        total = alerts.len(),
        shown = filtered.len(),
        "alert feed ready"
    );
    Ok(filtered)
}

fn write_output(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Deep links need no database.
    if let Commands::Link { filters: args } = &cli.command {
        println!("{}", filters::filter_link("/alertas", &args.to_filters()));
        return Ok(());
    }

    let settings = config::Settings::from_env()?;
    logging::init_logging(settings.is_production());

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportStudents { csv } => {
            let outcome = db::import_students_csv(&pool, &csv).await?;
            println!(
                "Imported {} new and updated {} students from {} ({} rejected).",
                outcome.inserted,
                outcome.updated,
                csv.display(),
                outcome.rejected
            );
        }
        Commands::Alerts {
            filters,
            limit,
            json,
        } => {
            let alerts = load_alerts(&pool, &filters.to_filters()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
                return Ok(());
            }

            if alerts.is_empty() {
                println!("No alerts found for this filter.");
                return Ok(());
            }

            println!("Cohorts by priority:");
            for alert in alerts.iter().take(limit) {
                println!(
                    "- [{}] {} {} ({} students) {:.1}% out of range, BMI {:.2} vs ideal {:.2}",
                    alert.severity,
                    alert.sport_display_name,
                    alert.sub_category,
                    alert.students_count,
                    alert.out_of_range_rate,
                    alert.avg_bmi,
                    alert.ideal_bmi
                );
            }
        }
        Commands::ExportAlerts { filters, out } => {
            let alerts = load_alerts(&pool, &filters.to_filters()).await?;
            let csv = export::alerts_to_csv(&alerts)?;
            let out = out.unwrap_or_else(|| export::export_filename("alertas", Utc::now()).into());
            write_output(&out, &csv)?;
            println!("Exported {} alerts to {}.", alerts.len(), out.display());
        }
        Commands::Report { filters, out } => {
            let filters = filters.to_filters();
            let alerts = load_alerts(&pool, &filters).await?;
            let report = report::build_report(&filters, Utc::now(), &alerts);
            write_output(&out, &report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Sport { route, json } => {
            let Some(sport) = db::fetch_sport_by_route(&pool, &route).await? else {
                anyhow::bail!("no sport registered under route {route:?}");
            };
            let (students, ideal) =
                tokio::try_join!(db::fetch_students(&pool), db::fetch_ideal_bmi(&pool))?;
            let breakdown =
                cohort::sport_breakdown(&sport.name, &students, &cohort::ideal_table(&ideal));

            if json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                print!("{}", report::render_breakdown(&sport.alter_name, &breakdown));
            }
        }
        Commands::ExportStudents { q, sport, ids, out } => {
            let ids = filters::parse_ids(ids.as_deref());
            let students =
                db::fetch_student_profiles(&pool, q.as_deref(), sport.as_deref(), &ids).await?;
            let csv = export::students_to_csv(&students)?;
            let out =
                out.unwrap_or_else(|| export::export_filename("estudantes", Utc::now()).into());
            write_output(&out, &csv)?;
            println!("Exported {} students to {}.", students.len(), out.display());
        }
        Commands::ExportTeachers { q, ids, out } => {
            let ids = filters::parse_ids(ids.as_deref());
            let teachers = db::fetch_teacher_profiles(&pool, q.as_deref(), &ids).await?;
            let csv = export::teachers_to_csv(&teachers)?;
            let out =
                out.unwrap_or_else(|| export::export_filename("professores", Utc::now()).into());
            write_output(&out, &csv)?;
            println!("Exported {} teachers to {}.", teachers.len(), out.display());
        }
        Commands::Link { .. } => {}
    }

    Ok(())
}
