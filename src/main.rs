// Entry point and high-level CLI flow.
//
// - Option [1] scans and loads the checklist workbooks, printing diagnostics.
// - Option [2] applies the active filters, writes the fact tables and the
//   derived reports, and previews them on the console.
// With `--batch` both steps run once and the program exits.
mod assemble;
mod catalog;
mod config;
mod context;
mod error;
mod filter;
mod grid;
mod loader;
mod output;
mod reports;
mod scanner;
mod severity;
mod stats;
mod types;
mod util;

use assemble::FactTables;
use clap::Parser;
use config::AppConfig;
use filter::{RowFilter, SortOrder};
use once_cell::sync::Lazy;
use serde::Serialize;
use severity::Severity;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, warn};
use types::{
    CategoryImpact, CompanyType, GapAnalysis, GroupSummaryRow, IntervalSnapshot, KpiBreakdown,
    SeverityCountRow, SummaryStats, TrendOverview,
};

// Loaded tables are a read-only snapshot; a reload replaces them wholesale.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { data: None }));

struct AppState {
    data: Option<FactTables>,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    generated_at: String,
    filters: &'a RowFilter,
    summary: &'a SummaryStats,
    scale_max: f64,
    severity_legend: Vec<severity::LegendEntry>,
    severity_distribution: &'a [SeverityCountRow],
    types: Vec<GroupSummaryRow>,
    trend_overview: Option<TrendOverview>,
    interval_snapshots: Vec<IntervalSnapshot>,
    gap_analysis: Option<GapAnalysis>,
    kpi_breakdown: &'a KpiBreakdown,
    category_impact: &'a CategoryImpact,
}

#[derive(Parser)]
#[command(name = "blind_spot")]
#[command(about = "Omission severity scoring for disclosure checklists")]
struct Cli {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Workbook glob pattern (repeatable); overrides the configured patterns
    #[arg(short = 'p', long = "pattern")]
    patterns: Vec<String>,

    /// Directory holding the quotate/ and non_quotate/ workbooks
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    /// Directory the reports are written to
    #[arg(short = 'o', long)]
    out_dir: Option<PathBuf>,

    /// Load and generate reports once, then exit
    #[arg(long)]
    batch: bool,

    /// Keep only these years (repeatable)
    #[arg(long = "year")]
    years: Vec<i32>,

    /// Keep only this company type: quotate or non-quotate (repeatable)
    #[arg(long = "type")]
    types: Vec<String>,

    /// Keep only this sector (repeatable)
    #[arg(long = "sector")]
    sectors: Vec<String>,

    /// Keep only this severity band, e.g. Grave or N/A (repeatable)
    #[arg(long = "severity")]
    severities: Vec<String>,

    /// Keep only this company (repeatable)
    #[arg(long = "company")]
    companies: Vec<String>,

    /// Row order of the company table
    #[arg(long, value_enum, default_value_t = SortOrder::SeverityAsc)]
    sort: SortOrder,
}

impl Cli {
    fn settings(&self) -> error::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if !self.patterns.is_empty() {
            cfg.patterns = self.patterns.clone();
        }
        if let Some(dir) = &self.dataset_dir {
            cfg.dataset_dir = dir.clone();
        }
        if let Some(dir) = &self.out_dir {
            cfg.output_dir = dir.clone();
        }
        Ok(cfg)
    }

    fn filter(&self) -> RowFilter {
        let types = self
            .types
            .iter()
            .filter_map(|t| {
                let parsed = CompanyType::parse(t);
                if parsed.is_none() {
                    warn!(value = %t, "ignoring unknown company type");
                }
                parsed
            })
            .collect();
        let severities = self
            .severities
            .iter()
            .filter_map(|s| {
                let parsed = Severity::parse(s);
                if parsed.is_none() {
                    warn!(value = %s, "ignoring unknown severity band");
                }
                parsed
            })
            .collect();
        RowFilter {
            years: self.years.clone(),
            types,
            sectors: self.sectors.clone(),
            companies: self.companies.clone(),
            severities,
        }
    }
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask whether to go back to the menu after generating reports.
///
/// Returns `true` for `Y`, `false` for `N` or end of input.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        match io::stdin().read_line(&mut buf) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Option [1]: scan and load the workbooks into `APP_STATE`.
fn handle_load(cfg: &AppConfig) {
    let files = scanner::scan_workbooks(&cfg.effective_patterns(), &cfg.dataset_dir);
    if files.is_empty() {
        println!("No workbooks found. Check the dataset directory or --pattern.\n");
    }
    let (tables, report) = loader::load_dataset(&files);
    println!(
        "Processing workbooks... ({} files found, {} loaded, {} failed)",
        util::format_int(report.files_scanned),
        util::format_int(report.files_loaded),
        util::format_int(report.files_failed)
    );
    println!(
        "{} sheets parsed, {} company-year records, {} duplicates dropped, {} KPIs in catalog.",
        util::format_int(report.sheets_parsed),
        util::format_int(report.company_records),
        util::format_int(report.duplicates_dropped),
        util::format_int(report.catalog_size)
    );
    if tables.is_empty() {
        println!("Note: no data loaded.");
    }
    println!();
    let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
    state.data = Some(tables);
}

fn export<T: Serialize>(cfg: &AppConfig, file: &str, rows: &[T]) {
    if let Err(e) = output::write_csv(&cfg.output_dir.join(file), rows) {
        error!(file, error = %e, "write failed");
    }
}

/// Option [2]: filter, export and preview every report.
fn handle_generate_reports(cfg: &AppConfig, filter: &RowFilter, sort: SortOrder) {
    let data = {
        let state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
        state.data.clone()
    };
    let Some(data) = data.filter(|d| !d.is_empty()) else {
        println!("Error: No data loaded. Please load the workbooks first (option 1).\n");
        return;
    };
    let view = data.filtered(filter, Some(sort));
    if view.is_empty() {
        println!("No companies match the selected filters.\n");
        return;
    }
    if let Err(e) = std::fs::create_dir_all(&cfg.output_dir) {
        error!(dir = %cfg.output_dir.display(), error = %e, "cannot create output directory");
        return;
    }
    let rows = &view.companies;
    let n = cfg.preview_rows;

    println!("Generating reports...");
    println!("Outputs saved to {}\n", cfg.output_dir.display());

    export(cfg, "companies.csv", rows);
    println!("Report 1: Omission Severity by Company-Year");
    println!(
        "({} entries; {} companies available under the current filters)\n",
        util::format_int(rows.len()),
        util::format_int(filter::company_options(&data.companies, filter).len())
    );
    output::preview_table_rows(rows, n);

    if let Err(e) = output::write_pivot_csv(&cfg.output_dir.join("kpi_pivot.csv"), &view) {
        error!(error = %e, "write failed");
    }

    let trends = reports::generate_trends(rows);
    export(cfg, "trends.csv", &trends);
    println!("Report 2: Multi-Year OSS Trends");
    println!("(Negative change = improving transparency)\n");
    output::preview_table_rows(&trends, n);

    let sectors = reports::sector_summary(rows);
    export(cfg, "sector_summary.csv", &sectors);
    println!("Report 3: Sector Summary (excluding entries with no document)\n");
    output::preview_table_rows(&sectors, n);

    let impact = reports::category_impact(&view);
    export(cfg, "category_impact.csv", &impact.categories);
    println!("Report 4: Weighted Category Impact");
    println!("(Overall weighted missing rate: {}%)\n", util::format_number(impact.overall_rate_pct, 2));
    output::preview_table_rows(&impact.categories, n);

    let breakdown = reports::kpi_breakdown(&view);
    println!("Report 5: Most Omitted KPIs\n");
    output::preview_table_rows(&breakdown.kpis, n);

    let distribution = reports::severity_distribution(rows);
    println!("Severity Distribution\n");
    output::preview_table_rows(&distribution, distribution.len());

    let summary = reports::generate_summary(rows);
    let file = SummaryFile {
        generated_at: chrono::Local::now().to_rfc3339(),
        filters: filter,
        summary: &summary,
        scale_max: severity::MAX_OSS,
        severity_legend: severity::legend(),
        severity_distribution: &distribution,
        types: reports::type_summary(rows),
        trend_overview: reports::trend_overview(&trends),
        interval_snapshots: reports::interval_snapshots(rows, &cfg.interval_pairs),
        gap_analysis: reports::gap_analysis(rows, cfg.bootstrap_iterations, cfg.bootstrap_seed),
        kpi_breakdown: &breakdown,
        category_impact: &impact,
    };
    if let Err(e) = output::write_json(&cfg.output_dir.join("summary.json"), &file) {
        error!(error = %e, "write failed");
    }
    let context = context::build_context(rows, filter);
    if let Err(e) = std::fs::write(cfg.output_dir.join("report_context.txt"), context) {
        error!(error = %e, "write failed");
    }
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"entries\": {}, \"avg_oss\": {}, \"no_document\": {}}}\n",
        util::format_int(summary.total_entries),
        util::format_number(summary.avg_oss, 2),
        util::format_int(summary.entries_without_document)
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = match cli.settings() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let filter = cli.filter();

    if cli.batch {
        handle_load(&cfg);
        handle_generate_reports(&cfg, &filter, cli.sort);
        return ExitCode::SUCCESS;
    }

    loop {
        println!("Select Option:");
        println!("[1] Load the workbooks");
        println!("[2] Generate Reports\n");
        let Some(choice) = read_choice() else {
            return ExitCode::SUCCESS;
        };
        match choice.as_str() {
            "1" => handle_load(&cfg),
            "2" => {
                println!();
                handle_generate_reports(&cfg, &filter, cli.sort);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    return ExitCode::SUCCESS;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}
