// Plain-text dataset context for the narrative report generator.
//
// The generator only ever sees this text and the active filter labels; it
// does no scoring of its own.
use crate::filter::RowFilter;
use crate::reports::{generate_summary, sector_summary, severity_distribution, type_summary};
use crate::severity::Severity;
use crate::types::CompanyYearRow;
use crate::util::cmp_f64;
use std::collections::BTreeMap;
use std::fmt::Write;

const PERFORMERS: usize = 3;

fn year_suffix(row: &CompanyYearRow) -> String {
    row.year.map(|y| format!(" ({})", y)).unwrap_or_default()
}

pub fn build_context(rows: &[CompanyYearRow], filter: &RowFilter) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_context(&mut out, rows, filter);
    out
}

fn write_context(out: &mut String, rows: &[CompanyYearRow], filter: &RowFilter) -> std::fmt::Result {
    let summary = generate_summary(rows);
    let scored = rows.len() - summary.entries_without_document;

    writeln!(out, "=== ACTIVE FILTERS ===")?;
    let labels = filter.labels();
    if filter.is_empty() {
        writeln!(out, "None (full dataset)")?;
    }
    for (dimension, values) in labels {
        writeln!(out, "{}: {}", dimension, values.join(", "))?;
    }

    writeln!(out, "\n=== DATASET SUMMARY ===")?;
    writeln!(out, "Unique companies: {}", summary.unique_companies)?;
    writeln!(out, "Total company-year entries analyzed: {}", summary.total_entries)?;
    if summary.entries_without_document > 0 {
        writeln!(
            out,
            "Entries with no disclosure document (OSS=0): {}",
            summary.entries_without_document
        )?;
        writeln!(out, "Entries with disclosure data: {}", scored)?;
    }

    let mut years: BTreeMap<i32, usize> = BTreeMap::new();
    for y in rows.iter().filter_map(|r| r.year) {
        *years.entry(y).or_default() += 1;
    }
    if !years.is_empty() {
        let listed: Vec<String> = years.keys().map(|y| y.to_string()).collect();
        writeln!(out, "Years covered: {}", listed.join(", "))?;
        for (year, count) in &years {
            writeln!(out, "  - Year {}: {} entries", year, count)?;
        }
    }

    if scored > 0 {
        writeln!(out, "\nAverage OSS Score (excluding N/A): {:.2}", summary.avg_oss)?;
        writeln!(out, "Median OSS Score (excluding N/A): {:.2}", summary.median_oss)?;
        writeln!(out, "Min OSS Score: {:.2}", summary.min_oss)?;
        writeln!(out, "Max OSS Score: {:.2}", summary.max_oss)?;
    }

    writeln!(out, "\n=== SEVERITY DISTRIBUTION ===")?;
    for d in severity_distribution(rows) {
        if d.severity == Severity::NotAvailable {
            writeln!(out, "{} (No disclosure document): {} entries ({:.1}%)", d.severity, d.count, d.pct)?;
        } else {
            writeln!(out, "{}: {} entries ({:.1}%)", d.severity, d.count, d.pct)?;
        }
    }

    let sectors = sector_summary(rows);
    if !sectors.is_empty() {
        writeln!(out, "\n=== SECTOR DISTRIBUTION ===")?;
        for s in sectors {
            writeln!(out, "{}: {} entries, avg OSS: {:.2}", s.group, s.entries, s.avg_oss)?;
        }
    }

    let types = type_summary(rows);
    if !types.is_empty() {
        writeln!(out, "\n=== COMPANY TYPE DISTRIBUTION ===")?;
        for t in types {
            writeln!(out, "{}: {} entries, avg OSS: {:.2}", t.group, t.entries, t.avg_oss)?;
        }
    }

    if scored > 0 {
        let mut ranked: Vec<&CompanyYearRow> = rows.iter().filter(|r| r.has_document()).collect();
        ranked.sort_by(|a, b| cmp_f64(&a.total_oss_score, &b.total_oss_score));
        writeln!(out, "\n=== TOP AND BOTTOM PERFORMERS ===")?;
        writeln!(out, "Most Transparent (Lowest OSS, excluding entries with no document):")?;
        for r in ranked.iter().take(PERFORMERS) {
            writeln!(out, "  - {}{}: {:.2} ({})", r.company, year_suffix(r), r.total_oss_score, r.severity)?;
        }
        writeln!(out, "\nLeast Transparent (Highest OSS):")?;
        for r in ranked.iter().rev().take(PERFORMERS) {
            writeln!(out, "  - {}{}: {:.2} ({})", r.company, year_suffix(r), r.total_oss_score, r.severity)?;
        }
    }
    Ok(())
}
