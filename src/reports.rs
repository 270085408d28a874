use crate::assemble::FactTables;
use crate::severity::Severity;
use crate::stats::bootstrap_diff;
use crate::types::{
    CategoryImpact, CategoryImpactRow, CategoryMissingRate, CompanyType, CompanyYearRow, GapAnalysis,
    GroupSummaryRow, IntervalSnapshot, KpiBreakdown, KpiMissingRow, SeverityCountRow, SnapshotEntry,
    SummaryStats, TrendDirection, TrendOverview, TrendRow,
};
use crate::util::{average, cmp_f64, median, min_max, pct};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Year pairs compared by the interval snapshots unless configured otherwise.
pub const DEFAULT_INTERVAL_PAIRS: [(i32, i32); 3] = [(2021, 2022), (2022, 2023), (2021, 2023)];

/// Rows backed by a disclosure document (score != 0).
fn scored(rows: &[CompanyYearRow]) -> impl Iterator<Item = &CompanyYearRow> {
    rows.iter().filter(|r| r.has_document())
}

pub fn generate_summary(rows: &[CompanyYearRow]) -> SummaryStats {
    let companies: HashSet<&str> = rows.iter().map(|r| r.company.as_str()).collect();
    let scores: Vec<f64> = scored(rows).map(|r| r.total_oss_score).collect();
    let (min_oss, max_oss) = min_max(&scores);
    SummaryStats {
        unique_companies: companies.len(),
        total_entries: rows.len(),
        entries_without_document: rows.len() - scores.len(),
        avg_oss: average(&scores),
        median_oss: median(scores.clone()),
        min_oss,
        max_oss,
    }
}

/// Count and share of every band present, in band order (N/A first).
pub fn severity_distribution(rows: &[CompanyYearRow]) -> Vec<SeverityCountRow> {
    let mut counts: HashMap<Severity, usize> = HashMap::new();
    for r in rows {
        *counts.entry(r.severity).or_default() += 1;
    }
    Severity::ALL
        .into_iter()
        .filter_map(|severity| {
            let count = *counts.get(&severity)?;
            Some(SeverityCountRow {
                severity,
                count,
                pct: pct(count as f64, rows.len() as f64),
            })
        })
        .collect()
}

fn group_summary<'a, K, F>(rows: &'a [CompanyYearRow], key: F) -> Vec<GroupSummaryRow>
where
    K: Ord + ToString,
    F: Fn(&'a CompanyYearRow) -> K,
{
    #[derive(Default)]
    struct Acc {
        scores: Vec<f64>,
        present: Vec<f64>,
    }
    let mut map: BTreeMap<K, Acc> = BTreeMap::new();
    for r in scored(rows) {
        let e = map.entry(key(r)).or_default();
        e.scores.push(r.total_oss_score);
        e.present.push(r.present_percentage);
    }
    map.into_iter()
        .map(|(k, acc)| {
            let (min_oss, max_oss) = min_max(&acc.scores);
            GroupSummaryRow {
                group: k.to_string(),
                entries: acc.scores.len(),
                avg_oss: average(&acc.scores),
                median_oss: median(acc.scores.clone()),
                min_oss,
                max_oss,
                avg_present_pct: average(&acc.present),
            }
        })
        .collect()
}

/// Per-sector statistics over scored rows, ordered by median score.
pub fn sector_summary(rows: &[CompanyYearRow]) -> Vec<GroupSummaryRow> {
    let mut out = group_summary(rows, |r| r.sector.as_str());
    out.sort_by(|a, b| cmp_f64(&a.median_oss, &b.median_oss));
    out
}

pub fn type_summary(rows: &[CompanyYearRow]) -> Vec<GroupSummaryRow> {
    group_summary(rows, |r| r.company_type)
}

/// Companies in order of first appearance, each with its rows.
fn by_company(rows: &[CompanyYearRow]) -> Vec<(&str, Vec<&CompanyYearRow>)> {
    let mut order: Vec<(&str, Vec<&CompanyYearRow>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for r in rows {
        let i = *index.entry(r.company.as_str()).or_insert_with(|| {
            order.push((r.company.as_str(), Vec::new()));
            order.len() - 1
        });
        order[i].1.push(r);
    }
    order
}

/// First-to-last-year change per company, sorted by change (most improved first).
///
/// Only years with a document count; a company needs at least two of them.
pub fn generate_trends(rows: &[CompanyYearRow]) -> Vec<TrendRow> {
    let mut out: Vec<TrendRow> = by_company(rows)
        .into_iter()
        .filter_map(|(company, company_rows)| {
            let mut dated: Vec<(i32, &CompanyYearRow)> = company_rows
                .into_iter()
                .filter(|r| r.has_document())
                .filter_map(|r| r.year.map(|y| (y, r)))
                .collect();
            dated.sort_by_key(|(y, _)| *y);
            let years: HashSet<i32> = dated.iter().map(|(y, _)| *y).collect();
            if years.len() < 2 {
                return None;
            }
            let (start_year, first) = *dated.first()?;
            let (end_year, last) = *dated.last()?;
            let change = last.total_oss_score - first.total_oss_score;
            let span = end_year - start_year;
            let avg_annual_change = if span > 0 { change / span as f64 } else { 0.0 };
            Some(TrendRow {
                company: company.to_string(),
                start_year,
                end_year,
                start_oss: first.total_oss_score,
                end_oss: last.total_oss_score,
                change,
                avg_annual_change,
                direction: TrendDirection::from_delta(change),
                start_severity: first.severity,
                end_severity: last.severity,
            })
        })
        .collect();
    out.sort_by(|a, b| cmp_f64(&a.change, &b.change));
    out
}

pub fn trend_overview(trends: &[TrendRow]) -> Option<TrendOverview> {
    if trends.is_empty() {
        return None;
    }
    let count = |d: TrendDirection| trends.iter().filter(|t| t.direction == d).count();
    let changes: Vec<f64> = trends.iter().map(|t| t.change).collect();
    let most_improved = trends.iter().min_by(|a, b| cmp_f64(&a.change, &b.change)).cloned();
    let most_declined = trends.iter().max_by(|a, b| cmp_f64(&a.change, &b.change)).cloned();
    Some(TrendOverview {
        improving: count(TrendDirection::Improving),
        worsening: count(TrendDirection::Worsening),
        stable: count(TrendDirection::Stable),
        mean_change: average(&changes),
        most_improved,
        most_declined,
    })
}

/// Most improved and most worsened company between each pair of years.
///
/// A company counts when it has a scored row at both endpoints; with several
/// rows in one year the last one is used. Companies are visited by name, so
/// ties do not depend on the row order.
pub fn interval_snapshots(rows: &[CompanyYearRow], pairs: &[(i32, i32)]) -> Vec<IntervalSnapshot> {
    let mut companies = by_company(rows);
    companies.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .iter()
        .map(|&(start_year, end_year)| {
            let mut most_improved: Option<SnapshotEntry> = None;
            let mut most_worsened: Option<SnapshotEntry> = None;
            for (company, company_rows) in &companies {
                let at = |year: i32| company_rows.iter().rev().find(|r| r.year == Some(year));
                let (Some(start), Some(end)) = (at(start_year), at(end_year)) else {
                    continue;
                };
                if !start.has_document() || !end.has_document() {
                    continue;
                }
                let entry = SnapshotEntry {
                    company: company.to_string(),
                    change: end.total_oss_score - start.total_oss_score,
                    start_severity: start.severity,
                    end_severity: end.severity,
                };
                if entry.change < 0.0 && most_improved.as_ref().map_or(true, |b| entry.change < b.change) {
                    most_improved = Some(entry.clone());
                }
                if entry.change > 0.0 && most_worsened.as_ref().map_or(true, |w| entry.change >= w.change) {
                    most_worsened = Some(entry);
                }
            }
            IntervalSnapshot { start_year, end_year, most_improved, most_worsened }
        })
        .collect()
}

/// Quotate vs Non-Quotate comparison over scored rows.
///
/// `None` unless both groups have at least one row.
pub fn gap_analysis(rows: &[CompanyYearRow], iterations: usize, seed: Option<u64>) -> Option<GapAnalysis> {
    let group = |ty: CompanyType| -> (Vec<f64>, Vec<f64>) {
        scored(rows)
            .filter(|r| r.company_type == ty)
            .map(|r| (r.total_oss_score, r.present_percentage))
            .unzip()
    };
    let (oss_q, present_q) = group(CompanyType::Quotate);
    let (oss_n, present_n) = group(CompanyType::NonQuotate);
    if oss_q.is_empty() || oss_n.is_empty() {
        return None;
    }
    Some(GapAnalysis {
        mean_oss_quotate: average(&oss_q),
        mean_oss_non_quotate: average(&oss_n),
        mean_present_quotate: average(&present_q),
        mean_present_non_quotate: average(&present_n),
        oss_gap: bootstrap_diff(&oss_q, &oss_n, iterations, seed),
        present_gap: bootstrap_diff(&present_q, &present_n, iterations, seed.map(|s| s.wrapping_add(1))),
    })
}

/// Unweighted missing rates per KPI and per category over the table's rows.
pub fn kpi_breakdown(tables: &FactTables) -> KpiBreakdown {
    let n_rows = tables.companies.len();
    let mut kpis = Vec::new();
    let mut categories: Vec<CategoryMissingRate> = Vec::new();
    let (mut all_missing, mut all_possible) = (0usize, 0usize);
    for k in &tables.kpis {
        let missing: Vec<_> = k.cells.iter().filter(|c| c.missing == 1).collect();
        let missing_count = missing.len();
        if missing_count > 0 {
            kpis.push(KpiMissingRow {
                kpi: k.kpi.name.clone(),
                category: k.kpi.category.clone(),
                weight: k.kpi.weight,
                missing_count,
                missing_pct: pct(missing_count as f64, n_rows as f64),
                oss_points: missing.iter().map(|c| c.severity_points).sum(),
            });
        }
        let idx = match categories.iter().position(|c| c.category == k.kpi.category) {
            Some(i) => i,
            None => {
                categories.push(CategoryMissingRate {
                    category: k.kpi.category.clone(),
                    missing: 0,
                    possible: 0,
                    rate_pct: 0.0,
                });
                categories.len() - 1
            }
        };
        let cat = &mut categories[idx];
        cat.missing += missing_count;
        cat.possible += n_rows;
        all_missing += missing_count;
        all_possible += n_rows;
    }
    for c in &mut categories {
        c.rate_pct = pct(c.missing as f64, c.possible as f64);
    }
    kpis.sort_by(|a, b| b.missing_count.cmp(&a.missing_count));
    KpiBreakdown {
        kpis,
        categories,
        overall_rate_pct: pct(all_missing as f64, all_possible as f64),
    }
}

/// Weighted omission rate per category over the table's rows.
///
/// Categories whose possible weight is 0 are left out.
pub fn category_impact(tables: &FactTables) -> CategoryImpact {
    let n_rows = tables.companies.len() as f64;
    let mut sums: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for k in &tables.kpis {
        let missing_count = k.cells.iter().filter(|c| c.missing == 1).count() as f64;
        let e = sums.entry(k.kpi.category.as_str()).or_default();
        e.0 += k.kpi.weight * missing_count;
        e.1 += k.kpi.weight * n_rows;
    }
    let mut categories: Vec<CategoryImpactRow> = sums
        .into_iter()
        .filter(|(_, (_, possible))| *possible > 0.0)
        .map(|(category, (missing_weight, possible_weight))| CategoryImpactRow {
            category: category.to_string(),
            missing_weight,
            possible_weight,
            rate_pct: missing_weight / possible_weight * 100.0,
            share_of_missing: 0.0,
        })
        .collect();
    let total_missing_weight: f64 = categories.iter().map(|c| c.missing_weight).sum();
    let total_possible_weight: f64 = categories.iter().map(|c| c.possible_weight).sum();
    for c in &mut categories {
        c.share_of_missing = pct(c.missing_weight, total_missing_weight);
    }
    CategoryImpact {
        categories,
        total_missing_weight,
        total_possible_weight,
        overall_rate_pct: pct(total_missing_weight, total_possible_weight),
    }
}
