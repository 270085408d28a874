use crate::severity::Severity;
use crate::util::format_number;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tabled::Tabled;

/// Listing status of a company, derived from the workbook file it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CompanyType {
    #[serde(rename = "Quotate")]
    Quotate,
    #[serde(rename = "Non-Quotate")]
    NonQuotate,
}

impl CompanyType {
    pub fn label(self) -> &'static str {
        match self {
            CompanyType::Quotate => "Quotate",
            CompanyType::NonQuotate => "Non-Quotate",
        }
    }

    /// Case-insensitive parse of a type label, as typed on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "quotate" => Some(CompanyType::Quotate),
            "non-quotate" | "non_quotate" | "nonquotate" => Some(CompanyType::NonQuotate),
            _ => None,
        }
    }
}

impl fmt::Display for CompanyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One checklist entry. Identity is `id` (`category|name`).
#[derive(Debug, Clone, PartialEq)]
pub struct KpiDefinition {
    pub category: String,
    pub name: String,
    pub weight: f64,
    pub id: String,
}

impl KpiDefinition {
    pub fn new(category: &str, name: &str, weight: f64) -> Self {
        KpiDefinition {
            category: category.to_string(),
            name: name.to_string(),
            weight,
            id: kpi_id(category, name),
        }
    }
}

pub fn kpi_id(category: &str, name: &str) -> String {
    format!("{}|{}", category, name)
}

/// Recorded state of one KPI for one company-year.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KpiValue {
    pub missing: u8,
    pub severity_points: f64,
}

/// A company column of one sheet, with its per-KPI values and running totals.
#[derive(Debug, Clone)]
pub struct CompanyYearRecord {
    pub company: String,
    pub sector: String,
    pub company_type: CompanyType,
    pub year: Option<i32>,
    pub kpi_values: HashMap<String, KpiValue>,
    pub total_missing: usize,
    pub total_oss: f64,
}

/// Finalized company-year fact row handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CompanyYearRow {
    #[serde(rename = "Company")]
    #[tabled(rename = "Company")]
    pub company: String,
    #[serde(rename = "Sector")]
    #[tabled(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Type")]
    #[tabled(rename = "Type")]
    pub company_type: CompanyType,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year", display_with = "display_year")]
    pub year: Option<i32>,
    #[serde(rename = "Total_Missing_KPIs")]
    #[tabled(rename = "Total_Missing_KPIs")]
    pub total_missing_kpis: usize,
    #[serde(rename = "Total_OSS_Score")]
    #[tabled(rename = "Total_OSS_Score", display_with = "display_f2")]
    pub total_oss_score: f64,
    #[serde(rename = "Severity")]
    #[tabled(rename = "Severity")]
    pub severity: Severity,
    #[serde(rename = "Transparency_Percentage")]
    #[tabled(rename = "Transparency_Percentage", display_with = "display_f2")]
    pub transparency_percentage: f64,
    #[serde(rename = "Present_Percentage")]
    #[tabled(rename = "Present_Percentage", display_with = "display_f2")]
    pub present_percentage: f64,
}

impl CompanyYearRow {
    /// A score of exactly 0 means no disclosure document was available.
    pub fn has_document(&self) -> bool {
        self.total_oss_score != 0.0
    }
}

/// One pivot row: a KPI with one cell per company-year row of the fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiFactRow {
    pub kpi: KpiDefinition,
    pub cells: Vec<KpiValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Improving,
    Worsening,
    Stable,
}

impl TrendDirection {
    pub fn from_delta(delta: f64) -> Self {
        if delta < 0.0 {
            TrendDirection::Improving
        } else if delta > 0.0 {
            TrendDirection::Worsening
        } else {
            TrendDirection::Stable
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendDirection::Improving => "Improving",
            TrendDirection::Worsening => "Worsening",
            TrendDirection::Stable => "Stable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct TrendRow {
    #[serde(rename = "Company")]
    #[tabled(rename = "Company")]
    pub company: String,
    #[serde(rename = "StartYear")]
    #[tabled(rename = "StartYear")]
    pub start_year: i32,
    #[serde(rename = "EndYear")]
    #[tabled(rename = "EndYear")]
    pub end_year: i32,
    #[serde(rename = "StartOSS")]
    #[tabled(rename = "StartOSS", display_with = "display_f2")]
    pub start_oss: f64,
    #[serde(rename = "EndOSS")]
    #[tabled(rename = "EndOSS", display_with = "display_f2")]
    pub end_oss: f64,
    #[serde(rename = "Change")]
    #[tabled(rename = "Change", display_with = "display_f2")]
    pub change: f64,
    #[serde(rename = "AvgAnnualChange")]
    #[tabled(rename = "AvgAnnualChange", display_with = "display_f2")]
    pub avg_annual_change: f64,
    #[serde(rename = "Direction")]
    #[tabled(rename = "Direction")]
    pub direction: TrendDirection,
    #[serde(rename = "StartSeverity")]
    #[tabled(skip)]
    pub start_severity: Severity,
    #[serde(rename = "EndSeverity")]
    #[tabled(skip)]
    pub end_severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendOverview {
    pub improving: usize,
    pub worsening: usize,
    pub stable: usize,
    pub mean_change: f64,
    pub most_improved: Option<TrendRow>,
    pub most_declined: Option<TrendRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub company: String,
    pub change: f64,
    pub start_severity: Severity,
    pub end_severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSnapshot {
    pub start_year: i32,
    pub end_year: i32,
    pub most_improved: Option<SnapshotEntry>,
    pub most_worsened: Option<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct GroupSummaryRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Entries")]
    #[tabled(rename = "Entries")]
    pub entries: usize,
    #[serde(rename = "AvgOSS")]
    #[tabled(rename = "AvgOSS", display_with = "display_f2")]
    pub avg_oss: f64,
    #[serde(rename = "MedianOSS")]
    #[tabled(rename = "MedianOSS", display_with = "display_f2")]
    pub median_oss: f64,
    #[serde(rename = "MinOSS")]
    #[tabled(rename = "MinOSS", display_with = "display_f2")]
    pub min_oss: f64,
    #[serde(rename = "MaxOSS")]
    #[tabled(rename = "MaxOSS", display_with = "display_f2")]
    pub max_oss: f64,
    #[serde(rename = "AvgPresentPct")]
    #[tabled(rename = "AvgPresentPct", display_with = "display_f2")]
    pub avg_present_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct SeverityCountRow {
    #[serde(rename = "Severity")]
    #[tabled(rename = "Severity")]
    pub severity: Severity,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Pct")]
    #[tabled(rename = "Pct", display_with = "display_f2")]
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CategoryImpactRow {
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "MissingWeight")]
    #[tabled(rename = "MissingWeight", display_with = "display_f2")]
    pub missing_weight: f64,
    #[serde(rename = "PossibleWeight")]
    #[tabled(rename = "PossibleWeight", display_with = "display_f2")]
    pub possible_weight: f64,
    #[serde(rename = "RatePct")]
    #[tabled(rename = "RatePct", display_with = "display_f2")]
    pub rate_pct: f64,
    #[serde(rename = "ShareOfMissing")]
    #[tabled(rename = "ShareOfMissing", display_with = "display_f2")]
    pub share_of_missing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryImpact {
    pub categories: Vec<CategoryImpactRow>,
    pub total_missing_weight: f64,
    pub total_possible_weight: f64,
    pub overall_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct KpiMissingRow {
    #[serde(rename = "KPI")]
    #[tabled(rename = "KPI")]
    pub kpi: String,
    #[serde(rename = "Category")]
    #[tabled(rename = "Category")]
    pub category: String,
    #[serde(rename = "Weight")]
    #[tabled(rename = "Weight", display_with = "display_f2")]
    pub weight: f64,
    #[serde(rename = "MissingCount")]
    #[tabled(rename = "MissingCount")]
    pub missing_count: usize,
    #[serde(rename = "MissingPct")]
    #[tabled(rename = "MissingPct", display_with = "display_f2")]
    pub missing_pct: f64,
    #[serde(rename = "OSSPoints")]
    #[tabled(rename = "OSSPoints", display_with = "display_f2")]
    pub oss_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMissingRate {
    pub category: String,
    pub missing: usize,
    pub possible: usize,
    pub rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiBreakdown {
    pub kpis: Vec<KpiMissingRow>,
    pub categories: Vec<CategoryMissingRate>,
    pub overall_rate_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapResult {
    pub diff_mean: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapAnalysis {
    pub mean_oss_quotate: f64,
    pub mean_oss_non_quotate: f64,
    pub mean_present_quotate: f64,
    pub mean_present_non_quotate: f64,
    pub oss_gap: Option<BootstrapResult>,
    pub present_gap: Option<BootstrapResult>,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub unique_companies: usize,
    pub total_entries: usize,
    pub entries_without_document: usize,
    pub avg_oss: f64,
    pub median_oss: f64,
    pub min_oss: f64,
    pub max_oss: f64,
}

fn display_year(year: &Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string())
}

fn display_f2(n: &f64) -> String {
    format_number(*n, 2)
}
