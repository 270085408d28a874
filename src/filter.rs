// Row selection over the company-year table.
//
// An empty constraint list means "no constraint" for that dimension.
use crate::severity::Severity;
use crate::types::{CompanyType, CompanyYearRow};
use crate::util::cmp_f64;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowFilter {
    pub years: Vec<i32>,
    pub types: Vec<CompanyType>,
    pub sectors: Vec<String>,
    pub companies: Vec<String>,
    pub severities: Vec<Severity>,
}

fn allows<T: PartialEq>(allowed: &[T], value: &T) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

impl RowFilter {
    pub fn matches(&self, row: &CompanyYearRow) -> bool {
        self.matches_except_company(row) && allows(&self.companies, &row.company)
    }

    fn matches_except_company(&self, row: &CompanyYearRow) -> bool {
        let year_ok = self.years.is_empty() || row.year.is_some_and(|y| self.years.contains(&y));
        year_ok
            && allows(&self.types, &row.company_type)
            && allows(&self.sectors, &row.sector)
            && allows(&self.severities, &row.severity)
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
            && self.types.is_empty()
            && self.sectors.is_empty()
            && self.companies.is_empty()
            && self.severities.is_empty()
    }

    /// Active filter labels keyed by dimension, for report context.
    pub fn labels(&self) -> Vec<(&'static str, Vec<String>)> {
        let mut out = Vec::new();
        if !self.years.is_empty() {
            out.push(("years", self.years.iter().map(|y| y.to_string()).collect()));
        }
        if !self.types.is_empty() {
            out.push(("types", self.types.iter().map(|t| t.to_string()).collect()));
        }
        if !self.sectors.is_empty() {
            out.push(("sectors", self.sectors.clone()));
        }
        if !self.companies.is_empty() {
            out.push(("companies", self.companies.clone()));
        }
        if !self.severities.is_empty() {
            out.push(("severities", self.severities.iter().map(|s| s.to_string()).collect()));
        }
        out
    }
}

/// Sorted unique company names passing every constraint but the company one.
pub fn company_options(rows: &[CompanyYearRow], filter: &RowFilter) -> Vec<String> {
    rows.iter()
        .filter(|r| filter.matches_except_company(r))
        .map(|r| r.company.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    #[default]
    SeverityAsc,
    SeverityDesc,
    CompanyAz,
    CompanyZa,
}

impl SortOrder {
    pub fn compare(self, a: &CompanyYearRow, b: &CompanyYearRow) -> Ordering {
        match self {
            SortOrder::SeverityAsc => cmp_f64(&a.total_oss_score, &b.total_oss_score)
                .then_with(|| a.company.cmp(&b.company)),
            SortOrder::SeverityDesc => cmp_f64(&b.total_oss_score, &a.total_oss_score)
                .then_with(|| a.company.cmp(&b.company)),
            SortOrder::CompanyAz => a.company.cmp(&b.company),
            SortOrder::CompanyZa => b.company.cmp(&a.company),
        }
    }
}
