use crate::filter::{RowFilter, SortOrder};
use crate::severity::Severity;
use crate::types::{CompanyType, CompanyYearRecord, CompanyYearRow, KpiDefinition, KpiFactRow};
use crate::util::round2;
use std::collections::{HashMap, HashSet};

/// The two normalized tables plus the catalog they were built against.
///
/// `kpis[i].cells[j]` is the value of KPI `i` for company-year row `companies[j]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactTables {
    pub catalog: Vec<KpiDefinition>,
    pub companies: Vec<CompanyYearRow>,
    pub kpis: Vec<KpiFactRow>,
}

type RowKey = (String, String, CompanyType, Option<i32>);

fn row_key(r: &CompanyYearRecord) -> RowKey {
    (r.company.clone(), r.sector.clone(), r.company_type, r.year)
}

/// Fold parsed company records into the fact tables.
///
/// Rows are de-duplicated on (company, sector, type, year) keeping the first,
/// then ordered by ascending score (stable). Returns the tables and the number
/// of dropped duplicates. No catalog or no records yields empty tables.
pub fn assemble(catalog: Vec<KpiDefinition>, records: Vec<CompanyYearRecord>) -> (FactTables, usize) {
    if catalog.is_empty() || records.is_empty() {
        return (FactTables::default(), 0);
    }
    let total = records.len();
    let mut seen: HashSet<RowKey> = HashSet::new();
    let mut survivors: Vec<CompanyYearRecord> = records
        .into_iter()
        .filter(|r| seen.insert(row_key(r)))
        .collect();
    let dropped = total - survivors.len();
    survivors.sort_by(|a, b| crate::util::cmp_f64(&a.total_oss, &b.total_oss));

    let catalog_size = catalog.len();
    let companies = survivors.iter().map(|r| finalize(r, catalog_size)).collect();
    let kpis = catalog
        .iter()
        .map(|kpi| KpiFactRow {
            kpi: kpi.clone(),
            cells: survivors
                .iter()
                .map(|r| r.kpi_values.get(&kpi.id).copied().unwrap_or_default())
                .collect(),
        })
        .collect();
    (FactTables { catalog, companies, kpis }, dropped)
}

fn finalize(r: &CompanyYearRecord, catalog_size: usize) -> CompanyYearRow {
    let transparency = round2(r.total_missing as f64 / catalog_size as f64 * 100.0);
    CompanyYearRow {
        company: r.company.clone(),
        sector: r.sector.clone(),
        company_type: r.company_type,
        year: r.year,
        total_missing_kpis: r.total_missing,
        total_oss_score: r.total_oss,
        severity: Severity::from_score(r.total_oss),
        transparency_percentage: transparency,
        present_percentage: round2(100.0 - transparency),
    }
}

impl FactTables {
    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// A fresh copy restricted to the rows passing `filter`, in `order`.
    /// Pivot cells follow their rows.
    pub fn filtered(&self, filter: &RowFilter, order: Option<SortOrder>) -> FactTables {
        let mut idx: Vec<usize> = (0..self.companies.len())
            .filter(|&i| filter.matches(&self.companies[i]))
            .collect();
        if let Some(order) = order {
            idx.sort_by(|&a, &b| order.compare(&self.companies[a], &self.companies[b]));
        }
        FactTables {
            catalog: self.catalog.clone(),
            companies: idx.iter().map(|&i| self.companies[i].clone()).collect(),
            kpis: self
                .kpis
                .iter()
                .map(|k| KpiFactRow {
                    kpi: k.kpi.clone(),
                    cells: idx.iter().map(|&i| k.cells[i]).collect(),
                })
                .collect(),
        }
    }

    /// Pivot column labels, one (`_value`, `_oss`) pair per company-year row.
    ///
    /// A company appearing in several rows gets its year in the label.
    pub fn pivot_labels(&self) -> Vec<(String, String)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for r in &self.companies {
            *counts.entry(r.company.as_str()).or_default() += 1;
        }
        let mut used: HashSet<String> = HashSet::new();
        self.companies
            .iter()
            .map(|r| {
                let mut base = if counts[r.company.as_str()] > 1 {
                    match r.year {
                        Some(y) => format!("{} {}", r.company, y),
                        None => r.company.clone(),
                    }
                } else {
                    r.company.clone()
                };
                // same company and year under a different sector or type
                if !used.insert(base.clone()) {
                    let mut n = 2;
                    while !used.insert(format!("{} #{}", base, n)) {
                        n += 1;
                    }
                    base = format!("{} #{}", base, n);
                }
                (format!("{}_value", base), format!("{}_oss", base))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::fixtures::checklist;
    use crate::loader::DatasetBuilder;
    use crate::types::KpiValue;

    fn build(sheets: &[(CompanyType, crate::grid::SheetGrid)]) -> FactTables {
        let mut builder = DatasetBuilder::default();
        for (ty, grid) in sheets {
            builder.ingest_sheet(grid, *ty);
        }
        builder.finish().0
    }

    #[test]
    fn duplicate_company_years_keep_first() {
        let q = CompanyType::Quotate;
        let tables = build(&[
            (q, checklist(2022, &[("Acme", "Energy", [true, false, false])])),
            (q, checklist(2022, &[("Acme", "Energy", [false, true, true])])),
        ]);
        assert_eq!(tables.companies.len(), 1);
        assert_eq!(tables.companies[0].total_oss_score, 12.0);
        assert_eq!(tables.companies[0].total_missing_kpis, 1);
    }

    #[test]
    fn same_company_different_type_is_not_a_duplicate() {
        let tables = build(&[
            (CompanyType::Quotate, checklist(2022, &[("Acme", "Energy", [true, false, false])])),
            (CompanyType::NonQuotate, checklist(2022, &[("Acme", "Energy", [true, false, false])])),
        ]);
        assert_eq!(tables.companies.len(), 2);
        let labels = tables.pivot_labels();
        assert_eq!(labels[0].0, "Acme 2022_value");
        assert_eq!(labels[1].0, "Acme 2022 #2_value");
    }

    #[test]
    fn percentages_are_complementary() {
        let tables = build(&[(
            CompanyType::Quotate,
            checklist(
                2021,
                &[
                    ("Acme", "Energy", [true, false, false]),
                    ("Beta", "Banks", [true, true, true]),
                    ("Gamma", "Banks", [false, false, false]),
                ],
            ),
        )]);
        for row in &tables.companies {
            assert_eq!(row.transparency_percentage + row.present_percentage, 100.0);
            assert!(row.total_missing_kpis <= tables.catalog.len());
        }
        let acme = tables.companies.iter().find(|r| r.company == "Acme").unwrap();
        assert_eq!(acme.transparency_percentage, 33.33);
        assert_eq!(acme.present_percentage, 66.67);
    }

    #[test]
    fn percentages_sum_to_100_on_a_32_kpi_catalog() {
        let catalog: Vec<KpiDefinition> = (0..32)
            .map(|i| KpiDefinition::new("Governance", &format!("kpi {}", i), 1.0))
            .collect();
        let mut kpi_values = HashMap::new();
        kpi_values.insert(catalog[0].id.clone(), KpiValue { missing: 1, severity_points: 1.0 });
        let record = CompanyYearRecord {
            company: "Acme".into(),
            sector: "Energy".into(),
            company_type: CompanyType::Quotate,
            year: Some(2022),
            kpi_values,
            total_missing: 1,
            total_oss: 1.0,
        };
        let (tables, _) = assemble(catalog, vec![record]);
        let row = &tables.companies[0];
        assert_eq!(row.transparency_percentage, 3.13);
        assert_eq!(row.present_percentage, 96.87);
        assert_eq!(row.transparency_percentage + row.present_percentage, 100.0);
    }

    #[test]
    fn weighted_flags_reproduce_scores() {
        let tables = build(&[(
            CompanyType::Quotate,
            checklist(
                2021,
                &[
                    ("Acme", "Energy", [true, false, true]),
                    ("Beta", "Banks", [false, true, false]),
                ],
            ),
        )]);
        for (j, row) in tables.companies.iter().enumerate() {
            let weighted: f64 = tables
                .kpis
                .iter()
                .map(|k| k.kpi.weight * k.cells[j].missing as f64)
                .sum();
            assert!((weighted - row.total_oss_score).abs() < 1e-9);
        }
    }

    #[test]
    fn rows_are_ordered_by_score_with_zero_sentinel_band() {
        let tables = build(&[(
            CompanyType::Quotate,
            checklist(
                2021,
                &[
                    ("Heavy", "Energy", [true, true, true]),
                    ("Clean", "Energy", [false, false, false]),
                    ("Light", "Energy", [false, true, false]),
                ],
            ),
        )]);
        let names: Vec<&str> = tables.companies.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(names, vec!["Clean", "Light", "Heavy"]);
        assert_eq!(tables.companies[0].severity, Severity::NotAvailable);
        assert_eq!(tables.companies[1].severity, Severity::Trasparente);
    }

    #[test]
    fn unknown_kpi_ids_default_to_zero() {
        let catalog = vec![KpiDefinition::new("X", "never reported", 5.0)];
        let record = CompanyYearRecord {
            company: "Acme".into(),
            sector: "Energy".into(),
            company_type: CompanyType::Quotate,
            year: Some(2022),
            kpi_values: HashMap::new(),
            total_missing: 0,
            total_oss: 0.0,
        };
        let (tables, dropped) = assemble(catalog, vec![record]);
        assert_eq!(dropped, 0);
        assert_eq!(tables.kpis[0].cells, vec![KpiValue::default()]);
    }

    #[test]
    fn empty_inputs_yield_empty_tables() {
        let (tables, _) = assemble(Vec::new(), Vec::new());
        assert!(tables.is_empty());
        assert!(tables.kpis.is_empty());
    }

    #[test]
    fn reassembly_is_deterministic() {
        let sheets = [(
            CompanyType::Quotate,
            checklist(2023, &[("Acme", "Energy", [true, false, true]), ("Beta", "Banks", [true, false, true])]),
        )];
        assert_eq!(build(&sheets), build(&sheets));
    }

    #[test]
    fn filtered_copy_keeps_pivot_aligned() {
        let tables = build(&[(
            CompanyType::Quotate,
            checklist(
                2021,
                &[
                    ("Acme", "Energy", [true, false, false]),
                    ("Beta", "Banks", [false, false, true]),
                ],
            ),
        )]);
        let filter = RowFilter { sectors: vec!["Banks".into()], ..Default::default() };
        let view = tables.filtered(&filter, None);
        assert_eq!(view.companies.len(), 1);
        assert_eq!(view.companies[0].company, "Beta");
        assert_eq!(view.kpis[2].cells, vec![KpiValue { missing: 1, severity_points: 10.0 }]);
        assert_eq!(tables.companies.len(), 2);
    }
}
