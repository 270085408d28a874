// Checklist sheet parsing and dataset loading.
//
// A checklist sheet is a human-oriented grid:
//
//   row 0: [_, year, _, sector, _, sector, ...]     (sectors sparse, sticky)
//   row 1: [_, _, _, company, OSS, company, OSS ...]
//   row 2+: [category, kpi, weight, flag, points, flag, points ...]
//   ...
//   [Totale, ...]                                    (terminal row)
//
// Parsing runs in two passes: `resolve_layout` turns the header rows into
// typed company columns, then `walk_kpi_rows` resolves the category hierarchy
// once per sheet. Company records are read off the resolved rows.
use crate::assemble::{assemble, FactTables};
use crate::catalog::CatalogBuilder;
use crate::grid::{read_workbook, Cell, SheetGrid};
use crate::scanner::company_type_for;
use crate::types::{kpi_id, CompanyType, CompanyYearRecord, KpiValue};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error, info};

pub const SECTOR_ROW: usize = 0;
pub const COMPANY_ROW: usize = 1;
pub const FIRST_DATA_ROW: usize = 2;
pub const YEAR_COL: usize = 1;
pub const CATEGORY_COL: usize = 0;
pub const KPI_COL: usize = 1;
pub const WEIGHT_COL: usize = 2;
pub const FIRST_COMPANY_COL: usize = 3;

/// Category cell (trimmed, lowercased) that ends the KPI block.
pub const TERMINAL_CATEGORY: &str = "totale";
/// Exact cell text marking a KPI as missing.
pub const MISSING_FLAG: &str = "1";
/// Header of the severity-points column paired with each company.
pub const OSS_HEADER: &str = "OSS";
/// Textual not-a-value header, as produced by spreadsheet exports.
const NAN_HEADER: &str = "nan";
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyColumn {
    pub name: String,
    pub sector: String,
    pub value_col: usize,
    pub oss_col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub year: Option<i32>,
    pub companies: Vec<CompanyColumn>,
}

/// A KPI row with its category already forward-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub row: usize,
    pub category: String,
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub layout: SheetLayout,
    pub kpi_rows: Vec<KpiRow>,
    pub records: Vec<CompanyYearRecord>,
}

/// Whole-number year from the year cell; anything unparsable is `None`.
pub fn parse_year(cell: &Cell) -> Option<i32> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(n.trunc() as i32),
        Cell::Text(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn is_company_header(header: &str) -> bool {
    !header.is_empty()
        && !header.eq_ignore_ascii_case(OSS_HEADER)
        && !header.eq_ignore_ascii_case(NAN_HEADER)
}

/// Pass 1: year and company columns.
///
/// The sector label is sticky across columns. A column whose header is not a
/// company name is treated as the previous company's OSS column and skipped.
pub fn resolve_layout(grid: &SheetGrid) -> SheetLayout {
    let year = parse_year(grid.get(SECTOR_ROW, YEAR_COL));
    let mut companies = Vec::new();
    let mut sector = UNKNOWN_LABEL.to_string();
    let mut col = FIRST_COMPANY_COL;
    while col < grid.width() {
        let sector_cell = grid.get(SECTOR_ROW, col);
        if !sector_cell.is_blank() {
            sector = sector_cell.text();
        }
        let header = grid.get(COMPANY_ROW, col).text();
        if is_company_header(&header) {
            companies.push(CompanyColumn {
                name: header,
                sector: sector.clone(),
                value_col: col,
                oss_col: col + 1,
            });
            col += 2;
        } else {
            col += 1;
        }
    }
    SheetLayout { year, companies }
}

/// Running "last seen category" used to fill merged category cells.
#[derive(Debug)]
pub struct CategoryFill {
    last: String,
}

impl Default for CategoryFill {
    fn default() -> Self {
        CategoryFill { last: UNKNOWN_LABEL.to_string() }
    }
}

impl CategoryFill {
    /// Category for the current row: the cell itself, or the last non-blank one.
    pub fn resolve(&mut self, cell: &Cell) -> String {
        if !cell.is_blank() {
            self.last = cell.text();
        }
        self.last.clone()
    }
}

fn is_terminal(cell: &Cell) -> bool {
    !cell.is_blank() && cell.text().to_lowercase() == TERMINAL_CATEGORY
}

/// Pass 2: KPI rows from `FIRST_DATA_ROW` down to the terminal row (exclusive),
/// or to the end of the sheet if there is none. Rows without a KPI name are
/// skipped and do not update the running category.
pub fn walk_kpi_rows(grid: &SheetGrid) -> Vec<KpiRow> {
    let mut fill = CategoryFill::default();
    let mut rows = Vec::new();
    for r in FIRST_DATA_ROW..grid.height() {
        let category_cell = grid.get(r, CATEGORY_COL);
        if is_terminal(category_cell) {
            break;
        }
        let name_cell = grid.get(r, KPI_COL);
        if name_cell.is_blank() {
            continue;
        }
        rows.push(KpiRow {
            row: r,
            category: fill.resolve(category_cell),
            name: name_cell.text(),
            weight: grid.get(r, WEIGHT_COL).as_f64().unwrap_or(0.0),
        });
    }
    rows
}

pub fn is_missing(cell: &Cell) -> bool {
    cell.text() == MISSING_FLAG
}

/// Read one company column over the resolved KPI rows.
///
/// Severity points are summed for every row regardless of the missing flag.
pub fn read_company(
    grid: &SheetGrid,
    kpi_rows: &[KpiRow],
    column: &CompanyColumn,
    company_type: CompanyType,
    year: Option<i32>,
) -> CompanyYearRecord {
    let mut kpi_values = HashMap::with_capacity(kpi_rows.len());
    let mut total_missing = 0usize;
    let mut total_oss = 0.0;
    for kpi in kpi_rows {
        let missing = is_missing(grid.get(kpi.row, column.value_col));
        let severity_points = grid.get(kpi.row, column.oss_col).as_f64().unwrap_or(0.0);
        total_oss += severity_points;
        if missing {
            total_missing += 1;
        }
        kpi_values.insert(
            kpi_id(&kpi.category, &kpi.name),
            KpiValue { missing: missing as u8, severity_points },
        );
    }
    CompanyYearRecord {
        company: column.name.clone(),
        sector: column.sector.clone(),
        company_type,
        year,
        kpi_values,
        total_missing,
        total_oss,
    }
}

pub fn parse_sheet(grid: &SheetGrid, company_type: CompanyType) -> ParsedSheet {
    let layout = resolve_layout(grid);
    let kpi_rows = walk_kpi_rows(grid);
    let records = layout
        .companies
        .iter()
        .map(|c| read_company(grid, &kpi_rows, c, company_type, layout.year))
        .collect();
    ParsedSheet { layout, kpi_rows, records }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub files_scanned: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub sheets_parsed: usize,
    pub company_records: usize,
    pub duplicates_dropped: usize,
    pub catalog_size: usize,
}

/// Accumulates parsed sheets across workbooks and assembles the fact tables.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    catalog: CatalogBuilder,
    records: Vec<CompanyYearRecord>,
    report: LoadReport,
}

impl DatasetBuilder {
    pub fn ingest_sheet(&mut self, grid: &SheetGrid, company_type: CompanyType) {
        let parsed = parse_sheet(grid, company_type);
        debug!(
            sheet = %grid.name,
            year = ?parsed.layout.year,
            companies = parsed.records.len(),
            kpis = parsed.kpi_rows.len(),
            "parsed sheet"
        );
        self.catalog.offer(&grid.name, &parsed.kpi_rows);
        self.report.sheets_parsed += 1;
        self.report.company_records += parsed.records.len();
        self.records.extend(parsed.records);
    }

    pub fn finish(mut self) -> (FactTables, LoadReport) {
        let catalog = self.catalog.finish();
        self.report.catalog_size = catalog.len();
        let (tables, dropped) = assemble(catalog, self.records);
        self.report.duplicates_dropped = dropped;
        (tables, self.report)
    }
}

/// Load every workbook in order. A file that cannot be read is logged and
/// skipped; the rest still load.
pub fn load_dataset(files: &[PathBuf]) -> (FactTables, LoadReport) {
    let mut builder = DatasetBuilder::default();
    builder.report.files_scanned = files.len();
    for path in files {
        let sheets = match read_workbook(path) {
            Ok(s) => s,
            Err(e) => {
                error!(path = %path.display(), error = %e, "skipping workbook");
                builder.report.files_failed += 1;
                continue;
            }
        };
        let company_type = company_type_for(path);
        for grid in &sheets {
            builder.ingest_sheet(grid, company_type);
        }
        builder.report.files_loaded += 1;
        info!(path = %path.display(), sheets = sheets.len(), %company_type, "loaded workbook");
    }
    builder.finish()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{checklist, n, t};
    use super::*;

    #[test]
    fn single_missing_kpi_scores_its_points() {
        let grid = checklist(2022, &[("Acme", "Energy", [true, false, false])]);
        let parsed = parse_sheet(&grid, CompanyType::Quotate);
        assert_eq!(parsed.records.len(), 1);
        let acme = &parsed.records[0];
        assert_eq!(acme.company, "Acme");
        assert_eq!(acme.year, Some(2022));
        assert_eq!(acme.total_missing, 1);
        assert_eq!(acme.total_oss, 12.0);
        assert_eq!(
            acme.kpi_values["Governance|Board Gender Ratio"],
            KpiValue { missing: 1, severity_points: 12.0 }
        );
    }

    #[test]
    fn category_is_forward_filled() {
        let grid = checklist(2022, &[("Acme", "Energy", [false, true, false])]);
        let rows = walk_kpi_rows(&grid);
        let cats: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(cats, vec!["Governance", "Governance", "Pay"]);
        let parsed = parse_sheet(&grid, CompanyType::Quotate);
        assert_eq!(
            parsed.records[0].kpi_values["Governance|Women in Committees"].missing,
            1
        );
    }

    #[test]
    fn terminal_row_stops_the_walk() {
        let mut rows = vec![
            vec![t(""), n(2021.0)],
            vec![],
            vec![t("A"), t("k1"), n(1.0)],
            vec![t("  TOTALE "), t("sum"), n(1.0)],
            vec![t("B"), t("k2"), n(2.0)],
        ];
        let grid = SheetGrid::new("s", rows.clone());
        let walked = walk_kpi_rows(&grid);
        assert_eq!(walked.len(), 1);
        assert_eq!(walked[0].name, "k1");

        rows.remove(3);
        let grid = SheetGrid::new("s", rows);
        assert_eq!(walk_kpi_rows(&grid).len(), 2);
    }

    #[test]
    fn blank_kpi_rows_are_skipped_without_touching_category() {
        let grid = SheetGrid::new(
            "s",
            vec![
                vec![],
                vec![],
                vec![t("A"), t("k1"), n(1.0)],
                vec![t("B"), t(" "), n(5.0)],
                vec![t(""), t("k2"), t("heavy")],
            ],
        );
        let rows = walk_kpi_rows(&grid);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].category, "A");
        assert_eq!(rows[1].weight, 0.0);
    }

    #[test]
    fn leading_blank_category_defaults_to_unknown() {
        let grid = SheetGrid::new("s", vec![vec![], vec![], vec![t(""), t("k"), n(1.0)]]);
        assert_eq!(walk_kpi_rows(&grid)[0].category, UNKNOWN_LABEL);
    }

    #[test]
    fn oss_and_blank_headers_are_skipped_and_sector_is_sticky() {
        let grid = SheetGrid::new(
            "s",
            vec![
                vec![t(""), t("FY22"), t(""), t("Banks"), t(""), t(""), t(""), t("Energy")],
                vec![t(""), t(""), t(""), t("Alpha"), t("oss"), t(""), t("Beta"), t("Gamma")],
            ],
        );
        let layout = resolve_layout(&grid);
        assert_eq!(layout.year, None);
        let got: Vec<(&str, &str, usize)> = layout
            .companies
            .iter()
            .map(|c| (c.name.as_str(), c.sector.as_str(), c.value_col))
            .collect();
        // Alpha consumes columns 3-4, the blank 5 is skipped, Beta takes 6-7
        // and its OSS column's sector cell is never inspected.
        assert_eq!(got, vec![("Alpha", "Banks", 3), ("Beta", "Banks", 6)]);
    }

    #[test]
    fn nan_header_is_not_a_company() {
        let grid = SheetGrid::new(
            "s",
            vec![vec![], vec![t(""), t(""), t(""), t("NaN"), t("Delta"), t("OSS")]],
        );
        let layout = resolve_layout(&grid);
        assert_eq!(layout.companies.len(), 1);
        assert_eq!(layout.companies[0].name, "Delta");
        assert_eq!(layout.companies[0].sector, UNKNOWN_LABEL);
    }

    #[test]
    fn year_cell_variants() {
        assert_eq!(parse_year(&n(2023.0)), Some(2023));
        assert_eq!(parse_year(&t(" 2021 ")), Some(2021));
        assert_eq!(parse_year(&t("2021.0")), None);
        assert_eq!(parse_year(&Cell::Empty), None);
    }

    // The flag is an exact text match on "1". Numeric 1 displays as "1" and
    // counts; other truthy-looking values are read as present.
    #[test]
    fn missing_flag_is_exact_text_match() {
        assert!(is_missing(&t(" 1 ")));
        assert!(is_missing(&n(1.0)));
        assert!(!is_missing(&t("1.0")));
        assert!(!is_missing(&t("x")));
        assert!(!is_missing(&t("true")));
        assert!(!is_missing(&Cell::Bool(true)));
        assert!(!is_missing(&n(2.0)));
        assert!(!is_missing(&Cell::Empty));
    }

    #[test]
    fn points_are_summed_regardless_of_flag() {
        let grid = SheetGrid::new(
            "s",
            vec![
                vec![],
                vec![t(""), t(""), t(""), t("Acme"), t("OSS")],
                vec![t("A"), t("k1"), n(4.0), t("0"), n(4.0)],
                vec![t(""), t("k2"), n(3.0), t("1"), t("n/a")],
            ],
        );
        let parsed = parse_sheet(&grid, CompanyType::NonQuotate);
        let acme = &parsed.records[0];
        assert_eq!(acme.total_oss, 4.0);
        assert_eq!(acme.total_missing, 1);
        assert_eq!(acme.company_type, CompanyType::NonQuotate);
    }

    #[test]
    fn company_without_data_has_zero_totals() {
        let grid = SheetGrid::new(
            "s",
            vec![
                vec![],
                vec![t(""), t(""), t(""), t("Empty Co")],
                vec![t("A"), t("k1"), n(4.0)],
            ],
        );
        let parsed = parse_sheet(&grid, CompanyType::Quotate);
        assert_eq!(parsed.records[0].total_oss, 0.0);
        assert_eq!(parsed.records[0].total_missing, 0);
        assert_eq!(parsed.records[0].kpi_values.len(), 1);
    }

    #[test]
    fn builder_keeps_first_catalog_and_reports_counts() {
        let mut builder = DatasetBuilder::default();
        builder.ingest_sheet(
            &checklist(2021, &[("Acme", "Energy", [true, true, false])]),
            CompanyType::Quotate,
        );
        builder.ingest_sheet(
            &checklist(2022, &[("Acme", "Energy", [true, false, false])]),
            CompanyType::Quotate,
        );
        let (tables, report) = builder.finish();
        assert_eq!(report.sheets_parsed, 2);
        assert_eq!(report.company_records, 2);
        assert_eq!(report.catalog_size, 3);
        assert_eq!(tables.companies.len(), 2);
    }

    #[test]
    fn loads_a_real_workbook_from_a_non_quotate_path() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("testdata/non_quotate/NON-QUOTATE-KPI-OSS.xlsx");
        let layout = resolve_layout(&read_workbook(&path).unwrap()[0]);
        assert_eq!(layout.year, Some(2022));
        let cols: Vec<(usize, usize)> = layout.companies.iter().map(|c| (c.value_col, c.oss_col)).collect();
        assert_eq!(cols, vec![(3, 4), (5, 6)]);

        let (tables, report) = load_dataset(&[path]);
        assert_eq!(report.files_loaded, 1);
        assert_eq!(report.files_failed, 0);
        assert_eq!(report.sheets_parsed, 1);
        assert_eq!(report.catalog_size, 2);
        assert_eq!(tables.catalog[0].id, "Unknown|Board Gender Ratio");

        let names: Vec<&str> = tables.companies.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Acme"]);
        let acme = &tables.companies[1];
        assert_eq!(acme.sector, "Energy");
        assert_eq!(acme.year, Some(2022));
        assert_eq!(acme.company_type, CompanyType::NonQuotate);
        // text "1" and numeric 1 both flag the KPI
        assert_eq!(acme.total_missing_kpis, 2);
        assert_eq!(acme.total_oss_score, 22.0);
        assert_eq!(tables.companies[0].sector, "Banks");
        assert_eq!(tables.companies[0].total_oss_score, 10.0);
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.xlsx");
        std::fs::write(&bogus, b"not a workbook").unwrap();
        let (tables, report) = load_dataset(&[bogus, dir.path().join("absent.xlsx")]);
        assert!(tables.is_empty());
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_failed, 2);
        assert_eq!(report.files_loaded, 0);
    }
}
