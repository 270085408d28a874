use crate::assemble::FactTables;
use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// KPI pivot: catalog columns, then a (`_value`, `_oss`) pair per company-year row.
pub fn write_pivot_csv(path: &Path, tables: &FactTables) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let labels = tables.pivot_labels();
    let mut header = vec!["Category".to_string(), "KPI".to_string(), "Weight".to_string(), "ID".to_string()];
    for (value, oss) in &labels {
        header.push(value.clone());
        header.push(oss.clone());
    }
    wtr.write_record(&header)?;
    for k in &tables.kpis {
        let mut record = vec![
            k.kpi.category.clone(),
            k.kpi.name.clone(),
            k.kpi.weight.to_string(),
            k.kpi.id.clone(),
        ];
        for cell in &k.cells {
            record.push(cell.missing.to_string());
            record.push(cell.severity_points.to_string());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::fixtures::checklist;
    use crate::loader::DatasetBuilder;
    use crate::types::CompanyType;

    #[test]
    fn pivot_csv_has_a_column_pair_per_row() {
        let mut builder = DatasetBuilder::default();
        builder.ingest_sheet(
            &checklist(2022, &[("Acme", "Energy", [true, false, false]), ("Beta", "Banks", [false; 3])]),
            CompanyType::Quotate,
        );
        let (tables, _) = builder.finish();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpi_pivot.csv");
        write_pivot_csv(&path, &tables).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec!["Category", "KPI", "Weight", "ID", "Beta_value", "Beta_oss", "Acme_value", "Acme_oss"]
        );
        let first = rdr.records().next().unwrap().unwrap();
        assert_eq!(&first[3], "Governance|Board Gender Ratio");
        assert_eq!(&first[6], "1");
        assert_eq!(&first[7], "12");
    }

    #[test]
    fn company_rows_serialize_with_table_headers() {
        let mut builder = DatasetBuilder::default();
        builder.ingest_sheet(&checklist(2021, &[("Acme", "Energy", [true, false, false])]), CompanyType::NonQuotate);
        let (tables, _) = builder.finish();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.csv");
        write_csv(&path, &tables.companies).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Company,Sector,Type,Year,Total_Missing_KPIs,Total_OSS_Score,Severity,Transparency_Percentage,Present_Percentage"
        );
        assert_eq!(lines.next().unwrap(), "Acme,Energy,Non-Quotate,2021,1,12.0,Trasparente,33.33,66.67");
    }
}
