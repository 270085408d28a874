use crate::loader::KpiRow;
use crate::types::KpiDefinition;
use std::collections::HashSet;
use tracing::debug;

/// Builds the KPI catalog once, from the first sheet that has KPI rows.
///
/// Every later sheet is assumed to share the same checklist, so further offers
/// are ignored once the catalog exists.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Option<Vec<KpiDefinition>>,
}

impl CatalogBuilder {
    pub fn is_built(&self) -> bool {
        self.catalog.is_some()
    }

    pub fn offer(&mut self, sheet: &str, rows: &[KpiRow]) {
        if self.is_built() {
            return;
        }
        let catalog = build_catalog(rows);
        if catalog.is_empty() {
            return;
        }
        debug!(sheet, kpis = catalog.len(), "built KPI catalog");
        self.catalog = Some(catalog);
    }

    pub fn finish(self) -> Vec<KpiDefinition> {
        self.catalog.unwrap_or_default()
    }
}

/// Catalog entries in first-encounter order; a repeated id keeps its first row.
pub fn build_catalog(rows: &[KpiRow]) -> Vec<KpiDefinition> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| KpiDefinition::new(&r.category, &r.name, r.weight))
        .filter(|def| seen.insert(def.id.clone()))
        .collect()
}
