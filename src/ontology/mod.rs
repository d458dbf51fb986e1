pub mod filter;
pub mod matrix;

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use tracing::info;

use crate::data::ExpressionTable;
use crate::error::{Result, ScprepError};

/// Ordered cell id → ontology terms mapping, restricted to the cells of
/// one expression table and iterated in table order.
pub type CellTermMap = IndexMap<String, Vec<String>>;

/// Leading code token of a term string ("CL:0000084 T cell" → "CL:0000084").
pub fn term_code(term: &str) -> &str {
    term.split_whitespace().next().unwrap_or(term)
}

/// Diagnostics from loading the ontology mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingReport {
    /// Cells absent from the raw mapping or mapped to an empty list
    pub empty_mappings: usize,
    /// Cells carrying at least one term
    pub mapped_cells: usize,
}

/// Read the raw ontology mapping file (JSON object, cell id → term list).
pub fn load_mapping_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Vec<String>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ScprepError::io(path, e))?;
    let raw = serde_json::from_reader(BufReader::new(file))?;
    Ok(raw)
}

/// Restrict the raw mapping to cells present in the expression table.
///
/// Every table cell gets an entry, in table order; cells absent from the
/// raw source or mapped to an empty list keep an empty term list and count
/// toward the reported `empty_mappings`. Absent keys are valid input, not
/// failures.
pub fn load_mapping(
    raw: &HashMap<String, Vec<String>>,
    table: &ExpressionTable,
) -> (CellTermMap, MappingReport) {
    let mut mapping = CellTermMap::with_capacity(table.n_cells());
    let mut empty_mappings = 0;

    for cell_id in &table.cell_ids {
        let terms = raw.get(cell_id).cloned().unwrap_or_default();
        if terms.is_empty() {
            empty_mappings += 1;
        }
        mapping.insert(cell_id.clone(), terms);
    }

    let report = MappingReport {
        empty_mappings,
        mapped_cells: mapping.len() - empty_mappings,
    };
    info!(
        "Ontology mapping loaded: {} cells mapped, {} empty mappings",
        report.mapped_cells, report.empty_mappings
    );
    (mapping, report)
}
