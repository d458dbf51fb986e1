pub mod genes;
pub mod store;

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1};

use crate::error::{Result, ScprepError};

/// Cell identifiers with known duplicate/corrupt expression rows.
/// Dropped unconditionally before any other processing.
pub const CORRUPT_CELL_IDS: &[&str] = &["GSE61300_GSM1501785", "GSE61300_GSM1501786"];

/// Expression table load configuration
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Name of the table inside the input store
    pub table: String,
    /// Cell ids to drop unconditionally on load
    pub drop_cells: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            table: "rpkm".to_string(),
            drop_cells: CORRUPT_CELL_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Dense expression matrix keyed by cell and gene identifiers.
///
/// Rows are cells, columns are genes. Values are non-negative expression
/// levels with no missing entries (NaN is zeroed on load).
#[derive(Debug, Clone)]
pub struct ExpressionTable {
    /// Cell identifiers, one per row, unique
    pub cell_ids: Vec<String>,
    /// Gene identifiers, one per column
    pub gene_ids: Vec<String>,
    /// Expression values, shape (cells, genes)
    pub values: Array2<f64>,
    /// Row index by cell id
    index: HashMap<String, usize>,
}

impl ExpressionTable {
    /// Assemble a table from parallel parts, zeroing NaN values and
    /// dropping the configured corrupt rows.
    pub fn new(
        cell_ids: Vec<String>,
        gene_ids: Vec<String>,
        mut values: Array2<f64>,
        config: &LoadConfig,
    ) -> Result<Self> {
        if values.nrows() != cell_ids.len() || values.ncols() != gene_ids.len() {
            return Err(ScprepError::MalformedInput(format!(
                "expression matrix shape ({}, {}) does not match {} cells x {} genes",
                values.nrows(),
                values.ncols(),
                cell_ids.len(),
                gene_ids.len()
            )));
        }

        values.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });

        let keep: Vec<usize> = cell_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !config.drop_cells.iter().any(|d| d == *id))
            .map(|(i, _)| i)
            .collect();

        let (cell_ids, values) = if keep.len() == cell_ids.len() {
            (cell_ids, values)
        } else {
            let kept_ids: Vec<String> = keep.iter().map(|&i| cell_ids[i].clone()).collect();
            let kept = values.select(ndarray::Axis(0), &keep);
            (kept_ids, kept)
        };

        let mut index = HashMap::with_capacity(cell_ids.len());
        for (i, id) in cell_ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(ScprepError::MalformedInput(format!(
                    "duplicate cell id '{id}' in expression table"
                )));
            }
        }

        Ok(Self {
            cell_ids,
            gene_ids,
            values,
            index,
        })
    }

    /// Number of cells (rows)
    pub fn n_cells(&self) -> usize {
        self.cell_ids.len()
    }

    /// Number of genes (columns)
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Row position of a cell id, if present
    pub fn row_of(&self, cell_id: &str) -> Option<usize> {
        self.index.get(cell_id).copied()
    }

    /// Expression vector for a cell id
    pub fn expression_of(&self, cell_id: &str) -> Result<ArrayView1<'_, f64>> {
        let row = self.row_of(cell_id).ok_or_else(|| ScprepError::MissingKey {
            key: cell_id.to_string(),
            index: "expression table".to_string(),
        })?;
        Ok(self.values.row(row))
    }
}

/// Study-of-origin for a cell id: the substring before the first
/// underscore, or the whole id when there is none.
pub fn accession_of(cell_id: &str) -> &str {
    match cell_id.find('_') {
        Some(pos) => &cell_id[..pos],
        None => cell_id,
    }
}
