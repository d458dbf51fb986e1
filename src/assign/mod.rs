//! Label assignment: turn the cell → terms mapping into a flat table of
//! (cell, label) rows with duplicated expression vectors.

use std::collections::BTreeMap;

use clap::ValueEnum;
use ndarray::Array2;
use tracing::info;

use crate::data::ExpressionTable;
use crate::error::{Result, ScprepError};
use crate::ontology::matrix::MappingMatrix;
use crate::ontology::{term_code, CellTermMap};

/// The ontology root term, too generic to ever be a valid label.
/// Skipped by replicate-per-term assignment.
pub const ROOT_TERM_CODE: &str = "CL:0000000";

/// Label assignment policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssignPolicy {
    /// Replicate each cell across all of its terms
    All,
    /// Keep only cells with exactly one term
    Unique,
}

/// Flat table of assignment rows.
///
/// The four sequences are parallel: row i of `expressions` belongs to
/// `true_ids[i]` / `display_ids[i]` / `labels[i]`.
#[derive(Debug, Clone)]
pub struct AssignmentTable {
    /// Originating cell id per row
    pub true_ids: Vec<String>,
    /// Unique display id per row (synthesized under replicate-per-term)
    pub display_ids: Vec<String>,
    /// Label per row (full term string, verbatim)
    pub labels: Vec<String>,
    /// Gene ids, one per expression column
    pub gene_ids: Vec<String>,
    /// Expression values, shape (rows, genes)
    pub expressions: Array2<f64>,
}

impl AssignmentTable {
    /// Number of assignment rows.
    pub fn n_rows(&self) -> usize {
        self.true_ids.len()
    }

    /// New table holding only the given rows, in the given order.
    pub fn subset(&self, rows: &[usize]) -> Self {
        Self {
            true_ids: rows.iter().map(|&i| self.true_ids[i].clone()).collect(),
            display_ids: rows.iter().map(|&i| self.display_ids[i].clone()).collect(),
            labels: rows.iter().map(|&i| self.labels[i].clone()).collect(),
            gene_ids: self.gene_ids.clone(),
            expressions: self.expressions.select(ndarray::Axis(0), rows),
        }
    }
}

/// Rows-per-label diagnostic from an assignment pass
#[derive(Debug, Clone)]
pub struct AssignReport {
    pub label_counts: BTreeMap<String, usize>,
}

impl AssignReport {
    fn from_labels(labels: &[String]) -> Self {
        let mut label_counts = BTreeMap::new();
        for label in labels {
            *label_counts.entry(label.clone()).or_insert(0usize) += 1;
        }
        Self { label_counts }
    }

    /// Log the per-label row counts.
    pub fn log(&self) {
        info!("Assigned rows per label ({} labels):", self.label_counts.len());
        for (label, count) in &self.label_counts {
            info!("  {:6}  {}", count, label);
        }
    }
}

struct RowBuilder {
    true_ids: Vec<String>,
    display_ids: Vec<String>,
    labels: Vec<String>,
    flat: Vec<f64>,
    n_genes: usize,
}

impl RowBuilder {
    fn new(n_genes: usize) -> Self {
        Self {
            true_ids: Vec::new(),
            display_ids: Vec::new(),
            labels: Vec::new(),
            flat: Vec::new(),
            n_genes,
        }
    }

    fn push(
        &mut self,
        table: &ExpressionTable,
        true_id: &str,
        display_id: String,
        label: String,
    ) -> Result<()> {
        let expression = table.expression_of(true_id)?;
        self.flat.extend(expression.iter());
        self.true_ids.push(true_id.to_string());
        self.display_ids.push(display_id);
        self.labels.push(label);
        Ok(())
    }

    fn finish(self, table: &ExpressionTable) -> Result<AssignmentTable> {
        let n_rows = self.true_ids.len();
        let expressions = Array2::from_shape_vec((n_rows, self.n_genes), self.flat)
            .map_err(|e| ScprepError::MalformedInput(format!("assignment rows misaligned: {e}")))?;
        Ok(AssignmentTable {
            true_ids: self.true_ids,
            display_ids: self.display_ids,
            labels: self.labels,
            gene_ids: table.gene_ids.clone(),
            expressions,
        })
    }
}

/// Replicate-per-term assignment.
///
/// For every matrix column except the root term, emit one row per member
/// cell: display id `<cell_id>_<term_code>`, label the full term string,
/// expression vector duplicated from the cell's row.
pub fn assign_all(
    matrix: &MappingMatrix,
    table: &ExpressionTable,
) -> Result<(AssignmentTable, AssignReport)> {
    let mut builder = RowBuilder::new(table.n_genes());

    for (j, term) in matrix.terms.iter().enumerate() {
        let code = term_code(term);
        if code == ROOT_TERM_CODE {
            continue;
        }
        for (i, &member) in matrix.matrix.column(j).iter().enumerate() {
            if !member {
                continue;
            }
            let cell_id = &matrix.cell_ids[i];
            builder.push(table, cell_id, format!("{cell_id}_{code}"), term.clone())?;
        }
    }

    let assigned = builder.finish(table)?;
    let report = AssignReport::from_labels(&assigned.labels);
    info!(
        "Replicate-per-term assignment produced {} rows from {} cells",
        assigned.n_rows(),
        table.n_cells()
    );
    Ok((assigned, report))
}

/// Unique-only assignment.
///
/// Cells with exactly one term get one row, using their own id as both
/// display and true id. Cells with zero or two-plus terms are silently
/// excluded.
pub fn assign_unique(
    mapping: &CellTermMap,
    table: &ExpressionTable,
) -> Result<(AssignmentTable, AssignReport)> {
    let mut builder = RowBuilder::new(table.n_genes());

    for (cell_id, terms) in mapping {
        if terms.len() != 1 {
            continue;
        }
        builder.push(table, cell_id, cell_id.clone(), terms[0].clone())?;
    }

    let assigned = builder.finish(table)?;
    let report = AssignReport::from_labels(&assigned.labels);
    info!(
        "Unique-only assignment produced {} rows from {} cells",
        assigned.n_rows(),
        table.n_cells()
    );
    report.log();
    Ok((assigned, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LoadConfig;

    fn table_of(cells: &[&str]) -> ExpressionTable {
        let values = Array2::from_shape_fn((cells.len(), 2), |(i, j)| (i * 2 + j) as f64);
        ExpressionTable::new(
            cells.iter().map(|s| s.to_string()).collect(),
            vec!["100".to_string(), "200".to_string()],
            values,
            &LoadConfig {
                drop_cells: vec![],
                ..LoadConfig::default()
            },
        )
        .unwrap()
    }

    fn mapping_of(entries: &[(&str, &[&str])]) -> CellTermMap {
        entries
            .iter()
            .map(|(cell, terms)| {
                (
                    cell.to_string(),
                    terms.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_assign_all_replicates_per_term() {
        let table = table_of(&["A_1", "B_1"]);
        let mapping = mapping_of(&[
            ("A_1", &["CL:01 x", "CL:02 y"]),
            ("B_1", &["CL:01 x"]),
        ]);
        let matrix = MappingMatrix::build(&mapping);

        let (assigned, report) = assign_all(&matrix, &table).unwrap();

        // A_1 has 2 surviving terms -> 2 rows; B_1 has 1 -> 1 row
        assert_eq!(assigned.n_rows(), 3);
        assert_eq!(
            assigned.display_ids,
            vec!["A_1_CL:01", "B_1_CL:01", "A_1_CL:02"]
        );
        assert_eq!(assigned.true_ids, vec!["A_1", "B_1", "A_1"]);
        // both of A_1's rows carry an identical expression vector
        assert_eq!(assigned.expressions.row(0), assigned.expressions.row(2));
        assert_eq!(report.label_counts["CL:01 x"], 2);
        assert_eq!(report.label_counts["CL:02 y"], 1);
    }

    #[test]
    fn test_assign_all_skips_root_term() {
        let table = table_of(&["A_1"]);
        let mapping = mapping_of(&[("A_1", &["CL:0000000 cell"])]);
        let matrix = MappingMatrix::build(&mapping);

        let (assigned, _) = assign_all(&matrix, &table).unwrap();
        // a cell mapped only to the root term produces 0 rows
        assert_eq!(assigned.n_rows(), 0);
        assert_eq!(assigned.expressions.ncols(), 2);
    }

    #[test]
    fn test_assign_unique_keeps_single_term_cells_only() {
        // the worked example: A_1 and C_2 have one term, B_1 has two
        let table = table_of(&["A_1", "B_1", "C_2"]);
        let mapping = mapping_of(&[
            ("A_1", &["CL:01 x"]),
            ("B_1", &["CL:01 x", "CL:02 y"]),
            ("C_2", &["CL:02 y"]),
        ]);

        let (assigned, report) = assign_unique(&mapping, &table).unwrap();

        assert_eq!(assigned.n_rows(), 2);
        assert_eq!(assigned.display_ids, vec!["A_1", "C_2"]);
        assert_eq!(assigned.true_ids, assigned.display_ids);
        assert_eq!(assigned.labels, vec!["CL:01 x", "CL:02 y"]);
        assert_eq!(report.label_counts.len(), 2);
    }

    #[test]
    fn test_assign_unique_excludes_zero_term_cells() {
        let table = table_of(&["A_1", "B_1"]);
        let mapping = mapping_of(&[("A_1", &[]), ("B_1", &["CL:01 x"])]);

        let (assigned, _) = assign_unique(&mapping, &table).unwrap();
        assert_eq!(assigned.display_ids, vec!["B_1"]);
        assert_eq!(assigned.expressions.row(0), table.values.row(1));
    }

    #[test]
    fn test_assign_missing_cell_is_fatal() {
        let table = table_of(&["A_1"]);
        let mapping = mapping_of(&[("GHOST_1", &["CL:01 x"])]);

        let err = assign_unique(&mapping, &table).unwrap_err();
        assert!(matches!(err, ScprepError::MissingKey { .. }));
    }

    #[test]
    fn test_subset_preserves_alignment() {
        let table = table_of(&["A_1", "B_1", "C_2"]);
        let mapping = mapping_of(&[
            ("A_1", &["CL:01 x"]),
            ("B_1", &["CL:01 x"]),
            ("C_2", &["CL:02 y"]),
        ]);
        let (assigned, _) = assign_unique(&mapping, &table).unwrap();

        let sub = assigned.subset(&[2, 0]);
        assert_eq!(sub.display_ids, vec!["C_2", "A_1"]);
        assert_eq!(sub.labels, vec!["CL:02 y", "CL:01 x"]);
        assert_eq!(sub.expressions.row(0), assigned.expressions.row(2));
        assert_eq!(sub.expressions.row(1), assigned.expressions.row(0));
    }
}
