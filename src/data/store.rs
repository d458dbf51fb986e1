//! HDF5 input/output stores.
//!
//! The input store holds one named table (default `rpkm`) laid out as a
//! group with `cells` and `genes` string datasets plus a dense 2-d
//! `values` dataset. Output stores use the same layout and add root-level
//! per-row/per-column series (`accessions`, `gene_symbols`, and for
//! labeled datasets `labels` and `true_ids`). Every store is opened,
//! written and closed as one scoped unit.

use std::path::Path;
use std::str::FromStr;

use hdf5::types::VarLenUnicode;
use ndarray::{Array1, Array2, ArrayView2};
use tracing::{debug, info};

use crate::data::{ExpressionTable, LoadConfig};
use crate::error::{Result, ScprepError};

fn varlen(s: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(s)
        .map_err(|e| ScprepError::MalformedInput(format!("string not storable in HDF5: {e}")))
}

fn varlen_column(values: &[String]) -> Result<Array1<VarLenUnicode>> {
    let column: Result<Vec<VarLenUnicode>> = values.iter().map(|s| varlen(s)).collect();
    Ok(Array1::from(column?))
}

fn read_string_column(group: &hdf5::Group, name: &str) -> Result<Vec<String>> {
    let raw = group.dataset(name)?.read_1d::<VarLenUnicode>()?;
    Ok(raw.iter().map(|s| s.to_string()).collect())
}

/// Read the expression table from an input store.
///
/// NaN values are permitted in the store and zeroed on load; the
/// configured corrupt rows are dropped before anything else sees them.
pub fn open_expression_table<P: AsRef<Path>>(
    path: P,
    config: &LoadConfig,
) -> Result<ExpressionTable> {
    let path = path.as_ref();
    info!("Loading expression table from {:?}", path);

    let file = hdf5::File::open(path)?;
    let group = file.group(&config.table).map_err(|_| ScprepError::MissingKey {
        key: config.table.clone(),
        index: format!("input store {path:?}"),
    })?;

    let cell_ids = read_string_column(&group, "cells")?;
    let gene_ids = read_string_column(&group, "genes")?;
    let values = group.dataset("values")?.read_2d::<f64>()?;
    file.close()?;

    debug!("Read {} cells x {} genes", cell_ids.len(), gene_ids.len());

    let table = ExpressionTable::new(cell_ids, gene_ids, values, config)?;
    info!(
        "Expression table loaded: {} cells, {} genes",
        table.n_cells(),
        table.n_genes()
    );
    Ok(table)
}

/// One output dataset, ready to be persisted.
///
/// `labels` and `true_ids` are present for assigned datasets and absent
/// for the unlabeled passthrough.
#[derive(Debug)]
pub struct OutputDataset<'a> {
    /// Display ids, one per row
    pub cell_ids: &'a [String],
    /// Gene ids, one per column
    pub gene_ids: &'a [String],
    /// Expression values, shape (rows, genes)
    pub values: ArrayView2<'a, f64>,
    /// Accession per row
    pub accessions: Vec<String>,
    /// Lower-cased gene symbol per column
    pub gene_symbols: &'a [String],
    /// Label per row, when the dataset is labeled
    pub labels: Option<&'a [String]>,
    /// Originating cell id per row, when display ids are synthesized
    pub true_ids: Option<&'a [String]>,
}

/// Write one dataset to an output store under the given table name.
pub fn write_dataset<P: AsRef<Path>>(
    path: P,
    table: &str,
    dataset: &OutputDataset<'_>,
) -> Result<()> {
    let path = path.as_ref();
    info!(
        "Writing {} rows x {} genes to {:?}",
        dataset.cell_ids.len(),
        dataset.gene_ids.len(),
        path
    );

    let file = hdf5::File::create(path)?;
    let group = file.create_group(table)?;

    group
        .new_dataset_builder()
        .with_data(&varlen_column(dataset.cell_ids)?)
        .create("cells")?;
    group
        .new_dataset_builder()
        .with_data(&varlen_column(dataset.gene_ids)?)
        .create("genes")?;
    group
        .new_dataset_builder()
        .with_data(dataset.values)
        .create("values")?;

    file.new_dataset_builder()
        .with_data(&varlen_column(&dataset.accessions)?)
        .create("accessions")?;
    file.new_dataset_builder()
        .with_data(&varlen_column(dataset.gene_symbols)?)
        .create("gene_symbols")?;

    if let Some(labels) = dataset.labels {
        file.new_dataset_builder()
            .with_data(&varlen_column(labels)?)
            .create("labels")?;
    }
    if let Some(true_ids) = dataset.true_ids {
        file.new_dataset_builder()
            .with_data(&varlen_column(true_ids)?)
            .create("true_ids")?;
    }

    file.close()?;
    Ok(())
}

/// Write an expression table to a store in the input layout.
///
/// Used to seed stores in tests and to produce fixtures; the result is
/// readable by [`open_expression_table`].
pub fn write_expression_table<P: AsRef<Path>>(
    path: P,
    table: &str,
    cell_ids: &[String],
    gene_ids: &[String],
    values: &Array2<f64>,
) -> Result<()> {
    let file = hdf5::File::create(path.as_ref())?;
    let group = file.create_group(table)?;
    group
        .new_dataset_builder()
        .with_data(&varlen_column(cell_ids)?)
        .create("cells")?;
    group
        .new_dataset_builder()
        .with_data(&varlen_column(gene_ids)?)
        .create("genes")?;
    group
        .new_dataset_builder()
        .with_data(values)
        .create("values")?;
    file.close()?;
    Ok(())
}
