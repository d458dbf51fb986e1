//! # scprep: single-cell RNA dataset preparation
//!
//! scprep prepares single-cell RNA expression datasets for downstream
//! machine-learning use: it loads an expression matrix keyed by cell
//! identifiers, attaches ontology-term labels via an external JSON
//! mapping, filters low-quality or overly generic terms, assigns one or
//! more labels per cell, and partitions cells into train/validation/test
//! subsets stratified by study-of-origin (accession) so that held-out
//! subsets come from studies disjoint from training, per label.
//!
//! ## Features
//!
//! - Ontology-term labeling with a curated term filter
//! - Replicate-per-term or unique-only label assignment
//! - Deterministic accession-stratified train/valid/test splitting
//! - HDF5 input and output stores with gene-symbol annotation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use scprep::data::{store, LoadConfig};
//! use scprep::ontology::{self, filter};
//! use scprep::{assign, split};
//!
//! // Load the expression table and the ontology mapping
//! let table = store::open_expression_table("data.h5", &LoadConfig::default()).unwrap();
//! let raw = ontology::load_mapping_file("mapping.json").unwrap();
//! let (mapping, _report) = ontology::load_mapping(&raw, &table);
//!
//! // Filter unsuitable terms
//! let (mapping, _report) = filter::filter_terms(&mapping, &filter::FilterConfig::default());
//!
//! // Assign labels and split by accession
//! let (assigned, _report) = assign::assign_unique(&mapping, &table).unwrap();
//! let plan = split::SplitPlan::build(&assigned);
//! let datasets = split::split(&assigned, &plan);
//! ```

pub mod assign;
pub mod cli;
pub mod data;
pub mod error;
pub mod ontology;
pub mod split;
pub mod utils;

/// Re-export commonly used types
pub use assign::{AssignPolicy, AssignmentTable};
pub use data::{accession_of, ExpressionTable, LoadConfig};
pub use error::{Result, ScprepError};
pub use ontology::CellTermMap;
pub use split::{SplitDatasets, SplitPlan, Subset};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - single-cell RNA dataset preparation",
        NAME, VERSION
    )
}
