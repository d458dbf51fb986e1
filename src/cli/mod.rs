use clap::Parser;
use std::path::PathBuf;

use crate::assign::AssignPolicy;

/// scprep: single-cell RNA expression dataset preparation
#[derive(Parser, Debug)]
#[command(name = "scprep")]
#[command(about = "Prepare labeled single-cell RNA expression datasets for ML")]
#[command(version)]
pub struct Cli {
    /// Input HDF5 store holding the expression table
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Ontology mapping file (JSON, cell id -> term list)
    #[arg(short, long, required_unless_present = "unlabeled")]
    pub mapping: Option<PathBuf>,

    /// Output directory for the written stores
    #[arg(short, long, default_value = "./output")]
    pub out_dir: PathBuf,

    /// Write only the unlabeled passthrough (all_data.h5) and exit
    #[arg(long)]
    pub unlabeled: bool,

    /// Clean the mapping with the term filter before any assignment
    #[arg(long)]
    pub filter: bool,

    /// Print the closest term pairs by Jaccard distance
    #[arg(long)]
    pub term_distances: bool,

    /// Label assignment policy; triggers the split-and-write sequence
    #[arg(long, value_enum)]
    pub assign: Option<AssignPolicy>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
