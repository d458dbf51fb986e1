use std::path::Path;

use anyhow::{Context, Result};
use scprep::assign::{assign_all, assign_unique, AssignPolicy, AssignmentTable};
use scprep::cli::{parse_args, setup_logging, Cli};
use scprep::data::genes::GeneSymbolClient;
use scprep::data::store::{open_expression_table, write_dataset, OutputDataset};
use scprep::data::{accession_of, ExpressionTable, LoadConfig};
use scprep::ontology::filter::{filter_terms, FilterConfig};
use scprep::ontology::matrix::{term_distances, MappingMatrix};
use scprep::ontology::{load_mapping, load_mapping_file, CellTermMap};
use scprep::split::{split, SplitPlan};
use scprep::utils::format_number;
use tracing::{error, info};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", scprep::info());

    if let Err(e) = run(cli) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    scprep::utils::ensure_dir(&cli.out_dir)?;

    let load_config = LoadConfig::default();
    let table = open_expression_table(&cli.input, &load_config)
        .with_context(|| format!("Failed to load expression table from {:?}", cli.input))?;

    if cli.unlabeled {
        return run_unlabeled(&table, &cli.out_dir);
    }

    let mapping_path = cli.mapping.context("--mapping is required")?;
    let raw = load_mapping_file(&mapping_path)
        .with_context(|| format!("Failed to load ontology mapping from {mapping_path:?}"))?;
    let (mut mapping, _report) = load_mapping(&raw, &table);

    if cli.filter {
        info!("Filtering ontology terms...");
        let (filtered, _report) = filter_terms(&mapping, &FilterConfig::default());
        mapping = filtered;
    }

    if cli.term_distances {
        info!("Computing term distances...");
        let matrix = MappingMatrix::build(&mapping);
        term_distances(&matrix).log();
    }

    if let Some(policy) = cli.assign {
        run_assign(policy, &mapping, &table, &cli.out_dir)?;
    }

    info!("Done");
    Ok(())
}

fn run_unlabeled(table: &ExpressionTable, out_dir: &Path) -> Result<()> {
    info!("Writing unlabeled passthrough...");

    let symbols = resolve_symbols(table)?;
    let dataset = OutputDataset {
        cell_ids: &table.cell_ids,
        gene_ids: &table.gene_ids,
        values: table.values.view(),
        accessions: table
            .cell_ids
            .iter()
            .map(|id| accession_of(id).to_string())
            .collect(),
        gene_symbols: &symbols,
        labels: None,
        true_ids: None,
    };
    write_dataset(out_dir.join("all_data.h5"), "rpkm", &dataset)?;

    info!("Wrote {} cells to all_data.h5", format_number(table.n_cells()));
    Ok(())
}

fn run_assign(
    policy: AssignPolicy,
    mapping: &CellTermMap,
    table: &ExpressionTable,
    out_dir: &Path,
) -> Result<()> {
    info!("Assigning labels ({:?} policy)...", policy);

    let (assigned, _report) = match policy {
        AssignPolicy::All => {
            let matrix = MappingMatrix::build(mapping);
            assign_all(&matrix, table).context("Label assignment failed")?
        }
        AssignPolicy::Unique => assign_unique(mapping, table).context("Label assignment failed")?,
    };

    info!("Building split plan...");
    let plan = SplitPlan::build(&assigned);
    plan.log_summary();
    info!("DE-eligible labels: {:?}", plan.de_eligible_labels());

    let datasets = split(&assigned, &plan);

    let symbols = resolve_symbols(table)?;
    write_assigned(out_dir.join("selected_data.h5"), &assigned, &symbols)?;
    write_assigned(out_dir.join("train_data.h5"), &datasets.train, &symbols)?;
    write_assigned(out_dir.join("valid_data.h5"), &datasets.valid, &symbols)?;
    write_assigned(out_dir.join("test_data.h5"), &datasets.test, &symbols)?;

    info!(
        "Wrote {} assigned rows (train={}, valid={}, test={})",
        format_number(assigned.n_rows()),
        format_number(datasets.train.n_rows()),
        format_number(datasets.valid.n_rows()),
        format_number(datasets.test.n_rows())
    );
    Ok(())
}

fn resolve_symbols(table: &ExpressionTable) -> Result<Vec<String>> {
    let client = GeneSymbolClient::new()?;
    client
        .resolve(&table.gene_ids)
        .context("Gene symbol resolution failed")
}

fn write_assigned(
    path: impl AsRef<Path>,
    assigned: &AssignmentTable,
    symbols: &[String],
) -> Result<()> {
    let dataset = OutputDataset {
        cell_ids: &assigned.display_ids,
        gene_ids: &assigned.gene_ids,
        values: assigned.expressions.view(),
        accessions: assigned
            .true_ids
            .iter()
            .map(|id| accession_of(id).to_string())
            .collect(),
        gene_symbols: symbols,
        labels: Some(&assigned.labels),
        true_ids: Some(&assigned.true_ids),
    };
    write_dataset(path, "rpkm", &dataset)?;
    Ok(())
}
