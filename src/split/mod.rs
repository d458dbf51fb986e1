//! Accession-stratified train/validation/test splitting.
//!
//! Held-out subsets must come from entire studies (accessions) absent
//! from training, per label. The split is deterministic: per label,
//! accessions are bucketed by ascending cell count with fixed cutoffs,
//! no randomness involved.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::info;

use crate::assign::AssignmentTable;
use crate::data::accession_of;

/// A label is differential-expression-eligible when at least one of its
/// accessions contributes this many cells (diagnostic only).
pub const MIN_DE_CELLS: usize = 75;

/// Fraction of a label's accessions (by ascending cell count) eligible
/// for holdout; the rest stay in train.
const TRAIN_CUTOFF_FRACTION: f64 = 0.9;

/// Fraction of the holdout-eligible accessions sent to test; the rest go
/// to validation.
const TEST_CUTOFF_FRACTION: f64 = 0.5;

/// Which partition a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    Train,
    Valid,
    Test,
}

/// Split decision for one label
#[derive(Debug, Clone)]
pub struct LabelSplit {
    /// Accessions with cell counts, in the sorted order used for the
    /// cutoffs (ascending count, ties lexicographic)
    pub accession_counts: Vec<(String, usize)>,
    /// Sorted positions below this go to holdout; `None` when the label
    /// has fewer than 3 accessions and nothing is held out
    pub train_cutoff: Option<usize>,
    /// Of the holdout, positions below this go to test; `None` together
    /// with `train_cutoff`
    pub valid_test_cutoff: Option<usize>,
    /// Accessions assigned to validation
    pub valid_accessions: HashSet<String>,
    /// Accessions assigned to test
    pub test_accessions: HashSet<String>,
    /// Whether any accession has >= [`MIN_DE_CELLS`] cells
    pub de_eligible: bool,
}

impl LabelSplit {
    fn build(counts: HashMap<String, usize>) -> Self {
        let mut accession_counts: Vec<(String, usize)> = counts.into_iter().collect();
        // lexicographic pre-order plus a stable sort by count makes
        // equal-count accessions land deterministically
        accession_counts.sort_by(|a, b| a.0.cmp(&b.0));
        accession_counts.sort_by_key(|(_, count)| *count);

        let n = accession_counts.len();
        let de_eligible = accession_counts
            .iter()
            .any(|(_, count)| *count >= MIN_DE_CELLS);

        if n < 3 {
            return Self {
                accession_counts,
                train_cutoff: None,
                valid_test_cutoff: None,
                valid_accessions: HashSet::new(),
                test_accessions: HashSet::new(),
                de_eligible,
            };
        }

        let train_cutoff = (TRAIN_CUTOFF_FRACTION * n as f64).floor() as usize;
        let valid_test_cutoff = (TEST_CUTOFF_FRACTION * train_cutoff as f64).floor() as usize;

        let test_accessions = accession_counts[..valid_test_cutoff]
            .iter()
            .map(|(acc, _)| acc.clone())
            .collect();
        let valid_accessions = accession_counts[valid_test_cutoff..train_cutoff]
            .iter()
            .map(|(acc, _)| acc.clone())
            .collect();

        Self {
            accession_counts,
            train_cutoff: Some(train_cutoff),
            valid_test_cutoff: Some(valid_test_cutoff),
            valid_accessions,
            test_accessions,
            de_eligible,
        }
    }
}

/// Per-label split decisions, derived once from an assigned table
#[derive(Debug, Clone)]
pub struct SplitPlan {
    /// Labels in first-appearance order
    pub labels: IndexMap<String, LabelSplit>,
}

impl SplitPlan {
    /// Derive the plan from the label/accession distribution of an
    /// assigned table. Each label is decided independently.
    pub fn build(assigned: &AssignmentTable) -> Self {
        let mut per_label: IndexMap<String, HashMap<String, usize>> = IndexMap::new();
        for (label, true_id) in assigned.labels.iter().zip(&assigned.true_ids) {
            *per_label
                .entry(label.clone())
                .or_default()
                .entry(accession_of(true_id).to_string())
                .or_insert(0) += 1;
        }

        let labels = per_label
            .into_iter()
            .map(|(label, counts)| (label, LabelSplit::build(counts)))
            .collect();
        Self { labels }
    }

    /// Classify one row by its label and accession.
    pub fn classify(&self, label: &str, accession: &str) -> Subset {
        match self.labels.get(label) {
            Some(split) if split.test_accessions.contains(accession) => Subset::Test,
            Some(split) if split.valid_accessions.contains(accession) => Subset::Valid,
            _ => Subset::Train,
        }
    }

    /// Labels eligible for differential-expression analysis.
    pub fn de_eligible_labels(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, split)| split.de_eligible)
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// Log the per-label accession table.
    pub fn log_summary(&self) {
        info!("Split plan for {} labels:", self.labels.len());
        for (label, split) in &self.labels {
            let n = split.accession_counts.len();
            info!(
                "  {}: {} accessions, {} test, {} valid, {} train{}",
                label,
                n,
                split.test_accessions.len(),
                split.valid_accessions.len(),
                n - split.test_accessions.len() - split.valid_accessions.len(),
                if split.de_eligible { ", DE-eligible" } else { "" }
            );
        }
    }
}

/// The three disjoint partitions of one assigned table
#[derive(Debug, Clone)]
pub struct SplitDatasets {
    pub train: AssignmentTable,
    pub valid: AssignmentTable,
    pub test: AssignmentTable,
}

/// Partition an assigned table according to a split plan.
///
/// Every row lands in exactly one of train/valid/test; the union of the
/// three equals the input exactly.
pub fn split(assigned: &AssignmentTable, plan: &SplitPlan) -> SplitDatasets {
    let mut train_rows = Vec::new();
    let mut valid_rows = Vec::new();
    let mut test_rows = Vec::new();

    for i in 0..assigned.n_rows() {
        let accession = accession_of(&assigned.true_ids[i]);
        match plan.classify(&assigned.labels[i], accession) {
            Subset::Train => train_rows.push(i),
            Subset::Valid => valid_rows.push(i),
            Subset::Test => test_rows.push(i),
        }
    }

    info!(
        "Split {} rows: train={}, valid={}, test={}",
        assigned.n_rows(),
        train_rows.len(),
        valid_rows.len(),
        test_rows.len()
    );

    SplitDatasets {
        train: assigned.subset(&train_rows),
        valid: assigned.subset(&valid_rows),
        test: assigned.subset(&test_rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Assigned table with one row per (accession, cell index) pair for
    /// each (label, accession, n_cells) entry.
    fn assigned_of(entries: &[(&str, &str, usize)]) -> AssignmentTable {
        let mut true_ids = Vec::new();
        let mut labels = Vec::new();
        for (label, accession, n_cells) in entries {
            for c in 0..*n_cells {
                true_ids.push(format!("{accession}_{label}C{c}"));
                labels.push(label.to_string());
            }
        }
        let n = true_ids.len();
        AssignmentTable {
            display_ids: true_ids.clone(),
            true_ids,
            labels,
            gene_ids: vec!["100".to_string()],
            expressions: Array2::from_shape_fn((n, 1), |(i, _)| i as f64),
        }
    }

    #[test]
    fn test_fewer_than_three_accessions_all_train() {
        let assigned = assigned_of(&[("L", "GSE1", 10), ("L", "GSE2", 20)]);
        let plan = SplitPlan::build(&assigned);

        let split_l = &plan.labels["L"];
        assert_eq!(split_l.train_cutoff, None);
        assert_eq!(split_l.valid_test_cutoff, None);
        assert!(split_l.valid_accessions.is_empty());
        assert!(split_l.test_accessions.is_empty());

        let datasets = split(&assigned, &plan);
        assert_eq!(datasets.train.n_rows(), 30);
        assert_eq!(datasets.valid.n_rows(), 0);
        assert_eq!(datasets.test.n_rows(), 0);
    }

    #[test]
    fn test_cutoffs_for_ten_accessions() {
        // n = 10: train_cutoff = 9, valid_test_cutoff = 4
        let entries: Vec<(String, usize)> = (0..10).map(|i| (format!("GSE{i}"), i + 1)).collect();
        let borrowed: Vec<(&str, &str, usize)> = entries
            .iter()
            .map(|(acc, count)| ("L", acc.as_str(), *count))
            .collect();
        let assigned = assigned_of(&borrowed);
        let plan = SplitPlan::build(&assigned);

        let split_l = &plan.labels["L"];
        assert_eq!(split_l.train_cutoff, Some(9));
        assert_eq!(split_l.valid_test_cutoff, Some(4));
        assert_eq!(split_l.test_accessions.len(), 4);
        assert_eq!(split_l.valid_accessions.len(), 5);
        // the 4 smallest accessions (counts 1..=4) go to test
        for i in 0..4 {
            assert!(split_l.test_accessions.contains(&format!("GSE{i}")));
        }
        // the largest accession (count 10) stays in train
        assert!(!split_l.valid_accessions.contains("GSE9"));
        assert!(!split_l.test_accessions.contains("GSE9"));
    }

    #[test]
    fn test_three_accessions_minimal_holdout() {
        // n = 3: train_cutoff = 2, valid_test_cutoff = 1
        let assigned = assigned_of(&[("L", "GSE1", 5), ("L", "GSE2", 10), ("L", "GSE3", 20)]);
        let plan = SplitPlan::build(&assigned);

        let split_l = &plan.labels["L"];
        assert_eq!(split_l.test_accessions, HashSet::from(["GSE1".to_string()]));
        assert_eq!(split_l.valid_accessions, HashSet::from(["GSE2".to_string()]));

        let datasets = split(&assigned, &plan);
        assert_eq!(datasets.test.n_rows(), 5);
        assert_eq!(datasets.valid.n_rows(), 10);
        assert_eq!(datasets.train.n_rows(), 20);
    }

    #[test]
    fn test_partition_exactness() {
        let assigned = assigned_of(&[
            ("L1", "GSE1", 5),
            ("L1", "GSE2", 10),
            ("L1", "GSE3", 20),
            ("L1", "GSE4", 40),
            ("L2", "GSE1", 3),
            ("L2", "GSE5", 8),
            ("L3", "GSE6", 80),
        ]);
        let plan = SplitPlan::build(&assigned);
        let datasets = split(&assigned, &plan);

        let total = datasets.train.n_rows() + datasets.valid.n_rows() + datasets.test.n_rows();
        assert_eq!(total, assigned.n_rows());

        let all: HashSet<&String> = assigned.display_ids.iter().collect();
        let train: HashSet<&String> = datasets.train.display_ids.iter().collect();
        let valid: HashSet<&String> = datasets.valid.display_ids.iter().collect();
        let test: HashSet<&String> = datasets.test.display_ids.iter().collect();

        assert!(train.is_disjoint(&valid));
        assert!(train.is_disjoint(&test));
        assert!(valid.is_disjoint(&test));
        let union: HashSet<&String> = train.union(&valid).cloned().collect();
        let union: HashSet<&String> = union.union(&test).cloned().collect();
        assert_eq!(union, all);
    }

    #[test]
    fn test_accession_exclusive_per_label() {
        let assigned = assigned_of(&[
            ("L", "GSE1", 5),
            ("L", "GSE2", 10),
            ("L", "GSE3", 20),
            ("L", "GSE4", 40),
        ]);
        let plan = SplitPlan::build(&assigned);
        let datasets = split(&assigned, &plan);

        let accs = |table: &AssignmentTable| -> HashSet<String> {
            table
                .true_ids
                .iter()
                .map(|id| accession_of(id).to_string())
                .collect()
        };
        let train = accs(&datasets.train);
        let valid = accs(&datasets.valid);
        let test = accs(&datasets.test);
        assert!(train.is_disjoint(&valid));
        assert!(train.is_disjoint(&test));
        assert!(valid.is_disjoint(&test));
    }

    #[test]
    fn test_holdout_size_bound_and_monotonicity() {
        for n in 3..20usize {
            let entries: Vec<(String, usize)> =
                (0..n).map(|i| (format!("GSE{i:02}"), (i + 1) * 2)).collect();
            let borrowed: Vec<(&str, &str, usize)> = entries
                .iter()
                .map(|(acc, count)| ("L", acc.as_str(), *count))
                .collect();
            let plan = SplitPlan::build(&assigned_of(&borrowed));
            let split_l = &plan.labels["L"];

            let holdout = split_l.test_accessions.len() + split_l.valid_accessions.len();
            assert!(holdout <= (0.9 * n as f64).floor() as usize);

            // every test accession count <= every valid/train count
            let max_test = split_l
                .accession_counts
                .iter()
                .filter(|(acc, _)| split_l.test_accessions.contains(acc))
                .map(|(_, c)| *c)
                .max()
                .unwrap_or(0);
            let min_rest = split_l
                .accession_counts
                .iter()
                .filter(|(acc, _)| !split_l.test_accessions.contains(acc))
                .map(|(_, c)| *c)
                .min()
                .unwrap_or(usize::MAX);
            assert!(max_test <= min_rest);
        }
    }

    #[test]
    fn test_tie_break_deterministic() {
        // equal counts everywhere: lexicographically smaller accessions
        // land earlier, so the test bucket is reproducible
        let assigned = assigned_of(&[
            ("L", "GSEB", 5),
            ("L", "GSEA", 5),
            ("L", "GSED", 5),
            ("L", "GSEC", 5),
        ]);
        let plan_a = SplitPlan::build(&assigned);
        let plan_b = SplitPlan::build(&assigned);

        let split_a = &plan_a.labels["L"];
        assert_eq!(split_a.test_accessions, HashSet::from(["GSEA".to_string()]));
        assert_eq!(
            split_a.valid_accessions,
            HashSet::from(["GSEB".to_string(), "GSEC".to_string()])
        );
        assert_eq!(split_a.test_accessions, plan_b.labels["L"].test_accessions);
    }

    #[test]
    fn test_labels_split_independently() {
        // GSE1 is smallest for L1 (held out) but L2 has too few
        // accessions to hold anything out
        let assigned = assigned_of(&[
            ("L1", "GSE1", 2),
            ("L1", "GSE2", 10),
            ("L1", "GSE3", 20),
            ("L2", "GSE1", 50),
            ("L2", "GSE2", 60),
        ]);
        let plan = SplitPlan::build(&assigned);

        assert!(plan.labels["L1"].test_accessions.contains("GSE1"));
        assert_eq!(plan.classify("L1", "GSE1"), Subset::Test);
        assert_eq!(plan.classify("L2", "GSE1"), Subset::Train);
    }

    #[test]
    fn test_de_eligibility() {
        let assigned = assigned_of(&[
            ("L1", "GSE1", 75),
            ("L1", "GSE2", 1),
            ("L2", "GSE3", 74),
        ]);
        let plan = SplitPlan::build(&assigned);

        assert!(plan.labels["L1"].de_eligible);
        assert!(!plan.labels["L2"].de_eligible);
        assert_eq!(plan.de_eligible_labels(), vec!["L1"]);
    }

    #[test]
    fn test_unknown_label_defaults_to_train() {
        let assigned = assigned_of(&[("L", "GSE1", 1), ("L", "GSE2", 2), ("L", "GSE3", 3)]);
        let plan = SplitPlan::build(&assigned);
        assert_eq!(plan.classify("UNSEEN", "GSE1"), Subset::Train);
    }
}
