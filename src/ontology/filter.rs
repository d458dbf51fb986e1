//! Term filtering: drop statistically rare or semantically unsuitable
//! ontology terms from every cell's list.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use super::{term_code, CellTermMap};

/// Minimum number of cells a term must cover to survive filtering
pub const MIN_CELLS_PER_TERM: usize = 75;

/// Code prefixes naming ontologies that never yield usable cell labels
pub const DISALLOWED_TERM_PREFIXES: &[&str] = &["NCBITaxon", "PR:", "PATO:", "GO:", "CLO:"];

/// Manually curated overly broad anatomical/cell categories, pre-identified
/// as unhelpful labels
pub const EXCLUDED_TERMS: &[&str] = &[
    "CL:0000003 native cell",
    "CL:0000004 cell by organism",
    "CL:0000012 cell by class",
    "CL:0000144 cell by function",
    "CL:0000255 eukaryotic cell",
    "CL:0000548 animal cell",
    "UBERON:0000061 anatomical structure",
    "UBERON:0000465 material anatomical entity",
    "UBERON:0000468 multicellular organism",
    "UBERON:0001062 anatomical entity",
    "UBERON:0010000 multicellular anatomical structure",
];

/// Term filter configuration
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Terms covering fewer cells than this are dropped
    pub min_cells: usize,
    /// Terms whose code starts with any of these are dropped
    pub disallowed_prefixes: Vec<String>,
    /// Terms exactly matching any of these are dropped
    pub excluded_terms: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_cells: MIN_CELLS_PER_TERM,
            disallowed_prefixes: DISALLOWED_TERM_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_terms: EXCLUDED_TERMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FilterConfig {
    /// Whether a term survives filtering given its cell-count tally.
    pub fn keeps(&self, term: &str, count: usize) -> bool {
        if count < self.min_cells {
            return false;
        }
        let code = term_code(term);
        if self
            .disallowed_prefixes
            .iter()
            .any(|prefix| code.starts_with(prefix.as_str()))
        {
            return false;
        }
        !self.excluded_terms.iter().any(|t| t == term)
    }
}

/// Per-term cell-count tally: each cell's terms counted once per cell.
pub fn term_counts(mapping: &CellTermMap) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for terms in mapping.values() {
        let unique: HashSet<&String> = terms.iter().collect();
        for term in unique {
            *counts.entry(term.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Term-count diagnostics surrounding a filter pass
#[derive(Debug, Clone)]
pub struct FilterReport {
    /// Tally before filtering
    pub before: BTreeMap<String, usize>,
    /// Tally after filtering
    pub after: BTreeMap<String, usize>,
}

impl FilterReport {
    /// Log the term-count changes the filter produced.
    pub fn log(&self) {
        info!(
            "Term filter: {} terms before, {} after",
            self.before.len(),
            self.after.len()
        );
        for (term, count) in &self.before {
            match self.after.get(term) {
                Some(kept) => debug!("  kept    {:6}  {}", kept, term),
                None => debug!("  dropped {:6}  {}", count, term),
            }
        }
    }
}

/// Apply the filter policy to every cell's term list.
///
/// Cells may end up with zero terms; they become ineligible for labeling
/// downstream but stay in the mapping. Applying the filter twice yields
/// the same result as applying it once.
pub fn filter_terms(mapping: &CellTermMap, config: &FilterConfig) -> (CellTermMap, FilterReport) {
    let before = term_counts(mapping);

    let filtered: CellTermMap = mapping
        .iter()
        .map(|(cell, terms)| {
            let kept: Vec<String> = terms
                .iter()
                .filter(|term| config.keeps(term, before.get(*term).copied().unwrap_or(0)))
                .cloned()
                .collect();
            (cell.clone(), kept)
        })
        .collect();

    let report = FilterReport {
        before,
        after: term_counts(&filtered),
    };
    report.log();
    (filtered, report)
}
