//! Boolean cell x term mapping matrix and the term-distance diagnostic.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1};
use tracing::info;

use super::CellTermMap;

/// Number of closest term pairs reported by the distance diagnostic
pub const CLOSEST_PAIRS_REPORTED: usize = 50;

/// Dense boolean membership matrix: rows = cells in expression-table
/// order, columns = terms sorted lexicographically by full term string.
/// Built fresh whenever needed, never persisted.
#[derive(Debug, Clone)]
pub struct MappingMatrix {
    /// Cell ids, one per row
    pub cell_ids: Vec<String>,
    /// Full term strings, one per column, lexicographically sorted
    pub terms: Vec<String>,
    /// Membership: entry (i, j) is true iff cell i maps to term j
    pub matrix: Array2<bool>,
}

impl MappingMatrix {
    /// Build the matrix from a cleaned mapping via a term → column index.
    pub fn build(mapping: &CellTermMap) -> Self {
        // BTreeSet gives unique terms already in lexicographic order
        let terms: Vec<String> = mapping
            .values()
            .flatten()
            .cloned()
            .collect::<std::collections::BTreeSet<String>>()
            .into_iter()
            .collect();

        let column_of: HashMap<&str, usize> = terms
            .iter()
            .enumerate()
            .map(|(j, term)| (term.as_str(), j))
            .collect();

        let cell_ids: Vec<String> = mapping.keys().cloned().collect();
        let mut matrix = Array2::from_elem((cell_ids.len(), terms.len()), false);
        for (i, cell_terms) in mapping.values().enumerate() {
            for term in cell_terms {
                if let Some(&j) = column_of.get(term.as_str()) {
                    matrix[[i, j]] = true;
                }
            }
        }

        Self {
            cell_ids,
            terms,
            matrix,
        }
    }

    /// Membership column for a term, if present.
    pub fn column(&self, term: &str) -> Option<ArrayView1<'_, bool>> {
        self.terms
            .iter()
            .position(|t| t == term)
            .map(|j| self.matrix.column(j))
    }

    /// Number of cells a term maps to, if the term is present.
    pub fn term_cell_count(&self, term: &str) -> Option<usize> {
        self.column(term)
            .map(|col| col.iter().filter(|&&b| b).count())
    }
}

/// Jaccard distance between one unordered pair of terms
#[derive(Debug, Clone, PartialEq)]
pub struct TermDistance {
    pub term_a: String,
    pub term_b: String,
    pub distance: f64,
}

/// All pairwise term distances, ascending
#[derive(Debug, Clone)]
pub struct DistanceReport {
    pub pairs: Vec<TermDistance>,
}

impl DistanceReport {
    /// The `n` closest pairs.
    pub fn closest(&self, n: usize) -> &[TermDistance] {
        &self.pairs[..n.min(self.pairs.len())]
    }

    /// Log the closest pairs.
    pub fn log(&self) {
        info!("{} closest term pairs:", self.closest(CLOSEST_PAIRS_REPORTED).len());
        for pair in self.closest(CLOSEST_PAIRS_REPORTED) {
            info!("  {:.4}  {}  |  {}", pair.distance, pair.term_a, pair.term_b);
        }
    }
}

/// Jaccard distance (1 - |A∩B| / |A∪B|) between every unordered pair of
/// term columns. Pairs whose union is empty are excluded from the report.
/// Sorted ascending by distance, ties broken by term strings.
pub fn term_distances(matrix: &MappingMatrix) -> DistanceReport {
    let n_terms = matrix.terms.len();
    let mut pairs = Vec::with_capacity(n_terms.saturating_sub(1) * n_terms / 2);

    for a in 0..n_terms {
        let col_a = matrix.matrix.column(a);
        for b in (a + 1)..n_terms {
            let col_b = matrix.matrix.column(b);
            let mut intersection = 0usize;
            let mut union = 0usize;
            for (&x, &y) in col_a.iter().zip(col_b.iter()) {
                if x && y {
                    intersection += 1;
                }
                if x || y {
                    union += 1;
                }
            }
            if union == 0 {
                continue;
            }
            pairs.push(TermDistance {
                term_a: matrix.terms[a].clone(),
                term_b: matrix.terms[b].clone(),
                distance: 1.0 - intersection as f64 / union as f64,
            });
        }
    }

    pairs.sort_by(|p, q| {
        p.distance
            .partial_cmp(&q.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| p.term_a.cmp(&q.term_a))
            .then_with(|| p.term_b.cmp(&q.term_b))
    });

    DistanceReport { pairs }
}
