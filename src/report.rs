//! Aggregation helpers for presenting harvest output.

use std::collections::BTreeMap;

use crate::model::{AssemblyReference, ExtractionResult, PackageReference};

/// Requested vs. yielded file counts for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub requested: usize,
    pub yielded: usize,
}

impl ReportSummary {
    pub fn new(requested: usize, yielded: usize) -> Self {
        Self { requested, yielded }
    }

    /// Files that were requested but produced no result.
    pub fn unprocessed(&self) -> usize {
        self.requested.saturating_sub(self.yielded)
    }

    /// Progress in percent, for display.
    pub fn percent(&self) -> f64 {
        if self.requested == 0 {
            return 100.0;
        }
        100.0 * self.yielded as f64 / self.requested as f64
    }
}

/// Package references grouped by `(name, version)`, ordered by name then version.
pub fn package_hit_counts(results: &[ExtractionResult]) -> Vec<(PackageReference, usize)> {
    hit_counts(results.iter().flat_map(|r| r.package_references.iter()))
}

/// Assembly references grouped by `(name, version)`, ordered by name then version.
pub fn assembly_hit_counts(results: &[ExtractionResult]) -> Vec<(AssemblyReference, usize)> {
    hit_counts(results.iter().flat_map(|r| r.assembly_references.iter()))
}

fn hit_counts<'a, T>(references: impl Iterator<Item = &'a T>) -> Vec<(T, usize)>
where
    T: Ord + Clone + 'a,
{
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for reference in references {
        *counts.entry(reference.clone()).or_default() += 1;
    }
    counts.into_iter().collect()
}
