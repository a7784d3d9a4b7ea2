//! Per-allele read support statistics.

use super::format::SampleDepths;

/// Read support for one alternate allele.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthStats {
    /// Reads supporting the reference (RO).
    pub reference_support: u32,
    /// Reads supporting the allele (DPR entry), `None` if DPR has no entry for the allele.
    pub allele_support: Option<u32>,
    /// `100 * allele / (allele + reference)`, `None` if undefined.
    pub support_percent: Option<f64>,
}

/// Compute the support percentage, `None` when there are no supporting reads at all.
pub fn support_percent(allele_support: u32, reference_support: u32) -> Option<f64> {
    let total = u64::from(allele_support) + u64::from(reference_support);
    if total == 0 {
        None
    } else {
        Some(100.0 * f64::from(allele_support) / total as f64)
    }
}

impl DepthStats {
    /// Compute the statistics for the alternate allele with the given 0-based index.
    pub fn for_allele(depths: &SampleDepths, allele_idx: usize) -> Self {
        let allele_support = depths.allele_support(allele_idx);
        Self {
            reference_support: depths.ro,
            allele_support,
            support_percent: allele_support
                .and_then(|allele_support| support_percent(allele_support, depths.ro)),
        }
    }
}
