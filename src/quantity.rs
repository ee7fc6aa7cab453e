/*!
 * Most commonly prescribed quantities per drug
 *
 * Eligible claims are first grouped by (ndc, npi) so that repeated fills of
 * the same quantity at one pharmacy collapse. The grouped quantities of each
 * drug are then dense-ranked from largest to smallest, ranks up to
 * `max_rank` are kept, and the survivors are deduplicated.
 */

use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::{Claim, CommonQuantity, Ndc, Npi};
use crate::eligibility::EligiblePharmacies;
use crate::window::dense_ranks;

/// Highest dense rank kept per drug
pub const DEFAULT_MAX_QUANTITY_RANK: usize = 5;

/// Compute the top-ranked distinct quantities for every drug with eligible
/// claims, ordered by `ndc` ascending.
///
/// Drugs with nothing kept are left out, so `max_rank == 0` yields an empty
/// report.
pub fn common_quantities(
    claims: &[Claim],
    eligible: &EligiblePharmacies,
    max_rank: usize,
) -> Vec<CommonQuantity> {
    let mut groups: BTreeMap<&Ndc, BTreeMap<&Npi, BTreeSet<i64>>> = BTreeMap::new();
    for claim in eligible.filter_claims(claims) {
        groups
            .entry(&claim.ndc)
            .or_default()
            .entry(&claim.npi)
            .or_default()
            .insert(claim.quantity);
    }

    groups
        .into_iter()
        .map(|(ndc, per_pharmacy)| CommonQuantity {
            ndc: ndc.clone(),
            most_prescribed_quantity: top_quantities(per_pharmacy, max_rank),
        })
        .filter(|row| !row.most_prescribed_quantity.is_empty())
        .collect()
}

fn top_quantities(per_pharmacy: BTreeMap<&Npi, BTreeSet<i64>>, max_rank: usize) -> Vec<i64> {
    let mut rows: Vec<i64> = per_pharmacy.into_values().flatten().collect();
    rows.sort_unstable_by(|a, b| b.cmp(a));

    let ranks = dense_ranks(&rows, |q| *q);
    let mut kept: Vec<i64> = rows
        .into_iter()
        .zip(ranks)
        .take_while(|(_, rank)| *rank <= max_rank)
        .map(|(quantity, _)| quantity)
        .collect();
    kept.dedup();
    kept
}
