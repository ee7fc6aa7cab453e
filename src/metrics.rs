/*!
 * Fill and revert metrics per (pharmacy, drug)
 *
 * Claims are left-joined to reverts on `claim.id == revert.claim_id`. A claim
 * without reverts contributes one joined row, a claim with `k` reverts
 * contributes `k` rows. Every count, sum and mean below is taken over joined
 * rows, so a claim reverted twice counts as two fills.
 */

use std::collections::HashMap;

use crate::data_types::{Claim, MetricRow, Ndc, Npi, Revert};
use crate::eligibility::EligiblePharmacies;
use crate::window::{mean, round_to};

/// Decimal places of `avg_price`
pub const AVG_PRICE_PLACES: u32 = 2;
/// Decimal places of `total_price`
pub const TOTAL_PRICE_PLACES: u32 = 1;

#[derive(Debug, Default)]
struct GroupTotals {
    joined_rows: u64,
    reverted: u64,
    price_sum: f64,
}

/// Count reverts per claim id
pub fn revert_counts(reverts: &[Revert]) -> HashMap<&str, u64> {
    let mut counts = HashMap::new();
    for revert in reverts {
        *counts.entry(revert.claim_id.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Compute one [`MetricRow`] per (npi, ndc) among eligible claims.
///
/// Rows are ordered by `ndc` ascending, `total_price` descending, `fills`
/// descending, then `npi` ascending.
pub fn compute_metrics(
    claims: &[Claim],
    reverts: &[Revert],
    eligible: &EligiblePharmacies,
) -> Vec<MetricRow> {
    let reverts_by_claim = revert_counts(reverts);
    let mut groups: HashMap<(&Npi, &Ndc), GroupTotals> = HashMap::new();

    for claim in eligible.filter_claims(claims) {
        let matches = reverts_by_claim.get(claim.id.as_str()).copied().unwrap_or(0);
        let rows = matches.max(1);

        let totals = groups.entry((&claim.npi, &claim.ndc)).or_default();
        totals.joined_rows += rows;
        totals.reverted += matches;
        totals.price_sum += claim.price * rows as f64;
    }

    let mut rows: Vec<MetricRow> = groups
        .into_iter()
        .filter_map(|((npi, ndc), totals)| {
            let avg = mean(totals.price_sum, totals.joined_rows)?;
            Some(MetricRow {
                npi: npi.clone(),
                ndc: ndc.clone(),
                fills: totals.joined_rows,
                reverted: totals.reverted,
                avg_price: round_to(avg, AVG_PRICE_PLACES),
                total_price: round_to(totals.price_sum, TOTAL_PRICE_PLACES),
            })
        })
        .collect();

    sort_metrics(&mut rows);
    rows
}

/// Report order: ndc asc, total_price desc, fills desc, npi asc
pub fn sort_metrics(rows: &mut [MetricRow]) {
    rows.sort_by(|a, b| {
        a.ndc
            .cmp(&b.ndc)
            .then_with(|| b.total_price.total_cmp(&a.total_price))
            .then_with(|| b.fills.cmp(&a.fills))
            .then_with(|| a.npi.cmp(&b.npi))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::Pharmacy;

    fn eligible(npis: &[&str]) -> EligiblePharmacies {
        let pharmacies: Vec<_> = npis.iter().map(|n| Pharmacy::new(*n, "chain")).collect();
        EligiblePharmacies::from_pharmacies(&pharmacies)
    }

    #[test]
    fn test_single_claim_without_revert() {
        let claims = vec![Claim::new("c1", "1", "D1", 10.0, 30)];
        let rows = compute_metrics(&claims, &[], &eligible(&["1"]));
        assert_eq!(rows, vec![MetricRow {
            npi: Npi::new("1"),
            ndc: Ndc::new("D1"),
            fills: 1,
            reverted: 0,
            avg_price: 10.0,
            total_price: 10.0,
        }]);
    }

    #[test]
    fn test_reverted_claim_counts_once() {
        let claims = vec![Claim::new("c1", "1", "D1", 10.0, 30)];
        let reverts = vec![Revert::new("r1", "c1")];
        let rows = compute_metrics(&claims, &reverts, &eligible(&["1"]));
        assert_eq!(rows[0].fills, 1);
        assert_eq!(rows[0].reverted, 1);
    }

    #[test]
    fn test_double_revert_inflates_fills_and_totals() {
        let claims = vec![
            Claim::new("c1", "1", "D1", 10.0, 30),
            Claim::new("c2", "1", "D1", 4.0, 30),
        ];
        let reverts = vec![Revert::new("r1", "c1"), Revert::new("r2", "c1")];
        let rows = compute_metrics(&claims, &reverts, &eligible(&["1"]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fills, 3);
        assert_eq!(rows[0].reverted, 2);
        assert_eq!(rows[0].total_price, 24.0);
        assert_eq!(rows[0].avg_price, 8.0);
    }

    #[test]
    fn test_ineligible_claims_are_dropped() {
        let claims = vec![
            Claim::new("c1", "1", "D1", 10.0, 30),
            Claim::new("c2", "9", "D1", 10.0, 30),
        ];
        let rows = compute_metrics(&claims, &[], &eligible(&["1"]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].npi, Npi::new("1"));
    }

    #[test]
    fn test_reverts_for_unknown_claims_are_ignored() {
        let claims = vec![Claim::new("c1", "1", "D1", 10.0, 30)];
        let reverts = vec![Revert::new("r1", "missing")];
        let rows = compute_metrics(&claims, &reverts, &eligible(&["1"]));
        assert_eq!(rows[0].reverted, 0);
    }

    #[test]
    fn test_rounding_of_prices() {
        let claims = vec![
            Claim::new("c1", "1", "D1", 0.1, 1),
            Claim::new("c2", "1", "D1", 0.15, 1),
        ];
        let rows = compute_metrics(&claims, &[], &eligible(&["1"]));
        assert_eq!(rows[0].avg_price, 0.13);
        assert_eq!(rows[0].total_price, 0.3);
    }

    #[test]
    fn test_ordering_by_ndc_then_total_then_fills() {
        let claims = vec![
            Claim::new("a", "1", "D2", 5.0, 1),
            Claim::new("b", "2", "D1", 1.0, 1),
            Claim::new("c", "3", "D1", 7.0, 1),
            Claim::new("d", "4", "D1", 3.5, 1),
            Claim::new("e", "4", "D1", 3.5, 1),
        ];
        let rows = compute_metrics(&claims, &[], &eligible(&["1", "2", "3", "4"]));
        let order: Vec<_> = rows.iter().map(|r| (r.ndc.as_str(), r.npi.as_str())).collect();
        // npi 3 and 4 tie on total 7.0; npi 4 has more fills
        assert_eq!(order, vec![("D1", "4"), ("D1", "3"), ("D1", "2"), ("D2", "1")]);
    }

    #[test]
    fn test_full_ties_fall_back_to_npi() {
        let claims = vec![
            Claim::new("a", "20", "D1", 6.0, 1),
            Claim::new("b", "3", "D1", 6.0, 1),
            Claim::new("c", "100", "D1", 6.0, 1),
        ];
        let rows = compute_metrics(&claims, &[], &eligible(&["20", "3", "100"]));
        let order: Vec<_> = rows.iter().map(|r| r.npi.as_str()).collect();
        // npi compares as text
        assert_eq!(order, vec!["100", "20", "3"]);
    }

    #[test]
    fn test_sort_metrics_orders_equal_rows_by_npi() {
        let row = |npi: &str| MetricRow {
            npi: Npi::new(npi),
            ndc: Ndc::new("D1"),
            fills: 2,
            reverted: 0,
            avg_price: 5.0,
            total_price: 10.0,
        };
        let mut rows = vec![row("2"), row("1")];
        sort_metrics(&mut rows);
        assert_eq!(rows, vec![row("1"), row("2")]);
    }

    #[test]
    fn test_empty_inputs_yield_no_rows() {
        assert!(compute_metrics(&[], &[], &eligible(&["1"])).is_empty());
        let claims = vec![Claim::new("c1", "1", "D1", 10.0, 30)];
        assert!(compute_metrics(&claims, &[], &eligible(&[])).is_empty());
    }
}
