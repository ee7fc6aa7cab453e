/*!
 * Analytics engine over loaded claims data
 *
 * `ClaimsAnalytics` binds the three input collections and one eligibility set
 * and runs the report engines, one at a time or all together.
 */

use serde::{Deserialize, Serialize};

use crate::{
    data_types::*,
    eligibility::EligiblePharmacies,
    metrics::compute_metrics,
    quantity::{common_quantities, DEFAULT_MAX_QUANTITY_RANK},
    recommendation::{recommend_chains, DEFAULT_TOP_CHAINS},
};

/// Analytics engine for claims data
pub struct ClaimsAnalytics<'a> {
    claims: &'a [Claim],
    reverts: &'a [Revert],
    pharmacies: &'a [Pharmacy],
    eligible: &'a EligiblePharmacies,
    top_chains: usize,
    max_quantity_rank: usize,
}

/// The three reports of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reports {
    pub metrics: Vec<MetricRow>,
    pub recommendations: Vec<ChainRecommendation>,
    pub common_quantities: Vec<CommonQuantity>,
}

impl Reports {
    /// Whether every report is empty
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
            && self.recommendations.is_empty()
            && self.common_quantities.is_empty()
    }
}

impl<'a> ClaimsAnalytics<'a> {
    /// Create a new analytics engine
    pub fn new(
        claims: &'a [Claim],
        reverts: &'a [Revert],
        pharmacies: &'a [Pharmacy],
        eligible: &'a EligiblePharmacies,
    ) -> Self {
        Self {
            claims,
            reverts,
            pharmacies,
            eligible,
            top_chains: DEFAULT_TOP_CHAINS,
            max_quantity_rank: DEFAULT_MAX_QUANTITY_RANK,
        }
    }

    /// Set how many chains are kept per drug. `0` leaves the report empty.
    pub fn with_top_chains(mut self, top_chains: usize) -> Self {
        self.top_chains = top_chains;
        self
    }

    /// Set the highest dense rank kept per drug in the quantity report.
    /// `0` leaves the report empty.
    pub fn with_max_quantity_rank(mut self, max_rank: usize) -> Self {
        self.max_quantity_rank = max_rank;
        self
    }

    /// Fill/revert metrics per (pharmacy, drug)
    pub fn metrics(&self) -> Vec<MetricRow> {
        compute_metrics(self.claims, self.reverts, self.eligible)
    }

    /// Cheapest chains per drug
    pub fn chain_recommendations(&self) -> Vec<ChainRecommendation> {
        recommend_chains(self.claims, self.pharmacies, self.eligible, self.top_chains)
    }

    /// Most prescribed quantities per drug
    pub fn common_quantities(&self) -> Vec<CommonQuantity> {
        common_quantities(self.claims, self.eligible, self.max_quantity_rank)
    }

    /// Run all three engines.
    ///
    /// The engines share only immutable inputs, so with the `parallel`
    /// feature they run concurrently.
    pub fn reports(&self) -> Reports {
        #[cfg(feature = "parallel")]
        let (metrics, (recommendations, common_quantities)) = rayon::join(
            || self.metrics(),
            || rayon::join(|| self.chain_recommendations(), || self.common_quantities()),
        );

        #[cfg(not(feature = "parallel"))]
        let (metrics, recommendations, common_quantities) = (
            self.metrics(),
            self.chain_recommendations(),
            self.common_quantities(),
        );

        tracing::info!(
            metrics = metrics.len(),
            recommendations = recommendations.len(),
            common_quantities = common_quantities.len(),
            "reports computed"
        );

        Reports {
            metrics,
            recommendations,
            common_quantities,
        }
    }

    /// Claims whose pharmacy is not in the directory
    pub fn unmatched_claims(&self) -> usize {
        self.claims.iter().filter(|c| !self.eligible.admits(c)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Vec<Claim>, Vec<Revert>, Vec<Pharmacy>) {
        let claims = vec![
            Claim::new("c1", "1", "D1", 10.0, 30),
            Claim::new("c2", "1", "D1", 20.0, 60),
            Claim::new("c3", "2", "D1", 5.0, 30),
            Claim::new("c4", "3", "D1", 1.0, 90),
            Claim::new("c5", "404", "D1", 0.5, 15),
        ];
        let reverts = vec![Revert::new("r1", "c1")];
        let pharmacies = vec![
            Pharmacy::new("1", "health"),
            Pharmacy::new("2", "saver"),
            Pharmacy::new("3", "doctor"),
        ];
        (claims, reverts, pharmacies)
    }

    #[test]
    fn test_reports_only_use_eligible_claims() {
        let (claims, reverts, pharmacies) = fixture();
        let eligible = EligiblePharmacies::from_pharmacies(&pharmacies);
        let analytics = ClaimsAnalytics::new(&claims, &reverts, &pharmacies, &eligible);
        let reports = analytics.reports();

        assert!(reports.metrics.iter().all(|m| m.npi.as_str() != "404"));
        assert_eq!(analytics.unmatched_claims(), 1);

        let chains: Vec<_> = reports.recommendations[0]
            .chain
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(chains, vec!["doctor", "saver"]);
        assert_eq!(reports.common_quantities[0].most_prescribed_quantity, vec![90, 60, 30]);
    }

    #[test]
    fn test_reports_match_individual_engines() {
        let (claims, reverts, pharmacies) = fixture();
        let eligible = EligiblePharmacies::from_pharmacies(&pharmacies);
        let analytics = ClaimsAnalytics::new(&claims, &reverts, &pharmacies, &eligible)
            .with_top_chains(3)
            .with_max_quantity_rank(1);
        let reports = analytics.reports();

        assert_eq!(reports.metrics, analytics.metrics());
        assert_eq!(reports.recommendations[0].chain.len(), 3);
        assert_eq!(reports.common_quantities[0].most_prescribed_quantity, vec![90]);
    }

    #[test]
    fn test_zero_limits_give_empty_reports() {
        let (claims, reverts, pharmacies) = fixture();
        let eligible = EligiblePharmacies::from_pharmacies(&pharmacies);
        let analytics = ClaimsAnalytics::new(&claims, &reverts, &pharmacies, &eligible)
            .with_top_chains(0)
            .with_max_quantity_rank(0);

        assert!(analytics.chain_recommendations().is_empty());
        assert!(analytics.common_quantities().is_empty());
        assert!(!analytics.metrics().is_empty());
    }

    #[test]
    fn test_empty_inputs_give_empty_reports() {
        let eligible = EligiblePharmacies::default();
        let reports = ClaimsAnalytics::new(&[], &[], &[], &eligible).reports();
        assert!(reports.is_empty());
    }
}
