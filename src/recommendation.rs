/*!
 * Cheapest-chain recommendations per drug
 *
 * Eligible claims are inner-joined to the pharmacy directory on NPI, grouped
 * by (chain, ndc) and averaged. Within each drug the chains are ranked by
 * ascending unrounded average price with row-number ranking; ties go to the
 * chain whose name sorts first. The best `top_n` chains are kept.
 */

use std::collections::{BTreeMap, HashMap};

use crate::data_types::{ChainPrice, ChainRecommendation, Claim, Ndc, Pharmacy};
use crate::eligibility::EligiblePharmacies;
use crate::metrics::AVG_PRICE_PLACES;
use crate::window::{mean, round_to, row_numbers};

/// Number of chains recommended per drug
pub const DEFAULT_TOP_CHAINS: usize = 2;

#[derive(Debug, Default)]
struct ChainTotals {
    rows: u64,
    price_sum: f64,
}

#[derive(Debug)]
struct RankedChain<'a> {
    name: &'a str,
    avg_price: f64,
}

/// Recommend the `top_n` cheapest chains for every drug with eligible claims.
///
/// One record per drug, ordered by `ndc` ascending. A drug never appears
/// with an empty chain list, so `top_n == 0` yields an empty report.
pub fn recommend_chains(
    claims: &[Claim],
    pharmacies: &[Pharmacy],
    eligible: &EligiblePharmacies,
    top_n: usize,
) -> Vec<ChainRecommendation> {
    // a pharmacy listed more than once joins once per listing
    let mut chains_by_npi: HashMap<&str, Vec<&str>> = HashMap::new();
    for pharmacy in pharmacies {
        chains_by_npi
            .entry(pharmacy.npi.as_str())
            .or_default()
            .push(pharmacy.chain.as_str());
    }

    let mut groups: BTreeMap<&Ndc, HashMap<&str, ChainTotals>> = BTreeMap::new();
    for claim in eligible.filter_claims(claims) {
        let Some(chains) = chains_by_npi.get(claim.npi.as_str()) else {
            continue;
        };
        let per_chain = groups.entry(&claim.ndc).or_default();
        for chain in chains {
            let totals = per_chain.entry(*chain).or_default();
            totals.rows += 1;
            totals.price_sum += claim.price;
        }
    }

    groups
        .into_iter()
        .map(|(ndc, per_chain)| ChainRecommendation {
            ndc: ndc.clone(),
            chain: rank_chains(per_chain, top_n),
        })
        .filter(|rec| !rec.chain.is_empty())
        .collect()
}

fn rank_chains(per_chain: HashMap<&str, ChainTotals>, top_n: usize) -> Vec<ChainPrice> {
    let mut ranked: Vec<RankedChain> = per_chain
        .into_iter()
        .filter_map(|(name, totals)| {
            let avg_price = mean(totals.price_sum, totals.rows)?;
            Some(RankedChain { name, avg_price })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.avg_price
            .total_cmp(&b.avg_price)
            .then_with(|| a.name.cmp(b.name))
    });

    row_numbers(ranked.len())
        .into_iter()
        .zip(ranked)
        .take_while(|(rank, _)| *rank <= top_n)
        .map(|(_, chain)| ChainPrice {
            name: chain.name.to_string(),
            avg_price: round_to(chain.avg_price, AVG_PRICE_PLACES),
        })
        .collect()
}
