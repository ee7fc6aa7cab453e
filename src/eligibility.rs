/*!
 * Eligible-pharmacy filter
 *
 * A claim is reported only when its NPI appears in the pharmacy directory.
 * Build one [`EligiblePharmacies`] per dataset and hand the same instance to
 * every report engine.
 */

use std::collections::HashSet;

use crate::data_types::{Claim, Npi, Pharmacy};

/// Set of pharmacy NPIs present in the directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligiblePharmacies {
    npis: HashSet<Npi>,
}

impl EligiblePharmacies {
    /// Collect the NPIs of every directory entry
    pub fn from_pharmacies(pharmacies: &[Pharmacy]) -> Self {
        Self {
            npis: pharmacies.iter().map(|p| p.npi.clone()).collect(),
        }
    }

    pub fn contains(&self, npi: &Npi) -> bool {
        self.npis.contains(npi)
    }

    /// Whether the claim was filled at an eligible pharmacy
    pub fn admits(&self, claim: &Claim) -> bool {
        self.contains(&claim.npi)
    }

    /// Claims filled at eligible pharmacies, in input order
    pub fn filter_claims<'a>(
        &'a self,
        claims: &'a [Claim],
    ) -> impl Iterator<Item = &'a Claim> + 'a {
        claims.iter().filter(move |c| self.admits(c))
    }

    pub fn len(&self) -> usize {
        self.npis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npis.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Npi> {
        self.npis.iter()
    }
}

impl FromIterator<Npi> for EligiblePharmacies {
    fn from_iter<I: IntoIterator<Item = Npi>>(iter: I) -> Self {
        Self {
            npis: iter.into_iter().collect(),
        }
    }
}
