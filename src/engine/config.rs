// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Deterministic system topology.

use crate::site::SiteId;
use crate::storage::VariableId;

/// Topology parameters: how many sites and variables exist, and where
/// each variable lives.
///
/// The partition rule is fixed: even-indexed variables are replicated on
/// every site; an odd-indexed variable `k` lives only on site
/// `1 + k mod site_count`.
#[derive(Debug, Clone, Copy)]
pub struct SystemConfig {
    site_count: u32,
    variable_count: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            site_count: 10,
            variable_count: 20,
        }
    }
}

impl SystemConfig {
    /// Overrides the number of sites (tests shrink the topology).
    pub fn with_sites(mut self, site_count: u32) -> Self {
        self.site_count = site_count;
        self
    }

    /// Overrides the number of variables.
    pub fn with_variables(mut self, variable_count: u32) -> Self {
        self.variable_count = variable_count;
        self
    }

    /// Returns the number of sites.
    #[inline]
    pub fn site_count(&self) -> u32 {
        self.site_count
    }

    /// Returns the number of variables.
    #[inline]
    pub fn variable_count(&self) -> u32 {
        self.variable_count
    }

    /// Iterates all site ids, in order.
    pub fn sites(&self) -> impl Iterator<Item = SiteId> {
        (1..=self.site_count).map(SiteId)
    }

    /// Iterates all variable ids, in order.
    pub fn variables(&self) -> impl Iterator<Item = VariableId> {
        (1..=self.variable_count).map(VariableId)
    }

    /// Returns the designated site of a non-replicated variable.
    pub fn home_site(&self, variable: VariableId) -> SiteId {
        SiteId(1 + variable.0 % self.site_count)
    }

    /// Returns true if `site` owns a copy of `variable`.
    pub fn owns(&self, site: SiteId, variable: VariableId) -> bool {
        variable.is_replicated() || self.home_site(variable) == site
    }

    /// Returns true if `variable` exists in this topology.
    pub fn contains_variable(&self, variable: VariableId) -> bool {
        (1..=self.variable_count).contains(&variable.0)
    }

    /// Returns true if `site` exists in this topology.
    pub fn contains_site(&self, site: SiteId) -> bool {
        (1..=self.site_count).contains(&site.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topology() {
        let cfg = SystemConfig::default();
        assert_eq!(cfg.sites().count(), 10);
        assert_eq!(cfg.variables().count(), 20);
    }

    #[test]
    fn test_partition_rule() {
        let cfg = SystemConfig::default();
        // Even variables live everywhere.
        for site in cfg.sites() {
            assert!(cfg.owns(site, VariableId(8)));
        }
        // x3 lives only on site 4, x11 only on site 2.
        assert_eq!(cfg.home_site(VariableId(3)), SiteId(4));
        assert!(cfg.owns(SiteId(4), VariableId(3)));
        assert!(!cfg.owns(SiteId(5), VariableId(3)));
        assert_eq!(cfg.home_site(VariableId(11)), SiteId(2));
    }

    #[test]
    fn test_bounds() {
        let cfg = SystemConfig::default();
        assert!(cfg.contains_variable(VariableId(20)));
        assert!(!cfg.contains_variable(VariableId(21)));
        assert!(!cfg.contains_variable(VariableId(0)));
        assert!(cfg.contains_site(SiteId(10)));
        assert!(!cfg.contains_site(SiteId(11)));
    }
}
