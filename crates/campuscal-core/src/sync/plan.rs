//! Declared sync ordering.
//!
//! A [`SyncPlan`] is built from `(domain, dependencies)` pairs and ordered
//! with Kahn's algorithm. Ties are broken by declaration order so the same
//! declaration always yields the same plan.

use super::types::{SyncDomain, SyncPlanError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    order: Vec<SyncDomain>,
    depths: Vec<usize>,
}

impl SyncPlan {
    /// Build a plan from declared dependencies.
    ///
    /// # Errors
    /// Rejects duplicate domains, dependencies on undeclared domains and
    /// cycles.
    pub fn new<'a, I>(declared: I) -> Result<Self, SyncPlanError>
    where
        I: IntoIterator<Item = (SyncDomain, &'a [SyncDomain])>,
    {
        let nodes: Vec<(SyncDomain, &[SyncDomain])> = declared.into_iter().collect();
        let index_of = |d: SyncDomain| nodes.iter().position(|(n, _)| *n == d);

        for (i, (domain, deps)) in nodes.iter().enumerate() {
            if index_of(*domain) != Some(i) {
                return Err(SyncPlanError::Duplicate(*domain));
            }
            if let Some(&dependency) = deps.iter().find(|d| index_of(**d).is_none()) {
                return Err(SyncPlanError::UnknownDependency {
                    domain: *domain,
                    dependency,
                });
            }
        }

        let mut remaining: Vec<usize> = nodes.iter().map(|(_, deps)| deps.len()).collect();
        let mut depths = vec![0usize; nodes.len()];
        let mut placed = vec![false; nodes.len()];
        let mut order = Vec::with_capacity(nodes.len());
        let mut order_depths = Vec::with_capacity(nodes.len());

        while order.len() < nodes.len() {
            let Some(next) = (0..nodes.len()).find(|&i| !placed[i] && remaining[i] == 0) else {
                let stuck = (0..nodes.len())
                    .filter(|&i| !placed[i])
                    .map(|i| nodes[i].0)
                    .collect();
                return Err(SyncPlanError::Cycle(stuck));
            };

            placed[next] = true;
            order.push(nodes[next].0);
            order_depths.push(depths[next]);

            for (i, (_, deps)) in nodes.iter().enumerate() {
                if !placed[i] && deps.contains(&nodes[next].0) {
                    remaining[i] -= 1;
                    depths[i] = depths[i].max(depths[next] + 1);
                }
            }
        }

        Ok(Self {
            order,
            depths: order_depths,
        })
    }

    /// Organizations, then channels, then subscriptions.
    pub fn standard() -> Self {
        Self {
            order: SyncDomain::ALL.to_vec(),
            depths: vec![0, 1, 2],
        }
    }

    /// Execution order. Every domain comes after its dependencies.
    pub fn order(&self) -> &[SyncDomain] {
        &self.order
    }

    /// Domains grouped by dependency depth.
    pub fn levels(&self) -> Vec<Vec<SyncDomain>> {
        let mut levels: Vec<Vec<SyncDomain>> = Vec::new();
        for (&domain, &depth) in self.order.iter().zip(&self.depths) {
            if levels.len() <= depth {
                levels.resize_with(depth + 1, Vec::new);
            }
            levels[depth].push(domain);
        }
        levels
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SyncPlan {
    fn default() -> Self {
        Self::standard()
    }
}
