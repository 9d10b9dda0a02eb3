//! Dominant Resource Fairness.
//!
//! A client's dominant share is the largest fraction it holds of any
//! scalar resource in the pool. Dividing by the client's weight gives the
//! sort key: the client furthest below its entitlement goes first.
//!
//! Ties on weighted share are broken per level of the role tree. Every
//! client gets a key `[(share(p1), s1), (share(p2), s2), ..., (own, "")]`
//! where `p1..pn` are the prefixes of its path, `s1..sn` their last
//! segments and `share(p)` the weighted share of the whole subtree at `p`.
//! Comparing keys lexicographically orders the tree depth first with
//! siblings ranked by subtree share and then by name. The trailing
//! `(own, "")` entry places a client ahead of its own descendants'
//! subtrees when their shares tie, since segments are never empty.
//!
//! Shares are snapped to a grid of [`SHARE_RESOLUTION`] before comparison,
//! so values that differ only by floating point rounding (`0.15 / 3.0`
//! against `0.05`) tie and reach the tie-breaks.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use fair_core::role;

use crate::quantities::ScalarQuantities;

/// Dominant share of `allocation` relative to `pool`.
///
/// Names in `excluded` and names the pool holds none of contribute 0.
pub fn dominant_share(
    allocation: &ScalarQuantities,
    pool: &ScalarQuantities,
    excluded: &BTreeSet<String>,
) -> f64 {
    let mut share = 0.0_f64;
    let mut held = allocation.iter().peekable();

    // Both sides are sorted by name.
    for (name, total) in pool.iter() {
        while held.next_if(|(n, _)| *n < name).is_some() {}
        let Some((_, amount)) = held.next_if(|(n, _)| *n == name) else {
            continue;
        };
        if !total.is_positive() || excluded.contains(name) {
            continue;
        }
        share = share.max(amount.ratio(total));
    }
    share
}

/// Shares closer than this compare equal when sorting.
pub const SHARE_RESOLUTION: f64 = 1e-9;

fn quantize(share: f64) -> f64 {
    (share / SHARE_RESOLUTION).round()
}

/// Sort key for one active client.
#[derive(Debug, Clone)]
pub struct ClientKey<'a> {
    pub client: &'a str,
    /// Weighted dominant share.
    pub share: f64,
    rank: f64,
    // Per-level (quantized subtree share, segment) pairs; empty for flat
    // ordering.
    levels: Vec<(f64, &'a str)>,
}

impl<'a> ClientKey<'a> {
    /// Key ordered by share, then client id.
    pub fn flat(client: &'a str, share: f64) -> Self {
        Self {
            client,
            share,
            rank: quantize(share),
            levels: Vec::new(),
        }
    }

    /// Key ordered by share, then subtree shares along the role path.
    pub fn hierarchical(client: &'a str, share: f64, subtree_shares: &HashMap<String, f64>) -> Self {
        let mut levels: Vec<(f64, &'a str)> = role::prefixes(client)
            .map(|path| {
                let segment = path.rsplit('/').next().unwrap_or(path);
                let subtree = subtree_shares.get(path).copied().unwrap_or(share);
                (quantize(subtree), segment)
            })
            .collect();
        levels.push((quantize(share), ""));
        Self {
            client,
            share,
            rank: quantize(share),
            levels,
        }
    }

    fn cmp_levels(&self, other: &Self) -> Ordering {
        for (a, b) in self.levels.iter().zip(&other.levels) {
            let ord = a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.levels.len().cmp(&other.levels.len())
    }
}

impl Ord for ClientKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .total_cmp(&other.rank)
            .then_with(|| self.cmp_levels(other))
            .then_with(|| self.client.cmp(other.client))
    }
}

impl PartialOrd for ClientKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ClientKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ClientKey<'_> {}
