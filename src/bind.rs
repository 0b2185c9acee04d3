//! Runtime routing table between channels
//!
//! Each source channel has at most one destination. The table is guarded by a
//! single `RwLock`: binds and unbinds take it for writing, the router holds it
//! for reading while it resolves a route and enqueues, so an edge never
//! changes halfway through a delivery.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        PoisonError, RwLock, RwLockReadGuard,
    },
};

use log::info;

use crate::{
    channels::ChannelId,
    error::{FrameBindError, Result},
};

pub(crate) type EdgeMap = HashMap<ChannelId, ChannelId>;

/// Source → destination edges
#[derive(Debug, Default)]
pub struct BindGraph {
    edges: RwLock<EdgeMap>,
    binds: AtomicU64,
    unbinds: AtomicU64,
}

impl BindGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the edge table, held across route resolution
    pub(crate) fn read_edges(&self) -> RwLockReadGuard<'_, EdgeMap> {
        self.edges.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route `src`'s frames to `dst`
    ///
    /// Legal in any lifecycle state. Fails `AlreadyBound` when `src` already
    /// has an edge, even one to `dst`.
    pub fn bind(&self, src: ChannelId, dst: ChannelId) -> Result<()> {
        if src == dst {
            return Err(FrameBindError::invalid_argument(
                "dst",
                format!("Cannot bind {} to itself", src),
            ));
        }

        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = edges.get(&src) {
            return Err(FrameBindError::already_bound(src, existing));
        }
        edges.insert(src, dst);
        drop(edges);

        self.binds.fetch_add(1, Ordering::Relaxed);
        info!("Bound {} -> {}", src, dst);
        Ok(())
    }

    /// Remove exactly the edge `src -> dst`
    pub fn unbind(&self, src: ChannelId, dst: ChannelId) -> Result<()> {
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        match edges.get(&src) {
            Some(current) if *current == dst => {
                edges.remove(&src);
            }
            _ => return Err(FrameBindError::not_bound(src, dst)),
        }
        drop(edges);

        self.unbinds.fetch_add(1, Ordering::Relaxed);
        info!("Unbound {} -> {}", src, dst);
        Ok(())
    }

    pub fn destination(&self, src: ChannelId) -> Option<ChannelId> {
        self.read_edges().get(&src).copied()
    }

    /// Every source currently bound to `dst`, sorted
    pub fn sources_of(&self, dst: ChannelId) -> Vec<ChannelId> {
        let mut sources: Vec<_> = self
            .read_edges()
            .iter()
            .filter(|(_, d)| **d == dst)
            .map(|(s, _)| *s)
            .collect();
        sources.sort();
        sources
    }

    /// All edges, sorted by source
    pub fn edges(&self) -> Vec<(ChannelId, ChannelId)> {
        let mut edges: Vec<_> = self.read_edges().iter().map(|(s, d)| (*s, *d)).collect();
        edges.sort();
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.read_edges().len()
    }

    /// Whether `id` is either end of any edge
    pub fn touches(&self, id: ChannelId) -> bool {
        touches(&self.read_edges(), id)
    }

    /// (binds, unbinds) performed so far
    pub fn counts(&self) -> (u64, u64) {
        (
            self.binds.load(Ordering::Relaxed),
            self.unbinds.load(Ordering::Relaxed),
        )
    }
}

pub(crate) fn touches(edges: &EdgeMap, id: ChannelId) -> bool {
    edges.iter().any(|(s, d)| *s == id || *d == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_unbind() {
        let graph = BindGraph::new();
        let a = ChannelId::process(0, 0);
        let b = ChannelId::process(1, 0);

        graph.bind(a, b).unwrap();
        assert_eq!(graph.destination(a), Some(b));
        assert!(graph.touches(b));
        assert!(matches!(graph.bind(a, b), Err(FrameBindError::AlreadyBound { .. })));

        graph.unbind(a, b).unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert!(matches!(graph.unbind(a, b), Err(FrameBindError::NotBound { .. })));
        assert_eq!(graph.counts(), (1, 1));
    }

    #[test]
    fn test_self_bind_rejected() {
        let graph = BindGraph::new();
        let a = ChannelId::process(0, 0);
        assert!(matches!(graph.bind(a, a), Err(FrameBindError::InvalidArgument { .. })));
    }

    #[test]
    fn test_unbind_wrong_destination() {
        let graph = BindGraph::new();
        let a = ChannelId::process(0, 0);
        let b = ChannelId::process(1, 0);
        let c = ChannelId::encode(0);
        graph.bind(a, b).unwrap();
        assert!(matches!(graph.unbind(a, c), Err(FrameBindError::NotBound { .. })));
        assert_eq!(graph.destination(a), Some(b));
    }

    #[test]
    fn test_fan_in() {
        let graph = BindGraph::new();
        let dst = ChannelId::encode(0);
        graph.bind(ChannelId::process(1, 0), dst).unwrap();
        graph.bind(ChannelId::process(0, 0), dst).unwrap();
        assert_eq!(
            graph.sources_of(dst),
            vec![ChannelId::process(0, 0), ChannelId::process(1, 0)]
        );
        assert_eq!(graph.edges().len(), 2);
    }
}
