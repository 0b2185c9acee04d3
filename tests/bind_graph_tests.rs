//! Bind graph tests
//! Edge rules, fan-in, and consistency under concurrent rebinding

use std::{
    sync::{Arc, Barrier},
    thread,
};

use framebind::{BindGraph, ChannelId, FrameBindError};

#[cfg(test)]
mod bind_graph_tests {
    use super::*;

    /// Test: One outgoing edge per source, removable only by its exact pair
    #[test]
    fn test_single_edge_per_source() {
        let graph = BindGraph::new();
        let src = ChannelId::process(0, 0);
        let enc0 = ChannelId::encode(0);
        let enc1 = ChannelId::encode(1);

        graph.bind(src, enc0).unwrap();
        match graph.bind(src, enc1) {
            Err(FrameBindError::AlreadyBound { existing, .. }) => assert_eq!(existing, enc0.to_string()),
            other => panic!("expected AlreadyBound, got {:?}", other),
        }
        // Rebinding the same pair is refused too
        assert!(matches!(graph.bind(src, enc0), Err(FrameBindError::AlreadyBound { .. })));

        assert!(matches!(graph.unbind(src, enc1), Err(FrameBindError::NotBound { .. })));
        assert_eq!(graph.destination(src), Some(enc0));

        graph.unbind(src, enc0).unwrap();
        assert_eq!(graph.destination(src), None);
        assert!(matches!(graph.unbind(src, enc0), Err(FrameBindError::NotBound { .. })));

        graph.bind(src, enc1).unwrap();
        assert_eq!(graph.destination(src), Some(enc1));
        assert_eq!(graph.counts(), (2, 1));
    }

    /// Test: Several sources may feed one destination
    #[test]
    fn test_fan_in() {
        let graph = BindGraph::new();
        let dst = ChannelId::encode(0);
        let sources = [ChannelId::process(0, 2), ChannelId::process(0, 0), ChannelId::process(1, 0)];

        for src in sources {
            graph.bind(src, dst).unwrap();
        }

        let mut expected = sources.to_vec();
        expected.sort();
        assert_eq!(graph.sources_of(dst), expected);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.touches(dst));
        assert!(graph.touches(sources[0]));
        assert!(!graph.touches(ChannelId::encode(1)));
    }

    /// Test: Self-loops are refused
    #[test]
    fn test_self_loop_rejected() {
        let graph = BindGraph::new();
        let id = ChannelId::process(0, 0);
        assert!(matches!(graph.bind(id, id), Err(FrameBindError::InvalidArgument { .. })));
        assert_eq!(graph.edge_count(), 0);
    }

    /// Test: Racing binders on one source leave exactly one winner
    #[test]
    fn test_concurrent_bind_single_winner() {
        let graph = Arc::new(BindGraph::new());
        let src = ChannelId::process(0, 0);
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads as u32)
            .map(|i| {
                let graph = graph.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    graph.bind(src, ChannelId::encode(i)).is_ok()
                })
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
        assert_eq!(graph.edge_count(), 1);
    }

    /// Test: Bind/unbind churn never leaves more than one edge on a source
    #[test]
    fn test_churn_keeps_graph_consistent() {
        let graph = Arc::new(BindGraph::new());
        let src = ChannelId::process(0, 0);
        let targets = [ChannelId::encode(0), ChannelId::encode(1)];

        let handles: Vec<_> = targets
            .iter()
            .map(|&dst| {
                let graph = graph.clone();
                thread::spawn(move || {
                    let mut bound = 0;
                    for _ in 0..200 {
                        if graph.bind(src, dst).is_ok() {
                            bound += 1;
                            assert_eq!(graph.destination(src), Some(dst));
                            graph.unbind(src, dst).unwrap();
                        }
                    }
                    bound
                })
            })
            .collect();

        let observer = {
            let graph = graph.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    assert!(graph.edges().len() <= 1);
                }
            })
        };

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        observer.join().unwrap();

        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.counts(), (total, total));
    }
}
