//! Keyframe traversal order.

use keyreel_common::error::{ReelError, ReelResult};
use keyreel_scene_core::{KeyframeId, KeyframeSource};

/// Query the source once and return its keyframes ascending, without
/// duplicates.
pub fn resolve_order(source: &dyn KeyframeSource) -> ReelResult<Vec<KeyframeId>> {
    let mut ids = source.keyframe_ids().map_err(|e| {
        ReelError::no_keyframes(format!("Failed to get keyframes from source: {e}"))
    })?;

    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Err(ReelError::no_keyframes(
            "No keyframes found. Please create some keyframes first.",
        ));
    }

    tracing::debug!(count = ids.len(), "Resolved keyframe order");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ListSource {
        ids: ReelResult<Vec<i64>>,
        queries: AtomicUsize,
    }

    impl ListSource {
        fn new(ids: ReelResult<Vec<i64>>) -> Self {
            Self {
                ids,
                queries: AtomicUsize::new(0),
            }
        }
    }

    impl KeyframeSource for ListSource {
        fn keyframe_ids(&self) -> ReelResult<Vec<KeyframeId>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            match &self.ids {
                Ok(ids) => Ok(ids.iter().copied().map(KeyframeId).collect()),
                Err(e) => Err(ReelError::invalid_input(e.to_string())),
            }
        }

        fn load_keyframe(&self, _id: KeyframeId) -> bool {
            true
        }
    }

    #[test]
    fn test_sorts_ascending() {
        let source = ListSource::new(Ok(vec![5, 1, 3]));
        let order = resolve_order(&source).unwrap();
        assert_eq!(order, vec![KeyframeId(1), KeyframeId(3), KeyframeId(5)]);
        assert_eq!(source.queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drops_duplicates() {
        let source = ListSource::new(Ok(vec![4, 2, 4, 2, -1]));
        let order = resolve_order(&source).unwrap();
        assert_eq!(order, vec![KeyframeId(-1), KeyframeId(2), KeyframeId(4)]);
    }

    #[test]
    fn test_empty_set_is_no_keyframes() {
        let source = ListSource::new(Ok(vec![]));
        assert!(matches!(
            resolve_order(&source),
            Err(ReelError::NoKeyframes { .. })
        ));
    }

    #[test]
    fn test_failed_query_is_no_keyframes() {
        let source = ListSource::new(Err(ReelError::invalid_input("manager gone")));
        match resolve_order(&source) {
            Err(ReelError::NoKeyframes { message }) => assert!(message.contains("manager gone")),
            other => panic!("expected NoKeyframes, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn order_is_strictly_ascending(ids in proptest::collection::vec(-1000i64..1000, 1..64)) {
            let source = ListSource::new(Ok(ids.clone()));
            let order = resolve_order(&source).unwrap();
            prop_assert!(order.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn order_keeps_every_input_once(ids in proptest::collection::vec(-1000i64..1000, 1..64)) {
            let source = ListSource::new(Ok(ids.clone()));
            let order = resolve_order(&source).unwrap();
            for id in &ids {
                prop_assert_eq!(order.iter().filter(|k| k.0 == *id).count(), 1);
            }
            prop_assert!(order.iter().all(|k| ids.contains(&k.0)));
        }
    }
}
