use proptest::prelude::*;
use proptest::sample::subsequence;
use vdom::{
    DiffOptions, Hid, HidGenerator, HidPolicy, Node, Patch, PatchOp, Stamp, assign_all_hids, diff,
    diff_with,
};

fn keyed_list(keys: &[String]) -> Node {
    Node::element("ul").with_children(keys.iter().map(|key| {
        Node::element("li")
            .with_key(key.as_str())
            .with_child(Node::text(key.as_str()))
    }))
}

fn prev_keys(n: usize) -> Vec<String> {
    (0..n).map(|k| format!("k{k}")).collect()
}

fn with_inserts(mut keys: Vec<String>, inserts: Vec<usize>) -> Vec<String> {
    for (i, at) in inserts.into_iter().enumerate() {
        let at = at.min(keys.len());
        keys.insert(at, format!("new{i}"));
    }
    keys
}

/// Surviving keys in shuffled order plus a few fresh keys.
fn reordered() -> impl Strategy<Value = (usize, Vec<String>)> {
    (0usize..10)
        .prop_flat_map(|n| {
            (
                Just(n),
                subsequence((0..n).collect::<Vec<_>>(), 0..=n),
                proptest::collection::vec(0usize..=12, 0..4),
            )
        })
        .prop_flat_map(|(n, kept, inserts)| (Just(n), Just(kept).prop_shuffle(), Just(inserts)))
        .prop_map(|(n, kept, inserts)| {
            let keys = kept.into_iter().map(|k| format!("k{k}")).collect();
            (n, with_inserts(keys, inserts))
        })
}

fn permuted() -> impl Strategy<Value = (usize, Vec<String>)> {
    (0usize..10)
        .prop_flat_map(|n| (Just(n), Just(prev_keys(n)).prop_shuffle()))
}

/// Surviving keys in their original order plus a few fresh keys.
fn order_preserving() -> impl Strategy<Value = (usize, Vec<String>)> {
    (0usize..10)
        .prop_flat_map(|n| {
            (
                Just(n),
                subsequence((0..n).collect::<Vec<_>>(), 0..=n),
                proptest::collection::vec(0usize..=12, 0..4),
            )
        })
        .prop_map(|(n, kept, inserts)| {
            let keys = kept.into_iter().map(|k| format!("k{k}")).collect();
            (n, with_inserts(keys, inserts))
        })
}

fn child_hids(node: &Node) -> Vec<Hid> {
    node.children().iter().map(|child| child.hid.clone()).collect()
}

/// Replays child-list patches against a flat list of ids the way a client would.
fn replay(mut live: Vec<Hid>, parent: &Hid, patches: &[Patch]) -> Vec<Hid> {
    for patch in patches {
        match patch {
            Patch::MoveNode {
                hid,
                parent_id,
                index,
            } => {
                assert_eq!(parent_id, parent);
                let at = live
                    .iter()
                    .position(|h| h == hid)
                    .unwrap_or_else(|| panic!("move of unknown {hid:?}"));
                let moved = live.remove(at);
                assert!(*index <= live.len(), "move index out of range: {patch:?}");
                live.insert(*index, moved);
            }
            Patch::InsertNode {
                parent_id,
                index,
                node,
            } => {
                assert_eq!(parent_id, parent);
                assert!(*index <= live.len(), "insert index out of range: {patch:?}");
                live.insert(*index, node.hid.clone());
            }
            Patch::RemoveNode { hid } => {
                let at = live
                    .iter()
                    .position(|h| h == hid)
                    .unwrap_or_else(|| panic!("remove of unknown {hid:?}"));
                live.remove(at);
            }
            other => panic!("unexpected patch for a pure reorder: {other:?}"),
        }
    }
    live
}

proptest! {
    #[test]
    fn replaying_keyed_patches_reaches_next_order((n, next_keys) in reordered()) {
        let generator = HidGenerator::new();
        let mut prev = keyed_list(&prev_keys(n));
        assign_all_hids(&mut prev, &generator);
        let mut next = keyed_list(&next_keys);
        let options = DiffOptions {
            stamp: Some(Stamp { generator: &generator, policy: HidPolicy::All }),
        };

        let patches = diff_with(Some(&prev), Some(&mut next), &options);

        let live = replay(child_hids(&prev), &prev.hid, &patches);
        prop_assert_eq!(live, child_hids(&next));
        let removals = patches.iter().filter(|p| p.op() == PatchOp::RemoveNode).count();
        let survivors = next_keys.iter().filter(|k| k.starts_with('k')).count();
        prop_assert_eq!(removals, n - survivors);
    }

    #[test]
    fn pure_permutation_only_moves((n, next_keys) in permuted()) {
        let generator = HidGenerator::new();
        let mut prev = keyed_list(&prev_keys(n));
        assign_all_hids(&mut prev, &generator);
        let mut next = keyed_list(&next_keys);

        let patches = diff(Some(&prev), Some(&mut next));

        prop_assert!(patches.iter().all(|p| p.op() == PatchOp::MoveNode), "{:?}", patches);
        prop_assert!(patches.len() <= n.saturating_sub(1));
    }

    #[test]
    fn order_preserving_edits_never_move((n, next_keys) in order_preserving()) {
        let generator = HidGenerator::new();
        let mut prev = keyed_list(&prev_keys(n));
        assign_all_hids(&mut prev, &generator);
        let mut next = keyed_list(&next_keys);

        let patches = diff(Some(&prev), Some(&mut next));

        prop_assert!(patches.iter().all(|p| p.op() != PatchOp::MoveNode), "{:?}", patches);
        let inserts = next_keys.iter().filter(|k| k.starts_with("new")).count();
        prop_assert_eq!(
            patches.iter().filter(|p| p.op() == PatchOp::InsertNode).count(),
            inserts
        );
    }

    #[test]
    fn matched_children_keep_their_ids((n, next_keys) in reordered()) {
        let generator = HidGenerator::new();
        let mut prev = keyed_list(&prev_keys(n));
        assign_all_hids(&mut prev, &generator);
        let mut next = keyed_list(&next_keys);

        let _ = diff(Some(&prev), Some(&mut next));

        for child in next.children() {
            let Some(key) = child.key_str() else { continue };
            let original = prev.children().iter().find(|c| c.key_str() == Some(key));
            match original {
                Some(original) => {
                    prop_assert_eq!(&child.hid, &original.hid);
                }
                None => {
                    prop_assert!(child.hid.is_empty());
                }
            }
        }
    }
}
