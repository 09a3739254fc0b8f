//! Static topology shared by the structured barriers.
//!
//! Every function here is a pure function of a participant index, a round or slot and the
//! participant count. The barriers evaluate them once when built and store the results in
//! fixed tables, so nothing is negotiated at runtime.

use std::array;
use std::num::NonZero;

/// How many children report to a node of the [`TreeBarrier`][crate::TreeBarrier] arrival tree.
pub const ARRIVAL_FAN_IN: usize = 4;

/// How many children a node of the [`TreeBarrier`][crate::TreeBarrier] wakeup tree wakes up.
pub const WAKEUP_FAN_OUT: usize = 2;

/// Returns `ceil(log2(n))`, i.e. the number of doublings needed to get from 1 to at least `n`.
///
/// ```
/// use muster::topology::ceil_log2;
/// use new_zealand::nz;
///
/// assert_eq!(ceil_log2(nz!(1)), 0);
/// assert_eq!(ceil_log2(nz!(4)), 2);
/// assert_eq!(ceil_log2(nz!(5)), 3);
/// ```
#[must_use]
pub fn ceil_log2(n: NonZero<usize>) -> u32 {
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "NonZero protects against underflow"
    )]
    let below = n.get() - 1;

    usize::BITS - below.leading_zeros()
}

/// Returns `2^k`.
///
/// # Panics
///
/// Panics if `2^k` does not fit in `usize`.
#[must_use]
pub fn pow2(k: u32) -> usize {
    1_usize
        .checked_shl(k)
        .expect("barrier topologies never need powers of two beyond the address space")
}

/// Identifies one of the [`ARRIVAL_FAN_IN`] "child not ready" flags of a tree node.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChildSlot {
    node: usize,
    slot: usize,
}

impl ChildSlot {
    /// The index of the node that owns the flag.
    #[must_use]
    pub fn node(&self) -> usize {
        self.node
    }

    /// Which of the node's child flags it is, in `0..ARRIVAL_FAN_IN`.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// The static wiring of one node of the MCS tree barrier.
///
/// Node `i` has arrival children `4i+1 ..= 4i+4` and wakeup children `2i+1` and `2i+2`, each
/// only if it is below the participant count. Node 0 is the root of both trees.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TreeNode {
    has_child: [bool; ARRIVAL_FAN_IN],
    arrival_parent: Option<ChildSlot>,
    wakeup_children: [Option<usize>; WAKEUP_FAN_OUT],
}

impl TreeNode {
    /// Derives the wiring of node `id` in a tree of `participants` nodes.
    #[must_use]
    pub fn derive(id: usize, participants: NonZero<usize>) -> Self {
        let has_child = array::from_fn(|slot| {
            nth_child(id, ARRIVAL_FAN_IN, slot).is_some_and(|child| child < participants.get())
        });

        let arrival_parent = id.checked_sub(1).map(|above| ChildSlot {
            node: above.div_euclid(ARRIVAL_FAN_IN),
            slot: above.rem_euclid(ARRIVAL_FAN_IN),
        });

        let wakeup_children = array::from_fn(|slot| {
            nth_child(id, WAKEUP_FAN_OUT, slot).filter(|child| *child < participants.get())
        });

        Self {
            has_child,
            arrival_parent,
            wakeup_children,
        }
    }

    /// Whether arrival child `slot` exists. Always `false` for `slot >= ARRIVAL_FAN_IN`.
    #[must_use]
    pub fn has_child(&self, slot: usize) -> bool {
        self.has_child.get(slot).copied().unwrap_or(false)
    }

    /// How many arrival children this node waits for.
    #[must_use]
    pub fn arrival_child_count(&self) -> usize {
        self.has_child.iter().filter(|exists| **exists).count()
    }

    /// The flag this node clears when its subtree has arrived, or `None` at the root.
    #[must_use]
    pub fn arrival_parent(&self) -> Option<ChildSlot> {
        self.arrival_parent
    }

    /// The nodes this node wakes up. Absent children are `None` and are skipped.
    #[must_use]
    pub fn wakeup_children(&self) -> [Option<usize>; WAKEUP_FAN_OUT] {
        self.wakeup_children
    }
}

// Child `slot` of node `id` in a `fan`-ary tree laid out in an array, if it fits in `usize`.
fn nth_child(id: usize, fan: usize, slot: usize) -> Option<usize> {
    id.checked_mul(fan)?.checked_add(slot)?.checked_add(1)
}

/// The partner that participant `id` signals in dissemination round `round`.
///
/// This is `(id + 2^round) mod participants`.
///
/// # Panics
///
/// Panics if `id` is not below `participants` or `round` is not below
/// [`ceil_log2(participants)`][ceil_log2].
#[must_use]
pub fn dissemination_partner(id: usize, round: u32, participants: NonZero<usize>) -> usize {
    assert!(
        id < participants.get(),
        "participant {id} out of range for {participants} participants"
    );
    assert!(
        round < ceil_log2(participants),
        "round {round} out of range for {participants} participants"
    );

    // Both terms are below `participants` here, so the sum cannot overflow before
    // the address space is exhausted.
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "both terms are below participants, checked above"
    )]
    let reach = id + pow2(round);

    reach % participants
}

/// The role a participant plays in one round of the tournament barrier.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Role {
    /// Waits for its opponent to report arrival, advances, and wakes the opponent on the way
    /// down.
    Winner,

    /// Reports arrival to its opponent and waits to be woken up. This is the round in which
    /// the participant is eliminated.
    Loser,

    /// Has no opponent this round and advances without waiting.
    Bye,

    /// Winner of the final round. Waits for its opponent, then starts the wakeup.
    Champion,

    /// Round 0 placeholder that terminates the wakeup descent.
    Dropout,

    /// The participant was eliminated in an earlier round and never reaches this one.
    Unused,
}

/// The role of participant `id` in tournament round `round`.
///
/// For `round > 0`, with `stride = 2^round` and `half = 2^(round-1)`:
///
/// * `Winner` if `id mod stride = 0`, `id + half < participants` and `stride < participants`.
/// * `Bye` if `id mod stride = 0` and `id + half >= participants`.
/// * `Loser` if `id mod stride = half`.
/// * `Champion` if `id = 0` and `stride >= participants`.
///
/// Round 0 is always `Dropout`; anything else, including every round past
/// [`ceil_log2(participants)`][ceil_log2], is `Unused`.
#[must_use]
pub fn tournament_role(id: usize, round: u32, participants: NonZero<usize>) -> Role {
    let Some(previous) = round.checked_sub(1) else {
        return Role::Dropout;
    };

    if round > ceil_log2(participants) {
        return Role::Unused;
    }

    // `previous` is below the bit width of usize here, but `round` may equal it, in which
    // case the stride exceeds every index.
    let half = pow2(previous);
    let stride = 1_usize.checked_shl(round);
    let offset = stride.map_or(id, |stride| id % stride);

    if offset == half {
        return Role::Loser;
    }

    if offset != 0 {
        return Role::Unused;
    }

    let opponent_exists = id
        .checked_add(half)
        .is_some_and(|opponent| opponent < participants.get());

    if !opponent_exists {
        Role::Bye
    } else if stride.is_some_and(|stride| stride < participants.get()) {
        Role::Winner
    } else if id == 0 {
        Role::Champion
    } else {
        Role::Unused
    }
}

/// The participant whose flag participant `id` writes in tournament round `round`.
///
/// Losers report to `id - 2^(round-1)`; winners and the champion wake `id + 2^(round-1)`.
/// Every other role has no opponent.
#[must_use]
pub fn tournament_opponent(id: usize, round: u32, participants: NonZero<usize>) -> Option<usize> {
    match tournament_role(id, round, participants) {
        Role::Loser => id.checked_sub(pow2(round.checked_sub(1)?)),
        Role::Winner | Role::Champion => id.checked_add(pow2(round.checked_sub(1)?)),
        Role::Bye | Role::Dropout | Role::Unused => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        clippy::integer_division,
        reason = "panic is fine in tests"
    )]

    use new_zealand::nz;
    use proptest::prelude::*;

    use super::*;

    fn nonzero(n: usize) -> NonZero<usize> {
        NonZero::new(n).unwrap()
    }

    #[test]
    fn ceil_log2_small_values() {
        let expected = [0, 1, 2, 2, 3, 3, 3, 3, 4];

        for (n, expected) in (1..).zip(expected) {
            assert_eq!(ceil_log2(nonzero(n)), expected, "n = {n}");
        }

        assert_eq!(ceil_log2(nonzero(1 << 20)), 20);
        assert_eq!(ceil_log2(nonzero((1 << 20) + 1)), 21);
        assert_eq!(ceil_log2(nonzero(usize::MAX)), usize::BITS);
    }

    #[test]
    fn pow2_values() {
        assert_eq!(pow2(0), 1);
        assert_eq!(pow2(1), 2);
        assert_eq!(pow2(10), 1024);
    }

    #[test]
    fn single_node_tree_is_degenerate() {
        let node = TreeNode::derive(0, nz!(1));

        assert_eq!(node.arrival_child_count(), 0);
        assert_eq!(node.arrival_parent(), None);
        assert_eq!(node.wakeup_children(), [None, None]);
    }

    #[test]
    fn tree_wiring_for_seven() {
        let root = TreeNode::derive(0, nz!(7));
        assert_eq!(root.arrival_child_count(), 4);
        assert_eq!(root.wakeup_children(), [Some(1), Some(2)]);

        let one = TreeNode::derive(1, nz!(7));
        assert_eq!(one.arrival_child_count(), 2);
        assert_eq!(one.arrival_parent(), Some(ChildSlot { node: 0, slot: 0 }));
        assert_eq!(one.wakeup_children(), [Some(3), Some(4)]);

        let six = TreeNode::derive(6, nz!(7));
        assert_eq!(six.arrival_child_count(), 0);
        assert_eq!(six.arrival_parent(), Some(ChildSlot { node: 1, slot: 1 }));
        assert_eq!(six.wakeup_children(), [None, None]);
    }

    #[test]
    fn dissemination_partners_for_five() {
        let partners = (0..3)
            .map(|round| dissemination_partner(3, round, nz!(5)))
            .collect::<Vec<_>>();

        assert_eq!(partners, [4, 0, 2]);
    }

    #[test]
    #[should_panic(expected = "round 2 out of range")]
    fn dissemination_round_out_of_range_panics() {
        let _partner = dissemination_partner(0, 2, nz!(4));
    }

    #[test]
    fn tournament_roles_for_three() {
        assert_eq!(tournament_role(0, 1, nz!(3)), Role::Winner);
        assert_eq!(tournament_role(1, 1, nz!(3)), Role::Loser);
        assert_eq!(tournament_role(2, 1, nz!(3)), Role::Bye);
        assert_eq!(tournament_role(0, 2, nz!(3)), Role::Champion);
        assert_eq!(tournament_role(1, 2, nz!(3)), Role::Unused);
        assert_eq!(tournament_role(2, 2, nz!(3)), Role::Loser);

        assert_eq!(tournament_opponent(2, 2, nz!(3)), Some(0));
        assert_eq!(tournament_opponent(0, 2, nz!(3)), Some(2));
        assert_eq!(tournament_opponent(2, 1, nz!(3)), None);
    }

    #[test]
    fn tournament_round_zero_is_dropout() {
        for id in 0..13 {
            assert_eq!(tournament_role(id, 0, nz!(13)), Role::Dropout);
            assert_eq!(tournament_opponent(id, 0, nz!(13)), None);
        }
    }

    #[test]
    fn tournament_rounds_past_the_final_are_unused() {
        for round in [4, 5, 63, 64, 200, u32::MAX] {
            assert_eq!(tournament_role(0, round, nz!(5)), Role::Unused, "round {round}");
            assert_eq!(tournament_opponent(0, round, nz!(5)), None, "round {round}");
            assert_eq!(tournament_role(4, round, nz!(5)), Role::Unused, "round {round}");
        }

        assert_eq!(tournament_role(0, 3, nz!(5)), Role::Champion);

        // The last possible round for the largest possible participant count.
        assert_eq!(
            tournament_role(0, usize::BITS, nonzero(usize::MAX)),
            Role::Champion
        );
        assert_eq!(
            tournament_opponent(0, usize::BITS, nonzero(usize::MAX)),
            Some(pow2(usize::BITS - 1))
        );
    }

    #[test]
    fn tournament_has_one_champion() {
        for participants in [1, 2, 3, 4, 5, 8, 13] {
            let participants = nonzero(participants);
            let rounds = ceil_log2(participants);

            let champions = (0..participants.get())
                .flat_map(|id| (0..=rounds).map(move |round| (id, round)))
                .filter(|&(id, round)| tournament_role(id, round, participants) == Role::Champion)
                .collect::<Vec<_>>();

            if participants.get() == 1 {
                assert!(champions.is_empty());
            } else {
                assert_eq!(champions, [(0, rounds)]);
            }
        }
    }

    proptest! {
        #[test]
        fn tree_fan_in_is_bounded(participants in 1_usize..300, id_seed in any::<usize>()) {
            let id = id_seed % participants;
            let node = TreeNode::derive(id, nonzero(participants));

            let expected = participants
                .saturating_sub(1)
                .saturating_sub(4 * id)
                .min(ARRIVAL_FAN_IN);

            prop_assert_eq!(node.arrival_child_count(), expected);
            prop_assert_eq!(node.arrival_parent().is_none(), id == 0);
        }

        #[test]
        fn tree_parents_point_back_at_children(participants in 1_usize..300) {
            let participants = nonzero(participants);

            for id in 1..participants.get() {
                let parent = TreeNode::derive(id, participants).arrival_parent().unwrap();
                let parent_node = TreeNode::derive(parent.node(), participants);

                prop_assert!(parent.node() < id);
                prop_assert!(parent_node.has_child(parent.slot()));

                let wakeup_parent = (id - 1) / 2;
                prop_assert!(TreeNode::derive(wakeup_parent, participants)
                    .wakeup_children()
                    .contains(&Some(id)));
            }
        }

        #[test]
        fn dissemination_partners_are_a_permutation(participants in 2_usize..300) {
            let participants = nonzero(participants);

            for round in 0..ceil_log2(participants) {
                let mut written_by = vec![None; participants.get()];

                for id in 0..participants.get() {
                    let partner = dissemination_partner(id, round, participants);

                    prop_assert_eq!(partner, (id + (1 << round)) % participants);
                    prop_assert_ne!(partner, id);
                    prop_assert_eq!(written_by[partner], None);
                    written_by[partner] = Some(id);
                }

                // Every flag of the round has exactly one writer and the writer is the
                // participant `2^round` below its owner.
                for (owner, writer) in written_by.into_iter().enumerate() {
                    let writer = writer.unwrap();
                    prop_assert_eq!((writer + (1 << round)) % participants, owner);
                }
            }
        }

        #[test]
        fn tournament_bracket_is_consistent(participants in 1_usize..300) {
            let participants = nonzero(participants);
            let rounds = ceil_log2(participants);

            for round in 1..=rounds {
                for id in 0..participants.get() {
                    let role = tournament_role(id, round, participants);
                    let opponent = tournament_opponent(id, round, participants);

                    match role {
                        Role::Loser => {
                            let opponent = opponent.unwrap();
                            let opponent_role = tournament_role(opponent, round, participants);
                            prop_assert!(matches!(opponent_role, Role::Winner | Role::Champion));
                            prop_assert_eq!(tournament_opponent(opponent, round, participants), Some(id));
                        }
                        Role::Winner | Role::Champion => {
                            let opponent = opponent.unwrap();
                            prop_assert!(opponent < participants.get());
                            prop_assert_eq!(tournament_role(opponent, round, participants), Role::Loser);
                        }
                        Role::Bye | Role::Unused => prop_assert_eq!(opponent, None),
                        Role::Dropout => prop_assert!(false, "dropout outside round 0"),
                    }
                }
            }

            // Every participant except 0 loses exactly once; participant 0 never loses.
            for id in 0..participants.get() {
                let losses = (1..=rounds)
                    .filter(|&round| tournament_role(id, round, participants) == Role::Loser)
                    .count();

                prop_assert_eq!(losses, usize::from(id != 0));
            }
        }
    }
}
