use std::array;
use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::topology::{ARRIVAL_FAN_IN, TreeNode};
use crate::{
    Barrier, BarrierBuilder, Config, LocalState, Participant, Registry, Result, wait_until,
};

// One per participant. Aligned so that no two participants' nodes share a cache line.
#[derive(Debug)]
#[repr(align(128))]
struct Node {
    topology: TreeNode,

    // Cleared by arrival child `slot` when its whole subtree has arrived.
    child_not_ready: [AtomicBool; ARRIVAL_FAN_IN],

    // Written by the wakeup parent to release this node.
    parent_sense: AtomicBool,
}

impl Node {
    fn new(topology: TreeNode) -> Self {
        Self {
            child_not_ready: array::from_fn(|slot| AtomicBool::new(topology.has_child(slot))),
            parent_sense: AtomicBool::new(false),
            topology,
        }
    }

    fn child_not_ready(&self, slot: usize) -> &AtomicBool {
        self.child_not_ready
            .get(slot)
            .expect("arrival slots are always below the arrival fan-in")
    }
}

/// The MCS tree barrier.
///
/// Participants are arranged in two trees embedded in the same node array. In the 4-ary
/// arrival tree, each node waits until all its children have reported and then reports to its
/// parent. When the root's subtree has arrived, the 2-ary wakeup tree releases everyone from
/// the root downward.
///
/// Every flag has exactly one writer and one reader, and each participant only spins on flags
/// in its own node, so there is no hot spot shared by all participants.
///
/// # Example
///
/// ```
/// use std::thread;
///
/// use muster::{Barrier, Participant, TreeBarrier};
/// use new_zealand::nz;
///
/// let barrier = TreeBarrier::new(nz!(6));
///
/// let threads = (0..6)
///     .map(|index| barrier.participant(index).unwrap())
///     .map(|mut participant| thread::spawn(move || participant.arrive_and_wait()))
///     .collect::<Vec<_>>();
///
/// for thread in threads {
///     thread.join().unwrap();
/// }
///
/// assert_eq!(barrier.node(0).unwrap().arrival_child_count(), 4);
/// ```
#[derive(Debug)]
pub struct TreeBarrier {
    config: Config,
    nodes: Box<[Node]>,
    registry: Registry,
}

impl TreeBarrier {
    /// Creates a builder for configuring the barrier.
    #[must_use]
    pub fn builder() -> BarrierBuilder<Self> {
        BarrierBuilder::new()
    }

    /// Creates a barrier for `participants` participants with the default configuration.
    #[must_use]
    pub fn new(participants: NonZero<usize>) -> Arc<Self> {
        Arc::new(Self::with_config(Config::new(participants)))
    }

    /// The static wiring of node `id`, or `None` if there is no such participant.
    #[must_use]
    pub fn node(&self, id: usize) -> Option<TreeNode> {
        self.nodes.get(id).map(|node| node.topology)
    }

    fn node_at(&self, id: usize) -> &Node {
        self.nodes
            .get(id)
            .expect("node indexes come from the tree topology and are always in range")
    }

    fn arrive(&self, index: usize, local: &mut LocalState) -> u64 {
        let policy = self.config.wait_policy();

        // Flipping first lets consecutive generations use opposite flag values, so the wakeup
        // flags never need to be reset.
        local.sense = !local.sense;
        let sense = local.sense;

        let node = self.node_at(index);
        let mut polls: u64 = 0;

        for slot in 0..ARRIVAL_FAN_IN {
            if node.topology.has_child(slot) {
                let flag = node.child_not_ready(slot);
                polls = polls.saturating_add(wait_until(policy, || {
                    !flag.load(Ordering::Acquire)
                }));
            }
        }

        // Prepare for the next generation. The children cannot clear these again before they
        // are woken up, which happens after we report to our parent below.
        for slot in 0..ARRIVAL_FAN_IN {
            node.child_not_ready(slot)
                .store(node.topology.has_child(slot), Ordering::Relaxed);
        }

        // The root has nobody to report to and nobody to wait for. Once its subtree has
        // arrived, everyone has.
        if let Some(parent) = node.topology.arrival_parent() {
            self.node_at(parent.node())
                .child_not_ready(parent.slot())
                .store(false, Ordering::Release);

            polls = polls.saturating_add(wait_until(policy, || {
                node.parent_sense.load(Ordering::Acquire) == sense
            }));
        }

        for child in node.topology.wakeup_children().into_iter().flatten() {
            self.node_at(child)
                .parent_sense
                .store(sense, Ordering::Release);
        }

        polls
    }
}

impl Barrier for TreeBarrier {
    type Participant = TreeParticipant;

    fn with_config(config: Config) -> Self {
        let participants = config.participants();

        let nodes = (0..participants.get())
            .map(|id| Node::new(TreeNode::derive(id, participants)))
            .collect();

        debug!(
            algorithm = "tree",
            participants = participants.get(),
            "barrier initialized"
        );

        Self {
            config,
            nodes,
            registry: Registry::new(participants, LocalState::with_sense(false)),
        }
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn participant(self: &Arc<Self>, index: usize) -> Result<TreeParticipant> {
        let local = self.registry.claim(index)?;

        Ok(TreeParticipant {
            barrier: Arc::clone(self),
            index,
            local,
        })
    }
}

/// A participant in a [`TreeBarrier`].
#[derive(Debug)]
pub struct TreeParticipant {
    barrier: Arc<TreeBarrier>,
    index: usize,
    local: LocalState,
}

impl Participant for TreeParticipant {
    fn index(&self) -> usize {
        self.index
    }

    fn generation(&self) -> u64 {
        self.local.generation
    }

    fn arrive_and_wait(&mut self) {
        let polls = self.barrier.arrive(self.index, &mut self.local);
        self.local.finish_generation(self.index, polls);
    }
}

impl Drop for TreeParticipant {
    fn drop(&mut self) {
        self.barrier.registry.release(self.index, self.local);
    }
}
