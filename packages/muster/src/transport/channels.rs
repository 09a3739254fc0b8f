use std::hint::spin_loop;
use std::iter;
use std::num::NonZero;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use parking_lot::Mutex;

use crate::WaitPolicy;
use crate::transport::{Address, Transport};

#[derive(Clone, Copy, Debug)]
struct Signal {
    slot: usize,
    sense: bool,
}

#[derive(Debug)]
struct Inbox {
    receiver: Receiver<Signal>,

    // The owner's view of its flags. Only updated by applying received signals, in the order
    // they were received.
    flags: Box<[bool]>,
}

impl Inbox {
    fn apply(&mut self, signal: Signal) {
        let flag = self
            .flags
            .get_mut(signal.slot)
            .expect("signals are only addressed to slots the transport was sized for");

        *flag = signal.sense;
    }

    fn flag(&self, slot: usize) -> bool {
        *self
            .flags
            .get(slot)
            .expect("waits are only addressed to slots the transport was sized for")
    }
}

/// Delivers signals as messages over one channel per participant.
///
/// This transport shares nothing between participants except the channels themselves: a
/// signal is a `(slot, sense)` message sent to the owner of the slot, and the owner applies
/// received messages to a private flag table while it waits. It behaves like a message-passing
/// runtime where each participant has a mailbox.
///
/// While waiting, a participant first polls its mailbox without blocking as directed by the
/// [`WaitPolicy`]. With [`WaitPolicy::SpinThenYield`], once the spin budget is used up it blocks
/// on the mailbox until the next message arrives instead of yielding.
#[derive(Debug)]
pub struct ChannelTransport {
    senders: Box<[Sender<Signal>]>,

    // Each inbox is only ever locked by its owner, so the lock is never contended.
    inboxes: Box<[Mutex<Inbox>]>,
}

impl Transport for ChannelTransport {
    fn connect(participants: NonZero<usize>, slots: usize) -> Self {
        let (senders, inboxes): (Vec<_>, Vec<_>) = iter::repeat_with(mpsc::channel)
            .take(participants.get())
            .map(|(sender, receiver)| {
                let inbox = Inbox {
                    receiver,
                    flags: vec![false; slots].into_boxed_slice(),
                };

                (sender, Mutex::new(inbox))
            })
            .unzip();

        Self {
            senders: senders.into_boxed_slice(),
            inboxes: inboxes.into_boxed_slice(),
        }
    }

    fn signal(&self, to: Address, sense: bool) {
        let sender = self
            .senders
            .get(to.participant())
            .expect("signals are only addressed to connected participants");

        sender
            .send(Signal {
                slot: to.slot(),
                sense,
            })
            .expect("the transport owns both ends of every channel");
    }

    fn wait(&self, at: Address, sense: bool, policy: WaitPolicy) -> u64 {
        let mut inbox = self
            .inboxes
            .get(at.participant())
            .expect("waits are only addressed to connected participants")
            .lock();

        let mut polls: u64 = 0;

        while inbox.flag(at.slot()) != sense {
            let may_spin = match policy {
                WaitPolicy::Spin => true,
                WaitPolicy::SpinThenYield { spins } => polls < u64::from(spins.get()),
            };

            let signal = if may_spin {
                match inbox.receiver.try_recv() {
                    Ok(signal) => signal,
                    Err(TryRecvError::Empty) => {
                        polls = polls.wrapping_add(1);
                        spin_loop();
                        continue;
                    }
                    Err(TryRecvError::Disconnected) => {
                        unreachable!("the transport owns both ends of every channel")
                    }
                }
            } else {
                polls = polls.wrapping_add(1);
                inbox
                    .receiver
                    .recv()
                    .expect("the transport owns both ends of every channel")
            };

            inbox.apply(signal);
        }

        polls
    }
}
