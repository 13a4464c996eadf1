use std::fmt;

use crate::{model::FileId, tree::NodeId};

/// Change notification for presentation code (tree views, channel tables)
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A file was appended to the list of open files at `row`
    FileInserted {
        /// Row of the file below the tree root
        row: usize,
        /// The opened file
        file: FileId,
    },
    /// The file at `row` was closed. Its subtree is empty from now on.
    FileRemoved {
        /// Row the file occupied before it was removed
        row: usize,
        /// The closed file
        file: FileId,
    },
    /// The display fields (or check state) of a tree node changed
    NodeChanged(NodeId),
    /// Channels were appended to the channel table
    ChannelsInserted {
        /// Row of the first new channel
        first_row: usize,
        /// Number of new channels
        count: usize,
    },
    /// The channel at `row` was removed from the channel table
    ChannelRemoved {
        /// Row the channel occupied before it was removed
        row: usize,
        /// Label of the removed channel
        label: String,
    },
    /// The shown state or the style of a channel changed
    ChannelChanged {
        /// Row of the channel
        row: usize,
        /// Label of the channel
        label: String,
    },
    /// The set of selected channels changed
    SelectionChanged,
}

/// Identifies a subscription, so that it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&ModelEvent)>;

/// Callbacks notified of every [`ModelEvent`], in subscription order
#[derive(Default)]
pub struct Observers {
    callbacks: Vec<(SubscriptionId, Callback)>,
    next_id: u64,
}

impl Observers {
    /// No subscribers
    pub fn new() -> Self {
        Observers::default()
    }

    /// Call `callback` for every future event
    pub fn subscribe(&mut self, callback: Box<dyn FnMut(&ModelEvent)>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.callbacks.push((id, callback));

        id
    }

    /// Stop notifying the subscriber. Returns false if it had already unsubscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(subscription, _)| *subscription != id);

        self.callbacks.len() != before
    }

    /// Number of subscribers
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// True without subscribers
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Deliver `event` to every subscriber
    pub fn notify(&mut self, event: &ModelEvent) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(event);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.callbacks.len())
            .finish()
    }
}
