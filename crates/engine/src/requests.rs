//! Request tokens for the round-trips to the data source.
//!
//! Every tracked request gets a token from one monotonic counter. Per channel
//! only the latest token counts; anything older that comes back is stale.

use std::collections::{BTreeSet, HashMap};

use tensorlens_protocol::{HostEvent, RequestId};

/// Logical operation a request belongs to. At most one request per channel
/// is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Tensors,
    Slice,
    Search,
    Filter,
    Plot,
    Save,
    Dependencies,
    Entries,
    Preview,
}

impl Channel {
    /// Channel answered by an event. `error` events are resolved by token.
    pub fn for_event(event: &HostEvent) -> Option<Self> {
        match event {
            HostEvent::TensorData { .. } => Some(Self::Tensors),
            HostEvent::SliceData { .. } => Some(Self::Slice),
            HostEvent::SearchResults { .. } => Some(Self::Search),
            HostEvent::FilteredData { .. } => Some(Self::Filter),
            HostEvent::PlotData { .. } => Some(Self::Plot),
            HostEvent::SaveResponse { .. } => Some(Self::Save),
            HostEvent::DependencyStatus { .. } => Some(Self::Dependencies),
            HostEvent::ArchiveEntries { .. } => Some(Self::Entries),
            HostEvent::FilePreview { .. } => Some(Self::Preview),
            HostEvent::Error { .. } => None,
        }
    }

    /// Channels the provider also pushes on its own (on open, after a file
    /// change). Untokened events on these are always current.
    pub fn is_push(&self) -> bool {
        matches!(self, Self::Tensors | Self::Dependencies | Self::Entries)
    }
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    last_issued: RequestId,
    latest: HashMap<Channel, RequestId>,
    loading: BTreeSet<Channel>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request on `channel`, superseding any earlier one.
    pub fn issue(&mut self, channel: Channel) -> RequestId {
        self.last_issued += 1;
        let id = self.last_issued;
        if let Some(previous) = self.latest.insert(channel, id) {
            if self.loading.contains(&channel) {
                log::debug!("{channel:?} request {previous} superseded by {id}");
            }
        }
        self.loading.insert(channel);
        id
    }

    /// Decide whether a response on `channel` should be applied, and if so
    /// clear the channel's loading flag.
    ///
    /// A response with a token is accepted only if it is the latest issued.
    /// One without a token is accepted while the channel is loading, or at
    /// any time on a push channel.
    pub fn accept(&mut self, channel: Channel, id: Option<RequestId>) -> bool {
        let fresh = match id {
            Some(id) => self.latest.get(&channel) == Some(&id),
            None => channel.is_push() || self.loading.contains(&channel),
        };
        if fresh {
            self.loading.remove(&channel);
        } else {
            log::info!("dropping stale {channel:?} response (token {id:?})");
        }
        fresh
    }

    /// Resolve an `error` event. With a token, the channel that token belongs
    /// to is resolved (stale tokens resolve nothing). Without one, every
    /// loading flag but the save's is cleared: a save is always answered by
    /// its own `saveResponse`.
    pub fn resolve_error(&mut self, id: Option<RequestId>) -> ErrorScope {
        match id {
            Some(id) => {
                let channel = self
                    .latest
                    .iter()
                    .find(|(_, &latest)| latest == id)
                    .map(|(&channel, _)| channel);
                match channel {
                    Some(channel) if self.loading.remove(&channel) => ErrorScope::Channel(channel),
                    _ => {
                        log::info!("dropping stale error response (token {id})");
                        ErrorScope::Stale
                    }
                }
            }
            None => {
                self.loading.retain(|&channel| channel == Channel::Save);
                ErrorScope::Unknown
            }
        }
    }

    /// Forget the current request on `channel`; whatever it returns is dropped.
    pub fn cancel(&mut self, channel: Channel) {
        if self.loading.remove(&channel) {
            log::debug!("cancelled in-flight {channel:?} request");
        }
        self.latest.remove(&channel);
    }

    pub fn is_loading(&self, channel: Channel) -> bool {
        self.loading.contains(&channel)
    }

    pub fn any_loading(&self) -> bool {
        !self.loading.is_empty()
    }

    pub fn latest(&self, channel: Channel) -> Option<RequestId> {
        self.latest.get(&channel).copied()
    }
}

/// What an `error` event turned out to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Channel(Channel),
    /// Answer to a superseded or cancelled request.
    Stale,
    /// No token: applies to whatever was going on.
    Unknown,
}
