//! Mapping between logical channel names and transport channel names

use crate::config::RecorderSettings;

/// Role of a transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind<'a> {
    Control,
    Tracked(&'a str),
    Unknown,
}

/// Channel names for one owner. Transport names are `{owner}-{logical}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    owner_id: String,
    control: String,
    tracked: Vec<String>,
    snapshot: Option<String>,
}

impl ChannelLayout {
    pub fn new(owner_id: impl Into<String>, settings: &RecorderSettings) -> Self {
        Self {
            owner_id: owner_id.into(),
            control: settings.control_channel.clone(),
            tracked: settings.tracked_channels.clone(),
            snapshot: settings.snapshot_channel.clone(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn control(&self) -> &str {
        &self.control
    }

    pub fn tracked(&self) -> &[String] {
        &self.tracked
    }

    /// Channel whose length defines the number of events in a session
    pub fn primary(&self) -> &str {
        &self.tracked[0]
    }

    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    pub fn transport_name(&self, logical: &str) -> String {
        format!("{}-{}", self.owner_id, logical)
    }

    /// Transport names to subscribe to, control channel first
    pub fn subscriptions(&self) -> Vec<String> {
        std::iter::once(&self.control)
            .chain(self.tracked.iter())
            .map(|c| self.transport_name(c))
            .collect()
    }

    /// Classify a transport channel name
    pub fn classify<'a>(&'a self, transport_name: &str) -> ChannelKind<'a> {
        let Some(logical) = transport_name
            .strip_prefix(self.owner_id.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            return ChannelKind::Unknown;
        };
        if logical == self.control {
            return ChannelKind::Control;
        }
        self.tracked
            .iter()
            .find(|c| c.as_str() == logical)
            .map(|c| ChannelKind::Tracked(c.as_str()))
            .unwrap_or(ChannelKind::Unknown)
    }
}
