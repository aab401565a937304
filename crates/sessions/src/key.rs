use voltaic_common::types::ChannelType;

/// Stable key identifying one conversation thread on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub channel: ChannelType,
    pub peer: String,
    pub thread: String,
}

impl SessionKey {
    #[must_use]
    pub fn new(
        channel: ChannelType,
        peer: impl Into<String>,
        thread: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            peer: peer.into(),
            thread: thread.into(),
        }
    }

    /// Sanitize the key for use as a filename.
    #[must_use]
    pub fn to_filename(&self) -> String {
        self.to_string().replace([':', '/', '@'], "_")
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.channel, self.peer, self.thread)
    }
}
