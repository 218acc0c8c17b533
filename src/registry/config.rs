//! Registry configuration

/// Configuration for the room registry
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Keep a room's transcript after its last member leaves
    ///
    /// When disabled, the transcript is dropped together with the room. When
    /// enabled, it is archived under the room key and restored if the room
    /// is joined again.
    pub retain_transcripts: bool,
}

impl RegistryConfig {
    /// Set whether transcripts outlive their room
    pub fn retain_transcripts(mut self, retain: bool) -> Self {
        self.retain_transcripts = retain;
        self
    }
}
