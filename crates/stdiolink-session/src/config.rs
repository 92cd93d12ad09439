use stdiolink_frame::FrameConfig;

/// Default question asked when the worker reports unsaved changes.
pub const DEFAULT_QUIT_QUESTION: &str = "The back-end has unsaved changes. Discard them and quit?";

/// Session behaviour configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Framing for both directions.
    pub frame: FrameConfig,
    /// Question put to the operator on `QUIT_UNSAVED?`.
    pub quit_question: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            quit_question: DEFAULT_QUIT_QUESTION.to_string(),
        }
    }
}
