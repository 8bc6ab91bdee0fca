//! External collaborators supplied by the underlying RTP/media engine (§1 Out of scope).
//!
//! Only the capabilities signals need are modeled here: playing a playlist of announcement URIs,
//! and detecting DTMF tones on the endpoint's media stream. Audio decoding and RTP transport
//! themselves are the media engine's job, not this controller's.

use async_trait::async_trait;

/// A DTMF tone, or one of the pseudo-events the collector reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtmfTone {
    Digit(char),
}

impl DtmfTone {
    pub fn as_char(&self) -> char {
        match self {
            DtmfTone::Digit(c) => *c,
        }
    }
}

/// Plays a sequence of announcement URIs on an endpoint's media stream.
///
/// Supplied by the underlying media engine; this controller only ever calls `play`/`stop` and
/// awaits completion.
#[async_trait]
pub trait Player: Send {
    /// Starts playing `uri`. Resolves when playback of this single segment finishes normally.
    /// A `stop` call while this future is outstanding must make it resolve with
    /// `Ok(PlaybackOutcome::Stopped)` instead of hanging.
    async fn play(&mut self, uri: &str) -> std::io::Result<PlaybackOutcome>;

    /// Aborts any in-progress playback immediately.
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Stopped,
}

/// Detects DTMF tones on an endpoint's media stream.
///
/// Supplied by the underlying media engine. The detector is exclusively owned by the currently
/// active signal on an endpoint (§5); detaching it releases that ownership.
#[async_trait]
pub trait DtmfDetector: Send {
    /// Waits for the next tone. `None` means the detector was detached while waiting.
    async fn next_tone(&mut self) -> Option<DtmfTone>;

    /// Discards any buffered-but-undelivered tones (the `cb` / clear-digit-buffer parameter).
    fn clear_buffer(&mut self);

    /// Releases the detector so a future signal can attach its own.
    fn detach(&mut self);
}

/// Lets a boxed trait object stand in for a concrete `Player`, so `PlayCollect` can be built
/// generically over whatever `MediaFactory` hands the facade at activation time.
#[async_trait]
impl Player for Box<dyn Player> {
    async fn play(&mut self, uri: &str) -> std::io::Result<PlaybackOutcome> {
        self.as_mut().play(uri).await
    }

    fn stop(&mut self) {
        self.as_mut().stop()
    }
}

/// Lets a boxed trait object stand in for a concrete `DtmfDetector`, mirroring `Player`'s blanket
/// impl above.
#[async_trait]
impl DtmfDetector for Box<dyn DtmfDetector> {
    async fn next_tone(&mut self) -> Option<DtmfTone> {
        self.as_mut().next_tone().await
    }

    fn clear_buffer(&mut self) {
        self.as_mut().clear_buffer()
    }

    fn detach(&mut self) {
        self.as_mut().detach()
    }
}
