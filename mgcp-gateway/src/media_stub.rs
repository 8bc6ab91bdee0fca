//! Default `Player`/`DtmfDetector` implementations used when no real media engine is wired in
//! (§1: audio decoding and RTP transport are external collaborators this controller never touches
//! directly).
//!
//! `gatewayd` falls back to these so the mediator and signal framework can be exercised — and
//! `mgcp-probe` can be driven — without a live RTP stack attached. A real deployment replaces
//! `NullMediaFactory` with one backed by the actual media engine.

use async_trait::async_trait;

use mgcp_proto::media::{DtmfDetector, DtmfTone, PlaybackOutcome, Player};

use crate::facade::MediaFactory;

/// Plays every segment as an immediate, uninterrupted no-op. Good enough to exercise prompt
/// sequencing without a real audio path.
pub struct NullPlayer;

#[async_trait]
impl Player for NullPlayer {
    async fn play(&mut self, _uri: &str) -> std::io::Result<PlaybackOutcome> {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(PlaybackOutcome::Finished)
    }

    fn stop(&mut self) {}
}

/// Never produces a tone. Represents "no DTMF source attached" rather than "tones observed, all
/// silence" — `next_tone` simply never resolves until the signal detaches it on completion.
pub struct NullDetector;

#[async_trait]
impl DtmfDetector for NullDetector {
    async fn next_tone(&mut self) -> Option<DtmfTone> {
        std::future::pending().await
    }

    fn clear_buffer(&mut self) {}

    fn detach(&mut self) {}
}

pub struct NullMediaFactory;

impl MediaFactory for NullMediaFactory {
    fn player(&self) -> Box<dyn Player> {
        Box::new(NullPlayer)
    }

    fn detector(&self) -> Box<dyn DtmfDetector> {
        Box::new(NullDetector)
    }
}
