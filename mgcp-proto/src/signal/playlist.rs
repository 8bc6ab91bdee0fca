//! Ordered, finite audio-segment iterator with a repeat count (§4.7).
//!
//! Not thread-safe; the owning signal serializes access, same as the teacher's `IdxSet` is only
//! ever touched from behind the `Server`'s single lock at a time.

/// An ordered sequence of audio segment URIs, played `repeat_count` times in full before
/// exhausting.
#[derive(Debug, Clone)]
pub struct Playlist {
    segments: Vec<String>,
    repeat_count: u32,
    cursor: usize,
    rounds_played: u32,
}

impl Playlist {
    pub fn new(segments: Vec<String>, repeat_count: u32) -> Self {
        Self { segments, repeat_count, cursor: 0, rounds_played: 0 }
    }

    /// A playlist with no segments to play, e.g. an unset prompt parameter.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() || self.repeat_count == 0
    }

    /// Returns the next segment URI, or `None` once `segments` has been played `repeat_count`
    /// times in total.
    pub fn next(&mut self) -> Option<&str> {
        if self.is_empty() || self.rounds_played >= self.repeat_count {
            return None;
        }
        let uri = &self.segments[self.cursor];
        self.cursor += 1;
        if self.cursor == self.segments.len() {
            self.cursor = 0;
            self.rounds_played += 1;
        }
        Some(uri)
    }

    /// Repositions to the start of the first round, as if nothing had been played yet.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.rounds_played = 0;
    }

    /// The segment the cursor is currently positioned at (for `psk` position jumps), without
    /// advancing.
    pub fn current(&self) -> Option<&str> {
        self.segments.get(self.cursor).map(String::as_str)
    }

    pub fn jump_first(&mut self) {
        self.cursor = 0;
    }

    pub fn jump_last(&mut self) {
        if !self.segments.is_empty() {
            self.cursor = self.segments.len() - 1;
        }
    }

    pub fn jump_prev(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn jump_next(&mut self) {
        if self.cursor + 1 < self.segments.len() {
            self.cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("seg{i}")).collect()
    }

    #[test]
    fn empty_when_no_segments() {
        assert!(Playlist::new(vec![], 3).is_empty());
    }

    #[test]
    fn empty_when_zero_repeat_count() {
        assert!(Playlist::new(segs(2), 0).is_empty());
    }

    #[test]
    fn iterates_segments_then_exhausts() {
        let mut pl = Playlist::new(segs(2), 1);
        assert_eq!(pl.next(), Some("seg0"));
        assert_eq!(pl.next(), Some("seg1"));
        assert_eq!(pl.next(), None);
    }

    #[test]
    fn repeats_full_sequence_repeat_count_times() {
        let mut pl = Playlist::new(segs(2), 2);
        let got: Vec<_> = std::iter::from_fn(|| pl.next().map(String::from)).collect();
        assert_eq!(got, vec!["seg0", "seg1", "seg0", "seg1"]);
    }

    #[test]
    fn reset_replays_from_start() {
        let mut pl = Playlist::new(segs(2), 1);
        pl.next();
        pl.next();
        assert_eq!(pl.next(), None);
        pl.reset();
        assert_eq!(pl.next(), Some("seg0"));
    }

    proptest::proptest! {
        #[test]
        fn total_yields_equals_segments_times_repeat(n in 0usize..6, r in 0u32..4) {
            let mut pl = Playlist::new(segs(n), r);
            let mut count = 0;
            while pl.next().is_some() {
                count += 1;
            }
            prop_assert_eq!(count, n * r as usize);
        }
    }
}
