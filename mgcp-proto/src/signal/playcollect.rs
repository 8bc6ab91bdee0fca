//! The `PlayCollect` signal state machine (§4.6): prompt sequencing, digit collection, pattern
//! matching, attempt accounting and result notification.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::digitmap::DigitMap;
use crate::error::MgcpError;
use crate::media::{DtmfDetector, DtmfTone, PlaybackOutcome, Player};
use crate::message::MgcpCommandParameterType as P;
use crate::signal::playlist::Playlist;
use crate::signal::{CancelToken, Signal, SignalCompletion, SignalId, SignalType};

/// A single 100ms timer tick, the unit every `PlayCollect` timer parameter is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticks(pub u32);

impl Ticks {
    pub fn to_duration(self) -> Duration {
        Duration::from_millis(u64::from(self.0) * 100)
    }
}

/// Parsed, defaulted `PlayCollect` parameters (§4.6's parameter table).
#[derive(Debug, Clone)]
pub struct PlayCollectParams {
    pub initial_prompt: Vec<String>,
    pub reprompt: Vec<String>,
    pub no_digits_reprompt: Vec<String>,
    pub failure_announcement: Vec<String>,
    pub success_announcement: Vec<String>,
    pub non_interruptible: bool,
    pub clear_digit_buffer: bool,
    pub num_attempts: u32,
    pub min_digits: u32,
    /// `None` in digit-pattern mode (no fixed upper bound; `eik`/`idt` govern instead).
    pub max_digits: Option<u32>,
    pub digit_pattern: Option<DigitMap>,
    pub first_digit_timer: Ticks,
    pub inter_digit_timer: Ticks,
    pub extra_digit_timer: Option<Ticks>,
    pub restart_key: Option<char>,
    pub reinput_key: Option<char>,
    pub return_key: Option<char>,
    /// `psk` — one or more DTMF keys bound to a named jump on the playlist currently playing
    /// (`fst`/`lst`/`prv`/`nxt`/`cur`). Parsed by [`parse_position_keys`].
    pub position_keys: BTreeMap<char, PositionAction>,
    pub stop_key: Option<char>,
    pub start_input_keys: Vec<char>,
    pub end_input_key: Option<char>,
    pub include_end_key: bool,
}

impl Default for PlayCollectParams {
    fn default() -> Self {
        Self {
            initial_prompt: Vec::new(),
            reprompt: Vec::new(),
            no_digits_reprompt: Vec::new(),
            failure_announcement: Vec::new(),
            success_announcement: Vec::new(),
            non_interruptible: false,
            clear_digit_buffer: false,
            num_attempts: 1,
            min_digits: 1,
            max_digits: Some(1),
            digit_pattern: None,
            first_digit_timer: Ticks(50),
            inter_digit_timer: Ticks(30),
            extra_digit_timer: None,
            restart_key: None,
            reinput_key: None,
            return_key: None,
            position_keys: BTreeMap::new(),
            stop_key: None,
            start_input_keys: ('0'..='9').collect(),
            end_input_key: Some('#'),
            include_end_key: false,
        }
    }
}

fn split_uris(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_bool(s: &str) -> bool {
    matches!(s, "true" | "1" | "yes" | "on")
}

fn parse_key(s: &str) -> Option<char> {
    if s.eq_ignore_ascii_case("null") || s.is_empty() {
        None
    } else {
        s.chars().next()
    }
}

/// A named jump target for `psk`, applied to the playlist currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionAction {
    First,
    Last,
    Prev,
    Next,
    /// Replay the segment about to play; no reposition needed.
    Current,
}

/// Parses `psk`'s value as a comma-separated list of `key:action` (or `key=action`) pairs, e.g.
/// `"1:fst,2:lst,3:prv,4:nxt,5:cur"`. Entries that don't parse are skipped rather than rejected,
/// since `psk` itself is already a recognized, validated parameter by the time this runs.
fn parse_position_keys(s: &str) -> BTreeMap<char, PositionAction> {
    let mut keys = BTreeMap::new();
    for entry in s.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((key, action)) = entry.split_once(':').or_else(|| entry.split_once('=')) else {
            continue;
        };
        let Some(key) = key.trim().chars().next() else {
            continue;
        };
        let action = match action.trim().to_ascii_lowercase().as_str() {
            "fst" => PositionAction::First,
            "lst" => PositionAction::Last,
            "prv" => PositionAction::Prev,
            "nxt" => PositionAction::Next,
            "cur" => PositionAction::Current,
            _ => continue,
        };
        keys.insert(key, action);
    }
    keys
}

fn apply_position_jump(playlist: &mut Playlist, action: PositionAction) {
    match action {
        PositionAction::First => playlist.jump_first(),
        PositionAction::Last => playlist.jump_last(),
        PositionAction::Prev => playlist.jump_prev(),
        PositionAction::Next => playlist.jump_next(),
        PositionAction::Current => {}
    }
}

impl PlayCollectParams {
    /// Parses and defaults parameters out of a raw transport-level parameter map. Any key outside
    /// the declared vocabulary (`MgcpCommandParameterType::Unknown`) is rejected with 538 before
    /// any signal is constructed (§6, §9's "unknown parameter" rule).
    pub fn parse(raw: &BTreeMap<P, String>) -> Result<Self, MgcpError> {
        let mut params = PlayCollectParams::default();

        for key in raw.keys() {
            if let P::Unknown(name) = key {
                return Err(MgcpError::UnknownParameter(name.clone()));
            }
        }

        if let Some(v) = raw.get(&P::InitialPrompt) {
            params.initial_prompt = split_uris(v);
        }
        params.reprompt =
            raw.get(&P::Reprompt).map(|v| split_uris(v)).unwrap_or_else(|| params.initial_prompt.clone());
        params.no_digits_reprompt =
            raw.get(&P::NoDigitsReprompt).map(|v| split_uris(v)).unwrap_or_else(|| params.reprompt.clone());
        if let Some(v) = raw.get(&P::FailureAnnouncement) {
            params.failure_announcement = split_uris(v);
        }
        // §9 open question: the source read the `fa` key here. This reads `sa`, as specified.
        if let Some(v) = raw.get(&P::SuccessAnnouncement) {
            params.success_announcement = split_uris(v);
        }
        if let Some(v) = raw.get(&P::NonInterruptible) {
            params.non_interruptible = parse_bool(v);
        }
        if let Some(v) = raw.get(&P::ClearDigitBuffer) {
            params.clear_digit_buffer = parse_bool(v);
        }
        if let Some(v) = raw.get(&P::NumAttempts) {
            params.num_attempts = v.parse().map_err(|_| MgcpError::ProtocolError)?;
        }

        let explicit_mn = raw.get(&P::MinDigits);
        let explicit_mx = raw.get(&P::MaxDigits);
        let explicit_dp = raw.get(&P::DigitPattern);

        if explicit_dp.is_some() && (explicit_mn.is_some() || explicit_mx.is_some()) {
            // Invariant 3: digitPattern is mutually exclusive with explicit digit counts.
            return Err(MgcpError::ProtocolError);
        }

        if let Some(v) = explicit_mn {
            params.min_digits = v.parse().map_err(|_| MgcpError::ProtocolError)?;
        }
        if let Some(v) = explicit_mx {
            params.max_digits = Some(v.parse().map_err(|_| MgcpError::ProtocolError)?);
        }
        if let Some(v) = explicit_dp {
            params.digit_pattern = Some(DigitMap::compile(v)?);
            params.max_digits = None;
        }

        if let (Some(max), _) = (params.max_digits, ()) {
            if params.min_digits > max {
                return Err(MgcpError::ProtocolError);
            }
        }

        if let Some(v) = raw.get(&P::FirstDigitTimer) {
            params.first_digit_timer = Ticks(v.parse().map_err(|_| MgcpError::ProtocolError)?);
        }
        if let Some(v) = raw.get(&P::InterDigitTimer) {
            params.inter_digit_timer = Ticks(v.parse().map_err(|_| MgcpError::ProtocolError)?);
        }
        // §9 open question: an unset `edt` must disable the extra-digit timer, not fail to parse
        // an empty string as an integer.
        if let Some(v) = raw.get(&P::ExtraDigitTimer) {
            if !v.is_empty() {
                params.extra_digit_timer = Some(Ticks(v.parse().map_err(|_| MgcpError::ProtocolError)?));
            }
        }

        if let Some(v) = raw.get(&P::RestartKey) {
            params.restart_key = parse_key(v);
        }
        if let Some(v) = raw.get(&P::ReinputKey) {
            params.reinput_key = parse_key(v);
        }
        if let Some(v) = raw.get(&P::ReturnKey) {
            params.return_key = parse_key(v);
        }
        if let Some(v) = raw.get(&P::PositionKey) {
            params.position_keys = parse_position_keys(v);
        }
        if let Some(v) = raw.get(&P::StopKey) {
            params.stop_key = parse_key(v);
        }
        if let Some(v) = raw.get(&P::StartInputKeys) {
            params.start_input_keys = v.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
        }
        if let Some(v) = raw.get(&P::EndInputKey) {
            params.end_input_key = parse_key(v);
        }
        if let Some(v) = raw.get(&P::IncludeEndKey) {
            params.include_end_key = parse_bool(v);
        }

        Ok(params)
    }

    pub fn is_parameter_supported(name: &str) -> bool {
        !matches!(P::parse(name), P::Unknown(_))
    }

    /// Like `parse`, but falls back to the gateway's configured `fdt`/`idt` defaults — rather than
    /// this type's own hardcoded ones — whenever the request didn't supply them (§9 ambient
    /// config: "per-request overridable").
    pub fn parse_with_timer_defaults(
        raw: &BTreeMap<P, String>,
        first_digit_timer: Ticks,
        inter_digit_timer: Ticks,
    ) -> Result<Self, MgcpError> {
        let mut params = Self::parse(raw)?;
        if !raw.contains_key(&P::FirstDigitTimer) {
            params.first_digit_timer = first_digit_timer;
        }
        if !raw.contains_key(&P::InterDigitTimer) {
            params.inter_digit_timer = inter_digit_timer;
        }
        Ok(params)
    }
}

/// Which prompt a `Reprompting` cycle plays, and why we entered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepromptCause {
    NoDigits,
    ValidationFailed,
    RestartKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Prompting,
    CollectingFirst,
    CollectingSubsequent,
    Reprompting,
    AnnouncingSuccess,
    AnnouncingFailure,
    Terminal,
}

enum PromptOutcome {
    Finished,
    InterruptedBySik(char),
    InterruptedByStop,
    Canceled,
}

/// The `PlayCollect` signal, generic over the media-engine collaborators it plays through and
/// listens to.
pub struct PlayCollect<Pl: Player, D: DtmfDetector> {
    id: SignalId,
    params: PlayCollectParams,
    player: Pl,
    detector: D,
    executing: bool,
    cancel: CancelToken,
    phase: Phase,
    sequence: String,
    attempts: u32,
    extra_digit_mode: bool,
    pending_failure: Option<MgcpError>,
}

impl<Pl: Player, D: DtmfDetector> PlayCollect<Pl, D> {
    pub fn new(params: PlayCollectParams, player: Pl, detector: D) -> Self {
        Self {
            id: SignalId::new("AU", "pc"),
            params,
            player,
            detector,
            executing: false,
            cancel: CancelToken::new(),
            phase: Phase::Idle,
            sequence: String::new(),
            attempts: 0,
            extra_digit_mode: false,
            pending_failure: None,
        }
    }

    fn is_end_key(&self, tone: char) -> bool {
        self.params.end_input_key == Some(tone)
    }

    async fn play_prompt(&mut self, uris: &[String], interruptible: bool) -> PromptOutcome {
        if uris.is_empty() {
            return PromptOutcome::Finished;
        }
        if self.params.clear_digit_buffer {
            self.detector.clear_buffer();
        }
        let mut playlist = Playlist::new(uris.to_vec(), 1);
        while let Some(uri) = playlist.next().map(str::to_string) {
            if !interruptible {
                tokio::select! {
                    biased;
                    _ = self.cancel.canceled() => return PromptOutcome::Canceled,
                    _ = self.player.play(&uri) => {}
                }
                continue;
            }

            tokio::select! {
                biased;
                _ = self.cancel.canceled() => return PromptOutcome::Canceled,
                tone = self.detector.next_tone() => {
                    self.player.stop();
                    return match tone {
                        Some(DtmfTone::Digit(c)) if Some(c) == self.params.stop_key => PromptOutcome::InterruptedByStop,
                        Some(DtmfTone::Digit(c)) if self.params.start_input_keys.contains(&c) => PromptOutcome::InterruptedBySik(c),
                        Some(DtmfTone::Digit(c)) if self.params.position_keys.contains_key(&c) => {
                            let action = self.params.position_keys[&c];
                            apply_position_jump(&mut playlist, action);
                            continue;
                        }
                        _ => continue,
                    };
                }
                outcome = self.player.play(&uri) => {
                    if let Ok(PlaybackOutcome::Stopped) = outcome {
                        return PromptOutcome::InterruptedByStop;
                    }
                }
            }
        }
        PromptOutcome::Finished
    }

    /// `trailing_end_key` is the key that just terminated collection, if VALIDATE was reached via
    /// an end-input-key press rather than a timer or max-digit tick. Digit maps routinely spell
    /// the end key into the pattern itself (`"xxx#"`), so a pattern match is tried both against
    /// the sequence as collected and with that key appended.
    fn validate(&self, trailing_end_key: Option<char>) -> Result<(), MgcpError> {
        if let Some(pattern) = &self.params.digit_pattern {
            let with_key = trailing_end_key.map(|c| format!("{}{}", self.sequence, c));
            if pattern.matches(&self.sequence) || with_key.as_deref().is_some_and(|s| pattern.matches(s)) {
                Ok(())
            } else {
                Err(MgcpError::PatternNotMatched)
            }
        } else if self.sequence.is_empty() {
            Err(MgcpError::NoDigitsCollected)
        } else {
            let max = self.params.max_digits.unwrap_or(u32::MAX);
            let len = self.sequence.chars().count() as u32;
            if len < self.params.min_digits {
                Err(MgcpError::TooFewDigits)
            } else if len > max {
                Err(MgcpError::PatternNotMatched)
            } else {
                Ok(())
            }
        }
    }

    fn reported_digits(&self, included_end_key: Option<char>) -> String {
        match included_end_key {
            Some(c) if self.params.include_end_key => format!("{}{}", self.sequence, c),
            _ => self.sequence.clone(),
        }
    }

    async fn run_inner(&mut self) -> Option<SignalCompletion> {
        let mut reprompt_cause = RepromptCause::NoDigits;

        loop {
            if self.cancel.is_canceled() {
                return None;
            }

            match self.phase {
                Phase::Idle => {
                    self.phase =
                        if self.params.initial_prompt.is_empty() { Phase::CollectingFirst } else { Phase::Prompting };
                }

                Phase::Prompting => {
                    let uris = self.params.initial_prompt.clone();
                    match self.play_prompt(&uris, !self.params.non_interruptible).await {
                        PromptOutcome::Canceled => return None,
                        PromptOutcome::Finished => self.phase = Phase::CollectingFirst,
                        PromptOutcome::InterruptedByStop => self.phase = Phase::CollectingFirst,
                        PromptOutcome::InterruptedBySik(tone) => {
                            self.sequence.push(tone);
                            self.phase = Phase::CollectingSubsequent;
                        }
                    }
                }

                Phase::CollectingFirst => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.canceled() => return None,
                        _ = tokio::time::sleep(self.params.first_digit_timer.to_duration()) => {
                            self.attempts += 1;
                            if self.attempts >= self.params.num_attempts {
                                self.pending_failure = Some(MgcpError::NoDigitsCollected);
                                self.phase = Phase::AnnouncingFailure;
                            } else {
                                reprompt_cause = RepromptCause::NoDigits;
                                self.phase = Phase::Reprompting;
                            }
                        }
                        tone = self.detector.next_tone() => {
                            if let Some(DtmfTone::Digit(c)) = tone {
                                if self.params.start_input_keys.contains(&c) {
                                    self.sequence.clear();
                                    self.sequence.push(c);
                                    self.phase = Phase::CollectingSubsequent;
                                }
                            }
                        }
                    }
                }

                Phase::CollectingSubsequent => {
                    let timer =
                        if self.extra_digit_mode { self.params.extra_digit_timer } else { Some(self.params.inter_digit_timer) };
                    let timer_fut = async {
                        match timer {
                            Some(t) => tokio::time::sleep(t.to_duration()).await,
                            None => std::future::pending::<()>().await,
                        }
                    };

                    tokio::select! {
                        biased;
                        _ = self.cancel.canceled() => return None,
                        _ = timer_fut => {
                            match self.validate(None) {
                                Ok(()) => self.phase = Phase::AnnouncingSuccess,
                                Err(e) => {
                                    self.attempts += 1;
                                    if self.attempts < self.params.num_attempts {
                                        reprompt_cause = RepromptCause::ValidationFailed;
                                        self.phase = Phase::Reprompting;
                                    } else {
                                        self.pending_failure = Some(e);
                                        self.phase = Phase::AnnouncingFailure;
                                    }
                                }
                            }
                        }
                        tone = self.detector.next_tone() => {
                            if let Some(DtmfTone::Digit(c)) = tone {
                                self.handle_subsequent_digit(c, &mut reprompt_cause);
                            }
                        }
                    }
                }

                Phase::Reprompting => {
                    let uris = match reprompt_cause {
                        RepromptCause::NoDigits => self.params.no_digits_reprompt.clone(),
                        RepromptCause::ValidationFailed | RepromptCause::RestartKey => self.params.reprompt.clone(),
                    };
                    match self.play_prompt(&uris, true).await {
                        PromptOutcome::Canceled => return None,
                        _ => {
                            self.extra_digit_mode = false;
                            self.phase = Phase::CollectingFirst;
                        }
                    }
                }

                Phase::AnnouncingSuccess => {
                    let uris = self.params.success_announcement.clone();
                    if matches!(self.play_prompt(&uris, false).await, PromptOutcome::Canceled) {
                        return None;
                    }
                    let digits = self.reported_digits(self.params.end_input_key);
                    self.phase = Phase::Terminal;
                    return Some(SignalCompletion::OperationComplete {
                        symbol: self.id.symbol.clone(),
                        code: 100,
                        params: [("dc".to_string(), digits), ("ni".to_string(), (self.attempts + 1).to_string())]
                            .into_iter()
                            .collect(),
                    });
                }

                Phase::AnnouncingFailure => {
                    let uris = self.params.failure_announcement.clone();
                    if matches!(self.play_prompt(&uris, false).await, PromptOutcome::Canceled) {
                        return None;
                    }
                    let err = self.pending_failure.take().unwrap_or(MgcpError::NoDigitsCollected);
                    self.phase = Phase::Terminal;
                    return Some(self.failure(err));
                }

                Phase::Terminal => return None,
            }
        }
    }

    fn handle_subsequent_digit(&mut self, c: char, reprompt_cause: &mut RepromptCause) {
        if Some(c) == self.params.return_key {
            self.phase = Phase::AnnouncingSuccess;
            return;
        }
        if Some(c) == self.params.restart_key {
            self.sequence.clear();
            self.extra_digit_mode = false;
            self.attempts += 1;
            if self.attempts >= self.params.num_attempts {
                self.pending_failure = Some(MgcpError::NoDigitsCollected);
                self.phase = Phase::AnnouncingFailure;
            } else {
                *reprompt_cause = RepromptCause::RestartKey;
                self.phase = Phase::Reprompting;
            }
            return;
        }
        if Some(c) == self.params.reinput_key {
            self.sequence.clear();
            self.extra_digit_mode = false;
            self.phase = Phase::CollectingFirst;
            return;
        }
        if self.is_end_key(c) {
            if self.sequence.chars().count() as u32 >= self.params.min_digits || self.params.digit_pattern.is_some() {
                self.finish_collection(reprompt_cause, Some(c));
            }
            return;
        }
        self.sequence.push(c);
        if let Some(max) = self.params.max_digits {
            if self.sequence.chars().count() as u32 >= max {
                if self.params.extra_digit_timer.is_some() {
                    self.extra_digit_mode = true;
                } else {
                    self.finish_collection(reprompt_cause, None);
                }
            }
        }
    }

    /// Runs VALIDATE against the sequence collected so far and transitions out of
    /// `CollectingSubsequent` accordingly, applying the same attempt accounting as the
    /// timer-driven path.
    fn finish_collection(&mut self, reprompt_cause: &mut RepromptCause, trailing_end_key: Option<char>) {
        match self.validate(trailing_end_key) {
            Ok(()) => self.phase = Phase::AnnouncingSuccess,
            Err(e) => {
                self.attempts += 1;
                if self.attempts < self.params.num_attempts {
                    *reprompt_cause = RepromptCause::ValidationFailed;
                    self.phase = Phase::Reprompting;
                } else {
                    self.pending_failure = Some(e);
                    self.phase = Phase::AnnouncingFailure;
                }
            }
        }
    }

    fn failure(&self, err: MgcpError) -> SignalCompletion {
        SignalCompletion::OperationFailed {
            symbol: self.id.symbol.clone(),
            code: err.code(),
            params: [("ni".to_string(), self.attempts.to_string())].into_iter().collect(),
        }
    }
}

#[async_trait]
impl<Pl: Player, D: DtmfDetector> Signal for PlayCollect<Pl, D> {
    fn id(&self) -> &SignalId {
        &self.id
    }

    fn signal_type(&self) -> SignalType {
        SignalType::TimeOut
    }

    fn is_executing(&self) -> bool {
        self.executing
    }

    fn is_parameter_supported(&self, name: &str) -> bool {
        PlayCollectParams::is_parameter_supported(name)
    }

    fn start(&mut self) -> Result<(), MgcpError> {
        if self.executing {
            return Err(MgcpError::AlreadyExecuting);
        }
        self.executing = true;
        Ok(())
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    async fn run(&mut self) -> Option<SignalCompletion> {
        let result = self.run_inner().await;
        self.detector.detach();
        self.player.stop();
        self.executing = false;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Plays every URI instantly, recording how many segments it was asked to play.
    struct InstantPlayer {
        played: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Player for InstantPlayer {
        async fn play(&mut self, _uri: &str) -> std::io::Result<PlaybackOutcome> {
            self.played.fetch_add(1, Ordering::SeqCst);
            Ok(PlaybackOutcome::Finished)
        }
        fn stop(&mut self) {}
    }

    /// Plays each URI after a delay, recording the order segments actually finished playing (a
    /// segment interrupted mid-play, e.g. by a `psk` jump, is never recorded).
    struct SlowPlayer {
        delay: Duration,
        played: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Player for SlowPlayer {
        async fn play(&mut self, uri: &str) -> std::io::Result<PlaybackOutcome> {
            tokio::time::sleep(self.delay).await;
            self.played.lock().unwrap().push(uri.to_string());
            Ok(PlaybackOutcome::Finished)
        }
        fn stop(&mut self) {}
    }

    /// One scripted reply to a `next_tone` call: either a digit after a delay, or a call that
    /// never resolves (so whatever timer it is racing against in the state machine's `select!`
    /// always wins it).
    enum Step {
        Tone(Duration, char),
        Never,
    }

    /// Delivers one scripted `Step` per call. Each call consumes the next step up front, so a step
    /// that loses its race (its branch gets dropped when a timer fires first) is still spent —
    /// the following call gets the next step in line, modeling a fresh detector wait each round.
    struct ScriptedDetector {
        steps: VecDeque<Step>,
        cleared: Arc<AtomicUsize>,
    }

    impl ScriptedDetector {
        fn new(tones: impl IntoIterator<Item = (u64, char)>) -> Self {
            Self {
                steps: tones.into_iter().map(|(ms, c)| Step::Tone(Duration::from_millis(ms), c)).collect(),
                cleared: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_steps(steps: impl IntoIterator<Item = Step>) -> Self {
            Self { steps: steps.into_iter().collect(), cleared: Arc::new(AtomicUsize::new(0)) }
        }
    }

    #[async_trait]
    impl DtmfDetector for ScriptedDetector {
        async fn next_tone(&mut self) -> Option<DtmfTone> {
            match self.steps.pop_front() {
                Some(Step::Tone(delay, c)) => {
                    tokio::time::sleep(delay).await;
                    Some(DtmfTone::Digit(c))
                }
                Some(Step::Never) | None => std::future::pending().await,
            }
        }
        fn clear_buffer(&mut self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
        fn detach(&mut self) {}
    }

    fn player() -> InstantPlayer {
        InstantPlayer { played: Arc::new(AtomicUsize::new(0)) }
    }

    fn completion_params(completion: &SignalCompletion) -> &BTreeMap<String, String> {
        match completion {
            SignalCompletion::OperationComplete { params, .. } => params,
            SignalCompletion::OperationFailed { params, .. } => params,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_stops_at_max_digits() {
        let params = PlayCollectParams { min_digits: 3, max_digits: Some(3), ..Default::default() };
        let detector = ScriptedDetector::new([(10, '1'), (10, '2'), (10, '3')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 100);
        let params = completion_params(&completion);
        assert_eq!(params.get("dc").unwrap(), "123");
        assert_eq!(params.get("ni").unwrap(), "1");
    }

    #[tokio::test(start_paused = true)]
    async fn end_input_key_finishes_collection_without_reporting_it_by_default() {
        let params = PlayCollectParams { min_digits: 1, max_digits: Some(10), ..Default::default() };
        let detector = ScriptedDetector::new([(10, '4'), (10, '2'), (10, '#')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 100);
        assert_eq!(completion_params(&completion).get("dc").unwrap(), "42");
    }

    #[tokio::test(start_paused = true)]
    async fn end_input_key_is_reported_when_include_end_key_is_set() {
        let params =
            PlayCollectParams { min_digits: 1, max_digits: Some(10), include_end_key: true, ..Default::default() };
        let detector = ScriptedDetector::new([(10, '4'), (10, '2'), (10, '#')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion_params(&completion).get("dc").unwrap(), "42#");
    }

    /// No tone arrives within the first-digit timer on the first attempt; the no-digits reprompt
    /// plays and a second attempt succeeds.
    #[tokio::test(start_paused = true)]
    async fn first_digit_timeout_then_retry_succeeds() {
        let params = PlayCollectParams {
            min_digits: 1,
            max_digits: Some(1),
            num_attempts: 2,
            first_digit_timer: Ticks(20),
            ..Default::default()
        };
        // The first attempt's detector wait never resolves, so its first-digit timer wins and
        // drives a no-digits reprompt; the retry's own wait delivers the digit quickly.
        let detector = ScriptedDetector::with_steps([Step::Never, Step::Tone(Duration::from_millis(10), '5')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 100);
        assert_eq!(completion_params(&completion).get("dc").unwrap(), "5");
        assert_eq!(completion_params(&completion).get("ni").unwrap(), "2");
    }

    /// A digit map spells the end key into the pattern itself; matching must consider the
    /// sequence both with and without the trailing end key.
    #[tokio::test(start_paused = true)]
    async fn digit_pattern_matches_with_trailing_end_key() {
        let raw = BTreeMap::from([(P::DigitPattern, "xxx#".to_string())]);
        let params = PlayCollectParams::parse(&raw).unwrap();
        let detector = ScriptedDetector::new([(10, '1'), (10, '2'), (10, '3'), (10, '#')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 100);
        assert_eq!(completion_params(&completion).get("dc").unwrap(), "123");
    }

    /// A `psk` press mid-prompt actually repositions the live playlist, rather than only being an
    /// accepted-but-inert parameter: here it jumps past "p1" straight to the last segment.
    #[tokio::test(start_paused = true)]
    async fn position_key_jumps_the_live_prompt_playlist() {
        let played = Arc::new(std::sync::Mutex::new(Vec::new()));
        let player = SlowPlayer { delay: Duration::from_millis(30), played: played.clone() };
        let mut position_keys = BTreeMap::new();
        position_keys.insert('*', PositionAction::Last);
        let params = PlayCollectParams {
            initial_prompt: vec!["p0".into(), "p1".into(), "p2".into()],
            min_digits: 1,
            max_digits: Some(1),
            position_keys,
            ..Default::default()
        };
        let detector = ScriptedDetector::with_steps([
            Step::Tone(Duration::from_millis(10), '*'),
            Step::Never,
            Step::Tone(Duration::from_millis(10), '5'),
        ]);
        let mut pc = PlayCollect::new(params, player, detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 100);
        assert_eq!(completion_params(&completion).get("dc").unwrap(), "5");
        assert_eq!(*played.lock().unwrap(), vec!["p2".to_string()]);
    }

    #[test]
    fn position_keys_are_parsed_from_key_action_pairs() {
        let raw = BTreeMap::from([(P::PositionKey, "1:fst,2:lst,3:prv,4:nxt,5:cur".to_string())]);
        let params = PlayCollectParams::parse(&raw).unwrap();
        assert_eq!(params.position_keys.get(&'1'), Some(&PositionAction::First));
        assert_eq!(params.position_keys.get(&'2'), Some(&PositionAction::Last));
        assert_eq!(params.position_keys.get(&'3'), Some(&PositionAction::Prev));
        assert_eq!(params.position_keys.get(&'4'), Some(&PositionAction::Next));
        assert_eq!(params.position_keys.get(&'5'), Some(&PositionAction::Current));
    }

    /// Every attempt times out with no digits at all; the final failure reports `NoDigitsCollected`
    /// (326) with the attempt count it exhausted.
    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_reports_no_digits_collected() {
        let params = PlayCollectParams {
            min_digits: 4,
            max_digits: Some(4),
            num_attempts: 2,
            first_digit_timer: Ticks(20),
            ..Default::default()
        };
        let detector = ScriptedDetector::new([]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 326);
        assert_eq!(completion_params(&completion).get("ni").unwrap(), "2");
    }

    /// A restart-key press consumes one attempt like any other entry into `Reprompting`; a
    /// retry within the attempt budget can still succeed, and its `ni` reflects the consumed
    /// restart round.
    #[tokio::test(start_paused = true)]
    async fn restart_key_consumes_an_attempt_then_retry_succeeds() {
        let params = PlayCollectParams {
            min_digits: 1,
            max_digits: Some(1),
            num_attempts: 2,
            restart_key: Some('*'),
            ..Default::default()
        };
        let detector = ScriptedDetector::new([(10, '1'), (10, '*'), (10, '5')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 100);
        assert_eq!(completion_params(&completion).get("dc").unwrap(), "5");
        assert_eq!(completion_params(&completion).get("ni").unwrap(), "2");
    }

    /// A restart-key press that exhausts the attempt budget fails instead of reprompting forever.
    #[tokio::test(start_paused = true)]
    async fn restart_key_exhausting_attempts_reports_failure() {
        let params = PlayCollectParams {
            min_digits: 1,
            max_digits: Some(1),
            num_attempts: 1,
            restart_key: Some('*'),
            ..Default::default()
        };
        let detector = ScriptedDetector::new([(10, '1'), (10, '*')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let completion = pc.run().await.expect("should complete, not cancel");
        assert_eq!(completion.code(), 326);
        assert_eq!(completion_params(&completion).get("ni").unwrap(), "1");
    }

    /// Canceling mid-collection makes `run()` resolve with `None`; no completion is reported.
    #[tokio::test(start_paused = true)]
    async fn cancellation_yields_no_completion() {
        let params = PlayCollectParams { min_digits: 1, max_digits: Some(5), ..Default::default() };
        let detector = ScriptedDetector::new([]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        let cancel = pc.cancel_token();
        cancel.cancel();
        assert!(pc.run().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected() {
        let params = PlayCollectParams::default();
        let detector = ScriptedDetector::new([(10, '1')]);
        let mut pc = PlayCollect::new(params, player(), detector);
        pc.start().unwrap();
        assert!(matches!(pc.start(), Err(MgcpError::AlreadyExecuting)));
    }
}
