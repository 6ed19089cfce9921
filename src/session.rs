//! The per-keystroke session engine: classifies input against a reference
//! text, tracks errors and derived stats, enforces the consecutive-error
//! lockout, and produces a single completion record per finished run.
//!
//! The engine is a pure in-memory state machine. All time-dependent
//! operations take an explicit `now` so tests can drive a fabricated clock;
//! the wall-clock wrappers are what the event loop calls.

use crate::metrics;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use thiserror::Error;

pub const COMPLETION_REVEAL_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid reference text: {0}")]
    InvalidReference(String),
}

/// Anti-cheat policy: after `threshold` consecutive mismatches all input is
/// swallowed until `cooldown` has elapsed. Disable for the lenient mode that
/// never blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub enabled: bool,
    pub threshold: u32,
    pub cooldown: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 3,
            cooldown: Duration::from_millis(2000),
        }
    }
}

impl LockoutPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Typing,
    Locked,
    Completed,
}

/// A keystroke after boundary filtering. Modifier combos and unrecognized
/// control keys never reach the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Backspace,
}

/// Per-position rendering classification, derived on demand from the session
/// state rather than tracked incrementally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharState {
    Pending,
    Correct,
    /// Correct now, but this position took a wrong keystroke at some point.
    Corrected,
    /// Typed wrong and not yet backspaced over.
    Incorrect,
    Current,
}

/// Final scoring snapshot, emitted exactly once per completed session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionRecord {
    pub wpm: u32,
    pub accuracy: u32,
    pub total_errors: usize,
    pub time_in_seconds: u64,
    pub characters_typed: usize,
}

/// Observable state for the stats bar; cheap to copy out on every redraw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub wpm: u32,
    pub accuracy: u32,
    pub total_errors: usize,
    pub consecutive_errors: u32,
    pub progress_percent: u32,
    pub locked: bool,
}

#[derive(Debug)]
struct PendingCompletion {
    record: CompletionRecord,
    reveal_at: SystemTime,
    emitted: bool,
}

#[derive(Debug)]
pub struct Session {
    reference: Vec<char>,
    typed: Vec<char>,
    cursor: usize,
    consecutive_errors: u32,
    total_errors: usize,
    mistake_marks: HashSet<usize>,
    policy: LockoutPolicy,
    started_at: Option<SystemTime>,
    locked_until: Option<SystemTime>,
    completion: Option<PendingCompletion>,
}

impl Session {
    pub fn new(reference: &str, policy: LockoutPolicy) -> Result<Self, SessionError> {
        let chars: Vec<char> = reference.chars().collect();
        if chars.is_empty() {
            return Err(SessionError::InvalidReference(
                "reference text is empty".into(),
            ));
        }
        Ok(Self {
            reference: chars,
            typed: Vec::new(),
            cursor: 0,
            consecutive_errors: 0,
            total_errors: 0,
            mistake_marks: HashSet::new(),
            policy,
            started_at: None,
            locked_until: None,
            completion: None,
        })
    }

    pub fn reference(&self) -> &[char] {
        &self.reference
    }

    pub fn typed(&self) -> &[char] {
        &self.typed
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total_errors(&self) -> usize {
        self.total_errors
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn phase(&self) -> Phase {
        if self.completion.is_some() {
            Phase::Completed
        } else if self.locked_until.is_some() {
            Phase::Locked
        } else if self.started_at.is_none() {
            Phase::NotStarted
        } else {
            Phase::Typing
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some()
    }

    pub fn has_finished(&self) -> bool {
        self.completion.is_some()
    }

    /// Process one keystroke at the current wall-clock instant.
    pub fn keystroke(&mut self, key: Keystroke) {
        self.keystroke_at(key, SystemTime::now());
    }

    /// Process one keystroke as of `now`. Keystrokes are swallowed while the
    /// lockout is engaged and after completion; everything else mutates state
    /// synchronously before the next keystroke is looked at.
    pub fn keystroke_at(&mut self, key: Keystroke, now: SystemTime) {
        if self.completion.is_some() {
            return;
        }
        if let Some(until) = self.locked_until {
            if now < until {
                return;
            }
            // Cooldown elapsed but no tick has fired yet; release in place
            self.release_lockout();
        }

        if self.started_at.is_none() {
            self.started_at = Some(now);
        }

        match key {
            Keystroke::Backspace => {
                // Mistakes stay counted in total_errors; backspace only
                // allows a retry of the position.
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.typed.pop();
                    self.consecutive_errors = 0;
                }
            }
            Keystroke::Char(c) => {
                let expected = self.reference[self.cursor];
                if c == expected {
                    self.typed.push(c);
                    self.cursor += 1;
                    self.consecutive_errors = 0;
                } else {
                    self.mistake_marks.insert(self.cursor);
                    self.typed.push(c);
                    self.cursor += 1;
                    self.total_errors += 1;
                    self.consecutive_errors += 1;
                    if self.policy.enabled && self.consecutive_errors >= self.policy.threshold {
                        self.locked_until = Some(now + self.policy.cooldown);
                    }
                }
            }
        }

        if self.cursor == self.reference.len() {
            self.finalize(now);
        }
    }

    /// Timer pump, called from the event loop tick. Releases an expired
    /// lockout; a no-op otherwise.
    pub fn tick(&mut self, now: SystemTime) {
        if let Some(until) = self.locked_until {
            if now >= until {
                self.release_lockout();
            }
        }
    }

    fn release_lockout(&mut self) {
        self.locked_until = None;
        self.consecutive_errors = 0;
    }

    fn finalize(&mut self, now: SystemTime) {
        let len = self.reference.len();
        let elapsed = self
            .started_at
            .and_then(|t| now.duration_since(t).ok())
            .unwrap_or(Duration::ZERO);
        let minutes = elapsed.as_secs_f64() / 60.0;

        // Completion is terminal; an in-flight lockout dies with it
        self.locked_until = None;
        self.completion = Some(PendingCompletion {
            record: CompletionRecord {
                wpm: metrics::wpm(len, minutes),
                accuracy: metrics::accuracy(len, self.total_errors),
                total_errors: self.total_errors,
                time_in_seconds: elapsed.as_secs_f64().round() as u64,
                characters_typed: len,
            },
            reveal_at: now + COMPLETION_REVEAL_DELAY,
            emitted: false,
        });
    }

    /// Returns the completion record once the presentation delay has passed.
    /// Yields `Some` exactly once per session; the values were computed at
    /// the moment of completion, not at reveal time.
    pub fn poll_completion(&mut self, now: SystemTime) -> Option<CompletionRecord> {
        let pending = self.completion.as_mut()?;
        if pending.emitted || now < pending.reveal_at {
            return None;
        }
        pending.emitted = true;
        Some(pending.record)
    }

    /// The record for an already-completed session, regardless of the reveal
    /// delay or whether it was polled. Used by the results screen.
    pub fn completion_record(&self) -> Option<CompletionRecord> {
        self.completion.as_ref().map(|p| p.record)
    }

    /// Back to `NotStarted` with the same reference text and policy. Cancels
    /// any pending lockout release and the completion reveal.
    pub fn restart(&mut self) {
        self.typed.clear();
        self.cursor = 0;
        self.consecutive_errors = 0;
        self.total_errors = 0;
        self.mistake_marks.clear();
        self.started_at = None;
        self.locked_until = None;
        self.completion = None;
    }

    pub fn wpm_at(&self, now: SystemTime) -> u32 {
        let Some(started) = self.started_at else {
            return 0;
        };
        let minutes = now
            .duration_since(started)
            .map(|d| d.as_secs_f64() / 60.0)
            .unwrap_or(0.0);
        metrics::wpm(self.cursor, minutes)
    }

    pub fn accuracy(&self) -> u32 {
        metrics::accuracy(self.cursor, self.total_errors)
    }

    pub fn progress_percent(&self) -> u32 {
        metrics::progress_percent(self.cursor, self.reference.len())
    }

    pub fn snapshot_at(&self, now: SystemTime) -> Snapshot {
        Snapshot {
            phase: self.phase(),
            wpm: self.wpm_at(now),
            accuracy: self.accuracy(),
            total_errors: self.total_errors,
            consecutive_errors: self.consecutive_errors,
            progress_percent: self.progress_percent(),
            locked: self.is_locked(),
        }
    }

    pub fn char_states(&self) -> Vec<CharState> {
        classify(
            &self.reference,
            &self.typed,
            self.cursor,
            &self.mistake_marks,
        )
    }
}

/// Classifies every reference position for rendering. Recomputed from scratch
/// each time so the rendering can never drift from the typing state.
pub fn classify(
    reference: &[char],
    typed: &[char],
    cursor: usize,
    mistake_marks: &HashSet<usize>,
) -> Vec<CharState> {
    reference
        .iter()
        .enumerate()
        .map(|(idx, &expected)| {
            if idx < cursor {
                if typed[idx] == expected {
                    if mistake_marks.contains(&idx) {
                        CharState::Corrected
                    } else {
                        CharState::Correct
                    }
                } else {
                    CharState::Incorrect
                }
            } else if idx == cursor {
                CharState::Current
            } else {
                CharState::Pending
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 + secs)
    }

    fn t_ms(ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(1_000_000_000 + ms)
    }

    fn session(reference: &str) -> Session {
        Session::new(reference, LockoutPolicy::default()).unwrap()
    }

    fn type_str(s: &mut Session, text: &str, now: SystemTime) {
        for c in text.chars() {
            s.keystroke_at(Keystroke::Char(c), now);
        }
    }

    #[test]
    fn test_empty_reference_rejected() {
        let err = Session::new("", LockoutPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidReference("reference text is empty".into())
        );
    }

    #[test]
    fn test_new_session_is_not_started() {
        let s = session("hello");
        assert_eq!(s.phase(), Phase::NotStarted);
        assert_eq!(s.cursor(), 0);
        assert_eq!(s.total_errors(), 0);
        assert!(!s.has_started());
        assert!(!s.has_finished());
    }

    #[test]
    fn test_first_keystroke_starts_timer() {
        let mut s = session("hello");
        s.keystroke_at(Keystroke::Char('h'), t(0));
        assert!(s.has_started());
        assert_eq!(s.phase(), Phase::Typing);
    }

    #[test]
    fn test_correct_keystroke_advances() {
        let mut s = session("hi");
        s.keystroke_at(Keystroke::Char('h'), t(0));
        assert_eq!(s.cursor(), 1);
        assert_eq!(s.typed(), &['h']);
        assert_eq!(s.total_errors(), 0);
        assert_eq!(s.consecutive_errors(), 0);
    }

    #[test]
    fn test_mismatch_advances_and_counts() {
        let mut s = session("hi");
        s.keystroke_at(Keystroke::Char('x'), t(0));
        assert_eq!(s.cursor(), 1);
        assert_eq!(s.typed(), &['x']);
        assert_eq!(s.total_errors(), 1);
        assert_eq!(s.consecutive_errors(), 1);
    }

    #[test]
    fn test_typed_log_length_tracks_cursor() {
        let mut s = session("abcdef");
        let keys = [
            Keystroke::Char('a'),
            Keystroke::Char('x'),
            Keystroke::Backspace,
            Keystroke::Char('b'),
            Keystroke::Backspace,
            Keystroke::Backspace,
            Keystroke::Char('a'),
        ];
        for k in keys {
            s.keystroke_at(k, t(0));
            assert_eq!(s.typed().len(), s.cursor());
            assert!(s.cursor() <= s.reference().len());
        }
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let mut s = session("hi");
        s.keystroke_at(Keystroke::Backspace, t(0));
        assert_eq!(s.cursor(), 0);
        assert_eq!(s.typed().len(), 0);
    }

    #[test]
    fn test_backspace_keeps_error_history() {
        let mut s = session("cat");
        s.keystroke_at(Keystroke::Char('x'), t(0));
        assert_eq!(s.total_errors(), 1);
        s.keystroke_at(Keystroke::Backspace, t(0));
        assert_eq!(s.total_errors(), 1);
        assert_eq!(s.consecutive_errors(), 0);
        // Retyping the same position wrong counts a second error
        s.keystroke_at(Keystroke::Char('y'), t(0));
        assert_eq!(s.total_errors(), 2);
    }

    #[test]
    fn test_total_errors_monotone() {
        let mut s = session("abcd");
        let mut last = 0;
        let keys = [
            Keystroke::Char('x'),
            Keystroke::Backspace,
            Keystroke::Char('a'),
            Keystroke::Char('z'),
            Keystroke::Backspace,
            Keystroke::Char('b'),
        ];
        for k in keys {
            s.keystroke_at(k, t(0));
            assert!(s.total_errors() >= last);
            last = s.total_errors();
        }
        assert_eq!(s.total_errors(), 2);
    }

    #[test]
    fn test_lockout_engages_on_third_consecutive_error() {
        let mut s = session("abcdef");
        type_str(&mut s, "xx", t(0));
        assert_eq!(s.phase(), Phase::Typing);
        s.keystroke_at(Keystroke::Char('x'), t(0));
        assert_eq!(s.phase(), Phase::Locked);
        assert!(s.is_locked());
    }

    #[test]
    fn test_correct_key_resets_consecutive_errors() {
        let mut s = session("abcdef");
        type_str(&mut s, "xx", t(0));
        s.keystroke_at(Keystroke::Char('c'), t(0)); // 'c' is expected at index 2
        assert_eq!(s.consecutive_errors(), 0);
        type_str(&mut s, "xx", t(0));
        assert_eq!(s.phase(), Phase::Typing); // still below threshold
    }

    #[test]
    fn test_backspace_resets_consecutive_errors() {
        let mut s = session("abcdef");
        type_str(&mut s, "xx", t(0));
        s.keystroke_at(Keystroke::Backspace, t(0));
        assert_eq!(s.consecutive_errors(), 0);
        s.keystroke_at(Keystroke::Char('q'), t(0));
        assert_eq!(s.phase(), Phase::Typing);
    }

    #[test]
    fn test_lockout_swallows_keystrokes() {
        let mut s = session("abcdef");
        type_str(&mut s, "xxx", t(0));
        assert_eq!(s.phase(), Phase::Locked);
        let (cursor, errors) = (s.cursor(), s.total_errors());

        s.keystroke_at(Keystroke::Char('d'), t_ms(100));
        s.keystroke_at(Keystroke::Backspace, t_ms(200));
        assert_eq!(s.cursor(), cursor);
        assert_eq!(s.typed().len(), cursor);
        assert_eq!(s.total_errors(), errors);
        assert_eq!(s.phase(), Phase::Locked);
    }

    #[test]
    fn test_lockout_releases_on_tick_after_cooldown() {
        let mut s = session("abcdef");
        type_str(&mut s, "xxx", t_ms(0));
        s.tick(t_ms(1999));
        assert_eq!(s.phase(), Phase::Locked);
        s.tick(t_ms(2000));
        assert_eq!(s.phase(), Phase::Typing);
        assert_eq!(s.consecutive_errors(), 0);
    }

    #[test]
    fn test_keystroke_after_cooldown_is_accepted() {
        let mut s = session("abcdef");
        type_str(&mut s, "xxx", t_ms(0));
        // No tick fired; the keystroke itself observes the elapsed cooldown
        s.keystroke_at(Keystroke::Char('d'), t_ms(2500));
        assert_eq!(s.cursor(), 4);
        assert_eq!(s.total_errors(), 3);
        assert_eq!(s.phase(), Phase::Typing);
    }

    #[test]
    fn test_lockout_disabled_never_blocks() {
        let mut s = Session::new("abcdef", LockoutPolicy::disabled()).unwrap();
        type_str(&mut s, "xxxxx", t(0));
        assert_eq!(s.phase(), Phase::Typing);
        assert_eq!(s.total_errors(), 5);
        assert_eq!(s.cursor(), 5);
    }

    #[test]
    fn test_custom_threshold() {
        let policy = LockoutPolicy {
            enabled: true,
            threshold: 5,
            cooldown: Duration::from_secs(2),
        };
        let mut s = Session::new("abcdefgh", policy).unwrap();
        type_str(&mut s, "xxxx", t(0));
        assert_eq!(s.phase(), Phase::Typing);
        s.keystroke_at(Keystroke::Char('x'), t(0));
        assert_eq!(s.phase(), Phase::Locked);
    }

    #[test]
    fn test_perfect_run_completes() {
        let mut s = session("cat");
        s.keystroke_at(Keystroke::Char('c'), t(0));
        s.keystroke_at(Keystroke::Char('a'), t(30));
        s.keystroke_at(Keystroke::Char('t'), t(60));
        assert_eq!(s.phase(), Phase::Completed);

        let record = s.completion_record().unwrap();
        assert_eq!(record.total_errors, 0);
        assert_eq!(record.accuracy, 100);
        assert_eq!(record.characters_typed, 3);
        assert_eq!(record.time_in_seconds, 60);
        // 3 chars in 1 minute = 0.6 words/min, rounds to 1
        assert_eq!(record.wpm, 1);
    }

    #[test]
    fn test_completion_record_values_with_errors() {
        let mut s = session("abcdefghij");
        type_str(&mut s, "abcdefghi", t(0));
        s.keystroke_at(Keystroke::Char('x'), t(60)); // wrong final char
        let record = s.completion_record().unwrap();
        assert_eq!(record.total_errors, 1);
        assert_eq!(record.accuracy, 90);
        assert_eq!(record.characters_typed, 10);
        assert_eq!(record.wpm, 2); // 10/5 words over 1 minute
    }

    #[test]
    fn test_completed_session_ignores_keystrokes() {
        let mut s = session("hi");
        type_str(&mut s, "hi", t(0));
        assert_eq!(s.phase(), Phase::Completed);
        s.keystroke_at(Keystroke::Char('x'), t(1));
        s.keystroke_at(Keystroke::Backspace, t(1));
        assert_eq!(s.cursor(), 2);
        assert_eq!(s.total_errors(), 0);
        assert_eq!(s.phase(), Phase::Completed);
    }

    #[test]
    fn test_completion_emitted_exactly_once_after_delay() {
        let mut s = session("hi");
        type_str(&mut s, "hi", t_ms(0));
        assert!(s.poll_completion(t_ms(0)).is_none());
        assert!(s.poll_completion(t_ms(499)).is_none());
        let record = s.poll_completion(t_ms(500)).unwrap();
        assert_eq!(record.accuracy, 100);
        assert!(s.poll_completion(t_ms(501)).is_none());
        assert!(s.poll_completion(t_ms(10_000)).is_none());
    }

    #[test]
    fn test_completion_wins_over_lockout() {
        // The final keystroke is the third consecutive mismatch, which
        // would engage the lockout; completion is terminal and wins
        let mut s = session("abc");
        type_str(&mut s, "xxx", t(0));
        assert_eq!(s.phase(), Phase::Completed);
        assert!(!s.is_locked());
        assert_eq!(s.completion_record().unwrap().total_errors, 3);
        assert_eq!(s.completion_record().unwrap().accuracy, 0);
    }

    #[test]
    fn test_restart_returns_to_zero_state() {
        let mut s = session("abc");
        type_str(&mut s, "abc", t(0));
        assert_eq!(s.phase(), Phase::Completed);

        s.restart();
        assert_eq!(s.phase(), Phase::NotStarted);
        assert_eq!(s.cursor(), 0);
        assert_eq!(s.total_errors(), 0);
        assert!(!s.has_started());
        assert!(s.completion_record().is_none());

        type_str(&mut s, "abc", t(10));
        assert_eq!(s.phase(), Phase::Completed);
        assert_eq!(s.completion_record().unwrap().accuracy, 100);
    }

    #[test]
    fn test_restart_cancels_pending_lockout_release() {
        let mut s = session("abcdef");
        type_str(&mut s, "xxx", t_ms(0));
        assert_eq!(s.phase(), Phase::Locked);

        s.restart();
        assert_eq!(s.phase(), Phase::NotStarted);
        // The tick that would have released the old lockout changes nothing
        s.tick(t_ms(5000));
        assert_eq!(s.phase(), Phase::NotStarted);
        assert_eq!(s.consecutive_errors(), 0);
    }

    #[test]
    fn test_live_metrics() {
        let mut s = session("abcdefghij");
        type_str(&mut s, "abcx", t(0));
        assert_eq!(s.accuracy(), 75); // 4 judged, 1 error
        assert_eq!(s.progress_percent(), 40);
        // 4 judged chars in 30s = 0.8 words over 0.5 min
        assert_eq!(s.wpm_at(t(30)), 2);
    }

    #[test]
    fn test_snapshot() {
        let mut s = session("abcd");
        type_str(&mut s, "ab", t(0));
        let snap = s.snapshot_at(t(30));
        assert_eq!(snap.phase, Phase::Typing);
        assert_eq!(snap.total_errors, 0);
        assert_eq!(snap.progress_percent, 50);
        assert!(!snap.locked);
    }

    #[test]
    fn test_classify_fresh_session() {
        let s = session("ab");
        assert_eq!(
            s.char_states(),
            vec![CharState::Current, CharState::Pending]
        );
    }

    #[test]
    fn test_classify_mixed_states() {
        let mut s = session("abcd");
        // a correct; b wrong then corrected; c wrong and left in place
        s.keystroke_at(Keystroke::Char('a'), t(0));
        s.keystroke_at(Keystroke::Char('x'), t(0));
        s.keystroke_at(Keystroke::Backspace, t(0));
        s.keystroke_at(Keystroke::Char('b'), t(0));
        s.keystroke_at(Keystroke::Char('z'), t(0));
        assert_eq!(
            s.char_states(),
            vec![
                CharState::Correct,
                CharState::Corrected,
                CharState::Incorrect,
                CharState::Current,
            ]
        );
    }

    #[test]
    fn test_classify_no_current_when_complete() {
        let mut s = session("ab");
        type_str(&mut s, "ab", t(0));
        assert_eq!(
            s.char_states(),
            vec![CharState::Correct, CharState::Correct]
        );
    }
}
