//! State synchronizer: tracks what the compositor believes is on screen
//! ("expected") versus what was actually observed after the last write,
//! and forces a full redraw when they diverge or a write failed.

use crate::screen::ScreenBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    InSync,
    DisplayFailed,
    Diverged,
}

pub struct StateSynchronizer {
    expected: Option<ScreenBuffer>,
    state: SyncState,
    resync_attempts: u32,
}

impl Default for StateSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSynchronizer {
    pub fn new() -> Self {
        Self {
            expected: None,
            state: SyncState::InSync,
            resync_attempts: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Record what the compositor just wrote as the new expected state.
    pub fn record_rendered(&mut self, buffer: ScreenBuffer) {
        self.expected = Some(buffer);
        self.state = SyncState::InSync;
        self.resync_attempts = 0;
    }

    /// A terminal write failed. Mark dirty and schedule a resync rather
    /// than propagating the error further up; the caller retries on the
    /// next turn.
    pub fn note_display_failed(&mut self) {
        self.state = SyncState::DisplayFailed;
        self.resync_attempts += 1;
    }

    /// Compare `observed` (what the terminal is believed to actually show,
    /// e.g. reconstructed from a size-change or external probe) against
    /// the last recorded expected state. Diverging beyond the given cell
    /// threshold forces a full redraw on the next render.
    pub fn check_divergence(&mut self, observed: &ScreenBuffer, threshold: usize) -> bool {
        let Some(expected) = &self.expected else {
            self.state = SyncState::Diverged;
            return true;
        };

        if expected.frame.width != observed.frame.width || expected.frame.height != observed.frame.height {
            self.state = SyncState::Diverged;
            return true;
        }

        let mut differing = 0usize;
        for y in 0..expected.frame.height {
            for x in 0..expected.frame.width {
                if expected.frame.get(x, y) != observed.frame.get(x, y) {
                    differing += 1;
                    if differing > threshold {
                        self.state = SyncState::Diverged;
                        return true;
                    }
                }
            }
        }
        false
    }

    /// True if the next render should be a forced full redraw rather than
    /// an incremental diff.
    pub fn needs_full_redraw(&self) -> bool {
        matches!(self.state, SyncState::DisplayFailed | SyncState::Diverged)
    }

    pub fn resync_attempts(&self) -> u32 {
        self.resync_attempts
    }

    /// Clear the divergence/failure state after a successful forced
    /// redraw has been issued.
    pub fn acknowledge_resync(&mut self) {
        self.state = SyncState::InSync;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_sync_but_no_expected_state_forces_redraw() {
        let mut sync = StateSynchronizer::new();
        let observed = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        assert!(sync.check_divergence(&observed, 0));
        assert_eq!(sync.state(), SyncState::Diverged);
    }

    #[test]
    fn identical_frames_do_not_diverge() {
        let mut sync = StateSynchronizer::new();
        let buf = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        sync.record_rendered(buf.clone());
        assert!(!sync.check_divergence(&buf, 0));
        assert!(!sync.needs_full_redraw());
    }

    #[test]
    fn differing_frames_beyond_threshold_diverge() {
        let mut sync = StateSynchronizer::new();
        let old = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        sync.record_rendered(old);
        let new = ScreenBuffer::render("$ ", "ls -la", 6, 80, 24);
        assert!(sync.check_divergence(&new, 0));
        assert!(sync.needs_full_redraw());
    }

    #[test]
    fn display_failure_forces_redraw_and_counts_attempts() {
        let mut sync = StateSynchronizer::new();
        sync.note_display_failed();
        assert!(sync.needs_full_redraw());
        assert_eq!(sync.resync_attempts(), 1);
        sync.acknowledge_resync();
        assert!(!sync.needs_full_redraw());
    }
}
