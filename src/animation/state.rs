/// Lifecycle of a looping animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationPhase {
    #[default]
    Idle,
    /// Frames are being fetched
    Loading,
    Playing,
    /// Timer suspended while the viewport moves
    Paused,
}

/// Frame index bookkeeping of one overlay.
///
/// Only the animation driver mutates this, either from timer ticks or from
/// explicit start/stop/pause calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationState {
    pub index: usize,
    pub dwell: u32,
    pub dwell_count: u32,
    pub phase: AnimationPhase,
    /// Whether the animation was running when the current move began
    pub resume_after_move: bool,
    /// Identifies the most recent `begin_loop`; only its fetch may start
    /// playback
    pub loop_ticket: u64,
}

impl AnimationState {
    pub fn new(dwell_count: u32) -> Self {
        Self {
            index: 0,
            dwell: 0,
            dwell_count,
            phase: AnimationPhase::Idle,
            resume_after_move: false,
            loop_ticket: 0,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.phase != AnimationPhase::Idle
    }

    /// Advances one tick over `len` frames.
    ///
    /// Past the newest frame the dwell counter grows and the newest frame
    /// stays up until the counter reaches `dwell_count`; then playback wraps
    /// to the oldest frame. Returns the new index when it changed.
    pub fn tick(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        let mut next = self.index + 1;
        if next >= len {
            self.dwell += 1;
            if self.dwell < self.dwell_count {
                return None;
            }
            self.dwell = 0;
            next = 0;
        }

        let changed = next != self.index;
        self.index = next;
        changed.then_some(next)
    }

    /// Shows the newest frame with the dwell already used up, so the next
    /// tick restarts from the oldest frame.
    pub fn jump_to_last(&mut self, len: usize) {
        self.index = len.saturating_sub(1);
        self.dwell = self.dwell_count;
    }

    /// Adapts the index to a freshly polled axis of `len` frames
    pub fn axis_changed(&mut self, len: usize) {
        if self.is_animating() {
            self.index = self.index.min(len.saturating_sub(1));
        } else {
            self.jump_to_last(len);
        }
    }

    /// Returns whether the animation was running and should be suspended
    pub fn pause_for_move(&mut self) -> bool {
        self.resume_after_move = self.is_animating();
        if self.resume_after_move {
            self.phase = AnimationPhase::Paused;
        }
        self.resume_after_move
    }

    /// Returns whether the animation should be restarted
    pub fn unpause_for_move(&mut self) -> bool {
        std::mem::take(&mut self.resume_after_move)
    }

    /// Enters `Loading` and returns the ticket of this load
    pub fn begin_loading(&mut self) -> u64 {
        self.phase = AnimationPhase::Loading;
        self.loop_ticket += 1;
        self.loop_ticket
    }

    /// Switches to `Playing` if `ticket` belongs to the load still pending
    pub fn finish_loading(&mut self, ticket: u64) -> bool {
        let current = self.phase == AnimationPhase::Loading && self.loop_ticket == ticket;
        if current {
            self.phase = AnimationPhase::Playing;
        }
        current
    }

    pub fn stop(&mut self, jump_to_last: bool, len: usize) {
        self.phase = AnimationPhase::Idle;
        self.resume_after_move = false;
        if jump_to_last {
            self.jump_to_last(len);
        }
    }
}

impl Default for AnimationState {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn displayed(state: &mut AnimationState, len: usize, ticks: usize) -> Vec<usize> {
        let mut shown = vec![state.index];
        for _ in 0..ticks {
            state.tick(len);
            shown.push(state.index);
        }
        shown
    }

    #[test]
    fn test_loop_with_dwell() {
        let mut state = AnimationState::new(3);
        assert_eq!(displayed(&mut state, 3, 10), vec![0, 1, 2, 2, 2, 0, 1, 2, 2, 2, 0]);
    }

    #[test]
    fn test_dwell_law() {
        for dwell_count in 1..5 {
            for len in 1..6 {
                let mut state = AnimationState::new(dwell_count);
                state.index = len - 1;
                let ticks_to_wrap = (1..=20).find(|_| {
                    state.tick(len);
                    state.index == 0 && state.dwell == 0
                });
                assert_eq!(ticks_to_wrap, Some(dwell_count as usize), "len {} dwell {}", len, dwell_count);
            }
        }
    }

    #[test]
    fn test_tick_reports_changes_only() {
        let mut state = AnimationState::new(2);
        assert_eq!(state.tick(2), Some(1));
        assert_eq!(state.tick(2), None);
        assert_eq!(state.tick(2), Some(0));
        assert_eq!(state.tick(0), None);
    }

    #[test]
    fn test_stop_with_jump_restarts_from_oldest() {
        let mut state = AnimationState::new(3);
        state.phase = AnimationPhase::Playing;
        state.index = 1;
        state.stop(true, 6);

        assert_eq!(state.phase, AnimationPhase::Idle);
        assert_eq!(state.index, 5);
        assert_eq!(state.tick(6), Some(0));
    }

    #[test]
    fn test_axis_change() {
        let mut idle = AnimationState::new(3);
        idle.axis_changed(6);
        assert_eq!(idle.index, 5);

        let mut playing = AnimationState::new(3);
        playing.phase = AnimationPhase::Playing;
        playing.index = 4;
        playing.axis_changed(3);
        assert_eq!(playing.index, 2);
        playing.axis_changed(0);
        assert_eq!(playing.index, 0);
    }

    #[test]
    fn test_pause_only_when_animating() {
        let mut state = AnimationState::new(3);
        assert!(!state.pause_for_move());
        assert_eq!(state.phase, AnimationPhase::Idle);
        assert!(!state.unpause_for_move());

        state.phase = AnimationPhase::Playing;
        state.index = 2;
        assert!(state.pause_for_move());
        assert_eq!(state.phase, AnimationPhase::Paused);
        assert_eq!(state.index, 2);
        assert!(state.unpause_for_move());
        assert!(!state.unpause_for_move());
    }

    #[test]
    fn test_only_latest_load_starts_playback() {
        let mut state = AnimationState::new(3);
        let first = state.begin_loading();
        let second = state.begin_loading();

        assert!(!state.finish_loading(first));
        assert_eq!(state.phase, AnimationPhase::Loading);
        assert!(state.finish_loading(second));
        assert_eq!(state.phase, AnimationPhase::Playing);
        assert!(!state.finish_loading(second));
    }
}
