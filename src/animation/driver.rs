use super::state::{AnimationPhase, AnimationState};
use super::timer::FrameTimer;
use crate::context::LoopContext;
use crate::core::viewport::Viewport;
use crate::events::{EventSender, OverlayEvent};
use crate::tiles::addressing::loop_zoom;
use crate::tiles::progress::FetchProgress;
use crate::tiles::scheduler::{CompletionCallback, FetchRequest, FetchScheduler, FrameCache};
use crate::time::{Frame, SharedAxis};
use chrono::NaiveDateTime;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything a timer tick needs, detached from the driver itself
#[derive(Clone)]
struct Ticker {
    state: Arc<Mutex<AnimationState>>,
    axis: Arc<SharedAxis>,
    frames: FrameCache,
    events: EventSender,
}

impl Ticker {
    fn advance(&self) -> ControlFlow<()> {
        let changed = {
            let mut state = lock(&self.state);
            if state.phase != AnimationPhase::Playing {
                return ControlFlow::Continue(());
            }
            state.tick(self.axis.load().len())
        };
        if let Some(index) = changed {
            self.show(index, true);
        }
        ControlFlow::Continue(())
    }

    fn show_current(&self) {
        let index = lock(&self.state).index;
        self.show(index, true);
    }

    fn show(&self, index: usize, with_image: bool) {
        let axis = self.axis.load();
        let frame = axis.get(index);
        let timestamp = frame.map(|f| f.key.clone()).unwrap_or_default();
        let image = if with_image {
            self.frames
                .read()
                .ok()
                .and_then(|frames| frames.get(&timestamp).cloned())
        } else {
            None
        };

        self.events.send(OverlayEvent::FrameChanged {
            index,
            timestamp,
            frame_date: frame.map(|f| f.base_time),
            image,
        });
    }
}

/// Drives the fetch-then-play lifecycle of one overlay.
///
/// `Idle -> Loading -> Playing <-> Paused -> Idle`. Loading prefetches and
/// composites every frame of the current axis; once the scheduler reports
/// completion the driver starts the frame timer. Every displayed frame is
/// announced with [`OverlayEvent::FrameChanged`].
pub struct AnimationDriver {
    ctx: LoopContext,
    scheduler: Arc<FetchScheduler>,
    timer: Arc<Mutex<FrameTimer>>,
    ticker: Ticker,
}

impl AnimationDriver {
    pub fn new(
        ctx: LoopContext,
        axis: Arc<SharedAxis>,
        scheduler: Arc<FetchScheduler>,
        events: EventSender,
    ) -> Self {
        let state = AnimationState::new(ctx.config().dwell_count);
        let ticker = Ticker {
            state: Arc::new(Mutex::new(state)),
            axis,
            frames: scheduler.frames(),
            events,
        };
        let timer = FrameTimer::new(ctx.spawner().clone());
        Self {
            ctx,
            scheduler,
            timer: Arc::new(Mutex::new(timer)),
            ticker,
        }
    }

    pub fn state(&self) -> AnimationState {
        lock(&self.ticker.state).clone()
    }

    pub fn phase(&self) -> AnimationPhase {
        lock(&self.ticker.state).phase
    }

    pub fn is_animating(&self) -> bool {
        lock(&self.ticker.state).is_animating()
    }

    pub fn current_index(&self) -> usize {
        lock(&self.ticker.state).index
    }

    pub fn current_frame(&self) -> Option<Frame> {
        self.ticker.axis.load().get(self.current_index()).cloned()
    }

    /// Frame key of the displayed frame, empty when there is none
    pub fn current_timestamp(&self) -> String {
        self.current_frame().map(|f| f.key).unwrap_or_default()
    }

    /// Base time of the displayed frame
    pub fn frame_date(&self) -> Option<NaiveDateTime> {
        self.current_frame().map(|f| f.base_time)
    }

    /// Prefetches and composites every frame of the axis, then plays
    pub fn begin_loop(&self, viewport: Viewport, zoom: u8) -> Arc<FetchProgress> {
        lock(&self.timer).stop();
        let ticket = lock(&self.ticker.state).begin_loading();

        let request = FetchRequest {
            viewport,
            zoom: loop_zoom(zoom, self.ctx.config().loop_zoom_offset),
            frame_keys: self.ticker.axis.load().keys(),
            composite: true,
        };
        log::info!("loop starting with {} frames at zoom {}", request.frame_keys.len(), request.zoom);
        self.scheduler.fetch(request, self.play_when_ready(ticket))
    }

    /// Starts the frame timer over the frames already rendered
    pub fn start_animating(&self) {
        lock(&self.ticker.state).phase = AnimationPhase::Playing;
        self.ticker.show_current();
        start_timer(&self.timer, self.ctx.config().frame_interval(), self.ticker.clone());
    }

    /// Cancels loading and playback. With `jump_to_last` the newest frame
    /// becomes current and the next loop starts from the oldest one.
    pub fn stop_animating(&self, jump_to_last: bool) {
        self.scheduler.cancel();
        lock(&self.timer).stop();

        let len = self.ticker.axis.load().len();
        let index = {
            let mut state = lock(&self.ticker.state);
            state.stop(jump_to_last, len);
            state.index
        };
        log::info!("loop stopped");
        self.ticker.show(index, false);
    }

    /// Suspends the timer while the viewport moves, keeping index and
    /// dwell. Does nothing when not animating.
    pub fn pause_for_move(&self) {
        if lock(&self.ticker.state).pause_for_move() {
            lock(&self.timer).stop();
            log::debug!("loop paused for move");
        }
    }

    /// Runs `restart` if the animation was running when the move began
    pub fn unpause_for_move<F: FnOnce()>(&self, restart: F) -> bool {
        let resume = lock(&self.ticker.state).unpause_for_move();
        if resume {
            restart();
        }
        resume
    }

    /// Advances one frame by hand
    pub fn step(&self) {
        let _ = self.ticker.advance();
    }

    /// Adapts the current index after the axis was replaced
    pub fn axis_changed(&self) {
        let len = self.ticker.axis.load().len();
        lock(&self.ticker.state).axis_changed(len);
    }

    pub fn detach(&self) {
        self.scheduler.cancel();
        lock(&self.timer).stop();
        lock(&self.ticker.state).stop(false, 0);
    }

    /// Completion of the load identified by `ticket`. A load superseded by a
    /// later `begin_loop` is ignored even if its fetch finished first.
    fn play_when_ready(&self, ticket: u64) -> CompletionCallback {
        let ticker = self.ticker.clone();
        let timer = self.timer.clone();
        let period = self.ctx.config().frame_interval();

        Box::new(move |summary| {
            if !lock(&ticker.state).finish_loading(ticket) {
                log::debug!("ignoring completion of superseded fetch {}", summary.generation);
                return;
            }
            ticker.events.send(OverlayEvent::FramesReady {
                frame_count: summary.frames,
            });
            ticker.show_current();
            start_timer(&timer, period, ticker);
        })
    }
}

impl Drop for AnimationDriver {
    fn drop(&mut self) {
        lock(&self.timer).stop();
    }
}

fn start_timer(timer: &Mutex<FrameTimer>, period: Duration, ticker: Ticker) {
    lock(timer).start(period, move || ticker.advance());
}
