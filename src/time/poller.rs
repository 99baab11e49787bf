use super::axis::{parse_valid_times, SharedAxis, TimeAxis};
use crate::context::LoopContext;
use crate::events::{EventSender, OverlayEvent};
use crate::runtime::TaskHandle;
use crate::tiles::source::LayerSource;
use crate::{LoopError, Result};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

/// Called after every successful poll with whether the axis changed
pub type AxisListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Fetches and resolves the valid times of a layer
pub async fn query_valid_times(ctx: &LoopContext, source: &LayerSource) -> Result<TimeAxis> {
    if source.layer().name.trim().is_empty() {
        return Err(LoopError::MalformedRequest("layer name is empty".into()));
    }

    let request = ctx.authorized_request(source.valid_times_url());
    let response = ctx.http().get(request).await?;
    if !response.is_success() {
        return Err(LoopError::InvalidServerResponse {
            status: Some(response.status),
            reason: "unexpected status for valid times".into(),
        });
    }

    parse_valid_times(source.layer(), &response.body, ctx.config().frame_count)
}

/// Polls once and applies the outcome. On failure the previous axis is kept.
pub async fn poll_once(
    ctx: &LoopContext,
    source: &LayerSource,
    axis: &SharedAxis,
    events: &EventSender,
    listener: Option<&AxisListener>,
) -> Result<bool> {
    match query_valid_times(ctx, source).await {
        Ok(times) => {
            let changed = axis.replace(times);
            log::info!(
                "valid times for {} updated ({} frames, changed: {})",
                source.layer().name,
                axis.load().len(),
                changed
            );
            if let Some(listener) = listener {
                listener(changed);
            }
            events.send(OverlayEvent::TimesUpdated { changed });
            Ok(changed)
        }
        Err(e) => {
            log::warn!("valid times poll for {} failed: {}", source.layer().name, e);
            events.send(OverlayEvent::TimesFailed(e.clone()));
            Err(e)
        }
    }
}

/// Re-polls valid times on a fixed cadence until stopped
pub struct ValidTimesPoller {
    ctx: LoopContext,
    source: Arc<LayerSource>,
    axis: Arc<SharedAxis>,
    events: EventSender,
    listener: Option<AxisListener>,
    task: Option<TaskHandle>,
}

impl ValidTimesPoller {
    pub fn new(ctx: LoopContext, source: Arc<LayerSource>, axis: Arc<SharedAxis>, events: EventSender) -> Self {
        Self {
            ctx,
            source,
            axis,
            events,
            listener: None,
            task: None,
        }
    }

    pub fn with_listener(mut self, listener: AxisListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Starts polling, replacing any running poll loop. With `immediately`
    /// the first poll happens now, otherwise after one interval.
    pub fn start(&mut self, immediately: bool) {
        self.stop();

        let ctx = self.ctx.clone();
        let source = self.source.clone();
        let axis = self.axis.clone();
        let events = self.events.clone();
        let listener = self.listener.clone();
        let period = ctx.config().poll_interval();

        self.task = Some(self.ctx.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !immediately {
                ticker.tick().await;
            }
            loop {
                ticker.tick().await;
                // Failures are reported through events; the next tick retries
                let _ = poll_once(&ctx, &source, &axis, &events, listener.as_ref()).await;
            }
        }));
        log::debug!("valid times polling started for {}", self.source.layer().name);
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
            log::debug!("valid times polling stopped for {}", self.source.layer().name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}
