//! The explain / rest / countdown state machine.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::{EventBus, LiveEvent, NoticeLevel};
use crate::gateway::{CommerceGateway, GatewayError};
use crate::metrics::{COUNTDOWN_COMPLETIONS, EXPLAIN_CALLS};
use crate::session::{NarrationItem, SessionView};

use super::{
    ControllerSnapshot, CountdownPhase, CountdownState, CyclePhase, ExplainConfig, ExplainError,
    SwitchOutcome,
};

/// Countdown bookkeeping on the monotonic clock.
#[derive(Debug, Default)]
struct Countdown {
    phase: CountdownPhase,
    deadline: Option<Instant>,
    paused_remaining_secs: Option<u64>,
}

#[derive(Debug)]
struct ControllerState {
    phase: CyclePhase,
    /// Narration pointer into the session's script (or product) list.
    index: usize,
    auto_advance: bool,
    /// When the current product went on air, for the manual-next gate.
    explain_started: Option<Instant>,
    /// Last explain begin/end actually sent to the backend.
    last_call: Option<Instant>,
    /// Token of the explain call awaiting the backend. The state lock is not
    /// held across that await.
    in_flight: Option<u64>,
    call_seq: u64,
    countdown: Countdown,
    /// Bumped whenever the countdown is replaced or cancelled; a timer task
    /// only acts while its generation is current.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Drives narration of the active session's products.
///
/// At most one countdown task exists at a time. Starting a countdown,
/// pausing, or stopping cancels the previous one. Countdown completion
/// drives the cycle: prepare starts narration, explain ends it, rest moves
/// to the next script and starts it after a short settle delay.
#[derive(Clone)]
pub struct ExplainCycleController {
    gateway: Arc<dyn CommerceGateway>,
    view: SessionView,
    events: Arc<dyn EventBus<LiveEvent>>,
    config: ExplainConfig,
    state: Arc<Mutex<ControllerState>>,
}

impl ExplainCycleController {
    pub fn new(
        gateway: Arc<dyn CommerceGateway>,
        view: SessionView,
        events: Arc<dyn EventBus<LiveEvent>>,
        config: ExplainConfig,
    ) -> Self {
        let state = ControllerState {
            phase: CyclePhase::Idle,
            index: 0,
            auto_advance: config.auto_advance,
            explain_started: None,
            last_call: None,
            in_flight: None,
            call_seq: 0,
            countdown: Countdown::default(),
            generation: 0,
            timer: None,
        };
        Self {
            gateway,
            view,
            events,
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Current phase, pointer and countdown.
    pub async fn snapshot(&self) -> ControllerSnapshot {
        let st = self.state.lock().await;
        ControllerSnapshot {
            phase: st.phase.clone(),
            index: st.index,
            auto_advance: st.auto_advance,
            countdown: countdown_state(&st.countdown),
        }
    }

    pub async fn phase(&self) -> CyclePhase {
        self.state.lock().await.phase.clone()
    }

    /// Item under the narration pointer.
    pub async fn current_item(&self) -> Option<NarrationItem> {
        let index = self.state.lock().await.index;
        self.view.narration_item(index).await
    }

    /// Begin narrating `product_id`, or the item under the pointer.
    ///
    /// Valid from idle, preparing or resting. A backend "already
    /// explaining" answer is treated as success.
    pub async fn start(&self, product_id: Option<String>) -> Result<CyclePhase, ExplainError> {
        let (live_id, item, token) = {
            let mut st = self.state.lock().await;
            match st.phase {
                CyclePhase::Idle | CyclePhase::Preparing | CyclePhase::Resting => {}
                ref other => {
                    return Err(ExplainError::InvalidState {
                        op: "start",
                        phase: other.name(),
                    })
                }
            }
            ensure_no_call(&st)?;

            let live_id = self
                .view
                .active_id()
                .await
                .ok_or(ExplainError::NoActiveSession)?;
            let item = self.resolve_item(&mut st, product_id).await?;
            self.check_rate_limit(&mut st, "begin")?;
            (live_id, item, claim_call(&mut st))
        };

        let result = self.gateway.explain_begin(&live_id, &item.product_id).await;

        let mut st = self.state.lock().await;
        if !release_call(&mut st, token) {
            warn!(
                "Narration stopped while starting {}; ignoring backend answer",
                item.product_id
            );
            return Err(ExplainError::Interrupted("start"));
        }
        match result {
            Ok(()) => {
                EXPLAIN_CALLS.with_label_values(&["begin", "ok"]).inc();
            }
            Err(GatewayError::AlreadyExplaining(_)) => {
                warn!(
                    "Backend reports {} already on air; resynchronizing",
                    item.product_id
                );
                EXPLAIN_CALLS.with_label_values(&["begin", "self_healed"]).inc();
            }
            Err(e) => {
                EXPLAIN_CALLS.with_label_values(&["begin", "error"]).inc();
                self.notify(NoticeLevel::Error, format!("Failed to start narration: {}", e));
                return Err(e.into());
            }
        }

        info!(
            "Explaining {} ({}) at position {}",
            item.product_id, item.title, item.index
        );
        self.enter_explaining(&mut st, item.product_id);
        Ok(st.phase.clone())
    }

    /// Finish narrating the product on air.
    ///
    /// With auto-advance on the controller rests and then moves on;
    /// otherwise it goes idle. A backend "not started" answer is treated as
    /// already ended and leaves the controller idle.
    pub async fn end(&self, product_id: Option<String>) -> Result<CyclePhase, ExplainError> {
        let (live_id, current, token) = {
            let mut st = self.state.lock().await;
            let current = match st.phase.explaining_product() {
                Some(current) => current.to_string(),
                None => {
                    return Err(ExplainError::InvalidState {
                        op: "end",
                        phase: st.phase.name(),
                    })
                }
            };
            if let Some(requested) = product_id {
                if requested != current {
                    return Err(ExplainError::ProductMismatch(requested));
                }
            }
            ensure_no_call(&st)?;

            let live_id = self
                .view
                .active_id()
                .await
                .ok_or(ExplainError::NoActiveSession)?;
            self.check_rate_limit(&mut st, "end")?;
            (live_id, current, claim_call(&mut st))
        };

        let result = self.gateway.explain_end(&live_id, &current).await;

        let mut st = self.state.lock().await;
        if !release_call(&mut st, token) {
            warn!(
                "Narration stopped while ending {}; ignoring backend answer",
                current
            );
            return Err(ExplainError::Interrupted("end"));
        }
        match result {
            Ok(()) => {
                EXPLAIN_CALLS.with_label_values(&["end", "ok"]).inc();
                info!("Finished explaining {}", current);
                self.after_explain(&mut st);
            }
            Err(GatewayError::NotStarted(_)) => {
                warn!(
                    "Backend reports {} was not on air; resynchronizing to idle",
                    current
                );
                EXPLAIN_CALLS.with_label_values(&["end", "self_healed"]).inc();
                self.enter_idle(&mut st);
            }
            Err(e) => {
                EXPLAIN_CALLS.with_label_values(&["end", "error"]).inc();
                self.notify(NoticeLevel::Error, format!("Failed to end narration: {}", e));
                return Err(e.into());
            }
        }

        Ok(st.phase.clone())
    }

    /// Move the pointer forward.
    ///
    /// Refused while auto-advance is on and the product on air (paused or
    /// not) started less than the minimum explain duration ago.
    pub async fn switch_next(&self) -> SwitchOutcome {
        let mut st = self.state.lock().await;

        if st.auto_advance && st.phase.on_air_product().is_some() {
            let min = Duration::from_secs(self.config.min_explain_duration_secs);
            let elapsed = st
                .explain_started
                .map(|started| started.elapsed())
                .unwrap_or(min);
            if elapsed < min {
                let remaining_secs = (min - elapsed).as_secs_f64().ceil() as u64;
                debug!("Manual next refused, {}s of minimum narration left", remaining_secs);
                return SwitchOutcome::Rejected { remaining_secs };
            }
        }

        let len = self.view.narration_len().await;
        if st.index + 1 >= len {
            return SwitchOutcome::AtBoundary { index: st.index };
        }
        st.index += 1;
        self.events
            .publish(LiveEvent::ScriptIndexChanged { index: st.index });
        SwitchOutcome::Moved { index: st.index }
    }

    /// Move the pointer back. Never time-gated.
    pub async fn switch_prev(&self) -> SwitchOutcome {
        let mut st = self.state.lock().await;
        if st.index == 0 {
            return SwitchOutcome::AtBoundary { index: 0 };
        }
        st.index -= 1;
        self.events
            .publish(LiveEvent::ScriptIndexChanged { index: st.index });
        SwitchOutcome::Moved { index: st.index }
    }

    /// Freeze the running countdown.
    pub async fn pause(&self) -> Result<CyclePhase, ExplainError> {
        let mut st = self.state.lock().await;
        ensure_no_call(&st)?;
        let deadline = match (&st.phase, st.countdown.deadline) {
            (CyclePhase::Paused { .. }, _) | (_, None) => {
                return Err(ExplainError::InvalidState {
                    op: "pause",
                    phase: st.phase.name(),
                })
            }
            (_, Some(deadline)) => deadline,
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let remaining_secs = remaining.as_secs_f64().ceil() as u64;
        let countdown_phase = st.countdown.phase;
        self.cancel_countdown(&mut st);
        st.countdown.phase = countdown_phase;
        st.countdown.paused_remaining_secs = Some(remaining_secs);

        let prior = std::mem::replace(&mut st.phase, CyclePhase::Idle);
        st.phase = CyclePhase::Paused {
            remaining_secs,
            prior: Box::new(prior),
        };
        info!(
            "Paused {} countdown with {}s remaining",
            countdown_phase.as_str(),
            remaining_secs
        );
        self.publish_phase(&st);
        self.publish_countdown(&st);
        Ok(st.phase.clone())
    }

    /// Continue a paused countdown from where it stopped.
    pub async fn resume(&self) -> Result<CyclePhase, ExplainError> {
        let mut st = self.state.lock().await;
        ensure_no_call(&st)?;
        let (remaining_secs, prior) = match std::mem::replace(&mut st.phase, CyclePhase::Idle) {
            CyclePhase::Paused {
                remaining_secs,
                prior,
            } => (remaining_secs, prior),
            other => {
                let phase = other.name();
                st.phase = other;
                return Err(ExplainError::InvalidState { op: "resume", phase });
            }
        };

        st.phase = *prior;
        let countdown_phase = st.countdown.phase;
        self.spawn_countdown(&mut st, countdown_phase, Duration::from_secs(remaining_secs));
        info!(
            "Resumed {} countdown with {}s remaining",
            countdown_phase.as_str(),
            remaining_secs
        );
        self.publish_phase(&st);
        self.publish_countdown(&st);
        Ok(st.phase.clone())
    }

    /// Count down to the active session's scheduled start, then start
    /// narrating the item under the pointer.
    pub async fn prepare(&self) -> Result<CyclePhase, ExplainError> {
        let mut st = self.state.lock().await;
        ensure_no_call(&st)?;
        if st.phase != CyclePhase::Idle {
            return Err(ExplainError::InvalidState {
                op: "prepare",
                phase: st.phase.name(),
            });
        }
        if self.view.active_id().await.is_none() {
            return Err(ExplainError::NoActiveSession);
        }
        let until_start = self
            .view
            .scheduled_start()
            .await
            .and_then(|at| (at - Utc::now()).to_std().ok())
            .filter(|d| !d.is_zero())
            .ok_or(ExplainError::NoSchedule)?;

        st.phase = CyclePhase::Preparing;
        self.spawn_countdown(&mut st, CountdownPhase::Prepare, until_start);
        info!("Preparing, broadcast starts in {:?}", until_start);
        self.publish_phase(&st);
        self.publish_countdown(&st);
        Ok(st.phase.clone())
    }

    /// Cancel any countdown and pending rest-to-next chain and go idle.
    ///
    /// Does not tell the backend; a later start resynchronizes if the
    /// backend still has a product on air.
    pub async fn stop(&self) {
        let mut st = self.state.lock().await;
        info!("Stopping narration cycle (was {})", st.phase.name());
        st.in_flight = None;
        self.enter_idle(&mut st);
    }

    /// Stop and move the pointer back to the first item.
    pub async fn reset(&self) {
        let mut st = self.state.lock().await;
        st.in_flight = None;
        self.enter_idle(&mut st);
        if st.index != 0 {
            st.index = 0;
            self.events.publish(LiveEvent::ScriptIndexChanged { index: 0 });
        }
    }

    pub async fn set_auto_advance(&self, enabled: bool) {
        let mut st = self.state.lock().await;
        st.auto_advance = enabled;
        info!("Auto-advance {}", if enabled { "enabled" } else { "disabled" });
    }

    // ------------------------------------------------------------------
    // Transitions (caller holds the state lock)
    // ------------------------------------------------------------------

    fn enter_explaining(&self, st: &mut ControllerState, product_id: String) {
        self.cancel_countdown(st);
        st.explain_started = Some(Instant::now());
        st.phase = CyclePhase::Explaining {
            product_id,
            started_at: Utc::now(),
        };
        match self.config.explain_duration_secs {
            Some(secs) if st.auto_advance => {
                self.spawn_countdown(st, CountdownPhase::Explain, Duration::from_secs(secs));
            }
            _ => st.countdown.phase = CountdownPhase::Explain,
        }
        self.publish_phase(st);
        self.publish_countdown(st);
    }

    fn after_explain(&self, st: &mut ControllerState) {
        if !st.auto_advance {
            self.enter_idle(st);
            return;
        }
        self.cancel_countdown(st);
        st.explain_started = None;
        st.phase = CyclePhase::Resting;
        self.spawn_countdown(
            st,
            CountdownPhase::Rest,
            Duration::from_secs(self.config.rest_duration_secs),
        );
        self.publish_phase(st);
        self.publish_countdown(st);
    }

    fn enter_idle(&self, st: &mut ControllerState) {
        self.cancel_countdown(st);
        st.explain_started = None;
        st.phase = CyclePhase::Idle;
        self.publish_phase(st);
        self.publish_countdown(st);
    }

    async fn resolve_item(
        &self,
        st: &mut ControllerState,
        product_id: Option<String>,
    ) -> Result<NarrationItem, ExplainError> {
        let Some(product_id) = product_id else {
            return self
                .view
                .narration_item(st.index)
                .await
                .ok_or(ExplainError::NoScript(st.index));
        };

        let len = self.view.narration_len().await;
        for index in 0..len {
            if let Some(item) = self.view.narration_item(index).await {
                if item.product_id == product_id {
                    if st.index != index {
                        st.index = index;
                        self.events.publish(LiveEvent::ScriptIndexChanged { index });
                    }
                    return Ok(item);
                }
            }
        }
        Err(ExplainError::UnknownProduct(product_id))
    }

    /// Reject calls closer than the minimum spacing; otherwise record the
    /// dispatch time.
    fn check_rate_limit(
        &self,
        st: &mut ControllerState,
        operation: &'static str,
    ) -> Result<(), ExplainError> {
        let spacing = Duration::from_millis(self.config.min_call_spacing_ms);
        let now = Instant::now();
        if let Some(last) = st.last_call {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < spacing {
                let retry_after_ms = (spacing - elapsed).as_millis() as u64;
                EXPLAIN_CALLS
                    .with_label_values(&[operation, "rate_limited"])
                    .inc();
                self.notify(
                    NoticeLevel::Warning,
                    format!("Too fast, wait {} ms before trying again", retry_after_ms),
                );
                return Err(ExplainError::RateLimited { retry_after_ms });
            }
        }
        st.last_call = Some(now);
        Ok(())
    }

    /// Time left before the rate limiter accepts another call.
    fn until_call_allowed(&self, st: &ControllerState) -> Duration {
        let spacing = Duration::from_millis(self.config.min_call_spacing_ms);
        st.last_call
            .map(|last| (last + spacing).saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Countdown
    // ------------------------------------------------------------------

    fn cancel_countdown(&self, st: &mut ControllerState) {
        st.generation += 1;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
        st.countdown.deadline = None;
        st.countdown.paused_remaining_secs = None;
    }

    fn spawn_countdown(&self, st: &mut ControllerState, phase: CountdownPhase, duration: Duration) {
        self.cancel_countdown(st);
        st.countdown.phase = phase;
        st.countdown.deadline = Some(Instant::now() + duration);
        debug!("{} countdown started for {:?}", phase.as_str(), duration);

        let generation = st.generation;
        st.timer = Some(tokio::spawn(self.clone().run_countdown(generation)));
    }

    /// Tick until the deadline passes, then act on the completed phase.
    fn run_countdown(self, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            let tick = Duration::from_millis(self.config.tick_interval_ms.max(1));
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let phase = loop {
                interval.tick().await;
                let mut st = self.state.lock().await;
                if st.generation != generation {
                    return;
                }
                let Some(deadline) = st.countdown.deadline else {
                    return;
                };
                if Instant::now() >= deadline {
                    st.countdown.deadline = None;
                    self.publish_countdown(&st);
                    break st.countdown.phase;
                }
            };

            COUNTDOWN_COMPLETIONS
                .with_label_values(&[phase.as_str()])
                .inc();
            debug!("{} countdown finished", phase.as_str());

            match phase {
                CountdownPhase::Prepare => self.finish_prepare(generation).await,
                CountdownPhase::Explain => self.finish_explain(generation).await,
                CountdownPhase::Rest => self.finish_rest(generation).await,
            }
        }
        .boxed()
    }

    /// Forget the timer handle so the running task survives the transition
    /// it is about to trigger. Returns false if the task was superseded.
    async fn detach_timer(&self, generation: u64) -> bool {
        let mut st = self.state.lock().await;
        if st.generation != generation {
            return false;
        }
        st.timer.take();
        true
    }

    async fn finish_prepare(&self, generation: u64) {
        let delay = {
            let st = self.state.lock().await;
            if st.generation != generation {
                return;
            }
            self.until_call_allowed(&st)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if !self.detach_timer(generation).await {
            return;
        }
        info!("Scheduled start reached");
        match self.start(None).await {
            Ok(_) => {}
            Err(ExplainError::CallInFlight) => {
                debug!("A manual start is in progress, leaving it to finish");
            }
            Err(e) => {
                warn!("Could not start narration at scheduled start: {}", e);
                self.fall_back_to_idle(&CyclePhase::Preparing).await;
            }
        }
    }

    async fn finish_explain(&self, generation: u64) {
        if !self.detach_timer(generation).await {
            return;
        }
        match self.end(None).await {
            Ok(_) => {}
            Err(ExplainError::CallInFlight) => {
                debug!("A manual end is in progress, leaving it to finish");
            }
            Err(e) => {
                warn!("Could not end narration on timeout: {}", e);
                self.notify(
                    NoticeLevel::Error,
                    format!("Narration time is up but ending failed: {}", e),
                );
            }
        }
    }

    async fn finish_rest(&self, generation: u64) {
        let delay = {
            let mut st = self.state.lock().await;
            if st.generation != generation {
                return;
            }
            if st.in_flight.is_some() {
                debug!("A manual start is in progress, skipping the chained start");
                st.timer.take();
                return;
            }
            let len = self.view.narration_len().await;
            if st.index + 1 >= len {
                info!("Rest finished on the last script, narration cycle complete");
                st.timer.take();
                self.enter_idle(&mut st);
                return;
            }
            st.index += 1;
            self.events
                .publish(LiveEvent::ScriptIndexChanged { index: st.index });
            Duration::from_millis(self.config.settle_delay_ms).max(self.until_call_allowed(&st))
        };

        tokio::time::sleep(delay).await;

        if !self.detach_timer(generation).await {
            return;
        }
        match self.start(None).await {
            Ok(_) => {}
            Err(ExplainError::CallInFlight) => {
                debug!("A manual start is in progress, leaving it to finish");
            }
            Err(e) => {
                warn!("Could not start next narration: {}", e);
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not start the next product: {}", e),
                );
                self.fall_back_to_idle(&CyclePhase::Resting).await;
            }
        }
    }

    async fn fall_back_to_idle(&self, expected: &CyclePhase) {
        let mut st = self.state.lock().await;
        if &st.phase == expected {
            self.enter_idle(&mut st);
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn publish_phase(&self, st: &ControllerState) {
        self.events.publish(LiveEvent::PhaseChanged {
            phase: st.phase.clone(),
            product_id: st.phase.explaining_product().map(str::to_string),
        });
    }

    fn publish_countdown(&self, st: &ControllerState) {
        self.events.publish(LiveEvent::CountdownChanged {
            countdown: countdown_state(&st.countdown),
        });
    }

    fn notify(&self, level: NoticeLevel, message: String) {
        self.events.publish(LiveEvent::Notice { level, message });
    }
}

fn ensure_no_call(st: &ControllerState) -> Result<(), ExplainError> {
    match st.in_flight {
        Some(_) => Err(ExplainError::CallInFlight),
        None => Ok(()),
    }
}

fn claim_call(st: &mut ControllerState) -> u64 {
    st.call_seq += 1;
    st.in_flight = Some(st.call_seq);
    st.call_seq
}

/// False when stop or reset orphaned the call.
fn release_call(st: &mut ControllerState, token: u64) -> bool {
    if st.in_flight == Some(token) {
        st.in_flight = None;
        true
    } else {
        false
    }
}

/// Project the monotonic deadline onto the wall clock.
fn countdown_state(countdown: &Countdown) -> CountdownState {
    let target_epoch_ms = countdown.deadline.map(|deadline| {
        let remaining = deadline.saturating_duration_since(Instant::now());
        Utc::now().timestamp_millis() + remaining.as_millis() as i64
    });
    CountdownState {
        target_epoch_ms,
        running: countdown.deadline.is_some(),
        paused: countdown.paused_remaining_secs.is_some(),
        paused_remaining_secs: countdown.paused_remaining_secs,
        phase: countdown.phase,
    }
}
