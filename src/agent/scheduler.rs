//! Wall-clock driver for the lifecycle controller.
//!
//! Trigger instants come from the broker's market clock:
//! - initialize at `next_open - init_lead`
//! - start trading at `next_open - arm_lead`
//! - liquidate at `next_close - liquidate_lead`
//!
//! Waits are split into sleeps no longer than the poll interval, re-reading the
//! market clock between them.

use crate::agent::config::ScheduleSettings;
use crate::agent::controller::LifecycleController;
use crate::domain::error::TraderError;
use crate::domain::lifecycle::DayPhase;
use crate::ports::broker_port::MarketStatus;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Initialize,
    StartTrading,
    Tick,
    Liquidate,
    Close,
    Rollover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub due_at: DateTime<Utc>,
}

/// Next action for `phase` given the market clock.
///
/// `liquidate_at` is the cutoff fixed when trading started; `completed_close` is the
/// close of the last session already traded, which keeps a rollover inside an open
/// session from re-initializing it.
pub fn plan(
    phase: DayPhase,
    status: &MarketStatus,
    schedule: &ScheduleSettings,
    liquidate_at: Option<DateTime<Utc>>,
    completed_close: Option<DateTime<Utc>>,
    next_tick_at: DateTime<Utc>,
) -> Step {
    let now = status.timestamp;
    let step = |action, due_at| Step { action, due_at };

    match phase {
        DayPhase::Idle => {
            let cutoff = status.next_close - schedule.liquidate_lead;
            let late_start =
                status.is_open && now < cutoff && completed_close != Some(status.next_close);
            if late_start {
                step(Action::Initialize, now)
            } else {
                step(Action::Initialize, status.next_open - schedule.init_lead)
            }
        }
        // Interrupted initialization; the controller rejects a second attempt.
        DayPhase::Initializing => step(Action::Initialize, now),
        DayPhase::Armed => {
            if status.is_open {
                step(Action::StartTrading, now)
            } else {
                step(Action::StartTrading, status.next_open - schedule.arm_lead)
            }
        }
        DayPhase::Trading => {
            let cutoff =
                liquidate_at.unwrap_or_else(|| status.next_close - schedule.liquidate_lead);
            if now >= cutoff {
                step(Action::Liquidate, now)
            } else {
                step(Action::Tick, next_tick_at.min(cutoff))
            }
        }
        DayPhase::Liquidating => step(Action::Close, now),
        DayPhase::Closed => step(Action::Rollover, now),
    }
}

pub struct Scheduler {
    schedule: ScheduleSettings,
    tick_interval: Duration,
    anchor: Option<(DateTime<Utc>, Instant)>,
    last_status: Option<MarketStatus>,
    liquidate_at: Option<DateTime<Utc>>,
    completed_close: Option<DateTime<Utc>>,
    next_tick_at: Option<DateTime<Utc>>,
    sessions_completed: usize,
}

impl Scheduler {
    pub fn new(schedule: ScheduleSettings, tick_interval: Duration) -> Self {
        Self {
            schedule,
            tick_interval,
            anchor: None,
            last_status: None,
            liquidate_at: None,
            completed_close: None,
            next_tick_at: None,
            sessions_completed: 0,
        }
    }

    pub fn sessions_completed(&self) -> usize {
        self.sessions_completed
    }

    /// Broker time extrapolated from the last market-status read.
    fn now(&self) -> DateTime<Utc> {
        match self.anchor {
            Some((at, instant)) => {
                at + chrono::Duration::from_std(instant.elapsed()).unwrap_or_default()
            }
            None => Utc::now(),
        }
    }

    async fn refresh(&mut self, controller: &LifecycleController) -> Result<MarketStatus, TraderError> {
        let status = controller.broker_status().await?;
        self.anchor = Some((status.timestamp, Instant::now()));
        self.last_status = Some(status.clone());
        Ok(status)
    }

    /// Drives `controller` until `max_sessions` full sessions have closed (when set)
    /// or `shutdown` resolves. Lifecycle errors end the run; market-clock failures
    /// are retried after the poll interval.
    pub async fn run<F>(
        &mut self,
        controller: &mut LifecycleController,
        max_sessions: Option<usize>,
        shutdown: F,
    ) -> Result<(), TraderError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        match controller.recover_late_start().await {
            Ok(true) => {
                let status = self.refresh(controller).await?;
                self.liquidate_at = Some(status.next_close - self.schedule.liquidate_lead);
            }
            Ok(false) => {}
            Err(e @ TraderError::MarketStatusUnavailable { .. }) => {
                log::warn!("Late-start check skipped: {}", e);
            }
            Err(e) => return Err(e),
        }

        loop {
            if max_sessions.is_some_and(|max| self.sessions_completed >= max) {
                log::info!("Completed {} session(s); stopping", self.sessions_completed);
                return Ok(());
            }

            let status = match &self.last_status {
                Some(status) if controller.phase() == DayPhase::Trading => {
                    let mut status = status.clone();
                    status.timestamp = self.now();
                    status
                }
                _ => match self.refresh(controller).await {
                    Ok(status) => status,
                    Err(e) => {
                        log::warn!("Market clock unavailable: {}; retrying", e);
                        tokio::select! {
                            _ = &mut shutdown => return Ok(()),
                            _ = tokio::time::sleep(self.schedule.poll_interval) => continue,
                        }
                    }
                },
            };

            let step = plan(
                controller.phase(),
                &status,
                &self.schedule,
                self.liquidate_at,
                self.completed_close,
                self.next_tick_at.unwrap_or(status.timestamp),
            );

            if step.due_at > status.timestamp {
                let wait = (step.due_at - status.timestamp)
                    .to_std()
                    .unwrap_or_default();
                let wait = if step.action == Action::Tick {
                    wait
                } else {
                    log::debug!("Next {:?} at {} (in {:?})", step.action, step.due_at, wait);
                    self.last_status = None;
                    wait.min(self.schedule.poll_interval)
                };
                tokio::select! {
                    _ = &mut shutdown => {
                        log::info!("Shutdown requested in phase {}", controller.phase());
                        return Ok(());
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
                continue;
            }

            self.execute(controller, step.action, &status).await?;
        }
    }

    async fn execute(
        &mut self,
        controller: &mut LifecycleController,
        action: Action,
        status: &MarketStatus,
    ) -> Result<(), TraderError> {
        match action {
            Action::Initialize => {
                controller.initialize().await?;
            }
            Action::StartTrading => {
                controller.start_trading()?;
                self.liquidate_at = Some(status.next_close - self.schedule.liquidate_lead);
                self.next_tick_at = None;
            }
            Action::Tick => {
                controller.run_tick().await;
                let interval = chrono::Duration::from_std(self.tick_interval).unwrap_or_default();
                self.next_tick_at = Some(self.now() + interval);
            }
            Action::Liquidate => {
                controller.liquidate().await?;
            }
            Action::Close => {
                controller.close()?;
                self.completed_close = self
                    .liquidate_at
                    .take()
                    .map(|cutoff| cutoff + self.schedule.liquidate_lead);
                self.next_tick_at = None;
                self.last_status = None;
            }
            Action::Rollover => {
                controller.rollover()?;
                self.sessions_completed += 1;
            }
        }
        Ok(())
    }
}
