//! Reconciles the pool of virtual users to the ramp schedule.
mod timer;

use crate::error::IterationError;
use crate::ramp::{RampSchedule, RampState};
use crate::recorder::Gauge;
use crate::scenario::Executor;
use crate::transport::Transport;
use futures_util::FutureExt;
use stampede_core::RAMP_TICK;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use timer::Timer;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, debug_span, error, info, instrument, trace, warn, Instrument};

pub(crate) struct Driver<C> {
    schedule: RampSchedule,
    executor: Arc<Executor<C>>,
    think_time: Duration,
    graceful_stop: Duration,
    vus: Arc<Gauge>,
    active: Vec<VirtualUser>,
    retiring: Vec<VirtualUser>,
    next_id: usize,
}

struct VirtualUser {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl VirtualUser {
    fn stop(&self) {
        // NOTE: Errors only when the task has already exited.
        let _ = self.stop.send(true);
    }
}

impl<C> Driver<C>
where
    C: Transport + Sync + 'static,
{
    pub fn new(
        schedule: RampSchedule,
        executor: Arc<Executor<C>>,
        think_time: Duration,
        graceful_stop: Duration,
        vus: Arc<Gauge>,
    ) -> Self {
        Self {
            schedule,
            executor,
            think_time,
            graceful_stop,
            vus,
            active: vec![],
            retiring: vec![],
            next_id: 0,
        }
    }

    /// Runs the whole schedule, then drains the pool. Returns the wall time of the load phase.
    #[instrument(name = "driver", skip_all)]
    pub async fn run(mut self) -> Duration {
        let start = Instant::now();
        let mut timer = Timer::new(RAMP_TICK).await;
        let mut current_stage = None;

        loop {
            match self.schedule.state_at(start.elapsed()) {
                RampState::Running { stage, target } => {
                    if current_stage != Some(stage) {
                        current_stage = Some(stage);
                        if let Some(s) = self.schedule.stage(stage) {
                            info!(
                                "Stage {}/{}: ramping to {} virtual users over {:?}",
                                stage + 1,
                                self.schedule.stage_count(),
                                s.target,
                                s.duration
                            );
                        }
                    }
                    self.set_concurrency(target);
                }
                RampState::Finished => break,
            }
            timer.tick().await;
        }

        let elapsed = start.elapsed();
        info!("Ramp finished after {elapsed:?}");
        self.shutdown().await;
        elapsed
    }

    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.retiring.retain(|vu| !vu.handle.is_finished());

        if self.active.len() > concurrency {
            for vu in self.active.drain(concurrency..) {
                vu.stop();
                self.retiring.push(vu);
            }
        } else {
            while self.active.len() < concurrency {
                let vu = self.spawn_vu();
                self.active.push(vu);
            }
        }

        self.vus.set(self.active.len() as u64);
    }

    pub fn concurrency(&self) -> usize {
        self.active.len()
    }

    fn spawn_vu(&mut self) -> VirtualUser {
        let id = self.next_id;
        self.next_id += 1;
        trace!("Spawning virtual user {id}");

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(
            vu_loop(self.executor.clone(), self.think_time, stop_rx).instrument(debug_span!("vu", id)),
        );

        VirtualUser { stop, handle }
    }

    async fn shutdown(mut self) {
        for vu in self.active.drain(..) {
            vu.stop();
            self.retiring.push(vu);
        }
        self.vus.set(0);

        let in_flight = self
            .retiring
            .iter()
            .filter(|vu| !vu.handle.is_finished())
            .count();
        if in_flight == 0 {
            return;
        }
        debug!(
            "Waiting up to {:?} for {in_flight} in-flight iterations",
            self.graceful_stop
        );

        let retiring = &mut self.retiring;
        let drained = tokio::time::timeout(self.graceful_stop, async {
            for vu in retiring.iter_mut() {
                if let Err(err) = (&mut vu.handle).await {
                    error!("Virtual user exited abnormally: {err}");
                }
            }
        })
        .await;

        if drained.is_err() {
            let abandoned = self
                .retiring
                .iter()
                .filter(|vu| !vu.handle.is_finished())
                .count();
            warn!(
                "Graceful stop of {:?} elapsed, abandoning {abandoned} in-flight iterations.",
                self.graceful_stop
            );
            for vu in &self.retiring {
                vu.handle.abort();
            }
        }
    }
}

async fn vu_loop<C>(executor: Arc<Executor<C>>, think_time: Duration, mut stop: watch::Receiver<bool>)
where
    C: Transport + Sync + 'static,
{
    loop {
        if *stop.borrow() {
            break;
        }

        match AssertUnwindSafe(executor.run_iteration())
            .catch_unwind()
            .await
        {
            Ok(result) => trace!(
                "Iteration finished in {:?} ({} groups)",
                result.duration,
                result.groups.len()
            ),
            Err(panic) => error!("{}", IterationError::from_panic(&*panic)),
        }

        tokio::select! {
            _ = tokio::time::sleep(think_time) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
