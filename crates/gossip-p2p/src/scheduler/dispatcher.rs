//! Background task that dials eligible peers.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::directory::ClientDirectory;
use crate::domain::GossipConfig;
use crate::ports::{Connector, TimeSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DispatcherState {
    paused: bool,
    stopped: bool,
}

/// Pause/resume/stop switch shared by the engine and the dispatcher task.
#[derive(Debug)]
pub struct DispatcherControl {
    state: watch::Sender<DispatcherState>,
}

impl Default for DispatcherControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherControl {
    /// Running, not paused.
    pub fn new() -> Self {
        let (state, _) = watch::channel(DispatcherState::default());
        Self { state }
    }

    /// Stop dialing until [`Self::resume`].
    pub fn pause(&self) {
        self.state.send_if_modified(|state| {
            let changed = !state.paused;
            state.paused = true;
            changed
        });
    }

    /// Continue dialing.
    pub fn resume(&self) {
        self.state.send_if_modified(|state| {
            let changed = state.paused;
            state.paused = false;
            changed
        });
    }

    /// End the dispatcher task for good.
    pub fn stop(&self) {
        self.state.send_modify(|state| state.stopped = true);
    }

    /// Whether dialing is paused.
    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    /// Whether the dispatcher was stopped.
    pub fn is_stopped(&self) -> bool {
        self.state.borrow().stopped
    }

    fn subscribe(&self) -> watch::Receiver<DispatcherState> {
        self.state.subscribe()
    }
}

/// Timing of the dispatch loop.
#[derive(Debug, Clone, Copy)]
struct DispatchTiming {
    start_delay: (Duration, Duration),
    burst_tick: Duration,
    idle_tick: Duration,
}

/// The outbound connection dispatcher.
pub struct ConnectionDispatcher {
    directory: Arc<ClientDirectory>,
    connector: Arc<dyn Connector>,
    control: Arc<DispatcherControl>,
    time: Arc<dyn TimeSource>,
    degree: usize,
    timing: DispatchTiming,
}

impl ConnectionDispatcher {
    /// Build a dispatcher over `directory`.
    pub fn new(
        config: &GossipConfig,
        directory: Arc<ClientDirectory>,
        connector: Arc<dyn Connector>,
        control: Arc<DispatcherControl>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            directory,
            connector,
            control,
            time,
            degree: config.degree,
            timing: DispatchTiming {
                start_delay: config.dispatcher_start_delay,
                burst_tick: config.dispatcher_burst_tick,
                idle_tick: config.dispatcher_idle_tick,
            },
        }
    }

    /// Run the loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut state = self.control.subscribe();

        let delay = random_delay(self.timing.start_delay);
        if !sleep_unless_stopped(&mut state, delay).await {
            return;
        }

        let mut burst = self.directory.len().min(self.degree);
        info!(
            peers = self.directory.len(),
            burst, "Outbound connection dispatcher started"
        );

        loop {
            if state.borrow().paused {
                debug!("Dispatcher paused");
                if state
                    .wait_for(|s| !s.paused || s.stopped)
                    .await
                    .is_err()
                {
                    return;
                }
            }
            if state.borrow().stopped {
                break;
            }

            if let Some(context) = self.directory.claim_random_eligible(self.time.now_millis()) {
                debug!(
                    peer = %context.identity(),
                    host = context.host(),
                    port = context.port(),
                    "Dispatching connection attempt"
                );
                self.connector.connect(context);
            }

            let tick = if burst > 0 {
                burst -= 1;
                self.timing.burst_tick
            } else {
                self.timing.idle_tick
            };
            if !sleep_unless_stopped(&mut state, tick).await {
                break;
            }
        }
        info!("Outbound connection dispatcher stopped");
    }
}

fn random_delay((min, max): (Duration, Duration)) -> Duration {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..max)
}

/// Sleep for `duration`; `false` when stopped in the meantime.
async fn sleep_unless_stopped(
    state: &mut watch::Receiver<DispatcherState>,
    duration: Duration,
) -> bool {
    if state.borrow().stopped {
        return false;
    }
    let interrupted = tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = state.wait_for(|s| s.stopped) => true,
    };
    !interrupted && !state.borrow().stopped
}
