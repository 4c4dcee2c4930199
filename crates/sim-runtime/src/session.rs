//! Session actor: the single owner of the simulation state.
//!
//! Every mutation (ticks, player actions, advisor replies, notification
//! expiry) arrives as a message on one queue and is applied in order against
//! the current state. Observers follow along through a `watch` channel.
//! Remote calls run outside the actor and submit their results tagged with
//! the session generation; results from an older generation are dropped.

use crate::config::RuntimeConfig;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sim_ai::{
    chat_request, commentary_request, risk_analysis_request, ResilientClient, ANALYSIS_FALLBACK,
    CHAT_FALLBACK,
};
use sim_core::{
    apply_event, purchase_upgrade, record_rejection, tick, ActionError, ChatAuthor,
    GameEventDefinition, RegionName, SimulationState, TickOutcome, UpgradeKind,
};
use sim_econ::InvestmentKind;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not started, or logged out.
    Idle,
    /// Clock running.
    Running,
    /// Clock reached zero; only a restart leaves this phase.
    Ended,
}

/// What observers see after every processed message.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub phase: Phase,
    pub state: SimulationState,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("session task has stopped")]
    Closed,
    #[error("session is not running")]
    NotRunning,
    #[error("no event at catalog index {0}")]
    UnknownEvent(usize),
    #[error(transparent)]
    Action(#[from] ActionError),
}

type Reply<T = ()> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Start,
    Restart,
    Logout,
    Shutdown,
    /// Replies with the state right after the investment, so follow-up work
    /// is tagged with the generation the investment belongs to.
    Invest {
        kind: InvestmentKind,
        region: RegionName,
        reply: Reply<Snapshot>,
    },
    Upgrade {
        kind: UpgradeKind,
        reply: Reply,
    },
    TriggerEvent {
        index: usize,
        region: RegionName,
        reply: Reply,
    },
    /// Record the player's line (if any) and hand back the current state for
    /// prompt construction.
    Prepare {
        player_text: Option<String>,
        reply: oneshot::Sender<Snapshot>,
    },
    AdvisorReply {
        generation: u64,
        text: String,
    },
}

struct SessionActor {
    config: RuntimeConfig,
    catalog: Vec<GameEventDefinition>,
    state: SimulationState,
    phase: Phase,
    generation: u64,
    rng: ChaCha8Rng,
    ticker: Option<Interval>,
    clears: JoinSet<(u64, u64)>,
    observers: watch::Sender<Snapshot>,
}

impl SessionActor {
    fn new(config: RuntimeConfig) -> (Self, watch::Receiver<Snapshot>) {
        let mut rng = match config.game.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let catalog = config.catalog();
        let state = fresh_state(&config, &mut rng);
        let (observers, rx) = watch::channel(Snapshot {
            generation: 0,
            phase: Phase::Idle,
            state: state.clone(),
        });
        (
            Self {
                config,
                catalog,
                state,
                phase: Phase::Idle,
                generation: 0,
                rng,
                ticker: None,
                clears: JoinSet::new(),
                observers,
            },
            rx,
        )
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!("session task started");
        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                _ = next_tick(&mut self.ticker) => self.on_tick(),
                Some(done) = self.clears.join_next(), if !self.clears.is_empty() => {
                    if let Ok((generation, id)) = done {
                        self.on_clear(generation, id);
                    }
                }
            }
            self.publish();
        }
        self.ticker = None;
        self.clears.abort_all();
        info!(generation = self.generation, "session task stopped");
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.generation,
            phase: self.phase,
            state: self.state.clone(),
        }
    }

    fn publish(&self) {
        self.observers.send_replace(self.snapshot());
    }

    /// Replies go out after the new state is published, so a caller that
    /// reads the snapshot once its request resolves sees its own change.
    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start => {
                if self.phase == Phase::Idle {
                    self.phase = Phase::Running;
                    self.arm_ticker();
                    info!(generation = self.generation, "game started");
                } else {
                    debug!(phase = ?self.phase, "start ignored");
                }
            }
            Command::Restart => {
                self.reset();
                self.phase = Phase::Running;
                self.arm_ticker();
                info!(generation = self.generation, "game restarted");
            }
            Command::Logout => {
                self.reset();
                info!(generation = self.generation, "logged out");
            }
            Command::Shutdown => {}
            Command::Invest {
                kind,
                region,
                reply,
            } => {
                let result = self.invest(kind, region).map(|()| self.snapshot());
                self.publish();
                let _ = reply.send(result);
            }
            Command::Upgrade { kind, reply } => {
                let result = self.upgrade(kind);
                self.publish();
                let _ = reply.send(result);
            }
            Command::TriggerEvent {
                index,
                region,
                reply,
            } => {
                let result = self.trigger_event(index, region);
                self.publish();
                let _ = reply.send(result);
            }
            Command::Prepare { player_text, reply } => {
                if let Some(text) = player_text {
                    self.state.post_chat(ChatAuthor::Player, text);
                }
                self.publish();
                let _ = reply.send(self.snapshot());
            }
            Command::AdvisorReply { generation, text } => {
                if generation == self.generation {
                    self.state.post_chat(ChatAuthor::Advisor, text);
                } else {
                    debug!(
                        stale = generation,
                        current = self.generation,
                        "discarding advisor reply from an earlier session"
                    );
                }
            }
        }
    }

    /// Replace the state wholesale and cancel every timer of the old session.
    fn reset(&mut self) {
        self.generation += 1;
        self.ticker = None;
        self.clears.abort_all();
        self.state = fresh_state(&self.config, &mut self.rng);
        self.phase = Phase::Idle;
    }

    fn arm_ticker(&mut self) {
        let period = self.config.timers.tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn arm_clear(&mut self, id: u64) {
        let ttl: Duration = self.config.timers.notification_ttl();
        let generation = self.generation;
        self.clears.spawn(async move {
            tokio::time::sleep(ttl).await;
            (generation, id)
        });
    }

    fn on_clear(&mut self, generation: u64, id: u64) {
        if generation == self.generation && self.state.clear_notification(id) {
            debug!(id, "notification cleared");
        }
    }

    fn on_tick(&mut self) {
        if self.phase != Phase::Running {
            self.ticker = None;
            return;
        }
        let outcome = tick(&mut self.state, &self.catalog, &mut self.rng);
        if let Some(id) = outcome.notification_id() {
            self.arm_clear(id);
        }
        match outcome {
            TickOutcome::Ended { .. } => {
                self.phase = Phase::Ended;
                self.ticker = None;
                info!(generation = self.generation, "time is up");
            }
            TickOutcome::Advanced { event: Some(e), .. } => {
                info!(region = %e.region, index = e.catalog_index, "random event fired");
            }
            TickOutcome::Advanced { .. } => {}
            TickOutcome::Inactive => {
                self.ticker = None;
            }
        }
    }

    fn require_running(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Running => Ok(()),
            Phase::Ended => Err(SessionError::Action(ActionError::GameOver)),
            Phase::Idle => Err(SessionError::NotRunning),
        }
    }

    fn invest(&mut self, kind: InvestmentKind, region: RegionName) -> Result<(), SessionError> {
        self.require_running()?;
        match sim_econ::invest(&mut self.state, kind, region, &mut self.rng) {
            Ok(n) => {
                let id = n.id;
                self.arm_clear(id);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "investment rejected");
                record_rejection(&mut self.state, &e);
                Err(e.into())
            }
        }
    }

    fn upgrade(&mut self, kind: UpgradeKind) -> Result<(), SessionError> {
        self.require_running()?;
        match purchase_upgrade(&mut self.state, kind) {
            Ok(n) => {
                let id = n.id;
                self.arm_clear(id);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "upgrade rejected");
                record_rejection(&mut self.state, &e);
                Err(e.into())
            }
        }
    }

    fn trigger_event(&mut self, index: usize, region: RegionName) -> Result<(), SessionError> {
        self.require_running()?;
        let def = self
            .catalog
            .get(index)
            .cloned()
            .ok_or(SessionError::UnknownEvent(index))?;
        let id = apply_event(&mut self.state, &def, region).id;
        self.arm_clear(id);
        Ok(())
    }
}

fn fresh_state(config: &RuntimeConfig, rng: &mut ChaCha8Rng) -> SimulationState {
    let mut state = SimulationState::new(&config.game.start);
    sim_econ::seed_history(&mut state, config.game.history_days, rng);
    state
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    advisor: Option<ResilientClient>,
    temperature: f32,
}

impl SessionHandle {
    /// Spawn the session task on the current tokio runtime. The session starts
    /// `Idle`; call [`SessionHandle::start`] to run the clock.
    pub fn spawn(config: RuntimeConfig, advisor: Option<ResilientClient>) -> (Self, JoinHandle<()>) {
        let temperature = config.advisor.temperature;
        let (actor, snapshots) = SessionActor::new(config);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(actor.run(rx));
        (
            Self {
                tx,
                snapshots,
                advisor,
                temperature,
            },
            task,
        )
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every processed message.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.tx.send(cmd).map_err(|_| SessionError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    async fn prepare(&self, player_text: Option<String>) -> Result<Snapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Prepare { player_text, reply })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn start(&self) -> Result<(), SessionError> {
        self.send(Command::Start)
    }

    pub fn restart(&self) -> Result<(), SessionError> {
        self.send(Command::Restart)
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.send(Command::Logout)
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown)
    }

    /// Invest in a region. On success a flavor commentary is requested in the
    /// background; a rejection never touches the network.
    pub async fn invest(
        &self,
        kind: InvestmentKind,
        region: RegionName,
    ) -> Result<(), SessionError> {
        let snap = self
            .request(|reply| Command::Invest {
                kind,
                region,
                reply,
            })
            .await?;
        if let Some(advisor) = self.advisor.clone() {
            let request =
                commentary_request(&snap.state, &format!("{kind} in {region}"), self.temperature);
            let tx = self.tx.clone();
            tokio::spawn(async move {
                if let Some(text) = advisor.generate(&request).await {
                    let _ = tx.send(Command::AdvisorReply {
                        generation: snap.generation,
                        text,
                    });
                }
            });
        }
        Ok(())
    }

    pub async fn purchase_upgrade(&self, kind: UpgradeKind) -> Result<(), SessionError> {
        self.request(|reply| Command::Upgrade { kind, reply }).await
    }

    /// Apply catalog event `index` to `region` through the same path the timer uses.
    pub async fn trigger_event(&self, index: usize, region: RegionName) -> Result<(), SessionError> {
        self.request(|reply| Command::TriggerEvent {
            index,
            region,
            reply,
        })
        .await
    }

    /// Post a chat line and return the advisor's answer (or the fallback).
    pub async fn chat(&self, text: &str) -> Result<String, SessionError> {
        let snap = self.prepare(Some(text.to_string())).await?;
        let request = chat_request(&snap.state, text, self.temperature);
        self.ask(snap.generation, &request, CHAT_FALLBACK).await
    }

    /// Ask the advisor for a regional risk assessment.
    pub async fn analyze_risk(&self) -> Result<String, SessionError> {
        let snap = self.prepare(None).await?;
        let request = risk_analysis_request(&snap.state, self.temperature);
        self.ask(snap.generation, &request, ANALYSIS_FALLBACK).await
    }

    async fn ask(
        &self,
        generation: u64,
        request: &sim_ai::GenerateRequest,
        fallback: &str,
    ) -> Result<String, SessionError> {
        let text = match &self.advisor {
            Some(advisor) => advisor.generate(request).await,
            None => None,
        }
        .unwrap_or_else(|| fallback.to_string());
        self.send(Command::AdvisorReply {
            generation,
            text: text.clone(),
        })?;
        Ok(text)
    }
}
