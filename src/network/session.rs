//! Trivia Session
//!
//! Binds the trivia state to the chat transport across three threads of
//! control: the background scheduler task, whatever task delivers chat
//! events, and the controlling task waiting for logout.
//!
//! All round and score state sits behind one mutex. The scheduler task
//! takes it for each tick and releases it before sending anything, so a
//! slow send never holds up answer handling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn, instrument};

use crate::core::clock::Clock;
use crate::core::rng::derive_session_seed;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::scoreboard::AnswerOutcome;
use crate::game::state::{SchedulerConfig, TriviaState};
use crate::game::tick::tick;
use crate::network::protocol::ChatEvent;
use crate::network::transport::ChatTransport;
use crate::{DEFAULT_NICKNAME, POLLING_PERIOD_MS};

/// Configuration for a trivia session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The bot's own nickname.
    pub nickname: String,
    /// Channel the bot plays in (without `#`).
    pub channel: String,
    /// How often the scheduler re-checks its deadlines.
    pub polling_period: Duration,
    /// Round timing.
    pub scheduler: SchedulerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            nickname: DEFAULT_NICKNAME.to_string(),
            channel: String::new(),
            polling_period: Duration::from_millis(POLLING_PERIOD_MS),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Handle on the running scheduler task.
struct Worker {
    /// Stop signal.
    shutdown_tx: broadcast::Sender<()>,
    /// Task to join on stop.
    handle: JoinHandle<()>,
}

/// The coordinator for one channel.
pub struct TriviaSession<T: ChatTransport, C: Clock + 'static> {
    /// Session configuration.
    config: SessionConfig,
    /// Round, score and scheduler state.
    state: Arc<Mutex<TriviaState>>,
    /// Outbound chat.
    transport: Arc<T>,
    /// Time source.
    clock: Arc<C>,
    /// Scheduler task, while running.
    worker: Mutex<Option<Worker>>,
    /// Set once the chat session has ended.
    logged_out: watch::Sender<bool>,
}

impl<T: ChatTransport, C: Clock + 'static> TriviaSession<T, C> {
    /// Create a session. The scheduler does not run until the bot joins.
    pub fn new(config: SessionConfig, transport: Arc<T>, clock: Arc<C>) -> Self {
        let (logged_out, _) = watch::channel(false);

        Self {
            state: Arc::new(Mutex::new(TriviaState::new(config.scheduler))),
            config,
            transport,
            clock,
            worker: Mutex::new(None),
            logged_out,
        }
    }

    /// Dispatch a chat event.
    pub async fn handle_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::Login => self.on_login().await,
            ChatEvent::Logout => {
                self.on_logout().await;
            }
            ChatEvent::Join { channel, user } => self.on_join(&channel, &user).await,
            ChatEvent::Leave { channel, user } => self.on_leave(&channel, &user).await,
            ChatEvent::Message { channel, user, text } => {
                self.on_message(&channel, &user, &text).await;
            }
        }
    }

    /// Authenticated: start the scheduler and join the configured channel.
    pub async fn on_login(&self) {
        info!("Logged in.");
        if let Err(e) = self.transport.join_channel(&self.config.channel) {
            warn!("Unable to join #{}: {}", self.config.channel, e);
        }
        self.start_worker().await;
    }

    /// Session ended: stop the scheduler and wake anyone awaiting logout.
    ///
    /// Returns `true` only for the call that actually logged out.
    pub async fn on_logout(&self) -> bool {
        if *self.logged_out.borrow() {
            return false;
        }
        self.stop_worker().await;

        let first = self.logged_out.send_if_modified(|logged_out| {
            if *logged_out {
                false
            } else {
                *logged_out = true;
                true
            }
        });
        if first {
            info!("Logged out.");
        }
        first
    }

    /// Someone joined; if it is us, start the scheduler.
    pub async fn on_join(&self, channel: &str, user: &str) {
        if self.is_self(user) {
            info!("Joined #{}", channel);
            self.start_worker().await;
        }
    }

    /// Someone left; if it is us, stop the scheduler.
    pub async fn on_leave(&self, channel: &str, user: &str) {
        if self.is_self(user) {
            info!("Left #{}", channel);
            self.stop_worker().await;
        }
    }

    /// Treat a chat message as a possible answer.
    pub async fn on_message(&self, channel: &str, user: &str, text: &str) -> AnswerOutcome {
        debug!("{} said in channel \"{}\", \"{}\"", user, channel, text);

        let (outcome, event) = {
            let mut state = self.state.lock().await;
            state.submit_answer(user, text)
        };
        if let Some(event) = event {
            log_event(&event);
        }
        outcome
    }

    /// Start the scheduler if it is not running.
    ///
    /// The first question is due immediately.
    pub async fn start_worker(&self) -> bool {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return false;
        }

        let seed = derive_session_seed(&self.config.channel, Utc::now().timestamp());
        {
            let mut state = self.state.lock().await;
            state.start(self.clock.now(), seed);
        }
        info!("Scheduler started (seed {})", hex::encode(seed.to_le_bytes()));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_worker(
            self.state.clone(),
            self.transport.clone(),
            self.clock.clone(),
            self.config.channel.clone(),
            self.config.polling_period,
            shutdown_rx,
        ));

        *worker = Some(Worker { shutdown_tx, handle });
        true
    }

    /// Stop the scheduler and wait for it to exit.
    pub async fn stop_worker(&self) -> bool {
        let mut worker = self.worker.lock().await;
        let Some(Worker { shutdown_tx, handle }) = worker.take() else {
            return false;
        };

        let _ = shutdown_tx.send(());
        if let Err(e) = handle.await {
            warn!("Scheduler task failed: {}", e);
        }
        info!("Scheduler stopped");
        true
    }

    /// Signal the scheduler to stop without waiting for it.
    ///
    /// For callers that cannot await, such as `Drop`. Does nothing if a
    /// start or stop is in progress on another task.
    pub fn request_stop(&self) {
        if let Ok(worker) = self.worker.try_lock() {
            if let Some(worker) = worker.as_ref() {
                let _ = worker.shutdown_tx.send(());
            }
        }
    }

    /// Whether the scheduler task is running.
    pub async fn is_worker_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Whether the chat session has ended.
    pub fn is_logged_out(&self) -> bool {
        *self.logged_out.borrow()
    }

    /// Wait up to `timeout` for the chat session to end.
    pub async fn await_log_out(&self, timeout: Duration) -> bool {
        let mut rx = self.logged_out.subscribe();
        let outcome = tokio::time::timeout(timeout, rx.wait_for(|logged_out| *logged_out)).await;
        matches!(outcome, Ok(Ok(_)))
    }

    /// Read the trivia state under the lock.
    pub async fn with_state<R>(&self, f: impl FnOnce(&TriviaState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Twitch reports logins in lowercase.
    fn is_self(&self, user: &str) -> bool {
        user.eq_ignore_ascii_case(&self.config.nickname)
    }
}

/// Scheduler loop: tick on every polling period until told to stop.
#[instrument(skip_all, fields(channel = %channel))]
async fn run_worker<T: ChatTransport, C: Clock>(
    state: Arc<Mutex<TriviaState>>,
    transport: Arc<T>,
    clock: Arc<C>,
    channel: String,
    polling_period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval(polling_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {}
        }

        // Transitions commit entirely under the lock
        let result = {
            let mut state = state.lock().await;
            tick(&mut state, clock.now())
        };

        for event in &result.events {
            log_event(event);
        }

        if let Some(text) = result.chat_text() {
            if let Err(e) = transport.send_message(&channel, &text) {
                warn!("Unable to send to #{}: {}", channel, e);
            }
        }
    }
}

/// Log a game event at the level it deserves.
fn log_event(event: &GameEvent) {
    match &event.data {
        GameEventData::RoundOpened { round_id, question, answer, scoring_at, next_question_at } => {
            info!(
                round = event.round,
                %round_id,
                scoring_at, next_question_at,
                "Asking: {} (answer {})", question, answer
            );
        }
        GameEventData::AnswerAccepted { nickname } => {
            info!(round = event.round, "Winner: {}", nickname);
        }
        GameEventData::AnswerRejected { nickname } => {
            info!(round = event.round, "Loser: {}", nickname);
        }
        GameEventData::RoundScored { round_id, announcement, participants, .. } => {
            info!(round = event.round, %round_id, participants, "Results: {}", announcement);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use crate::core::clock::ManualClock;
    use crate::game::state::RoundPhase;
    use crate::network::transport::TransportError;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Message { channel: String, text: String },
        Join(String),
        LogOut(String),
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<Sent>>,
    }

    impl RecordingTransport {
        fn messages(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| match s {
                    Sent::Message { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ChatTransport for RecordingTransport {
        fn send_message(&self, channel: &str, text: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(Sent::Message {
                channel: channel.to_string(),
                text: text.to_string(),
            });
            Ok(())
        }

        fn join_channel(&self, channel: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(Sent::Join(channel.to_string()));
            Ok(())
        }

        fn log_out(&self, farewell: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(Sent::LogOut(farewell.to_string()));
            Ok(())
        }
    }

    type TestSession = TriviaSession<RecordingTransport, ManualClock>;

    fn create_test_session() -> (Arc<TestSession>, Arc<RecordingTransport>, ManualClock) {
        let transport = Arc::new(RecordingTransport::default());
        let clock = ManualClock::new(0.0);
        let config = SessionConfig {
            nickname: "MathBot2001".into(),
            channel: "mathchannel".into(),
            polling_period: Duration::from_millis(5),
            scheduler: SchedulerConfig::default(),
        };
        let session = TriviaSession::new(config, transport.clone(), Arc::new(clock.clone()));
        (Arc::new(session), transport, clock)
    }

    async fn wait_for_messages(transport: &RecordingTransport, count: usize) -> Vec<String> {
        for _ in 0..400 {
            let messages = transport.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        transport.messages()
    }

    fn answer_for(question: &str) -> String {
        let body = question
            .strip_prefix("What is ")
            .and_then(|s| s.strip_suffix('?'))
            .unwrap();
        let (product, c) = body.split_once(" + ").unwrap();
        let (a, b) = product.split_once(" * ").unwrap();
        let a: i64 = a.parse().unwrap();
        let b: i64 = b.parse().unwrap();
        let c: i64 = c.parse().unwrap();
        (a * b + c).to_string()
    }

    async fn join_and_ask(session: &TestSession, transport: &RecordingTransport) -> String {
        session.on_join("mathchannel", "mathbot2001").await;
        let messages = wait_for_messages(transport, 1).await;
        assert_eq!(messages.len(), 1);
        messages[0].clone()
    }

    #[tokio::test]
    async fn test_login_joins_channel() {
        let (session, transport, _) = create_test_session();

        session.handle_event(ChatEvent::Login).await;
        assert_eq!(transport.sent()[0], Sent::Join("mathchannel".into()));
        assert!(session.is_worker_running().await);

        // Our own join afterwards is a no-op
        session.on_join("mathchannel", "mathbot2001").await;
        let messages = wait_for_messages(&transport, 1).await;
        assert_eq!(messages.len(), 1);
        session.stop_worker().await;
    }

    #[tokio::test]
    async fn test_own_join_starts_scheduler() {
        let (session, transport, _) = create_test_session();

        // Someone else joining does nothing
        session.on_join("mathchannel", "alice").await;
        assert!(!session.is_worker_running().await);

        let question = join_and_ask(&session, &transport).await;
        assert!(question.starts_with("What is "));
        assert!(session.is_worker_running().await);
        assert_eq!(session.with_state(|s| s.phase()).await, RoundPhase::Open);

        // Joining again does not restart
        assert!(!session.start_worker().await);
        session.stop_worker().await;
    }

    #[tokio::test]
    async fn test_winner_and_loser_announcement() {
        let (session, transport, clock) = create_test_session();
        let question = join_and_ask(&session, &transport).await;
        let answer = answer_for(&question);
        let wrong = (answer.parse::<i64>().unwrap() + 1).to_string();

        assert_eq!(session.on_message("mathchannel", "bob", &wrong).await, AnswerOutcome::Incorrect);
        assert_eq!(session.on_message("mathchannel", "alice", &answer).await, AnswerOutcome::Correct);
        assert_eq!(session.on_message("mathchannel", "alice", &answer).await, AnswerOutcome::RoundClosed);

        clock.advance(15.0);
        let messages = wait_for_messages(&transport, 2).await;
        assert_eq!(messages[1], "Congratulations, alice! (now at 1 point) bob (-1 -> -1).");

        let (alice, bob) = session
            .with_state(|s| {
                (
                    s.scoreboard().contestant("alice").unwrap().points,
                    s.scoreboard().contestant("bob").unwrap().points,
                )
            })
            .await;
        assert_eq!((alice, bob), (1, -1));
        session.stop_worker().await;
    }

    #[tokio::test]
    async fn test_timeout_without_answers() {
        let (session, transport, clock) = create_test_session();
        join_and_ask(&session, &transport).await;

        assert_eq!(session.on_message("mathchannel", "carol", "hello").await, AnswerOutcome::NotAnAnswer);

        clock.advance(15.0);
        let messages = wait_for_messages(&transport, 2).await;
        assert_eq!(messages[1], "No winners this round.");
        assert_eq!(session.with_state(|s| s.scoreboard().contestant_count()).await, 0);
        session.stop_worker().await;
    }

    #[tokio::test]
    async fn test_next_question_after_cooldown() {
        let (session, transport, clock) = create_test_session();
        let first = join_and_ask(&session, &transport).await;

        let next_at = session.with_state(|s| s.next_question_time()).await;
        clock.set(next_at);
        let messages = wait_for_messages(&transport, 3).await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], "No winners this round.");
        assert!(messages[2].starts_with("What is "));
        assert_ne!(answer_for(&messages[2]), answer_for(&first));
        session.stop_worker().await;
    }

    #[tokio::test]
    async fn test_leave_stops_scheduler() {
        let (session, transport, clock) = create_test_session();
        join_and_ask(&session, &transport).await;

        session.handle_event(ChatEvent::Leave {
            channel: "mathchannel".into(),
            user: "mathbot2001".into(),
        }).await;
        assert!(!session.is_worker_running().await);

        clock.advance(1000.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (session, transport, _) = create_test_session();
        join_and_ask(&session, &transport).await;

        assert!(!session.await_log_out(Duration::from_millis(20)).await);

        assert!(session.on_logout().await);
        assert!(!session.on_logout().await);
        assert!(session.is_logged_out());
        assert!(!session.is_worker_running().await);
        assert!(session.await_log_out(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_logout_wakes_waiter() {
        let (session, _, _) = create_test_session();

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.await_log_out(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.handle_event(ChatEvent::Logout).await;

        assert!(waiter.await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_correct_answers_single_winner() {
        let (session, transport, _) = create_test_session();
        let question = join_and_ask(&session, &transport).await;
        let answer = answer_for(&question);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let session = session.clone();
                let answer = answer.clone();
                tokio::spawn(async move {
                    session.on_message("mathchannel", &format!("user{:02}", i), &answer).await
                })
            })
            .collect();

        let mut correct = 0;
        for handle in handles {
            if handle.await.unwrap() == AnswerOutcome::Correct {
                correct += 1;
            }
        }
        assert_eq!(correct, 1);

        let participants = session.with_state(|s| s.scoreboard().participants().count()).await;
        assert_eq!(participants, 1);
        session.stop_worker().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_answer_racing_scoring_deadline_scored_once() {
        for _ in 0..10 {
            let (session, transport, clock) = create_test_session();
            let question = join_and_ask(&session, &transport).await;
            let answer = answer_for(&question);

            let answering = {
                let session = session.clone();
                tokio::spawn(async move {
                    session.on_message("mathchannel", "alice", &answer).await
                })
            };
            let closing = {
                let clock = clock.clone();
                tokio::spawn(async move { clock.set(15.0) })
            };
            let outcome = answering.await.unwrap();
            closing.await.unwrap();

            let messages = wait_for_messages(&transport, 2).await;
            tokio::time::sleep(Duration::from_millis(30)).await;
            assert_eq!(transport.messages().len(), 2);

            let points = session
                .with_state(|s| s.scoreboard().contestant("alice").map(|c| c.points))
                .await;
            match outcome {
                AnswerOutcome::Correct => {
                    assert_eq!(messages[1], "Congratulations, alice! (now at 1 point).");
                    assert_eq!(points, Some(1));
                }
                AnswerOutcome::RoundClosed => {
                    assert_eq!(messages[1], "No winners this round.");
                    assert_eq!(points, None);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
            session.stop_worker().await;
        }
    }

    #[tokio::test]
    async fn test_request_stop_ends_scheduler() {
        let (session, transport, _) = create_test_session();
        join_and_ask(&session, &transport).await;

        session.request_stop();
        for _ in 0..100 {
            if !session.is_worker_running().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!session.is_worker_running().await);
    }

    #[tokio::test]
    async fn test_answers_before_first_question_ignored() {
        let (session, _, _) = create_test_session();

        assert_eq!(session.on_message("mathchannel", "alice", "42").await, AnswerOutcome::RoundClosed);
        assert_eq!(session.with_state(|s| s.scoreboard().contestant_count()).await, 0);
    }
}
