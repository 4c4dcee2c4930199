#![deny(warnings)]

//! Session runtime for FinanCity: configuration, the state-owning session
//! task, the one-second game clock and notification expiry.

pub mod config;
pub mod session;

pub use config::{AccountsConfig, AdvisorConfig, ConfigError, GameConfig, RuntimeConfig, TimerConfig};
pub use session::{Phase, SessionError, SessionHandle, Snapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sim_ai::{
        ResilientClient, RetryPolicy, Transport, TransportError, TransportResponse, CHAT_FALLBACK,
    };
    use sim_core::{
        ActionError, ChatAuthor, NotificationKind, RegionName, StartingConditions, UpgradeKind,
    };
    use sim_econ::InvestmentKind;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::Poll;
    use std::time::Duration;
    use tokio::time::sleep;

    const OK_BODY: &str = r#"{"candidates":[{"content":{"parts":[{"text":"Diversify."}]}}]}"#;

    /// Answers every call with `OK_BODY` after `delay`, counting calls.
    struct SlowTransport {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowTransport {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn post_json(
            &self,
            _body: &serde_json::Value,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            Ok(TransportResponse::new(200, OK_BODY))
        }
    }

    fn config(duration_secs: u32, money: i64) -> RuntimeConfig {
        let mut cfg = RuntimeConfig::default();
        cfg.game.rng_seed = Some(42);
        cfg.game.start = StartingConditions {
            duration_secs,
            money,
            ..StartingConditions::default()
        };
        cfg
    }

    fn advisor(transport: Arc<SlowTransport>) -> Option<ResilientClient> {
        Some(ResilientClient::new(transport, RetryPolicy::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn clock_counts_down_once_per_second() {
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), None);
        assert_eq!(handle.snapshot().phase, Phase::Idle);
        handle.start().unwrap();
        sleep(Duration::from_millis(3_500)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.phase, Phase::Running);
        assert_eq!(snap.state.time_remaining, 297);
    }

    #[tokio::test(start_paused = true)]
    async fn game_ends_and_clock_stops() {
        let (handle, _task) = SessionHandle::spawn(config(3, 150_000), None);
        handle.start().unwrap();
        sleep(Duration::from_millis(3_500)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.phase, Phase::Ended);
        assert_eq!(snap.state.time_remaining, 0);
        assert!(!snap.state.active);
        assert_eq!(
            snap.state.pending_notification.as_ref().map(|n| n.kind),
            Some(NotificationKind::Informational)
        );

        sleep(Duration::from_secs(10)).await;
        let later = handle.snapshot();
        assert_eq!(later.state.time_remaining, 0);
        assert_eq!(later.phase, Phase::Ended);
        // Terminal notification expired 5 s after it was raised.
        assert!(later.state.pending_notification.is_none());
        assert_eq!(
            handle.invest(InvestmentKind::Stocks, RegionName::Asia).await,
            Err(SessionError::Action(ActionError::GameOver))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unaffordable_investment_is_rejected_locally() {
        let transport = SlowTransport::new(Duration::ZERO);
        let (handle, _task) = SessionHandle::spawn(config(300, 5_000), advisor(transport.clone()));
        handle.start().unwrap();
        let before = handle.snapshot().state;

        let err = handle
            .invest(InvestmentKind::Stocks, RegionName::Europe)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::Action(ActionError::InsufficientFunds {
                need: 10_000,
                have: 5_000
            })
        );
        sleep(Duration::from_millis(10)).await;
        let after = handle.snapshot().state;
        assert_eq!(after.assets, before.assets);
        assert_eq!(after.regions, before.regions);
        assert_eq!(after.market_series, before.market_series);
        let last = after.chat_log.last().unwrap();
        assert_eq!(last.author, ChatAuthor::System);
        assert!(last.text.contains("insufficient funds"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn investment_posts_commentary() {
        let transport = SlowTransport::new(Duration::ZERO);
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), advisor(transport.clone()));
        handle.start().unwrap();
        let history = handle.snapshot().state.market_series.len();
        handle
            .invest(InvestmentKind::Stocks, RegionName::Europe)
            .await
            .unwrap();
        sleep(Duration::from_millis(10)).await;
        let st = handle.snapshot().state;
        assert_eq!(st.assets.money, 140_000);
        assert_eq!(st.market_series.len(), history + 1);
        assert_eq!(transport.calls(), 1);
        assert!(st
            .chat_log
            .iter()
            .any(|m| m.author == ChatAuthor::Advisor && m.text == "Diversify."));
    }

    #[tokio::test(start_paused = true)]
    async fn commentary_for_investment_before_restart_is_discarded() {
        let transport = SlowTransport::new(Duration::from_secs(1));
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), advisor(transport.clone()));
        handle.start().unwrap();

        // A single poll queues the investment; the restart is queued right behind it.
        let mut invest = Box::pin(handle.invest(InvestmentKind::Stocks, RegionName::Asia));
        let queued =
            std::future::poll_fn(|cx| Poll::Ready(invest.as_mut().poll(cx).is_pending())).await;
        assert!(queued);
        handle.restart().unwrap();
        invest.await.unwrap();

        sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.calls(), 1);
        let snap = handle.snapshot();
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.phase, Phase::Running);
        assert_eq!(snap.state.assets.money, 150_000);
        assert!(snap
            .state
            .chat_log
            .iter()
            .all(|m| m.author != ChatAuthor::Advisor));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_without_advisor_falls_back() {
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), None);
        handle.start().unwrap();
        let reply = handle.chat("what now?").await.unwrap();
        assert_eq!(reply, CHAT_FALLBACK);
        sleep(Duration::from_millis(10)).await;
        let log = handle.snapshot().state.chat_log;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].author, ChatAuthor::Player);
        assert_eq!(log[0].text, "what now?");
        assert_eq!(log[1].author, ChatAuthor::Advisor);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reply_after_restart_is_discarded() {
        let transport = SlowTransport::new(Duration::from_secs(2));
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), advisor(transport.clone()));
        handle.start().unwrap();

        let chatter = handle.clone();
        let pending = tokio::spawn(async move { chatter.chat("hello?").await });
        sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.calls(), 1);
        handle.restart().unwrap();

        let reply = pending.await.unwrap().unwrap();
        assert_eq!(reply, "Diversify.");
        sleep(Duration::from_millis(10)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.phase, Phase::Running);
        assert!(snap.state.chat_log.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reply_in_same_session_is_kept() {
        let transport = SlowTransport::new(Duration::from_secs(2));
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), advisor(transport));
        handle.start().unwrap();
        handle.chat("hello?").await.unwrap();
        sleep(Duration::from_millis(10)).await;
        let log = handle.snapshot().state.chat_log;
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].text, "Diversify.");
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_notification_survives_earlier_timer() {
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), None);
        handle.start().unwrap();
        handle.trigger_event(3, RegionName::Asia).await.unwrap();
        let first = handle.snapshot().state.pending_notification.unwrap();
        assert_eq!(first.kind, NotificationKind::Positive);
        assert!(first.message.contains("Asia"));

        sleep(Duration::from_secs(3)).await;
        handle.trigger_event(0, RegionName::Africa).await.unwrap();
        let second = handle.snapshot().state.pending_notification.unwrap();
        assert_ne!(first.id, second.id);

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(
            handle.snapshot().state.pending_notification.map(|n| n.id),
            Some(second.id)
        );
        sleep(Duration::from_secs(3)).await;
        assert!(handle.snapshot().state.pending_notification.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn logout_stops_the_clock_and_resets_state() {
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), None);
        handle.start().unwrap();
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(handle.snapshot().state.time_remaining, 298);
        handle.logout().unwrap();
        sleep(Duration::from_secs(5)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.state.time_remaining, 300);
        assert_eq!(
            handle.purchase_upgrade(UpgradeKind::MediaNetwork).await,
            Err(SessionError::NotRunning)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn upgrades_and_unknown_events() {
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), None);
        handle.start().unwrap();
        handle.purchase_upgrade(UpgradeKind::MediaNetwork).await.unwrap();
        assert_eq!(handle.snapshot().state.assets.research_points, 50);
        assert_eq!(
            handle.purchase_upgrade(UpgradeKind::Lobbyists).await,
            Err(SessionError::Action(ActionError::InsufficientResearch {
                need: 120,
                have: 50
            }))
        );
        assert_eq!(
            handle.trigger_event(99, RegionName::Asia).await,
            Err(SessionError::UnknownEvent(99))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_ticks() {
        let (handle, _task) = SessionHandle::spawn(config(300, 150_000), None);
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        rx.changed().await.unwrap();
        loop {
            let remaining = rx.borrow_and_update().state.time_remaining;
            if remaining < 300 {
                assert_eq!(remaining, 299);
                break;
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_session() {
        let (handle, task) = SessionHandle::spawn(config(300, 150_000), None);
        handle.shutdown().unwrap();
        task.await.unwrap();
        assert_eq!(handle.start(), Err(SessionError::Closed));
    }
}
