//! # 唤醒协调器
//!
//! 冷启动的上游需要反复探测直到就绪。状态机：
//! `Idle → Probing → {Awake, Exhausted}`，探测之间按指数退避等待（上限封顶，
//! 且不超过剩余预算），总耗时受预算约束。
//!
//! 按截止时刻发起的并发唤醒会合并为同一个进行中的循环，前提是该循环不晚于
//! 调用方的截止时刻结束；自定义预算（健康检查 `ms` 参数）的唤醒独立运行。

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use super::checker::Probe;
use super::types::{ProbeOutcome, WakeAttempt, WakeReport, WakeState};
use crate::config::WakeConfig;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

type SharedWake = Shared<BoxFuture<'static, WakeReport>>;

/// 进行中的合并唤醒
struct InFlightWake {
    deadline: Instant,
    future: SharedWake,
}

/// 唤醒协调器
pub struct WakeCoordinator {
    prober: Arc<dyn Probe>,
    config: WakeConfig,
    in_flight: Mutex<Option<InFlightWake>>,
}

impl WakeCoordinator {
    /// 创建协调器
    pub fn new(prober: Arc<dyn Probe>, config: WakeConfig) -> Self {
        Self {
            prober,
            config,
            in_flight: Mutex::new(None),
        }
    }

    /// 唤醒配置
    #[must_use]
    pub const fn config(&self) -> &WakeConfig {
        &self.config
    }

    /// 按默认预算唤醒上游，阻塞直到 Awake 或 Exhausted
    pub async fn wake(&self, request_id: &str) -> WakeReport {
        self.wake_with_budget(request_id, self.config.max_wait()).await
    }

    /// 按指定预算唤醒上游
    pub async fn wake_with_budget(&self, request_id: &str, budget: Duration) -> WakeReport {
        if budget == self.config.max_wait() {
            return self.wake_until(request_id, Instant::now() + budget).await;
        }
        self.run_independent(request_id, budget).await
    }

    /// 唤醒上游，并在截止时刻（加一次探测超时）之前给出结果
    ///
    /// 进行中的循环若不晚于该截止时刻结束，则直接加入。
    pub async fn wake_until(&self, request_id: &str, deadline: Instant) -> WakeReport {
        if !self.config.coalesce {
            let budget = deadline.saturating_duration_since(Instant::now());
            return self.run_independent(request_id, budget).await;
        }
        self.wake_coalesced(request_id, deadline).await
    }

    async fn run_independent(&self, request_id: &str, budget: Duration) -> WakeReport {
        run_wake_loop(
            Arc::clone(&self.prober),
            self.config.clone(),
            budget,
            request_id.to_string(),
        )
        .await
    }

    /// 单次探测，不进入退避循环
    pub async fn probe_once(&self, timeout: Duration) -> ProbeOutcome {
        self.prober.probe(timeout).await
    }

    /// 在后台发起一次探测并立即返回
    ///
    /// 用于在真正需要上游之前提前触发冷启动
    pub fn nudge(&self, request_id: &str) -> JoinHandle<ProbeOutcome> {
        let prober = Arc::clone(&self.prober);
        let timeout = self.config.max_probe_timeout();
        let request_id = request_id.to_string();

        tokio::spawn(async move {
            let outcome = prober.probe(timeout).await;
            ldebug!(
                request_id,
                LogStage::Wake,
                LogComponent::WakeCoordinator,
                "nudge",
                "后台唤醒探测完成",
                outcome = %outcome
            );
            outcome
        })
    }

    async fn wake_coalesced(&self, request_id: &str, deadline: Instant) -> WakeReport {
        let future = {
            let mut slot = self.in_flight.lock().await;
            let now = Instant::now();
            let budget = deadline.saturating_duration_since(now);
            // 已结束或已过期的循环不再复用
            let running = slot
                .as_ref()
                .filter(|wake| wake.future.peek().is_none() && wake.deadline > now)
                .map(|wake| (wake.deadline, wake.future.clone()));

            match running {
                Some((ends_at, future)) if ends_at <= deadline => {
                    ldebug!(
                        request_id,
                        LogStage::Wake,
                        LogComponent::WakeCoordinator,
                        "wake_joined",
                        "加入进行中的唤醒循环"
                    );
                    future
                }
                Some(_) => {
                    drop(slot);
                    return self.run_independent(request_id, budget).await;
                }
                None => {
                    let future = run_wake_loop(
                        Arc::clone(&self.prober),
                        self.config.clone(),
                        budget,
                        request_id.to_string(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(InFlightWake {
                        deadline,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }
}

impl std::fmt::Debug for WakeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// 下一次退避：乘以倍数并封顶
#[must_use]
pub fn next_backoff(current: Duration, config: &WakeConfig) -> Duration {
    current
        .saturating_mul(config.backoff_multiplier.max(1))
        .min(config.max_backoff())
}

/// 单次探测超时：剩余预算限制在 `[min, max]` 内
#[must_use]
pub fn probe_timeout_for(remaining: Duration, config: &WakeConfig) -> Duration {
    remaining
        .max(config.min_probe_timeout())
        .min(config.max_probe_timeout())
}

async fn run_wake_loop(
    prober: Arc<dyn Probe>,
    config: WakeConfig,
    budget: Duration,
    request_id: String,
) -> WakeReport {
    let started = Instant::now();
    let mut attempts: Vec<WakeAttempt> = Vec::new();
    let mut backoff = config.initial_backoff().min(config.max_backoff());
    let mut backoff_before = Duration::ZERO;
    let mut state = WakeState::Idle;

    linfo!(
        request_id,
        LogStage::Wake,
        LogComponent::WakeCoordinator,
        "wake_started",
        "开始唤醒上游",
        state = %state,
        budget_ms = config_ms(budget)
    );

    loop {
        state = WakeState::Probing;
        let remaining = budget.saturating_sub(started.elapsed());
        let outcome = prober.probe(probe_timeout_for(remaining, &config)).await;

        let sequence = u32::try_from(attempts.len() + 1).unwrap_or(u32::MAX);
        attempts.push(WakeAttempt {
            sequence,
            elapsed: started.elapsed(),
            backoff_before,
            outcome: outcome.into(),
        });

        if outcome.is_alive() {
            state = WakeState::Awake;
            let report = finish(state, attempts, started, outcome);
            linfo!(
                request_id,
                LogStage::Wake,
                LogComponent::WakeCoordinator,
                "wake_awake",
                "上游已就绪",
                attempts = report.attempt_count(),
                elapsed_ms = report.elapsed_ms()
            );
            return report;
        }

        let elapsed = started.elapsed();
        if elapsed >= budget {
            state = WakeState::Exhausted;
            let report = finish(state, attempts, started, outcome);
            lwarn!(
                request_id,
                LogStage::Wake,
                LogComponent::WakeCoordinator,
                "wake_exhausted",
                "唤醒预算耗尽，上游仍未就绪",
                attempts = report.attempt_count(),
                elapsed_ms = report.elapsed_ms(),
                last_outcome = %outcome
            );
            return report;
        }

        let delay = backoff.min(budget - elapsed);
        ldebug!(
            request_id,
            LogStage::Wake,
            LogComponent::WakeCoordinator,
            "wake_backoff",
            "探测失败，退避后重试",
            state = %state,
            attempt = sequence,
            outcome = %outcome,
            delay_ms = config_ms(delay)
        );
        sleep(delay).await;
        backoff_before = delay;
        backoff = next_backoff(backoff, &config);
    }
}

fn finish(
    state: WakeState,
    attempts: Vec<WakeAttempt>,
    started: Instant,
    last: ProbeOutcome,
) -> WakeReport {
    WakeReport {
        state,
        attempts,
        elapsed: started.elapsed(),
        last_outcome: Some(last),
    }
}

fn config_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::{AttemptOutcome, UnreachableReason};
    use crate::testing::{ScriptedProber, fast_wake_config};
    use pretty_assertions::assert_eq;

    const UNREACHABLE: ProbeOutcome = ProbeOutcome::Unreachable(UnreachableReason::Connect);

    fn coordinator(prober: &Arc<ScriptedProber>, config: WakeConfig) -> WakeCoordinator {
        WakeCoordinator::new(Arc::clone(prober) as Arc<dyn Probe>, config)
    }

    #[test]
    fn test_next_backoff_is_capped() {
        let config = WakeConfig::default();
        let mut backoff = config.initial_backoff();
        let mut seen = vec![backoff];
        for _ in 0..6 {
            backoff = next_backoff(backoff, &config);
            seen.push(backoff);
        }
        let secs: Vec<u64> = seen.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 8, 8, 8]);
    }

    #[test]
    fn test_probe_timeout_is_clamped() {
        let config = WakeConfig::default();
        assert_eq!(
            probe_timeout_for(Duration::from_secs(60), &config),
            Duration::from_secs(15)
        );
        assert_eq!(
            probe_timeout_for(Duration::from_millis(10), &config),
            Duration::from_secs(1)
        );
        assert_eq!(
            probe_timeout_for(Duration::from_secs(4), &config),
            Duration::from_secs(4)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_awake_after_failures() {
        let failures = 4;
        let prober = Arc::new(ScriptedProber::failing_then_alive(UNREACHABLE, failures));
        let report = coordinator(&prober, WakeConfig::default()).wake("t").await;

        assert_eq!(report.state, WakeState::Awake);
        assert_eq!(report.attempts.len(), failures + 1);
        assert_eq!(report.attempts.last().unwrap().outcome, AttemptOutcome::Alive);

        let delays: Vec<Duration> = report.attempts.iter().map(|a| a.backoff_before).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]), "delays must not decrease: {delays:?}");
        assert!(delays.iter().all(|d| *d <= WakeConfig::default().max_backoff()));
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_exhausts_within_budget_plus_probe_timeout() {
        // 每次探测都耗尽自己的超时
        let prober = Arc::new(ScriptedProber::always(UNREACHABLE).with_latency(Duration::from_secs(30)));
        let config = WakeConfig {
            max_wait_ms: 20_000,
            ..WakeConfig::default()
        };
        let start = Instant::now();
        let report = coordinator(&prober, config.clone()).wake("t").await;
        let wall = start.elapsed();

        assert_eq!(report.state, WakeState::Exhausted);
        assert!(report.ended_unreachable());
        assert!(wall >= config.max_wait(), "exhausted too early: {wall:?}");
        assert!(
            wall <= config.max_wait() + config.max_probe_timeout(),
            "exhausted too late: {wall:?}"
        );
        assert!(prober.timeouts().iter().all(|t| {
            *t >= config.min_probe_timeout() && *t <= config.max_probe_timeout()
        }));
        assert_eq!(prober.timeouts().first(), Some(&config.max_probe_timeout()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_on_transient_status_is_not_unreachable() {
        let prober = Arc::new(ScriptedProber::always(ProbeOutcome::TransientError(503)));
        let report = coordinator(&prober, fast_wake_config())
            .wake_with_budget("t", Duration::from_secs(3))
            .await;

        assert_eq!(report.state, WakeState::Exhausted);
        assert!(!report.ended_unreachable());
        assert!(report.attempts.iter().all(|a| a.outcome == AttemptOutcome::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_probes_once() {
        let prober = Arc::new(ScriptedProber::always(UNREACHABLE));
        let report = coordinator(&prober, WakeConfig::default())
            .wake_with_budget("t", Duration::ZERO)
            .await;
        assert_eq!(report.state, WakeState::Exhausted);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_default_wakes_share_one_loop() {
        let prober = Arc::new(
            ScriptedProber::failing_then_alive(UNREACHABLE, 2).with_latency(Duration::from_millis(50)),
        );
        let coordinator = coordinator(&prober, WakeConfig::default());

        let (a, b, c) = tokio::join!(
            coordinator.wake("a"),
            coordinator.wake("b"),
            coordinator.wake("c")
        );

        assert!(a.is_awake() && b.is_awake() && c.is_awake());
        assert_eq!(a, b);
        assert_eq!(prober.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_deadline_joins_running_wake() {
        let prober = Arc::new(
            ScriptedProber::failing_then_alive(UNREACHABLE, 2).with_latency(Duration::from_millis(50)),
        );
        let coordinator = coordinator(&prober, WakeConfig::default());
        let later = Instant::now() + coordinator.config().max_wait() + Duration::from_secs(1);

        let (a, b) = tokio::join!(coordinator.wake("a"), coordinator.wake_until("b", later));

        assert_eq!(a, b);
        assert_eq!(prober.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_does_not_wait_for_running_wake() {
        let prober = Arc::new(ScriptedProber::always(UNREACHABLE));
        let config = fast_wake_config();
        let probe_timeout = config.max_probe_timeout();
        let coordinator = coordinator(&prober, config);
        let short = Instant::now() + Duration::from_millis(100);

        let (long_report, short_report) =
            tokio::join!(coordinator.wake("long"), coordinator.wake_until("short", short));

        assert_eq!(short_report.state, WakeState::Exhausted);
        assert!(short_report.elapsed <= Duration::from_millis(100) + probe_timeout);
        assert!(short_report.elapsed < long_report.elapsed);
        assert!(long_report.elapsed >= coordinator.config().max_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_budget_wakes_run_independently() {
        let prober = Arc::new(ScriptedProber::always(ProbeOutcome::Alive));
        let coordinator = coordinator(&prober, WakeConfig::default());

        let (a, b) = tokio::join!(
            coordinator.wake_with_budget("a", Duration::from_secs(5)),
            coordinator.wake_with_budget("b", Duration::from_secs(5))
        );

        assert!(a.is_awake() && b.is_awake());
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalescing_can_be_disabled() {
        let prober = Arc::new(ScriptedProber::always(ProbeOutcome::Alive));
        let config = WakeConfig {
            coalesce: false,
            ..WakeConfig::default()
        };
        let coordinator = coordinator(&prober, config);

        let _ = tokio::join!(coordinator.wake("a"), coordinator.wake("b"));
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_wake_is_not_reused() {
        let prober = Arc::new(ScriptedProber::always(ProbeOutcome::Alive));
        let coordinator = coordinator(&prober, WakeConfig::default());

        coordinator.wake("a").await;
        coordinator.wake("b").await;
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_returns_immediately() {
        let prober = Arc::new(ScriptedProber::always(ProbeOutcome::Alive).with_latency(Duration::from_secs(2)));
        let coordinator = coordinator(&prober, WakeConfig::default());

        let before = Instant::now();
        let handle = coordinator.nudge("startup");
        assert_eq!(before.elapsed(), Duration::ZERO);

        assert_eq!(handle.await.unwrap(), ProbeOutcome::Alive);
        assert_eq!(prober.calls(), 1);
    }
}
