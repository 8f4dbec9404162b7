// ================================
// src/task.rs - 취소 가능한 벽 추종 태스크
// ================================
//! 제어 주기를 감싸는 목표/피드백/취소/결과 프로토콜
//!
//! 수락된 목표마다 tokio 런타임 위에서 루프 하나가 돕니다. 루프는 새 스냅샷마다
//! 한 번 판단하고, 취소와 종료, 회피 대기 만료가 오면 바로 깨어납니다.

use crate::{
    config::WallTrackingParams,
    control::{VelocityCommand, VelocityLimits},
    decider::{Detection, Mode, NavigationDecider},
    error::Result,
    shared::SharedState,
};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, warn};

/// 시작 요청. 인자는 없습니다
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationGoal;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationFeedback {
    pub reached_open_place: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationResult {
    pub success: bool,
}

/// 태스크의 출력: 구동 명령과 프로토콜 메시지
pub trait CommandSink: Send + Sync + 'static {
    fn publish_velocity(&self, command: VelocityCommand) -> Result<()>;
    fn publish_detection(&self, detection: Detection) -> Result<()>;
    fn publish_feedback(&self, feedback: NavigationFeedback) -> Result<()>;
    fn publish_result(&self, result: NavigationResult) -> Result<()>;
}

/// 실행 중인 목표 하나의 핸들
pub struct GoalHandle {
    cancel_tx: Arc<watch::Sender<bool>>,
    join: JoinHandle<NavigationResult>,
}

impl GoalHandle {
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 최종 결과를 기다립니다. 비정상 종료한 루프는 실패로 봅니다
    pub async fn result(self) -> NavigationResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Task loop ended abnormally: {}", e);
                NavigationResult { success: false }
            }
        }
    }
}

struct LoopContext<S> {
    shared: Arc<SharedState>,
    decider: Arc<Mutex<NavigationDecider>>,
    sink: Arc<S>,
    limits: VelocityLimits,
    settle: Duration,
}

impl<S> Clone for LoopContext<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            decider: self.decider.clone(),
            sink: self.sink.clone(),
            limits: self.limits,
            settle: self.settle,
        }
    }
}

/// 러너가 추적하는 현재 목표
struct ActiveGoal {
    cancel_tx: Arc<watch::Sender<bool>>,
    // closed once the goal's loop has published its result
    finished: watch::Receiver<()>,
}

impl ActiveGoal {
    fn is_running(&self) -> bool {
        !*self.cancel_tx.borrow() && self.finished.has_changed().is_ok()
    }
}

pub struct TaskRunner<S> {
    ctx: LoopContext<S>,
    runtime: Handle,
    active: Mutex<Option<ActiveGoal>>,
}

impl<S: CommandSink> TaskRunner<S> {
    /// tokio 런타임 안에서 호출해야 합니다
    pub fn new(
        params: &WallTrackingParams,
        shared: Arc<SharedState>,
        sink: Arc<S>,
    ) -> Result<Self> {
        Self::with_runtime(params, shared, sink, Handle::current())
    }

    pub fn with_runtime(
        params: &WallTrackingParams,
        shared: Arc<SharedState>,
        sink: Arc<S>,
        runtime: Handle,
    ) -> Result<Self> {
        Ok(Self {
            ctx: LoopContext {
                shared,
                decider: Arc::new(Mutex::new(NavigationDecider::new(params))),
                sink,
                limits: VelocityLimits::from_params(params),
                settle: params.avoid_settle()?,
            },
            runtime,
            active: Mutex::new(None),
        })
    }

    /// 목표는 항상 수락합니다. 실행 중인 목표는 먼저 취소하고,
    /// 그 루프가 정지 명령과 결과를 발행한 뒤에 새 루프를 시작합니다.
    pub fn accept(&self, _goal: NavigationGoal) -> GoalHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);
        let (finished_tx, finished) = watch::channel(());

        let previous = self.active().replace(ActiveGoal {
            cancel_tx: cancel_tx.clone(),
            finished,
        });
        let predecessor = previous.map(|previous| {
            if previous.is_running() {
                info!("Superseding running goal");
            }
            previous.cancel_tx.send_replace(true);
            previous.finished
        });

        let ctx = self.ctx.clone();
        let join = self.runtime.spawn(async move {
            if let Some(mut finished) = predecessor {
                // never sent on; resolves when the previous loop drops its sender
                let _ = finished.changed().await;
            }
            let result = execute(ctx, cancel_rx).await;
            drop(finished_tx);
            result
        });
        GoalHandle { cancel_tx, join }
    }

    /// 실행 중인 목표를 취소합니다. 취소 요청은 항상 수락합니다.
    pub fn cancel_active(&self) -> bool {
        info!("Received request to cancel goal");
        match self.active().as_ref() {
            Some(goal) if goal.is_running() => {
                goal.cancel_tx.send_replace(true);
                true
            }
            _ => false,
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveGoal>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: CommandSink> LoopContext<S> {
    fn send_velocity(&self, command: VelocityCommand) {
        if let Err(e) = self.sink.publish_velocity(self.limits.clamp(command)) {
            warn!("Failed to publish velocity: {}", e);
        }
    }

    fn finish(&self, success: bool) -> NavigationResult {
        let result = NavigationResult { success };
        if let Err(e) = self.sink.publish_result(result) {
            warn!("Failed to publish result: {}", e);
        }
        result
    }

    /// 최신 스냅샷으로 한 번 판단합니다. 스캔이 있었다면 모드를 반환합니다
    fn run_cycle(&self) -> Option<Mode> {
        let scan = self.shared.latest_scan()?;
        let outdoor = self.shared.environment().outdoor;

        let output = self
            .decider
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cycle(&scan, outdoor);
        debug!(
            "scan {:.3}: mode: {:?}, detection: {}, cmd: ({:.3}, {:.3})",
            scan.stamp(),
            output.decision.mode,
            output.decision.detection,
            output.command.linear,
            output.command.angular
        );

        self.send_velocity(output.command);
        if let Err(e) = self.sink.publish_detection(output.decision.detection) {
            warn!("Failed to publish detection: {}", e);
        }
        Some(output.decision.mode)
    }
}

async fn execute<S: CommandSink>(
    ctx: LoopContext<S>,
    mut cancel_rx: watch::Receiver<bool>,
) -> NavigationResult {
    info!("EXECUTE");
    let mut scans = ctx.shared.subscribe_scans();
    let mut live = ctx.shared.subscribe_live();
    let mut abandoned = false;
    // end of the settle period after a front avoidance
    let mut hold_until: Option<Instant> = None;

    loop {
        let is_live = *live.borrow();
        if !is_live {
            break;
        }

        let canceled = abandoned || *cancel_rx.borrow();
        if canceled {
            ctx.send_velocity(VelocityCommand::STOP);
            info!("Goal Canceled");
            return ctx.finish(false);
        }

        let feedback = NavigationFeedback {
            reached_open_place: ctx.shared.environment().open_place,
        };
        if let Err(e) = ctx.sink.publish_feedback(feedback) {
            warn!("Failed to publish feedback: {}", e);
        }

        scans.borrow_and_update();
        if hold_until.is_some_and(|t| Instant::now() >= t) {
            hold_until = None;
        }
        if hold_until.is_none() && ctx.run_cycle() == Some(Mode::FrontAvoid) {
            hold_until = Some(Instant::now() + ctx.settle);
        }

        tokio::select! {
            res = scans.changed() => {
                if res.is_err() {
                    break;
                }
            }
            res = cancel_rx.changed() => {
                abandoned = res.is_err();
            }
            res = live.changed() => {
                if res.is_err() {
                    break;
                }
            }
            _ = sleep_until(hold_until.unwrap_or_else(Instant::now)), if hold_until.is_some() => {}
        }
    }

    info!("Goal Succeeded");
    ctx.finish(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_params;
    use crate::error::WallTrackingError;
    use crate::lidar::tests::scan_from_fn;

    #[derive(Default)]
    struct Recorder {
        velocities: Mutex<Vec<VelocityCommand>>,
        feedback: Mutex<Vec<NavigationFeedback>>,
        results: Mutex<Vec<NavigationResult>>,
    }

    impl CommandSink for Recorder {
        fn publish_velocity(&self, command: VelocityCommand) -> Result<()> {
            self.velocities.lock().unwrap().push(command);
            Ok(())
        }
        fn publish_detection(&self, _detection: Detection) -> Result<()> {
            Ok(())
        }
        fn publish_feedback(&self, feedback: NavigationFeedback) -> Result<()> {
            self.feedback.lock().unwrap().push(feedback);
            Ok(())
        }
        fn publish_result(&self, result: NavigationResult) -> Result<()> {
            self.results.lock().unwrap().push(result);
            Ok(())
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_command_before_first_scan() {
        let shared = Arc::new(SharedState::new(3.0));
        let sink = Arc::new(Recorder::default());
        let runner = TaskRunner::new(&test_params(), shared.clone(), sink.clone()).unwrap();

        let handle = runner.accept(NavigationGoal);
        settle().await;
        assert!(!sink.feedback.lock().unwrap().is_empty());
        assert!(sink.velocities.lock().unwrap().is_empty());

        shared.on_scan(scan_from_fn(|_| 9.0));
        settle().await;
        assert_eq!(sink.velocities.lock().unwrap().len(), 1);

        handle.cancel();
        assert_eq!(handle.result().await, NavigationResult { success: false });
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_goal_is_canceled() {
        let shared = Arc::new(SharedState::new(3.0));
        let sink = Arc::new(Recorder::default());
        let runner = TaskRunner::new(&test_params(), shared.clone(), sink.clone()).unwrap();

        let handle = runner.accept(NavigationGoal);
        settle().await;
        drop(handle);
        drop(runner);
        settle().await;
        assert_eq!(
            sink.velocities.lock().unwrap().last(),
            Some(&VelocityCommand::STOP)
        );
        assert_eq!(
            sink.results.lock().unwrap().as_slice(),
            &[NavigationResult { success: false }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn new_goal_supersedes_running_one() {
        let shared = Arc::new(SharedState::new(3.0));
        let sink = Arc::new(Recorder::default());
        let runner = TaskRunner::new(&test_params(), shared.clone(), sink.clone()).unwrap();

        let first = runner.accept(NavigationGoal);
        let second = runner.accept(NavigationGoal);
        assert_eq!(first.result().await, NavigationResult { success: false });
        assert!(!second.is_finished());

        assert!(runner.cancel_active());
        assert_eq!(second.result().await, NavigationResult { success: false });
        assert!(!runner.cancel_active());
    }

    #[tokio::test]
    async fn unusable_settle_time_is_rejected() {
        let mut params = test_params();
        params.avoid_settle_secs = 1e20;
        let shared = Arc::new(SharedState::new(3.0));
        let result = TaskRunner::new(&params, shared, Arc::new(Recorder::default()));
        assert!(matches!(result, Err(WallTrackingError::Config(_))));
    }
}
