// ================================
// src/node.rs - ROS2 노드 관리
// ================================
use geometry_msgs::msg::Twist;
use rclrs::*;
use sensor_msgs::msg::{LaserScan, NavSatFix};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use std_msgs::msg::{Bool as BoolMsg, Empty, String as StringMsg};
use tracing::{info, warn};

use crate::{
    config::{Geometry, WallTrackingParams},
    control::VelocityCommand,
    decider::Detection,
    error::{Result, WallTrackingError},
    lidar::RangeScan,
    shared::SharedState,
    task::{
        CommandSink, GoalHandle, NavigationFeedback, NavigationGoal, NavigationResult, TaskRunner,
    },
};

const OPEN_PLACE_ARRIVED_TOPIC: &str = "open_place_arrived";
const OPEN_PLACE_DETECTION_TOPIC: &str = "open_place_detection";
const GOAL_TOPIC: &str = "wall_tracking/goal";
const CANCEL_TOPIC: &str = "wall_tracking/cancel";
const FEEDBACK_TOPIC: &str = "wall_tracking/feedback";
const RESULT_TOPIC: &str = "wall_tracking/result";

/// 종료 시 실행 중인 목표가 결과를 보고할 때까지 기다리는 시간
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn transport(e: RclrsError) -> WallTrackingError {
    WallTrackingError::Transport(e.to_string())
}

/// 스캔 메시지를 스냅샷으로 변환합니다
pub fn scan_from_msg(msg: &LaserScan) -> Result<RangeScan> {
    let stamp = msg.header.stamp.sec as f64 + msg.header.stamp.nanosec as f64 * 1e-9;
    RangeScan::new(
        msg.angle_min,
        msg.angle_increment,
        msg.range_min,
        msg.range_max,
        &msg.ranges,
        stamp,
    )
}

/// 스캔 메시지를 공유 상태에 반영하고 개활지 플래그를 반환합니다.
/// 변환에 실패하면 이전 스냅샷을 그대로 둡니다.
pub fn ingest_scan(msg: &LaserScan, shared: &SharedState) -> Result<bool> {
    let scan = scan_from_msg(msg)?;
    Ok(shared.on_scan(scan))
}

/// 태스크 루프가 만든 모든 출력을 발행합니다
pub struct RosSink {
    cmd_vel_publisher: Publisher<Twist>,
    detection_publisher: Publisher<StringMsg>,
    feedback_publisher: Publisher<BoolMsg>,
    result_publisher: Publisher<BoolMsg>,
}

impl CommandSink for RosSink {
    fn publish_velocity(&self, command: VelocityCommand) -> Result<()> {
        let mut msg = Twist::default();
        msg.linear.x = command.linear as f64;
        msg.angular.z = command.angular as f64;
        self.cmd_vel_publisher.publish(&msg).map_err(transport)
    }

    fn publish_detection(&self, detection: Detection) -> Result<()> {
        let mut msg = StringMsg::default();
        msg.data = detection.as_str().to_string();
        self.detection_publisher.publish(&msg).map_err(transport)
    }

    fn publish_feedback(&self, feedback: NavigationFeedback) -> Result<()> {
        let mut msg = BoolMsg::default();
        msg.data = feedback.reached_open_place;
        self.feedback_publisher.publish(&msg).map_err(transport)
    }

    fn publish_result(&self, result: NavigationResult) -> Result<()> {
        let mut msg = BoolMsg::default();
        msg.data = result.success;
        self.result_publisher.publish(&msg).map_err(transport)
    }
}

pub struct WallTrackingNode {
    _scan_subscription: Subscription<LaserScan>,
    _gnss_subscription: Subscription<NavSatFix>,
    _goal_subscription: Subscription<Empty>,
    _cancel_subscription: Subscription<Empty>,
    shared: Arc<SharedState>,
    current_goal: Arc<Mutex<Option<GoalHandle>>>,
}

impl WallTrackingNode {
    /// tokio 런타임 안에서 호출해야 합니다. 목표 루프가 그 위에서 돕니다
    pub fn new(executor: &Executor, params: WallTrackingParams) -> Result<Self> {
        let node = executor
            .create_node("wall_tracking_node")
            .map_err(transport)?;

        if params.debug_mode {
            info!("=== Initial Parameters ===");
            info!("{:#?}", params);
        }
        let geometry = Geometry::from_params(&params);
        info!(
            "front stop cone: {:.2} deg, front-left wall bearing: {:.2} deg",
            geometry.front_stop_deg, geometry.front_left_wall_deg
        );

        let sink = Arc::new(RosSink {
            cmd_vel_publisher: node
                .create_publisher::<Twist>(&params.cmd_vel_topic_name)
                .map_err(transport)?,
            detection_publisher: node
                .create_publisher::<StringMsg>(OPEN_PLACE_DETECTION_TOPIC)
                .map_err(transport)?,
            feedback_publisher: node
                .create_publisher::<BoolMsg>(FEEDBACK_TOPIC)
                .map_err(transport)?,
            result_publisher: node
                .create_publisher::<BoolMsg>(RESULT_TOPIC)
                .map_err(transport)?,
        });
        let open_place_publisher = node
            .create_publisher::<BoolMsg>(OPEN_PLACE_ARRIVED_TOPIC)
            .map_err(transport)?;

        let shared = Arc::new(SharedState::new(params.open_place_distance));
        let runner = Arc::new(TaskRunner::new(&params, shared.clone(), sink)?);
        let current_goal = Arc::new(Mutex::new(None));

        let shared_clone = shared.clone();
        let _scan_subscription = node
            .create_subscription::<LaserScan, _>(&params.scan_topic, move |msg: LaserScan| {
                if let Err(e) = Self::scan_callback(&msg, &shared_clone, &open_place_publisher) {
                    warn!("Error during scan process: {}", e);
                }
            })
            .map_err(transport)?;

        let shared_clone = shared.clone();
        let _gnss_subscription = node
            .create_subscription::<NavSatFix, _>(&params.gnss_topic, move |msg: NavSatFix| {
                shared_clone.on_position(
                    msg.position_covariance_type == NavSatFix::COVARIANCE_TYPE_UNKNOWN,
                );
            })
            .map_err(transport)?;

        let runner_clone = runner.clone();
        let goal_clone = current_goal.clone();
        let _goal_subscription = node
            .create_subscription::<Empty, _>(GOAL_TOPIC, move |_msg: Empty| {
                let handle = runner_clone.accept(NavigationGoal);
                *goal_clone.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            })
            .map_err(transport)?;

        let _cancel_subscription = node
            .create_subscription::<Empty, _>(CANCEL_TOPIC, move |_msg: Empty| {
                runner.cancel_active();
            })
            .map_err(transport)?;

        Ok(Self {
            _scan_subscription,
            _gnss_subscription,
            _goal_subscription,
            _cancel_subscription,
            shared,
            current_goal,
        })
    }

    fn scan_callback(
        msg: &LaserScan,
        shared: &SharedState,
        open_place_publisher: &Publisher<BoolMsg>,
    ) -> Result<()> {
        let open_place = ingest_scan(msg, shared)?;

        let mut flag = BoolMsg::default();
        flag.data = open_place;
        open_place_publisher.publish(&flag).map_err(transport)
    }

    pub fn shared(&self) -> Arc<SharedState> {
        self.shared.clone()
    }

    /// 프로세스 루프를 멈추고 실행 중인 목표가 성공을 보고하게 합니다
    pub async fn shutdown(&self) {
        self.shared.shutdown();
        let handle = self
            .current_goal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle.result()).await {
                Ok(result) => info!("Final result: success = {}", result.success),
                Err(_) => warn!("Goal did not finish within shutdown grace period"),
            }
        }
    }
}
