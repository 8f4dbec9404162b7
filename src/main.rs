// ================================
// src/main.rs
// ================================
use anyhow::Result;
use rclrs::*;
use std::time::Duration;
use tracing::info;
use wall_tracking::{WallTrackingNode, WallTrackingParams};

const SPIN_PERIOD: Duration = Duration::from_millis(100);

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wall_tracking=info".parse()?),
        )
        .init();

    info!("Wall Tracking Node with Rust");

    let params = WallTrackingParams::load()?;
    let context = Context::default_from_env()?;
    let mut executor = context.create_basic_executor();
    let node = WallTrackingNode::new(&executor, params)?;

    let shared = node.shared();
    ctrlc::set_handler(move || shared.shutdown())?;

    // Run ROS2 executor on this worker until SIGINT clears the live flag
    let shared = node.shared();
    tokio::task::block_in_place(|| {
        while shared.is_live() {
            match executor
                .spin(SpinOptions::spin_once().timeout(SPIN_PERIOD))
                .first_error()
            {
                Ok(()) => {}
                Err(RclrsError::RclError {
                    code: RclReturnCode::Timeout,
                    ..
                }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    })?;

    node.shutdown().await;
    info!("Shutting down");
    Ok(())
}
