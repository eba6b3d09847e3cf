//! Vision stage: two model workers per frame, joined before analysis.
//!
//! The depth and segmentation runners are independent models that can
//! run concurrently on the same frame. Each worker owns its model (and
//! whatever scratch buffers it keeps); the dispatcher hands both the
//! same frame and blocks until the slower of the two answers - that
//! rendezvous is the per-frame barrier. A runner failure produces a
//! frame with no scene evidence rather than an error.

use crate::pose::FramePose;
use crate::shared::SharedState;
use crate::threads::intake::FramePacket;
use crate::vision::{ColorFrame, DepthModel, ModelBundle, SegModel};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use pathfinder_core::{DepthMap, SegmentationMap};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Joined result of both model runners for one frame.
pub struct VisionOutput {
    /// `None` when either runner failed: publish degraded, keep going
    pub maps: Option<(DepthMap, SegmentationMap)>,
    pub pose: FramePose,
    /// Camera horizontal field of view for this frame, radians
    pub hfov: f32,
    pub timestamp: f64,
    pub vision_ms: f32,
}

/// Dispatcher loop: owns both workers for its whole lifetime.
pub fn run_vision(
    models: ModelBundle,
    frame_rx: Receiver<FramePacket>,
    out_tx: Sender<VisionOutput>,
    state: Arc<SharedState>,
) {
    let (depth_req_tx, depth_req_rx) = bounded::<Arc<ColorFrame>>(1);
    let (depth_res_tx, depth_res_rx) = bounded(1);
    let (seg_req_tx, seg_req_rx) = bounded::<Arc<ColorFrame>>(1);
    let (seg_res_tx, seg_res_rx) = bounded(1);

    let depth_worker = spawn_depth_worker(models.depth, depth_req_rx, depth_res_tx);
    let seg_worker = spawn_seg_worker(models.seg, seg_req_rx, seg_res_tx);

    loop {
        let packet = match frame_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(packet) => packet,
            Err(RecvTimeoutError::Timeout) => {
                if state.should_shutdown() {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let started = Instant::now();
        if depth_req_tx.send(Arc::clone(&packet.frame)).is_err()
            || seg_req_tx.send(Arc::clone(&packet.frame)).is_err()
        {
            break; // a worker died; nothing sensible left to do
        }

        // Join barrier: wait for both runners, in either finish order
        let depth = match depth_res_rx.recv() {
            Ok(result) => result,
            Err(_) => break,
        };
        let seg = match seg_res_rx.recv() {
            Ok(result) => result,
            Err(_) => break,
        };
        let vision_ms = started.elapsed().as_secs_f32() * 1000.0;

        let maps = match (depth, seg) {
            (Ok(depth), Ok(seg)) => Some((depth, seg)),
            (Err(e), _) => {
                tracing::warn!("depth runner failed, passing frame through: {}", e);
                None
            }
            (_, Err(e)) => {
                tracing::warn!("segmentation runner failed, passing frame through: {}", e);
                None
            }
        };

        let output = VisionOutput {
            maps,
            pose: packet.pose,
            hfov: packet.intrinsics.horizontal_fov(),
            timestamp: packet.timestamp,
            vision_ms,
        };
        if out_tx.send(output).is_err() {
            break; // pipeline thread is gone
        }
    }

    // Dropping the request senders unparks and retires the workers
    drop(depth_req_tx);
    drop(seg_req_tx);
    let _ = depth_worker.join();
    let _ = seg_worker.join();
    tracing::debug!("vision stage exiting");
}

fn spawn_depth_worker(
    mut model: Box<dyn DepthModel>,
    req: Receiver<Arc<ColorFrame>>,
    res: Sender<crate::error::Result<DepthMap>>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("vision-depth".into())
        .spawn(move || {
            while let Ok(frame) = req.recv() {
                if res.send(model.run_depth(&frame)).is_err() {
                    break;
                }
            }
        })
        .expect("failed to spawn depth worker")
}

fn spawn_seg_worker(
    mut model: Box<dyn SegModel>,
    req: Receiver<Arc<ColorFrame>>,
    res: Sender<crate::error::Result<SegmentationMap>>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("vision-seg".into())
        .spawn(move || {
            while let Ok(frame) = req.recv() {
                if res.send(model.run_seg(&frame)).is_err() {
                    break;
                }
            }
        })
        .expect("failed to spawn seg worker")
}
