//! Debug stream publisher.
//!
//! A dedicated thread owns a TCP listener and broadcasts grid snapshots
//! to every connected viewer. Frames are length-prefixed JSON:
//! `[len: u32 big-endian][payload]`. The pipeline hands packets over a
//! bounded channel and never blocks on the network; a slow or dead
//! client is dropped and the listener keeps accepting.

use crate::shared::SharedState;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use pathfinder_core::{NavigationOutput, OccupancyGrid, WorldPoint};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One snapshot on the wire. Field names are the wire contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPacket {
    pub timestamp: f64,
    pub user_position: [f32; 3],
    pub user_heading: f32,
    /// `null` encodes "no obstacle" (+inf)
    pub nearest_obstacle: Option<f32>,
    pub floor_height: f32,
    pub grid_size: u32,
    pub cell_size: f32,
    /// Heading-aligned states, row-major z outer, x inner
    pub cell_states: Vec<u8>,
    /// Elevations in centimeters, saturated to +/-127
    pub cell_elevations: Vec<i8>,
    pub valid_cells: u32,
    pub obstacle_cells: u32,
    pub step_cells: u32,
    pub navigation_heading: f32,
    pub ground_confidence: f32,
    pub obstacle_distance: Option<f32>,
    pub discontinuity_count: u32,
    pub nearest_discontinuity_distance: Option<f32>,
}

/// Encode a finite float, folding +inf into `null`.
fn finite_or_none(value: f32) -> Option<f32> {
    value.is_finite().then_some(value)
}

/// Assemble a packet from the frame's grid and decision.
pub fn build_packet(
    grid: &OccupancyGrid,
    output: &NavigationOutput,
    position: WorldPoint,
    camera_height: f32,
    timestamp: f64,
    discontinuity_distances: &[f32],
    max_elevation_changes: usize,
) -> GridPacket {
    let (cell_states, cell_elevations) = grid.export_cells();
    let stats = grid.stats();
    let nearest_discontinuity = discontinuity_distances
        .iter()
        .copied()
        .fold(f32::INFINITY, f32::min);

    GridPacket {
        timestamp,
        user_position: [position.x, camera_height, position.z],
        user_heading: grid.user_heading(),
        nearest_obstacle: finite_or_none(output.nearest_obstacle_distance),
        floor_height: grid.floor_height(),
        grid_size: grid.grid_size() as u32,
        cell_size: grid.cell_size(),
        cell_states,
        cell_elevations,
        valid_cells: stats.valid_cells as u32,
        obstacle_cells: stats.obstacle_cells as u32,
        step_cells: stats.step_cells as u32,
        navigation_heading: output.suggested_heading,
        ground_confidence: output.ground_confidence,
        obstacle_distance: finite_or_none(output.nearest_obstacle_distance),
        discontinuity_count: discontinuity_distances.len().min(max_elevation_changes) as u32,
        nearest_discontinuity_distance: finite_or_none(nearest_discontinuity),
    }
}

/// Serialize a packet into one length-prefixed wire frame.
pub fn encode_frame(packet: &GridPacket) -> std::io::Result<Vec<u8>> {
    let payload = serde_json::to_vec(packet)?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Handle to the publisher thread.
pub struct StreamServer {
    handle: JoinHandle<()>,
    port: u16,
}

impl StreamServer {
    /// Bind the listener and spawn the publisher thread.
    pub fn spawn(
        port: u16,
        rx: Receiver<GridPacket>,
        state: Arc<SharedState>,
    ) -> crate::error::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        let bound_port = listener.local_addr()?.port();

        let handle = thread::Builder::new()
            .name("stream".into())
            .spawn(move || publisher_loop(listener, rx, state))
            .expect("failed to spawn stream thread");

        tracing::info!("debug stream listening on port {}", bound_port);
        Ok(Self {
            handle,
            port: bound_port,
        })
    }

    /// Actual bound port (differs from the request when asked for 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn publisher_loop(listener: TcpListener, rx: Receiver<GridPacket>, state: Arc<SharedState>) {
    let mut clients: Vec<TcpStream> = Vec::new();
    let mut sent = 0u64;

    loop {
        // Accept any waiting viewers without blocking
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!("stream viewer connected: {}", addr);
                if stream.set_nonblocking(false).is_ok() {
                    clients.push(stream);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => tracing::warn!("stream accept error: {}", e),
        }

        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(packet) => {
                if clients.is_empty() {
                    continue;
                }
                let frame = match encode_frame(&packet) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!("snapshot serialization failed: {}", e);
                        continue;
                    }
                };
                clients.retain_mut(|client| match client.write_all(&frame) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::info!("stream viewer dropped: {}", e);
                        false
                    }
                });
                sent += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if state.should_shutdown() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!("stream thread exiting after {} packets", sent);
}
