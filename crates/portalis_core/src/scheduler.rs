use std::collections::HashSet;

use portalis_shared::portal::{PortalDirection, PortalScene, PortalSide, RenderTargetId};
use tracing::{debug, warn};

use crate::backend::{BackendError, RenderBackend, ViewerCamera};
use crate::frame::FrameState;
use crate::pass::{render_direction, PassError};
use crate::tick::{Tick, TickSource};

/// Input/camera controller advanced once at the start of every frame.
pub trait ViewerControls {
    fn update(&mut self, tick: &Tick, frame: &FrameState) -> ViewerCamera;
}

impl<F> ViewerControls for F
where
    F: FnMut(&Tick, &FrameState) -> ViewerCamera,
{
    fn update(&mut self, tick: &Tick, frame: &FrameState) -> ViewerCamera {
        self(tick, frame)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("portal pair {pair} surface {side:?} has no render target")]
    MissingRenderTarget { pair: usize, side: PortalSide },
    #[error("render target {target:?} of pair {pair} surface {side:?} is not allocated")]
    UnallocatedRenderTarget {
        pair: usize,
        side: PortalSide,
        target: RenderTargetId,
    },
    #[error("render target {0:?} is shared by more than one portal surface")]
    SharedRenderTarget(RenderTargetId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub passes_rendered: u32,
    pub passes_skipped: u32,
    pub passes_failed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub passes_rendered: u64,
    pub passes_skipped: u64,
    pub passes_failed: u64,
}

impl RunSummary {
    fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.passes_rendered += u64::from(report.passes_rendered);
        self.passes_skipped += u64::from(report.passes_skipped);
        self.passes_failed += u64::from(report.passes_failed);
    }
}

/// Drives one frame at a time: controls, decorative passes, every portal
/// direction, then the main view.
#[derive(Debug)]
pub struct FrameScheduler {
    scene: PortalScene,
    frame: FrameState,
}

impl FrameScheduler {
    /// Fails if any surface lacks a backing target; that is a setup error,
    /// never a per-frame one.
    pub fn new<B>(scene: PortalScene, backend: &B) -> Result<Self, SchedulerError>
    where
        B: RenderBackend + ?Sized,
    {
        let mut seen = HashSet::new();
        for (id, side, surface) in scene.surfaces() {
            let target = surface
                .target()
                .ok_or(SchedulerError::MissingRenderTarget { pair: id.0, side })?;
            if !backend.has_target(target) {
                return Err(SchedulerError::UnallocatedRenderTarget {
                    pair: id.0,
                    side,
                    target,
                });
            }
            if !seen.insert(target) {
                return Err(SchedulerError::SharedRenderTarget(target));
            }
        }

        Ok(Self {
            scene,
            frame: FrameState::default(),
        })
    }

    pub fn scene(&self) -> &PortalScene {
        &self.scene
    }

    pub fn frame(&self) -> FrameState {
        self.frame
    }

    /// Runs one frame. Portal pass failures are logged and counted; only
    /// decorative or main-view failures abort the frame.
    pub fn tick<B, C>(
        &mut self,
        tick: Tick,
        backend: &mut B,
        controls: &mut C,
    ) -> Result<FrameReport, BackendError>
    where
        B: RenderBackend + ?Sized,
        C: ViewerControls + ?Sized,
    {
        let viewer = controls.update(&tick, &self.frame);
        backend.run_decorative_passes(&self.frame)?;

        let mut report = FrameReport {
            frame_index: self.frame.frame_index,
            ..FrameReport::default()
        };
        for (id, pair) in self.scene.pairs() {
            for direction in PortalDirection::ALL {
                match render_direction(backend, &self.scene, pair, direction, &viewer.transform) {
                    Ok(_) => report.passes_rendered += 1,
                    Err(PassError::Degenerate(reason)) => {
                        debug!("Skipping portal pass {}/{direction:?}: {reason}", id.0);
                        report.passes_skipped += 1;
                    }
                    Err(err) => {
                        warn!("Portal pass {}/{direction:?} failed: {err}", id.0);
                        report.passes_failed += 1;
                    }
                }
            }
        }

        backend.bind_default()?;
        backend.draw_scene(&self.scene, &viewer.camera_view())?;
        backend.present()?;

        self.frame.advance();
        Ok(report)
    }

    /// Ticks until `ticks` reports teardown.
    pub fn run<T, B, C>(
        &mut self,
        ticks: &mut T,
        backend: &mut B,
        controls: &mut C,
    ) -> Result<RunSummary, BackendError>
    where
        T: TickSource + ?Sized,
        B: RenderBackend + ?Sized,
        C: ViewerControls + ?Sized,
    {
        let mut summary = RunSummary::default();
        while let Some(tick) = ticks.wait_for_next_tick() {
            let report = self.tick(tick, backend, controls)?;
            summary.record(&report);
        }
        Ok(summary)
    }
}
