//! Base stereo pipeline interface consumed by the foveation layer.
//!
//! The foveated runtime delegates to these hooks whenever foveation is not
//! active, reads `session_ready` as a gate it never writes, and shares the
//! pipeline's synchronization scope for per-view writes.

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

use super::runtime::RuntimeError;
use super::views::{Fov, Pose, ViewDescriptor};

/// Per-frame failure reported by the base pipeline.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("session is not running")]
    SessionNotRunning,
    #[error("view location failed: {0}")]
    Runtime(#[from] RuntimeError),
}

pub type FrameResult = Result<(), FrameError>;

/// The two physical eye views located for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeViews {
    pub views: [ViewDescriptor; 2],
    pub stage_views: [ViewDescriptor; 2],
}

/// Override and delegate points of the standard stereo pipeline.
pub trait BasePipeline {
    fn update_matrices(&mut self, near: f32, far: f32) -> FrameResult;
    fn update_render_target_size(&mut self) -> FrameResult;
    fn destroy(&mut self);

    /// Whether the runtime session is running; read-only to callers.
    fn session_ready(&self) -> bool;

    /// Lock shared with the presentation path around per-view writes.
    fn sync_scope(&self) -> Arc<Mutex<()>>;

    /// Latest located eye views, if the session has produced any.
    fn eye_views(&self) -> Option<EyeViews>;
}

/// Standard stereo pipeline without a display: tracks what it was asked to
/// do. Backs the CLI and tests.
#[derive(Debug)]
pub struct HeadlessPipeline {
    pub session_ready: bool,
    pub eye_views: Option<EyeViews>,
    pub matrix_updates: u32,
    pub size_updates: u32,
    pub destroyed: bool,
    pub last_clip: Option<(f32, f32)>,
    sync: Arc<Mutex<()>>,
}

impl Default for HeadlessPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessPipeline {
    pub fn new() -> Self {
        Self {
            session_ready: false,
            eye_views: None,
            matrix_updates: 0,
            size_updates: 0,
            destroyed: false,
            last_clip: None,
            sync: Arc::new(Mutex::new(())),
        }
    }

    /// Running session with a symmetric 90° stereo pair, eyes 64mm apart.
    pub fn running() -> Self {
        let fov = Fov {
            angle_left: -std::f32::consts::FRAC_PI_4,
            angle_right: std::f32::consts::FRAC_PI_4,
            angle_up: std::f32::consts::FRAC_PI_4,
            angle_down: -std::f32::consts::FRAC_PI_4,
        };
        let eye = |x: f32| ViewDescriptor::new(
            Pose {
                position: [x, 1.6, 0.0],
                ..Default::default()
            },
            fov,
        );
        let views = [eye(-0.032), eye(0.032)];
        Self {
            session_ready: true,
            eye_views: Some(EyeViews {
                views,
                stage_views: views,
            }),
            ..Self::new()
        }
    }
}

impl BasePipeline for HeadlessPipeline {
    fn update_matrices(&mut self, near: f32, far: f32) -> FrameResult {
        if !self.session_ready {
            return Err(FrameError::SessionNotRunning);
        }
        self.matrix_updates += 1;
        self.last_clip = Some((near, far));
        Ok(())
    }

    fn update_render_target_size(&mut self) -> FrameResult {
        self.size_updates += 1;
        debug!("VR: headless render target size update #{}", self.size_updates);
        Ok(())
    }

    fn destroy(&mut self) {
        info!("VR: headless pipeline destroyed");
        self.destroyed = true;
        self.session_ready = false;
    }

    fn session_ready(&self) -> bool {
        self.session_ready
    }

    fn sync_scope(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.sync)
    }

    fn eye_views(&self) -> Option<EyeViews> {
        self.eye_views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_matrix_update_requires_session() {
        let mut pipeline = HeadlessPipeline::new();
        assert!(matches!(
            pipeline.update_matrices(0.1, 100.0),
            Err(FrameError::SessionNotRunning)
        ));
        let mut pipeline = HeadlessPipeline::running();
        pipeline.update_matrices(0.1, 100.0).unwrap();
        assert_eq!(pipeline.matrix_updates, 1);
        assert_eq!(pipeline.last_clip, Some((0.1, 100.0)));
    }

    #[test]
    fn test_headless_destroy() {
        let mut pipeline = HeadlessPipeline::running();
        pipeline.destroy();
        assert!(pipeline.destroyed);
        assert!(!pipeline.session_ready());
    }

    #[test]
    fn test_sync_scope_is_shared() {
        let pipeline = HeadlessPipeline::new();
        let a = pipeline.sync_scope();
        let b = pipeline.sync_scope();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
