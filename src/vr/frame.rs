//! Per-frame overrides of the base pipeline.
//!
//! The controller picks a [`RenderLayoutStrategy`] from its state; each
//! frame hook consults it. `Standard` is a pure pass-through to the base
//! pipeline. `Foveated` runs under the shared sync scope and derives the
//! four quad-view render views from the two located eye views:
//!
//! - views 0, 1: peripheral, eye pose and full eye field of view
//! - views 2, 3: inset, eye pose and the field of view narrowed in tangent
//!   space around its center by `center_size_x` / `center_size_y`

use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::foveated::{hold, FoveatedRuntime, FoveationState};
use super::layout::ViewLayout;
use super::pipeline::{BasePipeline, FrameResult};
use super::runtime::XrRuntime;
use super::views::{Fov, ViewDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderLayoutStrategy {
    Standard,
    Foveated,
}

impl RenderLayoutStrategy {
    pub fn select(state: FoveationState, quad_view_mode: bool) -> Self {
        if state == FoveationState::Ready && quad_view_mode {
            Self::Foveated
        } else {
            Self::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Foveated => "foveated",
        }
    }
}

/// Narrow `fov` to a `size_x` x `size_y` fraction of its tangent-space
/// extent, keeping the same center.
pub fn inset_fov(fov: &Fov, size_x: f32, size_y: f32) -> Fov {
    let (left, right) = narrow(fov.angle_left, fov.angle_right, size_x);
    let (down, up) = narrow(fov.angle_down, fov.angle_up, size_y);
    Fov {
        angle_left: left,
        angle_right: right,
        angle_up: up,
        angle_down: down,
    }
}

fn narrow(low: f32, high: f32, fraction: f32) -> (f32, f32) {
    let (tan_low, tan_high) = (low.tan(), high.tan());
    let center = (tan_low + tan_high) * 0.5;
    let half = (tan_high - tan_low) * 0.5 * fraction;
    ((center - half).atan(), (center + half).atan())
}

/// Expand two eye views into the four quad-view render views.
pub fn map_eye_views(eyes: &[ViewDescriptor; 2], size_x: f32, size_y: f32) -> [ViewDescriptor; 4] {
    let inset = |eye: &ViewDescriptor| ViewDescriptor::new(eye.pose, inset_fov(&eye.fov, size_x, size_y));
    [
        ViewDescriptor::new(eyes[0].pose, eyes[0].fov),
        ViewDescriptor::new(eyes[1].pose, eyes[1].fov),
        inset(&eyes[0]),
        inset(&eyes[1]),
    ]
}

impl<R: XrRuntime, B: BasePipeline> FoveatedRuntime<R, B> {
    pub fn strategy(&self) -> RenderLayoutStrategy {
        RenderLayoutStrategy::select(self.state, self.quad_view_mode)
    }

    /// Per-frame pose/projection update.
    pub fn update_matrices(&mut self, near: f32, far: f32) -> FrameResult {
        if self.strategy() == RenderLayoutStrategy::Standard {
            return self.base.update_matrices(near, far);
        }

        let sync = Arc::clone(&self.sync);
        let _guard = hold(&sync);

        if !self.base.session_ready() {
            return Ok(());
        }
        let Some(eyes) = self.base.eye_views() else {
            trace!("VR: no located eye views yet");
            return Ok(());
        };

        let (size_x, size_y) = (self.settings.center_size_x, self.settings.center_size_y);
        let views = map_eye_views(&eyes.views, size_x, size_y);
        let stage_views = map_eye_views(&eyes.stage_views, size_x, size_y);

        for (slot, view) in self.view_set.views_mut().iter_mut().zip(views) {
            *slot = view;
        }
        for (slot, view) in self.view_set.stage_views_mut().iter_mut().zip(stage_views) {
            *slot = view;
        }
        self.foveated_views.low_res_views = views[..2].to_vec();
        self.foveated_views.high_res_views = views[2..].to_vec();
        self.clip_planes = Some((near, far));
        Ok(())
    }

    /// Per-frame render target sizing; re-reads the runtime's recommended
    /// view sizes and recomputes the viewport layout from the first view.
    pub fn update_render_target_size(&mut self) -> FrameResult {
        if self.strategy() == RenderLayoutStrategy::Standard {
            return self.base.update_render_target_size();
        }

        let sync = Arc::clone(&self.sync);
        let _guard = hold(&sync);

        if !self.base.session_ready() {
            return Ok(());
        }
        if let Some(system) = self.runtime.system() {
            match self.reload_view_configs(system) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => debug!("VR: keeping cached view configurations: {}", e),
            }
        }
        let Some((width, height)) = self.view_set.base_size() else {
            return Ok(());
        };

        let layout = ViewLayout::compute(width, height, &self.settings);
        let limits = self.view_set.configs()[0];
        if !layout.is_renderable(limits.max_width, limits.max_height) {
            warn!(
                "VR: ignoring degenerate viewport layout (high-res {}, low-res {})",
                layout.high_res_str(),
                layout.low_res_str()
            );
            return Ok(());
        }
        if layout != self.layout {
            debug!("VR: render target size changed for {}x{} base", width, height);
        }
        self.set_layout(layout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::pipeline::HeadlessPipeline;
    use crate::vr::settings::FoveationSettings;
    use crate::vr::stub::{SimulatedCall, SimulatedRuntime};
    use crate::vr::views::Pose;
    use std::f32::consts::FRAC_PI_4;

    fn ready_runtime() -> FoveatedRuntime<SimulatedRuntime, HeadlessPipeline> {
        let settings = FoveationSettings {
            enabled: true,
            ..Default::default()
        };
        let mut rt = FoveatedRuntime::new(
            SimulatedRuntime::quad_view(2000, 2000),
            HeadlessPipeline::running(),
            settings,
        );
        assert!(rt.initialize());
        rt
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            RenderLayoutStrategy::select(FoveationState::Ready, true),
            RenderLayoutStrategy::Foveated
        );
        assert_eq!(
            RenderLayoutStrategy::select(FoveationState::Ready, false),
            RenderLayoutStrategy::Standard
        );
        assert_eq!(
            RenderLayoutStrategy::select(FoveationState::SupportedNotReady, true),
            RenderLayoutStrategy::Standard
        );
    }

    #[test]
    fn test_inset_fov_symmetric() {
        let fov = Fov {
            angle_left: -FRAC_PI_4,
            angle_right: FRAC_PI_4,
            angle_up: FRAC_PI_4,
            angle_down: -FRAC_PI_4,
        };
        let inset = inset_fov(&fov, 0.5, 0.5);
        assert!(approx(inset.angle_right, 0.5f32.atan()));
        assert!(approx(inset.angle_left, -(0.5f32.atan())));
        assert!(approx(inset.angle_up, 0.5f32.atan()));
        assert!(approx(inset.angle_down, -(0.5f32.atan())));

        let full = inset_fov(&fov, 1.0, 1.0);
        assert!(approx(full.angle_left, fov.angle_left));
        assert!(approx(full.angle_up, fov.angle_up));
    }

    #[test]
    fn test_inset_fov_asymmetric_keeps_center() {
        let fov = Fov {
            angle_left: -0.9,
            angle_right: 0.6,
            angle_up: 0.7,
            angle_down: -0.8,
        };
        let inset = inset_fov(&fov, 0.4, 0.4);
        let center = |a: f32, b: f32| (a.tan() + b.tan()) * 0.5;
        assert!(approx(
            center(inset.angle_left, inset.angle_right),
            center(fov.angle_left, fov.angle_right)
        ));
        assert!(inset.angle_left > fov.angle_left && inset.angle_right < fov.angle_right);
    }

    #[test]
    fn test_map_eye_views_shares_pose() {
        let pose = Pose {
            position: [0.03, 1.6, 0.0],
            ..Default::default()
        };
        let fov = Fov {
            angle_left: -FRAC_PI_4,
            angle_right: FRAC_PI_4,
            angle_up: FRAC_PI_4,
            angle_down: -FRAC_PI_4,
        };
        let eye = ViewDescriptor::new(pose, fov);
        let views = map_eye_views(&[eye, eye], 0.5, 0.5);
        assert_eq!(views[0].fov, fov);
        assert_eq!(views[2].pose, pose);
        assert_ne!(views[2].fov, fov);
        assert_eq!(views[1], views[0]);
    }

    #[test]
    fn test_standard_strategy_delegates() {
        let mut rt = FoveatedRuntime::new(
            SimulatedRuntime::new(),
            HeadlessPipeline::running(),
            FoveationSettings::default(),
        );
        rt.update_matrices(0.1, 50.0).unwrap();
        rt.update_render_target_size().unwrap();
        assert_eq!(rt.base().matrix_updates, 1);
        assert_eq!(rt.base().size_updates, 1);
        assert!(rt.clip_planes().is_none());
    }

    #[test]
    fn test_foveated_matrices_fill_four_views() {
        let mut rt = ready_runtime();
        rt.update_matrices(0.1, 100.0).unwrap();
        assert_eq!(rt.base().matrix_updates, 0);
        assert_eq!(rt.clip_planes(), Some((0.1, 100.0)));
        let views = rt.view_set().views();
        assert_eq!(views.len(), 4);
        assert_eq!(views[0].pose, views[2].pose);
        assert!(views[2].fov.angle_right < views[0].fov.angle_right);
        assert_eq!(rt.foveated_views().high_res_views[1], views[3]);
        assert_eq!(rt.foveated_views().low_res_views[0], views[0]);
        assert!(rt.view_set().is_consistent());
    }

    #[test]
    fn test_session_not_ready_is_benign() {
        let mut rt = ready_runtime();
        rt.base_mut().session_ready = false;
        rt.settings.peripheral_resolution_scale = 0.5;
        rt.update_matrices(0.1, 100.0).unwrap();
        rt.update_render_target_size().unwrap();
        assert!(rt.clip_planes().is_none());
        assert_eq!(rt.layout().low_res_str(), "500x500");
        assert_eq!(rt.base().size_updates, 0);
    }

    #[test]
    fn test_render_target_size_tracks_settings() {
        let mut rt = ready_runtime();
        rt.settings.center_resolution_scale = 1.5;
        rt.update_render_target_size().unwrap();
        assert_eq!(rt.layout().high_res_str(), "1500x1500");
        assert_eq!(rt.foveated_views().high_res_configs[0].recommended_width, 1500);
        assert_eq!(rt.base().size_updates, 0);
    }

    #[test]
    fn test_render_target_size_follows_runtime_resize() {
        let mut rt = ready_runtime();
        rt.runtime = SimulatedRuntime::quad_view(3000, 3000);
        rt.update_render_target_size().unwrap();
        assert_eq!(rt.layout().high_res_str(), "1500x1500");
        assert_eq!(rt.layout().low_res_str(), "750x750");
        assert_eq!(rt.view_set().base_size(), Some((3000, 3000)));
        assert_eq!(rt.foveated_views().high_res_configs[1].recommended_width, 1500);
        assert_eq!(rt.foveated_views().low_res_configs[0].recommended_height, 750);
    }

    #[test]
    fn test_render_target_size_view_count_change_drops_foveation() {
        let mut rt = ready_runtime();
        rt.runtime = SimulatedRuntime::quad_view(2000, 2000).with_quad_view_count(2);
        rt.update_render_target_size().unwrap();
        assert_eq!(rt.state(), FoveationState::SupportedNotReady);
        assert_eq!(rt.strategy(), RenderLayoutStrategy::Standard);
        assert!(!rt.quad_view_mode());
    }

    #[test]
    fn test_render_target_size_keeps_cached_views_on_enumeration_failure() {
        let mut rt = ready_runtime();
        rt.runtime = SimulatedRuntime::quad_view(3000, 3000).failing(SimulatedCall::ViewConfigurationViews);
        rt.settings.peripheral_resolution_scale = 0.5;
        rt.update_render_target_size().unwrap();
        assert_eq!(rt.state(), FoveationState::Ready);
        assert_eq!(rt.layout().low_res_str(), "1000x1000");
    }

    #[test]
    fn test_render_target_size_keeps_layout_on_degenerate() {
        let mut rt = ready_runtime();
        rt.settings.center_resolution_scale = 0.0;
        rt.update_render_target_size().unwrap();
        assert_eq!(rt.layout().high_res_str(), "1000x1000");
    }
}
