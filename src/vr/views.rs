//! View and swapchain registry.
//!
//! Holds the three parallel per-view collections (configuration, located
//! view, stage-space view) sized to the negotiated view count, the foveated
//! sub-collections used in quad-view mode, and the view-to-swapchain index.
//! Swapchain construction itself belongs to the graphics backend; this
//! module only says how many are needed and at what size.

use std::collections::BTreeMap;
use tracing::{debug, info};

use super::layout::ViewLayout;
use super::runtime::{RuntimeError, StructureType};

// ── Geometry ────────────────────────────────────────────────

/// Rigid transform: unit quaternion (x, y, z, w) and position in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub orientation: [f32; 4],
    pub position: [f32; 3],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            orientation: [0.0, 0.0, 0.0, 1.0],
            position: [0.0; 3],
        }
    }
}

/// Field of view as four half-angles in radians (left/down negative).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

// ── Descriptors ─────────────────────────────────────────────

/// Per-view configuration properties reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewConfigDescriptor {
    pub ty: StructureType,
    pub recommended_width: u32,
    pub recommended_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub recommended_sample_count: u32,
    pub max_sample_count: u32,
}

impl ViewConfigDescriptor {
    pub fn tagged() -> Self {
        Self {
            ty: StructureType::ViewConfigurationView,
            ..Default::default()
        }
    }
}

/// A located view: pose plus field of view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewDescriptor {
    pub ty: StructureType,
    pub pose: Pose,
    pub fov: Fov,
}

impl ViewDescriptor {
    pub fn tagged() -> Self {
        Self {
            ty: StructureType::View,
            ..Default::default()
        }
    }

    pub fn new(pose: Pose, fov: Fov) -> Self {
        Self {
            ty: StructureType::View,
            pose,
            fov,
        }
    }
}

// ── ViewSet ─────────────────────────────────────────────────

/// Parallel per-view collections, always of equal length.
#[derive(Debug, Clone, Default)]
pub struct ViewSet {
    configs: Vec<ViewConfigDescriptor>,
    views: Vec<ViewDescriptor>,
    stage_views: Vec<ViewDescriptor>,
}

impl ViewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize all three collections to `view_count` and re-tag every
    /// descriptor so none reaches the runtime with an unset type.
    pub fn resize_to(&mut self, view_count: usize) {
        self.configs.resize(view_count, ViewConfigDescriptor::tagged());
        self.views.resize(view_count, ViewDescriptor::tagged());
        self.stage_views.resize(view_count, ViewDescriptor::tagged());

        for config in &mut self.configs {
            config.ty = StructureType::ViewConfigurationView;
        }
        for view in self.views.iter_mut().chain(self.stage_views.iter_mut()) {
            view.ty = StructureType::View;
        }

        debug_assert!(self.is_consistent());
        debug!("VR: view set resized to {} views", view_count);
    }

    /// Replace the configuration descriptors with a fresh enumeration result,
    /// resizing the pose collections to match.
    pub fn assign_configs(&mut self, configs: &[ViewConfigDescriptor]) {
        self.resize_to(configs.len());
        for (slot, config) in self.configs.iter_mut().zip(configs) {
            *slot = ViewConfigDescriptor {
                ty: StructureType::ViewConfigurationView,
                ..*config
            };
        }
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.views.clear();
        self.stage_views.clear();
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Equal lengths and every descriptor tagged.
    pub fn is_consistent(&self) -> bool {
        self.configs.len() == self.views.len()
            && self.views.len() == self.stage_views.len()
            && self
                .configs
                .iter()
                .all(|c| c.ty == StructureType::ViewConfigurationView)
            && self
                .views
                .iter()
                .chain(self.stage_views.iter())
                .all(|v| v.ty == StructureType::View)
    }

    pub fn configs(&self) -> &[ViewConfigDescriptor] {
        &self.configs
    }

    pub fn views(&self) -> &[ViewDescriptor] {
        &self.views
    }

    pub fn stage_views(&self) -> &[ViewDescriptor] {
        &self.stage_views
    }

    pub fn views_mut(&mut self) -> &mut [ViewDescriptor] {
        &mut self.views
    }

    pub fn stage_views_mut(&mut self) -> &mut [ViewDescriptor] {
        &mut self.stage_views
    }

    /// Recommended image size of the first view, the base for layout math.
    pub fn base_size(&self) -> Option<(u32, u32)> {
        self.configs
            .first()
            .map(|c| (c.recommended_width, c.recommended_height))
    }
}

// ── FoveatedViewData ────────────────────────────────────────

/// Quad-view split of the view set: one high-res inset and one low-res
/// peripheral view per eye, each an independent renderable surface.
#[derive(Debug, Clone, Default)]
pub struct FoveatedViewData {
    pub high_res_views: Vec<ViewDescriptor>,
    pub low_res_views: Vec<ViewDescriptor>,
    pub high_res_configs: Vec<ViewConfigDescriptor>,
    pub low_res_configs: Vec<ViewConfigDescriptor>,
}

impl FoveatedViewData {
    pub fn allocate_quad(&mut self) {
        self.high_res_views = vec![ViewDescriptor::tagged(); 2];
        self.low_res_views = vec![ViewDescriptor::tagged(); 2];
        self.high_res_configs = vec![ViewConfigDescriptor::tagged(); 2];
        self.low_res_configs = vec![ViewConfigDescriptor::tagged(); 2];
    }

    pub fn clear(&mut self) {
        self.high_res_views.clear();
        self.low_res_views.clear();
        self.high_res_configs.clear();
        self.low_res_configs.clear();
    }

    pub fn is_allocated(&self) -> bool {
        self.high_res_views.len() == 2
            && self.low_res_views.len() == 2
            && self.high_res_configs.len() == 2
            && self.low_res_configs.len() == 2
    }

    /// Copy the runtime's per-view limits and apply the computed layout as
    /// the recommended size of each sub-view.
    pub fn apply_layout(&mut self, view_configs: &[ViewConfigDescriptor], layout: &ViewLayout) {
        if !self.is_allocated() || view_configs.len() < 4 {
            return;
        }
        for eye in 0..2 {
            self.low_res_configs[eye] = ViewConfigDescriptor {
                recommended_width: layout.low_res_width,
                recommended_height: layout.low_res_height,
                ..view_configs[ViewRole::Peripheral(Eye::from_index(eye)).view_index()]
            };
            self.high_res_configs[eye] = ViewConfigDescriptor {
                recommended_width: layout.high_res_width,
                recommended_height: layout.high_res_height,
                ..view_configs[ViewRole::Center(Eye::from_index(eye)).view_index()]
            };
        }
    }
}

// ── Roles ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub fn from_index(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Left
        } else {
            Self::Right
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// What a view slot renders. In quad-view order the primary stereo pair
/// (peripheral) comes first, then the inset pair (center).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViewRole {
    Stereo(Eye),
    Peripheral(Eye),
    Center(Eye),
}

impl ViewRole {
    pub fn view_index(&self) -> usize {
        match self {
            Self::Stereo(eye) | Self::Peripheral(eye) => eye.index(),
            Self::Center(eye) => 2 + eye.index(),
        }
    }

    /// Role of slot `index` in a configuration with `view_count` views.
    pub fn for_view(index: usize, view_count: usize) -> Self {
        let eye = Eye::from_index(index);
        match (view_count, index) {
            (4, 0..=1) => Self::Peripheral(eye),
            (4, _) => Self::Center(eye),
            _ => Self::Stereo(eye),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stereo(Eye::Left) => "stereo-left",
            Self::Stereo(Eye::Right) => "stereo-right",
            Self::Peripheral(Eye::Left) => "peripheral-left",
            Self::Peripheral(Eye::Right) => "peripheral-right",
            Self::Center(Eye::Left) => "center-left",
            Self::Center(Eye::Right) => "center-right",
        }
    }
}

// ── Swapchains ──────────────────────────────────────────────

/// Opaque handle issued by the graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainHandle(pub u64);

/// One swapchain the graphics backend must create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainRequest {
    pub view_index: usize,
    pub role: ViewRole,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

/// Graphics-API side of swapchain creation.
pub trait SwapchainFactory {
    fn create_swapchain(&mut self, request: &SwapchainRequest) -> Result<SwapchainHandle, RuntimeError>;
}

/// View index → swapchain handle, populated only in quad-view mode.
#[derive(Debug, Clone, Default)]
pub struct SwapchainIndex {
    handles: BTreeMap<usize, SwapchainHandle>,
}

impl SwapchainIndex {
    pub fn insert(&mut self, view_index: usize, handle: SwapchainHandle) {
        self.handles.insert(view_index, handle);
    }

    pub fn get(&self, view_index: usize) -> Option<SwapchainHandle> {
        self.handles.get(&view_index).copied()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.handles.is_empty() {
            info!("VR: releasing {} foveated swapchain(s)", self.handles.len());
        }
        self.handles.clear();
    }
}

/// Swapchains needed for a quad-view layout: two peripheral at the low-res
/// size, two inset at the high-res size.
pub fn quad_swapchain_requests(
    view_configs: &[ViewConfigDescriptor],
    layout: &ViewLayout,
) -> Vec<SwapchainRequest> {
    if view_configs.len() != 4 {
        return Vec::new();
    }
    view_configs
        .iter()
        .enumerate()
        .map(|(index, config)| {
            let role = ViewRole::for_view(index, 4);
            let (width, height) = match role {
                ViewRole::Center(_) => (layout.high_res_width, layout.high_res_height),
                _ => (layout.low_res_width, layout.low_res_height),
            };
            SwapchainRequest {
                view_index: index,
                role,
                width,
                height,
                sample_count: config.recommended_sample_count.max(1),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(w: u32, h: u32) -> ViewConfigDescriptor {
        ViewConfigDescriptor {
            ty: StructureType::ViewConfigurationView,
            recommended_width: w,
            recommended_height: h,
            max_width: w * 2,
            max_height: h * 2,
            recommended_sample_count: 1,
            max_sample_count: 4,
        }
    }

    #[test]
    fn test_resize_keeps_collections_parallel() {
        let mut set = ViewSet::new();
        set.resize_to(4);
        assert_eq!(set.configs().len(), 4);
        assert_eq!(set.views().len(), 4);
        assert_eq!(set.stage_views().len(), 4);
        set.resize_to(2);
        assert_eq!(set.len(), 2);
        assert!(set.is_consistent());
    }

    #[test]
    fn test_resize_retags_existing_descriptors() {
        let mut set = ViewSet::new();
        set.resize_to(2);
        set.views_mut()[0].ty = StructureType::Unset;
        set.stage_views_mut()[1].ty = StructureType::Unset;
        assert!(!set.is_consistent());
        set.resize_to(2);
        assert!(set.is_consistent());
    }

    #[test]
    fn test_assign_configs_tags_and_sizes() {
        let mut set = ViewSet::new();
        let mut raw = vec![config(2000, 1800); 4];
        raw[2].ty = StructureType::Unset;
        set.assign_configs(&raw);
        assert_eq!(set.len(), 4);
        assert!(set.is_consistent());
        assert_eq!(set.base_size(), Some((2000, 1800)));
    }

    #[test]
    fn test_foveated_allocation() {
        let mut data = FoveatedViewData::default();
        assert!(!data.is_allocated());
        data.allocate_quad();
        assert!(data.is_allocated());
        data.clear();
        assert!(data.high_res_views.is_empty());
        assert!(data.low_res_configs.is_empty());
    }

    #[test]
    fn test_apply_layout_overrides_recommended_size() {
        let mut data = FoveatedViewData::default();
        data.allocate_quad();
        let configs = vec![config(2000, 2000); 4];
        let layout = ViewLayout {
            high_res_width: 1000,
            high_res_height: 900,
            low_res_width: 500,
            low_res_height: 450,
        };
        data.apply_layout(&configs, &layout);
        assert_eq!(data.high_res_configs[1].recommended_width, 1000);
        assert_eq!(data.high_res_configs[1].recommended_height, 900);
        assert_eq!(data.low_res_configs[0].recommended_width, 500);
        assert_eq!(data.low_res_configs[0].max_width, 4000);
    }

    #[test]
    fn test_roles() {
        assert_eq!(ViewRole::for_view(0, 4), ViewRole::Peripheral(Eye::Left));
        assert_eq!(ViewRole::for_view(3, 4), ViewRole::Center(Eye::Right));
        assert_eq!(ViewRole::for_view(1, 2), ViewRole::Stereo(Eye::Right));
        assert_eq!(ViewRole::Center(Eye::Left).view_index(), 2);
        assert_eq!(ViewRole::Peripheral(Eye::Right).as_str(), "peripheral-right");
    }

    #[test]
    fn test_quad_swapchain_requests() {
        let configs = vec![config(2000, 2000); 4];
        let layout = ViewLayout {
            high_res_width: 1000,
            high_res_height: 1000,
            low_res_width: 500,
            low_res_height: 500,
        };
        let requests = quad_swapchain_requests(&configs, &layout);
        assert_eq!(requests.len(), 4);
        assert_eq!((requests[0].width, requests[0].height), (500, 500));
        assert_eq!((requests[2].width, requests[2].height), (1000, 1000));
        assert_eq!(requests[3].role, ViewRole::Center(Eye::Right));
        assert!(quad_swapchain_requests(&configs[..2], &layout).is_empty());
    }

    #[test]
    fn test_swapchain_index() {
        let mut index = SwapchainIndex::default();
        index.insert(2, SwapchainHandle(42));
        assert_eq!(index.get(2), Some(SwapchainHandle(42)));
        assert_eq!(index.get(0), None);
        index.clear();
        assert!(index.is_empty());
    }
}
