//! Foveated rendering controller — negotiates quad-view rendering on top of
//! the base stereo pipeline.
//!
//! Initialization runs in order:
//! - settings gate (foveation enabled?)
//! - capability probe (extensions, quad-view configuration)
//! - view configuration switch and view enumeration
//! - per-view descriptor resize and viewport calculation
//!
//! Each step either advances [`FoveationState`] or stops with an
//! [`InitFailure`] explaining why. A failed view setup falls back to the
//! stereo configuration; every step is safe to re-run from whatever it left
//! behind.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::capability::{probe_extensions, probe_view_configuration_support, CapabilitySet};
use super::layout::ViewLayout;
use super::pipeline::BasePipeline;
use super::runtime::{enumerate, RuntimeError, SystemId, ViewConfigurationType, XrRuntime};
use super::settings::{FoveationSettings, SettingsStore};
use super::views::{
    quad_swapchain_requests, FoveatedViewData, SwapchainFactory, SwapchainIndex,
    SwapchainRequest, ViewConfigDescriptor, ViewSet,
};

// ── FoveationState ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoveationState {
    #[default]
    Uninitialized,
    Unsupported,
    SupportedNotReady,
    Ready,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitEvent {
    /// Foveation switched off in settings.
    Disabled,
    /// No system, or no quad-view configuration on it.
    CapabilityAbsent,
    /// Hardware support confirmed; views not set up yet.
    SupportConfirmed,
    /// View setup failed after support was confirmed.
    SetupFailed,
    /// View setup and viewport calculation succeeded.
    SetupComplete,
    /// Teardown.
    Reset,
}

impl FoveationState {
    /// Pure transition function.
    pub fn transition(self, event: InitEvent) -> Self {
        match (self, event) {
            (_, InitEvent::Reset) => Self::Uninitialized,
            (_, InitEvent::Disabled) | (_, InitEvent::CapabilityAbsent) => Self::Unsupported,
            (_, InitEvent::SupportConfirmed) | (_, InitEvent::SetupFailed) => {
                Self::SupportedNotReady
            }
            (Self::SupportedNotReady | Self::Ready, InitEvent::SetupComplete) => Self::Ready,
            // Readiness requires confirmed support first.
            (other, InitEvent::SetupComplete) => other,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::SupportedNotReady | Self::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Unsupported => "unsupported",
            Self::SupportedNotReady => "supported-not-ready",
            Self::Ready => "ready",
        }
    }
}

/// View layout the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestedLayout {
    /// Standard two-view stereo.
    Stereo,
    /// Stereo with a foveated inset (four views).
    #[default]
    QuadView,
}

impl RequestedLayout {
    pub fn view_configuration(&self) -> ViewConfigurationType {
        match self {
            Self::Stereo => ViewConfigurationType::PRIMARY_STEREO,
            Self::QuadView => ViewConfigurationType::PRIMARY_STEREO_WITH_FOVEATED_INSET,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stereo => "stereo",
            Self::QuadView => "quad-view",
        }
    }
}

/// Why the last `initialize()` did not reach `Ready`.
#[derive(Debug, Clone, Error)]
pub enum InitFailure {
    #[error("foveated rendering disabled in settings")]
    Disabled,
    #[error("no HMD system available")]
    NoSystem,
    #[error("quad-view configuration not supported by the system")]
    QuadViewUnsupported,
    #[error("view enumeration failed: {0}")]
    ViewEnumeration(#[from] RuntimeError),
    #[error("expected {expected} views for {layout}, runtime reported {actual}")]
    LayoutMismatch {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("degenerate viewport layout: high-res {high}, low-res {low}")]
    DegenerateLayout { high: String, low: String },
}

impl InitFailure {
    /// State machine input this failure maps to.
    pub fn event(&self) -> InitEvent {
        match self {
            Self::Disabled => InitEvent::Disabled,
            Self::NoSystem | Self::QuadViewUnsupported => InitEvent::CapabilityAbsent,
            Self::ViewEnumeration(_) | Self::LayoutMismatch { .. } | Self::DegenerateLayout { .. } => {
                InitEvent::SetupFailed
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::NoSystem => "no-system",
            Self::QuadViewUnsupported => "quad-view-unsupported",
            Self::ViewEnumeration(_) => "view-enumeration-failed",
            Self::LayoutMismatch { .. } => "layout-mismatch",
            Self::DegenerateLayout { .. } => "degenerate-layout",
        }
    }
}

/// Hold the shared per-frame scope. A poisoned lock still guards `()`.
pub(crate) fn hold(scope: &Mutex<()>) -> MutexGuard<'_, ()> {
    scope.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── FoveatedRuntime ─────────────────────────────────────────

/// Foveation layer over a base pipeline `B`, talking to runtime `R`.
pub struct FoveatedRuntime<R: XrRuntime, B: BasePipeline> {
    pub settings: FoveationSettings,
    pub(super) runtime: R,
    pub(super) base: B,
    pub(super) state: FoveationState,
    pub(super) capabilities: Option<CapabilitySet>,
    pub(super) requested_layout: RequestedLayout,
    pub(super) quad_view_mode: bool,
    pub(super) view_configuration: ViewConfigurationType,
    pub(super) view_set: ViewSet,
    pub(super) foveated_views: FoveatedViewData,
    pub(super) layout: ViewLayout,
    pub(super) swapchains: SwapchainIndex,
    pub(super) eye_tracking_active: bool,
    pub(super) clip_planes: Option<(f32, f32)>,
    pub(super) last_failure: Option<InitFailure>,
    pub(super) sync: Arc<Mutex<()>>,
}

impl<R: XrRuntime, B: BasePipeline> FoveatedRuntime<R, B> {
    pub fn new(runtime: R, base: B, settings: FoveationSettings) -> Self {
        let sync = base.sync_scope();
        Self {
            settings,
            runtime,
            base,
            state: FoveationState::Uninitialized,
            capabilities: None,
            requested_layout: RequestedLayout::default(),
            quad_view_mode: false,
            view_configuration: ViewConfigurationType::PRIMARY_STEREO,
            view_set: ViewSet::new(),
            foveated_views: FoveatedViewData::default(),
            layout: ViewLayout::default(),
            swapchains: SwapchainIndex::default(),
            eye_tracking_active: false,
            clip_planes: None,
            last_failure: None,
            sync,
        }
    }

    pub fn name(&self) -> &'static str {
        "OpenXR-Foveated"
    }

    // ── Configuration ───────────────────────────────────────

    pub fn load_settings(&mut self, store: &mut dyn SettingsStore, apply_defaults: bool) {
        self.settings = FoveationSettings::load(store, apply_defaults);
    }

    pub fn save_settings(&self, store: &mut dyn SettingsStore) {
        self.settings.save(store);
    }

    /// Takes effect on the next `initialize()`.
    pub fn request_layout(&mut self, layout: RequestedLayout) {
        if self.requested_layout != layout {
            info!("VR: requested layout {} -> {}", self.requested_layout.as_str(), layout.as_str());
            self.requested_layout = layout;
        }
    }

    // ── Initialization ──────────────────────────────────────

    /// Run the negotiation sequence. Returns whether the runtime is `Ready`.
    pub fn initialize(&mut self) -> bool {
        if self.state == FoveationState::Ready {
            debug!("VR: foveated rendering already initialized");
            return true;
        }

        match self.try_initialize() {
            Ok(()) => {
                self.apply(InitEvent::SetupComplete);
                self.last_failure = None;
                info!(
                    "VR: foveated rendering initialized ({}, {} views)",
                    self.view_configuration.as_str(),
                    self.view_set.len()
                );
                true
            }
            Err(failure) => {
                match failure {
                    InitFailure::Disabled => info!("VR: {}", failure),
                    InitFailure::ViewEnumeration(_) => error!("VR: {}", failure),
                    _ => warn!("VR: {}", failure),
                }
                self.apply(failure.event());
                self.last_failure = Some(failure);
                false
            }
        }
    }

    fn try_initialize(&mut self) -> Result<(), InitFailure> {
        if !self.settings.enabled {
            return Err(InitFailure::Disabled);
        }
        let system = self.runtime.system().ok_or(InitFailure::NoSystem)?;

        let mut capabilities = match self.capabilities.take() {
            Some(caps) => caps,
            None => probe_extensions(&self.runtime),
        };
        capabilities.supports_quad_view_configuration =
            probe_view_configuration_support(&self.runtime, system);
        let supported = capabilities.supports_quad_view_configuration;
        self.capabilities = Some(capabilities);
        if !supported {
            return Err(InitFailure::QuadViewUnsupported);
        }
        self.apply(InitEvent::SupportConfirmed);

        self.setup_views(system)
    }

    /// Switch the view configuration, enumerate its views and size every
    /// per-view collection and viewport accordingly.
    fn setup_views(&mut self, system: SystemId) -> Result<(), InitFailure> {
        let quad = self.requested_layout == RequestedLayout::QuadView;
        self.quad_view_mode = quad;
        self.view_configuration = self.requested_layout.view_configuration();
        info!("VR: using view configuration {}", self.view_configuration.as_str());

        let configs = match self.enumerate_views(system) {
            Ok(configs) => configs,
            Err(e) => {
                self.leave_quad_view();
                return Err(e.into());
            }
        };
        if let Some(expected) = self
            .view_configuration
            .expected_view_count()
            .filter(|&n| n != configs.len())
        {
            self.leave_quad_view();
            return Err(InitFailure::LayoutMismatch {
                layout: self.requested_layout.as_str(),
                expected,
                actual: configs.len(),
            });
        }

        let sync = Arc::clone(&self.sync);
        let _guard = hold(&sync);

        self.view_set.assign_configs(&configs);
        self.foveated_views.clear();
        if quad {
            self.foveated_views.allocate_quad();
            let first = configs[0];
            let layout = ViewLayout::compute(
                first.recommended_width,
                first.recommended_height,
                &self.settings,
            );
            if !layout.is_renderable(first.max_width, first.max_height) {
                self.leave_quad_view();
                return Err(InitFailure::DegenerateLayout {
                    high: layout.high_res_str(),
                    low: layout.low_res_str(),
                });
            }
            self.set_layout(layout);
        }

        self.eye_tracking_active = self.settings.use_eye_tracking
            && self
                .capabilities
                .as_ref()
                .is_some_and(|caps| caps.eye_tracking_supported());
        if self.settings.use_eye_tracking && !self.eye_tracking_active {
            warn!("VR: eye tracking requested but no eye-tracked foveation extension available");
        }
        Ok(())
    }

    fn enumerate_views(&self, system: SystemId) -> Result<Vec<ViewConfigDescriptor>, RuntimeError> {
        let runtime = &self.runtime;
        let view_configuration = self.view_configuration;
        enumerate(
            "xrEnumerateViewConfigurationViews",
            ViewConfigDescriptor::tagged(),
            |buf, count| {
                runtime.enumerate_view_configuration_views(system, view_configuration, buf, count)
            },
        )
    }

    /// Store a new layout and push it into the foveated view configs.
    pub(super) fn set_layout(&mut self, layout: ViewLayout) {
        if layout != self.layout {
            info!(
                "VR: viewport sizes: high-res {}, low-res {}",
                layout.high_res_str(),
                layout.low_res_str()
            );
        }
        self.layout = layout;
        self.foveated_views.apply_layout(self.view_set.configs(), &layout);
    }

    /// Re-query the active configuration's views after a runtime-driven
    /// resolution change. A changed view count drops back to
    /// `SupportedNotReady`.
    pub fn refresh_view_configs(&mut self) -> bool {
        let Some(system) = self.runtime.system() else {
            return false;
        };
        if self.view_set.is_empty() {
            return false;
        }
        let sync = Arc::clone(&self.sync);
        let _guard = hold(&sync);
        match self.reload_view_configs(system) {
            Ok(same_count) => same_count,
            Err(e) => {
                error!("VR: failed to refresh view configurations: {}", self.runtime.result_string(e.status));
                false
            }
        }
    }

    /// Re-enumerate into the view set; the caller holds the sync scope.
    /// `Ok(false)` means the view count changed and readiness was dropped.
    pub(super) fn reload_view_configs(&mut self, system: SystemId) -> Result<bool, RuntimeError> {
        let configs = self.enumerate_views(system)?;
        if configs.len() != self.view_set.len() {
            warn!(
                "VR: view count changed from {} to {}, re-initialization required",
                self.view_set.len(),
                configs.len()
            );
            self.leave_quad_view();
            self.apply(InitEvent::SetupFailed);
            self.last_failure = Some(InitFailure::LayoutMismatch {
                layout: self.requested_layout.as_str(),
                expected: self.view_set.len(),
                actual: configs.len(),
            });
            return Ok(false);
        }
        self.view_set.assign_configs(&configs);
        Ok(true)
    }

    /// Fall back to the stereo configuration after a failed quad-view setup.
    fn leave_quad_view(&mut self) {
        self.quad_view_mode = false;
        self.view_configuration = ViewConfigurationType::PRIMARY_STEREO;
        self.foveated_views.clear();
    }

    // ── Teardown ────────────────────────────────────────────

    /// Reset every flag and collection, then tear down the base pipeline.
    pub fn destroy(&mut self) {
        info!("VR: destroying foveated runtime (state: {})", self.state.as_str());
        {
            let sync = Arc::clone(&self.sync);
            let _guard = hold(&sync);
            self.apply(InitEvent::Reset);
            self.quad_view_mode = false;
            self.view_configuration = ViewConfigurationType::PRIMARY_STEREO;
            self.capabilities = None;
            self.eye_tracking_active = false;
            self.view_set.clear();
            self.foveated_views.clear();
            self.swapchains.clear();
            self.layout = ViewLayout::default();
            self.clip_planes = None;
            self.last_failure = None;
        }
        self.base.destroy();
    }

    fn apply(&mut self, event: InitEvent) {
        let next = self.state.transition(event);
        if next != self.state {
            debug!("VR: foveation state {} -> {} ({:?})", self.state.as_str(), next.as_str(), event);
        }
        self.state = next;
    }

    // ── Swapchains ──────────────────────────────────────────

    /// Swapchains the graphics backend must create for the active layout.
    pub fn swapchain_requests(&self) -> Vec<SwapchainRequest> {
        if self.state != FoveationState::Ready || !self.quad_view_mode {
            return Vec::new();
        }
        quad_swapchain_requests(self.view_set.configs(), &self.layout)
    }

    /// Have `factory` create one swapchain per view and index the handles.
    /// All-or-nothing: a failure leaves the index empty.
    pub fn create_swapchains_for_views(&mut self, factory: &mut dyn SwapchainFactory) -> bool {
        let requests = self.swapchain_requests();
        if requests.is_empty() {
            debug!("VR: no foveated swapchains needed");
            return false;
        }
        self.swapchains.clear();
        for request in &requests {
            match factory.create_swapchain(request) {
                Ok(handle) => self.swapchains.insert(request.view_index, handle),
                Err(e) => {
                    error!(
                        "VR: failed to create {} swapchain ({}x{}): {}",
                        request.role.as_str(),
                        request.width,
                        request.height,
                        e
                    );
                    self.swapchains.clear();
                    return false;
                }
            }
        }
        info!("VR: created {} foveated swapchains", self.swapchains.len());
        true
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn state(&self) -> FoveationState {
        self.state
    }

    /// Ready for foveated frames: negotiated and the session is running.
    pub fn ready(&self) -> bool {
        self.state == FoveationState::Ready && self.base.session_ready()
    }

    pub fn quad_view_mode(&self) -> bool {
        self.quad_view_mode
    }

    pub fn requested_layout(&self) -> RequestedLayout {
        self.requested_layout
    }

    pub fn view_configuration(&self) -> ViewConfigurationType {
        self.view_configuration
    }

    pub fn capabilities(&self) -> Option<&CapabilitySet> {
        self.capabilities.as_ref()
    }

    pub fn layout(&self) -> &ViewLayout {
        &self.layout
    }

    pub fn view_set(&self) -> &ViewSet {
        &self.view_set
    }

    pub fn foveated_views(&self) -> &FoveatedViewData {
        &self.foveated_views
    }

    pub fn swapchains(&self) -> &SwapchainIndex {
        &self.swapchains
    }

    pub fn eye_tracking_active(&self) -> bool {
        self.eye_tracking_active
    }

    /// Near/far planes recorded by the last foveated matrix update.
    pub fn clip_planes(&self) -> Option<(f32, f32)> {
        self.clip_planes
    }

    pub fn last_failure(&self) -> Option<&InitFailure> {
        self.last_failure.as_ref()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut B {
        &mut self.base
    }
}
