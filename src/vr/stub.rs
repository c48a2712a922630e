//! Simulated XR runtime — used when the `vr` feature is not enabled, and by
//! tests.
//!
//! Answers the enumeration interface from fixed tables with the same
//! two-call contract as a real runtime: count queries, size-insufficient
//! errors, structure-tag validation and per-call failure injection.

use std::cell::Cell;
use tracing::info;

use super::runtime::{
    ExtensionProperties, StructureType, SystemId, ViewConfigurationType, XrRuntime, XrStatus,
};
use super::views::ViewConfigDescriptor;

/// Enumeration entry points that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedCall {
    InstanceExtensions,
    ViewConfigurations,
    ViewConfigurationViews,
}

/// Deterministic stand-in for an OpenXR runtime.
#[derive(Debug)]
pub struct SimulatedRuntime {
    name: String,
    system: Option<SystemId>,
    extensions: Vec<ExtensionProperties>,
    view_configurations: Vec<(ViewConfigurationType, Vec<ViewConfigDescriptor>)>,
    failing: Vec<SimulatedCall>,
    calls: Cell<u32>,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRuntime {
    /// Stereo-only HMD at 1920x1080 per eye, no foveation extensions.
    pub fn new() -> Self {
        Self {
            name: "simulated".to_string(),
            system: Some(SystemId(1)),
            extensions: Vec::new(),
            view_configurations: vec![(
                ViewConfigurationType::PRIMARY_STEREO,
                vec![view_config(1920, 1080); 2],
            )],
            failing: Vec::new(),
            calls: Cell::new(0),
        }
    }

    /// HMD offering both stereo and quad views, every view recommending
    /// `width` x `height`.
    pub fn quad_view(width: u32, height: u32) -> Self {
        Self::new()
            .with_recommended_size(width, height)
            .with_quad_view_count(4)
    }

    pub fn with_extensions(mut self, names: &[&str]) -> Self {
        self.extensions = names
            .iter()
            .map(|name| ExtensionProperties {
                ty: StructureType::ExtensionProperties,
                name: name.to_string(),
                version: 1,
            })
            .collect();
        self
    }

    /// Advertise the quad-view configuration with `count` views.
    pub fn with_quad_view_count(mut self, count: usize) -> Self {
        let (width, height) = self
            .views_for(ViewConfigurationType::PRIMARY_STEREO)
            .and_then(|views| views.first())
            .map(|c| (c.recommended_width, c.recommended_height))
            .unwrap_or((1920, 1080));
        self.view_configurations
            .retain(|(ty, _)| *ty != ViewConfigurationType::PRIMARY_STEREO_WITH_FOVEATED_INSET);
        self.view_configurations.push((
            ViewConfigurationType::PRIMARY_STEREO_WITH_FOVEATED_INSET,
            vec![view_config(width, height); count],
        ));
        self
    }

    /// Change the recommended size of every advertised view.
    pub fn with_recommended_size(mut self, width: u32, height: u32) -> Self {
        for (_, views) in &mut self.view_configurations {
            for view in views.iter_mut() {
                *view = view_config(width, height);
            }
        }
        self
    }

    /// No HMD attached.
    pub fn without_system(mut self) -> Self {
        self.system = None;
        self
    }

    pub fn failing(mut self, call: SimulatedCall) -> Self {
        self.failing.push(call);
        self
    }

    /// Number of enumeration calls answered so far.
    pub fn call_count(&self) -> u32 {
        self.calls.get()
    }

    fn views_for(&self, ty: ViewConfigurationType) -> Option<&Vec<ViewConfigDescriptor>> {
        self.view_configurations
            .iter()
            .find(|(t, _)| *t == ty)
            .map(|(_, views)| views)
    }

    fn answer<T: Clone>(
        &self,
        call: SimulatedCall,
        source: &[T],
        buf: &mut [T],
        count: &mut u32,
        tagged: impl Fn(&T) -> bool,
    ) -> XrStatus {
        self.calls.set(self.calls.get() + 1);
        if self.failing.contains(&call) {
            return XrStatus::ERROR_RUNTIME_FAILURE;
        }
        *count = source.len() as u32;
        if buf.is_empty() {
            return XrStatus::SUCCESS;
        }
        if buf.len() < source.len() {
            return XrStatus::ERROR_SIZE_INSUFFICIENT;
        }
        if !buf.iter().all(tagged) {
            return XrStatus::ERROR_VALIDATION_FAILURE;
        }
        buf[..source.len()].clone_from_slice(source);
        XrStatus::SUCCESS
    }

    fn check_system(&self, system: SystemId) -> bool {
        self.system == Some(system)
    }
}

impl XrRuntime for SimulatedRuntime {
    fn runtime_name(&self) -> &str {
        &self.name
    }

    fn system(&self) -> Option<SystemId> {
        self.system
    }

    fn enumerate_instance_extensions(
        &self,
        buf: &mut [ExtensionProperties],
        count: &mut u32,
    ) -> XrStatus {
        self.answer(
            SimulatedCall::InstanceExtensions,
            &self.extensions,
            buf,
            count,
            |e| e.ty == StructureType::ExtensionProperties,
        )
    }

    fn enumerate_view_configurations(
        &self,
        system: SystemId,
        buf: &mut [ViewConfigurationType],
        count: &mut u32,
    ) -> XrStatus {
        if !self.check_system(system) {
            return XrStatus::ERROR_SYSTEM_INVALID;
        }
        let types: Vec<ViewConfigurationType> =
            self.view_configurations.iter().map(|(ty, _)| *ty).collect();
        self.answer(SimulatedCall::ViewConfigurations, &types, buf, count, |_| true)
    }

    fn enumerate_view_configuration_views(
        &self,
        system: SystemId,
        view_configuration: ViewConfigurationType,
        buf: &mut [ViewConfigDescriptor],
        count: &mut u32,
    ) -> XrStatus {
        if !self.check_system(system) {
            return XrStatus::ERROR_SYSTEM_INVALID;
        }
        let Some(views) = self.views_for(view_configuration) else {
            return XrStatus::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED;
        };
        let views = views.clone();
        self.answer(
            SimulatedCall::ViewConfigurationViews,
            &views,
            buf,
            count,
            |c| c.ty == StructureType::ViewConfigurationView,
        )
    }
}

fn view_config(width: u32, height: u32) -> ViewConfigDescriptor {
    ViewConfigDescriptor {
        ty: StructureType::ViewConfigurationView,
        recommended_width: width,
        recommended_height: height,
        max_width: 16384,
        max_height: 16384,
        recommended_sample_count: 1,
        max_sample_count: 4,
    }
}

/// Log which runtime the process is using.
pub fn announce(runtime: &dyn XrRuntime) {
    info!(
        "VR: using {} runtime (system: {:?})",
        runtime.runtime_name(),
        runtime.system()
    );
}
