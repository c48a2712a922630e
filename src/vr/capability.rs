//! Capability probe — which foveation features this runtime and HMD offer.
//!
//! Two independent questions:
//! - does the runtime advertise any of the recognized foveation extensions?
//! - does the system support the quad-view (stereo + foveated inset)
//!   view configuration?
//!
//! Foveation is an optional enhancement, so every enumeration failure is
//! logged and reported as "unsupported" rather than returned as an error.

use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use super::runtime::{enumerate, ExtensionProperties, SystemId, ViewConfigurationType, XrRuntime};

// ── FoveationExtension ──────────────────────────────────────

/// Instance extensions relevant to foveated rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FoveationExtension {
    VarjoFoveatedRendering,
    FbFoveation,
    MetaFoveationEyeTracked,
}

impl FoveationExtension {
    pub const ALL: [Self; 3] = [
        Self::VarjoFoveatedRendering,
        Self::FbFoveation,
        Self::MetaFoveationEyeTracked,
    ];

    /// Extension name as advertised by the runtime.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VarjoFoveatedRendering => "XR_VARJO_foveated_rendering",
            Self::FbFoveation => "XR_FB_foveation",
            Self::MetaFoveationEyeTracked => "XR_META_foveation_eye_tracked",
        }
    }

    /// Exact-match lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ext| ext.name() == name)
    }

    /// Short label for status output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::VarjoFoveatedRendering => "Varjo Foveated",
            Self::FbFoveation => "FB Foveation",
            Self::MetaFoveationEyeTracked => "Meta Eye Tracked",
        }
    }
}

// ── CapabilitySet ───────────────────────────────────────────

/// Probe result. Immutable until the next fresh probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    extensions: BTreeSet<FoveationExtension>,
    pub supports_quad_view_configuration: bool,
}

impl CapabilitySet {
    pub fn from_extensions(extensions: impl IntoIterator<Item = FoveationExtension>) -> Self {
        Self {
            extensions: extensions.into_iter().collect(),
            supports_quad_view_configuration: false,
        }
    }

    pub fn has(&self, extension: FoveationExtension) -> bool {
        self.extensions.contains(&extension)
    }

    pub fn extensions(&self) -> impl Iterator<Item = FoveationExtension> + '_ {
        self.extensions.iter().copied()
    }

    pub fn has_any_extension(&self) -> bool {
        !self.extensions.is_empty()
    }

    /// Eye-tracked foveation is available from the runtime.
    pub fn eye_tracking_supported(&self) -> bool {
        self.has(FoveationExtension::MetaFoveationEyeTracked)
    }

    /// Extension names to enable at instance creation.
    pub fn extension_names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    pub fn to_sexp(&self) -> String {
        let flags: Vec<String> = FoveationExtension::ALL
            .iter()
            .map(|ext| {
                format!(
                    "(:name \"{}\" :available {})",
                    ext.name(),
                    if self.has(*ext) { "t" } else { "nil" }
                )
            })
            .collect();
        format!(
            "(:quad-view {} :extensions ({}))",
            if self.supports_quad_view_configuration { "t" } else { "nil" },
            flags.join(" "),
        )
    }
}

// ── Probes ──────────────────────────────────────────────────

/// Enumerate the runtime's instance extensions and keep the recognized ones.
pub fn probe_extensions(runtime: &dyn XrRuntime) -> CapabilitySet {
    let available = match enumerate(
        "xrEnumerateInstanceExtensionProperties",
        ExtensionProperties::tagged(),
        |buf, count| runtime.enumerate_instance_extensions(buf, count),
    ) {
        Ok(exts) => exts,
        Err(e) => {
            error!(
                "VR: failed to enumerate instance extensions: {}",
                runtime.result_string(e.status)
            );
            return CapabilitySet::default();
        }
    };
    debug!("VR: runtime advertises {} extension(s)", available.len());

    let set = CapabilitySet::from_extensions(
        available
            .iter()
            .filter_map(|ext| FoveationExtension::from_name(&ext.name)),
    );
    if set.has_any_extension() {
        info!("VR: foveation extensions available: {:?}", set.extension_names());
    } else {
        info!("VR: no foveation extensions advertised");
    }
    set
}

/// True iff `system` lists the quad-view view configuration.
pub fn probe_view_configuration_support(runtime: &dyn XrRuntime, system: SystemId) -> bool {
    let configs = match enumerate(
        "xrEnumerateViewConfigurations",
        ViewConfigurationType(0),
        |buf, count| runtime.enumerate_view_configurations(system, buf, count),
    ) {
        Ok(configs) => configs,
        Err(e) => {
            error!(
                "VR: failed to enumerate view configurations: {}",
                runtime.result_string(e.status)
            );
            return false;
        }
    };

    if configs.contains(&ViewConfigurationType::PRIMARY_STEREO_WITH_FOVEATED_INSET) {
        info!("VR: quad-view configuration supported");
        true
    } else {
        warn!(
            "VR: quad-view configuration not supported ({:?}), falling back to standard stereo",
            configs.iter().map(|c| c.as_str()).collect::<Vec<_>>()
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::stub::{SimulatedCall, SimulatedRuntime};

    #[test]
    fn test_exact_name_matching() {
        assert_eq!(
            FoveationExtension::from_name("XR_FB_foveation"),
            Some(FoveationExtension::FbFoveation)
        );
        assert_eq!(FoveationExtension::from_name("XR_FB_foveation_vulkan"), None);
        assert_eq!(FoveationExtension::from_name("xr_fb_foveation"), None);
    }

    #[test]
    fn test_probe_keeps_only_recognized() {
        let runtime = SimulatedRuntime::new().with_extensions(&[
            "XR_KHR_opengl_enable",
            "XR_VARJO_foveated_rendering",
            "XR_META_foveation_eye_tracked",
            "XR_FB_foveation_configuration",
        ]);
        let caps = probe_extensions(&runtime);
        assert_eq!(
            caps.extensions().collect::<Vec<_>>(),
            vec![
                FoveationExtension::VarjoFoveatedRendering,
                FoveationExtension::MetaFoveationEyeTracked
            ]
        );
        assert!(caps.eye_tracking_supported());
        assert!(!caps.has(FoveationExtension::FbFoveation));
    }

    #[test]
    fn test_probe_extension_failure_is_empty() {
        let runtime = SimulatedRuntime::new()
            .with_extensions(&["XR_FB_foveation"])
            .failing(SimulatedCall::InstanceExtensions);
        let caps = probe_extensions(&runtime);
        assert!(!caps.has_any_extension());
    }

    #[test]
    fn test_view_configuration_probe() {
        let quad = SimulatedRuntime::quad_view(2000, 2000);
        let system = quad.system().unwrap();
        assert!(probe_view_configuration_support(&quad, system));

        let stereo = SimulatedRuntime::new();
        let system = stereo.system().unwrap();
        assert!(!probe_view_configuration_support(&stereo, system));
    }

    #[test]
    fn test_view_configuration_failure_is_unsupported() {
        let runtime =
            SimulatedRuntime::quad_view(2000, 2000).failing(SimulatedCall::ViewConfigurations);
        let system = runtime.system().unwrap();
        assert!(!probe_view_configuration_support(&runtime, system));
    }

    #[test]
    fn test_capability_sexp() {
        let mut caps = CapabilitySet::from_extensions([FoveationExtension::FbFoveation]);
        caps.supports_quad_view_configuration = true;
        let sexp = caps.to_sexp();
        assert!(sexp.starts_with("(:quad-view t"));
        assert!(sexp.contains("(:name \"XR_FB_foveation\" :available t)"));
        assert!(sexp.contains("(:name \"XR_VARJO_foveated_rendering\" :available nil)"));
    }
}
