//! OpenXR-backed runtime — the real loader, instance and HMD system.
//!
//! Loads the OpenXR loader dynamically, creates an instance with whichever
//! foveation extensions the runtime advertises, discovers the HMD system and
//! then serves the raw two-call enumerations through the instance's function
//! pointers, translating between `openxrs::sys` structures and ours.

use openxrs as xr;
use std::ffi::CStr;
use std::ptr;
use tracing::{debug, info, warn};

use super::runtime::{
    ExtensionProperties, StructureType, SystemId, ViewConfigurationType, XrRuntime, XrStatus,
};
use super::views::ViewConfigDescriptor;

pub struct OpenXrRuntime {
    entry: xr::Entry,
    instance: xr::Instance,
    system_id: Option<xr::SystemId>,
    runtime_name: String,
}

impl OpenXrRuntime {
    /// Load the runtime, create an instance and look for an HMD.
    ///
    /// A missing HMD is not an error: `system()` then reports `None` and
    /// foveation negotiation ends in `Unsupported`.
    pub fn load() -> anyhow::Result<Self> {
        info!("VR: loading OpenXR runtime...");
        let entry = unsafe { xr::Entry::load() }
            .map_err(|e| anyhow::anyhow!("OpenXR loader not available: {}", e))?;

        let available = entry.enumerate_extensions()?;
        let mut required = xr::ExtensionSet::default();
        required.varjo_quad_views = available.varjo_quad_views;
        required.varjo_foveated_rendering = available.varjo_foveated_rendering;
        required.fb_foveation = available.fb_foveation;
        required.meta_foveation_eye_tracked = available.meta_foveation_eye_tracked;
        debug!(
            "VR: foveation extensions: varjo={} fb={} meta-eye-tracked={} quad-views={}",
            available.varjo_foveated_rendering,
            available.fb_foveation,
            available.meta_foveation_eye_tracked,
            available.varjo_quad_views
        );

        let app_info = xr::ApplicationInfo {
            application_name: "ewwm-foveation",
            application_version: 1,
            engine_name: "ewwm",
            engine_version: 1,
            api_version: xr::Version::new(1, 0, 0),
        };
        let instance = entry.create_instance(&app_info, &required, &[])?;

        let runtime_name = instance
            .properties()
            .map(|p| format!("{} v{}", p.runtime_name, p.runtime_version))
            .unwrap_or_else(|_| "unknown".to_string());
        info!("VR: OpenXR runtime: {}", runtime_name);

        let system_id = match instance.system(xr::FormFactor::HEAD_MOUNTED_DISPLAY) {
            Ok(id) => Some(id),
            Err(xr::sys::Result::ERROR_FORM_FACTOR_UNAVAILABLE) => {
                warn!("VR: no HMD connected");
                None
            }
            Err(e) => {
                warn!("VR: system discovery failed: {}", e);
                None
            }
        };

        Ok(Self {
            entry,
            instance,
            system_id,
            runtime_name,
        })
    }
}

fn status(result: xr::sys::Result) -> XrStatus {
    XrStatus(result.into_raw())
}

fn capacity<T>(buf: &[T]) -> (u32, bool) {
    (buf.len() as u32, buf.is_empty())
}

impl XrRuntime for OpenXrRuntime {
    fn runtime_name(&self) -> &str {
        &self.runtime_name
    }

    fn system(&self) -> Option<SystemId> {
        self.system_id.map(|id| SystemId(id.into_raw()))
    }

    fn enumerate_instance_extensions(
        &self,
        buf: &mut [ExtensionProperties],
        count: &mut u32,
    ) -> XrStatus {
        if buf.iter().any(|e| e.ty != StructureType::ExtensionProperties) {
            return XrStatus::ERROR_VALIDATION_FAILURE;
        }
        let (cap, query) = capacity(buf);
        let mut raw: Vec<xr::sys::ExtensionProperties> = (0..cap)
            .map(|_| xr::sys::ExtensionProperties {
                ty: xr::sys::ExtensionProperties::TYPE,
                next: ptr::null_mut(),
                extension_name: [0; xr::sys::MAX_EXTENSION_NAME_SIZE],
                extension_version: 0,
            })
            .collect();
        let out = if query { ptr::null_mut() } else { raw.as_mut_ptr() };
        let result = unsafe {
            (self.entry.fp().enumerate_instance_extension_properties)(ptr::null(), cap, count, out)
        };
        if result.into_raw() >= 0 {
            for (slot, props) in buf.iter_mut().zip(&raw).take(*count as usize) {
                let name = unsafe { CStr::from_ptr(props.extension_name.as_ptr()) };
                slot.name = name.to_string_lossy().into_owned();
                slot.version = props.extension_version;
            }
        }
        status(result)
    }

    fn enumerate_view_configurations(
        &self,
        system: SystemId,
        buf: &mut [ViewConfigurationType],
        count: &mut u32,
    ) -> XrStatus {
        let (cap, query) = capacity(buf);
        let mut raw = vec![xr::sys::ViewConfigurationType::PRIMARY_STEREO; cap as usize];
        let out = if query { ptr::null_mut() } else { raw.as_mut_ptr() };
        let result = unsafe {
            (self.instance.fp().enumerate_view_configurations)(
                self.instance.as_raw(),
                xr::sys::SystemId::from_raw(system.0),
                cap,
                count,
                out,
            )
        };
        if result.into_raw() >= 0 {
            for (slot, ty) in buf.iter_mut().zip(&raw).take(*count as usize) {
                *slot = ViewConfigurationType(ty.into_raw());
            }
        }
        status(result)
    }

    fn enumerate_view_configuration_views(
        &self,
        system: SystemId,
        view_configuration: ViewConfigurationType,
        buf: &mut [ViewConfigDescriptor],
        count: &mut u32,
    ) -> XrStatus {
        if buf.iter().any(|v| v.ty != StructureType::ViewConfigurationView) {
            return XrStatus::ERROR_VALIDATION_FAILURE;
        }
        let (cap, query) = capacity(buf);
        let mut raw: Vec<xr::sys::ViewConfigurationView> = (0..cap)
            .map(|_| xr::sys::ViewConfigurationView {
                ty: xr::sys::ViewConfigurationView::TYPE,
                next: ptr::null_mut(),
                recommended_image_rect_width: 0,
                max_image_rect_width: 0,
                recommended_image_rect_height: 0,
                max_image_rect_height: 0,
                recommended_swapchain_sample_count: 0,
                max_swapchain_sample_count: 0,
            })
            .collect();
        let out = if query { ptr::null_mut() } else { raw.as_mut_ptr() };
        let result = unsafe {
            (self.instance.fp().enumerate_view_configuration_views)(
                self.instance.as_raw(),
                xr::sys::SystemId::from_raw(system.0),
                xr::sys::ViewConfigurationType::from_raw(view_configuration.0),
                cap,
                count,
                out,
            )
        };
        if result.into_raw() >= 0 {
            for (slot, view) in buf.iter_mut().zip(&raw).take(*count as usize) {
                slot.recommended_width = view.recommended_image_rect_width;
                slot.recommended_height = view.recommended_image_rect_height;
                slot.max_width = view.max_image_rect_width;
                slot.max_height = view.max_image_rect_height;
                slot.recommended_sample_count = view.recommended_swapchain_sample_count;
                slot.max_sample_count = view.max_swapchain_sample_count;
            }
        }
        status(result)
    }

    fn result_string(&self, status: XrStatus) -> String {
        format!("{} ({})", xr::sys::Result::from_raw(status.0), status.0)
    }
}
