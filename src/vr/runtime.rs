//! Runtime enumeration interface — the slice of the XR runtime that
//! foveation negotiation talks to.
//!
//! Every query follows the two-call pattern: ask for the element count with
//! an empty buffer, then fill a buffer of exactly that size. `enumerate`
//! wraps the pattern once so extension, view-configuration and
//! view-configuration-view queries share it.
//! No openxrs dependency; compiles unconditionally.

use thiserror::Error;
use tracing::trace;

use super::views::ViewConfigDescriptor;

// ── XrStatus ────────────────────────────────────────────────

/// Raw result code returned by a runtime call (OpenXR `XrResult` values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XrStatus(pub i32);

impl XrStatus {
    pub const SUCCESS: Self = Self(0);
    pub const ERROR_VALIDATION_FAILURE: Self = Self(-1);
    pub const ERROR_RUNTIME_FAILURE: Self = Self(-2);
    pub const ERROR_OUT_OF_MEMORY: Self = Self(-3);
    pub const ERROR_FUNCTION_UNSUPPORTED: Self = Self(-7);
    pub const ERROR_SIZE_INSUFFICIENT: Self = Self(-11);
    pub const ERROR_HANDLE_INVALID: Self = Self(-12);
    pub const ERROR_INSTANCE_LOST: Self = Self(-13);
    pub const ERROR_SYSTEM_INVALID: Self = Self(-18);
    pub const ERROR_FORM_FACTOR_UNAVAILABLE: Self = Self(-35);
    pub const ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED: Self = Self(-41);

    /// Negative codes are failures; zero and positive codes are qualified successes.
    pub fn is_failure(&self) -> bool {
        self.0 < 0
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::SUCCESS => "XR_SUCCESS",
            Self::ERROR_VALIDATION_FAILURE => "XR_ERROR_VALIDATION_FAILURE",
            Self::ERROR_RUNTIME_FAILURE => "XR_ERROR_RUNTIME_FAILURE",
            Self::ERROR_OUT_OF_MEMORY => "XR_ERROR_OUT_OF_MEMORY",
            Self::ERROR_FUNCTION_UNSUPPORTED => "XR_ERROR_FUNCTION_UNSUPPORTED",
            Self::ERROR_SIZE_INSUFFICIENT => "XR_ERROR_SIZE_INSUFFICIENT",
            Self::ERROR_HANDLE_INVALID => "XR_ERROR_HANDLE_INVALID",
            Self::ERROR_INSTANCE_LOST => "XR_ERROR_INSTANCE_LOST",
            Self::ERROR_SYSTEM_INVALID => "XR_ERROR_SYSTEM_INVALID",
            Self::ERROR_FORM_FACTOR_UNAVAILABLE => "XR_ERROR_FORM_FACTOR_UNAVAILABLE",
            Self::ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED => {
                "XR_ERROR_VIEW_CONFIGURATION_TYPE_UNSUPPORTED"
            }
            _ if self.is_failure() => "XR_ERROR_UNKNOWN",
            _ => "XR_UNQUALIFIED_SUCCESS",
        }
    }
}

impl std::fmt::Display for XrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.0)
    }
}

/// A failed runtime call, carrying enough context to be logged on its own.
#[derive(Debug, Clone, Error)]
#[error("{call} failed: {status}")]
pub struct RuntimeError {
    pub call: &'static str,
    pub status: XrStatus,
}

impl RuntimeError {
    pub fn new(call: &'static str, status: XrStatus) -> Self {
        Self { call, status }
    }
}

fn check(call: &'static str, status: XrStatus) -> Result<(), RuntimeError> {
    if status.is_failure() {
        Err(RuntimeError::new(call, status))
    } else {
        Ok(())
    }
}

// ── Identifiers ─────────────────────────────────────────────

/// Opaque runtime system (HMD) handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(pub u64);

/// View configuration type, using the OpenXR enumerant values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewConfigurationType(pub i32);

impl ViewConfigurationType {
    pub const PRIMARY_MONO: Self = Self(1);
    pub const PRIMARY_STEREO: Self = Self(2);
    /// Quad views: primary stereo pair plus a foveated inset pair.
    /// Shares its value with the older `PRIMARY_QUAD_VARJO`.
    pub const PRIMARY_STEREO_WITH_FOVEATED_INSET: Self = Self(1_000_037_000);

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::PRIMARY_MONO => "primary-mono",
            Self::PRIMARY_STEREO => "primary-stereo",
            Self::PRIMARY_STEREO_WITH_FOVEATED_INSET => "primary-stereo-with-foveated-inset",
            _ => "unknown",
        }
    }

    /// Number of views the configuration is defined to carry.
    pub fn expected_view_count(&self) -> Option<usize> {
        match *self {
            Self::PRIMARY_MONO => Some(1),
            Self::PRIMARY_STEREO => Some(2),
            Self::PRIMARY_STEREO_WITH_FOVEATED_INSET => Some(4),
            _ => None,
        }
    }
}

/// Structure type tag carried by every descriptor handed to the runtime.
/// A descriptor still tagged `Unset` must never cross the runtime boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructureType {
    #[default]
    Unset,
    ExtensionProperties,
    ViewConfigurationView,
    View,
}

/// One advertised instance extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionProperties {
    pub ty: StructureType,
    pub name: String,
    pub version: u32,
}

impl ExtensionProperties {
    /// Empty, correctly tagged element for a fill buffer.
    pub fn tagged() -> Self {
        Self {
            ty: StructureType::ExtensionProperties,
            ..Default::default()
        }
    }
}

// ── XrRuntime ───────────────────────────────────────────────

/// Raw enumeration entry points of an XR runtime.
///
/// Each method mirrors one two-call OpenXR enumeration: the capacity is
/// `buf.len()`, the runtime writes the required (or written) element count to
/// `count` and returns its status. A zero-length buffer is a count query.
pub trait XrRuntime {
    /// Runtime name for logs and status output.
    fn runtime_name(&self) -> &str;

    /// The HMD system discovered at instance creation, if any.
    fn system(&self) -> Option<SystemId>;

    fn enumerate_instance_extensions(
        &self,
        buf: &mut [ExtensionProperties],
        count: &mut u32,
    ) -> XrStatus;

    fn enumerate_view_configurations(
        &self,
        system: SystemId,
        buf: &mut [ViewConfigurationType],
        count: &mut u32,
    ) -> XrStatus;

    fn enumerate_view_configuration_views(
        &self,
        system: SystemId,
        view_configuration: ViewConfigurationType,
        buf: &mut [ViewConfigDescriptor],
        count: &mut u32,
    ) -> XrStatus;

    /// Human-readable description of a status, for logging.
    fn result_string(&self, status: XrStatus) -> String {
        status.to_string()
    }
}

/// Run a two-call enumeration and return the filled elements.
///
/// `template` is cloned into every slot of the fill buffer, so it must
/// already carry the structure type tag the runtime expects.
pub fn enumerate<T, F>(call: &'static str, template: T, mut fill: F) -> Result<Vec<T>, RuntimeError>
where
    T: Clone,
    F: FnMut(&mut [T], &mut u32) -> XrStatus,
{
    let mut count = 0u32;
    check(call, fill(&mut [], &mut count))?;
    trace!(call, count, "enumerate: count query");

    let mut items = vec![template; count as usize];
    if items.is_empty() {
        return Ok(items);
    }

    let mut written = 0u32;
    check(call, fill(&mut items, &mut written))?;
    items.truncate(written as usize);
    Ok(items)
}
