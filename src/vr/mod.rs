//! VR subsystem — foveated (quad-view) rendering negotiation over OpenXR.
//!
//! Provides:
//! - `capability`: extension and view-configuration probing
//! - `settings`: foveation settings and their persistence
//! - `layout`: high-res / low-res viewport geometry
//! - `views`: per-view descriptors and the swapchain index
//! - `foveated`: the initialization state machine
//! - `frame`: per-frame overrides of the base pipeline
//! - `panel`: settings controls and status text
//! - `stub`: simulated runtime (no openxrs)
//! - `OpenXrRuntime`: the real runtime (gated behind `vr` feature)

pub mod capability;
pub mod foveated;
pub mod frame;
pub mod layout;
pub mod panel;
pub mod pipeline;
pub mod runtime;
pub mod settings;
pub mod stub;
pub mod views;

#[cfg(feature = "vr")]
pub mod openxr_runtime;

#[cfg(feature = "vr")]
pub use openxr_runtime::OpenXrRuntime;

pub use capability::{CapabilitySet, FoveationExtension};
pub use foveated::{FoveatedRuntime, FoveationState, InitFailure, RequestedLayout};
pub use frame::RenderLayoutStrategy;
pub use layout::ViewLayout;
pub use pipeline::{BasePipeline, HeadlessPipeline};
pub use runtime::{XrRuntime, XrStatus};
pub use settings::FoveationSettings;
pub use stub::SimulatedRuntime;
