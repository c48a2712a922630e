//! EWWM foveation — quad-view foveated rendering negotiation for the
//! EXWM-VR OpenXR pipeline.
//!
//! Part of the EXWM-VR project: a transhuman Emacs window manager.

pub mod ipc;
pub mod vr;
