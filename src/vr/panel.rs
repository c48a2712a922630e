//! Data behind the foveation settings panel.
//!
//! The UI layer renders these controls and status lines; nothing here draws.
//! Slider ranges double as validation bounds for IPC edits.

use thiserror::Error;

use super::capability::{CapabilitySet, FoveationExtension};
use super::foveated::{FoveatedRuntime, FoveationState};
use super::layout::ViewLayout;
use super::pipeline::BasePipeline;
use super::runtime::{ViewConfigurationType, XrRuntime};
use super::settings::{
    FoveationSettings, KEY_CENTER_SCALE, KEY_CENTER_SIZE_X, KEY_CENTER_SIZE_Y, KEY_ENABLED,
    KEY_EYE_TRACKING, KEY_PERIPHERAL_SCALE,
};

// ── Controls ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlKind {
    Checkbox,
    Slider { min: f32, max: f32 },
}

/// One editable settings field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Control {
    /// Settings store key.
    pub key: &'static str,
    /// Short name used over IPC.
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ControlKind,
}

pub const CONTROLS: [Control; 6] = [
    Control {
        key: KEY_ENABLED,
        name: "enabled",
        label: "Enable Foveated Rendering",
        kind: ControlKind::Checkbox,
    },
    Control {
        key: KEY_CENTER_SCALE,
        name: "center-scale",
        label: "Center Resolution Scale",
        kind: ControlKind::Slider { min: 0.1, max: 2.0 },
    },
    Control {
        key: KEY_PERIPHERAL_SCALE,
        name: "peripheral-scale",
        label: "Peripheral Resolution Scale",
        kind: ControlKind::Slider { min: 0.1, max: 1.0 },
    },
    Control {
        key: KEY_CENTER_SIZE_X,
        name: "center-size-x",
        label: "Center Size X",
        kind: ControlKind::Slider { min: 0.1, max: 1.0 },
    },
    Control {
        key: KEY_CENTER_SIZE_Y,
        name: "center-size-y",
        label: "Center Size Y",
        kind: ControlKind::Slider { min: 0.1, max: 1.0 },
    },
    Control {
        key: KEY_EYE_TRACKING,
        name: "eye-tracking",
        label: "Use Eye Tracking",
        kind: ControlKind::Checkbox,
    },
];

/// Label of the manual initialize trigger.
pub const INITIALIZE_LABEL: &str = "Initialize Foveated Rendering";

/// Only the enable checkbox is shown while foveation is off.
pub fn visible_controls(settings: &FoveationSettings) -> &'static [Control] {
    if settings.enabled {
        &CONTROLS
    } else {
        &CONTROLS[..1]
    }
}

pub fn control(name: &str) -> Option<&'static Control> {
    CONTROLS.iter().find(|c| c.name == name || c.key == name)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Bool(bool),
    Float(f32),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("unknown control {0}")]
    Unknown(String),
    #[error("{name} expects a {expected}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
    },
    #[error("{name} out of range ({min}-{max})")]
    OutOfRange {
        name: &'static str,
        min: f32,
        max: f32,
    },
}

/// Apply one edit to `settings`, enforcing the control's type and range.
pub fn apply_control(
    settings: &mut FoveationSettings,
    name: &str,
    value: ControlValue,
) -> Result<(), ControlError> {
    let control = control(name).ok_or_else(|| ControlError::Unknown(name.to_string()))?;
    match (control.kind, value) {
        (ControlKind::Checkbox, ControlValue::Bool(b)) => {
            match control.key {
                KEY_ENABLED => settings.enabled = b,
                _ => settings.use_eye_tracking = b,
            }
            Ok(())
        }
        (ControlKind::Slider { min, max }, ControlValue::Float(f)) => {
            if !(min..=max).contains(&f) {
                return Err(ControlError::OutOfRange {
                    name: control.name,
                    min,
                    max,
                });
            }
            let field = match control.key {
                KEY_CENTER_SCALE => &mut settings.center_resolution_scale,
                KEY_PERIPHERAL_SCALE => &mut settings.peripheral_resolution_scale,
                KEY_CENTER_SIZE_X => &mut settings.center_size_x,
                _ => &mut settings.center_size_y,
            };
            *field = f;
            Ok(())
        }
        (ControlKind::Checkbox, _) => Err(ControlError::WrongType {
            name: control.name,
            expected: "boolean",
        }),
        (ControlKind::Slider { .. }, _) => Err(ControlError::WrongType {
            name: control.name,
            expected: "number",
        }),
    }
}

// ── Status ──────────────────────────────────────────────────

/// Read-only snapshot for the status area.
#[derive(Debug, Clone)]
pub struct FoveationStatus {
    pub state: FoveationState,
    pub quad_view_mode: bool,
    pub view_configuration: ViewConfigurationType,
    pub capabilities: CapabilitySet,
    pub layout: ViewLayout,
    pub eye_tracking_active: bool,
    pub last_failure: Option<String>,
}

impl FoveationStatus {
    pub fn capture<R: XrRuntime, B: BasePipeline>(runtime: &FoveatedRuntime<R, B>) -> Self {
        Self {
            state: runtime.state(),
            quad_view_mode: runtime.quad_view_mode(),
            view_configuration: runtime.view_configuration(),
            capabilities: runtime.capabilities().cloned().unwrap_or_default(),
            layout: *runtime.layout(),
            eye_tracking_active: runtime.eye_tracking_active(),
            last_failure: runtime.last_failure().map(|f| f.to_string()),
        }
    }

    /// Headline status, one per state.
    pub fn status_line(&self) -> &'static str {
        match self.state {
            FoveationState::Ready => "Foveated Rendering: Ready",
            FoveationState::SupportedNotReady => "Foveated Rendering: Available but not initialized",
            FoveationState::Unsupported => "Foveated Rendering: Not Supported",
            FoveationState::Uninitialized => "Foveated Rendering: Not initialized",
        }
    }

    /// Detail lines under the headline.
    pub fn info_lines(&self) -> Vec<String> {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        let mut lines = vec![
            format!("Foveated Support: {}", yes_no(self.state.is_supported())),
            format!(
                "Quad Views: {}",
                if self.quad_view_mode { "Enabled" } else { "Disabled" }
            ),
            format!(
                "View Configuration: {} ({})",
                self.view_configuration.as_str(),
                self.view_configuration.0
            ),
            "Extensions:".to_string(),
        ];
        for ext in FoveationExtension::ALL {
            lines.push(format!(
                "  {}: {}",
                ext.label(),
                if self.capabilities.has(ext) { "Available" } else { "Not Available" }
            ));
        }
        lines.push(format!("Eye Tracking: {}", yes_no(self.eye_tracking_active)));
        if self.state == FoveationState::Ready {
            lines.push(format!("High-Res Size: {}", self.layout.high_res_str()));
            lines.push(format!("Low-Res Size: {}", self.layout.low_res_str()));
        }
        if let Some(reason) = &self.last_failure {
            lines.push(format!("Last Failure: {}", reason));
        }
        lines
    }

    /// Status as an s-expression plist for IPC.
    pub fn to_sexp(&self) -> String {
        let layout = if self.state == FoveationState::Ready {
            self.layout.to_sexp()
        } else {
            "nil".to_string()
        };
        let failure = match &self.last_failure {
            Some(reason) => format!("\"{}\"", reason.replace('\\', "\\\\").replace('"', "\\\"")),
            None => "nil".to_string(),
        };
        format!(
            "(:state :{} :quad-views {} :view-configuration :{} :eye-tracking {} :capabilities {} :layout {} :failure {})",
            self.state.as_str(),
            if self.quad_view_mode { "t" } else { "nil" },
            self.view_configuration.as_str(),
            if self.eye_tracking_active { "t" } else { "nil" },
            self.capabilities.to_sexp(),
            layout,
            failure,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::pipeline::HeadlessPipeline;
    use crate::vr::stub::SimulatedRuntime;

    #[test]
    fn test_control_ranges() {
        let mut settings = FoveationSettings::default();
        apply_control(&mut settings, "center-scale", ControlValue::Float(2.0)).unwrap();
        assert_eq!(settings.center_resolution_scale, 2.0);
        assert_eq!(
            apply_control(&mut settings, "peripheral-scale", ControlValue::Float(1.5)),
            Err(ControlError::OutOfRange {
                name: "peripheral-scale",
                min: 0.1,
                max: 1.0
            })
        );
        assert!(apply_control(&mut settings, "center-size-y", ControlValue::Float(0.05)).is_err());
        assert_eq!(settings.peripheral_resolution_scale, 0.25);
    }

    #[test]
    fn test_control_types_and_keys() {
        let mut settings = FoveationSettings::default();
        apply_control(&mut settings, KEY_ENABLED, ControlValue::Bool(true)).unwrap();
        apply_control(&mut settings, "eye-tracking", ControlValue::Bool(true)).unwrap();
        assert!(settings.enabled && settings.use_eye_tracking);
        assert!(matches!(
            apply_control(&mut settings, "enabled", ControlValue::Float(1.0)),
            Err(ControlError::WrongType { .. })
        ));
        assert!(matches!(
            apply_control(&mut settings, "bogus", ControlValue::Bool(true)),
            Err(ControlError::Unknown(_))
        ));
    }

    #[test]
    fn test_visible_controls_follow_enable() {
        let mut settings = FoveationSettings::default();
        assert_eq!(visible_controls(&settings).len(), 1);
        settings.enabled = true;
        assert_eq!(visible_controls(&settings).len(), 6);
    }

    #[test]
    fn test_status_lines_per_state() {
        let settings = FoveationSettings {
            enabled: true,
            ..Default::default()
        };
        let mut rt = FoveatedRuntime::new(
            SimulatedRuntime::quad_view(2000, 2000).with_extensions(&["XR_FB_foveation"]),
            HeadlessPipeline::running(),
            settings,
        );
        let status = FoveationStatus::capture(&rt);
        assert_eq!(status.status_line(), "Foveated Rendering: Not initialized");

        assert!(rt.initialize());
        let status = FoveationStatus::capture(&rt);
        assert_eq!(status.status_line(), "Foveated Rendering: Ready");
        let lines = status.info_lines();
        assert!(lines.contains(&"  FB Foveation: Available".to_string()));
        assert!(lines.contains(&"  Varjo Foveated: Not Available".to_string()));
        assert!(lines.contains(&"High-Res Size: 1000x1000".to_string()));

        let sexp = status.to_sexp();
        assert!(sexp.starts_with("(:state :ready :quad-views t"));
        assert!(sexp.contains(":layout (:high-res (:w 1000 :h 1000)"));
        assert!(sexp.ends_with(":failure nil)"));
    }

    #[test]
    fn test_status_reports_failure() {
        let mut rt = FoveatedRuntime::new(
            SimulatedRuntime::new(),
            HeadlessPipeline::running(),
            FoveationSettings::default(),
        );
        assert!(!rt.initialize());
        let status = FoveationStatus::capture(&rt);
        assert_eq!(status.status_line(), "Foveated Rendering: Not Supported");
        assert!(status
            .info_lines()
            .iter()
            .all(|l| !l.starts_with("High-Res Size")));
        assert!(status.to_sexp().contains(":failure \"foveated rendering disabled in settings\""));
    }
}
