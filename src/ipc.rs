//! IPC message dispatch — parse s-expressions and route foveation commands.
//!
//! Requests are plists such as `(:type :foveation-set :id 3 :key center-scale
//! :value 1.5)`; responses mirror the compositor protocol:
//! `(:type :response :id N :status :ok ...)`.

use lexpr::Value;
use tracing::{debug, warn};

use crate::vr::foveated::{FoveatedRuntime, RequestedLayout};
use crate::vr::panel::{self, ControlKind, ControlValue, FoveationStatus};
use crate::vr::pipeline::BasePipeline;
use crate::vr::runtime::XrRuntime;

/// Parse an s-expression message and dispatch it.
/// Returns an optional response string (s-expression).
pub fn handle_message<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    raw: &str,
) -> Option<String> {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);
    debug!(msg_id, "ipc: {:?}", msg_type);

    match msg_type.as_deref() {
        Some("foveation-status") => handle_status(runtime, msg_id),
        Some("foveation-config") => handle_config(runtime, msg_id),
        Some("foveation-controls") => handle_controls(runtime, msg_id),
        Some("foveation-set") => handle_set(runtime, msg_id, &value),
        Some("foveation-set-layout") => handle_set_layout(runtime, msg_id, &value),
        Some("foveation-initialize") => handle_initialize(runtime, msg_id),
        Some("foveation-destroy") => handle_destroy(runtime, msg_id),
        Some(other) => Some(error_response(msg_id, &format!("unknown message type: {other}"))),
        None => Some(error_response(msg_id, "missing :type")),
    }
}

fn handle_status<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    msg_id: i64,
) -> Option<String> {
    let status = FoveationStatus::capture(runtime);
    Some(format!(
        "(:type :response :id {} :status :ok :text \"{}\" :strategy :{} :ready {} :foveation {})",
        msg_id,
        escape_string(status.status_line()),
        runtime.strategy().as_str(),
        if runtime.ready() { "t" } else { "nil" },
        status.to_sexp()
    ))
}

fn handle_config<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    msg_id: i64,
) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :config {})",
        msg_id,
        runtime.settings.to_sexp()
    ))
}

fn handle_controls<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    msg_id: i64,
) -> Option<String> {
    let controls: Vec<String> = panel::visible_controls(&runtime.settings)
        .iter()
        .map(|c| match c.kind {
            ControlKind::Checkbox => format!(
                "(:name :{} :label \"{}\" :kind :checkbox)",
                c.name, c.label
            ),
            ControlKind::Slider { min, max } => format!(
                "(:name :{} :label \"{}\" :kind :slider :min {:.1} :max {:.1})",
                c.name, c.label, min, max
            ),
        })
        .collect();
    Some(format!(
        "(:type :response :id {} :status :ok :controls ({}) :action \"{}\")",
        msg_id,
        controls.join(" "),
        panel::INITIALIZE_LABEL
    ))
}

fn handle_set<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let Some(key) = get_keyword(value, "key") else {
        return Some(error_response(msg_id, "missing :key"));
    };
    let Some(control) = panel::control(&key) else {
        return Some(error_response(msg_id, &format!("unknown control {key}")));
    };
    let new_value = match control.kind {
        ControlKind::Checkbox => get_bool(value, "value").map(ControlValue::Bool),
        ControlKind::Slider { .. } => get_float(value, "value").map(|f| ControlValue::Float(f as f32)),
    };
    let Some(new_value) = new_value else {
        return Some(error_response(msg_id, "missing or invalid :value"));
    };

    match panel::apply_control(&mut runtime.settings, &key, new_value) {
        Ok(()) => {
            debug!(key, "foveation setting updated");
            Some(format!(
                "(:type :response :id {} :status :ok :config {})",
                msg_id,
                runtime.settings.to_sexp()
            ))
        }
        Err(e) => Some(error_response(msg_id, &e.to_string())),
    }
}

fn handle_set_layout<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    match get_keyword(value, "layout").as_deref() {
        Some("stereo") => runtime.request_layout(RequestedLayout::Stereo),
        Some("quad-view") => runtime.request_layout(RequestedLayout::QuadView),
        _ => return Some(error_response(msg_id, "invalid :layout (use stereo or quad-view)")),
    }
    Some(ok_response(msg_id))
}

fn handle_initialize<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    msg_id: i64,
) -> Option<String> {
    let ready = runtime.initialize();
    let status = FoveationStatus::capture(runtime);
    Some(format!(
        "(:type :response :id {} :status :ok :initialized {} :foveation {})",
        msg_id,
        if ready { "t" } else { "nil" },
        status.to_sexp()
    ))
}

fn handle_destroy<R: XrRuntime, B: BasePipeline>(
    runtime: &mut FoveatedRuntime<R, B>,
    msg_id: i64,
) -> Option<String> {
    runtime.destroy();
    Some(ok_response(msg_id))
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Value following `:key` in a plist, as a string.
/// Accepts both `Value::Keyword("key")` and `Value::Symbol(":key")` forms.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            let Value::Cons(next) = pair.cdr() else {
                return None;
            };
            let val = next.car();
            return match val {
                Value::Keyword(v) => Some(v.to_string()),
                Value::Symbol(v) => {
                    let s = v.to_string();
                    Some(s.strip_prefix(':').unwrap_or(&s).to_string())
                }
                Value::String(v) => Some(v.to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(if *b { "t" } else { "nil" }.to_string()),
                Value::Null | Value::Nil => Some("nil".to_string()),
                _ => Some(val.to_string()),
            };
        }
        current = pair.cdr();
    }
    None
}

fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// `t` or `nil` only; a number sent to a checkbox is rejected.
fn get_bool(value: &Value, key: &str) -> Option<bool> {
    match get_keyword(value, key)?.as_str() {
        "t" => Some(true),
        "nil" => Some(false),
        _ => None,
    }
}

fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::pipeline::HeadlessPipeline;
    use crate::vr::settings::FoveationSettings;
    use crate::vr::stub::SimulatedRuntime;

    fn runtime() -> FoveatedRuntime<SimulatedRuntime, HeadlessPipeline> {
        FoveatedRuntime::new(
            SimulatedRuntime::quad_view(2000, 2000),
            HeadlessPipeline::running(),
            FoveationSettings::default(),
        )
    }

    #[test]
    fn test_status_before_initialize() {
        let mut rt = runtime();
        let resp = handle_message(&mut rt, "(:type :foveation-status :id 1)").unwrap();
        assert!(resp.contains(":id 1 :status :ok"));
        assert!(resp.contains(":text \"Foveated Rendering: Not initialized\""));
        assert!(resp.contains(":strategy :standard"));
        assert!(resp.contains(":state :uninitialized"));
    }

    #[test]
    fn test_enable_then_initialize() {
        let mut rt = runtime();
        let resp = handle_message(&mut rt, "(:type :foveation-initialize :id 2)").unwrap();
        assert!(resp.contains(":initialized nil"));
        assert!(resp.contains(":state :unsupported"));

        let resp =
            handle_message(&mut rt, "(:type :foveation-set :id 3 :key enabled :value t)").unwrap();
        assert!(resp.contains(":config (:enabled t"));

        let resp = handle_message(&mut rt, "(:type :foveation-initialize :id 4)").unwrap();
        assert!(resp.contains(":initialized t"));
        assert!(resp.contains(":high-res (:w 1000 :h 1000)"));

        let resp = handle_message(&mut rt, "(:type :foveation-status :id 5)").unwrap();
        assert!(resp.contains(":strategy :foveated"));
        assert!(resp.contains(":ready t"));
    }

    #[test]
    fn test_set_validates_range() {
        let mut rt = runtime();
        let resp = handle_message(
            &mut rt,
            "(:type :foveation-set :id 6 :key center-scale :value 3.5)",
        )
        .unwrap();
        assert!(resp.contains(":status :error"));
        assert!(resp.contains("out of range"));
        assert_eq!(rt.settings.center_resolution_scale, 1.0);

        let resp = handle_message(
            &mut rt,
            "(:type :foveation-set :id 7 :key center-scale :value 1.5)",
        )
        .unwrap();
        assert!(resp.contains(":status :ok"));
        assert_eq!(rt.settings.center_resolution_scale, 1.5);
    }

    #[test]
    fn test_set_rejects_unknown_key_and_missing_value() {
        let mut rt = runtime();
        let resp =
            handle_message(&mut rt, "(:type :foveation-set :id 8 :key warp :value 1.0)").unwrap();
        assert!(resp.contains("unknown control warp"));
        let resp = handle_message(&mut rt, "(:type :foveation-set :id 9 :key center-size-x)").unwrap();
        assert!(resp.contains("missing or invalid :value"));
    }

    #[test]
    fn test_set_checkbox_accepts_only_booleans() {
        let mut rt = runtime();
        rt.settings.enabled = true;
        let resp =
            handle_message(&mut rt, "(:type :foveation-set :id 16 :key enabled :value 1.5)").unwrap();
        assert!(resp.contains("missing or invalid :value"));
        assert!(rt.settings.enabled);

        let resp =
            handle_message(&mut rt, "(:type :foveation-set :id 17 :key enabled :value nil)").unwrap();
        assert!(resp.contains(":config (:enabled nil"));
        assert!(!rt.settings.enabled);

        handle_message(&mut rt, "(:type :foveation-set :id 18 :key eye-tracking :value t)").unwrap();
        assert!(rt.settings.use_eye_tracking);
    }

    #[test]
    fn test_controls_follow_enable() {
        let mut rt = runtime();
        let resp = handle_message(&mut rt, "(:type :foveation-controls :id 10)").unwrap();
        assert!(resp.contains(":name :enabled"));
        assert!(!resp.contains(":name :center-scale"));
        rt.settings.enabled = true;
        let resp = handle_message(&mut rt, "(:type :foveation-controls :id 11)").unwrap();
        assert!(resp.contains(":name :center-scale :label \"Center Resolution Scale\" :kind :slider :min 0.1 :max 2.0"));
        assert!(resp.contains(":action \"Initialize Foveated Rendering\""));
    }

    #[test]
    fn test_layout_and_destroy() {
        let mut rt = runtime();
        let resp =
            handle_message(&mut rt, "(:type :foveation-set-layout :id 12 :layout stereo)").unwrap();
        assert_eq!(resp, "(:type :response :id 12 :status :ok)");
        assert_eq!(rt.requested_layout(), RequestedLayout::Stereo);
        let resp =
            handle_message(&mut rt, "(:type :foveation-set-layout :id 13 :layout diagonal)").unwrap();
        assert!(resp.contains(":status :error"));

        let resp = handle_message(&mut rt, "(:type :foveation-destroy :id 14)").unwrap();
        assert!(resp.contains(":status :ok"));
        assert!(rt.base().destroyed);
    }

    #[test]
    fn test_malformed_and_unknown() {
        let mut rt = runtime();
        let resp = handle_message(&mut rt, "(:type :foveation-status").unwrap();
        assert!(resp.contains("malformed s-expression"));
        let resp = handle_message(&mut rt, "(:type :warp-drive :id 15)").unwrap();
        assert!(resp.contains("unknown message type: warp-drive"));
    }
}
