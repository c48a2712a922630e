//! ewwm-foveation - probe and negotiate quad-view foveated rendering
//!
//! Part of the EXWM-VR project: a transhuman Emacs window manager.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use ewwm_foveation::vr::panel::{self, ControlValue, FoveationStatus};
use ewwm_foveation::vr::settings::SexpSettingsFile;
use ewwm_foveation::vr::{
    stub, FoveatedRuntime, FoveationSettings, HeadlessPipeline, RequestedLayout, SimulatedRuntime,
    XrRuntime,
};

#[derive(Parser, Debug)]
#[command(name = "ewwm-foveation", about = "EXWM-VR foveated rendering negotiation")]
struct Cli {
    /// Settings file (s-expression plist)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings back to --config
    #[arg(long)]
    save: bool,

    /// Enable foveated rendering
    #[arg(long)]
    enable: bool,

    /// Center (high-res) resolution scale, 0.1-2.0
    #[arg(long)]
    center_scale: Option<f32>,

    /// Peripheral (low-res) resolution scale, 0.1-1.0
    #[arg(long)]
    peripheral_scale: Option<f32>,

    /// Horizontal fraction of the eye view covered by the inset, 0.1-1.0
    #[arg(long)]
    center_size_x: Option<f32>,

    /// Vertical fraction of the eye view covered by the inset, 0.1-1.0
    #[arg(long)]
    center_size_y: Option<f32>,

    /// Use eye-tracked foveation when available
    #[arg(long)]
    eye_tracking: bool,

    /// Request plain stereo instead of quad views
    #[arg(long)]
    stereo: bool,

    /// Simulated runtime: number of views in the quad-view configuration
    #[arg(long, default_value_t = 4)]
    simulate_view_count: usize,

    /// Simulated runtime: do not advertise the quad-view configuration
    #[arg(long)]
    simulate_no_quad_view: bool,

    /// Simulated runtime: recommended per-view size, WxH
    #[arg(long, value_parser = parse_size, default_value = "2000x2000")]
    simulate_size: (u32, u32),

    /// Simulated runtime: advertised instance extension (repeatable)
    #[arg(long = "simulate-extension")]
    simulate_extensions: Vec<String>,

    /// Use the OpenXR runtime instead of the simulated one
    #[arg(long)]
    openxr: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s}"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width {w}: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height {h}: {e}"))?;
    Ok((w, h))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("ewwm-foveation {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ewwm_foveation=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("ewwm-foveation v{} starting", env!("CARGO_PKG_VERSION"));

    let mut file = cli
        .config
        .as_ref()
        .map(SexpSettingsFile::open)
        .transpose()?;
    let mut settings = match file.as_mut() {
        Some(file) => FoveationSettings::load(file, true),
        None => FoveationSettings::default(),
    };
    apply_overrides(&cli, &mut settings)?;

    if cli.openxr {
        #[cfg(feature = "vr")]
        {
            let runtime = ewwm_foveation::vr::OpenXrRuntime::load()?;
            return run(runtime, settings, &cli, file.as_mut());
        }
        #[cfg(not(feature = "vr"))]
        anyhow::bail!("built without the `vr` feature; rebuild with --features vr");
    }

    let mut runtime = SimulatedRuntime::new().with_recommended_size(cli.simulate_size.0, cli.simulate_size.1);
    if !cli.simulate_no_quad_view {
        runtime = runtime.with_quad_view_count(cli.simulate_view_count);
    }
    let names: Vec<&str> = cli.simulate_extensions.iter().map(String::as_str).collect();
    runtime = runtime.with_extensions(&names);
    run(runtime, settings, &cli, file.as_mut())
}

fn apply_overrides(cli: &Cli, settings: &mut FoveationSettings) -> anyhow::Result<()> {
    let mut edits = Vec::new();
    if cli.enable {
        edits.push(("enabled", ControlValue::Bool(true)));
    }
    if cli.eye_tracking {
        edits.push(("eye-tracking", ControlValue::Bool(true)));
    }
    let sliders = [
        ("center-scale", cli.center_scale),
        ("peripheral-scale", cli.peripheral_scale),
        ("center-size-x", cli.center_size_x),
        ("center-size-y", cli.center_size_y),
    ];
    for (name, value) in sliders {
        if let Some(v) = value {
            edits.push((name, ControlValue::Float(v)));
        }
    }
    for (name, value) in edits {
        panel::apply_control(settings, name, value).with_context(|| format!("--{name}"))?;
    }
    Ok(())
}

fn run<R: XrRuntime>(
    runtime: R,
    settings: FoveationSettings,
    cli: &Cli,
    file: Option<&mut SexpSettingsFile>,
) -> anyhow::Result<()> {
    stub::announce(&runtime);

    let mut foveated = FoveatedRuntime::new(runtime, HeadlessPipeline::running(), settings);
    if cli.stereo {
        foveated.request_layout(RequestedLayout::Stereo);
    }

    if foveated.initialize() {
        foveated.update_render_target_size()?;
        foveated.update_matrices(0.1, 1000.0)?;
        for request in foveated.swapchain_requests() {
            info!(
                "VR: swapchain for view {} ({}): {}x{}, {} samples",
                request.view_index,
                request.role.as_str(),
                request.width,
                request.height,
                request.sample_count
            );
        }
    }

    let status = FoveationStatus::capture(&foveated);
    println!("{}", status.status_line());
    for line in status.info_lines() {
        println!("{}", line);
    }
    println!("{}", status.to_sexp());

    if cli.save {
        match file {
            Some(file) => {
                foveated.save_settings(file);
                file.flush()?;
            }
            None => warn!("foveation: --save needs --config, settings not written"),
        }
    }

    foveated.destroy();
    Ok(())
}
