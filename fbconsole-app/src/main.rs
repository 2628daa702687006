use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use fbconsole_app::cli::Args;
use fbconsole_app::{logging, Orchestrator};
use fbconsole_core::text::load_rasterizer;
use fbconsole_core::{Config, MenuRenderer, ProcSystemInfo, QrEncoder, SystemInfoSource};
use fbconsole_display::{console_resolution, discover_device, FrameBufferDevice};
use fbconsole_input::{RawModeOptions, RawTerminalInput};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    logging::init_global(&config.log_file)?;
    tracing::info!(
        "fbconsole {} starting (exit on control keys: {})",
        env!("CARGO_PKG_VERSION"),
        config.exit_on_control_keys
    );

    // Put the terminal back before the panic message is printed.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        fbconsole_input::emergency_restore();
        original_hook(panic);
    }));

    // Framebuffer and font first: a failure there must not leave the
    // terminal in raw mode.
    let device_path = config.device.clone().unwrap_or_else(discover_device);
    let display = FrameBufferDevice::open(&device_path)
        .with_context(|| format!("Failed to open framebuffer {}", device_path.display()))?;
    let display = Arc::new(display);

    let (width, height) = display.dimensions();
    let format = display.format();
    tracing::info!(
        "Framebuffer {} is {}x{} {:?}",
        device_path.display(),
        width,
        height,
        format
    );
    if let Some(name) = device_path.file_name() {
        let virtual_size = PathBuf::from("/sys/class/graphics")
            .join(name)
            .join("virtual_size");
        let (console_w, console_h) = console_resolution(&virtual_size);
        if (console_w, console_h) != (width, height) {
            tracing::info!("Console reports {}x{}", console_w, console_h);
        }
    }

    let text = match load_rasterizer(&config.font) {
        Ok(text) => text,
        Err(e) => {
            let _ = display.close();
            return Err(e).context("Failed to load font");
        }
    };
    tracing::info!("Font: {}", text.describe());

    let renderer = MenuRenderer::new(
        display.clone(),
        text,
        Some(Box::new(QrEncoder::default())),
        config.support_contact.as_deref(),
    );
    let info: Arc<dyn SystemInfoSource> =
        Arc::new(ProcSystemInfo::new(config.device_id_file.clone()));

    let options = RawModeOptions {
        deliver_control_bytes: config.deliver_control_bytes,
    };
    let input = match RawTerminalInput::open(options) {
        Ok(input) => Arc::new(input),
        Err(e) => {
            let _ = display.close();
            return Err(e).context("Failed to open terminal");
        }
    };

    let orchestrator = Orchestrator::new(display, input, renderer, info, config);
    let reason = orchestrator
        .run()
        .await
        .context("Console stopped on a fatal error")?;

    tracing::info!("fbconsole exited ({:?})", reason);
    Ok(())
}
