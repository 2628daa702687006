use fbconsole_core::menu::renderer::fingerprint;
use fbconsole_core::text::{load_rasterizer, MonoFontRasterizer};
use fbconsole_core::{
    Config, ConsoleError, FontConfig, LineMetrics, MenuRenderer, PaintOutcome, ProcSystemInfo,
    QrEncoder, RenderError, SystemInfoSource, SystemSnapshot, TextRasterizer,
};
use fbconsole_display::{FrameBufferDevice, Rgba, RgbaImage};
use std::sync::Arc;

// ════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════

fn snapshot() -> SystemSnapshot {
    SystemSnapshot {
        uptime: "1d 2h 3m".into(),
        cpu_model: "Test CPU".into(),
        cpu_cores: 4,
        memory_usage: "25.0% (used 1.0 GB / total 4.0 GB)".into(),
        disk_size: "64.0 GB".into(),
        disk_count: 1,
        current_time: "2026-01-01 12:00:00".into(),
        ip_address: "10.0.0.2".into(),
        device_id: None,
    }
}

fn renderer(fb: &Arc<FrameBufferDevice>) -> MenuRenderer {
    MenuRenderer::new(
        fb.clone(),
        Box::new(MonoFontRasterizer::for_size(20.0)),
        None,
        Some("ops@example.com"),
    )
}

fn shadow() -> Arc<FrameBufferDevice> {
    Arc::new(FrameBufferDevice::shadow(640, 480, 32).unwrap())
}

/// Bitmap font that refuses any line containing `poison`.
struct PoisonedFont {
    inner: MonoFontRasterizer,
    poison: &'static str,
}

impl TextRasterizer for PoisonedFont {
    fn measure(&self, text: &str) -> Result<(u32, u32), RenderError> {
        self.inner.measure(text)
    }

    fn render(&self, text: &str, color: Rgba<u8>) -> Result<RgbaImage, RenderError> {
        if text.contains(self.poison) {
            return Err(RenderError::Glyph {
                text: text.to_string(),
                reason: "poisoned".into(),
            });
        }
        self.inner.render(text, color)
    }

    fn line_metrics(&self) -> LineMetrics {
        self.inner.line_metrics()
    }

    fn describe(&self) -> String {
        "poisoned".into()
    }
}

// ════════════════════════════════════════════════════════════════════
// Differential Painting
// ════════════════════════════════════════════════════════════════════

#[test]
fn test_first_paint_is_full() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    assert_eq!(menu.render_main_status(&snapshot()).unwrap(), PaintOutcome::Full);
    assert_eq!(fb.stats().full_clears, 1);
    assert!(fb.stats().pixel_writes > 0);
    assert!(menu.state().chrome_drawn);
    assert!(!menu.state().needs_full_clear);
}

#[test]
fn test_unchanged_snapshot_writes_nothing() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    menu.render_main_status(&snapshot()).unwrap();
    let before = fb.stats();

    assert_eq!(menu.render_main_status(&snapshot()).unwrap(), PaintOutcome::Skipped);
    assert_eq!(fb.stats(), before);
}

#[test]
fn test_changed_field_only_touches_dynamic_region() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    menu.render_main_status(&snapshot()).unwrap();
    let previous = menu.state().dynamic_bounds.unwrap();
    let marker = Rgba([255, 0, 0, 255]);
    fb.set_pixel(639, 0, marker);
    let before = fb.snapshot().unwrap();
    let clears = fb.stats().full_clears;

    let mut changed = snapshot();
    changed.current_time = "2026-01-01 12:00:05".into();
    assert_eq!(menu.render_main_status(&changed).unwrap(), PaintOutcome::Partial);

    let after = fb.snapshot().unwrap();
    let dirty = previous.union(&menu.state().dynamic_bounds.unwrap());
    let stride = fb.stride();
    for y in 0..480 {
        for x in 0..640 {
            if dirty.contains(x, y) {
                continue;
            }
            let at = y as usize * stride + x as usize * 4;
            assert_eq!(before[at..at + 4], after[at..at + 4], "pixel ({}, {}) changed", x, y);
        }
    }
    assert_eq!(fb.stats().full_clears, clears);
    assert_eq!(fb.pixel(639, 0), Some(marker));
    assert_ne!(before, after);
}

#[test]
fn test_shrinking_field_wipes_old_text() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    let mut long = snapshot();
    long.ip_address = "192.168.100.200 (very long annotation)".into();
    menu.render_main_status(&long).unwrap();
    let wide = menu.state().dynamic_bounds.unwrap();

    menu.render_main_status(&snapshot()).unwrap();
    let narrow = menu.state().dynamic_bounds.unwrap();
    assert!(narrow.width < wide.width);

    // The strip that only the long line covered is black again.
    let x = narrow.x + narrow.width as i32 + 5;
    for y in wide.y..wide.y + wide.height as i32 {
        assert_eq!(fb.pixel(x, y), Some(Rgba([0, 0, 0, 255])), "({}, {})", x, y);
    }
}

#[test]
fn test_invalidate_forces_full_repaint() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    menu.render_main_status(&snapshot()).unwrap();
    menu.invalidate();
    assert_eq!(menu.render_main_status(&snapshot()).unwrap(), PaintOutcome::Full);
    assert_eq!(fb.stats().full_clears, 2);
}

#[test]
fn test_failed_line_leaves_device_untouched() {
    let fb = shadow();
    let mut menu = MenuRenderer::new(
        fb.clone(),
        Box::new(PoisonedFont {
            inner: MonoFontRasterizer::for_size(20.0),
            poison: "Memory",
        }),
        None,
        None,
    );
    let before = fb.stats();

    let err = menu.render_main_status(&snapshot()).unwrap_err();
    assert!(matches!(err, ConsoleError::RenderFailure(_)));
    assert_eq!(fb.stats(), before);
    assert!(menu.state().needs_full_clear);
    assert!(!menu.state().chrome_drawn);
}

#[test]
fn test_device_id_symbol_extends_dynamic_block() {
    let fb = shadow();
    let mut plain = renderer(&fb);
    let mut with_id = snapshot();
    with_id.device_id = Some("device-1234".into());
    plain.render_main_status(&with_id).unwrap();
    let text_only = plain.state().dynamic_bounds.unwrap();

    let mut menu = MenuRenderer::new(
        fb.clone(),
        Box::new(MonoFontRasterizer::for_size(20.0)),
        Some(Box::new(QrEncoder::default())),
        None,
    );
    menu.render_main_status(&with_id).unwrap();
    let bounds = menu.state().dynamic_bounds.unwrap();
    assert!(bounds.height >= text_only.height + 100);
}

#[test]
fn test_modal_screen_invalidates_status_cache() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    menu.render_main_status(&snapshot()).unwrap();
    menu.render_config_menu().unwrap();

    assert!(!menu.state().chrome_drawn);
    assert!(menu.state().needs_full_clear);
    assert_eq!(menu.render_main_status(&snapshot()).unwrap(), PaintOutcome::Full);
}

#[test]
fn test_render_message_splits_lines() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    menu.render_message("first\nsecond").unwrap();
    assert_eq!(fb.stats().full_clears, 1);
    assert!(fb.snapshot().unwrap().iter().any(|&b| b != 0));
}

#[test]
fn test_fingerprint_tracks_content() {
    let a = snapshot().field_lines();
    let mut other = snapshot();
    other.cpu_cores = 8;
    assert_eq!(fingerprint(&a), fingerprint(&snapshot().field_lines()));
    assert_ne!(fingerprint(&a), fingerprint(&other.field_lines()));
}

#[test]
fn test_dynamic_block_starts_below_chrome() {
    let fb = shadow();
    let mut menu = renderer(&fb);
    menu.render_main_status(&snapshot()).unwrap();
    let bounds = menu.state().dynamic_bounds.unwrap();
    // Title is drawn at y = 10 with the 20px bitmap font.
    assert!(bounds.y >= 30);
    assert!(!bounds.contains(639, 479));
}

/// Rows of the device below `from` that hold anything but black.
fn lit_pixels_below(fb: &FrameBufferDevice, from: i32) -> usize {
    let (width, height) = fb.dimensions();
    (from.max(0)..height as i32)
        .flat_map(|y| (0..width as i32).map(move |x| (x, y)))
        .filter(|&(x, y)| fb.pixel(x, y) != Some(Rgba([0, 0, 0, 255])))
        .count()
}

#[test]
fn test_small_display_keeps_footer_intact() {
    let fb = Arc::new(FrameBufferDevice::shadow(320, 240, 32).unwrap());
    let mut menu = MenuRenderer::new(
        fb.clone(),
        Box::new(MonoFontRasterizer::for_size(20.0)),
        Some(Box::new(QrEncoder::default())),
        Some("ops@example.com"),
    );
    let mut first = snapshot();
    first.device_id = Some("device-1234".into());
    assert_eq!(menu.render_main_status(&first).unwrap(), PaintOutcome::Full);
    let bounds = menu.state().dynamic_bounds.unwrap();
    let below = bounds.y + bounds.height as i32;
    let footer_before = lit_pixels_below(&fb, below);
    assert!(footer_before > 0, "footer not visible below the status block");
    let before = fb.snapshot().unwrap();

    let mut second = first.clone();
    second.current_time = "2026-01-01 12:00:05".into();
    assert_eq!(menu.render_main_status(&second).unwrap(), PaintOutcome::Partial);

    let after = fb.snapshot().unwrap();
    let from = below.max(0) as usize * fb.stride();
    assert_eq!(before[from..], after[from..]);
    assert_eq!(lit_pixels_below(&fb, below), footer_before);
}

#[test]
fn test_symbol_that_does_not_fit_is_left_out() {
    let fb = Arc::new(FrameBufferDevice::shadow(640, 320, 32).unwrap());
    let mut menu = MenuRenderer::new(
        fb.clone(),
        Box::new(MonoFontRasterizer::for_size(20.0)),
        Some(Box::new(QrEncoder::default())),
        None,
    );
    let mut with_id = snapshot();
    with_id.device_id = Some("device-1234".into());
    menu.render_main_status(&with_id).unwrap();

    let bounds = menu.state().dynamic_bounds.unwrap();
    // The footer line starts 20px plus one 27px line above the bottom edge.
    assert!(bounds.y + bounds.height as i32 <= 320 - 20 - 27);
}

#[test]
fn test_display_without_room_for_fields_fails_cleanly() {
    let fb = Arc::new(FrameBufferDevice::shadow(320, 80, 32).unwrap());
    let mut menu = renderer(&fb);
    let before = fb.stats();

    let err = menu.render_main_status(&snapshot()).unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::RenderFailure(RenderError::Layout(_))
    ));
    assert_eq!(fb.stats(), before);
    assert!(!menu.state().chrome_drawn);
}

// ════════════════════════════════════════════════════════════════════
// Configuration
// ════════════════════════════════════════════════════════════════════

#[test]
fn test_empty_json_is_default() {
    assert_eq!(Config::from_json("{}").unwrap(), Config::default());
}

#[test]
fn test_partial_json_overrides() {
    let config = Config::from_json(
        r#"{"refresh_interval_secs": 2, "font": {"size": 16.0}, "exit_on_control_keys": false}"#,
    )
    .unwrap();
    assert_eq!(config.refresh_interval_secs, 2);
    assert_eq!(config.font.size, 16.0);
    assert!(config.font.path.is_none());
    assert!(!config.exit_on_control_keys);
    assert_eq!(config.modal_timeout_secs, 30);
}

#[test]
fn test_invalid_config_rejected() {
    assert!(matches!(
        Config::from_json(r#"{"refresh_interval_secs": 0}"#),
        Err(ConsoleError::Config(_))
    ));
    assert!(Config::from_json(r#"{"font": {"size": 500.0}}"#).is_err());
    assert!(Config::from_json("not json").is_err());
}

#[test]
fn test_load_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"services": ["sshd"], "support_contact": "help desk"}"#).unwrap();

    let config = Config::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.services, vec!["sshd".to_string()]);
    assert_eq!(config.support_contact.as_deref(), Some("help desk"));
    assert!(Config::load(&dir.path().join("missing.json")).is_err());
}

// ════════════════════════════════════════════════════════════════════
// Fonts
// ════════════════════════════════════════════════════════════════════

#[test]
fn test_configured_font_must_load() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("broken.ttf");
    std::fs::write(&bogus, b"not a font").unwrap();
    let config = FontConfig {
        path: Some(bogus),
        size: 20.0,
    };
    assert!(matches!(load_rasterizer(&config), Err(RenderError::Font(_))));
}

// ════════════════════════════════════════════════════════════════════
// System Information
// ════════════════════════════════════════════════════════════════════

#[test]
fn test_proc_snapshot_from_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("uptime"), "3700.00 100.00\n").unwrap();
    std::fs::write(
        root.join("cpuinfo"),
        "processor : 0\nmodel name : Fixture CPU\nprocessor : 1\nmodel name : Fixture CPU\n",
    )
    .unwrap();
    std::fs::write(root.join("meminfo"), "MemTotal: 2048 kB\nMemAvailable: 1024 kB\n").unwrap();
    std::fs::write(root.join("mounts"), "/dev/vda1 / ext4 rw 0 0\n/dev/vdb /srv ext4 rw 0 0\n").unwrap();
    let id_file = root.join("machine-id");
    std::fs::write(&id_file, "abc123\n").unwrap();

    let info = ProcSystemInfo::with_proc_root(root, Some(id_file));
    let snap = info.snapshot();

    assert_eq!(snap.uptime, "0d 1h 1m");
    assert_eq!(snap.cpu_model, "Fixture CPU");
    assert_eq!(snap.cpu_cores, 2);
    assert_eq!(snap.memory_usage, "50.0% (used 1.0 MB / total 2.0 MB)");
    assert_eq!(snap.disk_count, 2);
    assert_eq!(snap.device_id.as_deref(), Some("abc123"));
    assert_eq!(snap.current_time.len(), "2026-01-01 12:00:00".len());
}

#[test]
fn test_missing_proc_files_degrade_to_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let info = ProcSystemInfo::with_proc_root(dir.path(), None);
    let snap = info.snapshot();
    assert_eq!(snap.uptime, "unknown");
    assert_eq!(snap.memory_usage, "unknown");
    assert_eq!(snap.device_id, None);
    assert!(snap.field_lines().iter().any(|l| l == "Device ID: unknown"));
}
