//! The differential painter.
//!
//! MainStatus is split into static chrome (title, rule, footer), drawn once
//! per invalidation, and a dynamic block (status fields plus the device-ID
//! symbol) that is repainted only when its fingerprint changes. Between
//! full clears, only the bounding box of the previous and current dynamic
//! block is wiped.
//!
//! Every bitmap for a frame is rasterized before the first device write, so
//! a failing frame never leaves half a screen behind.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fbconsole_display::{FrameBufferDevice, Rect, Rgba, RgbaImage, BLACK};

use crate::error::{ConsoleError, RenderError};
use crate::menu::screens;
use crate::symbol::SymbolEncoder;
use crate::system::SystemSnapshot;
use crate::text::TextRasterizer;

const MARGIN_X: i32 = 20;
const MARGIN_TOP: i32 = 10;
const MARGIN_BOTTOM: i32 = 20;
const LINE_GAP: u32 = 3;
const SECTION_GAP: i32 = 10;

const TEXT_COLOR: Rgba<u8> = Rgba([230, 230, 230, 255]);
const TITLE_COLOR: Rgba<u8> = Rgba([80, 200, 255, 255]);
const RULE_COLOR: Rgba<u8> = Rgba([90, 90, 90, 255]);
const HINT_COLOR: Rgba<u8> = Rgba([160, 160, 160, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOutcome {
    /// Nothing changed; the device was not touched.
    Skipped,
    /// Only the dynamic block was wiped and redrawn.
    Partial,
    /// The whole device was cleared and redrawn.
    Full,
}

/// Paint cache for MainStatus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub fingerprint: Option<u64>,
    pub chrome_drawn: bool,
    pub dynamic_bounds: Option<Rect>,
    pub needs_full_clear: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            fingerprint: None,
            chrome_drawn: false,
            dynamic_bounds: None,
            needs_full_clear: true,
        }
    }
}

/// A bitmap and where it goes.
struct Placed {
    image: RgbaImage,
    x: i32,
    y: i32,
}

impl Placed {
    fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.image.width(), self.image.height())
    }
}

pub fn fingerprint(lines: &[String]) -> u64 {
    let mut hasher = DefaultHasher::new();
    lines.hash(&mut hasher);
    hasher.finish()
}

pub struct MenuRenderer {
    display: Arc<FrameBufferDevice>,
    text: Box<dyn TextRasterizer>,
    symbols: Option<Box<dyn SymbolEncoder>>,
    footer: Vec<String>,
    state: DisplayState,
}

impl std::fmt::Debug for MenuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuRenderer")
            .field("font", &self.text.describe())
            .field("state", &self.state)
            .finish()
    }
}

impl MenuRenderer {
    pub fn new(
        display: Arc<FrameBufferDevice>,
        text: Box<dyn TextRasterizer>,
        symbols: Option<Box<dyn SymbolEncoder>>,
        support_contact: Option<&str>,
    ) -> Self {
        Self {
            display,
            text,
            symbols,
            footer: screens::footer_lines(support_contact),
            state: DisplayState::default(),
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Forget everything painted; the next MainStatus paint clears the device.
    pub fn invalidate(&mut self) {
        self.state = DisplayState::default();
    }

    fn line_advance(&self) -> i32 {
        (self.text.line_metrics().line_height + LINE_GAP) as i32
    }

    fn rasterize(&self, line: &str, color: Rgba<u8>, x: i32, y: i32) -> Result<Placed, ConsoleError> {
        let image = self.text.render(line, color)?;
        Ok(Placed { image, x, y })
    }

    /// Top of the dynamic block: below the title and its rule.
    fn dynamic_top(&self) -> i32 {
        MARGIN_TOP + self.text.line_metrics().line_height as i32 + SECTION_GAP
    }

    /// First row of the footer, anchored to the bottom edge.
    fn footer_top(&self) -> i32 {
        let (_, height) = self.display.dimensions();
        height as i32 - MARGIN_BOTTOM - self.line_advance() * self.footer.len() as i32
    }

    fn layout_chrome(&self) -> Result<(Vec<Placed>, Rect), ConsoleError> {
        let (width, _) = self.display.dimensions();
        let mut placed = vec![self.rasterize(screens::MAIN_TITLE, TITLE_COLOR, MARGIN_X, MARGIN_TOP)?];

        let rule_y = MARGIN_TOP + self.text.line_metrics().line_height as i32 + SECTION_GAP / 2;
        let rule = Rect::new(MARGIN_X, rule_y, width.saturating_sub(2 * MARGIN_X as u32), 1);

        let advance = self.line_advance();
        let mut y = self.footer_top();
        for line in &self.footer {
            placed.push(self.rasterize(line, HINT_COLOR, MARGIN_X, y)?);
            y += advance;
        }
        Ok((placed, rule))
    }

    /// Lay out the fields and the device-ID symbol between the rule and the
    /// footer. Nothing placed here may reach `footer_top`, since partial
    /// repaints wipe the whole block and chrome is not redrawn.
    fn layout_dynamic(
        &self,
        lines: &[String],
        device_id: Option<&str>,
    ) -> Result<Vec<Placed>, ConsoleError> {
        let limit = self.footer_top() - LINE_GAP as i32;
        let advance = self.line_advance();
        let mut y = self.dynamic_top();
        let mut placed = Vec::with_capacity(lines.len() + 1);
        for line in lines {
            let p = self.rasterize(line, TEXT_COLOR, MARGIN_X, y)?;
            if p.y + p.image.height() as i32 > limit {
                break;
            }
            placed.push(p);
            y += advance;
        }
        if placed.is_empty() {
            let (width, height) = self.display.dimensions();
            return Err(RenderError::Layout(format!(
                "no room for status fields on a {}x{} display",
                width, height
            ))
            .into());
        }
        if placed.len() < lines.len() {
            tracing::debug!(
                "Status screen shows {} of {} fields, display too small",
                placed.len(),
                lines.len()
            );
            return Ok(placed);
        }
        y += SECTION_GAP;

        let notice = match (device_id, self.symbols.as_ref()) {
            (Some(id), Some(encoder)) => match encoder.encode(id) {
                Ok(image) if y + image.height() as i32 <= limit => {
                    placed.push(Placed {
                        image,
                        x: MARGIN_X,
                        y,
                    });
                    None
                }
                Ok(_) => Some("Device ID code does not fit on this display".to_string()),
                Err(e) => {
                    tracing::warn!("Device ID symbol unavailable: {}", e);
                    Some(format!("Device ID code unavailable: {}", e))
                }
            },
            (None, Some(_)) => Some("No device ID available".to_string()),
            (_, None) => None,
        };
        if let Some(notice) = notice {
            let p = self.rasterize(&notice, HINT_COLOR, MARGIN_X, y)?;
            if p.y + p.image.height() as i32 <= limit {
                placed.push(p);
            }
        }
        Ok(placed)
    }

    /// Paint the status screen, touching the device only where needed.
    pub fn render_main_status(&mut self, snapshot: &SystemSnapshot) -> Result<PaintOutcome, ConsoleError> {
        let lines = snapshot.field_lines();
        let print = fingerprint(&lines);
        if self.state.chrome_drawn && self.state.fingerprint == Some(print) {
            return Ok(PaintOutcome::Skipped);
        }

        let result = self.paint_main_status(&lines, snapshot.device_id.as_deref(), print);
        if let Err(e) = &result {
            tracing::error!("Status frame failed: {}", e);
            self.invalidate();
        }
        result
    }

    fn paint_main_status(
        &mut self,
        lines: &[String],
        device_id: Option<&str>,
        print: u64,
    ) -> Result<PaintOutcome, ConsoleError> {
        let full = self.state.needs_full_clear || !self.state.chrome_drawn;
        let chrome = if full { Some(self.layout_chrome()?) } else { None };
        let dynamic = self.layout_dynamic(lines, device_id)?;

        let bounds = dynamic
            .iter()
            .map(Placed::bounds)
            .fold(Rect::default(), |acc, r| acc.union(&r));

        if full {
            self.display.clear();
        } else {
            let dirty = self
                .state
                .dynamic_bounds
                .map_or(bounds, |previous| previous.union(&bounds));
            self.display.fill_rect(dirty, BLACK);
        }

        if let Some((placed, rule)) = &chrome {
            for p in placed {
                self.display.blit_image(&p.image, p.x, p.y);
            }
            self.display.fill_rect(*rule, RULE_COLOR);
        }
        for p in &dynamic {
            self.display.blit_image(&p.image, p.x, p.y);
        }

        self.state = DisplayState {
            fingerprint: Some(print),
            chrome_drawn: true,
            dynamic_bounds: Some(bounds),
            needs_full_clear: false,
        };
        Ok(if full {
            PaintOutcome::Full
        } else {
            PaintOutcome::Partial
        })
    }

    /// Clear the device and draw `lines` top-down. Used by every modal
    /// screen; leaves the MainStatus cache invalidated.
    pub fn render_lines(&mut self, lines: &[String]) -> Result<(), ConsoleError> {
        self.invalidate();
        let advance = self.line_advance();
        let placed = lines
            .iter()
            .enumerate()
            .map(|(i, line)| self.rasterize(line, TEXT_COLOR, MARGIN_X, MARGIN_X + advance * i as i32))
            .collect::<Result<Vec<_>, _>>()?;

        self.display.clear();
        for p in &placed {
            self.display.blit_image(&p.image, p.x, p.y);
        }
        Ok(())
    }

    pub fn render_config_menu(&mut self) -> Result<(), ConsoleError> {
        self.render_lines(&screens::config_menu())
    }

    pub fn render_message(&mut self, text: &str) -> Result<(), ConsoleError> {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        self.render_lines(&lines)
    }
}
