//! # fbconsole Core
//!
//! Everything between the devices and the event loop: the error taxonomy,
//! configuration, text and symbol rasterization, host statistics, and the
//! differential menu painter.

pub mod canvas;
pub mod config;
pub mod error;
pub mod menu;
pub mod symbol;
pub mod system;
pub mod text;

pub use config::{Config, FontConfig, ProbeTarget};
pub use error::{ConsoleError, RenderError};
pub use menu::{ConfirmAction, MenuAction, MenuContext, MenuRenderer, PaintOutcome};
pub use symbol::{QrEncoder, SymbolEncoder};
pub use system::{NetworkInterface, ProcSystemInfo, SystemInfoSource, SystemSnapshot};
pub use text::{LineMetrics, TextRasterizer};
