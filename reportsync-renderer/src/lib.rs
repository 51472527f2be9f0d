//! # reportsync-renderer
//!
//! Tera-based artifact generator that turns a validated record into an HTML
//! report.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use reportsync_core::{ArtifactGenerator, LocalRecord};
//! use reportsync_renderer::HtmlReportGenerator;
//!
//! fn render_one(path: &Path) {
//!     let generator = HtmlReportGenerator::new(Path::new("artifacts"), None);
//!     if let (Ok(generator), Ok(record)) = (generator, LocalRecord::load(path)) {
//!         if let Ok(out) = generator.generate(&record) {
//!             println!("{}", out.display());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::ReportContext;
pub use engine::{HtmlReportGenerator, TemplateEngine, REPORT_TEMPLATE};
pub use error::RenderError;
