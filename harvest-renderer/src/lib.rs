//! # harvest-renderer
//!
//! Tera-based rendering of the templated fields carried into every record.
//!
//! Output depends only on the locator and the config, so rendering the same
//! document twice yields byte-identical [`DerivedFields`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use harvest_core::HarvestConfig;
//! use harvest_renderer::{FieldsContext, Renderer};
//!
//! fn render_one(locator: &str, config: &HarvestConfig) {
//!     if let Ok(renderer) = Renderer::new() {
//!         let ctx = FieldsContext::new(locator, config);
//!         if let Ok(fields) = renderer.render(&ctx) {
//!             println!("{}: {} bytes", fields.title, fields.content.len());
//!         }
//!     }
//! }
//! ```
//!
//! [`DerivedFields`]: harvest_core::DerivedFields

pub mod context;
pub mod engine;
pub mod error;
pub mod slug;

pub use context::FieldsContext;
pub use engine::Renderer;
pub use error::RenderError;
pub use slug::title_from_slug;
