// src/render/mod.rs
pub mod format;
pub mod html;
pub mod template;

pub use format::{format_value, PLACEHOLDER};
pub use html::{render_breakdown, render_page, render_statement, Drilldown};
pub use template::{RowTemplate, TemplateRow};
