//! INP document engine
//!
//!     Reading is a pipeline of passes over the document's lines:
//!
//!     1. [`locate`] finds section labels and body ranges
//!     2. [`extract`] turns each body into typed records per its schema
//!     3. [`merge`] computes merged entity views on demand
//!
//!     Writing inverts the pipeline through [`render`]. The grammar itself
//!     lives in [`schema`] as static data; [`document`] ties the passes
//!     together behind the `Document` type.

pub mod describe;
pub mod document;
pub mod error;
pub mod extract;
pub mod locate;
pub mod merge;
pub mod record;
pub mod render;
pub mod schema;
pub mod support;
pub mod value;

pub use document::{Document, LoadOptions, SupportFilePolicy};
pub use error::InpError;
pub use extract::{InfiltrationKind, Recovery};
pub use record::Record;
pub use schema::SectionKind;
pub use value::{FieldType, Value};
