//! Domain core for driving remote ComfyUI workflows.
//!
//! Everything here is pure and synchronous: parsing the introspected
//! schema, classifying inputs, holding editable values, describing the
//! seed policy, and folding job records into a display history. The
//! transport and polling live in `comfy-remote-client`.

pub mod diagnostics;
pub mod error;
pub mod heuristics;
pub mod history;
pub mod job;
pub mod schema;
pub mod seed;
pub mod store;
pub mod types;
pub mod value;
