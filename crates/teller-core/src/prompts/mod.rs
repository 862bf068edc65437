//! Deterministic prompt construction
//!
//! Every agent prompt is `static zone + delimiter + dynamic zone`. The static
//! zone (system framing plus the operations manual) is rendered once per family
//! and is byte-identical for every agent, so the inference server can serve it
//! from its prefix cache.

mod assembler;
pub mod embedded;
mod loader;
mod manual;
pub mod normalize;
mod registry;
mod template;

pub use assembler::{FamilyPrefix, PromptAssembler, PromptInputs, RenderedPrompt, format_history};
pub use embedded::{BANK_OPS_FAMILY, ROUTER_TEMPLATE, SPECIALIST_AGENTS};
pub use loader::{PromptMetadata, load_prompt_dir, load_prompt_file, parse_prompt_file};
pub use manual::load_manual;
pub use normalize::{STATIC_ZONE_DELIMITER, TURN_BOUNDARY, normalize, prefix_hash};
pub use registry::PromptRegistry;
pub use template::{PromptField, PromptTemplate, Zone};
