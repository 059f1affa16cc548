//! Object key naming
//!
//! Turns an uploaded filename into the key it is stored under, using the
//! configured `upload.key_template`.

mod filename;
mod template;

use std::sync::Arc;

pub use filename::{FALLBACK_STEM, FilenameParts, MAX_STEM_CHARS};
pub use template::{KeyTemplate, TemplateContext, TemplateVar, normalize_key};

use crate::clock::{Clock, SystemClock};

/// Generates object keys from a fixed template
pub struct KeyGenerator {
    template: KeyTemplate,
    clock: Arc<dyn Clock>,
}

impl KeyGenerator {
    pub fn new(template: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            template: KeyTemplate::parse(template),
            clock,
        }
    }

    pub fn template(&self) -> &KeyTemplate {
        &self.template
    }

    /// Key for `original_filename` with `content` at the current time
    pub fn generate(&self, original_filename: &str, content: &[u8]) -> String {
        let ctx = TemplateContext::new(original_filename, self.clock.now()).with_content(content);
        self.template.render(&ctx, &mut rand::thread_rng())
    }
}

/// Expand `template` for `original_filename` using the wall clock
pub fn generate(original_filename: &str, template: &str) -> String {
    KeyGenerator::new(template, Arc::new(SystemClock)).generate(original_filename, &[])
}
