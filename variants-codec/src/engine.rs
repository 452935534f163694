//! Tera rendering engine for manifests and version-file stubs.
//!
//! # Templates
//!
//! | Name              | Output                                     |
//! |-------------------|--------------------------------------------|
//! | `manifest.ts.tera`| `<Unit>.manifest.ts`                       |
//! | `stub_jsx.tera`   | new `<Unit>.v<N>.tsx` / `.jsx` version file |
//! | `stub_plain.tera` | new `<Unit>.v<N>.ts` / `.js` version file   |
//!
//! A user template directory may override the two stub templates by file
//! name. The manifest template is fixed so that parse and render stay inverse.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use variants_core::Extension;

use crate::context::{to_tera_context, ManifestContext, StubContext};
use crate::error::CodecError;

// ---------------------------------------------------------------------------
// Embedded templates — baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

pub const MANIFEST_TEMPLATE: &str = "manifest.ts.tera";
pub const STUB_JSX_TEMPLATE: &str = "stub_jsx.tera";
pub const STUB_PLAIN_TEMPLATE: &str = "stub_plain.tera";

const OVERRIDABLE: &[&str] = &[STUB_JSX_TEMPLATE, STUB_PLAIN_TEMPLATE];

const TPLS: &[(&str, &str)] = &[
    (MANIFEST_TEMPLATE, include_str!("templates/manifest.ts.tera")),
    (STUB_JSX_TEMPLATE, include_str!("templates/stub_jsx.tera")),
    (STUB_PLAIN_TEMPLATE, include_str!("templates/stub_plain.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CodecError {
    CodecError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, CodecError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, CodecError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert((*name).to_string(), (*content).to_string());
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            if !OVERRIDABLE.contains(&name.as_str()) {
                tracing::warn!(template = %name, dir = %dir.display(), "ignoring template that cannot be overridden");
                continue;
            }
            tracing::debug!(template = %name, dir = %dir.display(), "using user template override");
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

fn normalize_line_endings(content: String) -> String {
    if content.contains('\r') {
        content.replace("\r\n", "\n")
    } else {
        content
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine with embedded templates and optional user overrides.
///
/// Create once and reuse; rendering is pure and deterministic for identical
/// contexts.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Construct a new [`TemplateEngine`], loading embedded templates plus any
    /// stub-template overrides found directly in `user_template_dir`.
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, CodecError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Engine with embedded templates only.
    pub fn embedded() -> Result<Self, CodecError> {
        Self::new(None)
    }

    pub fn render_manifest(&self, ctx: &ManifestContext) -> Result<String, CodecError> {
        let content = self.tera.render(MANIFEST_TEMPLATE, &to_tera_context(ctx)?)?;
        Ok(normalize_line_endings(content))
    }

    /// Render the initial content of a new version file.
    pub fn render_stub(&self, ctx: &StubContext, extension: Extension) -> Result<String, CodecError> {
        let name = if extension.supports_jsx() {
            STUB_JSX_TEMPLATE
        } else {
            STUB_PLAIN_TEMPLATE
        };
        let content = self.tera.render(name, &to_tera_context(ctx)?)?;
        Ok(normalize_line_endings(content))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
