//! Tera rendering engine and the HTML [`ArtifactGenerator`].
//!
//! # Output mapping
//!
//! | Record                  | Artifact                          |
//! |-------------------------|-----------------------------------|
//! | `<work_dir>/alice.json` | `<artifact_dir>/alice.html`       |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tera::Tera;

use reportsync_core::{ArtifactGenerator, BoxError, LocalRecord};

use crate::context::ReportContext;
use crate::error::{io_err, RenderError};

/// Name of the report template; a file with this name in the user template
/// directory replaces the embedded one.
pub const REPORT_TEMPLATE: &str = "report.html.tera";

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[(REPORT_TEMPLATE, include_str!("templates/report.html.tera"))];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((normalize_template_name(rel), contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            tracing::debug!(template = %name, dir = %dir.display(), "user template override");
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    // Record values are untrusted; escape them in every HTML template.
    tera.autoescape_on(vec![".html.tera", ".html"]);
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine with embedded templates and optional user overrides.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    pub fn render(&self, ctx: &ReportContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let rendered = self.tera.render(REPORT_TEMPLATE, &tera_ctx)?;
        Ok(rendered.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// HtmlReportGenerator
// ---------------------------------------------------------------------------

/// Renders each record into `<artifact_dir>/<stem>.html`.
pub struct HtmlReportGenerator {
    engine: TemplateEngine,
    artifact_dir: PathBuf,
}

impl HtmlReportGenerator {
    pub fn new(artifact_dir: &Path, template_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(HtmlReportGenerator {
            engine: TemplateEngine::new(template_dir)?,
            artifact_dir: artifact_dir.to_path_buf(),
        })
    }

    pub fn artifact_path(&self, record: &LocalRecord) -> Result<PathBuf, RenderError> {
        let stem = record
            .path
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RenderError::NoStem {
                path: record.path.clone(),
            })?;
        let mut file = stem.to_os_string();
        file.push(".html");
        Ok(self.artifact_dir.join(file))
    }

    /// Render and write the artifact: `.tmp` sibling, then rename.
    pub fn render_to_file(&self, record: &LocalRecord) -> Result<PathBuf, RenderError> {
        let path = self.artifact_path(record)?;
        let ctx = ReportContext::from_record(record, Utc::now());
        let content = self.engine.render(&ctx)?;

        std::fs::create_dir_all(&self.artifact_dir).map_err(|e| io_err(&self.artifact_dir, e))?;
        let tmp = PathBuf::from(format!("{}.tmp", path.display()));
        std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }
        tracing::info!(record = %ctx.name, artifact = %path.display(), "rendered report");
        Ok(path)
    }
}

impl ArtifactGenerator for HtmlReportGenerator {
    fn generate(&self, record: &LocalRecord) -> Result<PathBuf, BoxError> {
        Ok(self.render_to_file(record)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
