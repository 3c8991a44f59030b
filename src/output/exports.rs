use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use log::info;

use super::styling::StatusTone;
use super::Renderer;
use crate::config::OutputFormat;
use crate::error::Result;
use crate::pipeline::Pipeline;

/// Writes snapshots as JSON or HTML, either to stdout or to a file that is
/// rewritten on every cycle.
pub struct ExportRenderer {
    format: OutputFormat,
    pretty: bool,
    destination: Option<PathBuf>,
}

impl ExportRenderer {
    pub fn new(format: OutputFormat, pretty: bool, destination: Option<PathBuf>) -> Self {
        Self {
            format,
            pretty,
            destination,
        }
    }
}

impl Renderer for ExportRenderer {
    fn render(&mut self, pipeline: &Pipeline) -> Result<()> {
        match &self.destination {
            Some(path) => {
                let mut writer = BufWriter::new(File::create(path)?);
                export_pipeline(pipeline, self.format, self.pretty, &mut writer)?;
                writer.flush()?;
                info!("Snapshot written to: {}", path.display());
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                export_pipeline(pipeline, self.format, self.pretty, &mut handle)?;
                handle.flush()?;
            }
        }
        Ok(())
    }
}

/// Exports a snapshot in a machine-readable or shareable format.
///
/// Summary output is drawn by the terminal renderer instead; asking for it
/// here falls back to JSON.
pub fn export_pipeline(
    pipeline: &Pipeline,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Html => export_html(pipeline, output),
        OutputFormat::Json | OutputFormat::Summary => export_json(pipeline, pretty, output),
    }
}

fn export_json(pipeline: &Pipeline, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let map = pipeline.to_display_map()?;
    let json = if pretty {
        serde_json::to_string_pretty(&map)?
    } else {
        serde_json::to_string(&map)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn export_html(pipeline: &Pipeline, output: &mut dyn Write) -> Result<()> {
    let title = escape_html(&format!("{} ({})", pipeline.repository, pipeline.branch));
    let status_class = StatusTone::of(&pipeline.status).css_class();
    let started = pipeline
        .created_at
        .map_or_else(|| "unknown".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    writeln!(output, "<!DOCTYPE html>")?;
    writeln!(output, "<html lang=\"en\">")?;
    writeln!(output, "<head>")?;
    writeln!(output, "    <meta charset=\"UTF-8\">")?;
    writeln!(output, "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(output, "    <title>Pipeline {title}</title>")?;
    writeln!(output, "    <style>")?;
    writeln!(output, "        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; background: #f5f5f5; }}")?;
    writeln!(output, "        .container {{ max-width: 1000px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}")?;
    writeln!(output, "        h1 {{ color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; }}")?;
    writeln!(output, "        h2 {{ color: #34495e; margin-top: 30px; }}")?;
    writeln!(output, "        .summary {{ background: #ecf0f1; padding: 20px; border-radius: 5px; margin: 20px 0; }}")?;
    writeln!(output, "        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}")?;
    writeln!(output, "        th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }}")?;
    writeln!(output, "        th {{ background: #3498db; color: white; }}")?;
    writeln!(output, "        .good {{ color: #27ae60; }}")?;
    writeln!(output, "        .bad {{ color: #e74c3c; }}")?;
    writeln!(output, "        .warning {{ color: #f39c12; }}")?;
    writeln!(output, "        .active {{ color: #2980b9; }}")?;
    writeln!(output, "        .waiting {{ color: #16a085; }}")?;
    writeln!(output, "        .secured {{ color: #95a5a6; font-family: monospace; }}")?;
    writeln!(output, "    </style>")?;
    writeln!(output, "</head>")?;
    writeln!(output, "<body>")?;
    writeln!(output, "    <div class=\"container\">")?;
    writeln!(output, "        <h1>{title}</h1>")?;
    writeln!(output, "        <div class=\"summary\">")?;
    writeln!(output, "            <p><strong>Pipeline:</strong> {}</p>", escape_html(&pipeline.pipeline_definition_name))?;
    writeln!(output, "            <p><strong>Status:</strong> <span class=\"{status_class}\">{}</span></p>", escape_html(&pipeline.status_label()))?;
    writeln!(output, "            <p><strong>Duration:</strong> {}</p>", pipeline.duration_str())?;
    writeln!(output, "            <p><strong>Started:</strong> {started}</p>")?;
    writeln!(output, "        </div>")?;

    let commit = &pipeline.commit;
    writeln!(output, "        <h2>Commit</h2>")?;
    writeln!(output, "        <p><strong>{}</strong> by {}</p>", escape_html(commit.short_hash()), escape_html(&commit.author))?;
    writeln!(output, "        <pre>{}</pre>", escape_html(&commit.message))?;

    writeln!(output, "        <h2>Variables</h2>")?;
    writeln!(output, "        <table>")?;
    writeln!(output, "            <thead><tr><th>Variable</th><th>Value</th></tr></thead>")?;
    writeln!(output, "            <tbody>")?;
    for variable in &pipeline.variables {
        let class = if variable.secured { " class=\"secured\"" } else { "" };
        writeln!(
            output,
            "                <tr><td>{}</td><td{class}>{}</td></tr>",
            escape_html(&variable.key),
            escape_html(&variable.value)
        )?;
    }
    writeln!(output, "            </tbody>")?;
    writeln!(output, "        </table>")?;

    writeln!(output, "        <h2>Steps</h2>")?;
    writeln!(output, "        <table>")?;
    writeln!(output, "            <thead><tr><th>Step</th><th>Status</th><th>Duration</th></tr></thead>")?;
    writeln!(output, "            <tbody>")?;
    for step in &pipeline.steps {
        writeln!(
            output,
            "                <tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td></tr>",
            escape_html(&step.name),
            StatusTone::of(&step.status).css_class(),
            escape_html(step.status.as_str()),
            step.duration_str()
        )?;
    }
    writeln!(output, "            </tbody>")?;
    writeln!(output, "        </table>")?;

    writeln!(output, "        <footer style=\"margin-top: 40px; padding-top: 20px; border-top: 1px solid #ddd; color: #666; text-align: center;\">")?;
    writeln!(output, "            <p>Generated by pipewatch v{} on {}</p>", env!("CARGO_PKG_VERSION"), chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"))?;
    writeln!(output, "        </footer>")?;
    writeln!(output, "    </div>")?;
    writeln!(output, "</body>")?;
    writeln!(output, "</html>")?;

    Ok(())
}
