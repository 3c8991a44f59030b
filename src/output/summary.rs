use std::fmt::Write;

use comfy_table::Cell;
use console::Term;

use super::progress::FetchSpinner;
use super::styling::{bright, bright_red, cyan, dim, status_style};
use super::tables::{create_table, cyan_header, status_cell};
use super::Renderer;
use crate::error::{MonitorError, Result};
use crate::pipeline::Pipeline;

/// Draws each snapshot as a full-screen terminal panel.
pub struct TerminalRenderer {
    term: Term,
    spinner: Option<FetchSpinner>,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            spinner: None,
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish();
        }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, pipeline: &Pipeline) -> Result<()> {
        self.stop_spinner();
        if self.term.is_term() {
            self.term.clear_screen()?;
        }
        self.term.write_line(&render_pipeline(pipeline))?;
        Ok(())
    }

    fn cycle_started(&mut self, cycle: usize) {
        if cycle == 1 {
            self.spinner = Some(FetchSpinner::start("Fetching pipeline data..."));
        }
    }

    fn cycle_failed(&mut self, cycle: usize, error: &MonitorError) {
        self.stop_spinner();
        // first-cycle failures abort the run and are reported by the caller
        if cycle > 1 {
            eprintln!("{} {error}", bright_red("Error:"));
        }
    }
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

/// Renders a snapshot as a multi-section text panel.
pub fn render_pipeline(pipeline: &Pipeline) -> String {
    let mut output = String::new();

    let started = pipeline.created_at.map_or_else(
        || "unknown".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    add_section_header(
        &mut output,
        "📦",
        &format!("{} ({})", pipeline.repository, pipeline.branch),
    );
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Pipeline:"),
        status_style(&pipeline.status, &pipeline.pipeline_definition_name),
        dim("Status:  "),
        status_style(&pipeline.status, pipeline.status_label()),
        dim("Duration:"),
        pipeline.duration_str(),
        dim("Started: "),
        dim(started),
    );

    add_section_header(&mut output, "📝", "Commit Information");
    let commit = &pipeline.commit;
    let commit_date = commit.date.map_or_else(
        || "unknown".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {}",
        dim("Commit:"),
        cyan(commit.short_hash()),
        dim("Author:"),
        commit.author,
        dim("Date:  "),
        commit_date,
        dim("Message:"),
    );
    for line in commit.message.lines() {
        let _ = writeln!(output, "    {line}");
    }
    output.push('\n');

    add_section_header(&mut output, "🔧", "Pipeline Variables");
    if pipeline.variables.is_empty() {
        let _ = writeln!(output, "  {}\n", dim("No variables"));
    } else {
        let mut variables_table = create_table();
        variables_table.set_header(cyan_header(&["Variable", "Value"]));
        for variable in &pipeline.variables {
            let value = if variable.secured {
                Cell::new(&variable.value).fg(comfy_table::Color::DarkGrey)
            } else {
                Cell::new(&variable.value)
            };
            variables_table.add_row(vec![Cell::new(&variable.key), value]);
        }
        let _ = writeln!(output, "{variables_table}\n");
    }

    add_section_header(&mut output, "🪜", "Pipeline Steps");
    if pipeline.steps.is_empty() {
        let _ = writeln!(output, "  {}", dim("No steps reported yet"));
    } else {
        let mut steps_table = create_table();
        steps_table.set_header(cyan_header(&["Step", "Status", "Duration"]));
        for step in &pipeline.steps {
            let label = match &step.result {
                Some(result) if !result.eq_ignore_ascii_case(step.status.as_str()) => {
                    format!("{} ({result})", step.status)
                }
                _ => step.status.to_string(),
            };
            steps_table.add_row(vec![
                Cell::new(&step.name),
                status_cell(&step.status, label),
                Cell::new(step.duration_str()),
            ]);
        }
        let _ = writeln!(output, "{steps_table}");
    }

    output
}
