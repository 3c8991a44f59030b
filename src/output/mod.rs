mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

use std::path::PathBuf;

use crate::config::OutputFormat;
use crate::error::{MonitorError, Result};
use crate::pipeline::Pipeline;

pub use exports::ExportRenderer;
pub use styling::status_style;
use styling::{dim, magenta_bold};
pub use summary::TerminalRenderer;

/// Consumer of pipeline snapshots produced by the refresh engine.
///
/// `render` is called once per successful cycle. The hooks default to no-ops.
pub trait Renderer {
    fn render(&mut self, pipeline: &Pipeline) -> Result<()>;

    fn cycle_started(&mut self, _cycle: usize) {}

    fn cycle_failed(&mut self, _cycle: usize, _error: &MonitorError) {}
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, pipeline: &Pipeline) -> Result<()> {
        (**self).render(pipeline)
    }

    fn cycle_started(&mut self, cycle: usize) {
        (**self).cycle_started(cycle);
    }

    fn cycle_failed(&mut self, cycle: usize, error: &MonitorError) {
        (**self).cycle_failed(cycle, error);
    }
}

/// Picks the renderer for an output format. `Summary` always draws to the
/// terminal; the other formats go to `destination` or stdout.
pub fn renderer_for(
    format: OutputFormat,
    pretty: bool,
    destination: Option<PathBuf>,
) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Summary => Box::new(TerminalRenderer::new()),
        OutputFormat::Json | OutputFormat::Html => {
            Box::new(ExportRenderer::new(format, pretty, destination))
        }
    }
}

/// Prints the `pipewatch` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔭 pipewatch"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Bitbucket Pipeline Monitor")
    );
}
