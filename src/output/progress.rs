use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::bright_yellow;

/// Spinner shown on stderr while the first snapshot is being fetched.
pub struct FetchSpinner {
    pb: ProgressBar,
}

impl FetchSpinner {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_draw_target(ProgressDrawTarget::stderr());
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(bright_yellow(message).to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(self) {
        self.pb.finish_and_clear();
    }
}
