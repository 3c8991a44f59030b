use console::{style, StyledObject};

use crate::pipeline::PipelineStatus;

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_red(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Colour family used for a status, shared by terminal and HTML output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Good,
    Bad,
    Warning,
    Active,
    Waiting,
    Neutral,
}

impl StatusTone {
    pub fn of(status: &PipelineStatus) -> Self {
        match status {
            PipelineStatus::Successful | PipelineStatus::Completed => Self::Good,
            PipelineStatus::Failed | PipelineStatus::Error => Self::Bad,
            PipelineStatus::Stopped | PipelineStatus::Paused => Self::Warning,
            PipelineStatus::InProgress | PipelineStatus::Running => Self::Active,
            PipelineStatus::Pending => Self::Waiting,
            PipelineStatus::Unknown(_) => Self::Neutral,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
            Self::Warning => "warning",
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Neutral => "neutral",
        }
    }
}

pub fn status_style(status: &PipelineStatus, text: impl std::fmt::Display) -> StyledObject<String> {
    let styled = style(text.to_string()).bold();
    match StatusTone::of(status) {
        StatusTone::Good => styled.green(),
        StatusTone::Bad => styled.red(),
        StatusTone::Warning => styled.yellow(),
        StatusTone::Active => styled.blue(),
        StatusTone::Waiting => styled.cyan(),
        StatusTone::Neutral => styled.white(),
    }
}
