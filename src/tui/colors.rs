//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::Status;

// Board columns are branded by status, matching the web client's palette.

/// Used for Pending
pub const SLATE: Color = Color::Rgb(100, 116, 139);
/// Used for On hold
pub const DARK_RED: Color = Color::Rgb(185, 28, 28);
/// Used for In progress
pub const BLUE: Color = Color::Rgb(37, 99, 235);
/// Used for Under review
pub const AMBER: Color = Color::Rgb(245, 158, 11);
/// Used for Completed
pub const DARK_GREEN: Color = Color::Rgb(21, 128, 61);

pub fn status_color(status: Status) -> Color {
    match status {
        Status::Pending => SLATE,
        Status::OnHold => DARK_RED,
        Status::InProgress => BLUE,
        Status::UnderReview => AMBER,
        Status::Completed => DARK_GREEN,
    }
}

/// Readable foreground on top of a status color.
pub fn text_on(status: Status) -> Color {
    match status {
        Status::UnderReview => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}
