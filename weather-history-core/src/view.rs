//! Turns the current selection and fetch status into screen lines.
//!
//! Rendering reads only the in-memory snapshot, so changing the parameter never
//! touches the network.

use crate::model::{FetchStatus, Selection, WeatherSnapshot};

pub const LOADING_TEXT: &str = "Loading data...";
pub const EMPTY_TEXT: &str = "No data available.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Heading(String),
    Plain(String),
    /// Shown in the attention color.
    Attention(String),
}

impl Line {
    pub fn text(&self) -> &str {
        match self {
            Line::Heading(s) | Line::Plain(s) | Line::Attention(s) => s,
        }
    }
}

/// Render one screen.
///
/// Any failure in a cycle shows only the error message; the partial snapshot is not listed.
/// A result for a city other than the selected one counts as still loading.
pub fn render(selection: &Selection, status: &FetchStatus) -> Vec<Line> {
    let mut lines = vec![Line::Heading(format!("Weather in {}", selection.city))];

    match status {
        FetchStatus::Ready { snapshot, .. } if snapshot.city() == selection.city => {
            render_snapshot(selection, snapshot, &mut lines)
        }
        FetchStatus::Error { message, city, .. } if *city == selection.city => {
            lines.push(Line::Attention(message.clone()))
        }
        _ => lines.push(Line::Plain(LOADING_TEXT.to_string())),
    }

    lines
}

fn render_snapshot(selection: &Selection, snapshot: &WeatherSnapshot, lines: &mut Vec<Line>) {
    if snapshot.is_empty() {
        lines.push(Line::Plain(EMPTY_TEXT.to_string()));
        return;
    }

    let parameter = selection.parameter;
    for (date, day) in snapshot.iter_sorted() {
        lines.push(Line::Plain(format!("Date: {}", date.format("%Y-%m-%d"))));
        lines.push(Line::Plain(format!("Condition: {}", day.condition)));
        lines.push(Line::Plain(format!("{}: {}", parameter.label(), parameter.format_value(day))));
        lines.push(Line::Plain(String::new()));
    }
}
