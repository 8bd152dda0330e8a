//! Interactive viewer: select prompts for city and parameter, screen redraws on every change.

use std::{
    fmt,
    io::{self, Write},
};

use anyhow::Context;
use crossterm::{
    cursor::MoveTo,
    execute,
    style::Stylize,
    terminal::{Clear, ClearType},
};
use inquire::{InquireError, Select};
use tokio::sync::watch;
use weather_history_core::{
    City, FetchOrchestrator, FetchStatus, HistoryProvider, Line, Parameter, Selection, render,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ChangeCity,
    ChangeParameter,
    Refresh,
    Quit,
}

impl Action {
    const fn all() -> &'static [Action] {
        &[Action::ChangeCity, Action::ChangeParameter, Action::Refresh, Action::Quit]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::ChangeCity => "Change city",
            Action::ChangeParameter => "Change parameter",
            Action::Refresh => "Refresh",
            Action::Quit => "Quit",
        })
    }
}

pub async fn run<P: HistoryProvider + 'static>(
    mut orchestrator: FetchOrchestrator<P>,
    mut selection: Selection,
) -> anyhow::Result<()> {
    let mut status = orchestrator.subscribe();

    orchestrator.start_cycle(selection.city);
    wait_for_cycle(&selection, &mut status).await?;

    loop {
        let current = status.borrow_and_update().clone();
        draw(&selection, &current)?;

        let Some(action) = choose("What next?", Action::all(), Action::ChangeCity).await? else {
            break;
        };

        let choice = match action {
            Action::ChangeCity => {
                choose("City:", City::all(), selection.city).await?.map(Choice::City)
            }
            Action::ChangeParameter => choose("Parameter:", Parameter::all(), selection.parameter)
                .await?
                .map(Choice::Parameter),
            Action::Refresh => Some(Choice::Refresh),
            Action::Quit => break,
        };

        if choice.is_some_and(|choice| apply(&mut selection, choice)) {
            orchestrator.start_cycle(selection.city);
            wait_for_cycle(&selection, &mut status).await?;
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    City(City),
    Parameter(Parameter),
    /// Fetch the selected city again, e.g. after a failed cycle.
    Refresh,
}

/// Update `selection`. Returns `true` when a new fetch cycle must start.
///
/// A parameter change is redrawn from the current snapshot; reselecting the same city is a no-op.
fn apply(selection: &mut Selection, choice: Choice) -> bool {
    match choice {
        Choice::City(city) if city == selection.city => false,
        Choice::City(city) => {
            selection.city = city;
            true
        }
        Choice::Parameter(parameter) => {
            selection.parameter = parameter;
            false
        }
        Choice::Refresh => true,
    }
}

/// Show the loading screen until the current cycle finishes.
///
/// Ctrl-C stops waiting and returns to the menu; the cycle keeps running.
async fn wait_for_cycle(
    selection: &Selection,
    status: &mut watch::Receiver<FetchStatus>,
) -> anyhow::Result<()> {
    let current = status.borrow_and_update().clone();
    draw(selection, &current)?;
    let cycle = current.cycle();

    tokio::select! {
        done = status.wait_for(FetchStatus::is_terminal) => {
            done.context("Fetch orchestrator stopped unexpectedly")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!(city = %selection.city, ?cycle, "stopped waiting for fetch cycle");
        }
    }

    Ok(())
}

/// Single-choice prompt. `None` when the user cancels with Esc or Ctrl-C.
async fn choose<T>(
    message: &'static str,
    options: &'static [T],
    current: T,
) -> anyhow::Result<Option<T>>
where
    T: Copy + PartialEq + fmt::Display + Send + Sync + 'static,
{
    let start = options.iter().position(|o| *o == current).unwrap_or(0);

    let answer = tokio::task::spawn_blocking(move || {
        Select::new(message, options.to_vec()).with_starting_cursor(start).prompt()
    })
    .await
    .context("Prompt task failed")?;

    match answer {
        Ok(choice) => Ok(Some(choice)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("Failed to read selection"),
    }
}

fn draw(selection: &Selection, status: &FetchStatus) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)).context("Failed to clear terminal")?;
    write_lines(&mut stdout, &render(selection, status)).context("Failed to write to terminal")?;
    stdout.flush().context("Failed to flush terminal")
}

fn write_lines<W: Write>(out: &mut W, lines: &[Line]) -> io::Result<()> {
    for line in lines {
        match line {
            Line::Heading(text) => writeln!(out, "{}\n", text.as_str().bold())?,
            Line::Plain(text) => writeln!(out, "{text}")?,
            Line::Attention(text) => writeln!(out, "{}", text.as_str().red())?,
        }
    }
    Ok(())
}
