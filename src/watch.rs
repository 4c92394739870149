//! Watch mode: re-run a command on a fixed interval until Ctrl+C.

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Sleep granularity while waiting for the next refresh
const TICK: Duration = Duration::from_millis(100);

/// Compose one frame: the command output followed by a status line.
///
/// A failed iteration shows its error in place of the output.
#[must_use]
pub fn frame(output: Result<String>, timestamp: &str, interval: Duration) -> String {
    let body = match output {
        Ok(body) => body,
        Err(e) => format!("Error: {e:#}\n"),
    };
    format!(
        "{}\nLast updated: {} | Refreshing every {}s | Press Ctrl+C to exit\n",
        body,
        timestamp,
        interval.as_secs()
    )
}

/// Sleep for `interval`, waking early once `running` is cleared.
fn wait(running: &AtomicBool, interval: Duration) {
    let deadline = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(TICK.min(deadline - now));
    }
}

/// Repeatedly run `command` and show its output.
///
/// With `clear` each frame replaces the previous one on the alternate screen;
/// otherwise frames are printed one after another.
pub fn watch_loop<F>(interval: Duration, clear: bool, mut command: F) -> Result<()>
where
    F: FnMut() -> Result<String>,
{
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let mut stdout = io::stdout();
    if clear {
        execute!(stdout, EnterAlternateScreen, Hide)?;
    }

    let result = (|| -> Result<()> {
        while running.load(Ordering::SeqCst) {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            let screen_content = frame(command(), &timestamp, interval);

            if clear {
                // Synchronized update so the terminal only renders whole frames
                write!(stdout, "\x1B[?2026h")?;
                write!(stdout, "\x1B[H{}\x1B[J", screen_content)?;
                write!(stdout, "\x1B[?2026l")?;
            } else {
                writeln!(stdout, "{}", screen_content)?;
            }
            stdout.flush()?;

            wait(&running, interval);
        }
        Ok(())
    })();

    if clear {
        execute!(stdout, Show, LeaveAlternateScreen)?;
    }
    println!("Watch mode stopped.");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shows_output_and_status() {
        let screen = frame(
            Ok("JobID\n    1\n".into()),
            "2024-01-01 00:00:00",
            Duration::from_secs(10),
        );
        assert!(screen.starts_with("JobID\n    1\n"));
        assert!(screen.contains("Last updated: 2024-01-01 00:00:00"));
        assert!(screen.contains("Refreshing every 10s"));
    }

    #[test]
    fn test_frame_shows_error_in_place_of_output() {
        let screen = frame(
            Err(anyhow::anyhow!("sacct unresponsive")),
            "2024-01-01 00:00:00",
            Duration::from_secs(5),
        );
        assert!(screen.starts_with("Error: sacct unresponsive"));
        assert!(screen.contains("Refreshing every 5s"));
    }

    #[test]
    fn test_wait_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        let started = Instant::now();
        wait(&running, Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_sleeps_for_interval() {
        let running = AtomicBool::new(true);
        let started = Instant::now();
        wait(&running, Duration::from_millis(150));
        assert!(started.elapsed() >= Duration::from_millis(150));
    }
}
