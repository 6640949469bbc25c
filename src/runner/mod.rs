//! Background step runner.
//!
//! Walks an ordered list of reference images: for each one, polls the screen
//! until the image is found with enough confidence (then clicks its center)
//! or the per-step timeout expires. Failures are logged and the sequence
//! continues; nothing is retried beyond the timeout polling itself.

pub mod matching;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use image::RgbaImage;
use xcap::Monitor;

/// Progress reporting from the runner thread to the GUI.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    Log(String),
    StepFinished { index: usize, outcome: StepOutcome },
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// The reference image was found and its center was clicked.
    Clicked { x: i32, y: i32 },
    /// The confidence threshold was never reached within the timeout.
    NotFound,
    /// The step could not run (unreadable reference image, click error).
    Failed,
    /// A force stop interrupted the step.
    Stopped,
}

/// How clicks are delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickBackend {
    Desktop,
    /// Placeholder for driving an Android device; every click errors.
    Adb,
}

#[derive(Clone, Copy, Debug)]
pub struct RunnerOptions {
    /// Minimum NCC score to accept a match.
    pub confidence: f32,
    pub step_timeout: Duration,
    pub poll_interval: Duration,
    pub backend: ClickBackend,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            confidence: 0.9,
            step_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            backend: ClickBackend::Desktop,
        }
    }
}

pub struct Runner;

impl Runner {
    /// Run the step list on a worker thread. Returns the event channel and a
    /// stop flag checked between polls.
    pub fn run_async_with_stop(
        steps: Vec<String>,
        options: RunnerOptions,
    ) -> (Receiver<RunnerEvent>, Arc<AtomicBool>) {
        let (tx, rx) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        thread::spawn(move || {
            Self::run_steps(&steps, &options, &stop_clone, &tx, capture_frame);
            let _ = tx.send(RunnerEvent::Finished);
        });

        (rx, stop)
    }

    fn run_steps<F>(
        steps: &[String],
        options: &RunnerOptions,
        stop: &AtomicBool,
        tx: &Sender<RunnerEvent>,
        mut capture: F,
    ) where
        F: FnMut() -> Result<RgbaImage>,
    {
        let log = |msg: String| {
            let _ = tx.send(RunnerEvent::Log(msg));
        };

        for (index, path) in steps.iter().enumerate() {
            if stop.load(Ordering::Relaxed) {
                log("force stop requested".into());
                break;
            }
            log(format!(
                "step {}/{}: looking for {}",
                index + 1,
                steps.len(),
                path
            ));
            let outcome = Self::run_step(path, options, stop, &log, &mut capture);
            let _ = tx.send(RunnerEvent::StepFinished { index, outcome });
            if outcome == StepOutcome::Stopped {
                break;
            }
        }
    }

    /// One step: poll capture-and-match until found, stopped, or timed out.
    fn run_step<F>(
        path: &str,
        options: &RunnerOptions,
        stop: &AtomicBool,
        log: &dyn Fn(String),
        capture: &mut F,
    ) -> StepOutcome
    where
        F: FnMut() -> Result<RgbaImage>,
    {
        let template = match image::open(path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log(format!("cannot read reference image {path}: {e}"));
                return StepOutcome::Failed;
            }
        };

        let deadline = Instant::now() + options.step_timeout;
        loop {
            if stop.load(Ordering::Relaxed) {
                log("force stop requested".into());
                return StepOutcome::Stopped;
            }

            match capture() {
                Ok(frame) => {
                    if let Some(m) = matching::locate_template(&frame, &template) {
                        log(format!("best match score {:.3}", m.score));
                        if m.score >= options.confidence {
                            let (x, y) = (m.center.0 as i32, m.center.1 as i32);
                            return match click_at(options.backend, x, y) {
                                Ok(()) => {
                                    log(format!("clicked {path} at ({x}, {y})"));
                                    StepOutcome::Clicked { x, y }
                                }
                                Err(e) => {
                                    log(format!("click failed: {e:#}"));
                                    StepOutcome::Failed
                                }
                            };
                        }
                    }
                }
                Err(e) => log(format!("screen capture error: {e:#}")),
            }

            if Instant::now() >= deadline {
                log(format!("not found: {path}"));
                return StepOutcome::NotFound;
            }
            thread::sleep(options.poll_interval);
        }
    }
}

/// Capture the primary monitor as an RGBA image.
fn capture_frame() -> Result<RgbaImage> {
    let monitors = Monitor::all().context("enumerating monitors")?;
    let monitor = monitors
        .into_iter()
        .next()
        .context("no monitor available")?;
    monitor.capture_image().context("capturing screen")
}

fn click_at(backend: ClickBackend, x: i32, y: i32) -> Result<()> {
    match backend {
        ClickBackend::Desktop => {
            let mut enigo =
                Enigo::new(&Settings::default()).context("initializing input backend")?;
            enigo
                .move_mouse(x, y, Coordinate::Abs)
                .context("moving pointer")?;
            enigo
                .button(Button::Left, Direction::Click)
                .context("clicking")?;
            Ok(())
        }
        ClickBackend::Adb => anyhow::bail!("ADB mode is not supported"),
    }
}
