mod canvas;
mod config;
mod runner;
mod scene;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::Context;
use canvas::CanvasEditor;
use chrono::Local;
use eframe::egui;
use runner::{ClickBackend, Runner, RunnerEvent, RunnerOptions, StepOutcome};
use scene::Scene;
use serde::{Deserialize, Serialize};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    config::ensure_directories()?;
    config::ensure_step_file(Path::new(config::STEP_FILE))?;
    // A malformed step file is a startup error, not something to paper over.
    let step_config = config::load_step_config(Path::new(config::STEP_FILE))?;
    let steps = config::derive_step_list(&step_config);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 750.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Clickboard",
        native_options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(ClickboardApp::new(steps)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}

#[derive(Serialize, Deserialize, Clone, Copy)]
struct AppSettings {
    confidence: f32,
    step_timeout_secs: u64,
    poll_interval_ms: u64,
    adb_mode: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            confidence: 0.9,
            step_timeout_secs: 10,
            poll_interval_ms: 1000,
            adb_mode: false,
        }
    }
}

struct ClickboardApp {
    scene: Scene,
    editor: CanvasEditor,
    /// Derived step list, shown in the side panel.
    steps: Vec<String>,
    logs: Vec<String>,
    settings: AppSettings,
    log_receiver: Option<Receiver<RunnerEvent>>,
    stop_handle: Option<Arc<AtomicBool>>,
}

impl ClickboardApp {
    fn new(steps: Vec<String>) -> Self {
        let mut app = Self {
            scene: Scene::default(),
            editor: CanvasEditor::default(),
            steps,
            logs: Vec::new(),
            settings: AppSettings::default(),
            log_receiver: None,
            stop_handle: None,
        };
        app.load_settings();
        app
    }

    fn load_settings(&mut self) {
        if let Ok(json) = std::fs::read_to_string("settings.json") {
            if let Ok(settings) = serde_json::from_str::<AppSettings>(&json) {
                self.settings = settings;
                self.logs.push("[System] Settings loaded.".to_string());
            }
        }
    }

    fn save_settings(&self) {
        if let Ok(json) = serde_json::to_string_pretty(&self.settings) {
            let _ = std::fs::write("settings.json", json);
        }
    }

    fn running(&self) -> bool {
        self.log_receiver.is_some()
    }

    /// Re-derive the step list from the step file on disk.
    fn reload_steps(&mut self) -> anyhow::Result<()> {
        let step_config = config::load_step_config(Path::new(config::STEP_FILE))
            .with_context(|| format!("reloading {}", config::STEP_FILE))?;
        self.steps = config::derive_step_list(&step_config);
        Ok(())
    }

    fn start_run(&mut self, ctx: &egui::Context) {
        if let Err(e) = self.reload_steps() {
            self.logs.push(format!("[Config] {e:#}"));
            return;
        }
        if self.steps.is_empty() {
            self.logs
                .push("[System] No steps configured, nothing to run.".to_string());
            return;
        }

        let backend = if self.settings.adb_mode {
            ClickBackend::Adb
        } else {
            ClickBackend::Desktop
        };
        let options = RunnerOptions {
            confidence: self.settings.confidence,
            step_timeout: Duration::from_secs(self.settings.step_timeout_secs),
            poll_interval: Duration::from_millis(self.settings.poll_interval_ms),
            backend,
        };

        // Get the window out of the way of the matching.
        ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));

        let (rx, stop_handle) = Runner::run_async_with_stop(self.steps.clone(), options);
        self.log_receiver = Some(rx);
        self.stop_handle = Some(stop_handle);
        self.logs
            .push(format!("[Runner] Started with {} step(s).", self.steps.len()));
    }

    /// Drain runner events and detect completion.
    fn drain_runner_events(&mut self) {
        let Some(rx) = &self.log_receiver else {
            return;
        };
        let mut channel_closed = false;
        let mut new_logs = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    let time_str = Local::now().format("%H:%M:%S").to_string();
                    match event {
                        RunnerEvent::Log(msg) => {
                            new_logs.push(format!("[{time_str}] {msg}"));
                        }
                        RunnerEvent::StepFinished { index, outcome } => {
                            let msg = match outcome {
                                StepOutcome::Clicked { x, y } => {
                                    format!("Step {}: clicked at ({x}, {y})", index + 1)
                                }
                                StepOutcome::NotFound => {
                                    format!("Step {}: not found", index + 1)
                                }
                                StepOutcome::Failed => format!("Step {}: failed", index + 1),
                                StepOutcome::Stopped => format!("Step {}: stopped", index + 1),
                            };
                            new_logs.push(format!("[{time_str}] {msg}"));
                        }
                        RunnerEvent::Finished => {
                            new_logs.push(format!("[{time_str}] Sequence finished."));
                        }
                    }
                }
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    channel_closed = true;
                    break;
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => break,
            }
        }
        self.logs.append(&mut new_logs);
        if channel_closed {
            self.log_receiver = None;
            self.stop_handle = None;
        }
    }
}

impl eframe::App for ClickboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Keep draining runner logs while a run is active.
        if self.running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
        self.drain_runner_events();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Clickboard");
                ui.separator();

                let start = ui.add_enabled(!self.running(), egui::Button::new("▶ Start"));
                if start.clicked() {
                    self.start_run(ctx);
                }
                if self.stop_handle.is_some() {
                    if ui
                        .button(egui::RichText::new("⏹ Stop").color(egui::Color32::RED))
                        .clicked()
                    {
                        if let Some(handle) = &self.stop_handle {
                            handle.store(true, Ordering::Relaxed);
                            self.logs.push("[System] Force stop requested.".to_string());
                        }
                        self.stop_handle = None;
                    }
                }
                ui.separator();

                let mut changed = false;
                changed |= ui
                    .checkbox(&mut self.settings.adb_mode, "ADB mode")
                    .on_hover_text(
                        "Drive an Android device instead of the desktop (not supported yet)",
                    )
                    .changed();

                ui.label("Confidence:");
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut self.settings.confidence)
                            .range(0.5..=1.0)
                            .speed(0.01),
                    )
                    .changed();
                ui.label("Timeout (s):");
                changed |= ui
                    .add(egui::DragValue::new(&mut self.settings.step_timeout_secs).range(1..=300))
                    .changed();
                ui.label("Poll (ms):");
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut self.settings.poll_interval_ms)
                            .range(50..=10_000),
                    )
                    .changed();
                if changed {
                    self.save_settings();
                }
            });
        });

        egui::SidePanel::right("steps_panel")
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Steps");
                    if ui.button("⟳").on_hover_text("Reload steps.json").clicked() {
                        match self.reload_steps() {
                            Ok(()) => self
                                .logs
                                .push(format!("[System] {} reloaded.", config::STEP_FILE)),
                            Err(e) => self.logs.push(format!("[Config] {e:#}")),
                        }
                    }
                });
                ui.separator();
                if self.steps.is_empty() {
                    ui.label(format!("No Step[n] keys in {}", config::STEP_FILE));
                }
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for (i, path) in self.steps.iter().enumerate() {
                        ui.horizontal(|ui| {
                            ui.label(format!("{}.", i + 1));
                            ui.add(
                                egui::Image::from_uri(format!("file://{path}"))
                                    .max_height(40.0)
                                    .max_width(80.0),
                            );
                            ui.label(path);
                        });
                    }
                });
            });

        egui::TopBottomPanel::bottom("status_panel")
            .resizable(true)
            .default_height(140.0)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(&self.editor.status).strong());
                ui.separator();
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.logs {
                            ui.label(line);
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.editor.show(ui, &mut self.scene);
        });
    }
}
