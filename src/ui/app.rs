use eframe::{Frame, egui};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::chart::ConfigError;
use crate::ui::chart_card::{CardOutput, CardState, show_chart_card};
use crate::ui::config::{UI_CONFIG, UI_TEXT};
use crate::ui::page_controller::{ChartAction, PageController};
use crate::ui::styles::UiStyleExt;
use crate::ui::utils::setup_custom_visuals;
use crate::utils::app_time::now;

#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;

/// Repaint cadence while fetches, cooldowns or debounces are pending.
const BUSY_REPAINT: Duration = Duration::from_millis(50);

/// Error types for application operations
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// The add-chart input was rejected
    AddChart(ConfigError),
    /// The page controller was never installed
    NotStarted,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::AddChart(ConfigError::MissingKey) => write!(f, "Enter a symbol first"),
            AppError::AddChart(e) => write!(f, "Cannot add chart: {}", e),
            AppError::NotStarted => write!(f, "Charts are not available"),
        }
    }
}

impl std::error::Error for AppError {}

#[derive(Deserialize, Serialize)]
#[serde(default)]
pub struct CandleDeckApp {
    // UI state
    pub(super) add_chart_input: String,
    pub(super) last_viewport_height: Option<f32>,

    // Runtime-only state
    #[serde(skip)]
    pub(super) controller: Option<PageController>,
    #[serde(skip)]
    pub(super) cards: HashMap<String, CardState>,
    #[serde(skip)]
    pub(super) last_error: Option<AppError>,
}

impl Default for CandleDeckApp {
    fn default() -> Self {
        Self {
            add_chart_input: String::new(),
            last_viewport_height: None,
            controller: None,
            cards: HashMap::new(),
            last_error: None,
        }
    }
}

impl CandleDeckApp {
    pub fn new(cc: &eframe::CreationContext<'_>, mut controller: PageController) -> Self {
        let mut app: CandleDeckApp = match cc.storage {
            Some(storage) => match eframe::get_value(storage, eframe::APP_KEY) {
                Some(value) => {
                    #[cfg(debug_assertions)]
                    if DEBUG_FLAGS.print_state_serde {
                        log::info!("Successfully loaded persisted state");
                    }
                    value
                }
                None => {
                    #[cfg(debug_assertions)]
                    if DEBUG_FLAGS.print_state_serde {
                        log::info!("No persisted Candle Deck state. Creating anew.");
                    }
                    CandleDeckApp::default()
                }
            },
            None => CandleDeckApp::default(),
        };

        setup_custom_visuals(&cc.egui_ctx);

        if let Some(height) = app.last_viewport_height {
            controller.set_viewport_height(height);
        }
        controller.start();
        app.controller = Some(controller);
        app
    }

    fn add_chart(&mut self) {
        let Some(controller) = self.controller.as_mut() else {
            self.last_error = Some(AppError::NotStarted);
            return;
        };
        match controller.add_chart(&self.add_chart_input) {
            Ok(()) => {
                self.add_chart_input.clear();
                self.last_error = None;
            }
            Err(e) => {
                log::warn!("Add chart '{}' rejected: {}", self.add_chart_input, e);
                self.last_error = Some(AppError::AddChart(e));
            }
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(crate::ui::utils::colored_heading(UI_TEXT.app_title));
                ui.separator();

                let input = ui.add(
                    egui::TextEdit::singleline(&mut self.add_chart_input)
                        .hint_text(UI_TEXT.add_chart_hint)
                        .desired_width(UI_CONFIG.symbol_input_width * 1.5),
                );
                let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if ui.button(UI_TEXT.add_chart_button).clicked() || submitted {
                    self.add_chart();
                }

                if let Some(error) = &self.last_error {
                    ui.label_error(error.to_string());
                }
            });
        });
    }

    /// Draws every card, then feeds what happened back into the charts.
    fn render_cards(&mut self, ctx: &egui::Context) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let cards = &mut self.cards;
        let mut outputs: Vec<(String, CardOutput)> = Vec::new();

        egui::CentralPanel::default().show(ctx, |ui| {
            if controller.is_loading_settings() {
                ui.label_subdued(UI_TEXT.loading_settings);
                return;
            }
            if controller.registry().is_empty() {
                ui.label_subdued(UI_TEXT.no_charts);
                return;
            }

            egui::ScrollArea::vertical().show(ui, |ui| {
                for chart in controller.registry().iter() {
                    let state = cards.entry(chart.key().to_string()).or_default();
                    let output = show_chart_card(ui, chart, state);
                    outputs.push((chart.key().to_string(), output));
                    ui.add_space(UI_CONFIG.card_spacing);
                }
            });
        });

        let now = now();
        for (mut key, output) in outputs {
            if let Some(chart) = controller.chart_mut(&key) {
                for event in output.events {
                    chart.handle_event(event, now);
                }
            }
            for action in output.actions {
                let removing = action == ChartAction::Remove;
                let renamed = match &action {
                    ChartAction::ChangeSymbol(symbol) => Some(symbol.trim().to_uppercase()),
                    _ => None,
                };
                if !controller.apply(&key, action) {
                    continue;
                }
                if removing {
                    cards.remove(&key);
                    continue;
                }
                // A symbol change re-keys the chart; its card state moves along.
                let moved = renamed.filter(|new_key| {
                    controller.chart(&key).is_none() && controller.chart(new_key).is_some()
                });
                if let Some(new_key) = moved {
                    if let Some(state) = cards.remove(&key) {
                        cards.insert(new_key.clone(), state);
                    }
                    key = new_key;
                }
            }
        }
    }

    #[allow(deprecated)]
    fn viewport_height(ctx: &egui::Context) -> f32 {
        ctx.screen_rect().height()
    }
}

impl eframe::App for CandleDeckApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Drop every pending promise before the runtime goes away.
        self.controller = None;
        self.cards.clear();

        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_shutdown {
            log::info!("Application shutdown complete.");
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        let viewport_height = Self::viewport_height(ctx);
        if self.last_viewport_height != Some(viewport_height) {
            self.last_viewport_height = Some(viewport_height);
            if let Some(controller) = self.controller.as_mut() {
                controller.set_viewport_height(viewport_height);
            }
        }

        let busy = self
            .controller
            .as_mut()
            .is_some_and(|controller| controller.poll(now()));
        if let Some(controller) = self.controller.as_ref() {
            // Charts can be re-keyed while polling; drop card state nobody owns any more.
            self.cards.retain(|key, _| controller.chart(key).is_some());
        }

        self.render_header(ctx);
        self.render_cards(ctx);

        if busy {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }
}
