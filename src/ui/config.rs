use eframe::egui::Color32;

/// UI Colors for consistent theming
#[derive(Clone, Copy)]
pub struct UiColors {
    pub label: Color32,
    pub heading: Color32,
    pub subsection_heading: Color32,
    pub central_panel: Color32,
    pub card_fill: Color32,
    pub ohlc_neutral: Color32,
}

/// Main UI configuration struct that holds all UI-related settings
#[derive(Clone, Copy)]
pub struct UiConfig {
    pub colors: UiColors,
    pub card_spacing: f32,
    pub symbol_input_width: f32,
    pub date_input_width: f32,
}

/// Global UI configuration instance
pub static UI_CONFIG: UiConfig = UiConfig {
    colors: UiColors {
        label: Color32::GRAY,     // This sets every label globally to this color
        heading: Color32::YELLOW, // Sets every heading
        subsection_heading: Color32::ORANGE,
        central_panel: Color32::from_rgb(18, 18, 22),
        card_fill: Color32::from_rgb(28, 28, 34),
        ohlc_neutral: Color32::LIGHT_GRAY,
    },
    card_spacing: 8.0,
    symbol_input_width: 120.0,
    date_input_width: 140.0,
};

/// Every user facing string in one place.
pub struct UiText {
    pub app_title: &'static str,
    pub add_chart_hint: &'static str,
    pub add_chart_button: &'static str,
    pub auto_interval_button: &'static str,
    pub latest_button: &'static str,
    pub volume_button: &'static str,
    pub reload_button: &'static str,
    pub remove_button: &'static str,
    pub retracement_button: &'static str,
    pub retracement_heading: &'static str,
    pub retracement_start: &'static str,
    pub retracement_end: &'static str,
    pub retracement_date_hint: &'static str,
    pub retracement_price_hint: &'static str,
    pub retracement_add: &'static str,
    pub retracement_cancel: &'static str,
    pub symbol_hint: &'static str,
    pub loading_settings: &'static str,
    pub no_charts: &'static str,
}

pub const UI_TEXT: UiText = UiText {
    app_title: "Candle Deck",
    add_chart_hint: "Symbol, e.g. ETHUSDT",
    add_chart_button: "Add chart",
    auto_interval_button: "Auto",
    latest_button: "⏭ Latest",
    volume_button: "Volume",
    reload_button: "⟳",
    remove_button: "✖",
    retracement_button: "Retracement…",
    retracement_heading: "New retracement",
    retracement_start: "Start",
    retracement_end: "End",
    retracement_date_hint: "YYYY-MM-DD HH:MM",
    retracement_price_hint: "price (blank = close)",
    retracement_add: "Add",
    retracement_cancel: "Cancel",
    symbol_hint: "Symbol",
    loading_settings: "Loading saved charts…",
    no_charts: "No charts open. Add a symbol above.",
};
