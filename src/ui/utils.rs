use eframe::egui::{Context, RichText, Visuals};

use crate::ui::config::UI_CONFIG;

/// Creates a colored heading with uppercase text and monospace font
pub fn colored_heading(text: impl Into<String>) -> RichText {
    RichText::new(text.into().to_uppercase())
        .color(UI_CONFIG.colors.heading)
        .monospace()
}

/// Sets up custom visuals for the entire application
pub fn setup_custom_visuals(ctx: &Context) {
    let mut visuals = Visuals::dark();

    visuals.panel_fill = UI_CONFIG.colors.central_panel;
    visuals.window_fill = UI_CONFIG.colors.card_fill;

    visuals.widgets.noninteractive.fg_stroke.color = UI_CONFIG.colors.label;
    visuals.widgets.inactive.fg_stroke.color = UI_CONFIG.colors.label;
    visuals.widgets.hovered.fg_stroke.color = UI_CONFIG.colors.heading;
    visuals.widgets.active.fg_stroke.color = UI_CONFIG.colors.heading;

    ctx.set_visuals(visuals);
}

/// Formats a price axis value with "Trader Precision".
/// - Large (>1000): 2 decimals (95123.50)
/// - Medium (1-1000): 4 decimals (12.4829)
/// - Small (<1): 5-8 decimals (0.00000231)
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "0.00".to_string();
    }

    let abs_price = price.abs();

    if abs_price >= 1000.0 {
        format!("{:.2}", price)
    } else if abs_price >= 1.0 {
        format!("{:.4}", price)
    } else if abs_price >= 0.01 {
        format!("{:.5}", price)
    } else {
        format!("{:.8}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_follows_magnitude() {
        assert_eq!(format_price(0.0), "0.00");
        assert_eq!(format_price(95123.5), "95123.50");
        assert_eq!(format_price(12.48291), "12.4829");
        assert_eq!(format_price(0.05), "0.05000");
        assert_eq!(format_price(0.00000231), "0.00000231");
    }
}
