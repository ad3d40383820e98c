use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex};

use crate::settings::{API_KEY_ENV, BACKEND_KEY_ENV, BACKEND_URL_ENV, SettingsStore};

/// Full-window fallback shown when required configuration is missing or still
/// a placeholder. The chat surface is not constructed at all in this state.
pub struct SetupView;

impl SetupView {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self
    }

    fn render_step(&self, index: usize, text: String, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        div()
            .text_sm()
            .text_color(theme.foreground.opacity(0.8))
            .child(format!("{index}. {text}"))
    }
}

impl Render for SetupView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let settings_path = SettingsStore::default_config_path();

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                v_flex()
                    .w(px(440.))
                    .gap_3()
                    .p_6()
                    .bg(theme.popover)
                    .rounded_lg()
                    .shadow_lg()
                    .child(
                        div()
                            .text_lg()
                            .font_weight(FontWeight::SEMIBOLD)
                            .text_color(theme.foreground)
                            .child("Setup Required"),
                    )
                    .child(
                        Label::new(
                            "It looks like your environment variables are not configured \
                             correctly.",
                        )
                        .text_sm()
                        .text_color(theme.foreground.opacity(0.8)),
                    )
                    .child(self.render_step(
                        1,
                        format!(
                            "Export {BACKEND_URL_ENV} and {BACKEND_KEY_ENV} for the hosted \
                             conversation store."
                        ),
                        cx,
                    ))
                    .child(self.render_step(
                        2,
                        format!("Export {API_KEY_ENV} for the generative-model API."),
                        cx,
                    ))
                    .child(self.render_step(
                        3,
                        format!(
                            "Alternatively, fill the same values in {}.",
                            settings_path.display()
                        ),
                        cx,
                    ))
                    .child(
                        Label::new("Restart the app after configuring.")
                            .text_xs()
                            .text_color(theme.foreground.opacity(0.55)),
                    ),
            )
    }
}
