use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable, ThemeMode,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputState},
    v_flex,
};
use wren_llm::DEFAULT_GEMINI_MODEL;

use crate::settings::state::{AppSettings, SettingsState};

pub struct SettingsView {
    state: Entity<SettingsState>,
    backend_url_input: Entity<InputState>,
    backend_key_input: Entity<InputState>,
    api_key_input: Entity<InputState>,
    model_input: Entity<InputState>,
    streaming: bool,
    theme_mode: ThemeMode,
    error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsClose;

impl EventEmitter<SettingsClose> for SettingsView {}

impl SettingsView {
    pub fn new(state: &Entity<SettingsState>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let settings = state.read(cx).settings().clone();

        let backend_url_input = cx.new(|cx| {
            InputState::new(window, cx).placeholder("Backend URL (e.g., https://xyz.supabase.co)")
        });
        backend_url_input.update(cx, |input_state, cx| {
            input_state.set_value(settings.backend_url.clone(), window, cx);
        });

        let backend_key_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Backend service key"));
        backend_key_input.update(cx, |input_state, cx| {
            input_state.set_value(settings.backend_key.clone(), window, cx);
        });

        let api_key_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Model API key"));
        api_key_input.update(cx, |input_state, cx| {
            input_state.set_value(settings.api_key.clone(), window, cx);
        });

        let model_input = cx.new(|cx| {
            InputState::new(window, cx).placeholder("Model (e.g., gemini-1.5-flash)")
        });
        model_input.update(cx, |input_state, cx| {
            input_state.set_value(settings.model_id.clone(), window, cx);
        });

        Self {
            state: state.clone(),
            backend_url_input,
            backend_key_input,
            api_key_input,
            model_input,
            streaming: settings.streaming,
            theme_mode: settings.theme_mode,
            error_message: None,
        }
    }

    fn select_streaming(
        &mut self,
        _event: &gpui::ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.streaming = true;
        cx.notify();
    }

    fn select_single_shot(
        &mut self,
        _event: &gpui::ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.streaming = false;
        cx.notify();
    }

    fn select_light_mode(
        &mut self,
        _event: &gpui::ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.theme_mode = ThemeMode::Light;
        cx.notify();
    }

    fn select_dark_mode(
        &mut self,
        _event: &gpui::ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.theme_mode = ThemeMode::Dark;
        cx.notify();
    }

    fn save_settings(
        &mut self,
        _event: &gpui::ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let backend_url = self.backend_url_input.read(cx).value().to_string();
        let backend_key = self.backend_key_input.read(cx).value().to_string();
        let api_key = self.api_key_input.read(cx).value().to_string();
        let model_id = self.model_input.read(cx).value().to_string();

        let new_settings = AppSettings {
            backend_url: backend_url.trim().to_string(),
            backend_key: backend_key.trim().to_string(),
            api_key: api_key.trim().to_string(),
            model_id: if model_id.trim().is_empty() {
                DEFAULT_GEMINI_MODEL.to_string()
            } else {
                model_id.trim().to_string()
            },
            streaming: self.streaming,
            theme_mode: self.theme_mode,
        };

        match self
            .state
            .update(cx, |state, cx| state.update_settings(new_settings, cx))
        {
            Ok(()) => {
                self.error_message = None;
                cx.emit(SettingsClose);
                cx.notify();
            }
            Err(e) => {
                self.error_message = Some(format!("Failed to save settings: {e}"));
                cx.notify();
            }
        }
    }

    fn cancel(&mut self, _event: &gpui::ClickEvent, _window: &mut Window, cx: &mut Context<Self>) {
        self.error_message = None;
        cx.emit(SettingsClose);
        cx.notify();
    }

    fn render_field(
        &self,
        label: &'static str,
        input: &Entity<InputState>,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .gap_1()
            .child(div().text_sm().text_color(theme.foreground).child(label))
            .child(Input::new(input).w_full())
    }

    fn render_mode_buttons(&self, cx: &mut Context<Self>) -> impl IntoElement {
        h_flex()
            .gap_2()
            .child(
                Button::new("settings-mode-streaming")
                    .small()
                    .when(self.streaming, |button| button.primary())
                    .when(!self.streaming, |button| button.ghost())
                    .child("Streamed")
                    .on_click(cx.listener(Self::select_streaming)),
            )
            .child(
                Button::new("settings-mode-single")
                    .small()
                    .when(!self.streaming, |button| button.primary())
                    .when(self.streaming, |button| button.ghost())
                    .child("Single-shot")
                    .on_click(cx.listener(Self::select_single_shot)),
            )
    }
}

impl Render for SettingsView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("settings-view")
            .w(px(400.))
            .gap_4()
            .p_4()
            .bg(theme.popover)
            .rounded_lg()
            .shadow_lg()
            .child(
                div()
                    .text_lg()
                    .font_weight(FontWeight::SEMIBOLD)
                    .text_color(theme.foreground)
                    .child("Settings"),
            )
            .child(
                v_flex()
                    .gap_3()
                    .child(self.render_field("Backend URL", &self.backend_url_input, cx))
                    .child(self.render_field("Backend Key", &self.backend_key_input, cx))
                    .child(self.render_field("Model API Key", &self.api_key_input, cx))
                    .child(self.render_field("Model", &self.model_input, cx))
                    .child(
                        v_flex()
                            .gap_1()
                            .child(
                                div()
                                    .text_sm()
                                    .text_color(theme.foreground)
                                    .child("Response Mode"),
                            )
                            .child(self.render_mode_buttons(cx)),
                    )
                    .child(
                        v_flex()
                            .gap_1()
                            .child(
                                div()
                                    .text_sm()
                                    .text_color(theme.foreground)
                                    .child("Theme Mode"),
                            )
                            .child(
                                h_flex()
                                    .gap_2()
                                    .child(
                                        Button::new("settings-theme-light")
                                            .small()
                                            .when(self.theme_mode == ThemeMode::Light, |button| {
                                                button.primary()
                                            })
                                            .when(self.theme_mode != ThemeMode::Light, |button| {
                                                button.ghost()
                                            })
                                            .child("Light")
                                            .on_click(cx.listener(Self::select_light_mode)),
                                    )
                                    .child(
                                        Button::new("settings-theme-dark")
                                            .small()
                                            .when(self.theme_mode == ThemeMode::Dark, |button| {
                                                button.primary()
                                            })
                                            .when(self.theme_mode != ThemeMode::Dark, |button| {
                                                button.ghost()
                                            })
                                            .child("Dark")
                                            .on_click(cx.listener(Self::select_dark_mode)),
                                    ),
                            ),
                    ),
            )
            .when_some(self.error_message.clone(), |el, error| {
                el.child(div().text_sm().text_color(theme.danger).child(error))
            })
            .child(
                h_flex()
                    .gap_2()
                    .justify_end()
                    .child(
                        Button::new("settings-cancel")
                            .ghost()
                            .small()
                            .child("Cancel")
                            .on_click(cx.listener(Self::cancel)),
                    )
                    .child(
                        Button::new("settings-save")
                            .primary()
                            .small()
                            .child("Save")
                            .on_click(cx.listener(Self::save_settings)),
                    ),
            )
    }
}
