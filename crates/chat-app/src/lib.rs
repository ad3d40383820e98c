#![deny(unsafe_code)]

/// Desktop chat client over a hosted conversation store and a hosted
/// generative-model API.
///
/// The UI is built with GPUI and gpui-component; all network work runs on
/// tokio via gpui-tokio-bridge. `wren-backend` owns the hosted-store wiring
/// and `wren-llm` the model provider.
pub mod app;
/// Chat surface: sidebar, message list, input, and send orchestration.
pub mod chat;
/// Settings persistence and UI.
pub mod settings;
/// Setup-required fallback screen.
pub mod setup;
