//! Recallify: a local-first note editor for study subjects.

mod app;
mod components;
pub mod config;
pub mod document;
pub mod editor;
pub mod models;
pub mod scheduler;
pub mod search;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use app::App;

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use crate::config::EditorConfig;
    use crate::storage::Backend;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_plain_browser_selects_local_backend() {
        let config = EditorConfig::from_window();
        assert_eq!(Backend::select(&config).kind(), "local");
    }
}

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    telemetry::init_logging(tracing::Level::DEBUG);
    mount_to_body(App);
}
