use rnapuzzler_core::PuzzlerOptions;
use wasm_bindgen::prelude::*;

/// Lay out a dot-bracket structure and return the layout as JSON.
///
/// `options_json` is parsed as `PuzzlerOptions` with `#[serde(default)]`,
/// so any omitted field uses the default value and unreadable options
/// fall back to the defaults. Returns an empty string for an invalid
/// structure.
#[wasm_bindgen]
pub fn layout(structure: &str, options_json: &str) -> String {
    let opts: PuzzlerOptions = serde_json::from_str(options_json).unwrap_or_default();
    rnapuzzler_core::layout_structure(structure, &opts)
        .ok()
        .and_then(|result| serde_json::to_string(&result).ok())
        .unwrap_or_default()
}

/// Default layout options as JSON.
#[wasm_bindgen]
pub fn default_options() -> String {
    serde_json::to_string(&PuzzlerOptions::default()).unwrap_or_default()
}
