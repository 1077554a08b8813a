//! WASM bindings for the session module.
//!
//! The browser owns the socket: `edit` returns the wire frame to send and
//! `applyRemote` takes frames received from the relay.

use js_sys::Array;
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::prelude::*;

use super::manager::SessionState;
use super::model::Language;
use crate::error::PadError;
use crate::sandbox::Sandbox;
use crate::sync::{ChannelEvent, OriginId};

/// Serialize a value to JsValue with maps as plain JS objects (not Map).
fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&Serializer::new().serialize_maps_as_objects(true))
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

impl From<PadError> for JsValue {
    fn from(err: PadError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}

/// Helper macro for Result conversion
macro_rules! js_result {
    ($expr:expr) => {
        $expr.map_err(|e: PadError| JsValue::from(e))
    };
}

// =============================================================================
// MAIN WRAPPER TYPE
// =============================================================================

/// JavaScript-friendly wrapper around [`SessionState`] and a [`Sandbox`].
#[wasm_bindgen]
pub struct JsSession {
    inner: SessionState,
    sandbox: Sandbox,
}

#[wasm_bindgen]
impl JsSession {
    /// Creates a session. Pass an origin id to reuse one, or nothing to
    /// generate a fresh one.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const session = new JsSession();
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(origin_id: Option<String>) -> JsSession {
        let origin = origin_id.map(OriginId::new).unwrap_or_else(OriginId::generate);
        JsSession {
            inner: SessionState::new(origin),
            sandbox: Sandbox::default(),
        }
    }

    #[wasm_bindgen(js_name = originId)]
    pub fn origin_id(&self) -> String {
        self.inner.origin_id().to_string()
    }

    /// Applies a local edit and returns the JSON frame to send to the relay.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// socket.send(session.edit(editor.getValue()));
    /// ```
    pub fn edit(&mut self, content: String) -> Result<String, JsValue> {
        let event = self.inner.apply_local_edit(content);
        Ok(js_result!(event.encode())?)
    }

    /// Applies a frame received from the relay. Returns `false` for echoes
    /// of our own edits.
    #[wasm_bindgen(js_name = applyRemote)]
    pub fn apply_remote(&mut self, frame: &str) -> Result<bool, JsValue> {
        let event = js_result!(ChannelEvent::decode(frame))?;
        Ok(self.inner.apply_remote(&event))
    }

    pub fn content(&self) -> String {
        self.inner.content().to_string()
    }

    pub fn revision(&self) -> f64 {
        self.inner.revision() as f64
    }

    pub fn language(&self) -> String {
        self.inner.language().to_string()
    }

    /// Sets the language selector (`javascript`, `python`, `java`, `c`).
    #[wasm_bindgen(js_name = setLanguage)]
    pub fn set_language(&mut self, language: &str) -> Result<(), JsValue> {
        let language: Language = js_result!(language.parse())?;
        self.inner.set_language(language);
        Ok(())
    }

    #[wasm_bindgen(js_name = toggleTheme)]
    pub fn toggle_theme(&mut self) -> String {
        self.inner.toggle_theme().as_str().to_string()
    }

    pub fn theme(&self) -> String {
        self.inner.theme().as_str().to_string()
    }

    /// Runs the buffer and returns the execution result object
    /// (`capturedOutput`, `errorDescription`, `status`, `truncated`).
    pub fn run(&mut self) -> Result<JsValue, JsValue> {
        let result = self.inner.run(&mut self.sandbox);
        Ok(to_js_value(result)?)
    }

    /// Output panel text for the last run.
    #[wasm_bindgen(js_name = outputText)]
    pub fn output_text(&self) -> String {
        self.inner.output_text()
    }

    /// Captures a snapshot and returns its sequence number.
    pub fn snapshot(&mut self) -> usize {
        self.inner.take_snapshot().sequence()
    }

    /// Snapshot contents, oldest first.
    pub fn history(&self) -> Array {
        let array = Array::new();
        for entry in self.inner.history().iter() {
            array.push(&JsValue::from_str(entry.content()));
        }
        array
    }

    /// Returns and clears the pending notice (`{level, message}`), or `null`.
    #[wasm_bindgen(js_name = takeNotice)]
    pub fn take_notice(&mut self) -> Result<JsValue, JsValue> {
        match self.inner.take_notice() {
            Some(notice) => Ok(to_js_value(&notice)?),
            None => Ok(JsValue::NULL),
        }
    }
}
