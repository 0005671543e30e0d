//! WebAssembly bindings for Motion Trigger.
//!
//! [`WebHost`] serves the host traits from a real browser page and
//! [`WasmAnimationManager`] exposes the manager lifecycle to JavaScript.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Document, Element, HtmlElement, IntersectionObserver,
    IntersectionObserverEntry, IntersectionObserverInit, Window,
};

use crate::{
    host::{
        Clock, Dom, FrameCallback, FrameHandle, FramePrimitive, Host, HostError,
        IntersectionCallback, IntersectionConnection, IntersectionEntry, IntersectionPrimitive,
        ListenerHandle, TimerHandle,
    },
    manager::AnimationManager,
    schema::{CounterFormat, ElementId, MotionConfig, ObserveOptions, PropertyTarget},
};

/// Initialize WASM module with panic hook and logging.
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages in browser
    console_error_panic_hook::set_once();

    // Initialize WASM logger
    wasm_logger::init(wasm_logger::Config::default());
}

fn js_error(value: JsValue) -> HostError {
    HostError::Js(
        value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    )
}

/// Leading number of a CSS value such as `"0.5"` or `"12px"`.
fn parse_css_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

const ID_ATTRIBUTE: &str = "data-motion-id";

// Shared by every registry so ids stamped by one host never collide with
// another's.
thread_local! {
    static NEXT_ELEMENT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Stable ids for DOM elements seen through `find`.
///
/// The id is stamped on the element as an attribute, so the registry keeps
/// no element alive and a detached element simply stops resolving.
struct ElementRegistry {
    document: Document,
}

impl ElementRegistry {
    fn new(document: Document) -> Self {
        Self { document }
    }

    fn intern(&self, element: &Element) -> Option<ElementId> {
        if let Some(id) = Self::lookup(element) {
            return Some(id);
        }
        let id = NEXT_ELEMENT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        if let Err(e) = element.set_attribute(ID_ATTRIBUTE, &id.to_string()) {
            warn!("cannot tag element: {}", js_error(e));
            return None;
        }
        Some(ElementId(id))
    }

    fn get(&self, id: ElementId) -> Option<Element> {
        self.document
            .query_selector(&format!("[{ID_ATTRIBUTE}=\"{}\"]", id.0))
            .ok()
            .flatten()
    }

    fn lookup(element: &Element) -> Option<ElementId> {
        element
            .get_attribute(ID_ATTRIBUTE)
            .and_then(|value| value.parse().ok())
            .map(ElementId)
    }
}

/// Host backed by `window` and `document`.
pub struct WebHost {
    window: Window,
    document: Document,
    registry: Rc<ElementRegistry>,
    listeners: RefCell<HashMap<u64, Closure<dyn FnMut()>>>,
    next_listener: Cell<u64>,
}

impl WebHost {
    pub fn new() -> Result<Rc<Self>, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document"))?;
        Ok(Rc::new(Self {
            window,
            registry: Rc::new(ElementRegistry::new(document.clone())),
            document,
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
        }))
    }

    fn supports(&self, global: &str) -> bool {
        js_sys::Reflect::has(&self.window, &JsValue::from_str(global)).unwrap_or(false)
    }

    /// Capabilities of this page. Frame scheduling and intersection are
    /// left out when the browser lacks them.
    pub fn host(self: &Rc<Self>) -> Host {
        Host {
            dom: self.clone(),
            clock: self.clone(),
            frames: self
                .supports("requestAnimationFrame")
                .then(|| self.clone() as Rc<dyn FramePrimitive>),
            intersection: self
                .supports("IntersectionObserver")
                .then(|| self.clone() as Rc<dyn IntersectionPrimitive>),
        }
    }

    fn element(&self, id: ElementId) -> Result<Element, HostError> {
        self.registry.get(id).ok_or(HostError::MissingElement(id))
    }
}

impl Dom for WebHost {
    fn find(&self, selector: &str) -> Vec<ElementId> {
        let nodes = match self.document.query_selector_all(selector) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("invalid selector '{selector}': {}", js_error(e));
                return Vec::new();
            }
        };
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .filter_map(|element| self.registry.intern(&element))
            .collect()
    }

    fn contains(&self, element: ElementId) -> bool {
        self.registry.get(element).is_some()
    }

    fn read_property(&self, element: ElementId, name: &str) -> Option<f64> {
        let element = self.registry.get(element)?;
        let style = self.window.get_computed_style(&element).ok()??;
        let value = style.get_property_value(name).ok()?;
        parse_css_number(&value)
    }

    fn write_property(
        &self,
        element: ElementId,
        name: &str,
        value: f64,
        unit: &str,
    ) -> Result<(), HostError> {
        let html = self
            .element(element)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| HostError::Unsupported {
                element,
                what: "inline style",
            })?;
        html.style()
            .set_property(name, &format!("{value}{unit}"))
            .map_err(js_error)
    }

    fn read_text(&self, element: ElementId) -> Option<String> {
        self.registry.get(element)?.text_content()
    }

    fn write_text(&self, element: ElementId, text: &str) -> Result<(), HostError> {
        self.element(element)?.set_text_content(Some(text));
        Ok(())
    }

    fn add_class(&self, element: ElementId, class: &str) -> Result<(), HostError> {
        self.element(element)?
            .class_list()
            .add_1(class)
            .map_err(js_error)
    }

    fn remove_class(&self, element: ElementId, class: &str) -> Result<(), HostError> {
        self.element(element)?
            .class_list()
            .remove_1(class)
            .map_err(js_error)
    }

    fn scroll_offset(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn add_scroll_listener(&self, handler: Rc<dyn Fn()>) -> ListenerHandle {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);

        let callback = Closure::<dyn FnMut()>::new(move || handler());
        let options = AddEventListenerOptions::new();
        options.set_passive(true);
        if let Err(e) = self
            .window
            .add_event_listener_with_callback_and_add_event_listener_options(
                "scroll",
                callback.as_ref().unchecked_ref(),
                &options,
            )
        {
            warn!("scroll listener not installed: {}", js_error(e));
        }
        self.listeners.borrow_mut().insert(id, callback);
        ListenerHandle(id)
    }

    fn remove_listener(&self, handle: ListenerHandle) {
        let Some(callback) = self.listeners.borrow_mut().remove(&handle.0) else {
            return;
        };
        let _ = self
            .window
            .remove_event_listener_with_callback("scroll", callback.as_ref().unchecked_ref());
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.window
            .match_media("(prefers-reduced-motion: reduce)")
            .ok()
            .flatten()
            .is_some_and(|query| query.matches())
    }
}

impl Clock for WebHost {
    fn now(&self) -> f64 {
        self.window
            .performance()
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> TimerHandle {
        let callback = Closure::once_into_js(move || callback());
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                delay_ms.max(0.0).round() as i32,
            ) {
            Ok(handle) => TimerHandle(handle as u64),
            Err(e) => {
                warn!("setTimeout failed: {}", js_error(e));
                TimerHandle(0)
            }
        }
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.window.clear_timeout_with_handle(handle.0 as i32);
    }
}

impl FramePrimitive for WebHost {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let callback = Closure::once_into_js(move |timestamp: f64| callback(timestamp));
        match self.window.request_animation_frame(callback.unchecked_ref()) {
            Ok(handle) => FrameHandle(handle as u64),
            Err(e) => {
                warn!("requestAnimationFrame failed: {}", js_error(e));
                FrameHandle(0)
            }
        }
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let _ = self.window.cancel_animation_frame(handle.0 as i32);
    }
}

/// One browser `IntersectionObserver`.
struct WebConnection {
    observer: Option<IntersectionObserver>,
    registry: Rc<ElementRegistry>,
    _callback: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
}

impl IntersectionConnection for WebConnection {
    fn observe(&self, element: ElementId) {
        if let (Some(observer), Some(target)) = (&self.observer, self.registry.get(element)) {
            observer.observe(&target);
        }
    }

    fn unobserve(&self, element: ElementId) {
        if let (Some(observer), Some(target)) = (&self.observer, self.registry.get(element)) {
            observer.unobserve(&target);
        }
    }

    fn disconnect(&self) {
        if let Some(observer) = &self.observer {
            observer.disconnect();
        }
    }
}

impl IntersectionPrimitive for WebHost {
    fn connect(
        &self,
        options: &ObserveOptions,
        callback: IntersectionCallback,
    ) -> Box<dyn IntersectionConnection> {
        let closure = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                let entries: Vec<IntersectionEntry> = entries
                    .iter()
                    .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
                    .filter_map(|entry| {
                        Some(IntersectionEntry {
                            element: ElementRegistry::lookup(&entry.target())?,
                            ratio: entry.intersection_ratio(),
                            is_intersecting: entry.is_intersecting(),
                        })
                    })
                    .collect();
                if !entries.is_empty() {
                    callback(&entries);
                }
            },
        );

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(options.threshold));
        init.set_root_margin(&options.root_margin);
        let observer =
            match IntersectionObserver::new_with_options(closure.as_ref().unchecked_ref(), &init) {
                Ok(observer) => Some(observer),
                Err(e) => {
                    warn!("IntersectionObserver rejected options: {}", js_error(e));
                    None
                }
            };

        Box::new(WebConnection {
            observer,
            registry: self.registry.clone(),
            _callback: closure,
        })
    }
}

/// WebAssembly wrapper for the animation manager.
#[wasm_bindgen]
pub struct WasmAnimationManager {
    manager: AnimationManager,
    page: Rc<WebHost>,
}

#[wasm_bindgen]
impl WasmAnimationManager {
    /// Create a manager from a JSON `MotionConfig`. An empty string uses
    /// the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmAnimationManager, JsValue> {
        let config = if config_json.trim().is_empty() {
            MotionConfig::default()
        } else {
            MotionConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let page = WebHost::new()?;
        Ok(WasmAnimationManager {
            manager: AnimationManager::new(page.host(), config),
            page,
        })
    }

    /// Wire observers and scroll effects. Returns the resulting state.
    #[wasm_bindgen]
    pub fn start(&mut self) -> Result<JsValue, JsValue> {
        let state = self
            .manager
            .start()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serde_wasm_bindgen::to_value(&state)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
    }

    #[wasm_bindgen]
    pub fn dispose(&mut self) -> Result<(), JsValue> {
        self.manager
            .dispose()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.manager.state())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
    }

    /// Animate every match of `selector`. `targets` is an array of
    /// `{ name, value, unit }`. Returns the number of elements animated.
    #[wasm_bindgen(js_name = animateProperties)]
    pub fn animate_properties(
        &self,
        selector: &str,
        targets: JsValue,
        duration_ms: f64,
    ) -> Result<u32, JsValue> {
        let targets: Vec<PropertyTarget> = serde_wasm_bindgen::from_value(targets)
            .map_err(|e| JsValue::from_str(&format!("Invalid targets: {e}")))?;
        let mut count = 0;
        for element in self.page.find(selector) {
            self.manager
                .animate_properties(element, &targets, duration_ms)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    /// Count every match of `selector` up to `target`.
    #[wasm_bindgen(js_name = animateCounter)]
    pub fn animate_counter(
        &self,
        selector: &str,
        target: f64,
        duration_ms: f64,
    ) -> Result<u32, JsValue> {
        let format = CounterFormat::default();
        let mut count = 0;
        for element in self.page.find(selector) {
            self.manager
                .animate_counter(element, target, duration_ms, &format)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    /// Let every element play again on its next appearance.
    #[wasm_bindgen(js_name = resetAll)]
    pub fn reset_all(&self) -> Result<(), JsValue> {
        self.manager
            .reset_all()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = triggeredCount)]
    pub fn triggered_count(&self) -> usize {
        self.manager.triggered_count()
    }
}
