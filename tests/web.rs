//! Browser smoke tests. Run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use motion_trigger::{
    AnimationManager, ManagerState, MotionConfig,
    host::Dom,
    wasm::{WasmAnimationManager, WebHost},
};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn append(document: &web_sys::Document, class: &str) -> web_sys::Element {
    let element = document.create_element("div").unwrap();
    element.set_class_name(class);
    element.set_text_content(Some("1200"));
    document.body().unwrap().append_child(&element).unwrap();
    element
}

#[wasm_bindgen_test]
fn web_host_finds_and_mutates_elements() {
    let document = web_sys::window().unwrap().document().unwrap();
    let element = append(&document, "probe");

    let page = WebHost::new().unwrap();
    let found = page.find(".probe");
    assert_eq!(found.len(), 1);
    assert_eq!(page.find(".probe"), found);

    page.add_class(found[0], "visible").unwrap();
    assert!(element.class_list().contains("visible"));
    page.write_text(found[0], "42").unwrap();
    assert_eq!(element.text_content().as_deref(), Some("42"));
    page.write_property(found[0], "opacity", 0.5, "").unwrap();
    assert_eq!(page.read_property(found[0], "opacity"), Some(0.5));
}

#[wasm_bindgen_test]
fn manager_starts_and_disposes_in_browser() {
    let document = web_sys::window().unwrap().document().unwrap();
    append(&document, "fade-in");

    let page = WebHost::new().unwrap();
    let mut manager = AnimationManager::new(page.host(), MotionConfig::default());
    let state = manager.start().unwrap();
    assert!(matches!(state, ManagerState::Active | ManagerState::Disabled));
    if state == ManagerState::Active {
        manager.dispose().unwrap();
        assert_eq!(manager.state(), ManagerState::Disposed);
    }
}

#[wasm_bindgen_test]
fn wasm_manager_rejects_bad_config() {
    assert!(WasmAnimationManager::new("{ not json").is_err());
    assert!(WasmAnimationManager::new("").is_ok());
}

#[wasm_bindgen_test]
fn detached_element_stops_resolving() {
    let document = web_sys::window().unwrap().document().unwrap();
    let element = append(&document, "transient");

    let page = WebHost::new().unwrap();
    let id = page.find(".transient")[0];
    assert!(element.has_attribute("data-motion-id"));
    assert!(page.contains(id));

    element.remove();
    assert!(!page.contains(id));
    assert!(page.add_class(id, "visible").is_err());

    // A second host sees the same id for a re-attached element.
    document.body().unwrap().append_child(&element).unwrap();
    let other = WebHost::new().unwrap();
    assert_eq!(other.find(".transient"), vec![id]);
}
