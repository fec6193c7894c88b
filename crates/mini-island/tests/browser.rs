//! Browser smoke tests. Run with `wasm-pack test --headless --firefox`.

#![cfg(all(target_arch = "wasm32", feature = "browser"))]

use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::Element;

use mini_island::platform::browser::{BrowserElement, browser_capabilities, register_with};
use mini_island::{Activation, ConditionRegistry, Island, IslandConfig, IslandError};

wasm_bindgen_test_configure!(run_in_browser);

/// Each test registers its own tag; custom element definitions are page-wide.
fn tag_config(tag_name: &str) -> IslandConfig {
    IslandConfig {
        tag_name: tag_name.to_string(),
        ..IslandConfig::default()
    }
}

/// Let spawned activation tasks and observer callbacks run.
async fn settle() {
    let promise = js_sys::Promise::new(&mut |resolve, _| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 50)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

fn island_element(html: &str, attributes: &[(&str, &str)]) -> Element {
    tagged_element("mini-island", html, attributes)
}

fn tagged_element(tag: &str, html: &str, attributes: &[(&str, &str)]) -> Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let element = document.create_element(tag).unwrap();
    for (name, value) in attributes {
        element.set_attribute(name, value).unwrap();
    }
    element.set_inner_html(html);
    document.body().unwrap().append_child(&element).unwrap();
    element
}

#[wasm_bindgen_test]
fn reads_declared_conditions() {
    let registry = ConditionRegistry::with_defaults(IslandConfig::default(), browser_capabilities());
    let element = island_element("", &[("client:media", "(min-width: 1px)"), ("client:idle", "")]);

    let declared = registry.declared_conditions(&BrowserElement(element));
    assert_eq!(declared["media"], "(min-width: 1px)");
    assert_eq!(declared["idle"], "");
    assert!(!declared.contains_key("visible"));
}

#[wasm_bindgen_test]
async fn reveals_templates_without_conditions() {
    let registry = ConditionRegistry::with_defaults(IslandConfig::default(), browser_capabilities());
    let element = island_element(
        "<template data-island><p>one</p></template><template data-island><p>two</p></template>",
        &[],
    );
    let island = Island::new(BrowserElement(element.clone()));

    let activation = island.activate(&registry).await;
    assert_eq!(activation, Ok(Activation::Revealed { blocks: 2 }));
    assert_eq!(element.inner_html(), "<p>one</p><p>two</p>");
}

#[wasm_bindgen_test]
async fn matching_media_query_reveals() {
    let registry = ConditionRegistry::with_defaults(IslandConfig::default(), browser_capabilities());
    let element = island_element(
        "<template data-island><span>wide</span></template>",
        &[("client:media", "(min-width: 1px)")],
    );
    let island = Island::new(BrowserElement(element.clone()));

    assert_eq!(island.activate(&registry).await, Ok(Activation::Revealed { blocks: 1 }));
    assert_eq!(element.inner_html(), "<span>wide</span>");
}

#[wasm_bindgen_test]
async fn inserted_element_reveals() {
    register_with(tag_config("x-island-inserted")).unwrap();
    let element = tagged_element("x-island-inserted", "<template data-island><p>hydrated</p></template>", &[]);

    settle().await;
    assert_eq!(element.inner_html(), "<p>hydrated</p>");
}

#[wasm_bindgen_test]
async fn visible_island_removed_before_intersecting_stays_inert() {
    register_with(tag_config("x-island-removed")).unwrap();
    let element = tagged_element(
        "x-island-removed",
        "<template data-island><p>never</p></template>",
        &[("client:visible", "")],
    );
    element.remove();

    settle().await;
    assert_eq!(element.inner_html(), "<template data-island=\"\"><p>never</p></template>");
}

#[wasm_bindgen_test]
async fn moved_revealed_element_keeps_its_content() {
    register_with(tag_config("x-island-moved")).unwrap();
    let element = tagged_element("x-island-moved", "<template data-island><p>once</p></template>", &[]);
    settle().await;
    assert_eq!(element.inner_html(), "<p>once</p>");

    let body = web_sys::window().unwrap().document().unwrap().body().unwrap();
    element.remove();
    body.append_child(&element).unwrap();
    settle().await;
    assert_eq!(element.inner_html(), "<p>once</p>");
}

#[wasm_bindgen_test]
fn second_registration_of_a_tag_fails() {
    register_with(tag_config("x-island-twice")).unwrap();
    assert!(matches!(
        register_with(tag_config("x-island-twice")),
        Err(IslandError::Registration(_))
    ));
}
