//! DOM element adapter.

use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlTemplateElement};

use crate::error::IslandError;
use crate::host::IslandElement;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowserElement(pub Element);

impl From<Element> for BrowserElement {
    fn from(element: Element) -> Self {
        Self(element)
    }
}

impl IslandElement for BrowserElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn descendants_matching(&self, tag: &str, attribute: &str) -> Vec<Self> {
        let selector = format!("{tag}[{}]", escape_attribute(attribute));
        let nodes = match self.0.query_selector_all(&selector) {
            Ok(nodes) => nodes,
            Err(error) => {
                log::warn!("querySelectorAll('{selector}') failed: {error:?}");
                return Vec::new();
            }
        };
        (0..nodes.length())
            .filter_map(|index| nodes.item(index))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(BrowserElement)
            .collect()
    }

    fn closest_ancestor(&self, tag: &str) -> Option<Self> {
        self.0
            .parent_element()?
            .closest(tag)
            .ok()
            .flatten()
            .map(BrowserElement)
    }

    fn is_same(&self, other: &Self) -> bool {
        self.0.is_same_node(Some(other.0.as_ref()))
    }

    fn replace_with_content(&self) -> Result<(), IslandError> {
        let template = self.0.dyn_ref::<HtmlTemplateElement>().ok_or_else(|| {
            IslandError::Reveal(format!("<{}> is not a template", self.0.tag_name().to_lowercase()))
        })?;
        self.0
            .replace_with_with_node_1(&template.content())
            .map_err(|error| IslandError::Reveal(format!("{error:?}")))
    }
}

/// Escape `:` so prefixed attribute names work inside a CSS selector.
fn escape_attribute(attribute: &str) -> String {
    attribute.replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_is_escaped() {
        assert_eq!(escape_attribute("client:only"), "client\\:only");
        assert_eq!(escape_attribute("data-island"), "data-island");
    }
}
