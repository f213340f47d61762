//! Narration script generation.
//!
//! Scripts come from an optional [`TextGenerator`]; whenever generation fails
//! or returns nothing, the configured template is used instead, so a stored
//! script always has content.

mod chat;
mod config;
mod traits;
mod writer;

pub use chat::ChatCompletionGenerator;
pub use config::{GeneratorConfig, ScriptConfig};
pub use traits::{TextGenError, TextGenerator};
pub use writer::{ScriptReport, ScriptWriter};

use crate::session::LiveProduct;

/// Fallback narration used when no generated text is available.
pub const DEFAULT_TEMPLATE: &str =
    "Next up: {title} from {shop}, now only {price}. Tap the cart below to grab yours!";

/// Prompt sent to the text generator.
pub const DEFAULT_PROMPT: &str = "Write a lively 60-second live-stream sales pitch for the product \"{title}\" sold by {shop} at {price}. Plain text, no markdown.";

/// Substitute product fields into a template.
pub fn render_fallback(template: &str, product: Option<&LiveProduct>) -> String {
    let (title, shop, price) = match product {
        Some(p) => (p.title.as_str(), p.shop_name.as_str(), p.price.as_str()),
        None => ("this product", "our shop", "a special price"),
    };
    template
        .replace("{title}", title)
        .replace("{shop}", shop)
        .replace("{price}", price)
}

/// Render a narration script from `template`. A template that renders blank
/// is replaced by [`DEFAULT_TEMPLATE`].
pub fn render_script(template: &str, product: Option<&LiveProduct>) -> String {
    let text = render_fallback(template, product);
    if text.trim().is_empty() {
        render_fallback(DEFAULT_TEMPLATE, product)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_product() {
        let product = LiveProduct {
            sku: "1".to_string(),
            title: "Kettle".to_string(),
            image_url: String::new(),
            price: "59.00".to_string(),
            shop_name: "Home".to_string(),
        };
        assert_eq!(
            render_fallback("{title}|{shop}|{price}", Some(&product)),
            "Kettle|Home|59.00"
        );
    }

    #[test]
    fn test_render_script_replaces_blank_template() {
        assert_eq!(render_script("  ", None), render_fallback(DEFAULT_TEMPLATE, None));
        assert_eq!(render_script("Buy {title}", None), "Buy this product");
    }

    #[test]
    fn test_render_without_product_is_not_empty() {
        let text = render_fallback(DEFAULT_TEMPLATE, None);
        assert!(text.contains("this product"));
    }
}
