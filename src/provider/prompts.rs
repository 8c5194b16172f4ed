//! System prompt table.
//!
//! Requests may name a prompt via `prompt_type`; unknown or absent names
//! resolve to the default entry.

/// Name of the entry that must always exist.
pub const DEFAULT_PROMPT: &str = "default";

const PROMPTS: &[(&str, &str)] = &[
    (
        "default",
        "You are a helpful shopping assistant for an online storefront. \
         Answer questions about products, orders, and policies. Use the \
         available tools to look up live data instead of guessing; if a \
         tool fails, say what you could not find out. Keep answers short \
         and concrete.",
    ),
    (
        "product_discovery",
        "You help shoppers find products in this storefront's catalog. \
         Search the catalog with the available tools before recommending \
         anything, and only recommend items the search actually returned. \
         Ask one clarifying question when the request is too vague to \
         search.",
    ),
    (
        "customer_support",
        "You are a support assistant for this storefront's customers. Use \
         the customer-account tools to look up orders, shipments, and \
         returns for the signed-in customer. Never invent order details; \
         if the tools cannot answer, direct the customer to human support.",
    ),
];

/// Resolve a prompt by name, falling back to the default entry for unknown
/// or absent selectors.
pub fn resolve(selector: Option<&str>) -> &'static str {
    let name = selector.unwrap_or(DEFAULT_PROMPT);
    lookup(name).unwrap_or_else(|| {
        lookup(DEFAULT_PROMPT).expect("prompt table must contain a default entry")
    })
}

fn lookup(name: &str) -> Option<&'static str> {
    PROMPTS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, text)| *text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_entry_exists() {
        assert!(lookup(DEFAULT_PROMPT).is_some());
    }

    #[test]
    fn test_named_prompt_resolves() {
        let text = resolve(Some("customer_support"));
        assert!(text.contains("support"));
        assert_ne!(text, resolve(None));
    }

    #[test]
    fn test_unknown_selector_falls_back_to_default() {
        assert_eq!(resolve(Some("no_such_prompt")), resolve(None));
        assert_eq!(resolve(None), lookup(DEFAULT_PROMPT).unwrap());
    }
}
