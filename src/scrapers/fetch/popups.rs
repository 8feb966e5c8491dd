//! Popup, overlay and modal removal.
//!
//! This is a regex heuristic, not a DOM pass: each pattern removes from an
//! opening `<div>` whose class mentions the keyword up to the first closing
//! `</div>`, so nested markup inside a popup can leave stray fragments. It is
//! good enough to stop consent interstitials from hiding the page content.

use std::sync::LazyLock;

use regex::Regex;

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["popup", "overlay", "modal"]
        .iter()
        .map(|keyword| {
            Regex::new(&format!(
                r#"(?i)<div[^>]*class="[^"]*{keyword}[^"]*"[^>]*>[\s\S]*?</div>"#
            ))
            .expect("valid popup regex")
        })
        .collect()
});

/// Markers of a "click OK to continue" interstitial.
const OK_BUTTON_MARKERS: &[&str] = &[r#"class="ok-button""#, r#"id="ok-button""#, r#"button class="ok""#];

/// Remove popup, overlay and modal `<div>` blocks.
pub fn strip_popups(html: &str) -> String {
    let mut out = html.to_string();
    for pattern in PATTERNS.iter() {
        if pattern.is_match(&out) {
            out = pattern.replace_all(&out, "").into_owned();
        }
    }
    out
}

/// Whether the page shows an OK-button interstitial.
pub fn has_ok_button(html: &str) -> bool {
    OK_BUTTON_MARKERS.iter().any(|m| html.contains(m))
}

/// Remove only `popup` blocks, and only when an OK button is present.
///
/// Used by the server relay, which leaves the heavier overlay/modal pass to
/// the fetching side.
pub fn strip_ok_popup(html: &str) -> String {
    if !has_ok_button(html) {
        return html.to_string();
    }
    PATTERNS[0].replace_all(html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_each_kind() {
        let html = r#"<body><div class="cookie-popup">Accept?</div><p>keep</p><div class="Site-Overlay dark">x</div><div id="m" class="modal fade">y</div></body>"#;
        assert_eq!(strip_popups(html), "<body><p>keep</p></body>");
    }

    #[test]
    fn test_leaves_unrelated_divs() {
        let html = r#"<div class="content">hello</div>"#;
        assert_eq!(strip_popups(html), html);
    }

    #[test]
    fn test_ok_popup_requires_button() {
        let plain = r#"<div class="popup">x</div>"#;
        assert_eq!(strip_ok_popup(plain), plain);

        let with_button = r#"<div class="popup">Age check</div><button class="ok">OK</button>"#;
        assert_eq!(strip_ok_popup(with_button), r#"<button class="ok">OK</button>"#);
    }
}
