//! Small DOM helpers shared by the page and field parsers.

use scraper::{ElementRef, Html, Selector};

/// Parse a selector from static source text.
///
/// Only used for literals in this crate; a malformed literal is a programming
/// error caught by the parser tests.
pub(crate) fn static_selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("valid built-in selector")
}

/// Parse a user-supplied selector, logging and returning `None` when invalid.
pub(crate) fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!("Ignoring invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

/// Concatenated text content with surrounding whitespace trimmed.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text content with every whitespace run collapsed to one space.
pub(crate) fn collapsed_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed text of the first descendant matching `sel`, or "".
pub(crate) fn first_text(scope: ElementRef<'_>, sel: &Selector) -> String {
    scope.select(sel).next().map(text_of).unwrap_or_default()
}

/// Trimmed text of the first match in a whole document, or "".
pub(crate) fn doc_first_text(doc: &Html, sel: &Selector) -> String {
    doc.select(sel).next().map(text_of).unwrap_or_default()
}

/// Nearest element matching `sel`, starting with `el` itself.
pub(crate) fn closest<'a>(el: ElementRef<'a>, sel: &Selector) -> Option<ElementRef<'a>> {
    if sel.matches(&el) {
        return Some(el);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| sel.matches(ancestor))
}

/// Icon identifier referenced by the first `<use>` element under `el`.
///
/// Sprite references look like `#bonus_ico_freespins` or
/// `/sprite.svg#bonus_ico_freespins`; only the fragment is returned. Inside
/// inline SVG the parser namespaces `xlink:href`, so attributes are matched on
/// their local name.
pub(crate) fn icon_ref(el: ElementRef<'_>, use_sel: &Selector) -> Option<String> {
    let use_el = el.select(use_sel).next()?;
    let href = use_el
        .value()
        .attrs()
        .find(|(name, _)| *name == "href" || name.ends_with(":href"))
        .map(|(_, value)| value)?;
    let id = href.rsplit('#').next().unwrap_or(href).trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Outer HTML of every match, concatenated in document order.
///
/// Used to scope a field parser to its container. No match yields "".
pub(crate) fn outer_html_all(doc: &Html, sel: &Selector) -> String {
    doc.select(sel).map(|el| el.html()).collect()
}

/// Non-empty, trimmed attribute value.
pub(crate) fn attr_nonempty(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_ref_inside_svg() {
        let html = Html::parse_fragment(
            r##"<div class="line"><svg><use xlink:href="#bonus_ico_freespins"></use></svg></div>"##,
        );
        let line = html.select(&static_selector(".line")).next().unwrap();
        assert_eq!(
            icon_ref(line, &static_selector("use")).as_deref(),
            Some("bonus_ico_freespins")
        );
    }

    #[test]
    fn test_icon_ref_with_sprite_path() {
        let html = Html::parse_fragment(
            r#"<div class="line"><use href="/img/sprite.svg#base_ui_ico_info"></use></div>"#,
        );
        let line = html.select(&static_selector(".line")).next().unwrap();
        assert_eq!(
            icon_ref(line, &static_selector("use")).as_deref(),
            Some("base_ui_ico_info")
        );
    }

    #[test]
    fn test_closest_includes_self_and_ancestors() {
        let html = Html::parse_fragment(
            r#"<section class="outer"><div class="inner"><span class="leaf">x</span></div></section>"#,
        );
        let leaf = html.select(&static_selector(".leaf")).next().unwrap();
        let outer = closest(leaf, &static_selector(".outer")).unwrap();
        assert_eq!(outer.value().name(), "section");
        assert!(closest(leaf, &static_selector(".leaf")).is_some());
        assert!(closest(leaf, &static_selector(".missing")).is_none());
    }

    #[test]
    #[should_panic(expected = "valid built-in selector")]
    fn test_malformed_static_selector_panics_with_message() {
        static_selector("div[");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c "), "a b c");
    }
}
