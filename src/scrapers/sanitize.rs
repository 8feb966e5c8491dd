//! Whitelist HTML sanitizer for description fragments.
//!
//! The container's inner HTML is re-serialized keeping only a small set of
//! formatting tags. Unknown elements are unwrapped (their children kept),
//! executable or invisible elements are dropped with their content, and every
//! attribute except `a[href]` and `img[src|alt]` is removed.
//!
//! An allowed element is also unwrapped when the HTML parser would close or
//! split it on re-parse (a block inside an open `<p>`, nested headings,
//! nested links, an `<li>` directly inside an `<li>`), so the output parses
//! back to the same tree.

use scraper::{ElementRef, Html, Node};

use super::dom::parse_selector;

const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "a", "img", "p", "ul", "ol", "li", "strong", "em", "b", "i", "br",
];

/// Elements removed together with everything inside them.
const DROPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "iframe", "object"];

const VOID_TAGS: &[&str] = &["br", "img"];

/// Allowed tags whose start tag closes an open `<p>`.
const CLOSES_P: &[&str] = &["p", "ul", "ol", "li", "h1", "h2", "h3", "h4"];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4"];

/// Elements already emitted around the current write position.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    in_p: bool,
    in_heading: bool,
    in_link: bool,
    /// Inside an `<li>` with no list opened since.
    in_bare_li: bool,
}

impl Scope {
    /// Whether emitting `tag` here would be reshaped by the parser.
    fn conflicts(&self, tag: &str) -> bool {
        (self.in_p && CLOSES_P.contains(&tag))
            || (self.in_heading && HEADINGS.contains(&tag))
            || (self.in_link && tag == "a")
            || (self.in_bare_li && tag == "li")
    }

    fn enter(mut self, tag: &str) -> Self {
        match tag {
            "p" => self.in_p = true,
            "a" => self.in_link = true,
            "li" => self.in_bare_li = true,
            "ul" | "ol" => self.in_bare_li = false,
            t if HEADINGS.contains(&t) => {
                self.in_heading = true;
                self.in_bare_li = false;
            }
            _ => {}
        }
        self
    }
}

/// Sanitize the first element matching `container_selector`.
///
/// Returns the cleaned inner HTML, or an empty string when the container is
/// missing or the selector is invalid. Running the function again on its own
/// output (wrapped in any container) yields the same string.
pub fn sanitize_fragment(html: &str, container_selector: &str) -> String {
    let Some(selector) = parse_selector(container_selector) else {
        return String::new();
    };
    let doc = Html::parse_document(html);
    match doc.select(&selector).next() {
        Some(container) => sanitize_children(container),
        None => String::new(),
    }
}

/// Sanitize the children of an already-selected element.
pub fn sanitize_children(container: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_children(container, Scope::default(), &mut out);
    out
}

fn write_children(el: ElementRef<'_>, scope: Scope, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(&text.text)),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    write_element(child_el, scope, out);
                }
            }
            // Comments, doctypes and processing instructions.
            _ => {}
        }
    }
}

fn write_element(el: ElementRef<'_>, scope: Scope, out: &mut String) {
    let name = el.value().name();

    if DROPPED_TAGS.contains(&name) {
        return;
    }
    if !ALLOWED_TAGS.contains(&name) || scope.conflicts(name) {
        write_children(el, scope, out);
        return;
    }

    out.push('<');
    out.push_str(name);
    for attr in allowed_attrs(name) {
        if let Some(value) = el.value().attr(attr) {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }

    write_children(el, scope.enter(name), out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn allowed_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href"],
        "img" => &["src", "alt"],
        _ => &[],
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
