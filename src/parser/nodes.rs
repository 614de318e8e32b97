//! Owned snapshot of the DOM fragments the extractors care about.
//!
//! `scraper::Html` borrows from itself and is not `Send`, so each question is
//! copied into this small tree before any network work happens.

use scraper::{ElementRef, Node as DomNode};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    LineBreak,
    /// `<img>`; `None` when the tag has no `src`.
    Image(Option<String>),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn is_list(&self) -> bool {
        self.is("ol") || self.is("ul") || self.is("li")
    }

    /// Depth-first search, starting with `self`.
    pub fn find(&self, pred: &impl Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Node::Element(el) => el.find(pred),
            _ => None,
        })
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Concatenated descendant text, line breaks as spaces, images dropped.
    pub fn text(&self) -> String {
        let mut out = String::new();
        push_text(&self.children, &mut out, &|_: &Element| true);
        out
    }

    /// Like [`Element::text`] but never descends into nested lists.
    pub fn text_without_lists(&self) -> String {
        let mut out = String::new();
        push_text(&self.children, &mut out, &|el: &Element| !el.is_list());
        out
    }
}

fn push_text(nodes: &[Node], out: &mut String, descend: &impl Fn(&Element) -> bool) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::LineBreak => out.push(' '),
            Node::Image(_) => {}
            Node::Element(el) if descend(el) => push_text(&el.children, out, descend),
            Node::Element(_) => {}
        }
    }
}

/// Copy a parsed element and its subtree. Comments and doctypes are dropped.
pub fn snapshot(el: ElementRef<'_>) -> Element {
    let value = el.value();
    let children = el
        .children()
        .filter_map(|child| match child.value() {
            DomNode::Text(t) => Some(Node::Text((&*t.text).to_string())),
            DomNode::Element(_) => ElementRef::wrap(child).map(snapshot_child),
            _ => None,
        })
        .collect();

    Element {
        tag: value.name().to_string(),
        attrs: value
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children,
    }
}

fn snapshot_child(el: ElementRef<'_>) -> Node {
    match el.value().name() {
        "br" => Node::LineBreak,
        "img" => Node::Image(el.value().attr("src").map(str::to_string)),
        _ => Node::Element(snapshot(el)),
    }
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first(html: &str, css: &str) -> Element {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse(css).unwrap();
        snapshot(doc.select(&sel).next().unwrap())
    }

    #[test]
    fn breaks_and_images() {
        let el = first(r#"<span>one<br>two <img src="/a.png"> three</span>"#, "span");
        assert_eq!(
            el.children,
            vec![
                Node::Text("one".into()),
                Node::LineBreak,
                Node::Text("two ".into()),
                Node::Image(Some("/a.png".into())),
                Node::Text(" three".into()),
            ]
        );
        assert_eq!(collapse_ws(&el.text()), "one two three");
    }

    #[test]
    fn classes_and_attrs() {
        let el = first(r#"<ol class="rounded-list big" data-x="1"><li>a</li></ol>"#, "ol");
        assert!(el.has_class("rounded-list"));
        assert!(el.has_class("big"));
        assert!(!el.has_class("rounded"));
        assert_eq!(el.attr("data-x"), Some("1"));
    }

    #[test]
    fn text_skips_nested_lists() {
        let el = first("<li>Top <b>bold</b><ul><li>inner</li></ul></li>", "li");
        assert_eq!(collapse_ws(&el.text_without_lists()), "Top bold");
        assert_eq!(collapse_ws(&el.text()), "Top boldinner");
    }

    #[test]
    fn find_descends() {
        let el = first(r#"<div><section><ol class="rounded-list"></ol></section></div>"#, "div");
        assert!(el.find(&|e: &Element| e.has_class("rounded-list")).is_some());
        assert!(el.find(&|e: &Element| e.is("table")).is_none());
    }

    #[test]
    fn collapse() {
        assert_eq!(collapse_ws("  a \n\t b  "), "a b");
        assert_eq!(collapse_ws("   "), "");
    }
}
