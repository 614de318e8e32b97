use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::nodes::{self, collapse_ws, Element, Node};

static QUESTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.lead").unwrap());

const QUESTION_CLASS: &str = "lead";
const ANSWER_LIST_CLASS: &str = "rounded-list";

/// One question as found on the page: the content before its answer
/// container, plus the answer list itself.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBlock {
    pub leading: Vec<Node>,
    pub answers: Option<Element>,
}

impl QuestionBlock {
    /// Question text: tokens trimmed, space-joined, whitespace collapsed.
    pub fn text(&self) -> String {
        let tokens: Vec<String> = self
            .leading
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.trim().to_string()),
                Node::LineBreak => Some(" ".to_string()),
                Node::Image(_) => None,
                Node::Element(el) => Some(el.text().trim().to_string()),
            })
            .filter(|t| !t.is_empty())
            .collect();
        collapse_ws(&tokens.join(" "))
    }

    /// `src` of the first image in the leading segment. Only the first
    /// `<img>` is considered, even when it has no usable `src`.
    pub fn image_ref(&self) -> Option<&str> {
        self.leading
            .iter()
            .find_map(|node| match node {
                Node::Image(src) => Some(src.as_deref()),
                _ => None,
            })
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Lazily yield every question block on the page, in document order.
/// Calling it again on the same document starts over.
pub fn extract_blocks(doc: &Html) -> impl Iterator<Item = QuestionBlock> + '_ {
    doc.select(&QUESTION_SEL).map(block_from_paragraph)
}

fn block_from_paragraph(para: ElementRef<'_>) -> QuestionBlock {
    let snap = nodes::snapshot(para);

    let leading = snap
        .children
        .iter()
        .take_while(|node| !is_boundary(node))
        .cloned()
        .collect();

    // HTML5 tree building closes <p> as soon as a <div> or <ol> opens, so the
    // list normally lands in the siblings after the paragraph.
    let answers = snap
        .find(&is_answer_list)
        .cloned()
        .or_else(|| find_in_following(para));

    QuestionBlock { leading, answers }
}

fn find_in_following(para: ElementRef<'_>) -> Option<Element> {
    para.next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(|el| !starts_next_question(el))
        .find_map(|el| nodes::snapshot(el).find(&is_answer_list).cloned())
}

/// The sibling is the next question, or a wrapper holding one.
fn starts_next_question(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    (value.name() == "p" && value.classes().any(|c| c == QUESTION_CLASS))
        || el.select(&QUESTION_SEL).next().is_some()
}

fn is_answer_list(el: &Element) -> bool {
    el.is("ol") && el.has_class(ANSWER_LIST_CLASS)
}

fn is_boundary(node: &Node) -> bool {
    matches!(node, Node::Element(el) if el.is("div") || el.is("ol") || el.is("ul"))
}
