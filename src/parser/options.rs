use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::nodes::{collapse_ws, Element};

/// Positional answer label, assigned in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Label {
    pub const ALL: [Label; 6] = [Label::A, Label::B, Label::C, Label::D, Label::E, Label::F];

    pub fn as_char(self) -> char {
        match self {
            Label::A => 'A',
            Label::B => 'B',
            Label::C => 'C',
            Label::D => 'D',
            Label::E => 'E',
            Label::F => 'F',
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Label::A),
            "B" => Ok(Label::B),
            "C" => Ok(Label::C),
            "D" => Ok(Label::D),
            "E" => Ok(Label::E),
            "F" => Ok(Label::F),
            other => Err(format!("not an answer label: {:?}", other)),
        }
    }
}

/// Parse `"A, c"` style label lists into a sorted set.
pub fn parse_labels(s: &str) -> Result<BTreeSet<Label>, String> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(Label::from_str)
        .collect()
}

/// Comma-joined labels in ascending order, e.g. `"A,C"`.
pub fn join_labels(labels: &BTreeSet<Label>) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedOptions {
    pub options: BTreeMap<Label, String>,
    pub correct: BTreeSet<Label>,
}

const CORRECT_ATTR: &str = "data-correct";

/// Walk the `<li>` children of an answer list and label the non-empty ones.
pub fn parse_options(list: Option<&Element>) -> ParsedOptions {
    let mut parsed = ParsedOptions::default();
    let Some(list) = list else {
        return parsed;
    };

    let mut labels = Label::ALL.iter().copied();
    for li in list.child_elements().filter(|el| el.is("li")) {
        let text = collapse_ws(&li.text_without_lists());
        if text.is_empty() {
            continue;
        }
        let Some(label) = labels.next() else {
            break;
        };
        if is_marked_correct(li) {
            parsed.correct.insert(label);
        }
        parsed.options.insert(label, text);
    }

    parsed
}

fn is_marked_correct(li: &Element) -> bool {
    li.attr(CORRECT_ATTR)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::blocks::extract_blocks;
    use scraper::Html;

    fn parse_list(html: &str) -> ParsedOptions {
        let doc = Html::parse_document(&format!(r#"<p class="lead">Q</p><div>{}</div>"#, html));
        let block = extract_blocks(&doc).next().unwrap();
        parse_options(block.answers.as_ref())
    }

    #[test]
    fn empty_option_consumes_no_label() {
        let p = parse_list(
            r#"<ol class="rounded-list">
                 <li data-correct="True">Yes (correct)</li>
                 <li data-correct="False"></li>
                 <li data-correct="False">No</li>
               </ol>"#,
        );
        assert_eq!(p.options.len(), 2);
        assert_eq!(p.options[&Label::A], "Yes (correct)");
        assert_eq!(p.options[&Label::B], "No");
        assert_eq!(p.correct, BTreeSet::from([Label::A]));
    }

    #[test]
    fn absent_list_yields_nothing() {
        let p = parse_options(None);
        assert!(p.options.is_empty());
        assert!(p.correct.is_empty());
    }

    #[test]
    fn caps_at_six_labels() {
        let items: String = (1..=8)
            .map(|i| format!(r#"<li data-correct="True">opt {}</li>"#, i))
            .collect();
        let p = parse_list(&format!(r#"<ol class="rounded-list">{}</ol>"#, items));
        assert_eq!(p.options.keys().copied().collect::<Vec<_>>(), Label::ALL.to_vec());
        assert_eq!(p.options[&Label::F], "opt 6");
        assert_eq!(p.correct.len(), 6);
    }

    #[test]
    fn fixture_multiple_correct() {
        let html = std::fs::read_to_string("tests/fixtures/page.html").unwrap();
        let doc = Html::parse_document(&html);
        let blocks: Vec<_> = extract_blocks(&doc).collect();

        let first = parse_options(blocks[0].answers.as_ref());
        assert_eq!(first.options.len(), 4);
        assert_eq!(first.options[&Label::A], "Amazon S3");
        assert_eq!(first.options[&Label::C], "Amazon EC2 instance store");
        assert_eq!(first.correct, BTreeSet::from([Label::A]));

        let third = parse_options(blocks[2].answers.as_ref());
        assert_eq!(third.options.len(), 6);
        assert_eq!(third.options[&Label::C], "Right-size instances");
        assert_eq!(third.options[&Label::E], "Delete unattached EBS volumes");
        assert_eq!(third.correct, BTreeSet::from([Label::A, Label::C, Label::E]));
    }

    #[test]
    fn missing_marker_is_not_correct() {
        let p = parse_list(r#"<ol class="rounded-list"><li>a</li><li data-correct="yes">b</li></ol>"#);
        assert_eq!(p.options.len(), 2);
        assert!(p.correct.is_empty());
    }

    #[test]
    fn label_round_trip_text() {
        assert_eq!(parse_labels("c, a").unwrap(), BTreeSet::from([Label::A, Label::C]));
        assert!(parse_labels("A,G").is_err());
        assert_eq!(join_labels(&BTreeSet::from([Label::D, Label::B])), "B,D");
    }
}
