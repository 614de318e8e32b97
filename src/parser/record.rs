use std::collections::{BTreeMap, BTreeSet};

use super::blocks::QuestionBlock;
use super::options::{join_labels, Label};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Absolute when the page URL allowed resolving it.
    pub url: String,
    /// Present only when a download was requested and succeeded.
    pub data: Option<Vec<u8>>,
    pub mime_type: Option<String>,
}

impl ImageData {
    pub fn url_only(url: String) -> Self {
        ImageData {
            url,
            data: None,
            mime_type: None,
        }
    }
}

/// One normalized question, ready to be written to its topic table.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub topic: String,
    pub table_id: String,
    pub text: String,
    pub image: Option<ImageData>,
    pub options: BTreeMap<Label, String>,
    /// Never empty, always a subset of `options`' keys.
    pub correct_labels: BTreeSet<Label>,
    pub page_number: u32,
}

impl QuestionRecord {
    pub fn answer(&self, label: Label) -> Option<&str> {
        self.options.get(&label).map(String::as_str)
    }

    pub fn correct_answers(&self) -> String {
        join_labels(&self.correct_labels)
    }
}

/// Merge the parts of one question into a record.
///
/// Returns `None` when no option is marked correct; nothing else rejects.
pub fn assemble(
    topic: &str,
    table_id: &str,
    block: &QuestionBlock,
    options: BTreeMap<Label, String>,
    correct_labels: impl IntoIterator<Item = Label>,
    image: Option<ImageData>,
    page_number: u32,
) -> Option<QuestionRecord> {
    let correct_labels: BTreeSet<Label> = correct_labels
        .into_iter()
        .filter(|l| options.contains_key(l))
        .collect();
    if correct_labels.is_empty() {
        return None;
    }

    Some(QuestionRecord {
        topic: topic.to_string(),
        table_id: table_id.to_string(),
        text: block.text(),
        image,
        options,
        correct_labels,
        page_number,
    })
}
