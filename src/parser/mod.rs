pub mod blocks;
pub mod nodes;
pub mod options;
pub mod record;

use scraper::Html;

use blocks::QuestionBlock;

/// Parse one page and snapshot its question blocks.
pub fn parse_page(html: &str) -> Vec<QuestionBlock> {
    let doc = Html::parse_document(html);
    blocks::extract_blocks(&doc).collect()
}
