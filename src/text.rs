//! Text blocks and fragments extracted from regions.
//!
//! A region holds zero or more text blocks (one per speech bubble / text box).
//! Each block is a sequence of text nodes laid end to end; fragments record
//! where each node sits inside the block's concatenated text so results from
//! the analysis channel can be mapped back onto the owning nodes.

pub mod normalize;

pub use normalize::{Normalizer, Replacement};

use serde::{Deserialize, Serialize};

use crate::region::NodeId;

/// Raw text node as reported by the host, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    pub node: NodeId,
    pub text: String,
    /// Node carries inline reading aids (ruby annotations)
    #[serde(default)]
    pub ruby: bool,
}

impl TextNode {
    pub fn new(node: NodeId, text: impl Into<String>) -> Self {
        Self {
            node,
            text: text.into(),
            ruby: false,
        }
    }
}

/// Span of one text node inside a block.
///
/// Offsets count UTF-16 code units of the normalized text, so a character
/// outside the Basic Multilingual Plane takes two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    pub has_ruby: bool,
}

/// Ordered fragments of one text-bearing substructure plus their text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextBlock {
    fragments: Vec<Fragment>,
    text: String,
}

impl TextBlock {
    /// Build a block from raw nodes.
    ///
    /// Each node's text is normalized first; `rewrite` is called for every
    /// node whose text changed so the host can store the normalized form.
    pub fn from_nodes(
        nodes: Vec<TextNode>,
        normalizer: &Normalizer,
        mut rewrite: impl FnMut(NodeId, &str),
    ) -> Self {
        let mut fragments = Vec::with_capacity(nodes.len());
        let mut text = String::new();
        let mut offset = 0;

        for node in nodes {
            let normalized = normalizer.apply(&node.text);
            if normalized != node.text {
                rewrite(node.node, &normalized);
            }

            let length = normalized.encode_utf16().count();
            let start = offset;
            offset += length;

            fragments.push(Fragment {
                node: node.node,
                start,
                end: offset,
                length,
                has_ruby: node.ruby,
            });
            text.push_str(&normalized);
        }

        Self { fragments, text }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, text: &str) -> TextNode {
        TextNode::new(NodeId(id), text)
    }

    #[test]
    fn fragments_are_laid_end_to_end() {
        let block = TextBlock::from_nodes(
            vec![node(1, "こんにちは"), node(2, "世界")],
            &Normalizer::default(),
            |_, _| panic!("nothing to rewrite"),
        );

        let fragments = block.fragments();
        assert_eq!(fragments.len(), 2);
        assert_eq!((fragments[0].start, fragments[0].end, fragments[0].length), (0, 5, 5));
        assert_eq!((fragments[1].start, fragments[1].end, fragments[1].length), (5, 7, 2));
        assert_eq!(block.text(), "こんにちは世界");
    }

    #[test]
    fn offsets_use_normalized_text_and_rewrite_changed_nodes() {
        let mut rewrites = Vec::new();
        let block = TextBlock::from_nodes(
            vec![node(1, "．．．test"), node(2, "ok")],
            &Normalizer::default(),
            |node, text| rewrites.push((node, text.to_string())),
        );

        assert_eq!(rewrites, vec![(NodeId(1), "…test".to_string())]);
        assert_eq!(block.fragments()[0].length, 5);
        assert_eq!(block.fragments()[1].start, 5);
        assert_eq!(block.text(), "…testok");
    }

    #[test]
    fn astral_characters_take_two_code_units() {
        let block = TextBlock::from_nodes(
            vec![node(1, "𠮟る"), node(2, "な")],
            &Normalizer::default(),
            |_, _| {},
        );

        assert_eq!(block.fragments()[0].length, 3);
        assert_eq!((block.fragments()[1].start, block.fragments()[1].end), (3, 4));
    }

    #[test]
    fn ruby_flag_is_carried_to_fragment() {
        let mut annotated = node(3, "漢字");
        annotated.ruby = true;
        let block = TextBlock::from_nodes(vec![annotated], &Normalizer::default(), |_, _| {});
        assert!(block.fragments()[0].has_ruby);
    }

    #[test]
    fn empty_node_list_gives_empty_block() {
        let block = TextBlock::from_nodes(Vec::new(), &Normalizer::default(), |_, _| {});
        assert!(block.is_empty());
        assert_eq!(block.text(), "");
    }
}
