// src/think.rs

use once_cell::sync::Lazy;
use regex::Regex;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Separator placed between independent reasoning blocks.
pub const REASONING_SEPARATOR: &str = "\n\n---\n\n";

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think block regex"));
static STRAY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?think>").expect("valid think tag regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkSplit {
    pub content: String,
    pub reasoning_content: String,
}

fn join_reasoning(existing: &str, addition: &str) -> String {
    match (existing.is_empty(), addition.is_empty()) {
        (false, false) => format!("{existing}{REASONING_SEPARATOR}{addition}"),
        (true, _) => addition.to_string(),
        (false, true) => existing.to_string(),
    }
}

/// Moves every closed `<think>…</think>` block out of `content` and appends
/// it to `reasoning_content`. Text without an opening tag is returned as is.
pub fn process_think_tags(content: &str, reasoning_content: &str) -> ThinkSplit {
    if content.is_empty() || !content.contains(OPEN_TAG) {
        return ThinkSplit {
            content: content.to_string(),
            reasoning_content: reasoning_content.to_string(),
        };
    }

    let mut thoughts = Vec::new();
    let mut reply = String::with_capacity(content.len());
    let mut last = 0;

    for caps in THINK_BLOCK.captures_iter(content) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        reply.push_str(&content[last..whole.start()]);
        thoughts.push(inner.as_str());
        last = whole.end();
    }
    reply.push_str(&content[last..]);

    let reply = STRAY_TAG.replace_all(&reply, "");

    ThinkSplit {
        content: reply.trim().to_string(),
        reasoning_content: join_reasoning(reasoning_content, &thoughts.join(REASONING_SEPARATOR)),
    }
}

/// Like [`process_think_tags`], but first treats a trailing `<think>` that
/// has not been closed yet as reasoning in progress.
pub fn process_incomplete_think_tags(content: &str, reasoning_content: &str) -> ThinkSplit {
    if content.is_empty() {
        return ThinkSplit {
            content: String::new(),
            reasoning_content: reasoning_content.to_string(),
        };
    }

    let Some(last_open) = content.rfind(OPEN_TAG) else {
        return process_think_tags(content, reasoning_content);
    };

    let fragment = &content[last_open..];
    if fragment.contains(CLOSE_TAG) {
        return process_think_tags(content, reasoning_content);
    }

    let unclosed = fragment[OPEN_TAG.len()..].trim();
    let reasoning = join_reasoning(reasoning_content, unclosed);
    process_think_tags(&content[..last_open], &reasoning)
}

/// True once every `<think>` seen so far has a matching `</think>`.
pub fn think_tags_closed(content: &str) -> bool {
    if !content.contains(CLOSE_TAG) {
        return false;
    }
    let opens = content.matches(OPEN_TAG).count();
    let closes = content.matches(CLOSE_TAG).count();
    opens > 0 && closes >= opens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_tags_is_untouched() {
        for s in ["", "plain", "  padded  ", "has </think> only"] {
            let out = process_think_tags(s, "prior");
            assert_eq!(out.content, s);
            assert_eq!(out.reasoning_content, "prior");
        }
    }

    #[test]
    fn closed_block_moves_to_reasoning() {
        let out = process_think_tags("A<think>B</think>C", "");
        assert_eq!(out.content, "AC");
        assert_eq!(out.reasoning_content, "B");
    }

    #[test]
    fn multiple_blocks_join_with_separator() {
        let out = process_think_tags("<think>one</think> mid <think>two</think> end", "zero");
        assert_eq!(out.content, "mid  end");
        assert_eq!(out.reasoning_content, "zero\n\n---\n\none\n\n---\n\ntwo");
    }

    #[test]
    fn multiline_reasoning_is_captured() {
        let out = process_think_tags("<think>line1\nline2</think>\nanswer", "");
        assert_eq!(out.content, "answer");
        assert_eq!(out.reasoning_content, "line1\nline2");
    }

    #[test]
    fn unterminated_tag_becomes_reasoning() {
        let out = process_incomplete_think_tags("A<think>partial", "");
        assert_eq!(out.content, "A");
        assert_eq!(out.reasoning_content, "partial");
    }

    #[test]
    fn unterminated_after_closed_block() {
        let out = process_incomplete_think_tags("<think>x</think>reply<think> more ", "r");
        assert_eq!(out.content, "reply");
        assert_eq!(out.reasoning_content, "r\n\n---\n\nmore\n\n---\n\nx");
    }

    #[test]
    fn incomplete_on_empty_keeps_reasoning() {
        let out = process_incomplete_think_tags("", "r");
        assert_eq!(out.content, "");
        assert_eq!(out.reasoning_content, "r");
    }

    #[test]
    fn closure_detection_counts_tags() {
        assert!(!think_tags_closed("<think>still going"));
        assert!(think_tags_closed("<think>done</think>answer"));
        assert!(!think_tags_closed("<think>a</think><think>b"));
        assert!(!think_tags_closed("plain"));
    }
}
