//! Deterministic chunking of doctrine records for embedding.
//!
//! A doctrine record's fields are assembled into a canonical text, then
//! packed into token-bounded chunks per retrieval lean (principles/rules →
//! support, warnings → counter, claims → neutral). The chunker is a pure
//! function of the record text and the ingestion version: the same record
//! always yields the same chunks with the same ids.

use fancy_regex::Regex as FancyRegex;
use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::types::{chunk_id, Chunk, DoctrineRecord, Lean, SourceSpan};

/// Token budget per chunk.
pub const DEFAULT_TARGET_TOKENS: usize = 240;
pub const DEFAULT_MAX_TOKENS: usize = 320;

static BPE: Lazy<CoreBPE> = Lazy::new(|| cl100k_base().expect("cl100k_base tokenizer"));

// Split after . ! ? followed by whitespace (lookbehind needs fancy-regex).
static SENTENCE_SPLIT: Lazy<FancyRegex> =
    Lazy::new(|| FancyRegex::new(r"(?<=[.!?])\s+").expect("sentence split regex"));

/// Resolved chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingParams {
    pub target_tokens: usize,
    pub max_tokens: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            target_tokens: DEFAULT_TARGET_TOKENS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Count tokens using the cl100k_base tokenizer.
pub fn count_tokens(text: &str) -> usize {
    BPE.encode_with_special_tokens(text).len()
}

/// Assemble the canonical doctrine text a record's chunks are sliced from.
/// Spans in the produced chunks index into this string.
pub fn doctrine_text(record: &DoctrineRecord) -> String {
    let mut out = String::new();
    for (header, items) in [
        ("PRINCIPLES", &record.principles),
        ("RULES", &record.rules),
        ("CLAIMS", &record.claims),
        ("WARNINGS", &record.warnings),
    ] {
        if items.is_empty() {
            continue;
        }
        out.push_str(header);
        out.push('\n');
        for item in items {
            out.push_str(item);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// One doctrine statement with its lean and its span in the assembled text.
#[derive(Debug, Clone)]
struct DoctrineLine {
    text: String,
    lean: Lean,
    start: usize,
    end: usize,
}

fn collect_lines(record: &DoctrineRecord, assembled: &str) -> Vec<DoctrineLine> {
    let mut lines = Vec::new();
    let mut cursor = 0;

    for (items, lean) in [
        (&record.principles, Lean::Support),
        (&record.rules, Lean::Support),
        (&record.claims, Lean::Neutral),
        (&record.warnings, Lean::Counter),
    ] {
        for item in items {
            // Each item occurs verbatim in the assembled text, in order.
            let start = assembled[cursor..]
                .find(item.as_str())
                .map(|pos| cursor + pos)
                .unwrap_or(cursor);
            let end = start + item.len();
            cursor = end;

            lines.push(DoctrineLine {
                text: item.clone(),
                lean,
                start,
                end,
            });
        }
    }

    lines
}

/// Split an overlong statement into sentences, falling back to the whole
/// text when no boundary exists.
fn split_sentences(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut last_end = 0;

    let mut finder = SENTENCE_SPLIT.find_iter(text);
    while let Some(Ok(m)) = finder.next() {
        if m.start() > last_end {
            let sentence = text[last_end..m.start()].trim();
            if !sentence.is_empty() {
                result.push(sentence.to_string());
            }
        }
        last_end = m.end();
    }
    if last_end < text.len() {
        let remaining = text[last_end..].trim();
        if !remaining.is_empty() {
            result.push(remaining.to_string());
        }
    }
    if result.is_empty() {
        result.push(text.to_string());
    }
    result
}

/// Chunk a doctrine record into embeddable units.
///
/// Statements of the same lean are greedily packed into chunks up to
/// `max_tokens`; a statement that alone exceeds the budget is split on
/// sentence boundaries first. Chunk domain is the record's primary domain;
/// records with no domains produce no chunks (they never pass validation).
pub fn chunk_record(record: &DoctrineRecord, params: &ChunkingParams) -> Vec<Chunk> {
    let Some(domain) = record.primary_domain() else {
        return Vec::new();
    };

    let assembled = doctrine_text(record);
    let lines = collect_lines(record, &assembled);

    // Expand overlong lines into sentence-level lines.
    let mut units: Vec<DoctrineLine> = Vec::new();
    for line in lines {
        if count_tokens(&line.text) <= params.max_tokens {
            units.push(line);
            continue;
        }
        let mut cursor = line.start;
        for sentence in split_sentences(&line.text) {
            let rel = assembled[cursor..]
                .find(sentence.as_str())
                .map(|pos| cursor + pos)
                .unwrap_or(cursor);
            let end = rel + sentence.len();
            cursor = end;
            units.push(DoctrineLine {
                text: sentence,
                lean: line.lean,
                start: rel,
                end,
            });
        }
    }

    let mut chunks = Vec::new();
    let mut i = 0;
    while i < units.len() {
        let lean = units[i].lean;
        let mut token_count = 0;
        let mut parts: Vec<&DoctrineLine> = Vec::new();

        while i < units.len() && units[i].lean == lean {
            let unit_tokens = count_tokens(&units[i].text);
            if !parts.is_empty() && token_count + unit_tokens > params.max_tokens {
                break;
            }
            token_count += unit_tokens;
            parts.push(&units[i]);
            i += 1;
            if token_count >= params.target_tokens {
                break;
            }
        }

        let text = parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let span = SourceSpan {
            start: parts.first().map(|p| p.start).unwrap_or(0),
            end: parts.last().map(|p| p.end).unwrap_or(0),
        };

        chunks.push(Chunk {
            chunk_id: chunk_id(&record.book_id, &text),
            book_id: record.book_id.clone(),
            chapter_index: record.chapter_index,
            domain,
            lean,
            text,
            source_span: span,
        });
    }

    chunks
}
