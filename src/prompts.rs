//! Prompt templates for the ingestion phases and minister synthesis.
//!
//! Domain logic for rendering structured-output prompts. Endpoint-agnostic;
//! every template demands strict JSON and nothing else.

use crate::types::{ChapterRecord, Domain, MinisterId};

use crate::gateway::Message;

/// Rendered prompt ready for the gateway.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

fn domain_list() -> String {
    Domain::ALL
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Phase-1: whole book → canonical chapters
// =============================================================================

pub fn phase1_structure(book_text: &str) -> PromptInstance {
    let system = "You are a document structurer. You receive the full text of a book \
                  and return its canonical chapter structure as strict JSON. You preserve \
                  the chapter text verbatim — never summarize, never paraphrase, never \
                  drop passages. Output only JSON."
        .to_string();

    let user = format!(
        "Split the following book into chapters.\n\n\
         OUTPUT (strict JSON):\n\
         {{\n\
           \"book_title\": \"string\",\n\
           \"author\": null,\n\
           \"chapters\": [\n\
             {{\"chapter_index\": 1, \"chapter_title\": \"string\", \"chapter_text\": \"string\"}}\n\
           ]\n\
         }}\n\n\
         Requirements:\n\
         - chapter_index values are dense 1..N in reading order\n\
         - chapter_text is the full verbatim text of the chapter, not a summary\n\
         - no empty titles, no empty texts\n\n\
         BOOK TEXT:\n{book_text}"
    );

    PromptInstance {
        template_slug: "phase1_structure_v1".into(),
        system,
        user,
    }
}

// =============================================================================
// Phase-2: one chapter → doctrine record
// =============================================================================

pub fn phase2_doctrine(chapter: &ChapterRecord) -> PromptInstance {
    let system = "You are a doctrine extractor. You receive one chapter of a book and \
                  distill its transferable doctrine: principles, rules, claims about \
                  reality, and warnings. You classify the chapter into 1-3 domains from \
                  a closed list. Output only JSON."
        .to_string();

    let user = format!(
        "Extract the doctrine from this chapter.\n\n\
         ALLOWED DOMAINS (choose 1-3, no other values): [{domains}]\n\n\
         OUTPUT (strict JSON):\n\
         {{\n\
           \"chapter_index\": {index},\n\
           \"chapter_title\": \"string\",\n\
           \"domains\": [\"domain\"],\n\
           \"principles\": [\"string\"],\n\
           \"rules\": [\"string\"],\n\
           \"claims\": [\"string\"],\n\
           \"warnings\": [\"string\"],\n\
           \"cross_references\": []\n\
         }}\n\n\
         Requirements:\n\
         - every list entry is a complete, self-contained statement\n\
         - cross_references contains chapter indices this chapter explicitly refers to\n\
         - no empty strings anywhere\n\n\
         CHAPTER {index}: {title}\n\n{text}",
        domains = domain_list(),
        index = chapter.chapter_index,
        title = chapter.title,
        text = chapter.text,
    );

    PromptInstance {
        template_slug: "phase2_doctrine_v1".into(),
        system,
        user,
    }
}

// =============================================================================
// Minister synthesis
// =============================================================================

/// A retrieved chunk formatted for the synthesis prompt.
pub struct PromptChunk<'a> {
    pub chunk_id: &'a str,
    pub book_id: &'a str,
    pub text: &'a str,
}

fn format_chunks(chunks: &[PromptChunk<'_>]) -> String {
    if chunks.is_empty() {
        return "None".into();
    }
    chunks
        .iter()
        .map(|c| {
            format!(
                "[{} | {}]\n{}",
                &c.chunk_id[..c.chunk_id.len().min(12)],
                c.book_id,
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn minister_synthesis(
    minister: MinisterId,
    situation: &str,
    support: &[PromptChunk<'_>],
    counter: &[PromptChunk<'_>],
    neutral: &[PromptChunk<'_>],
) -> PromptInstance {
    let system = format!(
        "You are the {minister} minister of a decision council. You produce one \
         structured position grounded ONLY in the retrieved doctrine below. You never \
         invent doctrine, never use outside knowledge, and never use narrative or \
         courtly phrasing — no \"I believe\", no \"respectfully\", no \"honored \
         members\". Doctrine-only justification. Output only JSON."
    );

    let user = format!(
        "SITUATION:\n{situation}\n\n\
         SUPPORTING DOCTRINE:\n{support}\n\n\
         COUNTER DOCTRINE (risks, warnings):\n{counter}\n\n\
         NEUTRAL DOCTRINE:\n{neutral}\n\n\
         OUTPUT (strict JSON):\n\
         {{\n\
           \"stance\": \"ADVANCE|DELAY|AVOID|CONDITIONAL|NEEDS_DATA|ABSTAIN|STOP\",\n\
           \"justification\": \"doctrine-grounded reasoning, no narrative phrasing\",\n\
           \"doctrine_ids\": [\"chunk id of every cited passage\"],\n\
           \"violations\": [\"factual inconsistencies between the situation and doctrine\"],\n\
           \"constraints\": [\"conditions that must hold for this stance\"],\n\
           \"confidence\": 0.0\n\
         }}\n\n\
         Requirements:\n\
         - every claim in the justification maps to a doctrine_id\n\
         - acknowledge counter doctrine explicitly; do not ignore warnings\n\
         - confidence in [0,1]: how directly the doctrine applies here\n\
         - violations only if the situation asserts something the doctrine contradicts",
        support = format_chunks(support),
        counter = format_chunks(counter),
        neutral = format_chunks(neutral),
    );

    PromptInstance {
        template_slug: "minister_synthesis_v1".into(),
        system,
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase2_prompt_names_every_domain() {
        let chapter = ChapterRecord {
            book_id: "b1".into(),
            chapter_index: 3,
            title: "Spies".into(),
            text: "On the use of spies.".into(),
        };
        let prompt = phase2_doctrine(&chapter);
        for domain in Domain::ALL {
            assert!(prompt.user.contains(domain.as_str()));
        }
        assert!(prompt.user.contains("CHAPTER 3"));
    }

    #[test]
    fn synthesis_prompt_forbids_narrative_phrasing() {
        let prompt = minister_synthesis(MinisterId::Risk, "situation", &[], &[], &[]);
        assert!(prompt.system.contains("I believe"));
        assert!(prompt.system.contains("respectfully"));
        assert!(prompt.user.contains("NEEDS_DATA"));
    }
}
