use docqa_core::types::Chunk;

/// Emitted verbatim when the context does not contain the answer.
pub const REFUSAL: &str = "The required information is not present in the provided documents.";

/// Chunk texts, verbatim, separated by blank lines.
pub fn render_context(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert assistant that answers questions using only the provided context.\n\
         Your goal is to be concise, precise and helpful.\n\
         \n\
         If the answer is not in the context, say: \"{REFUSAL}\"\n\
         \n\
         CONTEXT:\n\
         ---\n\
         {context}\n\
         ---\n\
         QUESTION: {question}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::Document;

    #[test]
    fn context_and_question_are_embedded_verbatim() {
        let chunks = vec![
            Chunk::new("Pump A runs at 3 bar.", Document::new("", "a.txt").metadata),
            Chunk::new("Pump B runs at {5} bar.", Document::new("", "b.txt").metadata),
        ];
        let prompt = build_prompt(&render_context(&chunks), "What about {context}?");
        assert!(prompt.contains("---\nPump A runs at 3 bar.\n\nPump B runs at {5} bar.\n---"));
        assert!(prompt.contains("QUESTION: What about {context}?"));
        assert!(prompt.contains(REFUSAL));
    }
}
