use tracing::{debug, warn};

use docqa_core::traits::{ContextSource, LanguageModel};
use docqa_core::types::Chunk;

use crate::prompt::{build_prompt, render_context, REFUSAL};

pub const GENERATION_ERROR_PREFIX: &str = "Error generating answer";

/// Grounded answers: the model only ever sees retrieved context.
pub struct AnswerComposer {
    model: Box<dyn LanguageModel>,
}

impl AnswerComposer {
    pub fn new(model: Box<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Never fails. Empty context yields the refusal sentence without a model
    /// call; a model error yields `Error generating answer: <cause>`.
    pub fn answer(&self, question: &str, context: &[Chunk]) -> String {
        if context.iter().all(|c| c.text.trim().is_empty()) {
            debug!("no context; refusing without model call");
            return REFUSAL.to_string();
        }
        let prompt = build_prompt(&render_context(context), question);
        match self.model.generate(&prompt) {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!(model = %self.model.model_id(), "generation failed: {:#}", e);
                format!("{GENERATION_ERROR_PREFIX}: {e}")
            }
        }
    }

    pub fn answer_from(&self, question: &str, source: &dyn ContextSource) -> String {
        let context = source.context_for(question);
        self.answer(question, &context)
    }
}
