pub mod composer;
pub mod llm;
pub mod prompt;
pub mod session;

pub use composer::AnswerComposer;
pub use llm::GeminiChat;
pub use prompt::REFUSAL;
pub use session::{AskOutcome, IngestReport, Session, Status};
