//! Template answers composed straight from the dispatch context.
//!
//! Used when no model is configured. The answer restates each slot's
//! summary; a spoken answer is cut to the context's sentence limit.

use async_trait::async_trait;
use futures::stream;

use crate::adapters::{Conversation, GenerativeAdapter, TextStream, Turn};
use crate::context::{describe_slot, Context};
use crate::error::GenerativeError;

const GENERAL_ANSWER: &str = "I can help with how busy campus venues are, dining menus, \
dining hall and restaurant hours, gym and library hours, and campus events. \
Try asking \"How busy is the Busch Student Center right now?\"";

/// Offline generator.
#[derive(Debug, Clone, Default)]
pub struct OfflineGenerator;

impl OfflineGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl GenerativeAdapter for OfflineGenerator {
    fn name(&self) -> &str {
        "offline"
    }

    fn open_conversation(&self) -> Box<dyn Conversation> {
        Box::new(OfflineConversation { turns: Vec::new() })
    }
}

struct OfflineConversation {
    turns: Vec<Turn>,
}

#[async_trait]
impl Conversation for OfflineConversation {
    async fn stream(&mut self, context: &Context) -> Result<TextStream, GenerativeError> {
        let mut answer = compose_answer(context);
        if let Some(limit) = context.voice() {
            answer = limit_sentences(&answer, limit);
        }
        let chunks: Vec<Result<String, GenerativeError>> =
            word_chunks(&answer).into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn record(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

/// Plain-language answer built from every slot in order.
pub fn compose_answer(context: &Context) -> String {
    if context.slot_count() == 0 {
        return GENERAL_ANSWER.to_string();
    }
    context
        .slots()
        .map(|(category, result)| {
            let line = describe_slot(category, result);
            line.strip_prefix("Note: ").map(str::to_string).unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First `limit` sentences of `text`.
pub fn limit_sentences(text: &str, limit: usize) -> String {
    let mut end = text.len();
    let mut seen = 0;
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        let at_boundary = bytes.get(i + 1).map_or(true, |n| n.is_ascii_whitespace());
        if matches!(b, b'.' | b'!' | b'?') && at_boundary {
            seen += 1;
            if seen == limit {
                end = i + 1;
                break;
            }
        }
    }
    text[..end].trim().to_string()
}

/// Split into word-sized chunks that concatenate back to `text`.
fn word_chunks(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}
