use crate::core::message::{ChatHistory, ContentPayload, Message};

/// External token-counting capability supplied by the host (the tokenizer is
/// provider-specific and lives outside this crate).
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> u64;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> u64,
{
    fn count_tokens(&self, text: &str) -> u64 {
        self(text)
    }
}

impl ChatHistory {
    /// Prunes the history to fit `max_tokens`, walking from most recent to
    /// oldest.
    ///
    /// Pinned messages are always kept and cost nothing. A countable message
    /// that does not fit is truncated one character at a time from the front
    /// until it fits; if it empties out first, trimming stops and no older
    /// messages are considered. Messages with no content are dropped. If
    /// nothing survives, the original history is returned unchanged as a
    /// fail-safe. The input is never mutated.
    pub fn truncate_to_max_tokens(
        &self,
        counter: &dyn TokenCounter,
        max_tokens: u64,
    ) -> ChatHistory {
        let mut kept: Vec<Message> = Vec::new();
        let mut count: u64 = 0;

        'messages: for message in self.iter().rev() {
            if message.contents.is_empty() {
                continue;
            }
            if message.is_pinned() {
                kept.push(message.clone());
                continue;
            }
            if count >= max_tokens {
                continue;
            }

            // Countable: single text content by construction.
            let full_text = message.contents[0].payload.as_text().unwrap_or("");
            let mut text = full_text;
            loop {
                let tokens = counter.count_tokens(text);
                if count + tokens > max_tokens {
                    if text.is_empty() {
                        break 'messages;
                    }
                    let mut chars = text.chars();
                    chars.next();
                    text = chars.as_str();
                } else {
                    count += tokens;
                    if text.len() == full_text.len() {
                        kept.push(message.clone());
                    } else {
                        let mut truncated = message.clone();
                        truncated.contents[0].payload = ContentPayload::Text(text.to_string());
                        kept.push(truncated);
                    }
                    break;
                }
            }
        }

        if kept.is_empty() {
            return self.clone();
        }
        kept.reverse();
        kept.into_iter().collect()
    }
}
