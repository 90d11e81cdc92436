use async_trait::async_trait;
use tracing::debug;

use crate::core::error::ParseError;
use crate::core::event::ChatEvent;
use crate::functions::FunctionRegistry;
use crate::parsers::{InterpreterOptions, StreamInterpreter};

const START_MARKER: &str = "#start";
const END_MARKER: &str = "#end";
// Longest normalized prefix still treated as a potential marker.
const MARKER_SLACK: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingMarker,
    ReadingCommandName,
    ReadingCommandValue,
    PassThrough,
}

/// Interprets an in-band convention where free-form streamed text may contain
/// a function-invocation block bracketed by `#start` and `#end`, with the
/// function name on the first line inside the block.
///
/// The parser is a character-driven automaton whose state persists across
/// `handle` calls, so markers split across stream chunks are recognized.
/// Marker matching works on a normalized view of the accumulation buffer
/// (lower-cased, with carriage returns, newlines, and spaces stripped). Text
/// that merely resembles a marker never raises an error; it falls back to
/// literal output, after which marker recognition stays off for the rest of
/// the turn.
pub struct CommandParser {
    options: InterpreterOptions,
    state: State,
    /// Raw accumulation buffer for the current marker or command name.
    buffer: String,
    /// Normalized name of the command currently being read, if committed.
    command: String,
    /// Trailing text captured after a committed command name. Retained for
    /// diagnostics only; invoke events deliberately carry empty arguments.
    command_value: String,
    /// Exact match held back while a longer registered name could still
    /// complete, as `(lowered, canonical)`. Committed once the longer
    /// candidates fall away or the name line ends.
    pending: Option<(String, String)>,
    /// Set when a line break forced a synthetic end marker; the next block
    /// continues reading command names instead of awaiting `#start`.
    continue_after_end: bool,
    /// Whether any non-whitespace output has been produced this turn.
    /// Leading whitespace is suppressed until this flips.
    emitted_visible: bool,
}

impl CommandParser {
    pub fn new(options: InterpreterOptions) -> Self {
        Self {
            options,
            state: State::AwaitingMarker,
            buffer: String::new(),
            command: String::new(),
            command_value: String::new(),
            pending: None,
            continue_after_end: false,
            emitted_visible: false,
        }
    }

    /// Command value captured after the most recently committed command name.
    pub fn last_command_value(&self) -> &str {
        &self.command_value
    }

    fn normalized_buffer(&self) -> String {
        normalize(&self.buffer)
    }

    fn clear_scratch(&mut self) {
        self.command.clear();
        self.command_value.clear();
        self.pending = None;
    }

    /// Emits the raw buffer as literal text, trimming leading whitespace if
    /// nothing visible has been produced yet and suppressing blank output.
    fn emit_buffer_as_text(&mut self, events: &mut Vec<ChatEvent>) {
        let raw = if self.emitted_visible {
            self.buffer.as_str()
        } else {
            self.buffer.trim_start()
        };
        if !raw.trim().is_empty() {
            events.push(ChatEvent::text(raw));
            self.emitted_visible = true;
        }
        self.buffer.clear();
    }

    fn step(&mut self, ch: char, names: &[(String, String)], events: &mut Vec<ChatEvent>) {
        if self.state != State::PassThrough {
            self.buffer.push(ch);
        }

        // Trampoline: a line break inside a command value loads a synthetic
        // end marker and re-evaluates it immediately without consuming input.
        let mut redispatch = true;
        while redispatch {
            redispatch = false;
            match self.state {
                State::AwaitingMarker => {
                    let mark = self.normalized_buffer();
                    if mark == START_MARKER {
                        debug!("start marker recognized");
                        self.state = State::ReadingCommandName;
                        self.buffer.clear();
                        self.clear_scratch();
                        self.continue_after_end = false;
                    } else if mark == END_MARKER {
                        if let Some((_, canonical)) =
                            names.iter().find(|(lower, _)| *lower == self.command)
                        {
                            debug!(function = canonical.as_str(), "end marker closes command");
                            events.push(ChatEvent::function_invoke(
                                canonical.clone(),
                                serde_json::Map::new(),
                            ));
                        }
                        self.buffer.clear();
                        self.command.clear();
                        if self.continue_after_end {
                            self.continue_after_end = false;
                            self.state = State::ReadingCommandName;
                        }
                    } else if mark.chars().count() > MARKER_SLACK {
                        debug!("buffer is not a marker; passing through for the rest of the turn");
                        self.state = State::PassThrough;
                        self.emit_buffer_as_text(events);
                    }
                }
                State::ReadingCommandName => {
                    let normalized = self.normalized_buffer();
                    if normalized == "#" {
                        // A bare `#` cancels the name read; the buffer is kept
                        // so a literal `#end` line terminates the block.
                        self.state = State::AwaitingMarker;
                        continue;
                    }
                    if normalized.is_empty() {
                        continue;
                    }
                    let exact = names
                        .iter()
                        .find(|(lower, _)| *lower == normalized)
                        .map(|(_, canonical)| canonical.clone());
                    let shadowed_by_longer = names.iter().any(|(lower, _)| {
                        lower.len() > normalized.len() && lower.starts_with(&normalized)
                    });
                    if ch == '\n' || ch == '\r' {
                        // End of the name line: an exact match commits even if
                        // a longer candidate also shares the prefix, and a
                        // held shorter match commits with its overrun.
                        if let Some(canonical) = exact {
                            self.commit_command(normalized, canonical, events);
                            redispatch = true;
                        } else if self.pending.is_some() {
                            self.commit_pending_with_overrun(events);
                            redispatch = true;
                        }
                        continue;
                    }
                    if let Some(canonical) = exact {
                        if !shadowed_by_longer {
                            self.commit_command(normalized, canonical, events);
                            continue;
                        }
                        // Ambiguous: a longer registered name still matches.
                        // Hold this one in case the candidates diverge later.
                        self.pending = Some((normalized, canonical));
                        continue;
                    }
                    let is_prefix = names
                        .iter()
                        .any(|(lower, _)| lower.starts_with(&normalized));
                    if !is_prefix {
                        if self.pending.is_some() {
                            // The longer candidates fell away; the held match
                            // is the command and the overrun opens its value.
                            self.commit_pending_with_overrun(events);
                            redispatch = true;
                            continue;
                        }
                        debug!("buffer is not a command name; passing through");
                        self.state = State::PassThrough;
                        self.emit_buffer_as_text(events);
                    }
                }
                State::ReadingCommandValue => {
                    if ch == '\n' || ch == '\r' {
                        self.buffer.clear();
                        self.buffer.push_str(END_MARKER);
                        self.continue_after_end = true;
                        self.state = State::AwaitingMarker;
                        redispatch = true;
                        continue;
                    }
                    self.command_value = self
                        .buffer
                        .trim_matches(|c| c == '\r' || c == '\n')
                        .to_string();
                }
                State::PassThrough => {
                    let suppressed =
                        !self.emitted_visible && matches!(ch, '\r' | '\n' | ' ');
                    if !suppressed {
                        if !ch.is_whitespace() {
                            self.emitted_visible = true;
                        }
                        events.push(ChatEvent::text(ch.to_string()));
                    }
                }
            }
        }
    }

    fn commit_command(
        &mut self,
        normalized: String,
        canonical: String,
        events: &mut Vec<ChatEvent>,
    ) {
        debug!(function = canonical.as_str(), "command name recognized");
        self.command = normalized;
        self.command_value.clear();
        self.buffer.clear();
        self.pending = None;
        self.state = State::ReadingCommandValue;
        events.push(ChatEvent::function_start(canonical));
    }

    /// Commits the held shorter match and moves the raw buffer overrun past
    /// the name into the value buffer. The caller re-dispatches the current
    /// character so a line break still loads the synthetic end marker.
    fn commit_pending_with_overrun(&mut self, events: &mut Vec<ChatEvent>) {
        let Some((lower, canonical)) = self.pending.take() else {
            return;
        };
        let split = split_after_normalized_prefix(&self.buffer, &lower);
        let overrun = self.buffer[split..].to_string();
        self.commit_command(lower, canonical, events);
        self.buffer = overrun;
        self.command_value = self
            .buffer
            .trim_matches(|c| c == '\r' || c == '\n')
            .to_string();
    }
}

#[async_trait]
impl StreamInterpreter for CommandParser {
    type Frame = String;

    fn reset(&mut self) {
        self.state = State::AwaitingMarker;
        self.buffer.clear();
        self.clear_scratch();
        self.continue_after_end = false;
        self.emitted_visible = false;
    }

    async fn handle(
        &mut self,
        frame: String,
        registry: Option<&FunctionRegistry>,
    ) -> Result<Vec<ChatEvent>, ParseError> {
        // Live name list, longest first so the longest exact match wins when
        // names share a prefix.
        let names: Vec<(String, String)> = registry
            .map(|r| {
                r.names_by_length_desc()
                    .into_iter()
                    .map(|name| (name.to_lowercase(), name.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let mut events = Vec::new();
        for ch in frame.chars() {
            if self.options.is_cancelled() {
                self.reset();
                return Ok(events);
            }
            self.step(ch, &names, &mut events);
            self.options.pause().await;
        }
        Ok(events)
    }
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\r' | '\n' | ' '))
        .collect::<String>()
        .to_lowercase()
}

/// Byte index just past the raw prefix whose normalized form equals `target`.
fn split_after_normalized_prefix(raw: &str, target: &str) -> usize {
    let mut normalized = String::new();
    for (idx, c) in raw.char_indices() {
        if normalized == target {
            return idx;
        }
        if !matches!(c, '\r' | '\n' | ' ') {
            normalized.extend(c.to_lowercase());
        }
    }
    raw.len()
}
