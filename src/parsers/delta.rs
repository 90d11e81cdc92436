use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::ChatResponse;
use crate::core::error::ParseError;
use crate::core::event::ChatEvent;
use crate::functions::FunctionRegistry;
use crate::parsers::{InterpreterOptions, StreamInterpreter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Message,
    Function,
}

/// Reassembles function calls that a structured streaming API delivers
/// fragmented across many frames: the call name arrives in one frame and the
/// argument text trickles in as string fragments until a finish marker.
///
/// Plain assistant text passes through immediately; a call abandoned in
/// favor of prose drops back to text handling. Malformed argument text at
/// completion time is a fatal parse error — a call that cannot be decoded
/// cannot be safely dispatched.
pub struct DeltaParser {
    options: InterpreterOptions,
    state: State,
    function_name: String,
    arguments: String,
}

impl DeltaParser {
    pub fn new(options: InterpreterOptions) -> Self {
        Self {
            options,
            state: State::Message,
            function_name: String::new(),
            arguments: String::new(),
        }
    }

    fn parse_arguments(&self) -> Result<Map<String, Value>, ParseError> {
        if self.arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str::<Map<String, Value>>(&self.arguments).map_err(|source| {
            ParseError::MalformedArguments {
                function: self.function_name.clone(),
                source,
            }
        })
    }
}

#[async_trait]
impl StreamInterpreter for DeltaParser {
    type Frame = ChatResponse;

    fn reset(&mut self) {
        self.state = State::Message;
        self.function_name.clear();
        self.arguments.clear();
    }

    async fn handle(
        &mut self,
        frame: ChatResponse,
        registry: Option<&FunctionRegistry>,
    ) -> Result<Vec<ChatEvent>, ParseError> {
        if self.options.is_cancelled() {
            self.reset();
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let Some(choice) = frame.choices.first() else {
            debug!(state = ?self.state, "frame carried no choices");
            return Ok(events);
        };

        let fragment = choice
            .delta
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
            .and_then(|call| call.function.as_ref());
        let fragment_name = fragment.and_then(|f| f.name.as_deref());
        let fragment_arguments = fragment.and_then(|f| f.arguments.as_deref());
        let finished = matches!(
            choice.finish_reason.as_deref(),
            Some("tool_calls") | Some("function_call")
        );

        match self.state {
            State::Message => match fragment_name {
                None => {
                    if let Some(content) = choice.delta.content.as_deref() {
                        if !content.is_empty() {
                            events.push(ChatEvent::text(content));
                        }
                    }
                }
                Some(name) => {
                    // Resolve to the registered casing when possible; an
                    // unregistered name passes through for the orchestrator
                    // to reject.
                    let canonical = registry
                        .and_then(|r| r.resolve_ci(name))
                        .unwrap_or(name)
                        .to_string();
                    debug!(function = canonical.as_str(), "function call opened");
                    self.function_name = canonical.clone();
                    // Argument text riding on the opening frame is
                    // intentionally not captured; assembly starts with the
                    // next frame.
                    self.arguments.clear();
                    self.state = State::Function;
                    events.push(ChatEvent::function_start(canonical));
                }
            },
            State::Function => {
                if finished {
                    let arguments = self.parse_arguments()?;
                    debug!(
                        function = self.function_name.as_str(),
                        "function call completed"
                    );
                    events.push(ChatEvent::function_invoke(
                        self.function_name.clone(),
                        arguments,
                    ));
                    self.reset();
                } else {
                    if let Some(content) = choice.delta.content.as_deref() {
                        if !content.is_empty() {
                            // The model abandoned the call and resumed prose.
                            events.push(ChatEvent::text(content));
                            self.state = State::Message;
                        }
                    }
                    if let Some(arguments) = fragment_arguments {
                        self.arguments.push_str(arguments);
                    }
                }
            }
        }

        self.options.pause().await;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionDescriptor;
    use serde_json::json;

    fn content_frame(content: &str) -> ChatResponse {
        serde_json::from_value(json!({
            "choices": [{"delta": {"content": content}, "finish_reason": null}]
        }))
        .expect("frame")
    }

    fn name_frame(name: &str) -> ChatResponse {
        serde_json::from_value(json!({
            "choices": [{
                "delta": {"content": null, "tool_calls": [{
                    "index": 0,
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": ""}
                }]},
                "finish_reason": null
            }]
        }))
        .expect("frame")
    }

    fn arguments_frame(fragment: &str) -> ChatResponse {
        serde_json::from_value(json!({
            "choices": [{
                "delta": {"content": null, "tool_calls": [{
                    "index": 0,
                    "function": {"arguments": fragment}
                }]},
                "finish_reason": null
            }]
        }))
        .expect("frame")
    }

    fn finish_frame(reason: &str) -> ChatResponse {
        serde_json::from_value(json!({
            "choices": [{"delta": {"content": null}, "finish_reason": reason}]
        }))
        .expect("frame")
    }

    async fn drive(
        parser: &mut DeltaParser,
        frames: Vec<ChatResponse>,
    ) -> Result<Vec<ChatEvent>, ParseError> {
        let mut events = Vec::new();
        for frame in frames {
            events.extend(parser.handle(frame, None).await?);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn plain_text_frames_pass_through() {
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let events = drive(
            &mut parser,
            vec![content_frame("Hello"), content_frame(" world")],
        )
        .await
        .expect("events");
        assert_eq!(
            events,
            vec![ChatEvent::text("Hello"), ChatEvent::text(" world")]
        );
    }

    #[tokio::test]
    async fn fragmented_arguments_are_assembled_into_one_call() {
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let events = drive(
            &mut parser,
            vec![
                name_frame("draw"),
                arguments_frame("{\"a\":"),
                arguments_frame("1"),
                arguments_frame("}"),
                finish_frame("tool_calls"),
            ],
        )
        .await
        .expect("events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatEvent::function_start("draw"));
        match &events[1] {
            ChatEvent::FunctionCallInvoke { name, arguments } => {
                assert_eq!(name, "draw");
                assert_eq!(arguments.get("a"), Some(&json!(1)));
            }
            other => panic!("expected invoke event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_argument_text_is_a_fatal_error() {
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let err = drive(
            &mut parser,
            vec![
                name_frame("draw"),
                arguments_frame("{\"a\":1"),
                finish_frame("tool_calls"),
            ],
        )
        .await
        .expect_err("malformed arguments");
        assert!(matches!(
            err,
            ParseError::MalformedArguments { function, .. } if function == "draw"
        ));
    }

    #[tokio::test]
    async fn missing_arguments_produce_an_empty_map() {
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let events = drive(
            &mut parser,
            vec![name_frame("ping"), finish_frame("function_call")],
        )
        .await
        .expect("events");
        match &events[1] {
            ChatEvent::FunctionCallInvoke { arguments, .. } => assert!(arguments.is_empty()),
            other => panic!("expected invoke event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn abandoned_call_resumes_as_prose() {
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let events = drive(
            &mut parser,
            vec![
                name_frame("draw"),
                content_frame("Actually, never mind."),
                content_frame(" Let me explain."),
            ],
        )
        .await
        .expect("events");
        assert_eq!(
            events,
            vec![
                ChatEvent::function_start("draw"),
                ChatEvent::text("Actually, never mind."),
                ChatEvent::text(" Let me explain."),
            ]
        );
    }

    #[tokio::test]
    async fn call_name_is_canonicalized_through_the_registry() {
        let mut registry = FunctionRegistry::new();
        registry
            .register_declarative(FunctionDescriptor::new("DrawImage"))
            .expect("register");
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let events = parser
            .handle(name_frame("drawimage"), Some(&registry))
            .await
            .expect("events");
        assert_eq!(events, vec![ChatEvent::function_start("DrawImage")]);
    }

    #[tokio::test]
    async fn parser_returns_to_message_state_after_a_completed_call() {
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let events = drive(
            &mut parser,
            vec![
                name_frame("ping"),
                arguments_frame("{}"),
                finish_frame("tool_calls"),
                content_frame("done"),
            ],
        )
        .await
        .expect("events");
        assert_eq!(events.last(), Some(&ChatEvent::text("done")));
    }

    #[tokio::test]
    async fn frames_without_choices_yield_nothing() {
        let mut parser = DeltaParser::new(InterpreterOptions::default());
        let frame: ChatResponse = serde_json::from_value(json!({"choices": []})).expect("frame");
        let events = parser.handle(frame, None).await.expect("events");
        assert!(events.is_empty());
    }
}
