use async_trait::async_trait;
use serde_json::Map;
use tracing::debug;

use crate::core::error::ParseError;
use crate::core::event::ChatEvent;
use crate::functions::FunctionRegistry;
use crate::parsers::{InterpreterOptions, StreamInterpreter};

/// One fully-formed unit from a provider that never fragments its responses.
///
/// Chat endpoints deliver either prose or a whole function call in a single
/// frame; image-generation endpoints deliver the decoded image payload.
#[derive(Clone, Debug, PartialEq)]
pub enum CompleteFrame {
    Text(String),
    FunctionCall { name: String, arguments: String },
    Image(Vec<u8>),
}

/// Interprets providers whose frames arrive complete, with nothing to
/// assemble across frames. Each frame maps directly onto events: prose to a
/// text chunk, a function call to a start/invoke pair, an image payload to
/// an image chunk. The parser is stateless, so `reset` has nothing to clear.
pub struct SingleFrameParser {
    options: InterpreterOptions,
}

impl SingleFrameParser {
    pub fn new(options: InterpreterOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl StreamInterpreter for SingleFrameParser {
    type Frame = CompleteFrame;

    fn reset(&mut self) {}

    async fn handle(
        &mut self,
        frame: CompleteFrame,
        registry: Option<&FunctionRegistry>,
    ) -> Result<Vec<ChatEvent>, ParseError> {
        if self.options.is_cancelled() {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        match frame {
            CompleteFrame::Text(content) => {
                if !content.is_empty() {
                    events.push(ChatEvent::text(content));
                }
            }
            CompleteFrame::FunctionCall { name, arguments } => {
                let canonical = registry
                    .and_then(|r| r.resolve_ci(&name))
                    .unwrap_or(&name)
                    .to_string();
                let arguments = if arguments.trim().is_empty() {
                    Map::new()
                } else {
                    serde_json::from_str(&arguments).map_err(|source| {
                        ParseError::MalformedArguments {
                            function: canonical.clone(),
                            source,
                        }
                    })?
                };
                debug!(function = canonical.as_str(), "complete function call");
                events.push(ChatEvent::function_start(canonical.clone()));
                events.push(ChatEvent::function_invoke(canonical, arguments));
            }
            CompleteFrame::Image(bytes) => {
                debug!(len = bytes.len(), "image payload");
                events.push(ChatEvent::image(bytes));
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

    fn parser() -> SingleFrameParser {
        SingleFrameParser::new(InterpreterOptions::default())
    }

    #[tokio::test]
    async fn text_frames_pass_through_and_empty_ones_vanish() {
        let mut parser = parser();
        let events = parser
            .handle(CompleteFrame::Text("Hello".into()), None)
            .await
            .expect("events");
        assert_eq!(events, vec![ChatEvent::text("Hello")]);
        let events = parser
            .handle(CompleteFrame::Text(String::new()), None)
            .await
            .expect("events");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn function_call_frame_emits_start_then_invoke() {
        let mut registry = FunctionRegistry::new();
        registry
            .register_declarative(FunctionDescriptor::new("DrawImage"))
            .expect("register");
        let mut parser = parser();
        let events = parser
            .handle(
                CompleteFrame::FunctionCall {
                    name: "drawimage".into(),
                    arguments: "{\"prompt\":\"a cat\"}".into(),
                },
                Some(&registry),
            )
            .await
            .expect("events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatEvent::function_start("DrawImage"));
        match &events[1] {
            ChatEvent::FunctionCallInvoke { name, arguments } => {
                assert_eq!(name, "DrawImage");
                assert_eq!(arguments.get("prompt"), Some(&json!("a cat")));
            }
            other => panic!("expected invoke event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_call_arguments_are_a_fatal_error() {
        let mut parser = parser();
        let err = parser
            .handle(
                CompleteFrame::FunctionCall {
                    name: "draw".into(),
                    arguments: "{\"a\":".into(),
                },
                None,
            )
            .await
            .expect_err("malformed arguments");
        assert!(matches!(
            err,
            ParseError::MalformedArguments { function, .. } if function == "draw"
        ));
    }

    #[tokio::test]
    async fn image_frames_surface_the_decoded_bytes() {
        let mut parser = parser();
        let bytes = vec![0x89, 0x50, 0x4e, 0x47];
        let events = parser
            .handle(CompleteFrame::Image(bytes.clone()), None)
            .await
            .expect("events");
        assert_eq!(events, vec![ChatEvent::ImageChunk(bytes)]);
    }
}
