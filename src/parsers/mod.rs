use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::error::ParseError;
use crate::core::event::ChatEvent;
use crate::functions::FunctionRegistry;

pub mod command;
pub mod delta;
pub mod single;

pub use command::CommandParser;
pub use delta::DeltaParser;
pub use single::{CompleteFrame, SingleFrameParser};

/// Cooperative-execution knobs shared by every parser.
///
/// `yield_each_unit` makes the parser hand control back to the runtime after
/// each unit of input (a character for the embedded-command parser, a frame
/// for the delta parser). It is a host policy knob for environments that
/// cannot tolerate long synchronous bursts and never changes which events are
/// emitted. The cancellation token is checked at the same points; on
/// cancellation a parser stops emitting, drops buffered partial state, and
/// produces no synthetic terminal event.
#[derive(Clone, Debug, Default)]
pub struct InterpreterOptions {
    pub yield_each_unit: bool,
    pub cancel: Option<CancellationToken>,
}

impl InterpreterOptions {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) async fn pause(&self) {
        if self.yield_each_unit {
            tokio::task::yield_now().await;
        }
    }
}

/// Common contract every provider-specific wire parser implements.
///
/// A parser is a resumable sequence generator owned by one conversation
/// turn: each `handle` call may yield zero or more events and continues from
/// wherever internal state left off, in exact causal input order.
#[async_trait]
pub trait StreamInterpreter {
    /// Provider-native message unit this parser consumes.
    type Frame;

    /// Clears internal state. Idempotent.
    fn reset(&mut self);

    async fn handle(
        &mut self,
        frame: Self::Frame,
        registry: Option<&FunctionRegistry>,
    ) -> Result<Vec<ChatEvent>, ParseError>;
}
