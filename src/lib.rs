//! Chatwire is the streaming response interpretation core of an LLM chat
//! client: it turns live, incrementally-arriving provider streams into a
//! well-defined sequence of typed chat events.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the unified event model, the conversation history and its
//!   token-budget trimmer, and the shared error taxonomy.
//! - [`functions`] owns function descriptors/schemas and the registry that
//!   performs late-bound invocation through closure thunks captured at
//!   registration time.
//! - [`parsers`] implements the resumable wire parsers: the embedded-command
//!   parser for in-band `#start`/`#end` invocation markup, the
//!   delta-assembling parser for structured streaming APIs, and the
//!   single-frame parser for providers whose frames arrive complete.
//! - [`api`] defines the provider wire payloads consumed and produced by the
//!   parsing layer.
//!
//! Transport, persistence, and rendering are external collaborators: a host
//! feeds already-deserialized provider frames into a parser and dispatches
//! the resulting [`core::event::ChatEvent`] stream back into the registry or
//! the UI.

pub mod api;
pub mod core;
pub mod functions;
pub mod parsers;
