// ABOUTME: Macro resolution for task instruction text
// ABOUTME: Result codecs, the token grammar, and the injected clock

pub mod clock;
pub mod codec;
pub mod error;
pub mod resolver;

pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::ResultCodec;
pub use error::{Result, TemplateError};
pub use resolver::{MacroResolver, ResolvedInstruction, UnresolvedMacro, UnresolvedReason};
