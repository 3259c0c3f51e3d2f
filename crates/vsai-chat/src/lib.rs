//! vsai-chat: chat runtime for VSAI
//!
//! Assembles streamed answers into a keyed message store, speaks answers
//! sentence by sentence on a shared audio clock, and coordinates turns,
//! cancellation and history persistence for one conversation.

pub mod assembler;
pub mod error;
pub mod handle;
pub mod history;
pub mod playback;
pub mod session;
pub mod store;

pub use assembler::{Assembly, MessageAssembler, consume};
pub use error::{Error, Result};
pub use handle::SessionHandle;
pub use history::{HistoryStore, MemoryHistory};
pub use playback::{AudioFormat, AudioOutput, PcmBuffer, PlaybackUnit, SpeakOutcome, Speaker};
pub use session::{ChatSession, Services, SessionConfig};
pub use store::{MessageStore, StoreEvent};
