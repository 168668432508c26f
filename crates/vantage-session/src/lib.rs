//! Client-side game session: replay timeline, board selection, and the
//! runner tying them to a sync gateway and a renderer.

pub mod input;
pub mod render;
pub mod runner;
pub mod selection;
pub mod session;
pub mod timeline;

pub use input::{BoardCursor, BoardLayout, Completion, SessionInput};
pub use render::{RenderFrame, Renderer};
pub use runner::SessionRunner;
pub use selection::{ClickOutcome, Highlights, SelectionMachine, SelectionState};
pub use session::{Effect, Request, Session};
pub use timeline::{reconcile_fen, ReplayTimeline, TimelineChange};

use vantage_types::VantageError;

pub fn session_error(message: impl Into<String>) -> VantageError {
    VantageError::Session(message.into())
}
