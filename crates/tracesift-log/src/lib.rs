//! Session log reading and JSONL persistence

mod discover;
mod error;
mod io;
mod reader;
mod types;

pub use discover::{default_sessions_dir, discover_sessions, relative_hint, SessionFilter};
pub use error::{LogError, Result};
pub use io::{append_jsonl, atomic_write, read_jsonl, write_jsonl};
pub use reader::{read_session, read_session_str};
pub use types::RawRecord;
