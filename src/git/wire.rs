//! Text protocol emitted by `git log` for the subprocess backend.
//!
//! Each commit is one chunk:
//!
//! ```text
//! @@@COMMIT@@@<hash>@@@FIELD@@@<parents>@@@FIELD@@@<name>@@@FIELD@@@<email>@@@FIELD@@@<iso>\t<epoch>@@@FIELD@@@---MSG_START---<message>---MSG_END---
//! :<old mode> <new mode> <old id> <new id> <status>\t<path>
//! <additions>\t<deletions>\t<path>
//! ```
//!
//! The message ends where a line ends with the end sentinel.

pub const CHUNK_SEPARATOR: &str = "@@@COMMIT@@@";
pub const FIELD_SEPARATOR: &str = "@@@FIELD@@@";
pub const MESSAGE_START: &str = "---MSG_START---";
pub const MESSAGE_END: &str = "---MSG_END---";

/// Number of header fields before the message.
pub const HEADER_FIELDS: usize = 5;

/// Binary marker in numstat output.
pub const BINARY_MARKER: &str = "-";

/// The `--format` argument producing the chunk header and message.
pub fn log_format() -> String {
    format!(
        "{CHUNK_SEPARATOR}%H{FIELD_SEPARATOR}%P{FIELD_SEPARATOR}%an{FIELD_SEPARATOR}%ae{FIELD_SEPARATOR}%cI\t%ct{FIELD_SEPARATOR}{MESSAGE_START}%B{MESSAGE_END}"
    )
}
