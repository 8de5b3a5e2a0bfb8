// # Cursor Store Implementations
//
// The file-backed CursorStore used by the daemon.

pub mod file;

pub use file::FileCursorStore;
