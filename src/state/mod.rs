// State management module.
// View state for the Files and Console tabs.

pub mod console;
pub mod files;

pub use console::{ConsoleLevel, ConsoleLog, ConsoleMessage};
pub use files::{Banner, FilesTabState, LoadingState};
