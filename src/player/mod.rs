pub mod execution;
pub mod highlight;
pub mod library;
pub mod params;
pub mod runner;
pub mod script;

pub use execution::{ExecutionLog, ExecutionRecord};
pub use library::ScriptLibrary;
pub use runner::{PlayOptions, Player};
pub use script::{ActionKind, RecordedScript, ScriptAction, ScriptExport};
