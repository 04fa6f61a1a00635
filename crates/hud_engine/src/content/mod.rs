mod compiler;
mod database;
mod discovery;
mod hashing;
mod pipeline;
mod report;

pub use compiler::{compile_game_info, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{DefRow, DefTable, GameInfo};
pub use discovery::{ContentRequest, DiscoveryError};
pub use hashing::{type_hash, TypeHash};
pub use pipeline::{load_game_info, ContentLoadError, LoadedContent};
pub use report::{ContentReport, ModReport};
