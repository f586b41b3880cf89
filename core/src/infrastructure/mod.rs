//! Infrastructure backends: how commands reach a fleet host and how unit
//! files get there.
//!
//! Nothing above this module spawns processes; everything goes through the
//! `CommandRunner` and `FileStager` traits so tests can swap in `MockRunner`
//! and `RecordingStager`.

pub mod process;
pub mod runner;
pub mod staging;

pub use runner::{CommandRunner, MockRunner, RunOutput, ShellRunner, SshOptions, SshRunner};
pub use staging::{with_staged, FileStager, RecordingStager, ScpStager, StagedFiles};
