//! Remote staging of unit files.
//!
//! fleetctl running on a remote host can only read files on that host, so
//! `start`/`submit`/`load` in ssh mode copy the local unit files into a
//! temporary directory there first. `StagedFiles` removes that directory
//! when it is dropped, which covers success, failure and unwinding alike.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use super::process::{execute, shell_join};
use super::runner::{CommandRunner, SshRunner};
use crate::error::{error_chain, FleetError, StagingError};
use crate::types::config::SshSettings;


// ---------------------------------------------------------------------------
// FileStager
// ---------------------------------------------------------------------------

/// Files copied to a host, and the directory holding them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBatch {
    pub host: String,
    pub dir: String,
    /// Remote paths, in the order the local files were given.
    pub paths: Vec<String>,
}

pub trait FileStager {
    /// Copy `files` to `host`. On error nothing is left behind.
    fn stage(&self, host: &str, files: &[PathBuf]) -> Result<StagedBatch, FleetError>;

    /// Remove everything `stage` created.
    fn remove(&self, batch: &StagedBatch) -> Result<(), FleetError>;
}

/// Remote path for `file` inside `dir`. fleetctl names units after the file,
/// so the file name is kept.
pub fn remote_path(dir: &str, file: &Path) -> Result<String, StagingError> {
    let name = file
        .file_name()
        .ok_or_else(|| StagingError::NoFileName(file.to_path_buf()))?;
    Ok(format!("{}/{}", dir, name.to_string_lossy()))
}


// ---------------------------------------------------------------------------
// ScpStager
// ---------------------------------------------------------------------------

/// Stages files with `ssh mkdir` + `scp`, removes them with `ssh rm -rf`.
pub struct ScpStager {
    ssh: SshRunner,
    settings: SshSettings,
}

impl ScpStager {
    pub fn new(settings: SshSettings) -> Self {
        ScpStager {
            ssh: SshRunner::new(settings.clone()),
            settings,
        }
    }

    fn remote_dir() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        format!("/tmp/fleet-{}", suffix)
    }

    fn scp_args(&self, host: &str, local: &Path, remote: &str) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "-P".to_string(),
            self.settings.port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout),
        ];
        if let Some(ref key) = self.settings.identity_file {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args.push(local.to_string_lossy().into_owned());
        args.push(format!("{}@{}:{}", self.settings.user, host, remote));
        args
    }

    fn copy_all(&self, host: &str, dir: &str, files: &[PathBuf]) -> Result<Vec<String>, FleetError> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            let remote = remote_path(dir, file)?;
            let output = execute("scp", &self.scp_args(host, file, &remote), host)?;
            if !output.success() {
                return Err(StagingError::Copy {
                    path: file.clone(),
                    host: host.to_string(),
                    reason: output.stderr.trim().to_string(),
                }
                .into());
            }
            paths.push(remote);
        }
        Ok(paths)
    }
}

impl FileStager for ScpStager {
    fn stage(&self, host: &str, files: &[PathBuf]) -> Result<StagedBatch, FleetError> {
        let dir = Self::remote_dir();
        let mkdir = vec!["mkdir".to_string(), "-p".to_string(), dir.clone()];
        let output = self.ssh.run(&mkdir, host, None)?;
        if !output.success() {
            return Err(StagingError::RemoteDir {
                host: host.to_string(),
                reason: output.stderr.trim().to_string(),
            }
            .into());
        }
        let batch = StagedBatch {
            host: host.to_string(),
            dir: dir.clone(),
            paths: Vec::new(),
        };
        match self.copy_all(host, &dir, files) {
            Ok(paths) => Ok(StagedBatch { paths, ..batch }),
            Err(e) => {
                if let Err(cleanup) = self.remove(&batch) {
                    warn!(host, dir = %dir, error = %cleanup, "failed to clean up partial staging");
                }
                Err(e)
            }
        }
    }

    fn remove(&self, batch: &StagedBatch) -> Result<(), FleetError> {
        let rm = vec!["rm".to_string(), "-rf".to_string(), batch.dir.clone()];
        debug!(host = %batch.host, command = %shell_join(&rm), "removing staged files");
        let output = self.ssh.run(&rm, &batch.host, None)?;
        if !output.success() {
            return Err(StagingError::RemoteDir {
                host: batch.host.clone(),
                reason: output.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}


// ---------------------------------------------------------------------------
// StagedFiles guard
// ---------------------------------------------------------------------------

/// Staged files that are removed from the host when the guard drops.
pub struct StagedFiles<'a> {
    stager: &'a dyn FileStager,
    batch: StagedBatch,
}

impl<'a> StagedFiles<'a> {
    pub fn acquire(stager: &'a dyn FileStager, host: &str, files: &[PathBuf]) -> Result<Self, FleetError> {
        let batch = stager.stage(host, files)?;
        Ok(StagedFiles { stager, batch })
    }

    pub fn paths(&self) -> &[String] {
        &self.batch.paths
    }
}

impl Drop for StagedFiles<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.stager.remove(&self.batch) {
            warn!(
                host = %self.batch.host,
                dir = %self.batch.dir,
                error = %error_chain(&e),
                "failed to remove staged unit files"
            );
        }
    }
}

/// Stage `files` on `host`, run `f` with the remote paths, then remove them.
pub fn with_staged<T, F>(stager: &dyn FileStager, host: &str, files: &[PathBuf], f: F) -> Result<T, FleetError>
where
    F: FnOnce(&[String]) -> Result<T, FleetError>,
{
    let staged = StagedFiles::acquire(stager, host, files)?;
    f(staged.paths())
}


// ---------------------------------------------------------------------------
// RecordingStager
// ---------------------------------------------------------------------------

/// Test-double stager: pretends to copy files under `/tmp/staged` and
/// records stage/remove events.
#[derive(Default)]
pub struct RecordingStager {
    events: RefCell<Vec<String>>,
    fail_stage: bool,
}

impl RecordingStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stager whose `stage` always fails.
    pub fn failing() -> Self {
        RecordingStager {
            events: RefCell::new(Vec::new()),
            fail_stage: true,
        }
    }

    /// `stage <host> <paths..>` and `remove <host> <dir>` entries, in order.
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl FileStager for RecordingStager {
    fn stage(&self, host: &str, files: &[PathBuf]) -> Result<StagedBatch, FleetError> {
        if self.fail_stage {
            return Err(StagingError::RemoteDir {
                host: host.to_string(),
                reason: "permission denied".into(),
            }
            .into());
        }
        let dir = "/tmp/staged".to_string();
        let paths = files
            .iter()
            .map(|f| remote_path(&dir, f))
            .collect::<Result<Vec<_>, _>>()?;
        self.events
            .borrow_mut()
            .push(format!("stage {} {}", host, paths.join(" ")));
        Ok(StagedBatch {
            host: host.to_string(),
            dir,
            paths,
        })
    }

    fn remove(&self, batch: &StagedBatch) -> Result<(), FleetError> {
        self.events
            .borrow_mut()
            .push(format!("remove {} {}", batch.host, batch.dir));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn files() -> Vec<PathBuf> {
        vec![PathBuf::from("/units/web.service"), PathBuf::from("db.service")]
    }

    #[test]
    fn remote_path_keeps_file_name() {
        let path = remote_path("/tmp/fleet-abc", Path::new("/home/me/units/web@.service")).unwrap();
        assert_eq!(path, "/tmp/fleet-abc/web@.service");
    }

    #[test]
    fn remote_path_rejects_directories_without_name() {
        assert!(remote_path("/tmp/x", Path::new("/")).is_err());
    }

    #[test]
    fn with_staged_removes_after_success() {
        let stager = RecordingStager::new();
        let seen = with_staged(&stager, "10.0.0.1", &files(), |paths| Ok(paths.to_vec())).unwrap();
        assert_eq!(seen, vec!["/tmp/staged/web.service", "/tmp/staged/db.service"]);
        assert_eq!(
            stager.events(),
            vec![
                "stage 10.0.0.1 /tmp/staged/web.service /tmp/staged/db.service",
                "remove 10.0.0.1 /tmp/staged",
            ]
        );
    }

    #[test]
    fn with_staged_removes_after_error() {
        let stager = RecordingStager::new();
        let result: Result<(), FleetError> =
            with_staged(&stager, "h", &files(), |_| Err(FleetError::NoFleetHost));
        assert!(result.is_err());
        assert_eq!(stager.events().last().unwrap(), "remove h /tmp/staged");
    }

    #[test]
    fn with_staged_removes_after_panic() {
        let stager = RecordingStager::new();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), FleetError> = with_staged(&stager, "h", &files(), |_| panic!("boom"));
        }));
        assert!(outcome.is_err());
        assert_eq!(stager.events().len(), 2);
    }

    #[test]
    fn failed_staging_skips_callback() {
        let stager = RecordingStager::failing();
        let mut called = false;
        let result = with_staged(&stager, "h", &files(), |_| {
            called = true;
            Ok(())
        });
        assert!(matches!(result, Err(FleetError::Staging(_))));
        assert!(!called);
        assert!(stager.events().is_empty());
    }

    #[test]
    fn scp_args_target_remote_path() {
        let stager = ScpStager::new(SshSettings::default());
        let args = stager.scp_args("10.0.0.2", Path::new("/u/a.service"), "/tmp/fleet-x/a.service");
        assert_eq!(args.last().unwrap(), "core@10.0.0.2:/tmp/fleet-x/a.service");
        assert!(args.contains(&"/u/a.service".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-P" && w[1] == "22"));
    }

    #[test]
    fn remote_dirs_are_unique() {
        let a = ScpStager::remote_dir();
        let b = ScpStager::remote_dir();
        assert!(a.starts_with("/tmp/fleet-"));
        assert_ne!(a, b);
    }
}
