//! Candidate source — local processes classified by runtime role.
//!
//! A process is an editor when it has a main window and its executable stem
//! is one of the configured editor names. It is a player when it has a main
//! window and its install directory holds one of the runtime loader files.
//! Anything else is dropped.

use std::path::{Path, PathBuf};

use sysinfo::System;

use dapscout_core::{Candidate, ClassifyConfig, Role};

/// Produces the candidate list for one run.
pub trait CandidateSource {
    fn list_candidates(&self) -> Vec<Candidate>;
}

/// What the classifier needs to know about a process.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Executable file name without extension.
    pub name: String,
    pub exe: Option<PathBuf>,
    pub has_main_window: bool,
}

/// Decide the role of one process.
pub fn classify(record: &ProcessRecord, config: &ClassifyConfig) -> Role {
    if !record.has_main_window {
        return Role::None;
    }
    if config.editor_names.iter().any(|n| *n == record.name) {
        return Role::Editor;
    }
    let install_dir = record.exe.as_deref().and_then(Path::parent);
    if let Some(dir) = install_dir {
        if config
            .player_loader_files
            .iter()
            .any(|f| dir.join(f).is_file())
        {
            return Role::Player;
        }
    }
    Role::None
}

/// Candidates from the live process table, via sysinfo.
pub struct SystemCandidates {
    config: ClassifyConfig,
}

impl SystemCandidates {
    pub fn new(config: ClassifyConfig) -> Self {
        Self { config }
    }
}

impl CandidateSource for SystemCandidates {
    fn list_candidates(&self) -> Vec<Candidate> {
        let system = System::new_all();

        let mut candidates: Vec<Candidate> = system
            .processes()
            .values()
            .filter_map(|process| {
                let exe = process.exe().map(Path::to_path_buf);
                let name = exe
                    .as_deref()
                    .and_then(Path::file_stem)
                    .unwrap_or_else(|| process.name())
                    .to_string_lossy()
                    .into_owned();
                let record = ProcessRecord {
                    pid: process.pid().as_u32(),
                    name,
                    exe,
                    has_main_window: has_main_window(process),
                };
                let role = classify(&record, &self.config);
                Candidate::new(record.pid, record.name, role)
            })
            .collect();

        candidates.sort_by_key(|c| c.pid);
        tracing::info!(
            editors = candidates.iter().filter(|c| c.role == Role::Editor).count(),
            players = candidates.iter().filter(|c| c.role == Role::Player).count(),
            "candidate scan complete"
        );
        candidates
    }
}

/// Unix desktops have no window handle to ask for. A process attached to
/// an X11 or Wayland session counts as windowed.
#[cfg(all(unix, not(target_os = "macos")))]
fn has_main_window(process: &sysinfo::Process) -> bool {
    process.environ().iter().any(|var| {
        let var = var.to_string_lossy();
        var.starts_with("DISPLAY=") || var.starts_with("WAYLAND_DISPLAY=")
    })
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn has_main_window(_process: &sysinfo::Process) -> bool {
    true
}
