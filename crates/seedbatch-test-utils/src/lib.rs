//! Testing utilities for the seedbatch workspace
//!
//! Shared fixtures: a throwaway simulator work directory, a control-file
//! template in the simulator's `KEY = VALUE` dialect, and a shell script that
//! stands in for the simulator binary.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Control file with every recognised key plus comments, blanks and
/// unrelated parameters.
pub const CONTROL_TEMPLATE: &str = "\
# Demo DNA damage run
includeFile = supportFiles/geometry.txt

i:Ts/Seed = 1
s:So/Demo/BeamParticle = \"e-\"
d:So/Demo/BeamEnergy = 1 MeV
i:So/Demo/NumberOfHistoriesInRun = 10
# i:Ts/Seed = 99
s:Sc/DNADamage/OutputFile = \"DNADamage\"
b:Ts/PauseBeforeQuit = \"False\"
";

/// Number of lines in [`CONTROL_TEMPLATE`] carrying a recognised key.
pub const CONTROL_TEMPLATE_RECOGNISED: usize = 4;

/// Artifact set written by a successful simulator run.
pub const DEFAULT_ARTIFACTS: [&str; 4] = [
    "DNADamage.phsp",
    "DNADamage.header",
    "DNADamage_full.csv",
    "DNADamage_sdd.txt",
];

/// Primary artifact whose size signals completion.
pub const PRIMARY_ARTIFACT: &str = "DNADamage.phsp";

/// A temporary simulator work directory with an output root next to it.
#[derive(Debug)]
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("work")).expect("create work dir");
        Self { dir }
    }

    /// Directory the simulator runs in and writes its artifacts to.
    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Archive root receiving `<scenario_folder>/seed<N>` slots.
    pub fn target_root(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    pub fn control_file(&self) -> PathBuf {
        self.work_dir().join("run.txt")
    }

    pub fn write_control_file(&self, contents: &str) -> PathBuf {
        let path = self.control_file();
        fs::write(&path, contents).expect("write control file");
        path
    }

    pub fn write_artifact(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.work_dir().join(name);
        fs::write(&path, contents).expect("write artifact");
        path
    }

    /// Write the full artifact set as a completed run would.
    pub fn write_run_outputs(&self, seed: u64) {
        write_outputs(&self.work_dir(), seed);
    }

    /// Pre-create `seed<N>` directories under a scenario folder.
    pub fn seed_slots(&self, folder: &str, ordinals: &[u32]) -> PathBuf {
        let scenario_dir = self.target_root().join(folder);
        for n in ordinals {
            fs::create_dir_all(scenario_dir.join(format!("seed{n}"))).expect("create slot");
        }
        scenario_dir
    }

    /// List `seed<N>` directory names under a scenario folder, sorted by N.
    pub fn slot_names(&self, folder: &str) -> Vec<String> {
        let scenario_dir = self.target_root().join(folder);
        let mut names: Vec<(u32, String)> = match fs::read_dir(&scenario_dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_dir())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    let n = name.strip_prefix("seed")?.parse().ok()?;
                    Some((n, name))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names.into_iter().map(|(_, name)| name).collect()
    }

    /// Install a shell script that behaves like the simulator: it reads the
    /// `Seed` line from the control file given as `$1` and writes the artifact
    /// set into its working directory, except for the seeds in `crash_seeds`,
    /// where it leaves an empty primary artifact and still exits 0.
    #[cfg(unix)]
    pub fn install_fake_simulator(&self, crash_seeds: &[u64]) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let crash_list = crash_seeds
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let script = format!(
            "#!/bin/sh\n\
             seed=$(sed -n 's/^[^#]*Seed *= *\\([0-9][0-9]*\\).*$/\\1/p' \"$1\" | head -n 1)\n\
             echo \"$seed\" >> invocations.log\n\
             case \" {crash_list} \" in\n\
               *\" $seed \"*) : > {primary}; exit 0 ;;\n\
             esac\n\
             for f in {files}; do\n\
               printf 'seed %s\\n' \"$seed\" > \"$f\"\n\
             done\n\
             exit 0\n",
            primary = PRIMARY_ARTIFACT,
            files = DEFAULT_ARTIFACTS.join(" "),
        );

        let path = self.dir.path().join("fake-simulator.sh");
        fs::write(&path, script).expect("write fake simulator");
        let mut perms = fs::metadata(&path).expect("stat fake simulator").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod fake simulator");
        path
    }

    /// Seeds the fake simulator was invoked with, in call order.
    pub fn invocations(&self) -> Vec<u64> {
        fs::read_to_string(self.work_dir().join("invocations.log"))
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Write the full artifact set into `dir`, tagging each file with `seed`.
pub fn write_outputs(dir: &Path, seed: u64) {
    for name in DEFAULT_ARTIFACTS {
        fs::write(dir.join(name), format!("seed {seed}\n")).expect("write output");
    }
}

/// Owned copy of [`DEFAULT_ARTIFACTS`].
pub fn default_artifacts() -> Vec<String> {
    DEFAULT_ARTIFACTS.iter().map(|s| (*s).to_string()).collect()
}
