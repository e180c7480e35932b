//! Bundled demo experiments.
use anyhow::{Context, Result, ensure};
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::Path;

/// The directory containing the demo experiments.
const DEMOS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/demos");

/// The name of the experiment configuration file in every demo
pub const DEMO_CONFIG_FILE_NAME: &str = "experiment.yaml";

/// Get the names of all demos
pub fn get_demo_names() -> impl Iterator<Item = &'static str> {
    DEMOS_DIR.dirs().map(|dir| {
        dir.path()
            .as_os_str()
            .to_str()
            .expect("Invalid unicode in path")
    })
}

/// A bundled demo experiment
pub struct Demo(Dir<'static>);

impl Demo {
    /// Get the demo with the specified name
    pub fn from_name(name: &str) -> Result<Self> {
        let dir = DEMOS_DIR
            .get_dir(name)
            .with_context(|| format!("Demo '{name}' not found"))?;

        Ok(Self(dir.clone()))
    }

    /// Get the contents of the readme file for this demo
    pub fn get_readme(&self) -> Result<&'static str> {
        self.0
            .get_file(self.0.path().join("README.txt"))
            .context("Missing file")?
            .contents_utf8()
            .context("File not UTF-8 encoded")
    }

    /// Extract this demo to a new folder
    pub fn extract(&self, new_path: &Path) -> Result<()> {
        ensure!(
            !new_path.exists(),
            "Destination {} already exists",
            new_path.display()
        );
        fs::create_dir_all(new_path)
            .with_context(|| format!("Could not create {}", new_path.display()))?;
        for entry in self.0.entries() {
            match entry {
                DirEntry::Dir(_) => panic!("Subdirectories in demos not supported"),
                DirEntry::File(f) => {
                    let file_name = f.path().file_name().expect("Demo file has a name");
                    fs::write(new_path.join(file_name), f.contents())?;
                }
            }
        }

        Ok(())
    }
}
