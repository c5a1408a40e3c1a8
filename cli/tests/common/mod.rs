//! Common test utilities and fixtures
//!
//! Every test gets its own home directory, a config file inside it and a
//! `file:` repository to publish artifacts into.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Fixture {
    pub home: TempDir,
    pub remote: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            home: TempDir::new().expect("Failed to create temp home"),
            remote: TempDir::new().expect("Failed to create temp repository"),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.path().join("config.toml")
    }

    pub fn local_store(&self) -> PathBuf {
        self.home.path().join("store")
    }

    pub fn remote_url(&self) -> String {
        format!("file://{}", self.remote.path().display())
    }

    /// Write a config with a local store inside the home dir, followed by `extra`
    pub fn write_config(&self, extra: &str) {
        let content = format!(
            "local_store = \"{}\"\n\n{extra}",
            self.local_store().display()
        );
        fs::write(self.config_path(), content).expect("Failed to write config");
    }

    /// Config with the fixture's remote as repository `files`
    pub fn write_repository_config(&self) {
        self.write_config(&format!(
            "[[repositories]]\nid = \"files\"\nurl = \"{}\"\n",
            self.remote_url()
        ));
    }

    /// Place `content` at `relative` inside the remote repository
    pub fn publish(&self, relative: &str, content: &str) {
        publish(self.remote.path(), relative, content);
    }

    /// `depot` with HOME, XDG dirs and the config pointed into the fixture
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("depot").expect("depot binary");
        cmd.env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path().join(".config"))
            .env("XDG_DATA_HOME", self.home.path().join(".local/share"))
            .env("DEPOT_CONFIG", self.config_path())
            .env_remove("RUST_LOG");
        cmd
    }
}

pub fn publish(repo: &Path, relative: &str, content: &str) {
    let path = repo.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("Failed to create repository dirs");
    fs::write(path, content).expect("Failed to publish");
}
