use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Process environment seen by commands: variables, files and stdin.
#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, env::VarError>;

    // File System
    fn read_to_string(&self, path: &Path) -> Result<String>;

    // Standard input
    fn read_stdin(&self) -> Result<String>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    #[tracing::instrument(skip(self))]
    fn env_var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))
    }

    #[tracing::instrument(skip(self))]
    fn read_stdin(&self) -> Result<String> {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read from standard input")?;
        Ok(input)
    }
}
