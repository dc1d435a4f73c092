//! Test double that records commands and serves scripted results.
//!
//! Commands are matched by substring against [`CommandSpec::display`].
//! One-shot responses are consulted first (in the order they were added),
//! then persistent rules; anything unmatched succeeds with empty output.

use std::sync::{Mutex, MutexGuard};

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{DeployError, DeployResult};

/// Scripted outcome for a matching command.
#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    SpawnFailure,
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    response: Response,
}

#[derive(Debug, Default)]
struct State {
    executed: Vec<CommandSpec>,
    once: Vec<Rule>,
    always: Vec<Rule>,
}

/// Records every [`CommandSpec`] it is asked to run.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    state: Mutex<State>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every command whose rendering contains `pattern` exits with
    /// `exit_code` and writes `stderr`.
    pub fn fail_when(self, pattern: &str, exit_code: i32, stderr: &str) -> Self {
        let output = CommandOutput {
            stderr: stderr.to_string(),
            ..CommandOutput::exited(exit_code)
        };
        self.respond_when(pattern, output)
    }

    /// Every command whose rendering contains `pattern` returns `output`.
    pub fn respond_when(self, pattern: &str, output: CommandOutput) -> Self {
        self.state().always.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Output(output),
        });
        self
    }

    /// The next command containing `pattern` returns `output`; later ones
    /// fall through to the persistent rules.
    pub fn respond_once(self, pattern: &str, output: CommandOutput) -> Self {
        self.state().once.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Output(output),
        });
        self
    }

    /// Commands containing `pattern` fail to start, as if the program were
    /// not installed.
    pub fn missing_program(self, pattern: &str) -> Self {
        self.state().always.push(Rule {
            pattern: pattern.to_string(),
            response: Response::SpawnFailure,
        });
        self
    }

    /// Rendered commands in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.state().executed.iter().map(CommandSpec::display).collect()
    }

    /// Raw specs in execution order.
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.state().executed.clone()
    }

    /// Number of executed commands whose rendering contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(pattern)).count()
    }

    /// Index of the first executed command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.contains(pattern))
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> DeployResult<CommandOutput> {
        let rendered = spec.display();
        let mut state = self.state();
        state.executed.push(spec.clone());

        let once_idx = state.once.iter().position(|r| rendered.contains(&r.pattern));
        let response = match once_idx {
            Some(idx) => Some(state.once.remove(idx).response),
            None => state
                .always
                .iter()
                .find(|r| rendered.contains(&r.pattern))
                .map(|r| r.response.clone()),
        };

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnFailure) => Err(DeployError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"),
            }),
            None => Ok(CommandOutput::exited(0)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
