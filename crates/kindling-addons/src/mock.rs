//! Scripted command runner for tests
//!
//! Matches incoming commands by substring against registered rules and
//! records every call. Unmatched commands succeed with empty output, so
//! tests only script the commands they care about.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::error::{AddonError, Result};
use crate::exec::{CommandOutput, CommandRequest, CommandRunner};

enum MockResponse {
    Output(CommandOutput),
    Timeout,
    MissingBinary,
}

struct MockRule {
    needle: String,
    response: MockResponse,
}

/// Test double for [`CommandRunner`]
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Arc<RwLock<Vec<MockRule>>>,
    calls: Arc<RwLock<Vec<CommandRequest>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_rule(&self, needle: impl Into<String>, response: MockResponse) {
        self.rules.write().unwrap().push(MockRule {
            needle: needle.into(),
            response,
        });
    }

    /// Respond to commands whose command line contains `needle`
    pub fn respond(&self, needle: impl Into<String>, output: CommandOutput) {
        self.push_rule(needle, MockResponse::Output(output));
    }

    /// Shorthand for an exit code and stdout, with empty stderr
    pub fn respond_with(&self, needle: impl Into<String>, exit_code: i32, stdout: &str) {
        self.respond(
            needle,
            CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    /// Fail matching commands with a timeout error
    pub fn timeout_on(&self, needle: impl Into<String>) {
        self.push_rule(needle, MockResponse::Timeout);
    }

    /// Fail matching commands as if the binary were absent
    pub fn missing_binary_on(&self, needle: impl Into<String>) {
        self.push_rule(needle, MockResponse::MissingBinary);
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<CommandRequest> {
        self.calls.read().unwrap().clone()
    }

    /// Rendered command lines of every request, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(CommandRequest::command_line)
            .collect()
    }

    /// Number of recorded calls whose command line contains `needle`
    pub fn call_count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.calls.write().unwrap().push(request.clone());

        let line = request.command_line();
        let rules = self.rules.read().unwrap();
        for rule in rules.iter() {
            if line.contains(&rule.needle) {
                return match &rule.response {
                    MockResponse::Output(output) => Ok(output.clone()),
                    MockResponse::Timeout => Err(AddonError::CommandTimeout {
                        program: request.program.clone(),
                        seconds: request.timeout.as_secs(),
                    }),
                    MockResponse::MissingBinary => Err(AddonError::MissingBinary {
                        program: request.program.clone(),
                    }),
                };
            }
        }

        Ok(CommandOutput::default())
    }
}
