//! Test doubles for [`CommandRunner`].

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{Result, ToolchainError};
use crate::process::{CommandLine, CommandRunner};

enum Reply {
    Output(String),
    Fail(i32),
}

/// Records every command and answers from a list of prefix rules.
///
/// The first rule whose prefix matches the rendered command wins. Commands
/// with no matching rule succeed with empty output.
#[derive(Default)]
pub struct MockRunner {
    rules: Vec<(String, Reply)>,
    commands: Mutex<Vec<CommandLine>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, prefix: &str, stdout: &str) -> Self {
        self.rules
            .push((prefix.to_string(), Reply::Output(stdout.to_string())));
        self
    }

    pub fn fail(mut self, prefix: &str, status: i32) -> Self {
        self.rules.push((prefix.to_string(), Reply::Fail(status)));
        self
    }

    /// Rendered commands in the order they were issued.
    pub fn calls(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }

    pub fn commands(&self) -> Vec<CommandLine> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &CommandLine) -> Result<String> {
        let rendered = command.to_string();
        self.commands.lock().unwrap().push(command.clone());

        match self.rules.iter().find(|(prefix, _)| rendered.starts_with(prefix)) {
            Some((_, Reply::Output(out))) => Ok(out.clone()),
            Some((_, Reply::Fail(status))) => Err(ToolchainError::Execution {
                command: rendered,
                status: *status,
                stderr: String::new(),
            }),
            None => Ok(String::new()),
        }
    }
}

/// A tiny in-memory container engine that understands the handful of
/// container commands the lifecycle manager issues.
#[derive(Default)]
pub struct FakeEngine {
    /// (id, name) of every existing container
    containers: Mutex<Vec<(String, String)>>,
    next_id: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a container with `name` already exists.
    pub fn with_container(self, name: &str) -> Self {
        self.create(name);
        self
    }

    pub fn container_names(&self) -> BTreeSet<String> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, n)| n == name)
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn create(&self, name: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = format!("c{:04}", *next);
        self.containers
            .lock()
            .unwrap()
            .push((id.clone(), name.to_string()));
        id
    }
}

#[async_trait]
impl CommandRunner for FakeEngine {
    async fn run(&self, command: &CommandLine) -> Result<String> {
        self.calls.lock().unwrap().push(command.to_string());
        let args: Vec<&str> = command.get_args().iter().map(String::as_str).collect();

        match args.as_slice() {
            ["container", "ls", "-qa", "-f", filter] => {
                let name = filter
                    .trim_start_matches("name=^/")
                    .trim_end_matches('$')
                    .to_string();
                let ids: Vec<String> = self
                    .containers
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|(_, n)| *n == name)
                    .map(|(id, _)| format!("{}\n", id))
                    .collect();
                Ok(ids.concat())
            }
            ["container", "rm", "-f", ids @ ..] => {
                self.containers
                    .lock()
                    .unwrap()
                    .retain(|(id, _)| !ids.contains(&id.as_str()));
                Ok(String::new())
            }
            ["run", name_arg, ..] => {
                let name = name_arg.trim_start_matches("--name=");
                if self.count_named(name) > 0 {
                    return Err(ToolchainError::Execution {
                        command: command.to_string(),
                        status: 125,
                        stderr: format!("Conflict. The container name \"/{}\" is already in use", name),
                    });
                }
                Ok(format!("{}\n", self.create(name)))
            }
            _ => Ok(String::new()),
        }
    }
}
