#![allow(dead_code)]

use std::path::Path;

use procpilot::config::{Profile, Step};

/// Builder for a single `Step`.
pub struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            step: Step::new(command),
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.step = self.step.with_label(label);
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.step = self.step.with_working_directory(dir.as_ref());
        self
    }

    pub fn build(self) -> Step {
        self.step
    }
}

/// Builder for `Profile`, steps kept in insertion order.
pub struct ProfileBuilder {
    name: String,
    steps: Vec<Step>,
}

impl ProfileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, command: &str) -> Self {
        self.steps.push(Step::new(command));
        self
    }

    pub fn labelled(mut self, label: &str, command: &str) -> Self {
        self.steps.push(StepBuilder::new(command).label(label).build());
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> Vec<Step> {
        self.steps.clone()
    }

    pub fn build(self) -> Profile {
        Profile::new(self.name, self.steps)
    }
}
