/// Rule list editing with an undo stack for removals.
use thiserror::Error;

use crate::config::Rule;

/// User-facing editing failures. The GUI turns each into a dialog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("Please provide both game process name and music file.")]
    EmptyField,
    #[error("Please select a game to remove.")]
    NoSelection,
    #[error("No actions to undo.")]
    NothingToUndo,
}

/// Applies edits to a rule list and remembers removed rules so they can be restored.
#[derive(Debug, Default)]
pub struct RuleEditor {
    undo_stack: Vec<Rule>,
}

impl RuleEditor {
    /// Appends `rule`. Both fields must contain something other than whitespace.
    pub fn add(&mut self, rules: &mut Vec<Rule>, rule: Rule) -> Result<(), EditError> {
        if rule.process_match.trim().is_empty() || rule.track_path.trim().is_empty() {
            return Err(EditError::EmptyField);
        }
        rules.push(rule);
        Ok(())
    }

    /// Removes the rule at `index` and pushes it on the undo stack.
    pub fn remove(&mut self, rules: &mut Vec<Rule>, index: Option<usize>) -> Result<Rule, EditError> {
        let index = index
            .filter(|&i| i < rules.len())
            .ok_or(EditError::NoSelection)?;
        let removed = rules.remove(index);
        self.undo_stack.push(removed.clone());
        Ok(removed)
    }

    /// Appends a previously removed rule. Restores are not positional.
    pub fn restore(&mut self, rules: &mut Vec<Rule>, rule: Rule) {
        rules.push(rule);
    }

    /// Restores the most recently removed rule.
    pub fn undo(&mut self, rules: &mut Vec<Rule>) -> Result<Rule, EditError> {
        let rule = self.undo_stack.pop().ok_or(EditError::NothingToUndo)?;
        self.restore(rules, rule.clone());
        Ok(rule)
    }
}
