//! Tree command dispatch
//!
//! The orchestration collaborator drives the tree through a closed, tagged
//! set of commands. Each command is interpreted against a tree and produces a
//! serializable [`CommandOutcome`]; failures carry the stable error code.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorReport, TreeError};
use crate::tree::VirtualFileTree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TreeCommand {
    CreateFile {
        path: String,
        #[serde(default)]
        content: String,
    },
    UpdateFile {
        path: String,
        content: String,
    },
    Delete {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    Rename {
        #[serde(alias = "old_path")]
        old_path: String,
        #[serde(alias = "new_path")]
        new_path: String,
    },
    CreateDirectory {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    ReplaceText {
        path: String,
        #[serde(alias = "old_text")]
        old_text: String,
        #[serde(alias = "new_text")]
        new_text: String,
    },
    InsertText {
        path: String,
        line: usize,
        text: String,
    },
    /// Read-only: numbered lines, optionally an inclusive 1-based range.
    #[serde(rename_all = "camelCase")]
    ViewFile {
        path: String,
        #[serde(default, alias = "view_range")]
        view_range: Option<(usize, usize)>,
    },
}

impl TreeCommand {
    /// The path the command primarily acts on.
    pub fn target(&self) -> &str {
        match self {
            TreeCommand::CreateFile { path, .. }
            | TreeCommand::UpdateFile { path, .. }
            | TreeCommand::Delete { path }
            | TreeCommand::CreateDirectory { path }
            | TreeCommand::ReplaceText { path, .. }
            | TreeCommand::InsertText { path, .. }
            | TreeCommand::ViewFile { path, .. } => path,
            TreeCommand::Rename { new_path, .. } => new_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub success: bool,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl CommandOutcome {
    fn ok(path: &str, message: String) -> Self {
        Self {
            success: true,
            path: path.to_string(),
            message,
            error: None,
        }
    }

    fn failed(path: &str, err: &TreeError) -> Self {
        Self {
            success: false,
            path: path.to_string(),
            message: err.to_string(),
            error: Some(err.report()),
        }
    }
}

/// Apply one command. Never panics; failures are reported in the outcome and
/// leave the tree unchanged.
pub fn dispatch(tree: &mut VirtualFileTree, command: &TreeCommand) -> CommandOutcome {
    debug!(command = ?command, "dispatching tree command");
    let target = command.target();
    match apply(tree, command) {
        Ok(message) => CommandOutcome::ok(target, message),
        Err(err) => CommandOutcome::failed(target, &err),
    }
}

fn apply(tree: &mut VirtualFileTree, command: &TreeCommand) -> Result<String, TreeError> {
    match command {
        TreeCommand::CreateFile { path, content } => {
            tree.create_file(path, content)?;
            Ok(format!("created {}", path))
        }
        TreeCommand::UpdateFile { path, content } => {
            tree.update_file(path, content)?;
            Ok(format!("updated {}", path))
        }
        TreeCommand::Delete { path } => {
            tree.delete_entry(path)?;
            Ok(format!("deleted {}", path))
        }
        TreeCommand::Rename { old_path, new_path } => {
            tree.rename(old_path, new_path)?;
            Ok(format!("renamed {} to {}", old_path, new_path))
        }
        TreeCommand::CreateDirectory { path } => {
            tree.create_directory(path)?;
            Ok(format!("created directory {}", path))
        }
        TreeCommand::ReplaceText {
            path,
            old_text,
            new_text,
        } => {
            let count = tree.replace_in_file(path, old_text, new_text)?;
            Ok(format!("replaced {} occurrence(s) in {}", count, path))
        }
        TreeCommand::InsertText { path, line, text } => {
            tree.insert_in_file(path, *line, text)?;
            Ok(format!("inserted text at line {} of {}", line, path))
        }
        TreeCommand::ViewFile { path, view_range } => tree.view_file(path, *view_range),
    }
}

/// Parse a JSON command and apply it.
pub fn dispatch_json(tree: &mut VirtualFileTree, command_json: &str) -> CommandOutcome {
    match serde_json::from_str::<TreeCommand>(command_json) {
        Ok(command) => dispatch(tree, &command),
        Err(e) => {
            let err = TreeError::invalid_operation("", format!("unrecognized command: {}", e));
            CommandOutcome::failed("", &err)
        }
    }
}
