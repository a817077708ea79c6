//! Console commands
//!
//! Names are case-insensitive. A line whose first word is not a command is
//! offered to the cvar hook before it is reported as unknown.

use std::collections::HashMap;

use crate::common::com_printf;
use crate::q_shared::MAX_STRING_TOKENS;

pub type CmdFn = Box<dyn Fn(&mut CmdContext) + Send>;

/// Fallback for words that are not commands. Receives the tokens and
/// returns true when it consumed the line.
pub type CvarCommandFn = Box<dyn FnMut(&[&str]) -> bool + Send>;

struct Command {
    /// Name as registered, for listings.
    name: String,
    /// `None` for names reserved without a handler (and while running).
    function: Option<CmdFn>,
}

#[derive(Default)]
pub struct CmdContext {
    argv: Vec<String>,
    /// Raw text following the first token.
    args: String,
    commands: HashMap<String, Command>,
    pub cvar_command: Option<CvarCommandFn>,
}

impl CmdContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `text` into tokens. Double quotes group words, `//` ends the
    /// line early, and at most `MAX_STRING_TOKENS` tokens are kept.
    pub fn cmd_tokenize_string(&mut self, text: &str) {
        self.argv.clear();
        self.args.clear();

        let line = text.split('\n').next().unwrap_or("");
        let mut rest = line.trim_start();
        while !rest.is_empty() && !rest.starts_with("//") {
            if self.argv.len() == 1 {
                self.args = rest.trim_end().to_string();
            }
            let (token, tail) = next_token(rest);
            if self.argv.len() < MAX_STRING_TOKENS {
                self.argv.push(token.to_string());
            }
            rest = tail.trim_start();
        }
    }

    pub fn cmd_add_command(&mut self, name: &str, function: Option<CmdFn>) {
        let key = name.to_ascii_lowercase();
        if self.commands.contains_key(&key) {
            com_printf(&format!("Cmd_AddCommand: {} already defined\n", name));
            return;
        }
        self.commands.insert(key, Command { name: name.to_string(), function });
    }

    pub fn cmd_remove_command(&mut self, name: &str) {
        if self.commands.remove(&name.to_ascii_lowercase()).is_none() {
            com_printf(&format!("Cmd_RemoveCommand: {} not added\n", name));
        }
    }

    pub fn cmd_exists(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn cmd_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.values().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn cmd_argc(&self) -> usize {
        self.argv.len()
    }

    /// Token `arg`, or "" past the end.
    pub fn cmd_argv(&self, arg: usize) -> &str {
        self.argv.get(arg).map_or("", String::as_str)
    }

    pub fn cmd_args(&self) -> &str {
        &self.args
    }

    /// Tokenize and run one line.
    pub fn cmd_execute_string(&mut self, text: &str) {
        self.cmd_tokenize_string(text);
        let Some(first) = self.argv.first().cloned() else {
            return;
        };
        let key = first.to_ascii_lowercase();

        if let Some(command) = self.commands.get_mut(&key) {
            // the handler gets the context, so it runs detached from its entry
            if let Some(function) = command.function.take() {
                function(self);
                if let Some(command) = self.commands.get_mut(&key) {
                    command.function = Some(function);
                }
            }
            return;
        }

        if let Some(mut hook) = self.cvar_command.take() {
            let argv: Vec<&str> = self.argv.iter().map(String::as_str).collect();
            let handled = hook(&argv);
            self.cvar_command = Some(hook);
            if handled {
                return;
            }
        }

        com_printf(&format!("Unknown command \"{}\"\n", first));
    }
}

/// First token of `text` (which starts on a non-blank) and what follows it.
fn next_token(text: &str) -> (&str, &str) {
    if let Some(quoted) = text.strip_prefix('"') {
        return match quoted.find('"') {
            Some(end) => (&quoted[..end], &quoted[end + 1..]),
            None => (quoted, ""),
        };
    }
    let end = text.find(|c: char| c.is_ascii_whitespace()).unwrap_or(text.len());
    text.split_at(end)
}
