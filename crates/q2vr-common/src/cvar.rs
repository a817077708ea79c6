//! Console variables
//!
//! Variables live in a grow-only table, so the index handed out at
//! registration is a stable handle for the life of the context. Subsystems
//! keep handles and poll the `modified` flag once per frame instead of
//! looking names up.

use std::collections::HashMap;
use std::io::Write;

use crate::common::com_printf;
use crate::q_shared::{atof, CVAR_ARCHIVE, CVAR_LATCH, CVAR_NOSET};

#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    /// Value supplied when the variable was first registered.
    pub default_string: String,
    /// Pending value of a `CVAR_LATCH` variable.
    pub latched: Option<String>,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

impl Cvar {
    fn new(name: &str, value: &str, flags: i32) -> Self {
        Self {
            name: name.to_string(),
            string: value.to_string(),
            default_string: value.to_string(),
            latched: None,
            flags,
            modified: true,
            value: atof(value),
        }
    }

    pub fn integer(&self) -> i32 {
        self.value as i32
    }

    /// Store `value`, raising `modified` only on an actual change.
    fn assign(&mut self, value: &str) {
        if self.string != value {
            self.string = value.to_string();
            self.value = atof(value);
            self.modified = true;
        }
    }
}

/// How a write treats the protection flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Honours `CVAR_NOSET` and `CVAR_LATCH`.
    Console,
    /// Ignores both and drops any latched value.
    Force,
}

#[derive(Default)]
pub struct CvarContext {
    vars: Vec<Cvar>,
    by_name: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.handle(name).map(|h| &self.vars[h])
    }

    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |v| v.value)
    }

    pub fn variable_integer(&self, name: &str) -> i32 {
        self.find_var(name).map_or(0, Cvar::integer)
    }

    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.string.as_str())
    }

    pub fn default_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.default_string.as_str())
    }

    /// Look a variable up, registering it with `value` when it does not exist
    /// and a value was given. Flags of an existing variable are merged and its
    /// value is left alone.
    pub fn get(&mut self, name: &str, value: Option<&str>, flags: i32) -> Option<usize> {
        match self.handle(name) {
            Some(h) => {
                self.vars[h].flags |= flags;
                Some(h)
            }
            None => value.map(|value| self.register(name, value, flags)),
        }
    }

    /// [`CvarContext::get`] for callers that always supply a default.
    pub fn get_or_create(&mut self, name: &str, value: &str, flags: i32) -> usize {
        match self.handle(name) {
            Some(h) => {
                self.vars[h].flags |= flags;
                h
            }
            None => self.register(name, value, flags),
        }
    }

    fn register(&mut self, name: &str, value: &str, flags: i32) -> usize {
        let h = self.vars.len();
        self.vars.push(Cvar::new(name, value, flags));
        self.by_name.insert(name.to_string(), h);
        h
    }

    fn write(&mut self, name: &str, value: &str, access: Access) -> Option<usize> {
        let Some(h) = self.handle(name) else {
            return self.get(name, Some(value), 0);
        };
        let var = &mut self.vars[h];

        if access == Access::Force {
            var.latched = None;
            var.assign(value);
            return Some(h);
        }

        if var.flags & CVAR_NOSET != 0 {
            com_printf(&format!("{} is write protected.\n", name));
        } else if var.flags & CVAR_LATCH != 0 {
            let pending = var.latched.as_deref().unwrap_or(&var.string);
            if pending != value {
                com_printf(&format!("{} will be changed after a restart.\n", name));
                var.latched = Some(value.to_string());
            }
        } else {
            var.assign(value);
        }
        Some(h)
    }

    /// Console-style write: protected variables refuse it, latched ones
    /// defer it.
    pub fn set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.write(name, value, Access::Console)
    }

    /// Write regardless of protection flags.
    pub fn force_set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.write(name, value, Access::Force)
    }

    /// Whole numbers are stored without a fractional part.
    pub fn set_value(&mut self, name: &str, value: f32) {
        let text = if value.fract() == 0.0 { format!("{}", value as i32) } else { value.to_string() };
        self.set(name, &text);
    }

    pub fn set_integer(&mut self, name: &str, value: i32) {
        self.set(name, &value.to_string());
    }

    pub fn set_to_default(&mut self, name: &str) {
        if let Some(default) = self.find_var(name).map(|v| v.default_string.clone()) {
            self.set(name, &default);
        }
    }

    /// 0 becomes 1, anything else becomes 0.
    pub fn toggle(&mut self, name: &str) {
        let next = if self.variable_value(name) != 0.0 { "0" } else { "1" };
        self.set(name, next);
    }

    /// Promote every latched value (renderer restart).
    pub fn get_latched_vars(&mut self) {
        for var in self.vars.iter_mut() {
            if let Some(pending) = var.latched.take() {
                var.assign(&pending);
            }
        }
    }

    // ------------------------------------------------------------
    // handles
    // ------------------------------------------------------------

    pub fn value_by_handle(&self, handle: usize) -> f32 {
        self.vars.get(handle).map_or(0.0, |v| v.value)
    }

    pub fn integer_by_handle(&self, handle: usize) -> i32 {
        self.vars.get(handle).map_or(0, Cvar::integer)
    }

    pub fn string_by_handle(&self, handle: usize) -> &str {
        self.vars.get(handle).map_or("", |v| v.string.as_str())
    }

    pub fn is_modified(&self, handle: usize) -> bool {
        self.vars.get(handle).is_some_and(|v| v.modified)
    }

    pub fn set_modified(&mut self, handle: usize, modified: bool) {
        if let Some(var) = self.vars.get_mut(handle) {
            var.modified = modified;
        }
    }

    pub fn clear_modified(&mut self, handle: usize) {
        self.set_modified(handle, false);
    }

    // ------------------------------------------------------------
    // console
    // ------------------------------------------------------------

    /// `<name>` prints a variable, `<name> <value>` sets it. Returns false
    /// when the first word is not a variable.
    pub fn command(&mut self, argv: &[&str]) -> bool {
        let Some(h) = argv.first().and_then(|name| self.handle(name)) else {
            return false;
        };
        match argv.get(1) {
            None => {
                let var = &self.vars[h];
                com_printf(&format!("\"{}\" is \"{}\" default: \"{}\"\n", var.name, var.string, var.default_string));
            }
            Some(value) => {
                let name = self.vars[h].name.clone();
                self.set(&name, value);
            }
        }
        true
    }

    /// Emit a `set` line for every `CVAR_ARCHIVE` variable.
    pub fn write_variables(&self, out: &mut dyn Write) -> std::io::Result<()> {
        self.vars
            .iter()
            .filter(|v| v.flags & CVAR_ARCHIVE != 0)
            .try_for_each(|v| writeln!(out, "set {} \"{}\"", v.name, v.string))
    }
}
