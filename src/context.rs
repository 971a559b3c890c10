use std::borrow::Cow;

use crate::eval::{Map, Value};

/// Stack of variable scopes for one render.
///
/// The bottom scope is the caller's data, borrowed until something is bound
/// into it. Lookups only see the top scope: a loop scope fully shadows
/// everything below it.
#[derive(Debug)]
pub struct Context<'a> {
    root: Cow<'a, Map>,
    frames: Vec<Map>,
}

impl<'a> Context<'a> {
    pub fn new(data: &'a Map) -> Self {
        Self {
            root: Cow::Borrowed(data),
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Map::new());
    }

    /// Remove the top scope. The bottom scope is never removed; popping it
    /// returns `None`.
    pub fn pop(&mut self) -> Option<Map> {
        self.frames.pop()
    }

    /// Run `f` inside a fresh scope, popping it afterwards.
    pub fn with_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push();
        let result = f(self);
        self.pop();
        result
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let top = match self.frames.last_mut() {
            Some(frame) => frame,
            None => self.root.to_mut(),
        };
        top.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.current().get(name)
    }

    pub fn current(&self) -> &Map {
        self.frames.last().unwrap_or(&*self.root)
    }

    pub fn depth(&self) -> usize {
        self.frames.len() + 1
    }
}
