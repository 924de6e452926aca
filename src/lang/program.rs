use serde::{Deserialize, Serialize};

use super::class::{ClassDecl, MethodDecl};
use super::node::Rule;

/// A fully resolved program handed over by the front end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Class declarations, in source order.
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
    /// Free functions callable from any rule.
    #[serde(default)]
    pub functions: Vec<MethodDecl>,
    /// Compiled units. Each produces one action list.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_class(mut self, class: ClassDecl) -> Self {
        self.classes.push(class);
        self
    }

    pub fn with_function(mut self, function: MethodDecl) -> Self {
        self.functions.push(function);
        self
    }
}
