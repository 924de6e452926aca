use serde::{Deserialize, Serialize};

use super::node::{Expr, Span, Stmt};

/// Field declared in a class body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(default)]
    pub initial: Option<Expr>,
    #[serde(default)]
    pub is_static: bool,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, initial: Option<Expr>) -> Self {
        Self {
            name: name.into(),
            initial,
            is_static: false,
        }
    }

    pub fn new_static(name: impl Into<String>, initial: Option<Expr>) -> Self {
        Self {
            name: name.into(),
            initial,
            is_static: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

/// Method or free function.
///
/// `recursive` methods may call themselves; they compile to a subroutine
/// region with stack-emulated parameters instead of being inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub span: Span,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, params: Vec<&str>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(String::from).collect(),
            body,
            recursive: false,
            is_static: false,
            span: Span::default(),
        }
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub span: Span,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.extends = Some(base.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn constructor(mut self, constructor: ConstructorDecl) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }
}
