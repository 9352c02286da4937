//! Statement tree for reconstructed ink script.
//!
//! Every node renders itself at a given indent (in spaces) and clones into a
//! fully independent subtree. Composite nodes that extend a base construct
//! (an else branch is a block, a knot is a top-level section) wrap that base
//! and expose it through `Deref`.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::expression::Expression;
use crate::registry::GlobalRegistry;

/// Spaces added per nesting level.
pub const INDENT_STEP: usize = 4;

fn write_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

/// A node of the statement tree.
#[derive(Debug, Clone)]
pub enum Statement {
    Set(SetStatement),
    Expression(ExpressionStatement),
    Block(BlockStatement),
    Else(ElseStatement),
    If(IfStatement),
    GlobalVariable(GlobalVariableStatement),
    Stitch(StitchStatement),
    Knot(KnotStatement),
    Function(FunctionStatement),
}

impl Statement {
    /// Append this statement's script text, starting at `indent`.
    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        match self {
            Statement::Set(s) => s.render(out, indent),
            Statement::Expression(s) => s.render(out, indent),
            Statement::Block(s) => s.render(out, indent),
            Statement::Else(s) => s.render(out, indent),
            Statement::If(s) => s.render(out, indent),
            Statement::GlobalVariable(s) => s.render(out, indent),
            Statement::Stitch(s) => s.render(out, indent),
            Statement::Knot(s) => s.render(out, indent),
            Statement::Function(s) => s.render(out, indent),
        }
    }

    /// Whether the node wraps a single inline construct rather than being a
    /// composite block. No node currently answers `false`; containers may
    /// consult it to special-case formatting of simple children.
    pub fn is_simple(&self) -> bool {
        match self {
            Statement::Set(_)
            | Statement::Expression(_)
            | Statement::Block(_)
            | Statement::Else(_)
            | Statement::If(_)
            | Statement::GlobalVariable(_)
            | Statement::Stitch(_)
            | Statement::Knot(_)
            | Statement::Function(_) => true,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        f.write_str(self.render(&mut out, 0))
    }
}

macro_rules! impl_from_statement {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Statement {
                fn from(s: $ty) -> Self {
                    Statement::$variant(s)
                }
            }
        )*
    };
}

impl_from_statement!(
    Set(SetStatement),
    Expression(ExpressionStatement),
    Block(BlockStatement),
    Else(ElseStatement),
    If(IfStatement),
    GlobalVariable(GlobalVariableStatement),
    Stitch(StitchStatement),
    Knot(KnotStatement),
    Function(FunctionStatement),
);

// ── Simple statements ───────────────────────────────────────────────

/// `~ name`: a variable assignment directive. Not newline-terminated.
#[derive(Debug, Clone, PartialEq)]
pub struct SetStatement {
    name: String,
}

impl SetStatement {
    pub fn new(name: impl Into<String>) -> Self {
        SetStatement { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        write_indent(out, indent);
        out.push_str("~ ");
        out.push_str(&self.name);
        out
    }
}

/// `~ <expression>` on its own line.
#[derive(Debug, Clone)]
pub struct ExpressionStatement {
    expression: Box<dyn Expression>,
}

impl ExpressionStatement {
    pub fn new(expression: Box<dyn Expression>) -> Self {
        ExpressionStatement { expression }
    }

    pub fn expression(&self) -> &dyn Expression {
        self.expression.as_ref()
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        write_indent(out, indent);
        out.push_str("~ ");
        self.expression.render(out).push('\n');
        out
    }
}

/// `VAR name = value`. The value is pre-rendered text.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariableStatement {
    name: String,
    value: String,
}

impl GlobalVariableStatement {
    /// Create the declaration and register `name` in `globals`.
    pub fn new(name: impl Into<String>, value: impl Into<String>, globals: &mut GlobalRegistry) -> Self {
        let name = name.into();
        if !globals.add_global(name.clone()) {
            tracing::warn!("global variable '{}' declared more than once", name);
        }
        GlobalVariableStatement {
            name,
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Declarations always start at column 0.
    pub fn render<'a>(&self, out: &'a mut String, _indent: usize) -> &'a mut String {
        out.push_str("VAR ");
        out.push_str(&self.name);
        out.push_str(" = ");
        out.push_str(&self.value);
        out.push('\n');
        out
    }
}

// ── Blocks and conditionals ─────────────────────────────────────────

/// An ordered sequence of statements rendered back to back.
#[derive(Debug, Clone, Default)]
pub struct BlockStatement {
    statements: Vec<Statement>,
}

impl BlockStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_statement(&mut self, statement: impl Into<Statement>) {
        self.statements.push(statement.into());
    }

    /// Move every statement of `donor` to the end of this block, leaving
    /// `donor` empty.
    pub fn steal_statements(&mut self, donor: &mut BlockStatement) {
        self.statements.append(&mut donor.statements);
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn statements_mut(&mut self) -> &mut Vec<Statement> {
        &mut self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        for statement in &self.statements {
            statement.render(out, indent);
        }
        out
    }
}

/// `- else:` followed by its body one level deeper.
#[derive(Debug, Clone, Default)]
pub struct ElseStatement {
    body: BlockStatement,
}

impl ElseStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        write_indent(out, indent);
        out.push_str("- else:\n");
        self.body.render(out, indent + INDENT_STEP)
    }
}

impl Deref for ElseStatement {
    type Target = BlockStatement;

    fn deref(&self) -> &BlockStatement {
        &self.body
    }
}

impl DerefMut for ElseStatement {
    fn deref_mut(&mut self) -> &mut BlockStatement {
        &mut self.body
    }
}

/// `- <condition>` with a then branch and an optional else branch.
///
/// The else branch is any statement: an [`ElseStatement`], or another
/// `IfStatement` for else-if chains.
#[derive(Debug, Clone)]
pub struct IfStatement {
    condition: Box<dyn Expression>,
    then_branch: Box<Statement>,
    else_branch: Option<Box<Statement>>,
}

impl IfStatement {
    pub fn new(condition: Box<dyn Expression>, then_branch: impl Into<Statement>) -> Self {
        IfStatement {
            condition,
            then_branch: Box::new(then_branch.into()),
            else_branch: None,
        }
    }

    pub fn with_else(
        condition: Box<dyn Expression>,
        then_branch: impl Into<Statement>,
        else_branch: impl Into<Statement>,
    ) -> Self {
        IfStatement {
            condition,
            then_branch: Box::new(then_branch.into()),
            else_branch: Some(Box::new(else_branch.into())),
        }
    }

    pub fn condition(&self) -> &dyn Expression {
        self.condition.as_ref()
    }

    pub fn then_branch_mut(&mut self) -> &mut Statement {
        &mut self.then_branch
    }

    pub fn else_branch_mut(&mut self) -> Option<&mut Statement> {
        self.else_branch.as_deref_mut()
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        write_indent(out, indent);
        out.push_str("- ");
        self.condition.render(out).push('\n');
        self.then_branch.render(out, indent + INDENT_STEP);
        if let Some(else_branch) = &self.else_branch {
            else_branch.render(out, indent).push('\n');
        }
        out
    }
}

// ── Top-level sections ──────────────────────────────────────────────

/// Shared part of knots, stitches and functions: a name, an ordered
/// parameter list and a body.
#[derive(Debug, Clone)]
pub struct TopLevelStatement {
    name: String,
    /// Parameter name and whether it is passed by reference, in declaration order.
    parameters: Vec<(String, bool)>,
    body: BlockStatement,
}

impl TopLevelStatement {
    pub fn new(name: impl Into<String>) -> Self {
        TopLevelStatement {
            name: name.into(),
            parameters: Vec::new(),
            body: BlockStatement::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[(String, bool)] {
        &self.parameters
    }

    /// Append a parameter, or update its flag if the name is already listed.
    pub fn add_parameter(&mut self, name: impl Into<String>, by_ref: bool) {
        let name = name.into();
        match self.parameters.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, flag)) => *flag = by_ref,
            None => self.parameters.push((name, by_ref)),
        }
    }

    pub fn body(&self) -> &BlockStatement {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut BlockStatement {
        &mut self.body
    }

    pub fn add_statement(&mut self, statement: impl Into<Statement>) {
        self.body.add_statement(statement);
    }

    /// `name` or `name(a, ref b)`.
    fn write_header_base(&self, out: &mut String) {
        out.push_str(&self.name);
        if self.parameters.is_empty() {
            return;
        }
        out.push('(');
        for (i, (name, by_ref)) in self.parameters.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if *by_ref {
                out.push_str("ref ");
            }
            out.push_str(name);
        }
        out.push(')');
    }

    fn render_body<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        self.body.render(out, indent).push('\n');
        out
    }
}

macro_rules! top_level_deref {
    ($($ty:ty),*) => {
        $(
            impl Deref for $ty {
                type Target = TopLevelStatement;

                fn deref(&self) -> &TopLevelStatement {
                    &self.base
                }
            }

            impl DerefMut for $ty {
                fn deref_mut(&mut self) -> &mut TopLevelStatement {
                    &mut self.base
                }
            }
        )*
    };
}

/// `= name`, a sub-section of a knot.
#[derive(Debug, Clone)]
pub struct StitchStatement {
    base: TopLevelStatement,
}

impl StitchStatement {
    pub fn new(name: impl Into<String>) -> Self {
        StitchStatement {
            base: TopLevelStatement::new(name),
        }
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        out.push_str("= ");
        self.base.write_header_base(out);
        out.push('\n');
        self.base.render_body(out, indent)
    }
}

/// `=== name ===`, a top-level section owning its stitches.
#[derive(Debug, Clone)]
pub struct KnotStatement {
    base: TopLevelStatement,
    stitches: Vec<StitchStatement>,
}

impl KnotStatement {
    pub fn new(name: impl Into<String>) -> Self {
        KnotStatement {
            base: TopLevelStatement::new(name),
            stitches: Vec::new(),
        }
    }

    /// Add a stitch. A stitch named like the knot is the knot's entry body:
    /// its statements join the knot's own body and the wrapper is dropped.
    pub fn add_stitch(&mut self, mut stitch: StitchStatement) {
        if stitch.name() == self.name() {
            self.base.body.steal_statements(&mut stitch.base.body);
        } else {
            self.stitches.push(stitch);
        }
    }

    pub fn stitches(&self) -> &[StitchStatement] {
        &self.stitches
    }

    pub fn stitches_mut(&mut self) -> &mut [StitchStatement] {
        &mut self.stitches
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        out.push_str("=== ");
        self.base.write_header_base(out);
        out.push_str(" ===\n");
        self.base.render_body(out, indent).push('\n');
        for stitch in &self.stitches {
            stitch.render(out, indent);
        }
        out.push('\n');
        out
    }
}

/// `=== function name ===`
#[derive(Debug, Clone)]
pub struct FunctionStatement {
    base: TopLevelStatement,
}

impl FunctionStatement {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionStatement {
            base: TopLevelStatement::new(name),
        }
    }

    pub fn render<'a>(&self, out: &'a mut String, indent: usize) -> &'a mut String {
        out.push_str("=== function ");
        self.base.write_header_base(out);
        out.push_str(" ===\n");
        self.base.render_body(out, indent)
    }
}

top_level_deref!(StitchStatement, KnotStatement, FunctionStatement);
