//! Reconstruct ink script from a compiled story document.
//!
//! The compiled format nests containers as JSON arrays whose last element is
//! either `null` or an object of named sub-containers. Author-named
//! containers at the root are knots and functions; author-named containers
//! inside a knot are stitches. Everything else (gathers, choices, branches)
//! is compiler-generated and is walked in place.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::error::DecompileError;
use crate::expression::Expr;
use crate::from_json::parse_document;
use crate::registry::GlobalRegistry;
use crate::statement::{
    BlockStatement, ElseStatement, ExpressionStatement, FunctionStatement, GlobalVariableStatement,
    IfStatement, KnotStatement, Statement, StitchStatement, TopLevelStatement,
};
use crate::value::JsonValue;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const SUPPORTED_VERSIONS: RangeInclusive<i64> = 19..=21;
const GLOBAL_DECL: &str = "global decl";
/// Deepest expression the evaluator will rebuild.
const MAX_EXPRESSION_DEPTH: usize = 256;

/// A decompiled story, ready to render.
#[derive(Debug, Clone, Default)]
pub struct Story {
    pub globals: BlockStatement,
    /// Content that runs before the first knot.
    pub main: BlockStatement,
    /// Knots and functions in document order.
    pub sections: BlockStatement,
}

impl Story {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.globals.is_empty() {
            self.globals.render(&mut out, 0).push('\n');
        }
        if !self.main.is_empty() {
            self.main.render(&mut out, 0);
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        self.sections.render(&mut out, 0);
        out
    }
}

/// Naming context for one decompilation run.
pub struct Driver {
    globals: GlobalRegistry,
    identifier: Regex,
    /// Parameter count of every function, keyed by name.
    functions: HashMap<String, usize>,
}

/// Evaluation-stack state while walking a container's content.
#[derive(Default)]
struct Evaluation {
    active: bool,
    /// Text collected between `str` and `/str`.
    text: Option<String>,
    /// Expressions with their nesting depth.
    stack: Vec<(Expr, usize)>,
}

impl Evaluation {
    /// Feed `item` to an open `str` ... `/str` literal. Returns `false` when
    /// no literal is open.
    fn collect_text(&mut self, item: &JsonValue) -> bool {
        let Some(text) = self.text.as_mut() else {
            return false;
        };
        match item.as_str() {
            Some("/str") => {
                let literal = format!("\"{}\"", text);
                self.text = None;
                self.push_leaf(Expr::Literal(literal));
            }
            Some(s) if s.starts_with('^') => text.push_str(&s[1..]),
            _ => trace!("string literal: skipping {:?}", item),
        }
        true
    }

    fn push_leaf(&mut self, expr: Expr) {
        self.stack.push((expr, 1));
    }

    /// Push an expression built over operands at most `operand_depth` deep.
    fn push_composite(&mut self, expr: Expr, operand_depth: usize) -> Result<(), DecompileError> {
        let depth = operand_depth + 1;
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(DecompileError::InvalidStory(format!(
                "expression nested deeper than {} levels",
                MAX_EXPRESSION_DEPTH
            )));
        }
        self.stack.push((expr, depth));
        Ok(())
    }

    fn pop(&mut self) -> Option<Expr> {
        self.stack.pop().map(|(expr, _)| expr)
    }

    /// Pop the top `count` expressions, bottom first, with their deepest depth.
    fn pop_operands(&mut self, count: usize) -> Option<(Vec<Expr>, usize)> {
        let start = self.stack.len().checked_sub(count)?;
        Some(unzip_depth(self.stack.split_off(start)))
    }

    fn take_all(&mut self) -> (Vec<Expr>, usize) {
        unzip_depth(std::mem::take(&mut self.stack))
    }
}

fn unzip_depth(operands: Vec<(Expr, usize)>) -> (Vec<Expr>, usize) {
    let depth = operands.iter().map(|(_, depth)| *depth).max().unwrap_or(0);
    (operands.into_iter().map(|(expr, _)| expr).collect(), depth)
}

impl Driver {
    pub fn new() -> Self {
        Driver {
            globals: GlobalRegistry::new(),
            identifier: Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is valid"),
            functions: HashMap::new(),
        }
    }

    pub fn globals(&self) -> &GlobalRegistry {
        &self.globals
    }

    /// Forget everything learned from the previous story.
    pub fn reset(&mut self) {
        self.globals.reset();
        self.functions.clear();
    }

    /// Whether `name` was written by the story author rather than generated.
    pub fn is_identifier(&self, name: &str) -> bool {
        self.identifier.is_match(name)
    }

    /// Read compiled story bytes and render the reconstructed script.
    pub fn decompile(&mut self, input: &[u8]) -> Result<String, DecompileError> {
        let document = parse_document(input)?;
        Ok(self.build_story(&document)?.render())
    }

    /// Build the statement tree for a parsed story document.
    pub fn build_story(&mut self, document: &JsonValue) -> Result<Story, DecompileError> {
        self.reset();

        match document.get("inkVersion").and_then(JsonValue::as_i64) {
            Some(version) if SUPPORTED_VERSIONS.contains(&version) => {}
            Some(version) => warn!("unsupported ink version {}, output may be incomplete", version),
            None => warn!("story does not declare an ink version"),
        }
        let root = document
            .get("root")
            .and_then(JsonValue::as_array)
            .ok_or(DecompileError::MissingRoot)?;
        let (content, named) = split_container(root);

        for (name, value) in named {
            let Some(items) = value.as_array() else { continue };
            let (body, _) = split_container(items);
            if self.is_identifier(name) && returns_value(body) {
                let arity = leading_parameters(body).len();
                debug!("function {} takes {} parameters", name, arity);
                self.functions.insert(name.clone(), arity);
            }
        }

        let mut story = Story::default();
        if let Some((_, decl)) = named.iter().find(|(name, _)| name == GLOBAL_DECL) {
            let items = decl.as_array().ok_or_else(|| {
                DecompileError::InvalidStory(format!(
                    "'{}' is a {}, expected an array",
                    GLOBAL_DECL,
                    decl.type_name()
                ))
            })?;
            self.read_globals(items, &mut story.globals)?;
        }

        self.read_content(content, &mut story.main)?;

        for (name, value) in named {
            if name == GLOBAL_DECL {
                continue;
            }
            if !self.is_identifier(name) {
                debug!("skipping generated root container '{}'", name);
                continue;
            }
            match value.as_array() {
                Some(items) => story.sections.add_statement(self.read_section(name, items)?),
                None => debug!("skipping root entry '{}' ({})", name, value.type_name()),
            }
        }
        Ok(story)
    }

    fn read_globals(
        &mut self,
        items: &[JsonValue],
        globals: &mut BlockStatement,
    ) -> Result<(), DecompileError> {
        let (content, _) = split_container(items);
        let mut eval = Evaluation::default();
        for item in content {
            if eval.collect_text(item) {
                continue;
            }
            if let Some(name) = item.get("VAR=").and_then(JsonValue::as_str) {
                let value = eval
                    .pop()
                    .map(|expr| expr.to_string())
                    .unwrap_or_else(|| "0".to_string());
                globals.add_statement(GlobalVariableStatement::new(name, value, &mut self.globals));
                continue;
            }
            match item.as_str() {
                Some("ev") => eval.active = true,
                Some("/ev") => eval.active = false,
                _ => {
                    if !self.evaluate(item, &mut eval)? {
                        trace!("global decl: skipping {:?}", item);
                    }
                }
            }
        }
        Ok(())
    }

    fn read_section(&self, name: &str, items: &[JsonValue]) -> Result<Statement, DecompileError> {
        if self.functions.contains_key(name) {
            let mut function = FunctionStatement::new(name);
            let named = self.read_top_level(items, &mut function)?;
            self.read_generated(named, function.body_mut())?;
            return Ok(function.into());
        }

        let mut knot = KnotStatement::new(name);
        let named = self.read_top_level(items, &mut knot)?;
        for (child, value) in named {
            let Some(items) = value.as_array() else { continue };
            if self.is_identifier(child) {
                let mut stitch = StitchStatement::new(child.as_str());
                let generated = self.read_top_level(items, &mut stitch)?;
                self.read_generated(generated, stitch.body_mut())?;
                knot.add_stitch(stitch);
            } else {
                self.read_container(items, knot.body_mut())?;
            }
        }
        Ok(knot.into())
    }

    /// Fill in parameters and body; returns the named sub-containers.
    fn read_top_level<'v>(
        &self,
        items: &'v [JsonValue],
        section: &mut TopLevelStatement,
    ) -> Result<&'v [(String, JsonValue)], DecompileError> {
        let (content, named) = split_container(items);
        let parameters = leading_parameters(content);
        for parameter in &parameters {
            section.add_parameter(parameter.as_str(), false);
        }
        self.read_content(&content[parameters.len()..], section.body_mut())?;
        Ok(named)
    }

    fn read_generated(
        &self,
        named: &[(String, JsonValue)],
        block: &mut BlockStatement,
    ) -> Result<(), DecompileError> {
        for (_, value) in named {
            if let Some(items) = value.as_array() {
                self.read_container(items, block)?;
            }
        }
        Ok(())
    }

    /// Walk an anonymous or generated container into `block`.
    fn read_container(
        &self,
        items: &[JsonValue],
        block: &mut BlockStatement,
    ) -> Result<(), DecompileError> {
        let (content, named) = split_container(items);
        self.read_content(content, block)?;
        self.read_generated(named, block)
    }

    fn read_content(
        &self,
        content: &[JsonValue],
        block: &mut BlockStatement,
    ) -> Result<(), DecompileError> {
        let mut eval = Evaluation::default();
        let mut i = 0;
        while i < content.len() {
            let item = &content[i];
            i += 1;

            if eval.collect_text(item) {
                continue;
            }

            if let Some(statement) = self.read_assignment(item, &mut eval) {
                block.add_statement(statement);
                continue;
            }

            match item {
                JsonValue::String(command) => match command.as_str() {
                    "ev" => eval.active = true,
                    "/ev" => {
                        eval.active = false;
                        if let Some(branch) = self.read_conditional(&content[i..], &mut eval)? {
                            i += branch.consumed;
                            block.add_statement(branch.statement);
                        }
                    }
                    "pop" => match eval.pop() {
                        Some(expr) => block.add_statement(ExpressionStatement::new(Box::new(expr))),
                        None => debug!("pop with an empty evaluation stack"),
                    },
                    "~ret" => {
                        // An empty stack means `void`, the implicit return.
                        if let Some(expr) = eval.pop() {
                            block.add_statement(ExpressionStatement::new(Box::new(
                                Expr::Return(Some(Box::new(expr))),
                            )));
                        }
                    }
                    "out" => {
                        eval.pop();
                    }
                    _ if eval.active && self.evaluate(item, &mut eval)? => {}
                    _ => trace!("skipping command {:?}", command),
                },
                JsonValue::Array(items) => self.read_container(items, block)?,
                _ if eval.active && self.evaluate(item, &mut eval)? => {}
                other => trace!("skipping {:?}", other),
            }
        }
        Ok(())
    }

    /// `{"VAR=": name}` or `{"temp=": name}` consuming the evaluation stack.
    fn read_assignment(&self, item: &JsonValue, eval: &mut Evaluation) -> Option<Statement> {
        let (name, temp) = match (item.get("VAR="), item.get("temp=")) {
            (Some(name), _) => (name.as_str()?, false),
            (None, Some(name)) => (name.as_str()?, item.get("re").is_none()),
            (None, None) => return None,
        };
        let Some(value) = eval.pop() else {
            debug!("assignment to '{}' with an empty evaluation stack", name);
            return None;
        };
        Some(
            ExpressionStatement::new(Box::new(Expr::Assign {
                name: name.to_string(),
                value: Box::new(value),
                temp,
            }))
            .into(),
        )
    }

    /// Condition on the stack followed by branch containers.
    fn read_conditional(
        &self,
        rest: &[JsonValue],
        eval: &mut Evaluation,
    ) -> Result<Option<Branch>, DecompileError> {
        let Some(then_items) = rest.first().and_then(|item| branch_body(item, true)) else {
            return Ok(None);
        };
        let Some(condition) = eval.pop() else {
            return Ok(None);
        };

        let mut then_block = BlockStatement::new();
        self.read_container(then_items, &mut then_block)?;

        let condition = Box::new(condition);
        let branch = match rest.get(1).and_then(|item| branch_body(item, false)) {
            Some(else_items) => {
                let mut else_block = ElseStatement::new();
                self.read_container(else_items, &mut else_block)?;
                Branch {
                    statement: IfStatement::with_else(condition, then_block, else_block).into(),
                    consumed: 2,
                }
            }
            None => Branch {
                statement: IfStatement::new(condition, then_block).into(),
                consumed: 1,
            },
        };
        Ok(Some(branch))
    }

    /// Apply one element in evaluation mode. Returns `false` if the element
    /// is not something the evaluator understands.
    fn evaluate(&self, item: &JsonValue, eval: &mut Evaluation) -> Result<bool, DecompileError> {
        match item {
            JsonValue::Integer(n) => eval.push_leaf(Expr::Literal(n.to_string())),
            JsonValue::Float(f) => eval.push_leaf(Expr::Literal(format_float(*f))),
            JsonValue::Bool(b) => eval.push_leaf(Expr::Literal(b.to_string())),
            JsonValue::String(command) => return self.evaluate_command(command, eval),
            JsonValue::Object(_) => return self.evaluate_object(item, eval),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn evaluate_command(&self, command: &str, eval: &mut Evaluation) -> Result<bool, DecompileError> {
        match command {
            "str" => {
                eval.text = Some(String::new());
                return Ok(true);
            }
            "void" => return Ok(true),
            "du" => {
                if let Some(top) = eval.stack.last().cloned() {
                    eval.stack.push(top);
                }
                return Ok(true);
            }
            _ => {}
        }
        let (expr, operand_depth) = if let Some(op) = binary_operator(command) {
            let Some((mut operands, depth)) = eval.pop_operands(2) else {
                debug!("operator '{}' is missing operands", command);
                return Ok(true);
            };
            let rhs = operands.pop();
            let lhs = operands.pop();
            match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => (Expr::binary(op, lhs, rhs), depth),
                _ => return Ok(true),
            }
        } else if let Some(op) = unary_operator(command) {
            let Some((operand, depth)) = eval.stack.pop() else {
                debug!("operator '{}' is missing its operand", command);
                return Ok(true);
            };
            let operand = Box::new(operand);
            (Expr::Unary { op, operand }, depth)
        } else if let Some((name, arity)) = builtin_function(command) {
            let Some((args, depth)) = eval.pop_operands(arity) else {
                debug!("{} expects {} arguments", name, arity);
                return Ok(true);
            };
            let name = name.to_string();
            (Expr::Call { name, args }, depth)
        } else {
            return Ok(false);
        };
        eval.push_composite(expr, operand_depth)?;
        Ok(true)
    }

    fn evaluate_object(&self, item: &JsonValue, eval: &mut Evaluation) -> Result<bool, DecompileError> {
        let text = |key: &str| item.get(key).and_then(JsonValue::as_str);
        let expr = if let Some(name) = text("VAR?").or_else(|| text("^var")) {
            Expr::variable(name)
        } else if let Some(path) = text("CNT?") {
            Expr::ReadCount(path.to_string())
        } else if let Some(target) = text("^->") {
            Expr::DivertTarget(target.to_string())
        } else if let Some(name) = text("f()") {
            let (args, depth) = match self.functions.get(name) {
                Some(&arity) if arity <= eval.stack.len() => eval.pop_operands(arity),
                _ => None,
            }
            .unwrap_or_else(|| eval.take_all());
            let name = name.to_string();
            eval.push_composite(Expr::Call { name, args }, depth)?;
            return Ok(true);
        } else if let Some(JsonValue::Object(items)) = item.get("list") {
            let names: Vec<&str> = items.iter().map(|(name, _)| name.as_str()).collect();
            Expr::Literal(format!("({})", names.join(", ")))
        } else {
            return Ok(false);
        };
        eval.push_leaf(expr);
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

struct Branch {
    statement: Statement,
    /// Number of content elements the conditional spans after `/ev`.
    consumed: usize,
}

/// Split a container into its content and its named sub-containers.
fn split_container(items: &[JsonValue]) -> (&[JsonValue], &[(String, JsonValue)]) {
    match items.split_last() {
        Some((JsonValue::Object(named), content)) => (content, named.as_slice()),
        Some((last, content)) if last.is_null() => (content, &[]),
        _ => (items, &[]),
    }
}

/// Parameters are popped into temporaries at the start of a section, last
/// parameter first.
fn leading_parameters(content: &[JsonValue]) -> Vec<String> {
    let mut parameters: Vec<String> = content
        .iter()
        .map_while(|item| {
            if item.get("re").is_some() {
                return None;
            }
            item.get("temp=").and_then(JsonValue::as_str).map(str::to_string)
        })
        .collect();
    parameters.reverse();
    parameters
}

/// Whether a section returns through `~ret`, i.e. is a function.
fn returns_value(content: &[JsonValue]) -> bool {
    content.iter().any(|item| match item {
        JsonValue::String(command) => command == "~ret",
        JsonValue::Array(items) => returns_value(split_container(items).0),
        _ => false,
    })
}

/// Body of a `[{"->": ".^.b", "c": true}, {"b": [...]}]` branch container.
/// `conditional` selects between the guarded and the unconditional form.
fn branch_body(item: &JsonValue, conditional: bool) -> Option<&[JsonValue]> {
    let items = item.as_array()?;
    let divert = items.first()?;
    if divert.get("->").and_then(JsonValue::as_str) != Some(".^.b") {
        return None;
    }
    let guarded = divert.get("c") == Some(&JsonValue::Bool(true));
    if guarded != conditional {
        return None;
    }
    items.last()?.get("b")?.as_array()
}

fn binary_operator(command: &str) -> Option<&'static str> {
    Some(match command {
        "+" => "+",
        "-" => "-",
        "*" => "*",
        "/" => "/",
        "%" => "%",
        "==" => "==",
        "!=" => "!=",
        ">" => ">",
        "<" => "<",
        ">=" => ">=",
        "<=" => "<=",
        "&&" => "&&",
        "||" => "||",
        "?" => "?",
        "!?" => "!?",
        "^" => "^",
        _ => return None,
    })
}

fn unary_operator(command: &str) -> Option<&'static str> {
    match command {
        "_" => Some("-"),
        "!" => Some("not "),
        _ => None,
    }
}

/// Runtime commands and natives that read like function calls in script.
fn builtin_function(command: &str) -> Option<(&'static str, usize)> {
    Some(match command {
        "MIN" => ("MIN", 2),
        "MAX" => ("MAX", 2),
        "POW" => ("POW", 2),
        "FLOOR" => ("FLOOR", 1),
        "CEILING" => ("CEILING", 1),
        "INT" => ("INT", 1),
        "FLOAT" => ("FLOAT", 1),
        "rnd" => ("RANDOM", 2),
        "srnd" => ("SEED_RANDOM", 1),
        "turns" => ("TURNS", 0),
        "choiceCnt" => ("CHOICE_COUNT", 0),
        "LIST_COUNT" => ("LIST_COUNT", 1),
        "LIST_MIN" => ("LIST_MIN", 1),
        "LIST_MAX" => ("LIST_MAX", 1),
        "LIST_ALL" => ("LIST_ALL", 1),
        "LIST_INVERT" => ("LIST_INVERT", 1),
        "LIST_VALUE" => ("LIST_VALUE", 1),
        _ => return None,
    })
}

/// Whole floats keep a decimal point so they stay floats when recompiled.
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
