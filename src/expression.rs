use std::fmt;

/// Anything that can appear where the script expects a value or condition.
///
/// Statements only need to copy and print their expressions, so this is all
/// the capability they ask for.
pub trait Expression: fmt::Debug {
    /// Append the script text of this expression to `out`.
    fn render<'a>(&self, out: &'a mut String) -> &'a mut String;

    /// Deep copy behind a fresh box.
    fn clone_box(&self) -> Box<dyn Expression>;
}

impl Clone for Box<dyn Expression> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Expression tree rebuilt from an evaluation block.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Already-rendered literal text (`5`, `2.5`, `"text"`, `true`).
    Literal(String),
    Variable(String),
    /// Visit count of a named container.
    ReadCount(String),
    /// `-> target`
    DivertTarget(String),
    /// `op` is the full prefix, e.g. `-` or `not `.
    Unary { op: &'static str, operand: Box<Expr> },
    Binary {
        op: &'static str,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call { name: String, args: Vec<Expr> },
    /// `temp` marks a temporary declaration rather than a reassignment.
    Assign {
        name: String,
        value: Box<Expr>,
        temp: bool,
    },
    Return(Option<Box<Expr>>),
}

impl Expr {
    pub fn literal(text: impl Into<String>) -> Self {
        Expr::Literal(text.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn binary(op: &'static str, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn write_operand(&self, out: &mut String) {
        if matches!(self, Expr::Binary { .. }) {
            out.push('(');
            self.write(out);
            out.push(')');
        } else {
            self.write(out);
        }
    }

    /// Whether the rendered text begins with `-`.
    fn starts_with_minus(&self) -> bool {
        match self {
            Expr::Literal(text) => text.starts_with('-'),
            Expr::Unary { op, .. } => op.starts_with('-'),
            _ => false,
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            Expr::Literal(text) | Expr::Variable(text) | Expr::ReadCount(text) => {
                out.push_str(text)
            }
            Expr::DivertTarget(target) => {
                out.push_str("-> ");
                out.push_str(target);
            }
            Expr::Unary { op, operand } => {
                out.push_str(op);
                if op.ends_with('-') && operand.starts_with_minus() {
                    out.push('(');
                    operand.write(out);
                    out.push(')');
                } else {
                    operand.write_operand(out);
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                lhs.write_operand(out);
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                rhs.write_operand(out);
            }
            Expr::Call { name, args } => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    arg.write(out);
                }
                out.push(')');
            }
            Expr::Assign { name, value, temp } => {
                if *temp {
                    out.push_str("temp ");
                }
                out.push_str(name);
                out.push_str(" = ");
                value.write(out);
            }
            Expr::Return(value) => {
                out.push_str("return");
                if let Some(value) = value {
                    out.push(' ');
                    value.write(out);
                }
            }
        }
    }
}

impl Expression for Expr {
    fn render<'a>(&self, out: &'a mut String) -> &'a mut String {
        self.write(out);
        out
    }

    fn clone_box(&self) -> Box<dyn Expression> {
        Box::new(self.clone())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_binary_operands_are_parenthesised() {
        let expr = Expr::binary(
            "*",
            Expr::binary("+", Expr::variable("a"), Expr::literal("1")),
            Expr::variable("b"),
        );
        assert_eq!(expr.to_string(), "(a + 1) * b");
    }

    #[test]
    fn unary_and_calls() {
        let expr = Expr::Unary {
            op: "not ",
            operand: Box::new(Expr::Call {
                name: "MIN".to_string(),
                args: vec![Expr::variable("x"), Expr::literal("3")],
            }),
        };
        assert_eq!(expr.to_string(), "not MIN(x, 3)");
    }

    #[test]
    fn assignment_and_return() {
        let assign = Expr::Assign {
            name: "gold".to_string(),
            value: Box::new(Expr::binary("-", Expr::variable("gold"), Expr::literal("5"))),
            temp: true,
        };
        assert_eq!(assign.to_string(), "temp gold = gold - 5");
        assert_eq!(Expr::Return(None).to_string(), "return");
        assert_eq!(
            Expr::Return(Some(Box::new(Expr::DivertTarget("end".to_string())))).to_string(),
            "return -> end"
        );
    }

    #[test]
    fn boxed_clone_is_independent() {
        let original: Box<dyn Expression> = Box::new(Expr::variable("x"));
        let copy = original.clone();
        drop(original);
        let mut out = String::new();
        assert_eq!(copy.render(&mut out), "x");
    }

    #[test]
    fn negating_a_negative_operand_is_parenthesised() {
        let negate = |operand| Expr::Unary {
            op: "-",
            operand: Box::new(operand),
        };
        assert_eq!(negate(Expr::literal("-3")).to_string(), "-(-3)");
        assert_eq!(negate(negate(Expr::variable("x"))).to_string(), "-(-x)");
        assert_eq!(negate(Expr::literal("3")).to_string(), "-3");
        assert_eq!(
            negate(Expr::binary("-", Expr::variable("a"), Expr::variable("b"))).to_string(),
            "-(a - b)"
        );
    }
}
