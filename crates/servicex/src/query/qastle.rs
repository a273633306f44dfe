//! Rendering of expression trees as qastle text.
//!
//! Qastle is a parenthesized prefix notation. Query operators
//! (`Select`, `Where`, ...) get their own nodes, whether written as a bare
//! call `Select(source, f)` or as a method call `source.Select(f)`.

use super::ast::{BoolOp, Constant, Expr, UnaryOp};

/// Names rendered as dedicated qastle nodes instead of `call`.
pub const LINQ_OPERATORS: &[&str] = &[
    "Select",
    "SelectMany",
    "Where",
    "First",
    "Last",
    "ElementAt",
    "Contains",
    "Aggregate",
    "Count",
    "Max",
    "Min",
    "Sum",
    "Zip",
    "OrderBy",
    "OrderByDescending",
    "Choose",
    "Concat",
];

pub fn is_linq_operator(name: &str) -> bool {
    LINQ_OPERATORS.contains(&name)
}

/// Renders `expr` as qastle text.
pub fn to_qastle(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

fn write_node(head: &str, children: &[&Expr], out: &mut String) {
    out.push('(');
    out.push_str(head);
    for child in children {
        out.push(' ');
        write_expr(child, out);
    }
    out.push(')');
}

fn write_list(items: &[Expr], out: &mut String) {
    out.push_str("(list");
    for item in items {
        out.push(' ');
        write_expr(item, out);
    }
    out.push(')');
}

fn write_string(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn write_constant(constant: &Constant, out: &mut String) {
    match constant {
        Constant::Int(i) => out.push_str(&i.to_string()),
        // Debug keeps the fractional part: 1000.0, not 1000.
        Constant::Float(f) => out.push_str(&format!("{:?}", f)),
        Constant::Str(s) => write_string(s, out),
        Constant::Bool(true) => out.push_str("True"),
        Constant::Bool(false) => out.push_str("False"),
        Constant::None => out.push_str("None"),
    }
}

fn write_call(func: &Expr, args: &[Expr], out: &mut String) {
    match func {
        Expr::Name(name) if is_linq_operator(name) => {
            out.push('(');
            out.push_str(name);
            for arg in args {
                out.push(' ');
                write_expr(arg, out);
            }
            out.push(')');
        }
        Expr::Attribute { value, attr } if is_linq_operator(attr) => {
            out.push('(');
            out.push_str(attr);
            out.push(' ');
            write_expr(value, out);
            for arg in args {
                out.push(' ');
                write_expr(arg, out);
            }
            out.push(')');
        }
        _ => {
            out.push_str("(call ");
            write_expr(func, out);
            for arg in args {
                out.push(' ');
                write_expr(arg, out);
            }
            out.push(')');
        }
    }
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Name(id) => out.push_str(id),
        Expr::Constant(c) => write_constant(c, out),
        Expr::List(items) | Expr::Tuple(items) => write_list(items, out),
        Expr::Dict { keys, values } => {
            out.push_str("(dict ");
            write_list(keys, out);
            out.push(' ');
            write_list(values, out);
            out.push(')');
        }
        Expr::Attribute { value, attr } => {
            out.push_str("(attr ");
            write_expr(value, out);
            out.push(' ');
            write_string(attr, out);
            out.push(')');
        }
        Expr::Subscript { value, index } => write_node("subscript", &[value, index], out),
        Expr::Call { func, args } => write_call(func, args, out),
        Expr::Lambda { args, body } => {
            out.push_str("(lambda (list");
            for arg in args {
                out.push(' ');
                out.push_str(arg);
            }
            out.push_str(") ");
            write_expr(body, out);
            out.push(')');
        }
        Expr::BinOp { op, left, right } => write_node(op.symbol(), &[left, right], out),
        Expr::BoolOp { op, left, right } => {
            let head = match op {
                BoolOp::And => "and",
                BoolOp::Or => "or",
            };
            write_node(head, &[left, right], out);
        }
        Expr::UnaryOp { op, operand } => {
            let head = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "not",
            };
            write_node(head, &[operand], out);
        }
        Expr::Compare { op, left, right } => write_node(op.symbol(), &[left, right], out),
        Expr::IfExp { test, body, orelse } => write_node("if", &[test, body, orelse], out),
    }
}
