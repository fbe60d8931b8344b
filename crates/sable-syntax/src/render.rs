//! Python-like pretty printer for trees.
//!
//! Meant for debug output and golden tests, not for round-tripping: local
//! identifiers render in their delocalized dotted spelling so scope rewrites
//! stay visible in dumps.

use std::fmt::Write as _;

use crate::ast::{
    ArgKind, Argument, ClassDef, Define, Expr, Literal, Parameter, ParameterKind, SourceUnit, Stmt,
};

pub fn render_unit(unit: &SourceUnit) -> String {
    let mut printer = Printer::new();
    printer.statements(&unit.statements);
    printer.finish()
}

pub fn render_define(define: &Define) -> String {
    let mut printer = Printer::new();
    printer.define(define);
    printer.finish()
}

pub fn render_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Printer {
            out: String::new(),
            indent: 0,
        }
    }

    fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn statements(&mut self, statements: &[Stmt]) {
        if statements.is_empty() {
            self.line("pass");
            return;
        }
        for stmt in statements {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Define(define) => self.define(define),
            Stmt::Class(class) => self.class(class),
            Stmt::Return { value, .. } => match value {
                Some(value) => {
                    let text = format!("return {}", render_expr(value));
                    self.line(&text);
                }
                None => self.line("return"),
            },
            Stmt::Assign {
                target,
                annotation,
                value,
                ..
            } => {
                let mut text = render_expr(target);
                if let Some(annotation) = annotation {
                    let _ = write!(text, ": {}", render_expr(annotation));
                }
                let _ = write!(text, " = {}", render_expr(value));
                self.line(&text);
            }
            Stmt::Expression(expr) => {
                let text = render_expr(expr);
                self.line(&text);
            }
            Stmt::If {
                test, body, orelse, ..
            } => {
                let text = format!("if {}:", render_expr(test));
                self.line(&text);
                self.indent += 1;
                self.statements(body);
                self.indent -= 1;
                if !orelse.is_empty() {
                    self.line("else:");
                    self.indent += 1;
                    self.statements(orelse);
                    self.indent -= 1;
                }
            }
            Stmt::Pass { .. } => self.line("pass"),
        }
    }

    fn define(&mut self, define: &Define) {
        for decorator in &define.decorators {
            let text = format!("@{}", render_expr(decorator));
            self.line(&text);
        }
        let mut header = format!("def {}(", define.name);
        let params: Vec<String> = define.parameters.iter().map(render_parameter).collect();
        header.push_str(&params.join(", "));
        header.push(')');
        if let Some(annotation) = &define.return_annotation {
            let _ = write!(header, " -> {}", render_expr(annotation));
        }
        header.push(':');
        self.line(&header);
        self.indent += 1;
        self.statements(&define.body);
        self.indent -= 1;
    }

    fn class(&mut self, class: &ClassDef) {
        for decorator in &class.decorators {
            let text = format!("@{}", render_expr(decorator));
            self.line(&text);
        }
        let mut header = format!("class {}", class.name);
        if !class.bases.is_empty() {
            let bases: Vec<String> = class.bases.iter().map(render_expr).collect();
            let _ = write!(header, "({})", bases.join(", "));
        }
        header.push(':');
        self.line(&header);
        self.indent += 1;
        self.statements(&class.body);
        self.indent -= 1;
    }
}

fn render_parameter(parameter: &Parameter) -> String {
    let mut text = match parameter.kind {
        ParameterKind::Named => String::new(),
        ParameterKind::Star => "*".to_string(),
        ParameterKind::DoubleStar => "**".to_string(),
    };
    text.push_str(parameter.name.name());
    if let Some(annotation) = &parameter.annotation {
        let _ = write!(text, ": {}", render_expr(annotation));
    }
    if let Some(default) = &parameter.default {
        let _ = write!(text, " = {}", render_expr(default));
    }
    text
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Name { id, .. } => {
            let _ = write!(out, "{}", id.delocalize());
        }
        Expr::Attribute { base, attr, .. } => {
            write_expr(out, base);
            let _ = write!(out, ".{attr}");
        }
        Expr::Call {
            callee, arguments, ..
        } => {
            write_expr(out, callee);
            out.push('(');
            for (index, argument) in arguments.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_argument(out, argument);
            }
            out.push(')');
        }
        Expr::Tuple { items, .. } => {
            out.push('(');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_expr(out, item);
            }
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Expr::Dict { entries, .. } => {
            out.push('{');
            for (index, entry) in entries.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                match &entry.key {
                    Some(key) => {
                        write_expr(out, key);
                        out.push_str(": ");
                        write_expr(out, &entry.value);
                    }
                    None => {
                        out.push_str("**");
                        write_expr(out, &entry.value);
                    }
                }
            }
            out.push('}');
        }
        Expr::Starred { value, .. } => {
            out.push('*');
            write_expr(out, value);
        }
        Expr::Literal { value, .. } => match value {
            Literal::Int(value) => {
                let _ = write!(out, "{value}");
            }
            Literal::Str(value) => {
                let _ = write!(out, "\"{value}\"");
            }
            Literal::Bool(true) => out.push_str("True"),
            Literal::Bool(false) => out.push_str("False"),
            Literal::None => out.push_str("None"),
        },
    }
}

fn write_argument(out: &mut String, argument: &Argument) {
    match &argument.kind {
        ArgKind::Positional => {}
        ArgKind::Keyword(name) => {
            let _ = write!(out, "{name}=");
        }
        ArgKind::Star => out.push('*'),
        ArgKind::DoubleStar => out.push_str("**"),
    }
    write_expr(out, &argument.value);
}
