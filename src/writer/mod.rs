//! NWScript-like source rendering of expression trees.
//!
//! [`SourceWriter`] prints the globals of a tree followed by its functions, last entry
//! point first, as indented pseudo-source with Allman braces. Every expression kind has
//! exactly one textual form:
//!
//! | Expression | Form |
//! |------------|------|
//! | local / return value | `var_<offset>[_<suffix>]` |
//! | argument | `arg_<n>` |
//! | global | `glob_<offset>` |
//! | label | `loc_<offset>:` |
//! | declaring assignment | `type name = value` |
//! | bare parameter | `type name` |
//! | action / call | `name(args)` |
//! | vector | `vector(x, y, z)`, component `v.x` |
//! | conditional | `if (test)` followed by its block |
//!
//! Nested binary operands are parenthesized. Rendered blocks are memoized per block and
//! nesting level, so a block shared by several conditionals is laid out once.
//!
//! # Examples
//!
//! ```rust,ignore
//! use scriptscope::prelude::*;
//!
//! let source = SourceWriter::new(&tree, &routines, WriterConfig::default()).render()?;
//! println!("{source}");
//! ```

use std::fmt::Write;

use rustc_hash::FxHashMap;

use crate::{
    bytecode::Routines,
    config::WriterConfig,
    tree::{
        ExprId, Expression, ExpressionKind, ExpressionTree, FunctionId, ParameterExpression,
        ParameterLocality,
    },
    Error, Result,
};

/// Renders an [`ExpressionTree`] as source text.
pub struct SourceWriter<'a> {
    tree: &'a ExpressionTree,
    routines: &'a dyn Routines,
    config: WriterConfig,
}

type BlockCache = FxHashMap<(ExprId, usize), String>;

impl<'a> SourceWriter<'a> {
    /// Creates a writer for `tree`, naming actions through `routines`.
    #[must_use]
    pub fn new(tree: &'a ExpressionTree, routines: &'a dyn Routines, config: WriterConfig) -> Self {
        Self {
            tree,
            routines,
            config,
        }
    }

    /// Renders the whole tree into a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRoutine`] if an action names a routine missing from the
    /// routine table.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Renders the whole tree into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRoutine`] for unknown actions and [`Error::Fmt`] if `out`
    /// fails.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut cache = BlockCache::default();

        for global in self.tree.globals() {
            let Some(param) = self.tree.parameter(global.param) else {
                continue;
            };
            let name = self.parameter_name(param);
            match &global.value {
                Some(value) => writeln!(out, "{} {name} = {value};", param.variable_type)?,
                None => writeln!(out, "{} {name};", param.variable_type)?,
            }
        }

        for (index, &function) in self.tree.function_ids().iter().rev().enumerate() {
            if index > 0 || !self.tree.globals().is_empty() {
                writeln!(out)?;
            }
            self.write_function(out, function, &mut cache)?;
        }
        Ok(())
    }

    fn write_function<W: Write>(&self, out: &mut W, id: FunctionId, cache: &mut BlockCache) -> Result<()> {
        let function = &self.tree[id];

        if self.config.emit_diagnostics {
            for diagnostic in self.tree.diagnostics().for_function(function.start) {
                writeln!(out, "// {diagnostic}")?;
            }
        }

        let arguments = function
            .arguments
            .iter()
            .map(|arg| format!("{} arg_{}", arg.variable_type, arg.number()))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            out,
            "{} {}({arguments})",
            function.return_type,
            function.display_name()
        )?;

        let body = self.block_text(function.block, 0, cache)?;
        out.write_str(&body)?;
        Ok(())
    }

    fn block_text(&self, block: ExprId, level: usize, cache: &mut BlockCache) -> Result<String> {
        if let Some(text) = cache.get(&(block, level)) {
            return Ok(text.clone());
        }

        let outer = " ".repeat(level * self.config.indent_width);
        let inner = " ".repeat((level + 1) * self.config.indent_width);
        let mut text = String::new();

        writeln!(text, "{outer}{{")?;
        let statements = self
            .tree
            .block(block)
            .map(|b| b.expressions.as_slice())
            .unwrap_or_default();
        for &statement in statements {
            match &self.tree[statement] {
                Expression::Label(label) => writeln!(text, "{outer}loc_{:08x}:", label.offset)?,
                Expression::Conditional(conditional) => {
                    writeln!(text, "{inner}if ({})", self.expression(conditional.test)?)?;
                    text.push_str(&self.block_text(conditional.if_true, level + 1, cache)?);
                }
                _ => writeln!(text, "{inner}{};", self.statement(statement)?)?,
            }
        }
        writeln!(text, "{outer}}}")?;

        cache.insert((block, level), text.clone());
        Ok(text)
    }

    /// Single-line form of the expression `id`.
    fn expression(&self, id: ExprId) -> Result<String> {
        let text = match &self.tree[id] {
            Expression::Block(block) => {
                let statements = block
                    .expressions
                    .iter()
                    .map(|&s| self.statement(s).map(|text| format!("{text};")))
                    .collect::<Result<Vec<_>>>()?;
                format!("{{ {} }}", statements.join(" "))
            }
            Expression::Constant(constant) => constant.value.to_string(),
            Expression::Parameter(param) => self.parameter_name(param),
            Expression::Label(label) => format!("loc_{:08x}:", label.offset),
            Expression::Goto(goto) => format!("goto loc_{:08x}", self.tree[goto.label].offset()),
            Expression::Return(ret) => match ret.value {
                Some(value) => format!("return {}", self.expression(value)?),
                None => "return".to_string(),
            },
            Expression::Conditional(conditional) => format!(
                "if ({}) {}",
                self.expression(conditional.test)?,
                self.expression(conditional.if_true)?
            ),
            Expression::Action(action) => {
                let routine = self
                    .routines
                    .get(action.routine)
                    .ok_or(Error::UnknownRoutine(action.routine))?;
                format!("{}({})", routine.name, self.arguments(&action.arguments)?)
            }
            Expression::Call(call) => format!(
                "{}({})",
                self.tree[call.function].display_name(),
                self.arguments(&call.arguments)?
            ),
            Expression::Vector(vector) => format!("vector({})", self.arguments(&vector.components)?),
            Expression::VectorIndex(index) => {
                let component = match index.index {
                    0 => "x",
                    1 => "y",
                    _ => "z",
                };
                format!("{}.{component}", self.operand(index.vector)?)
            }
            Expression::Unary(unary) => {
                let operand = self.operand(unary.operand)?;
                match unary.kind {
                    ExpressionKind::Increment => format!("{operand}++"),
                    ExpressionKind::Decrement => format!("{operand}--"),
                    kind => format!("{}{operand}", operator(kind)),
                }
            }
            Expression::Binary(binary) if binary.kind == ExpressionKind::Assign => {
                let right = self.expression(binary.right)?;
                match self.tree.parameter(binary.left) {
                    Some(param) if binary.declare_left => format!(
                        "{} {} = {right}",
                        param.variable_type,
                        self.parameter_name(param)
                    ),
                    _ => format!("{} = {right}", self.expression(binary.left)?),
                }
            }
            Expression::Binary(binary) => format!(
                "{} {} {}",
                self.operand(binary.left)?,
                operator(binary.kind),
                self.operand(binary.right)?
            ),
        };
        Ok(text)
    }

    /// Form of a block statement, a bare parameter declares itself.
    fn statement(&self, id: ExprId) -> Result<String> {
        match self.tree.parameter(id) {
            Some(param) => Ok(format!("{} {}", param.variable_type, self.parameter_name(param))),
            None => self.expression(id),
        }
    }

    /// Form of an operand, parenthesized if it is itself a binary operation.
    fn operand(&self, id: ExprId) -> Result<String> {
        let text = self.expression(id)?;
        if matches!(&self.tree[id], Expression::Binary(_)) {
            Ok(format!("({text})"))
        } else {
            Ok(text)
        }
    }

    fn arguments(&self, arguments: &[ExprId]) -> Result<String> {
        let rendered = arguments
            .iter()
            .map(|&arg| self.expression(arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join(", "))
    }

    fn parameter_name(&self, param: &ParameterExpression) -> String {
        match param.locality {
            ParameterLocality::Argument => {
                let stack_offset = param.stack_offset.unwrap_or(-4);
                format!("arg_{}", (stack_offset.unsigned_abs() / 4).saturating_sub(1))
            }
            ParameterLocality::Global => format!("glob_{:08x}", param.offset),
            ParameterLocality::Local | ParameterLocality::ReturnValue => match &param.suffix {
                Some(suffix) => format!("var_{:08x}_{suffix}", param.offset),
                None => format!("var_{:08x}", param.offset),
            },
        }
    }
}

/// Source symbol of a unary or binary operator.
fn operator(kind: ExpressionKind) -> &'static str {
    match kind {
        ExpressionKind::Negate => "-",
        ExpressionKind::Not => "!",
        ExpressionKind::OnesComplement => "~",
        ExpressionKind::Increment => "++",
        ExpressionKind::Decrement => "--",
        ExpressionKind::Assign => "=",
        ExpressionKind::Add => "+",
        ExpressionKind::Subtract => "-",
        ExpressionKind::Multiply => "*",
        ExpressionKind::Divide => "/",
        ExpressionKind::Modulo => "%",
        ExpressionKind::LogicalAnd => "&&",
        ExpressionKind::LogicalOr => "||",
        ExpressionKind::BitwiseOr => "|",
        ExpressionKind::BitwiseExclusiveOr => "^",
        ExpressionKind::BitwiseAnd => "&",
        ExpressionKind::LeftShift => "<<",
        ExpressionKind::RightShift => ">>",
        ExpressionKind::RightShiftUnsigned => ">>>",
        ExpressionKind::Equal => "==",
        ExpressionKind::NotEqual => "!=",
        ExpressionKind::GreaterThanOrEqual => ">=",
        ExpressionKind::GreaterThan => ">",
        ExpressionKind::LessThan => "<",
        ExpressionKind::LessThanOrEqual => "<=",
        ExpressionKind::Block
        | ExpressionKind::Constant
        | ExpressionKind::Parameter
        | ExpressionKind::Label
        | ExpressionKind::Goto
        | ExpressionKind::Return
        | ExpressionKind::Conditional
        | ExpressionKind::Action
        | ExpressionKind::Call
        | ExpressionKind::Vector
        | ExpressionKind::VectorIndex => "",
    }
}
