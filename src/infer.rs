//! Two-pass type inference and checking.
//!
//! Pass one (`TypeInferrer`) walks the tree bottom-up, filling each node's
//! `inferred_type` and building a table of spell signatures. Pass two
//! (`TypeChecker`) walks it again against those signatures, reporting
//! mismatches as errors (or warnings, depending on `CompilationMode`) without
//! mutating the tree further. Grounded in the reference implementation's
//! `type_infer.h`/`type_check.h` split between inference and diagnostics.

use crate::ast::*;
use crate::types::{is_assignable_from, unify_all, Type, TypeKind};
use std::collections::HashMap;
use std::fmt;

/// Interpreted scrolls tolerate dynamic surprises as warnings; scrolls
/// compiled ahead-of-time for the bytecode VM must be statically sound, so
/// the same mismatches become hard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationMode {
    Interpreter,
    Aot,
}

#[derive(Debug, Clone)]
pub struct TypeError {
    pub line: usize,
    pub message: String,
    pub hint: Option<String>,
    pub is_warning: bool,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.is_warning { "Warning" } else { "TypeError" };
        write!(f, "{}: {} (line {})", label, self.message, self.line)?;
        if let Some(hint) = &self.hint {
            write!(f, " — hint: {}", hint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeCheckResult {
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeError>,
}

impl TypeCheckResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn format_all(&self) -> String {
        let mut out = String::new();
        for w in &self.warnings {
            out.push_str(&w.to_string());
            out.push('\n');
        }
        for e in &self.errors {
            out.push_str(&e.to_string());
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct SpellSignature {
    pub name: String,
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub is_variadic: bool,
    pub is_pure: bool,
    pub has_all_returns: bool,
    pub declaration_line: usize,
}

/// Nested lexical scopes of name -> type, mirroring the interpreter's own
/// scope stack so inference sees the same binding structure execution will.
#[derive(Debug, Default)]
struct TypeEnv {
    scopes: Vec<HashMap<String, Type>>,
}

impl TypeEnv {
    fn new() -> Self {
        TypeEnv { scopes: vec![HashMap::new()] }
    }
    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }
    fn pop_scope(&mut self) {
        self.scopes.pop();
    }
    fn declare(&mut self, name: &str, ty: Type) {
        self.scopes.last_mut().unwrap().insert(name.to_string(), ty);
    }
    fn update(&mut self, name: &str, ty: Type) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = ty;
                return true;
            }
        }
        false
    }
    fn lookup(&self, name: &str) -> Option<&Type> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty);
            }
        }
        None
    }
    fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

struct InferenceContext {
    env: TypeEnv,
    warnings: Vec<TypeError>,
}

/// Pass one: bottom-up inference, annotating every node's `inferred_type`
/// and collecting spell signatures for the checker.
pub struct TypeInferrer {
    ctx: InferenceContext,
    pub spells: HashMap<String, SpellSignature>,
}

impl TypeInferrer {
    pub fn new() -> Self {
        TypeInferrer { ctx: InferenceContext { env: TypeEnv::new(), warnings: Vec::new() }, spells: HashMap::new() }
    }

    pub fn infer_program(&mut self, program: &Program) -> Vec<TypeError> {
        for stmt in &program.statements {
            self.register_spell(stmt);
        }
        for stmt in &program.statements {
            self.infer_statement(stmt);
        }
        std::mem::take(&mut self.ctx.warnings)
    }

    fn register_spell(&mut self, stmt: &Stmt) {
        if let StmtKind::SpellStatement { name, params, return_type, body } = &stmt.kind {
            let param_types = params.iter().map(|p| p.declared_type.clone().unwrap_or_else(Type::unknown)).collect();
            let ret = return_type.clone().unwrap_or_else(Type::unknown);
            let has_all_returns = Self::all_paths_return(body);
            self.spells.insert(
                name.clone(),
                SpellSignature {
                    name: name.clone(),
                    param_types,
                    return_type: ret,
                    is_variadic: false,
                    is_pure: Self::is_pure_body(body),
                    has_all_returns,
                    declaration_line: stmt.line,
                },
            );
        }
    }

    fn all_paths_return(stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Return(_) => true,
            StmtKind::Block(stmts) => stmts.last().map(Self::all_paths_return).unwrap_or(false),
            StmtKind::If { then_branch, else_branch, .. } => {
                Self::all_paths_return(then_branch)
                    && else_branch.as_ref().map(|e| Self::all_paths_return(e)).unwrap_or(false)
            }
            _ => false,
        }
    }

    fn is_pure_body(stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Print(_) | StmtKind::ImportAll { .. } | StmtKind::ImportSelective { .. } => false,
            StmtKind::Block(stmts) => stmts.iter().all(Self::is_pure_body),
            StmtKind::If { then_branch, else_branch, .. } => {
                Self::is_pure_body(then_branch) && else_branch.as_ref().map(|e| Self::is_pure_body(e)).unwrap_or(true)
            }
            _ => true,
        }
    }

    pub fn infer_statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::ExprStmt(e) | StmtKind::Print(e) => {
                self.infer_expression(e);
            }
            StmtKind::VariableDeclaration { name, declared_type, init, .. } => {
                let init_ty = self.infer_expression(init);
                let ty = declared_type.clone().unwrap_or(init_ty);
                self.ctx.env.declare(name, ty);
            }
            StmtKind::Assign { name, value } => {
                let ty = self.infer_expression(value);
                if !self.ctx.env.update(name, ty.clone()) {
                    self.ctx.env.declare(name, ty);
                }
            }
            StmtKind::CollectionRite { target, key, value, .. } => {
                if let Some(k) = key {
                    self.infer_expression(k);
                }
                if let Some(v) = value {
                    self.infer_expression(v);
                }
                let _ = target;
            }
            StmtKind::SpellStatement { name, params, body, .. } => {
                self.ctx.env.push_scope();
                for p in params {
                    self.ctx.env.declare(&p.name, p.declared_type.clone().unwrap_or_else(Type::unknown));
                }
                self.infer_statement(body);
                self.ctx.env.pop_scope();
                let _ = name;
            }
            StmtKind::Return(Some(e)) => {
                self.infer_expression(e);
            }
            StmtKind::Return(None) | StmtKind::Become | StmtKind::Cease => {}
            StmtKind::If { condition, then_branch, else_branch } => {
                self.infer_expression(condition);
                self.ctx.env.push_scope();
                self.infer_statement(then_branch);
                self.ctx.env.pop_scope();
                if let Some(e) = else_branch {
                    self.ctx.env.push_scope();
                    self.infer_statement(e);
                    self.ctx.env.pop_scope();
                }
            }
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.infer_statement(s);
                }
            }
            StmtKind::ImportAll { .. } | StmtKind::ImportSelective { .. } | StmtKind::UnfurlInclude { .. } => {}
            StmtKind::TryCatch { try_block, catch_var, catch_block, finally_block } => {
                self.ctx.env.push_scope();
                self.infer_statement(try_block);
                self.ctx.env.pop_scope();
                if let Some(block) = catch_block {
                    self.ctx.env.push_scope();
                    if let Some(var) = catch_var {
                        self.ctx.env.declare(var, Type::phrase());
                    }
                    self.infer_statement(block);
                    self.ctx.env.pop_scope();
                }
                if let Some(block) = finally_block {
                    self.ctx.env.push_scope();
                    self.infer_statement(block);
                    self.ctx.env.pop_scope();
                }
            }
            StmtKind::ForLoop { var, init, limit, step, explicit_condition, body, .. } => {
                self.infer_expression(init);
                if let Some(l) = limit {
                    self.infer_expression(l);
                }
                self.infer_expression(step);
                self.ctx.env.push_scope();
                self.ctx.env.declare(var, Type::whole());
                if let Some(c) = explicit_condition {
                    self.infer_expression(c);
                }
                self.infer_statement(body);
                self.ctx.env.pop_scope();
            }
            StmtKind::WhileLoop { condition, body } => {
                self.infer_expression(condition);
                self.ctx.env.push_scope();
                self.infer_statement(body);
                self.ctx.env.pop_scope();
            }
            StmtKind::DoWhileLoop { body, until_condition } => {
                self.ctx.env.push_scope();
                self.infer_statement(body);
                self.ctx.env.pop_scope();
                self.infer_expression(until_condition);
            }
        }
    }

    pub fn infer_expression(&mut self, expr: &Expr) -> Type {
        let ty = match &expr.kind {
            ExprKind::Number(_) => Type::whole(),
            ExprKind::Str(_) => Type::phrase(),
            ExprKind::Bool(_) => Type::truth(),
            ExprKind::Identifier(name) => self.ctx.env.lookup(name).cloned().unwrap_or_else(Type::unknown),
            ExprKind::Binary { op, left, right } => self.infer_binary(*op, left, right, expr.line),
            ExprKind::Unary { op, operand } => {
                let t = self.infer_expression(operand);
                match op {
                    UnOp::Neg => t,
                    UnOp::Not => Type::truth(),
                }
            }
            ExprKind::Cast { operand, target } => {
                self.infer_expression(operand);
                match target {
                    CastTarget::Number => Type::whole(),
                    CastTarget::Phrase => Type::phrase(),
                    CastTarget::Truth => Type::truth(),
                }
            }
            ExprKind::ArrayLiteral(elements) => {
                let elem_types: Vec<Type> = elements.iter().map(|e| self.infer_expression(e)).collect();
                Type::order(unify_all(&elem_types))
            }
            ExprKind::MapLiteral(entries) => {
                let value_types: Vec<Type> = entries.iter().map(|(_, v)| self.infer_expression(v)).collect();
                Type::tome(Type::phrase(), unify_all(&value_types))
            }
            ExprKind::Index { target, index } => {
                self.infer_expression(index);
                let t = self.infer_expression(target);
                match t.kind {
                    TypeKind::Order => t.order_element().clone(),
                    TypeKind::Tome => t.tome_value().clone(),
                    _ => Type::unknown(),
                }
            }
            ExprKind::SpellInvocation { name, args } => {
                for a in args {
                    self.infer_expression(a);
                }
                self.spells.get(name).map(|s| s.return_type.clone()).unwrap_or_else(Type::unknown)
            }
            ExprKind::NativeInvocation { args, .. } => {
                for a in args {
                    self.infer_expression(a);
                }
                Type::unknown()
            }
        };
        expr.type_info.borrow_mut().inferred_type = Some(ty.clone());
        expr.type_info.borrow_mut().has_rune = expr.type_info.borrow().declared_type.is_some();
        ty
    }

    fn infer_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, line: usize) -> Type {
        let lt = self.infer_expression(left);
        let rt = self.infer_expression(right);
        match op {
            BinOp::Add if lt.kind == TypeKind::Phrase || rt.kind == TypeKind::Phrase => Type::phrase(),
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => Type::whole(),
            BinOp::Eq | BinOp::Ne | BinOp::Gt | BinOp::Lt | BinOp::And | BinOp::Or => Type::truth(),
        }
        .tap_unknown_warning(&lt, &rt, line, &mut self.ctx.warnings)
    }
}

impl Default for TypeInferrer {
    fn default() -> Self {
        Self::new()
    }
}

/// Small extension trait so `infer_binary` can fold a warning emission into
/// its tail expression without an extra local.
trait TapUnknown {
    fn tap_unknown_warning(self, lt: &Type, rt: &Type, line: usize, warnings: &mut Vec<TypeError>) -> Type;
}
impl TapUnknown for Type {
    fn tap_unknown_warning(self, lt: &Type, rt: &Type, line: usize, warnings: &mut Vec<TypeError>) -> Type {
        if lt.kind == TypeKind::Unknown || rt.kind == TypeKind::Unknown {
            warnings.push(TypeError {
                line,
                message: "operand type could not be fully determined".to_string(),
                hint: None,
                is_warning: true,
            });
        }
        self
    }
}

/// Pass two: re-walks the tree against the signatures pass one collected,
/// reporting mismatches without further mutating it.
pub struct TypeChecker {
    mode: CompilationMode,
    spells: HashMap<String, SpellSignature>,
    errors: Vec<TypeError>,
    warnings: Vec<TypeError>,
}

impl TypeChecker {
    pub fn new(mode: CompilationMode, spells: HashMap<String, SpellSignature>) -> Self {
        TypeChecker { mode, spells, errors: Vec::new(), warnings: Vec::new() }
    }

    pub fn check(&mut self, program: &Program) -> TypeCheckResult {
        for stmt in &program.statements {
            self.check_statement(stmt);
        }
        if self.mode == CompilationMode::Aot {
            for stmt in &program.statements {
                self.check_no_unknown_declarations(stmt);
            }
        }
        TypeCheckResult { errors: std::mem::take(&mut self.errors), warnings: std::mem::take(&mut self.warnings) }
    }

    fn add_error(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(TypeError { line, message: message.into(), hint: None, is_warning: false });
    }

    fn add_warning(&mut self, line: usize, message: impl Into<String>) {
        self.warnings.push(TypeError { line, message: message.into(), hint: None, is_warning: true });
    }

    /// In AOT mode a mismatch is always an error; interpreted scrolls may
    /// downgrade it to a warning since the runtime still enforces dynamic
    /// type safety at each operation.
    fn report_mismatch(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        match self.mode {
            CompilationMode::Aot => self.add_error(line, message),
            CompilationMode::Interpreter => self.add_warning(line, message),
        }
    }

    fn check_statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::ExprStmt(e) | StmtKind::Print(e) => self.check_expression(e),
            StmtKind::VariableDeclaration { declared_type, init, .. } => {
                self.check_expression(init);
                if let Some(declared) = declared_type {
                    let actual = init.type_info.borrow().inferred_type.clone().unwrap_or_else(Type::unknown);
                    if !is_assignable_from(declared, &actual) {
                        self.report_mismatch(
                            stmt.line,
                            format!("cannot assign {} to a binding declared as {}", actual, declared),
                        );
                    }
                }
            }
            StmtKind::Assign { value, .. } => self.check_expression(value),
            StmtKind::CollectionRite { key, value, .. } => {
                if let Some(k) = key {
                    self.check_expression(k);
                }
                if let Some(v) = value {
                    self.check_expression(v);
                }
            }
            StmtKind::SpellStatement { name, body, return_type, .. } => {
                self.check_no_dynamic_features(body);
                if let Some(sig) = self.spells.get(name).cloned() {
                    if return_type.is_some() && !sig.has_all_returns && sig.return_type.kind != TypeKind::Void {
                        self.report_mismatch(stmt.line, format!("spell '{}' does not return on every path", name));
                    }
                }
                self.check_statement(body);
            }
            StmtKind::Return(Some(e)) => self.check_expression(e),
            StmtKind::Return(None) | StmtKind::Become | StmtKind::Cease => {}
            StmtKind::If { condition, then_branch, else_branch } => {
                self.check_condition(condition);
                self.check_statement(then_branch);
                if let Some(e) = else_branch {
                    self.check_statement(e);
                }
            }
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.check_statement(s);
                }
            }
            StmtKind::ImportAll { .. } | StmtKind::ImportSelective { .. } | StmtKind::UnfurlInclude { .. } => {}
            StmtKind::TryCatch { try_block, catch_block, finally_block, .. } => {
                self.check_statement(try_block);
                if let Some(b) = catch_block {
                    self.check_statement(b);
                }
                if let Some(b) = finally_block {
                    self.check_statement(b);
                }
            }
            StmtKind::ForLoop { limit, step, explicit_condition, body, .. } => {
                if let Some(l) = limit {
                    self.check_expression(l);
                }
                self.check_expression(step);
                if let Some(c) = explicit_condition {
                    self.check_condition(c);
                }
                self.check_statement(body);
            }
            StmtKind::WhileLoop { condition, body } => {
                self.check_condition(condition);
                self.check_statement(body);
            }
            StmtKind::DoWhileLoop { body, until_condition } => {
                self.check_statement(body);
                self.check_condition(until_condition);
            }
        }
    }

    fn check_condition(&mut self, expr: &Expr) {
        self.check_expression(expr);
        let ty = expr.type_info.borrow().inferred_type.clone().unwrap_or_else(Type::unknown);
        if ty.kind != TypeKind::Truth && ty.kind != TypeKind::Unknown && ty.kind != TypeKind::Any {
            self.report_mismatch(expr.line, format!("condition must be a truth value, found {}", ty));
        }
    }

    fn check_expression(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.check_expression(left);
                self.check_expression(right);
                self.check_binary_operand_rules(*op, left, right, expr.line);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => self.check_expression(operand),
            ExprKind::ArrayLiteral(elements) => elements.iter().for_each(|e| self.check_expression(e)),
            ExprKind::MapLiteral(entries) => entries.iter().for_each(|(_, v)| self.check_expression(v)),
            ExprKind::Index { target, index } => {
                self.check_expression(target);
                self.check_expression(index);
            }
            ExprKind::SpellInvocation { name, args } => self.check_spell_call(name, args, expr.line),
            ExprKind::NativeInvocation { args, .. } => args.iter().for_each(|a| self.check_expression(a)),
            ExprKind::Number(_) | ExprKind::Str(_) | ExprKind::Bool(_) | ExprKind::Identifier(_) => {}
        }
    }

    /// `Phrase` only supports `+` (concatenation); the other arithmetic
    /// operators are a hard error regardless of mode. Dividing by the
    /// literal `0` is always suspicious enough to warn about, even though
    /// the interpreter's own division-by-zero check only fires at runtime.
    fn check_binary_operand_rules(&mut self, op: BinOp, left: &Expr, right: &Expr, line: usize) {
        if matches!(op, BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod) {
            let lt = left.type_info.borrow().inferred_type.clone().unwrap_or_else(Type::unknown);
            let rt = right.type_info.borrow().inferred_type.clone().unwrap_or_else(Type::unknown);
            if lt.kind == TypeKind::Phrase || rt.kind == TypeKind::Phrase {
                self.add_error(line, "Use + for concatenation");
            }
        }
        if op == BinOp::Div && matches!(right.kind, ExprKind::Number(0)) {
            self.add_warning(line, "division by the literal 0");
        }
    }

    fn check_spell_call(&mut self, name: &str, args: &[Expr], line: usize) {
        for a in args {
            self.check_expression(a);
        }
        let Some(sig) = self.spells.get(name).cloned() else {
            self.add_error(line, format!("invocation of unknown spell '{}'", name));
            return;
        };
        if !sig.is_variadic && args.len() != sig.param_types.len() {
            self.report_mismatch(
                line,
                format!("spell '{}' expects {} argument(s), found {}", name, sig.param_types.len(), args.len()),
            );
            return;
        }
        for (arg, expected) in args.iter().zip(&sig.param_types) {
            let actual = arg.type_info.borrow().inferred_type.clone().unwrap_or_else(Type::unknown);
            if !is_assignable_from(expected, &actual) {
                self.report_mismatch(
                    line,
                    format!("spell '{}' expects {} but argument is {}", name, expected, actual),
                );
            }
        }
    }

    /// AOT scrolls may not rely on features the bytecode compiler cannot
    /// lower: imports and try/catch inside a spell body are rejected
    /// outright rather than merely warned about.
    fn check_no_dynamic_features(&mut self, body: &Stmt) {
        if self.mode != CompilationMode::Aot {
            return;
        }
        self.walk_for_dynamic_features(body);
    }

    /// AOT scrolls must be statically sound: a binding whose declared or
    /// inferred type is still `Unknown` after inference has nothing for the
    /// bytecode compiler to commit a slot's representation to.
    fn check_no_unknown_declarations(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VariableDeclaration { name, declared_type, init, .. } => {
                let ty = declared_type
                    .clone()
                    .unwrap_or_else(|| init.type_info.borrow().inferred_type.clone().unwrap_or_else(Type::unknown));
                if ty.kind == TypeKind::Unknown {
                    self.add_error(stmt.line, format!("binding '{}' has no determinable type", name));
                }
            }
            StmtKind::SpellStatement { body, .. } => self.check_no_unknown_declarations(body),
            StmtKind::Block(stmts) => stmts.iter().for_each(|s| self.check_no_unknown_declarations(s)),
            StmtKind::If { then_branch, else_branch, .. } => {
                self.check_no_unknown_declarations(then_branch);
                if let Some(e) = else_branch {
                    self.check_no_unknown_declarations(e);
                }
            }
            StmtKind::WhileLoop { body, .. } | StmtKind::ForLoop { body, .. } | StmtKind::DoWhileLoop { body, .. } => {
                self.check_no_unknown_declarations(body)
            }
            StmtKind::TryCatch { try_block, catch_block, finally_block, .. } => {
                self.check_no_unknown_declarations(try_block);
                if let Some(b) = catch_block {
                    self.check_no_unknown_declarations(b);
                }
                if let Some(b) = finally_block {
                    self.check_no_unknown_declarations(b);
                }
            }
            _ => {}
        }
    }

    fn walk_for_dynamic_features(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::TryCatch { .. } => {
                self.add_error(stmt.line, "AOT spells may not use curse handling (try/catch/finally)".to_string())
            }
            StmtKind::ImportAll { .. } | StmtKind::ImportSelective { .. } => {
                self.add_error(stmt.line, "AOT spells may not import scrolls".to_string())
            }
            StmtKind::Block(stmts) => stmts.iter().for_each(|s| self.walk_for_dynamic_features(s)),
            StmtKind::If { then_branch, else_branch, .. } => {
                self.walk_for_dynamic_features(then_branch);
                if let Some(e) = else_branch {
                    self.walk_for_dynamic_features(e);
                }
            }
            StmtKind::WhileLoop { body, .. } | StmtKind::ForLoop { body, .. } | StmtKind::DoWhileLoop { body, .. } => {
                self.walk_for_dynamic_features(body)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::token::tokenize;

    fn check_src(src: &str, mode: CompilationMode) -> TypeCheckResult {
        let toks = tokenize(src);
        let program = parse(&toks).unwrap();
        let mut inferrer = TypeInferrer::new();
        inferrer.infer_program(&program);
        let mut checker = TypeChecker::new(mode, inferrer.spells);
        checker.check(&program)
    }

    #[test]
    fn concatenation_infers_phrase() {
        let toks = tokenize("proclaim \"Age: \" + 25");
        let program = parse(&toks).unwrap();
        let mut inferrer = TypeInferrer::new();
        inferrer.infer_program(&program);
        if let StmtKind::Print(e) = &program.statements[0].kind {
            assert_eq!(e.type_info.borrow().inferred_type, Some(Type::phrase()));
        } else {
            panic!("expected print statement");
        }
    }

    #[test]
    fn declared_type_mismatch_is_error_in_aot_mode() {
        let result = check_src("whole x is of \"not a number\"", CompilationMode::Aot);
        assert!(!result.success());
    }

    #[test]
    fn declared_type_mismatch_is_warning_in_interpreter_mode() {
        let result = check_src("whole x is of \"not a number\"", CompilationMode::Interpreter);
        assert!(result.success());
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn unknown_spell_invocation_is_error() {
        let result = check_src("proclaim (mystery 1)", CompilationMode::Interpreter);
        assert!(!result.success());
    }

    #[test]
    fn try_catch_is_rejected_inside_aot_spell() {
        let result = check_src(
            "spell risky() { Try:\nproclaim \"x\"\nCatch the curse as omen:\nproclaim omen }",
            CompilationMode::Aot,
        );
        assert!(!result.success());
    }

    #[test]
    fn subtracting_a_phrase_is_an_error() {
        let result = check_src("proclaim \"Boromir\" - 1", CompilationMode::Interpreter);
        assert!(!result.success());
        assert!(result.errors[0].message.contains("Use + for concatenation"));
    }

    #[test]
    fn dividing_by_literal_zero_warns() {
        let result = check_src("proclaim 10 / 0", CompilationMode::Interpreter);
        assert!(result.success());
        assert!(result.warnings.iter().any(|w| w.message.contains("division by the literal 0")));
    }

    #[test]
    fn missing_return_path_is_error_in_aot_mode_but_warning_in_interpreter_mode() {
        let src = "spell maybe(flag) returning whole { if flag { return 1 } }";
        let aot = check_src(src, CompilationMode::Aot);
        assert!(!aot.success());
        let interp = check_src(src, CompilationMode::Interpreter);
        assert!(interp.success());
        assert!(!interp.warnings.is_empty());
    }

    #[test]
    fn unknown_typed_declaration_is_error_only_in_aot_mode() {
        let src = "Let it be known: x is of mystery";
        let aot = check_src(src, CompilationMode::Aot);
        assert!(!aot.success());
        let interp = check_src(src, CompilationMode::Interpreter);
        assert!(interp.success());
    }
}
