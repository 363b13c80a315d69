//! Tree-walking evaluation.
//!
//! Lexical scoping via a stack of name maps, spells kept in a separate
//! by-name table (invoking shares the body by reference rather than
//! copying it), and curses modeled as an explicit `Result<_, Curse>` at
//! every evaluation boundary instead of native unwinding — the same shape
//! the reference implementation's try/catch/finally walk uses.

use crate::arena::{Arena, Phrase};
use crate::ast::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, Curse>>;

/// A thrown curse: unwinds evaluation up to the nearest `Try`.
#[derive(Debug, Clone)]
pub struct Curse {
    pub message: String,
}

impl Curse {
    pub fn new(message: impl Into<String>) -> Curse {
        Curse { message: message.into() }
    }
}

impl fmt::Display for Curse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Whole(i64),
    Truth(bool),
    Phrase(Phrase),
    Void,
    Order(Rc<Vec<Value>>),
    Tome(Rc<Vec<(Phrase, Value)>>),
}

impl Value {
    pub fn phrase(s: impl AsRef<str>) -> Value {
        Value::Phrase(Phrase::new(s.as_ref()))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Whole(n) => *n != 0,
            Value::Phrase(p) => !p.is_empty(),
            Value::Truth(b) => *b,
            Value::Void => false,
            Value::Order(v) => !v.is_empty(),
            Value::Tome(v) => !v.is_empty(),
        }
    }

    /// The canonical textual form used by `+` concatenation, `cast as
    /// phrase`, and `proclaim`.
    pub fn display_canonical(&self) -> String {
        match self {
            Value::Whole(n) => n.to_string(),
            Value::Truth(true) => "True".to_string(),
            Value::Truth(false) => "False".to_string(),
            Value::Phrase(p) => p.as_str().to_string(),
            Value::Void => String::new(),
            Value::Order(items) => {
                let inner: Vec<String> = items.iter().map(Value::display_canonical).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Tome(entries) => {
                let inner: Vec<String> =
                    entries.iter().map(|(k, v)| format!("\"{}\": {}", k.as_str(), v.display_canonical())).collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

/// Boundary punctuation that suppresses the inserted boundary space in
/// `+` concatenation.
const NO_SPACE_BEFORE: [char; 7] = [',', '.', ';', ':', ')', ']', '}'];

fn concat_display(left: &str, right: &str) -> String {
    if right.chars().next().map(|c| NO_SPACE_BEFORE.contains(&c)).unwrap_or(false) {
        format!("{}{}", left.trim_end_matches(' '), right)
    } else {
        format!("{} {}", left.trim_end_matches(' '), right.trim_start_matches(' '))
    }
}

#[derive(Clone)]
pub struct SpellDef {
    pub params: Vec<Param>,
    pub body: Rc<Stmt>,
}

#[derive(Clone, Default)]
pub struct Module {
    pub globals: HashMap<String, Value>,
    pub spells: HashMap<String, SpellDef>,
}

/// Resolves an import's logical name (an opaque string, per the external
/// path-resolver collaborator) to a filesystem path.
pub trait ScrollResolver {
    fn resolve(&self, logical_name: &str) -> Option<PathBuf>;
}

/// Treats the logical name as a path relative to a base directory.
pub struct FsResolver {
    pub base_dir: PathBuf,
}

impl ScrollResolver for FsResolver {
    fn resolve(&self, logical_name: &str) -> Option<PathBuf> {
        let candidate = self.base_dir.join(logical_name);
        if candidate.exists() {
            return Some(candidate);
        }
        let direct = Path::new(logical_name);
        if direct.exists() {
            return Some(direct.to_path_buf());
        }
        None
    }
}

/// What a statement does to control flow: fall through, return a value,
/// or unwind a loop.
enum Flow {
    Next,
    Return(Value),
    Break,
    Continue,
}

/// Tree-walking state: scopes (globals at index 0), arenas (the line
/// arena is only live during a REPL line), the spell table, module cache,
/// native registry, and a call-stack label list for diagnostics.
///
/// `Value` owns its own storage (inline/`Rc`-backed `Phrase`, `Rc`-backed
/// collections) rather than borrowing from the arenas below; the arenas
/// still exist to satisfy the frame-push/pop discipline the scope stack
/// is specified against; see `DESIGN.md` for why this split avoids
/// threading arena lifetimes through every `Value`.
pub struct Interpreter {
    scopes: Vec<HashMap<String, Value>>,
    arena: Arena,
    arena_frames: Vec<crate::arena::Frame>,
    line_arena: Option<Arena>,
    line_frame: Option<crate::arena::Frame>,
    spells: HashMap<String, SpellDef>,
    modules: HashMap<String, Module>,
    importing: HashSet<String>,
    natives: HashMap<String, NativeFn>,
    resolver: Rc<dyn ScrollResolver>,
    source_name: String,
    call_stack: Vec<String>,
    quiet_assign: bool,
    output: String,
    diagnostics: Vec<String>,
}

impl Interpreter {
    pub fn new(source_name: impl Into<String>) -> Self {
        Interpreter::with_resolver(source_name, Rc::new(FsResolver { base_dir: PathBuf::from(".") }))
    }

    pub fn with_resolver(source_name: impl Into<String>, resolver: Rc<dyn ScrollResolver>) -> Self {
        let mut me = Interpreter {
            scopes: vec![HashMap::new()],
            arena: Arena::new(),
            arena_frames: Vec::new(),
            line_arena: None,
            line_frame: None,
            spells: HashMap::new(),
            modules: HashMap::new(),
            importing: HashSet::new(),
            natives: HashMap::new(),
            resolver,
            source_name: source_name.into(),
            call_stack: Vec::new(),
            quiet_assign: true,
            output: String::new(),
            diagnostics: Vec::new(),
        };
        crate::natives::install_defaults(&mut me.natives);
        me
    }

    pub fn set_quiet_assign(&mut self, quiet: bool) {
        self.quiet_assign = quiet;
    }

    pub fn register_native(&mut self, name: impl Into<String>, f: NativeFn) {
        self.natives.insert(name.into(), f);
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    fn emit_error(&mut self, msg: impl Into<String>) {
        self.diagnostics.push(format!("Error: {}", msg.into()));
    }

    fn print_line(&mut self, s: &str) {
        self.output.push_str(s);
        self.output.push('\n');
    }

    fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
        let frame = self.active_arena_mut().push_frame();
        self.arena_frames.push(frame);
    }

    /// Values are owned (`Rc`/`Phrase`), not arena-borrowed, so popping the
    /// frame here doesn't need an explicit deep-copy promotion step the way
    /// an arena-backed value representation would — the scope map itself is
    /// simply dropped.
    fn exit_scope(&mut self) {
        self.scopes.pop();
        if let Some(frame) = self.arena_frames.pop() {
            self.active_arena_mut().pop_frame(frame);
        }
    }

    fn active_arena_mut(&mut self) -> &mut Arena {
        self.line_arena.as_mut().unwrap_or(&mut self.arena)
    }

    fn declare(&mut self, name: &str, value: Value) {
        self.scopes.last_mut().unwrap().insert(name.to_string(), value);
    }

    fn assign(&mut self, name: &str, value: Value) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.contains_key(name) {
                scope.insert(name.to_string(), value);
                return;
            }
        }
        self.declare(name, value);
    }

    fn lookup(&self, name: &str) -> Value {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(name) {
                return v.clone();
            }
        }
        Value::Void
    }

    // ─── REPL lifecycle ─────────────────────────────────────────────────

    pub fn begin_line(&mut self) {
        let mut arena = Arena::new();
        let frame = arena.push_frame();
        self.line_arena = Some(arena);
        self.line_frame = Some(frame);
        self.scopes.push(HashMap::new());
    }

    /// Promotes every binding touched in the line's transient scope into
    /// the global scope by value (values are already owned, so "deep
    /// copy" is just an ordinary clone), pops the line frame, and
    /// discards the line arena.
    pub fn end_line(&mut self) {
        if let Some(line_scope) = self.scopes.pop() {
            for (k, v) in line_scope {
                self.scopes[0].insert(k, v);
            }
        }
        if let (Some(mut arena), Some(frame)) = (self.line_arena.take(), self.line_frame.take()) {
            arena.pop_frame(frame);
        }
    }

    // ─── Program execution ──────────────────────────────────────────────

    pub fn run(&mut self, program: &Program) -> Result<(), Curse> {
        for stmt in &program.statements {
            self.register_spell_if_any(stmt);
        }
        for stmt in &program.statements {
            match self.exec_statement(stmt) {
                Ok(_) => {}
                Err(curse) => {
                    self.emit_error(format!("A curse was cast: {}", curse.message));
                    return Err(curse);
                }
            }
        }
        Ok(())
    }

    fn register_spell_if_any(&mut self, stmt: &Stmt) {
        if let StmtKind::SpellStatement { name, params, body, .. } = &stmt.kind {
            self.spells.insert(
                name.clone(),
                SpellDef { params: params.clone(), body: Rc::new((**body).clone()) },
            );
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, Curse> {
        for stmt in stmts {
            match self.exec_statement(stmt)? {
                Flow::Next => continue,
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn exec_statement(&mut self, stmt: &Stmt) -> Result<Flow, Curse> {
        match &stmt.kind {
            StmtKind::ExprStmt(e) => {
                self.eval_expression(e)?;
                Ok(Flow::Next)
            }
            StmtKind::Print(e) => {
                let v = self.eval_expression(e)?;
                let text = v.display_canonical();
                self.print_line(&text);
                Ok(Flow::Next)
            }
            StmtKind::VariableDeclaration { name, init, .. } => {
                let v = self.eval_expression(init)?;
                if !self.quiet_assign {
                    self.print_line(&format!("{} is now of {}", name, v.display_canonical()));
                }
                self.declare(name, v);
                Ok(Flow::Next)
            }
            StmtKind::Assign { name, value } => {
                let v = self.eval_expression(value)?;
                if !self.quiet_assign {
                    self.print_line(&format!("{} is now of {}", name, v.display_canonical()));
                }
                self.assign(name, v);
                Ok(Flow::Next)
            }
            StmtKind::CollectionRite { kind, target, key, value } => {
                self.exec_collection_rite(*kind, target, key.as_ref(), value.as_ref(), stmt.line)?;
                Ok(Flow::Next)
            }
            StmtKind::SpellStatement { .. } => Ok(Flow::Next),
            StmtKind::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval_expression(e)?,
                    None => Value::Void,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::Become => Ok(Flow::Continue),
            StmtKind::Cease => Ok(Flow::Break),
            StmtKind::If { condition, then_branch, else_branch } => {
                let cond = self.eval_expression(condition)?;
                if cond.truthy() {
                    self.exec_statement(then_branch)
                } else if let Some(e) = else_branch {
                    self.exec_statement(e)
                } else {
                    Ok(Flow::Next)
                }
            }
            StmtKind::Block(stmts) => {
                self.enter_scope();
                let result = self.exec_block(stmts);
                self.exit_scope();
                result
            }
            StmtKind::ImportAll { path, alias } => {
                self.import_all(path, alias.as_deref())?;
                Ok(Flow::Next)
            }
            StmtKind::ImportSelective { path, names } => {
                self.import_selective(path, names)?;
                Ok(Flow::Next)
            }
            StmtKind::UnfurlInclude { path } => {
                self.unfurl_include(path)?;
                Ok(Flow::Next)
            }
            StmtKind::TryCatch { try_block, catch_var, catch_block, finally_block } => {
                self.exec_try(try_block, catch_var.as_deref(), catch_block.as_deref(), finally_block.as_deref())
            }
            StmtKind::ForLoop { var, init, limit, step, ascend, explicit_condition, body } => {
                self.exec_for(var, init, limit.as_ref(), step, *ascend, explicit_condition.as_ref(), body)
            }
            StmtKind::WhileLoop { condition, body } => self.exec_while(condition, body),
            StmtKind::DoWhileLoop { body, until_condition } => self.exec_do_while(body, until_condition),
        }
    }

    fn exec_try(
        &mut self,
        try_block: &Stmt,
        catch_var: Option<&str>,
        catch_block: Option<&Stmt>,
        finally_block: Option<&Stmt>,
    ) -> Result<Flow, Curse> {
        let try_result = self.exec_statement(try_block);
        let mut result = match try_result {
            Ok(flow) => Ok(flow),
            Err(curse) => {
                if let Some(block) = catch_block {
                    self.enter_scope();
                    if let Some(var) = catch_var {
                        self.declare(var, Value::phrase(format!("A curse was cast: {}", curse.message)));
                    }
                    let caught = self.exec_statement(block);
                    self.exit_scope();
                    caught
                } else {
                    Err(curse)
                }
            }
        };
        if let Some(block) = finally_block {
            match self.exec_statement(block) {
                Ok(_) => {}
                Err(finally_curse) => result = Err(finally_curse),
            }
        }
        result
    }

    fn exec_while(&mut self, condition: &Expr, body: &Stmt) -> Result<Flow, Curse> {
        loop {
            if !self.eval_expression(condition)?.truthy() {
                return Ok(Flow::Next);
            }
            match self.exec_statement(body)? {
                Flow::Break => return Ok(Flow::Next),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Next => continue,
            }
        }
    }

    fn exec_do_while(&mut self, body: &Stmt, until_condition: &Expr) -> Result<Flow, Curse> {
        loop {
            match self.exec_statement(body)? {
                Flow::Break => return Ok(Flow::Next),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Next => {}
            }
            if self.eval_expression(until_condition)?.truthy() {
                return Ok(Flow::Next);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_for(
        &mut self,
        var: &str,
        init: &Expr,
        limit: Option<&Expr>,
        step: &Expr,
        ascend: bool,
        explicit_condition: Option<&Expr>,
        body: &Stmt,
    ) -> Result<Flow, Curse> {
        let mut current = match self.eval_expression(init)? {
            Value::Whole(n) => n,
            other => {
                return Err(Curse::new(format!(
                    "The loop demands a whole number to begin with, not {}.",
                    other.display_canonical()
                )))
            }
        };
        let step_val = match self.eval_expression(step)? {
            Value::Whole(n) => n,
            _ => 1,
        };
        let limit_val = match limit {
            Some(l) => match self.eval_expression(l)? {
                Value::Whole(n) => Some(n),
                _ => None,
            },
            None => None,
        };

        self.enter_scope();
        self.declare(var, Value::Whole(current));
        let outcome = loop {
            let keep_going = if let Some(cond) = explicit_condition {
                self.assign(var, Value::Whole(current));
                self.eval_expression(cond).map(|v| v.truthy())
            } else {
                match limit_val {
                    Some(limit) => Ok(if ascend { current < limit } else { current > limit }),
                    None => Ok(false),
                }
            };
            match keep_going {
                Ok(true) => {}
                Ok(false) => break Ok(Flow::Next),
                Err(curse) => break Err(curse),
            }
            self.assign(var, Value::Whole(current));
            match self.exec_statement(body) {
                Ok(Flow::Break) => break Ok(Flow::Next),
                Ok(Flow::Return(v)) => break Ok(Flow::Return(v)),
                Ok(Flow::Continue) | Ok(Flow::Next) => {}
                Err(curse) => break Err(curse),
            }
            current = if ascend { current + step_val } else { current - step_val };
        };
        self.exit_scope();
        outcome
    }

    // ─── Collection rites ───────────────────────────────────────────────

    fn exec_collection_rite(
        &mut self,
        kind: RiteKind,
        target: &str,
        key: Option<&Expr>,
        value: Option<&Expr>,
        line: usize,
    ) -> Result<(), Curse> {
        let current = self.lookup(target);
        match kind {
            RiteKind::ArrayAppend => {
                let v = self.eval_expression(value.expect("parser guarantees a value"))?;
                let mut items = match current {
                    Value::Order(items) => (*items).clone(),
                    Value::Void => Vec::new(),
                    other => return Err(non_order_curse(target, &other, line)),
                };
                items.push(v);
                self.assign(target, Value::Order(Rc::new(items)));
            }
            RiteKind::ArrayRemove => {
                let v = self.eval_expression(value.expect("parser guarantees a value"))?;
                let mut items = match current {
                    Value::Order(items) => (*items).clone(),
                    other => return Err(non_order_curse(target, &other, line)),
                };
                if let Some(pos) = items.iter().position(|x| *x == v) {
                    items.remove(pos);
                }
                self.assign(target, Value::Order(Rc::new(items)));
            }
            RiteKind::MapAssign => {
                let k = self.eval_expression(key.expect("parser guarantees a key"))?;
                let v = self.eval_expression(value.expect("parser guarantees a value"))?;
                let key_phrase = Phrase::new(&k.display_canonical());
                let mut entries = match current {
                    Value::Tome(entries) => (*entries).clone(),
                    Value::Void => Vec::new(),
                    other => return Err(non_tome_curse(target, &other, line)),
                };
                if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key_phrase) {
                    slot.1 = v;
                } else {
                    entries.push((key_phrase, v));
                }
                self.assign(target, Value::Tome(Rc::new(entries)));
            }
            RiteKind::MapErase => {
                let k = self.eval_expression(key.expect("parser guarantees a key"))?;
                let key_phrase = Phrase::new(&k.display_canonical());
                let mut entries = match current {
                    Value::Tome(entries) => (*entries).clone(),
                    other => return Err(non_tome_curse(target, &other, line)),
                };
                entries.retain(|(k, _)| *k != key_phrase);
                self.assign(target, Value::Tome(Rc::new(entries)));
            }
        }
        Ok(())
    }

    // ─── Imports ────────────────────────────────────────────────────────

    fn import_all(&mut self, path: &str, alias: Option<&str>) -> Result<(), Curse> {
        let module = self.load_module(path)?;
        self.merge_module(&module, alias);
        Ok(())
    }

    fn import_selective(&mut self, path: &str, names: &[String]) -> Result<(), Curse> {
        let module = self.load_module(path)?;
        for name in names {
            if let Some(def) = module.spells.get(name) {
                self.spells.insert(name.clone(), def.clone());
            }
        }
        Ok(())
    }

    fn unfurl_include(&mut self, path: &str) -> Result<(), Curse> {
        let source = self.read_scroll(path)?;
        let tokens = crate::token::tokenize(&source);
        let program = crate::parser::parse(&tokens)
            .map_err(|e| Curse::new(format!("The unfurled scroll '{}' could not be read: {}", path, e)))?;
        for stmt in &program.statements {
            self.register_spell_if_any(stmt);
        }
        for stmt in &program.statements {
            self.exec_statement(stmt)?;
        }
        Ok(())
    }

    fn load_module(&mut self, path: &str) -> Result<Module, Curse> {
        if self.importing.contains(path) {
            return Err(Curse::new(format!("The scroll '{}' folds upon itself, for it is already being drawn.", path)));
        }
        if let Some(module) = self.modules.get(path) {
            return Ok(module.clone());
        }
        self.importing.insert(path.to_string());
        let source = self.read_scroll(path);
        let result = source.and_then(|src| self.run_as_module(path, &src));
        self.importing.remove(path);
        let module = result?;
        self.modules.insert(path.to_string(), module.clone());
        Ok(module)
    }

    fn read_scroll(&self, path: &str) -> Result<String, Curse> {
        let file_path = self
            .resolver
            .resolve(path)
            .ok_or_else(|| Curse::new(format!("The scroll '{}' could not be found.", path)))?;
        std::fs::read_to_string(&file_path)
            .map_err(|e| Curse::new(format!("The scroll '{}' could not be read: {}", path, e)))
    }

    fn run_as_module(&mut self, path: &str, source: &str) -> Result<Module, Curse> {
        let tokens = crate::token::tokenize(source);
        let program =
            crate::parser::parse(&tokens).map_err(|e| Curse::new(format!("The scroll '{}' has a flaw: {}", path, e)))?;
        let mut sub = Interpreter::with_resolver(path.to_string(), self.resolver.clone());
        sub.run(&program)?;
        Ok(Module { globals: sub.scopes[0].clone(), spells: sub.spells.clone() })
    }

    fn merge_module(&mut self, module: &Module, alias: Option<&str>) {
        for (k, v) in &module.globals {
            self.scopes[0].insert(k.clone(), v.clone());
        }
        for (name, def) in &module.spells {
            let key = match alias {
                Some(a) => format!("{}.{}", a, name),
                None => name.clone(),
            };
            self.spells.insert(key, def.clone());
        }
    }

    // ─── Expressions ────────────────────────────────────────────────────

    fn eval_expression(&mut self, expr: &Expr) -> Result<Value, Curse> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Whole(*n)),
            ExprKind::Str(s) => Ok(Value::phrase(s)),
            ExprKind::Bool(b) => Ok(Value::Truth(*b)),
            ExprKind::Identifier(name) => Ok(self.lookup(name)),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right),
            ExprKind::Unary { op, operand } => {
                let v = self.eval_expression(operand)?;
                match op {
                    UnOp::Not => Ok(Value::Truth(!v.truthy())),
                    UnOp::Neg => match v {
                        Value::Whole(n) => Ok(Value::Whole(-n)),
                        other => Err(Curse::new(format!("One cannot negate {}.", other.display_canonical()))),
                    },
                }
            }
            ExprKind::Cast { operand, target } => {
                let v = self.eval_expression(operand)?;
                Ok(cast_value(&v, *target))
            }
            ExprKind::ArrayLiteral(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for e in elements {
                    items.push(self.eval_expression(e)?);
                }
                Ok(Value::Order(Rc::new(items)))
            }
            ExprKind::MapLiteral(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    out.push((Phrase::new(k), self.eval_expression(v)?));
                }
                Ok(Value::Tome(Rc::new(out)))
            }
            ExprKind::Index { target, index } => self.eval_index(target, index, expr.line),
            ExprKind::SpellInvocation { name, args } => self.eval_spell_invocation(name, args),
            ExprKind::NativeInvocation { name, args } => self.eval_native_invocation(name, args),
        }
    }

    fn eval_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<Value, Curse> {
        let lv = self.eval_expression(left)?;
        match op {
            BinOp::And => {
                if !lv.truthy() {
                    return Ok(Value::Truth(false));
                }
                let rv = self.eval_expression(right)?;
                return Ok(Value::Truth(rv.truthy()));
            }
            BinOp::Or => {
                if lv.truthy() {
                    return Ok(Value::Truth(true));
                }
                let rv = self.eval_expression(right)?;
                return Ok(Value::Truth(rv.truthy()));
            }
            _ => {}
        }
        let rv = self.eval_expression(right)?;
        match op {
            BinOp::Add => match (&lv, &rv) {
                (Value::Whole(a), Value::Whole(b)) => Ok(Value::Whole(a + b)),
                _ => Ok(Value::phrase(concat_display(&lv.display_canonical(), &rv.display_canonical()))),
            },
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let (a, b) = match (&lv, &rv) {
                    (Value::Whole(a), Value::Whole(b)) => (*a, *b),
                    _ => {
                        return Err(Curse::new(format!(
                            "{} demands whole numbers on both sides.",
                            op_name(op)
                        )))
                    }
                };
                match op {
                    BinOp::Sub => Ok(Value::Whole(a - b)),
                    BinOp::Mul => Ok(Value::Whole(a * b)),
                    BinOp::Div if b == 0 => {
                        self.emit_error("Division by zero.");
                        Ok(Value::Whole(0))
                    }
                    BinOp::Div => Ok(Value::Whole(a / b)),
                    BinOp::Mod if b == 0 => {
                        self.emit_error("Division by zero.");
                        Ok(Value::Whole(0))
                    }
                    BinOp::Mod => Ok(Value::Whole(a % b)),
                    _ => unreachable!(),
                }
            }
            BinOp::Eq => Ok(Value::Truth(lv == rv)),
            BinOp::Ne => Ok(Value::Truth(lv != rv)),
            BinOp::Gt | BinOp::Lt => match (&lv, &rv) {
                (Value::Whole(a), Value::Whole(b)) => {
                    Ok(Value::Truth(if op == BinOp::Gt { a > b } else { a < b }))
                }
                (Value::Phrase(a), Value::Phrase(b)) => {
                    Ok(Value::Truth(if op == BinOp::Gt { a.as_str() > b.as_str() } else { a.as_str() < b.as_str() }))
                }
                _ => Err(Curse::new("Only like may be measured against like.".to_string())),
            },
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_index(&mut self, target: &Expr, index: &Expr, _line: usize) -> Result<Value, Curse> {
        let target_val = self.eval_expression(target)?;
        let index_val = self.eval_expression(index)?;
        let name = match &target.kind {
            ExprKind::Identifier(n) => n.clone(),
            _ => "order".to_string(),
        };
        match target_val {
            Value::Order(items) => {
                let n = match index_val {
                    Value::Whole(n) => n,
                    _ => return Err(Curse::new("An order may only be read by a whole number.".to_string())),
                };
                let len = items.len() as i64;
                let actual = if n < 0 { len + n } else { n };
                if actual < 0 {
                    return Err(Curse::new(format!(
                        "None stand that far behind in the order, for only {} dwell within.",
                        len
                    )));
                }
                if actual >= len {
                    return Err(Curse::new(format!(
                        "The council knows no element at position {}, for the order '{}' holds but {}.",
                        n, name, len
                    )));
                }
                Ok(items[actual as usize].clone())
            }
            Value::Tome(entries) => {
                let key_str = index_val.display_canonical();
                entries
                    .iter()
                    .find(|(k, _)| k.as_str() == key_str)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| Curse::new(format!("The tome '{}' holds no knowledge of '{}'.", name, key_str)))
            }
            other => Err(Curse::new(format!("One cannot index into {}.", other.display_canonical()))),
        }
    }

    fn eval_spell_invocation(&mut self, name: &str, args: &[Expr]) -> Result<Value, Curse> {
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval_expression(a)?);
        }
        let def = self
            .spells
            .get(name)
            .cloned()
            .ok_or_else(|| Curse::new(format!("No spell by the name '{}' has been spoken into being.", name)))?;
        if values.len() != def.params.len() {
            return Err(Curse::new(format!(
                "The spell '{}' expects {} offering(s) but received {}.",
                name,
                def.params.len(),
                values.len()
            )));
        }
        self.call_stack.push(name.to_string());
        self.enter_scope();
        for (param, value) in def.params.iter().zip(values) {
            self.declare(&param.name, value);
        }
        let flow = self.exec_statement(&def.body);
        self.exit_scope();
        self.call_stack.pop();
        match flow? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::Void),
        }
    }

    fn eval_native_invocation(&mut self, name: &str, args: &[Expr]) -> Result<Value, Curse> {
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval_expression(a)?);
        }
        let native = self
            .natives
            .get(name)
            .cloned()
            .ok_or_else(|| Curse::new(format!("The spirits know not the rite named '{}'.", name)))?;
        native(&values)
    }
}

fn op_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Sub => "Subtraction",
        BinOp::Mul => "Multiplication",
        BinOp::Div => "Division",
        BinOp::Mod => "Modulo",
        _ => "This operator",
    }
}

fn cast_value(v: &Value, target: CastTarget) -> Value {
    match target {
        CastTarget::Number => match v {
            Value::Whole(n) => Value::Whole(*n),
            Value::Truth(b) => Value::Whole(if *b { 1 } else { 0 }),
            Value::Phrase(p) => Value::Whole(parse_leading_integer(p.as_str())),
            _ => Value::Whole(0),
        },
        CastTarget::Phrase => Value::phrase(v.display_canonical()),
        CastTarget::Truth => Value::Truth(v.truthy()),
    }
}

fn parse_leading_integer(s: &str) -> i64 {
    let s = s.trim();
    let mut end = 0;
    let bytes = s.as_bytes();
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return 0;
    }
    s[..end].parse().unwrap_or(0)
}

fn non_order_curse(target: &str, found: &Value, line: usize) -> Curse {
    let _ = line;
    Curse::new(format!("'{}' is not an order, but {}.", target, found.display_canonical()))
}

fn non_tome_curse(target: &str, found: &Value, line: usize) -> Curse {
    let _ = line;
    Curse::new(format!("'{}' is not a tome, but {}.", target, found.display_canonical()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::token::tokenize;

    fn run_src(src: &str) -> Interpreter {
        let tokens = tokenize(src);
        let program = parse(&tokens).unwrap();
        let mut interp = Interpreter::new("test");
        interp.run(&program).unwrap();
        interp
    }

    #[test]
    fn concatenates_phrase_with_number() {
        let interp = run_src("proclaim \"Age: \" + 25");
        assert_eq!(interp.output(), "Age: 25\n");
    }

    #[test]
    fn divide_by_zero_operator_yields_zero_and_diagnostic() {
        let interp = run_src("proclaim 10 / 0");
        assert_eq!(interp.output(), "0\n");
        assert!(interp.diagnostics().iter().any(|d| d.contains("Division by zero")));
    }

    #[test]
    fn for_descend_with_while_condition_produces_no_output() {
        let interp = run_src("for count from 6 by 1 descend while count remaineth below 3 { proclaim count }");
        assert_eq!(interp.output(), "");
    }

    #[test]
    fn order_negative_index_is_last_element() {
        let interp = run_src("heroes = [\"Aragorn\", \"Legolas\", \"Gimli\"]\nproclaim heroes[-1]");
        assert_eq!(interp.output(), "Gimli\n");
    }

    #[test]
    fn spell_with_return_prints_both_lines() {
        let interp = run_src(
            "spell bless(name) { proclaim \"Blessing \" + name\nreturn \"Blessed \" + name }\nproclaim (bless \"Boromir\")",
        );
        assert_eq!(interp.output(), "Blessing Boromir\nBlessed Boromir\n");
    }

    #[test]
    fn try_catch_divide_by_zero_native_binds_curse_message() {
        let interp = run_src(
            "Try:\nInvoke the spirit of math.divide upon 10, 0\nCatch the curse as omen:\nproclaim \"Error was \" + omen",
        );
        assert_eq!(interp.output(), "Error was A curse was cast: Division by zero in spirit 'math.divide'.\n");
    }

    #[test]
    fn out_of_range_index_is_a_curse() {
        let tokens = tokenize("heroes = [\"Aragorn\"]\nproclaim heroes[5]");
        let program = parse(&tokens).unwrap();
        let mut interp = Interpreter::new("test");
        let err = interp.run(&program).unwrap_err();
        assert!(err.message.contains("The council knows no element"));
    }

    #[test]
    fn array_append_rite_rebinds_name() {
        let interp = run_src("heroes = [\"Aragorn\"]\nheroes expand with \"Legolas\"\nproclaim heroes[-1]");
        assert_eq!(interp.output(), "Legolas\n");
    }

    #[test]
    fn repl_line_promotes_touched_bindings_to_globals() {
        let mut interp = Interpreter::new("repl");
        interp.begin_line();
        interp.declare("x", Value::Whole(5));
        interp.end_line();
        assert_eq!(interp.lookup("x"), Value::Whole(5));
    }
}
