// Lexical scope chain: variable storage, a per-scope function registry, and
// the three handler slots (unknown variable, unknown function, error), with
// differing parent-fallback rules for each.
//
// Grounded on examples/original_source/translator/src/translator.cpp
// (`context::eval`, `context::user_var`, `context::set_user_var`) and
// .../include/ghassanpl/translator/translator.hpp
// (`get_unknown_func_eval`, which recurses to the parent; contrast with the
// unknown-variable getter and the error handler, neither of which do).

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ControlFlow, Error};
use crate::options::Options;
use crate::parser::{self};
use crate::registry::{Callable, FunctionDef, LocalLookup, Registry};
use crate::value::{Value, ValueTag};

pub type ErrorHandler = Rc<dyn Fn(&mut Scope, &Error) -> Value>;

/// One entry on a scope's call stack (see [`Scope::call_stack`]).
///
/// `function` is the matched definition when the frame was pushed by
/// `eval_list`'s own dispatch; `None` for a frame a host function pushed
/// itself via [`Scope::with_call_frame`], which has no definition to point
/// at. `call_text` is populated only when `call_stack_store_call_string` is
/// set.
#[derive(Clone, Debug)]
pub struct CallFrame {
    pub label: String,
    pub function: Option<Rc<FunctionDef>>,
    pub call_text: Option<String>,
}
pub type UnknownVariableHandler = Rc<dyn Fn(&mut Scope, &str) -> Option<Value>>;
pub type UnknownFunctionHandler = Rc<dyn Fn(&mut Scope, &[Value]) -> Option<Value>>;

/// One named, lexically scoped evaluation context.
///
/// A child scope's parent is a raw, non-owning pointer -- a child must not
/// outlive its parent, which matches how `interpolate`/`eval` are used in
/// practice (a child scope is pushed and popped within a single call).
/// There is never a reason for a `Scope` to outlive the stack frame that
/// created it, so an `Rc`-cycle-prone owning parent would buy nothing.
pub struct Scope {
    parent: Option<*mut Scope>,
    vars: HashMap<String, Value>,
    registry: Registry,
    pub options: Options,
    error_handler: Option<ErrorHandler>,
    unknown_variable_handler: Option<UnknownVariableHandler>,
    unknown_function_handler: Option<UnknownFunctionHandler>,
    call_stack: Vec<CallFrame>,
}

impl Scope {
    pub fn new(options: Options) -> Scope {
        Scope {
            parent: None,
            vars: HashMap::new(),
            registry: Registry::new(),
            options,
            error_handler: None,
            unknown_variable_handler: None,
            unknown_function_handler: None,
            call_stack: Vec::new(),
        }
    }

    /// Creates a child scope chained off `self`, inheriting `options` by
    /// value (later changes to the parent's `options` are not observed by
    /// the child).
    pub fn chain(&mut self) -> Scope {
        Scope {
            parent: Some(self as *mut Scope),
            vars: HashMap::new(),
            registry: Registry::new(),
            options: self.options.clone(),
            error_handler: None,
            unknown_variable_handler: None,
            unknown_function_handler: None,
            call_stack: Vec::new(),
        }
    }

    fn parent(&self) -> Option<&Scope> {
        self.parent.map(|p| unsafe { &*p })
    }

    fn parent_mut(&mut self) -> Option<&mut Scope> {
        self.parent.map(|p| unsafe { &mut *p })
    }

    fn is_variable_ref(&self, s: &str) -> bool {
        s.starts_with(self.options.var_symbol)
    }

    fn strip_sigil<'a>(&self, s: &'a str) -> &'a str {
        &s[self.options.var_symbol.len_utf8()..]
    }

    // -- variables ----------------------------------------------------

    /// Lexical lookup only, no handler fallback; `None` means unbound
    /// anywhere in the chain.
    pub fn find_variable(&self, name: &str) -> Option<&Value> {
        if let Some(v) = self.vars.get(name) {
            return Some(v);
        }
        self.parent().and_then(|p| p.find_variable(name))
    }

    /// Lexical lookup falling through to the unknown-variable handler (which
    /// itself never falls back to a parent scope) if unbound anywhere in the
    /// chain; defaults to `Value::Null` with no handler installed.
    pub fn user_var(&mut self, name: &str) -> Value {
        if let Some(v) = self.find_variable(name) {
            return v.clone();
        }
        match self.unknown_variable_handler.clone() {
            Some(handler) => handler(self, name).unwrap_or(Value::Null),
            None => Value::Null,
        }
    }

    /// Non-mutating lexical lookup; returns `fallback` instead of consulting
    /// the unknown-variable handler.
    pub fn user_var_or(&self, name: &str, fallback: Value) -> Value {
        self.find_variable(name).cloned().unwrap_or(fallback)
    }

    /// Writes into the nearest ancestor scope that already binds `name`
    /// (falling all the way back to this scope if none does), unless
    /// `force_local` is set, which always writes here.
    pub fn set_user_var(&mut self, name: &str, value: Value, force_local: bool) {
        if !force_local {
            if let Some(owner) = find_owner_mut(self, name) {
                owner.vars.insert(name.to_string(), value);
                return;
            }
        }
        self.vars.insert(name.to_string(), value);
    }

    // -- handlers -------------------------------------------------------
    //
    // The unknown-function handler falls back to the parent scope when this
    // scope has none installed; the unknown-variable and error handlers do
    // not.

    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }

    pub fn set_unknown_variable_handler(&mut self, handler: UnknownVariableHandler) {
        self.unknown_variable_handler = Some(handler);
    }

    pub fn set_unknown_function_handler(&mut self, handler: UnknownFunctionHandler) {
        self.unknown_function_handler = Some(handler);
    }

    fn unknown_function_handler(&self) -> Option<UnknownFunctionHandler> {
        if let Some(h) = &self.unknown_function_handler {
            return Some(h.clone());
        }
        self.parent().and_then(|p| p.unknown_function_handler())
    }

    /// Resolves a reported error into a substitute value: the local error
    /// handler if one is installed, otherwise a panic. Never falls back to
    /// a parent scope's handler.
    pub fn report_error(&mut self, err: Error) -> Value {
        match self.error_handler.clone() {
            Some(handler) => handler(self, &err),
            None => panic!("{}", err),
        }
    }

    // -- functions --------------------------------------------------------

    pub fn bind_function(&mut self, signature: &str, callable: Callable) -> Result<Rc<FunctionDef>, Error> {
        self.registry.bind(signature, &self.options, callable)
    }

    /// Resolves `args` against this scope's registry, then each ancestor's,
    /// stopping at the first scope with at least one match (ambiguity is
    /// resolved locally, never across scopes). Pass `local_only = true` to
    /// skip the ancestor search entirely.
    pub fn find_functions(&self, args: &[Value], local_only: bool) -> LocalLookup {
        match self.registry.resolve_local(args) {
            LocalLookup::NotFound if !local_only => match self.parent() {
                Some(p) => p.find_functions(args, false),
                None => LocalLookup::NotFound,
            },
            other => other,
        }
    }

    // -- parsing ------------------------------------------------------

    /// Parses `call_text` (no surrounding delimiters) as a single call's
    /// argument list, e.g. the text a host passes to invoke a function
    /// directly without going through a template.
    pub fn parse_call(&self, call_text: &str) -> Result<Value, Error> {
        parser::parse_bracketless_list(call_text, &self.options, self.options.strict_syntax)
    }

    /// Parses `template` into its preparsed segment form without evaluating
    /// it. Reusable across many `eval` calls against different variable
    /// bindings (see `interpolate_parsed`).
    pub fn parse(&self, template: &str) -> Result<Value, Error> {
        let segments = parser::parse_template(template, &self.options)?;
        Ok(parser::segments_to_preparsed(&segments))
    }

    // -- evaluation -----------------------------------------------------

    /// Parses and evaluates `template` in one step, splicing each call's
    /// result into the surrounding text.
    pub fn interpolate(&mut self, template: &str) -> Result<String, Error> {
        let parsed = self.parse(template)?;
        self.interpolate_parsed(&parsed)
    }

    /// Evaluates an already-parsed template (see [`Scope::parse`]) without
    /// re-lexing it.
    pub fn interpolate_parsed(&mut self, parsed: &Value) -> Result<String, Error> {
        let segments = parsed.as_array().unwrap_or(&[]);
        let mut out = String::new();
        for segment in segments {
            match segment {
                Value::Array(call) => {
                    let result = self.eval_list(call)?;
                    out.push_str(&result.stringify());
                }
                other => out.push_str(other.stringify().as_str()),
            }
        }
        Ok(out)
    }

    /// General single-value evaluator: a sigil-prefixed string resolves as a
    /// variable, an array dispatches as a call, anything else self-evaluates.
    pub fn eval(&mut self, value: Value) -> Result<Value, Error> {
        match value {
            Value::String(s) if self.is_variable_ref(&s) => {
                let name = self.strip_sigil(&s).to_string();
                Ok(self.user_var(&name))
            }
            Value::Array(call) => self.eval_list(&call),
            other => Ok(other),
        }
    }

    /// Like [`Scope::eval`], but a stray `Error::ScopeTerminator` that
    /// unwinds all the way here is converted into a reported
    /// `ScopeControlFlowEscaped` error instead of propagating further.
    pub fn safe_eval(&mut self, value: Value) -> Result<Value, Error> {
        match self.eval(value) {
            Err(Error::ScopeTerminator(ControlFlow { kind, .. })) => {
                Ok(self.report_error(Error::ScopeControlFlowEscaped(format!("'{kind}' not in loop"))))
            }
            other => other,
        }
    }

    /// Evaluates a single already-parsed call (a `Value::Array` of
    /// unevaluated name/argument atoms). A length-1 call whose sole element
    /// is a sigil-prefixed string is a variable reference, not a dispatch;
    /// otherwise dispatch consults this scope's registry, then each
    /// ancestor's.
    pub fn eval_list(&mut self, call: &[Value]) -> Result<Value, Error> {
        if call.is_empty() {
            return Ok(Value::Null);
        }
        if call.len() == 1 {
            if let Some(name) = call[0].as_str() {
                if self.is_variable_ref(name) {
                    let stripped = self.strip_sigil(name).to_string();
                    return Ok(self.user_var(&stripped));
                }
            }
        }
        match self.find_functions(call, false) {
            LocalLookup::Unique(def, packed) => {
                let call_text = if self.options.call_stack_store_call_string {
                    Some(call.iter().map(Value::stringify).collect::<Vec<_>>().join(" "))
                } else {
                    None
                };
                self.push_call(def.signature.clone(), Some(def.clone()), call_text);
                let result = (def.callable.clone())(self, packed);
                self.pop_call();
                result
            }
            LocalLookup::NotFound => {
                if let Some(handler) = self.unknown_function_handler() {
                    if let Some(v) = handler(self, call) {
                        return Ok(v);
                    }
                }
                let rendered = call.iter().map(Value::stringify).collect::<Vec<_>>().join(" ");
                Ok(self.report_error(Error::Dispatch(format!("function for call '{rendered}' not found"))))
            }
            LocalLookup::Ambiguous(candidates) => {
                let sigs = candidates.iter().map(|d| d.signature.clone()).collect::<Vec<_>>().join("', '");
                let rendered = call.iter().map(Value::stringify).collect::<Vec<_>>().join(" ");
                Ok(self.report_error(Error::Dispatch(format!(
                    "multiple functions for call '{rendered}' found: '{sigs}'"
                ))))
            }
        }
    }

    // -- argument helpers for host functions -----------------------------

    /// Evaluates `arg` (consuming it): sigil strings resolve as variables,
    /// arrays dispatch as calls, everything else self-evaluates.
    pub fn eval_arg_steal(&mut self, arg: Value) -> Result<Value, Error> {
        self.eval(arg)
    }

    /// Like [`Scope::eval_arg_steal`] but borrows instead of consuming.
    pub fn eval_arg_copy(&mut self, arg: &Value) -> Result<Value, Error> {
        self.eval(arg.clone())
    }

    /// Evaluates `arg` in place, replacing it with its result.
    pub fn eval_arg_in_place(&mut self, arg: &mut Value) -> Result<(), Error> {
        *arg = self.eval_arg_copy(arg)?;
        Ok(())
    }

    /// Evaluates every element of `args` left to right.
    pub fn eval_args(&mut self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        args.into_iter().map(|a| self.eval_arg_steal(a)).collect()
    }

    /// Fails unless `args` has exactly `n` elements. A shape mismatch is
    /// first offered to the installed error handler via `report_error`
    /// (giving it a chance to produce substitute text), then unconditionally
    /// unwinds as `Err` regardless of what the handler returned.
    pub fn assert_args(&mut self, args: &[Value], n: usize) -> Result<(), Error> {
        if args.len() != n {
            let err = Error::ArgumentShape(format!("expected {n} argument(s), got {}", args.len()));
            self.report_error(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Like [`Scope::assert_args`] but requires at least `n` elements.
    pub fn assert_min_args(&mut self, args: &[Value], n: usize) -> Result<(), Error> {
        if args.len() < n {
            let err = Error::ArgumentShape(format!("expected at least {n} argument(s), got {}", args.len()));
            self.report_error(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Like [`Scope::assert_args`] but checks the type tag of `args[index]`.
    pub fn assert_arg(&mut self, args: &[Value], index: usize, tag: ValueTag) -> Result<(), Error> {
        match args.get(index) {
            Some(v) if v.tag() == tag || tag == ValueTag::Discarded => Ok(()),
            Some(v) => {
                let err = Error::ArgumentShape(format!("argument {index} must be {tag:?}, got {:?}", v.tag()));
                self.report_error(err.clone());
                Err(err)
            }
            None => {
                let err = Error::ArgumentShape(format!("missing argument {index}"));
                self.report_error(err.clone());
                Err(err)
            }
        }
    }

    // -- call stack -------------------------------------------------------
    //
    // `eval_list` pushes and pops a frame around every dispatched call on
    // its own, gated on `maintain_call_stack` -- a host never has to opt a
    // plain callable into this, matching the original's single dispatch
    // entry point instrumenting every call rather than each callable
    // remembering to do it.

    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    fn push_call(&mut self, label: String, function: Option<Rc<FunctionDef>>, call_text: Option<String>) {
        if self.options.maintain_call_stack {
            self.call_stack.push(CallFrame { label, function, call_text });
        }
    }

    fn pop_call(&mut self) {
        if self.options.maintain_call_stack {
            self.call_stack.pop();
        }
    }

    /// Runs `body` with `label` pushed onto the call stack for its
    /// duration, popping it again once `body` returns (whether `Ok` or
    /// `Err`). For a host function that wants its own recursive `eval`
    /// calls to show up on the stack without going through `eval_list`'s
    /// own dispatch (which already instruments every registered call on its
    /// own); the pushed frame has no matched `FunctionDef` to point at.
    pub fn with_call_frame<T>(&mut self, label: String, body: impl FnOnce(&mut Scope) -> Result<T, Error>) -> Result<T, Error> {
        self.push_call(label, None, None);
        let result = body(self);
        self.pop_call();
        result
    }
}

fn find_owner_mut<'a>(scope: &'a mut Scope, name: &str) -> Option<&'a mut Scope> {
    if scope.vars.contains_key(name) {
        return Some(scope);
    }
    match scope.parent_mut() {
        Some(parent) => find_owner_mut(parent, name),
        None => None,
    }
}
