// End-to-end interpolation scenarios exercising the public `Scope` API
// together. Each test binds exactly the host functions it needs (this crate
// ships no standard library of built-in functions) so every scenario is
// self-contained.

use std::cell::RefCell;
use std::rc::Rc;

use calltext::{ControlFlow, Error, NumericPair, Options, Scope, Value, ValueTag};

fn ternary_and_equality(scope: &mut Scope) {
    scope
        .bind_function(
            "arg == arg",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let a = s.eval_arg_steal(args[0].clone())?;
                let b = s.eval_arg_steal(args[1].clone())?;
                Ok(Value::Bool(a == b))
            }),
        )
        .unwrap();
    scope
        .bind_function(
            "arg ? arg : arg",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let cond = s.eval_arg_steal(args[0].clone())?;
                if cond.is_truthy() {
                    s.eval_arg_steal(args[1].clone())
                } else {
                    s.eval_arg_steal(args[2].clone())
                }
            }),
        )
        .unwrap();
}

#[test]
fn kills_pluralization_via_ternary_and_equality() {
    let mut scope = Scope::new(Options::default());
    ternary_and_equality(&mut scope);
    let template = "Killed [.kills] [ [.kills == 1] ? monster. : monsters. ]";

    scope.set_user_var("kills", Value::Int(2), false);
    assert_eq!(scope.interpolate(template).unwrap(), "Killed 2 monsters.");

    scope.set_user_var("kills", Value::Int(1), false);
    assert_eq!(scope.interpolate(template).unwrap(), "Killed 1 monster.");
}

#[test]
fn variadic_grouping_across_comma_and_keyword_separators() {
    let mut scope = Scope::new(Options::default());

    // Bare infix comma list: the repeated separator is "," itself.
    scope
        .bind_function(
            "arg , arg*",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let first = s.eval_arg_steal(args[0].clone())?;
                let rest = s.eval_args(args[1].as_array().unwrap_or(&[]).to_vec())?;
                let mut out = first.stringify();
                for v in rest {
                    out.push_str(&v.stringify());
                }
                Ok(Value::string(out))
            }),
        )
        .unwrap();

    // A keyword name followed by a repeated "," group.
    scope
        .bind_function(
            "list arg , arg*",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let first = s.eval_arg_steal(args[0].clone())?;
                let rest = s.eval_args(args[1].as_array().unwrap_or(&[]).to_vec())?;
                let mut items = vec![first];
                items.extend(rest);
                Ok(Value::array(items))
            }),
        )
        .unwrap();

    // A variadic group bounded by two different keyword separators.
    scope
        .bind_function(
            "cat arg , arg* and arg",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let first = s.eval_arg_steal(args[0].clone())?;
                let middle = s.eval_args(args[1].as_array().unwrap_or(&[]).to_vec())?;
                let last = s.eval_arg_steal(args[2].clone())?;
                let mut out = first.stringify();
                for v in middle {
                    out.push_str(&v.stringify());
                }
                out.push_str(&last.stringify());
                Ok(Value::string(out))
            }),
        )
        .unwrap();

    assert_eq!(scope.interpolate("[5,6,7]").unwrap(), "567");
    assert_eq!(scope.interpolate("[list 5,6,7]").unwrap(), "[5 6 7]");
    assert_eq!(scope.interpolate("[cat a, b, c and d]").unwrap(), "abcd");
}

#[test]
fn numeric_type_check_via_infix_postfix_signature() {
    let mut scope = Scope::new(Options::default());
    scope
        .bind_function(
            "arg is number",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let v = s.eval_arg_steal(args[0].clone())?;
                Ok(Value::Bool(v.is_numeric()))
            }),
        )
        .unwrap();
    scope.set_user_var("kills", Value::Int(25), false);
    assert_eq!(scope.interpolate("[.kills is number]").unwrap(), "true");
}

#[test]
fn three_distinct_arities_bind_three_distinct_definitions() {
    let mut scope = Scope::new(Options::default());
    let one = scope.bind_function("a arg", Rc::new(|_: &mut Scope, _| Ok(Value::Null))).unwrap();
    let two = scope.bind_function("a arg b arg", Rc::new(|_: &mut Scope, _| Ok(Value::Null))).unwrap();
    let three = scope
        .bind_function("a arg b arg c arg", Rc::new(|_: &mut Scope, _| Ok(Value::Null)))
        .unwrap();
    assert_ne!(Rc::as_ptr(&one), Rc::as_ptr(&two) as *const _);
    assert_ne!(Rc::as_ptr(&two), Rc::as_ptr(&three) as *const _);
    assert_eq!(one.signature, "a arg");
    assert_eq!(two.signature, "a arg b arg");
    assert_eq!(three.signature, "a arg b arg c arg");
}

#[test]
fn rebinding_the_same_canonical_signature_preserves_its_identity_in_the_flat_map() {
    let mut scope = Scope::new(Options::default());
    let first = scope.bind_function("a arg b arg", Rc::new(|_: &mut Scope, _| Ok(Value::string("v1")))).unwrap();
    let second = scope
        .bind_function("a   arg   b   arg", Rc::new(|_: &mut Scope, _| Ok(Value::string("v2"))))
        .unwrap();
    assert_eq!(first.signature, second.signature);
    let call = scope.parse_call("a 1 b 2").unwrap();
    let args = call.as_array().unwrap().to_vec();
    assert_eq!(scope.eval_list(&args).unwrap(), Value::string("v2"));
}

#[test]
fn ambiguous_call_is_reported_and_no_function_runs() {
    let mut scope = Scope::new(Options::default());
    let calls = Rc::new(RefCell::new(0));
    let c1 = calls.clone();
    let c2 = calls.clone();
    scope
        .bind_function(
            "f arg?",
            Rc::new(move |_: &mut Scope, _| {
                *c1.borrow_mut() += 1;
                Ok(Value::Null)
            }),
        )
        .unwrap();
    scope
        .bind_function(
            "f arg*",
            Rc::new(move |_: &mut Scope, _| {
                *c2.borrow_mut() += 1;
                Ok(Value::Null)
            }),
        )
        .unwrap();
    scope.set_error_handler(Rc::new(|_, err| Value::string(format!("{err}"))));
    let result = scope.interpolate("[f]").unwrap();
    assert!(result.starts_with("multiple functions"));
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn arguments_are_not_evaluated_unless_the_callee_asks() {
    let mut scope = Scope::new(Options::default());
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    scope
        .bind_function(
            "count!",
            Rc::new(move |_: &mut Scope, _| {
                *counter.borrow_mut() += 1;
                Ok(Value::Int(0))
            }),
        )
        .unwrap();
    // `quote arg` never evaluates its argument.
    scope
        .bind_function("quote arg", Rc::new(|_: &mut Scope, args: Vec<Value>| Ok(args[0].clone())))
        .unwrap();
    scope.interpolate("[quote [count!]]").unwrap();
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn ternary_short_circuits_the_untaken_branch() {
    let mut scope = Scope::new(Options::default());
    ternary_and_equality(&mut scope);
    let taken = Rc::new(RefCell::new(0));
    let untaken = Rc::new(RefCell::new(0));
    let t = taken.clone();
    let u = untaken.clone();
    scope
        .bind_function(
            "yes!",
            Rc::new(move |_: &mut Scope, _| {
                *t.borrow_mut() += 1;
                Ok(Value::string("yes"))
            }),
        )
        .unwrap();
    scope
        .bind_function(
            "no!",
            Rc::new(move |_: &mut Scope, _| {
                *u.borrow_mut() += 1;
                Ok(Value::string("no"))
            }),
        )
        .unwrap();
    let out = scope.interpolate("[true ? [yes!] : [no!]]").unwrap();
    assert_eq!(out, "yes");
    assert_eq!(*taken.borrow(), 1);
    assert_eq!(*untaken.borrow(), 0);
}

#[test]
fn variable_write_without_force_local_rewrites_the_binding_scope() {
    let mut parent = Scope::new(Options::default());
    parent.set_user_var("x", Value::Int(1), false);
    let mut child = parent.chain();
    child.set_user_var("x", Value::Int(2), false);
    assert_eq!(child.find_variable("x"), Some(&Value::Int(2)));
    drop(child);
    assert_eq!(parent.find_variable("x"), Some(&Value::Int(2)));
}

#[test]
fn variable_write_with_force_local_shadows_the_parent_binding() {
    let mut parent = Scope::new(Options::default());
    parent.set_user_var("x", Value::Int(1), false);
    let mut child = parent.chain();
    child.set_user_var("x", Value::Int(2), true);
    assert_eq!(child.find_variable("x"), Some(&Value::Int(2)));
    drop(child);
    assert_eq!(parent.find_variable("x"), Some(&Value::Int(1)));
}

fn loop_and_break(scope: &mut Scope) {
    scope
        .bind_function("break", Rc::new(|_: &mut Scope, _| Err(Error::ScopeTerminator(ControlFlow::new("break", Value::Null)))))
        .unwrap();
    scope
        .bind_function(
            "repeat arg body arg",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let count = match s.eval_arg_steal(args[0].clone())? {
                    Value::Int(i) => i.max(0) as usize,
                    Value::UInt(u) => u as usize,
                    _ => 0,
                };
                let mut last = Value::Null;
                for _ in 0..count {
                    match s.eval_arg_copy(&args[1]) {
                        Ok(v) => last = v,
                        Err(Error::ScopeTerminator(cf)) if cf.kind == "break" => {
                            last = cf.value;
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(last)
            }),
        )
        .unwrap();
}

#[test]
fn loop_like_builtin_catches_its_own_break() {
    let mut scope = Scope::new(Options::default());
    loop_and_break(&mut scope);
    let runs = Rc::new(RefCell::new(0));
    let r = runs.clone();
    scope
        .bind_function(
            "tick",
            Rc::new(move |_: &mut Scope, _| {
                *r.borrow_mut() += 1;
                if *r.borrow() == 2 {
                    return Err(Error::ScopeTerminator(ControlFlow::new("break", Value::Null)));
                }
                Ok(Value::Null)
            }),
        )
        .unwrap();
    scope.interpolate("[repeat 5 body [tick]]").unwrap();
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn an_escaped_scope_terminator_is_reported_by_safe_eval() {
    let mut scope = Scope::new(Options::default());
    loop_and_break(&mut scope);
    scope.set_error_handler(Rc::new(|_, err| Value::string(format!("{err}"))));
    let call = scope.parse_call("break").unwrap();
    let result = scope.safe_eval(call).unwrap();
    assert_eq!(result, Value::string("'break' not in loop"));
}

fn fluent_style_functions(scope: &mut Scope) {
    scope
        .bind_function(
            "arg 1? arg else arg",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let n = s.eval_arg_steal(args[0].clone())?;
                match n {
                    Value::Int(1) | Value::UInt(1) => s.eval_arg_steal(args[1].clone()),
                    _ => s.eval_arg_steal(args[2].clone()),
                }
            }),
        )
        .unwrap();
    scope
        .bind_function(
            "join arg , arg*",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let first = s.eval_arg_steal(args[0].clone())?;
                let rest = s.eval_args(args[1].as_array().unwrap_or(&[]).to_vec())?;
                let mut out = first.stringify();
                for v in rest {
                    out.push_str(&v.stringify());
                }
                Ok(Value::string(out))
            }),
        )
        .unwrap();
    scope
        .bind_function(
            "arg with arg+ default arg",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let subject = s.eval_arg_steal(args[0].clone())?;
                for clause in args[1].as_array().unwrap_or(&[]) {
                    if let Some(pair) = clause.as_array() {
                        if pair.len() == 2 {
                            let pattern = s.eval_arg_copy(&pair[0])?;
                            if pattern == subject {
                                return s.eval_arg_copy(&pair[1]);
                            }
                        }
                    }
                }
                s.eval_arg_steal(args[2].clone())
            }),
        )
        .unwrap();
}

#[test]
fn fluent_style_template_adapts_across_three_parameter_sets() {
    let mut scope = Scope::new(Options::default());
    ternary_and_equality(&mut scope);
    fluent_style_functions(&mut scope);

    let template = "[.userName] [.photoCount 1? \"added a new photo\" else [join \"added \", .photoCount, \" new photos\"]] to [.userGender with [male \"his stream\"] with [female \"her stream\"] default \"their stream\"].";

    scope.set_user_var("userName", Value::string("Ghassan"), false);
    scope.set_user_var("photoCount", Value::Int(1), false);
    scope.set_user_var("userGender", Value::string("female"), false);
    assert_eq!(scope.interpolate(template).unwrap(), "Ghassan added a new photo to her stream.");

    scope.set_user_var("userName", Value::string("Steve"), false);
    scope.set_user_var("photoCount", Value::Int(3), false);
    scope.set_user_var("userGender", Value::string("male"), false);
    assert_eq!(scope.interpolate(template).unwrap(), "Steve added 3 new photos to his stream.");

    scope.set_user_var("userName", Value::string("Xen"), false);
    scope.set_user_var("photoCount", Value::Int(0), false);
    scope.set_user_var("userGender", Value::string("non-binary"), false);
    assert_eq!(scope.interpolate(template).unwrap(), "Xen added 0 new photos to their stream.");
}

#[test]
fn text_without_opening_delimiter_round_trips() {
    let mut scope = Scope::new(Options::default());
    let s = "plain text with no calls at all";
    assert_eq!(scope.interpolate(s).unwrap(), s);
}

#[test]
fn doubled_opening_delimiter_collapses_to_one_literal_character() {
    let mut scope = Scope::new(Options::default());
    assert_eq!(scope.interpolate("a [[b").unwrap(), "a [b");
}

#[test]
fn parse_then_interpolate_parsed_matches_direct_interpolate_across_mutations() {
    let mut scope = Scope::new(Options::default());
    let parsed = scope.parse("Killed [.kills]").unwrap();

    scope.set_user_var("kills", Value::Int(1), false);
    let direct = scope.interpolate("Killed [.kills]").unwrap();
    let preparsed = scope.interpolate_parsed(&parsed).unwrap();
    assert_eq!(direct, preparsed);

    scope.set_user_var("kills", Value::Int(7), false);
    let direct = scope.interpolate("Killed [.kills]").unwrap();
    let preparsed = scope.interpolate_parsed(&parsed).unwrap();
    assert_eq!(direct, preparsed);
}

#[test]
fn numeric_promotion_picks_float_then_signed() {
    let mut scope = Scope::new(Options::default());
    scope
        .bind_function(
            "arg plus arg",
            Rc::new(|s: &mut Scope, args: Vec<Value>| {
                let a = s.eval_arg_steal(args[0].clone())?;
                let b = s.eval_arg_steal(args[1].clone())?;
                match Value::promote_numeric(&a, &b) {
                    Some(NumericPair::Float(x, y)) => Ok(Value::Float(x + y)),
                    Some(NumericPair::Int(x, y)) => Ok(Value::Int(x + y)),
                    Some(NumericPair::UInt(x, y)) => Ok(Value::UInt(x + y)),
                    None => Err(Error::ArgumentShape("'plus' needs numeric operands".into())),
                }
            }),
        )
        .unwrap();
    assert_eq!(scope.interpolate("[1 plus 2.5]").unwrap(), "3.5");
}

#[test]
fn assert_arg_consults_the_error_handler_then_unconditionally_unwinds() {
    let mut scope = Scope::new(Options::default());
    scope
        .bind_function(
            "double arg",
            Rc::new(|s: &mut Scope, mut args: Vec<Value>| {
                s.eval_arg_in_place(&mut args[0])?;
                s.assert_arg(&args, 0, ValueTag::Int)?;
                match &args[0] {
                    Value::Int(i) => Ok(Value::Int(i * 2)),
                    _ => unreachable!(),
                }
            }),
        )
        .unwrap();
    let reported = Rc::new(RefCell::new(None));
    let r = reported.clone();
    scope.set_error_handler(Rc::new(move |_, err| {
        *r.borrow_mut() = Some(format!("{err}"));
        Value::Null
    }));
    let result = scope.interpolate("[double \"x\"]");
    assert!(result.is_err());
    assert!(reported.borrow().as_ref().unwrap().contains("must be Int"));
}
