// Signature registry: parses `"name arg modifier name arg ..."`-style
// signature specs, builds a prefix trie and an infix trie, and resolves a
// raw argument list to a unique registered function.
//
// Grounded on examples/original_source/translator/src/functions.cpp
// (`bind_function`, `find_local_functions`) and
// .../detail/functions.h (`func_tree_element`, `tree_type`).

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::Error;
use crate::options::Options;
use crate::parser::parse_bracketless_list;
use crate::scope::Scope;
use crate::value::Value;

/// A function bound into a [`crate::scope::Scope`]. Takes the packed,
/// unevaluated argument list; evaluating arguments (or not) is the
/// callable's own business.
pub type Callable = Rc<dyn Fn(&mut Scope, Vec<Value>) -> Result<Value, Error>>;

/// A registered function together with the canonical signature string it
/// was bound under.
pub struct FunctionDef {
    pub signature: String,
    pub callable: Callable,
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef").field("signature", &self.signature).finish()
    }
}

/// Sentinel modifier for an exactly-one parameter slot.
const EXACTLY_ONE: char = '0';
const ZERO_OR_MORE: char = '*';
const ONE_OR_MORE: char = '+';
const OPTIONAL: char = '?';

#[derive(Default)]
struct TrieNode {
    children: HashMap<(String, char), TrieNode>,
    leaf: Option<Rc<FunctionDef>>,
}

/// Two-rooted trie plus the flat canonical-signature map, owned by a single
/// [`crate::scope::Scope`] (not shared across scopes).
#[derive(Default)]
pub struct Registry {
    by_signature: HashMap<String, Rc<FunctionDef>>,
    prefix_root: TrieNode,
    infix_root: TrieNode,
}

/// Outcome of resolving a raw argument list against one scope's registry,
/// with no parent fallback.
pub enum LocalLookup {
    NotFound,
    Unique(Rc<FunctionDef>, Vec<Value>),
    Ambiguous(Vec<Rc<FunctionDef>>),
}

struct ParsedSignature {
    infix: bool,
    canonical: String,
    /// `(name_fragment, modifier)` pairs, in trie-insertion order. Empty
    /// for the zero-argument special case (a bare function name).
    parts: Vec<(String, char)>,
}

fn modifier_of(token: &str) -> char {
    match token.chars().last() {
        Some(ONE_OR_MORE) => ONE_OR_MORE,
        Some(ZERO_OR_MORE) => ZERO_OR_MORE,
        Some(OPTIONAL) => OPTIONAL,
        _ => EXACTLY_ONE,
    }
}

fn non_empty_string(v: &Value) -> Option<&str> {
    v.as_str().filter(|s| !s.is_empty())
}

fn parse_signature(spec: &str, opts: &Options) -> Result<ParsedSignature, Error> {
    let parsed = parse_bracketless_list(spec, opts, false)?;
    let elems = parsed.as_array().unwrap_or(&[]).to_vec();

    if elems.is_empty() {
        return Err(Error::SignatureRegistration("function signature cannot be empty".into()));
    }

    if elems.len() == 1 {
        let name = non_empty_string(&elems[0]).ok_or_else(|| {
            Error::SignatureRegistration(format!(
                "function name part must be a non-empty string, not '{}'",
                elems[0].stringify()
            ))
        })?;
        return Ok(ParsedSignature { infix: false, canonical: name.to_string(), parts: vec![] });
    }

    let infix = elems.len() % 2 == 1;

    if infix {
        let first = non_empty_string(&elems[0]).ok_or_else(|| {
            Error::SignatureRegistration(format!(
                "function parameter name must be a non-empty string, not '{}'",
                elems[0].stringify()
            ))
        })?;
        if modifier_of(first) != EXACTLY_ONE {
            return Err(Error::SignatureRegistration(
                "first function parameter of infix functions cannot have modifiers".into(),
            ));
        }
    }

    let mut canonical = String::new();
    let mut parts = Vec::new();
    let mut i = if infix { 1 } else { 0 };
    if infix {
        canonical.push_str(elems[0].as_str().unwrap());
    }
    while i < elems.len() {
        if i != 0 {
            canonical.push(' ');
        }
        let name = non_empty_string(&elems[i]).ok_or_else(|| {
            Error::SignatureRegistration(format!(
                "function name part must be a non-empty string, not '{}'",
                elems[i].stringify()
            ))
        })?;
        canonical.push_str(name);
        canonical.push(' ');
        let param = non_empty_string(&elems[i + 1]).ok_or_else(|| {
            Error::SignatureRegistration(format!(
                "function parameter name must be a non-empty string, not '{}'",
                elems[i + 1].stringify()
            ))
        })?;
        canonical.push_str(param);
        parts.push((name.to_string(), modifier_of(param)));
        i += 2;
    }

    Ok(ParsedSignature { infix, canonical, parts })
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Parses `spec`, inserts it into the appropriate trie (or the flat map
    /// for a zero-argument signature), and registers `callable`. Rebinding
    /// an already-canonicalized signature overwrites the callable but keeps
    /// the same `FunctionDef` identity only when the previous registration
    /// is replaced wholesale -- callers that need a stable handle across
    /// rebinds should keep using the signature string, not a cached `Rc`.
    pub fn bind(&mut self, spec: &str, opts: &Options, callable: Callable) -> Result<Rc<FunctionDef>, Error> {
        let parsed = parse_signature(spec, opts)?;
        let def = Rc::new(FunctionDef { signature: parsed.canonical.clone(), callable });

        if parsed.parts.is_empty() {
            self.by_signature.insert(parsed.canonical, def.clone());
            return Ok(def);
        }

        let tree = if parsed.infix { &mut self.infix_root } else { &mut self.prefix_root };
        let mut node = tree;
        for (name, modifier) in &parsed.parts {
            node = node.children.entry((name.clone(), *modifier)).or_default();
        }
        node.leaf = Some(def.clone());
        self.by_signature.insert(parsed.canonical, def.clone());
        Ok(def)
    }

    /// Resolves `args` against this registry only (no parent fallback).
    pub fn resolve_local(&self, args: &[Value]) -> LocalLookup {
        let mut found: Vec<(Rc<FunctionDef>, Vec<Value>)> = Vec::new();
        let mut seen: HashSet<*const FunctionDef> = HashSet::new();

        if args.len() == 1 {
            if let Some(name) = args[0].as_str() {
                if let Some(def) = self.by_signature.get(name) {
                    push_unique(&mut found, &mut seen, def.clone(), vec![]);
                }
                for modifier in [OPTIONAL, ZERO_OR_MORE] {
                    if let Some(child) = self.prefix_root.children.get(&(name.to_string(), modifier)) {
                        if let Some(leaf) = &child.leaf {
                            let packed = if modifier == ZERO_OR_MORE { vec![Value::array(vec![])] } else { vec![] };
                            push_unique(&mut found, &mut seen, leaf.clone(), packed);
                        }
                    }
                }
            }
        } else if !args.is_empty() {
            let infix = args.len() % 2 == 1;
            let (root, start, seed) = if infix {
                (&self.infix_root, 1usize, vec![args[0].clone()])
            } else {
                (&self.prefix_root, 0usize, vec![])
            };
            for (def, packed) in walk(root, args, start, seed) {
                push_unique(&mut found, &mut seen, def, packed);
            }
        }

        match found.len() {
            0 => LocalLookup::NotFound,
            1 => {
                let (def, packed) = found.into_iter().next().unwrap();
                LocalLookup::Unique(def, packed)
            }
            _ => LocalLookup::Ambiguous(found.into_iter().map(|(d, _)| d).collect()),
        }
    }

    pub fn get_by_signature(&self, signature: &str) -> Option<Rc<FunctionDef>> {
        self.by_signature.get(signature).cloned()
    }
}

fn push_unique(
    found: &mut Vec<(Rc<FunctionDef>, Vec<Value>)>,
    seen: &mut HashSet<*const FunctionDef>,
    def: Rc<FunctionDef>,
    packed: Vec<Value>,
) {
    if seen.insert(Rc::as_ptr(&def)) {
        found.push((def, packed));
    }
}

/// Iterative work-list walk of one trie, starting at argument index `start`
/// with `seed_packed` already collected (the lone infix first-argument, if
/// any). Mirrors `functions.cpp::find_local_functions`, but packs matched
/// arguments into grouped `Value::Array`s for `+`/`*` slots, rather than
/// flattening them into the packed argument list.
fn walk(root: &TrieNode, args: &[Value], start: usize, seed_packed: Vec<Value>) -> Vec<(Rc<FunctionDef>, Vec<Value>)> {
    let mut results = Vec::new();
    let mut worklist = vec![(start, root, seed_packed)];

    while let Some((idx, node, packed)) = worklist.pop() {
        for ((_name, modifier), child) in node.children.iter() {
            if *modifier == ZERO_OR_MORE || *modifier == OPTIONAL {
                let mut next_packed = packed.clone();
                if *modifier == ZERO_OR_MORE {
                    next_packed.push(Value::array(vec![]));
                }
                land(child, idx, next_packed, args.len(), &mut results, &mut worklist);
            }
        }

        if idx >= args.len() {
            continue;
        }
        let Some(name) = args[idx].as_str() else { continue };
        for modifier in [EXACTLY_ONE, OPTIONAL, ZERO_OR_MORE, ONE_OR_MORE] {
            let Some(child) = node.children.get(&(name.to_string(), modifier)) else { continue };
            if idx + 1 >= args.len() {
                continue;
            }
            let mut next_idx = idx + 2;
            let mut next_packed = packed.clone();
            if modifier == ONE_OR_MORE || modifier == ZERO_OR_MORE {
                let mut group = vec![args[idx + 1].clone()];
                while next_idx + 1 < args.len() && args[next_idx].as_str() == Some(name) {
                    group.push(args[next_idx + 1].clone());
                    next_idx += 2;
                }
                next_packed.push(Value::array(group));
            } else {
                next_packed.push(args[idx + 1].clone());
            }
            land(child, next_idx, next_packed, args.len(), &mut results, &mut worklist);
        }
    }

    results
}

fn land<'a>(
    node: &'a TrieNode,
    idx: usize,
    packed: Vec<Value>,
    args_len: usize,
    results: &mut Vec<(Rc<FunctionDef>, Vec<Value>)>,
    worklist: &mut Vec<(usize, &'a TrieNode, Vec<Value>)>,
) {
    if idx == args_len {
        if let Some(leaf) = &node.leaf {
            results.push((leaf.clone(), packed));
            return;
        }
    }
    worklist.push((idx, node, packed));
}
