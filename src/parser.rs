// Lexer/parser: turns raw template text and call notation into `Value`
// trees. Operates over an advancing `&str` view, consuming from the front
// as it recognizes tokens -- the Rust analogue of the original's
// `std::string_view`-based `consume_*` family (see
// examples/original_source/translator/src/translator.cpp).

use crate::error::Error;
use crate::options::Options;
use crate::value::Value;

fn trim_whitespace_left(view: &mut &str) {
    *view = view.trim_start_matches(|c: char| c.is_ascii_whitespace());
}

fn consume_char(view: &mut &str) -> Option<char> {
    let mut chars = view.chars();
    let c = chars.next()?;
    *view = chars.as_str();
    Some(c)
}

fn consume_if(view: &mut &str, c: char) -> bool {
    if view.starts_with(c) {
        *view = &view[c.len_utf8()..];
        true
    } else {
        false
    }
}

fn consume_until<'a>(view: &mut &'a str, mut stop: impl FnMut(char) -> bool) -> &'a str {
    let start = *view;
    let mut len = 0;
    for c in start.chars() {
        if stop(c) {
            break;
        }
        len += c.len_utf8();
    }
    *view = &start[len..];
    &start[..len]
}

/// Consumes a single C-style string literal (the view must already start
/// with `'` or `"`). Escapes: `\n`, `\"`, `\'`, `\\`.
fn consume_c_string(view: &mut &str, strict: bool) -> Result<String, Error> {
    let delimiter = consume_char(view).expect("caller checked for a quote");
    let mut result = String::new();
    loop {
        match view.chars().next() {
            None => {
                return if strict {
                    Err(Error::Syntax("unterminated string literal".into()))
                } else {
                    Ok(result)
                };
            }
            Some(c) if c == delimiter => break,
            Some('\\') => {
                consume_char(view);
                match consume_char(view) {
                    None => {
                        return if strict {
                            Err(Error::Syntax("unterminated string literal".into()))
                        } else {
                            Ok(result)
                        };
                    }
                    Some('n') => result.push('\n'),
                    Some('"') => result.push('"'),
                    Some('\'') => result.push('\''),
                    Some('\\') => result.push('\\'),
                    Some(other) => {
                        if strict {
                            return Err(Error::Syntax(format!("unknown escape character '\\{other}'")));
                        }
                        result.push('\\');
                        result.push(other);
                    }
                }
            }
            Some(c) => {
                consume_char(view);
                result.push(c);
            }
        }
    }
    consume_char(view); // the closing delimiter
    Ok(result)
}

fn parse_numeric_atom(token: &str, opts: &Options) -> Option<Value> {
    if let Some(hp) = opts.hex_prefix {
        let mut chars = token.chars();
        if chars.next() == Some(hp) && matches!(chars.next(), Some('x') | Some('X')) {
            let rest = &token[hp.len_utf8() + 1..];
            return u64::from_str_radix(rest, 16).ok().map(Value::UInt);
        }
    }
    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if let Ok(u) = token.parse::<u64>() {
        return Some(Value::UInt(u));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Some(Value::Float(f));
    }
    None
}

/// Consumes a single atom: a string literal, a lone comma, or the longest
/// run up to whitespace/the closing delimiter/a comma -- tried in order as
/// `true`/`false`/`null`, an optional hex literal, signed, unsigned, float,
/// falling back to a plain string.
fn consume_atom(view: &mut &str, opts: &Options, strict: bool) -> Result<Value, Error> {
    trim_whitespace_left(view);

    if view.starts_with('\'') || view.starts_with('"') {
        let s = consume_c_string(view, strict)?;
        trim_whitespace_left(view);
        return Ok(Value::string(s));
    }

    if consume_if(view, ',') {
        trim_whitespace_left(view);
        return Ok(Value::string(","));
    }

    let closing = opts.closing_delimiter;
    let token = consume_until(view, |c| c.is_ascii_whitespace() || c == closing || c == ',');
    let value = match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => parse_numeric_atom(token, opts).unwrap_or_else(|| Value::string(token)),
    };
    trim_whitespace_left(view);
    Ok(value)
}

/// Consumes a value: a list if the next character is the opening delimiter,
/// otherwise an atom.
fn consume_value(view: &mut &str, opts: &Options, strict: bool) -> Result<Value, Error> {
    trim_whitespace_left(view);
    if consume_if(view, opts.opening_delimiter) {
        consume_list(view, opts, strict, true)
    } else {
        consume_atom(view, opts, strict)
    }
}

/// Consumes a list: repeatedly skips whitespace and consumes values until
/// the input is empty or the next character is the closing delimiter, then
/// optionally consumes that delimiter.
///
/// `require_closing_delim` selects whether a missing closing delimiter is a
/// strict-mode error (used for calls embedded in templates) or never an
/// error at all (used when parsing a bracket-less top-level signature spec).
pub(crate) fn consume_list(
    view: &mut &str,
    opts: &Options,
    strict: bool,
    require_closing_delim: bool,
) -> Result<Value, Error> {
    let mut items = Vec::new();
    trim_whitespace_left(view);
    while !view.is_empty() && !view.starts_with(opts.closing_delimiter) {
        items.push(consume_value(view, opts, strict)?);
        trim_whitespace_left(view);
    }
    if !consume_if(view, opts.closing_delimiter) && require_closing_delim && strict {
        return Err(Error::Syntax("missing closing delimiter".into()));
    }
    Ok(Value::array(items))
}

/// Parses a single top-level list form with no surrounding delimiters, e.g.
/// a signature spec (`"if arg then arg else arg"`) or the text passed to
/// `Scope::parse_call`. Trailing unconsumed content is a syntax error in
/// strict mode.
pub(crate) fn parse_bracketless_list(text: &str, opts: &Options, strict: bool) -> Result<Value, Error> {
    let mut view = text;
    let result = consume_list(&mut view, opts, strict, false)?;
    trim_whitespace_left(&mut view);
    if strict && !view.is_empty() {
        return Err(Error::Syntax(format!("stray trailing tokens after call: '{view}'")));
    }
    Ok(result)
}

/// One piece of a lowered template: either verbatim text or a call to be
/// evaluated.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Text(String),
    Call(Value),
}

/// Walks `template`, splitting it into literal-text and call segments. A
/// doubled opening delimiter collapses to one literal delimiter character.
pub fn parse_template(template: &str, opts: &Options) -> Result<Vec<Segment>, Error> {
    let mut out = Vec::new();
    let mut view = template;
    loop {
        let text = consume_until(&mut view, |c| c == opts.opening_delimiter);
        if !text.is_empty() {
            out.push(Segment::Text(text.to_string()));
        }
        if view.is_empty() {
            break;
        }
        consume_char(&mut view); // the opening delimiter itself
        if consume_if(&mut view, opts.opening_delimiter) {
            out.push(Segment::Text(opts.opening_delimiter.to_string()));
            continue;
        }
        let call = consume_list(&mut view, opts, opts.strict_syntax, true)?;
        out.push(Segment::Call(call));
    }
    Ok(out)
}

/// Lowers `segments` into the preparsed `Value` form: an array alternating
/// literal-text strings and call sub-arrays.
pub fn segments_to_preparsed(segments: &[Segment]) -> Value {
    Value::array(
        segments
            .iter()
            .map(|seg| match seg {
                Segment::Text(s) => Value::string(s.clone()),
                Segment::Call(v) => v.clone(),
            })
            .collect(),
    )
}
