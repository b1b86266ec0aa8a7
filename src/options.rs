// Scope configuration. Derives `serde::Deserialize` on the layout struct so
// a host can ship configuration documents (RON, JSON, ...) alongside its
// templates, rather than wiring everything up in Rust.

use serde::Deserialize;

fn default_opening_delimiter() -> char {
    '['
}

fn default_closing_delimiter() -> char {
    ']'
}

fn default_var_symbol() -> char {
    '.'
}

/// Per-scope behavior switches. Cloned into every child scope created with
/// [`crate::scope::Scope::chain`] unless the host overwrites them.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    #[serde(default = "default_opening_delimiter")]
    pub opening_delimiter: char,
    #[serde(default = "default_closing_delimiter")]
    pub closing_delimiter: char,
    #[serde(default = "default_var_symbol")]
    pub var_symbol: char,
    /// Reserved: the lexer always processes string escapes regardless of
    /// this flag. Kept on `Options` for host-side (de)serialization
    /// compatibility with configuration documents that still set it.
    pub parse_escapes: bool,
    /// When set, `eval_list` pushes a frame onto `Scope::call_stack` for
    /// every dispatched call and pops it on return. Off by default, since
    /// most hosts never inspect the call stack and it costs an allocation
    /// per call.
    pub maintain_call_stack: bool,
    /// When set (and `maintain_call_stack` is also set), each pushed frame
    /// also carries the stringified form of the call that matched, not just
    /// the matched signature.
    pub call_stack_store_call_string: bool,
    pub strict_syntax: bool,
    /// When set, an atom beginning with this character followed immediately
    /// by `x`/`X` is parsed as unsigned hexadecimal (e.g. `'0'` enables
    /// `0x1F`).
    pub hex_prefix: Option<char>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            opening_delimiter: default_opening_delimiter(),
            closing_delimiter: default_closing_delimiter(),
            var_symbol: default_var_symbol(),
            parse_escapes: true,
            maintain_call_stack: false,
            call_stack_store_call_string: false,
            strict_syntax: false,
            hex_prefix: None,
        }
    }
}
