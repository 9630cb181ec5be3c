//! Clickable numeric literals in shader source.
//!
//! This is a highlighter heuristic, not a GLSL lexer: it walks each line left
//! to right, stops at `//`, skips a fixed vocabulary of keywords, builtins and
//! well-known identifiers, and reports literals matching `-?\d+\.?\d*` that
//! start a token. Identifier characters never start a literal, so the `2` in
//! `vec2` or `p2` is not a parameter.

use serde::Serialize;

const KEYWORDS: &[&str] = &[
    "float", "vec2", "vec3", "vec4", "int", "mat2", "mat3", "mat4", "void", "bool", "for", "if",
    "else", "return", "in", "out", "uniform", "precision", "highp", "mediump", "lowp",
    "attribute",
];

const BUILTINS: &[&str] = &[
    "sin", "cos", "tan", "length", "normalize", "clamp", "mix", "smoothstep", "max", "min",
    "pow", "abs", "dot", "reflect", "cross", "exp", "sqrt", "step", "mod", "fract", "floor",
    "ceil", "sign", "atan",
];

const FUNCTIONS: &[&str] = &["mainImage", "scene", "getNormal", "sdSphere", "sdPlane", "smin"];

const UNIFORMS: &[&str] = &[
    "iResolution",
    "iTime",
    "fragColor",
    "fragCoord",
    "gl_FragColor",
    "gl_FragCoord",
];

/// One numeric literal a user may ask variations for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumericParam {
    /// Zero-based line index.
    pub line: usize,
    /// Zero-based byte column of the first character (including a `-`).
    pub column: usize,
    /// Literal text as written.
    pub value: String,
}

impl NumericParam {
    pub fn id(&self) -> String {
        format!("{}-{}", self.line, self.column)
    }
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn is_boundary_byte(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'(' | b',' | b'=' | b'+' | b'-' | b'*' | b'/')
}

/// Length of a known word at the start of `rest`, if it ends on a word
/// boundary.
fn vocabulary_match(rest: &str) -> Option<usize> {
    KEYWORDS
        .iter()
        .chain(BUILTINS)
        .chain(FUNCTIONS)
        .chain(UNIFORMS)
        .find(|word| {
            rest.starts_with(*word)
                && rest
                    .as_bytes()
                    .get(word.len())
                    .is_none_or(|next| !is_word_byte(*next))
        })
        .map(|word| word.len())
}

/// Length of `-?\d+\.?\d*` at the start of `rest`.
fn literal_len(rest: &[u8]) -> Option<usize> {
    let mut end = usize::from(rest.first() == Some(&b'-'));
    let digits_start = end;
    while rest.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    if rest.get(end) == Some(&b'.') {
        end += 1;
        while rest.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    Some(end)
}

pub fn scan_line(line_index: usize, line: &str) -> Vec<NumericParam> {
    let bytes = line.as_bytes();
    let mut params = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let rest = &line[pos..];
        if rest.starts_with("//") {
            break;
        }
        if let Some(len) = vocabulary_match(rest) {
            pos += len;
            continue;
        }
        if let Some(len) = literal_len(&bytes[pos..]) {
            let starts_token =
                pos == 0 || bytes[pos] == b'-' || is_boundary_byte(bytes[pos - 1]);
            if starts_token {
                params.push(NumericParam {
                    line: line_index,
                    column: pos,
                    value: line[pos..pos + len].to_string(),
                });
                pos += len;
                continue;
            }
        }
        // Advance one character, staying on a char boundary.
        pos += rest.chars().next().map_or(1, char::len_utf8);
    }
    params
}

pub fn scan_shader(shader: &str) -> Vec<NumericParam> {
    shader
        .split('\n')
        .enumerate()
        .flat_map(|(index, line)| scan_line(index, line))
        .collect()
}

/// Finds the parameter on `line` whose text is `value`, or the first one on
/// the line when `value` is `None`.
pub fn find_on_line(shader: &str, line: usize, value: Option<&str>) -> Option<NumericParam> {
    let text = shader.split('\n').nth(line)?;
    scan_line(line, text)
        .into_iter()
        .find(|param| value.is_none_or(|wanted| param.value == wanted))
}
