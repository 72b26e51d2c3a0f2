//! Conditional compilation and macro expansion, applied to source text
//! before it reaches the parser.
//!
//! The defining invariant (spec §8) is that `lineCount(preprocess(s)) ==
//! lineCount(s)` for every input: a line that is compiled out is replaced
//! with an empty line, never dropped, so every downstream diagnostic keeps
//! pointing at the original physical line.
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::diagnostics::{codes, DiagnosticSink};

const MAX_MACRO_DEPTH: usize = 8;

#[derive(Debug, Clone)]
struct BlockMacro {
    params: Vec<String>,
    body: String,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    branch_active: bool,
    else_seen: bool,
    /// Whether any branch in this frame has already been taken; once one
    /// has, later `elif`-like `#else`/`#if` combinations must stay inactive
    /// even if their own condition is true.
    taken: bool,
}

/// Result of running the preprocessor over one file's source text.
pub struct PreprocessResult {
    pub text: String,
}

/// Run the preprocessor over `source`, reporting directive errors to `sink`.
///
/// Reported line numbers are always the physical line, 1-based.
pub fn preprocess(source: &str, sink: &mut DiagnosticSink) -> PreprocessResult {
    let mut defines: HashMap<String, String> = HashMap::new();
    let mut block_macros: HashMap<String, BlockMacro> = HashMap::new();
    let mut frames: Vec<Frame> = vec![];
    let mut out_lines: Vec<String> = Vec::with_capacity(source.lines().count());

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim_start();

        if let Some(directive) = trimmed.strip_prefix('#') {
            handle_directive(
                directive.trim(),
                line_no,
                &mut frames,
                &mut defines,
                &mut block_macros,
                sink,
            );
            out_lines.push(String::new());
            continue;
        }

        if active(&frames) {
            out_lines.push(expand_macros(raw_line, &defines, &block_macros, line_no, sink));
        } else {
            out_lines.push(String::new());
        }
    }

    if let Some(_unclosed) = frames.last() {
        sink.error(
            codes::PREPROCESSOR_ERROR,
            "unterminated #if/#ifdef/#ifndef: missing #endif",
            source.lines().count().max(1),
            0,
        );
    }

    PreprocessResult {
        text: out_lines.join("\n"),
    }
}

fn active(frames: &[Frame]) -> bool {
    frames.iter().all(|f| f.branch_active)
}

fn handle_directive(
    directive: &str,
    line_no: usize,
    frames: &mut Vec<Frame>,
    defines: &mut HashMap<String, String>,
    block_macros: &mut HashMap<String, BlockMacro>,
    sink: &mut DiagnosticSink,
) {
    let parent_active = active(frames);

    let (keyword, rest) = directive.split_once(char::is_whitespace).unwrap_or((directive, ""));
    let rest = rest.trim();

    match keyword {
        "define" => {
            if !parent_active {
                return;
            }
            define(rest, defines, block_macros);
        }
        "undef" => {
            if !parent_active {
                return;
            }
            let name = rest.trim();
            defines.remove(name);
            block_macros.remove(name);
        }
        "if" => {
            let value = if parent_active {
                eval_condition(rest, defines, line_no, sink)
            } else {
                false
            };
            frames.push(Frame {
                branch_active: parent_active && value,
                else_seen: false,
                taken: parent_active && value,
            });
        }
        "ifdef" => {
            let defined = defines.contains_key(rest.trim()) || block_macros.contains_key(rest.trim());
            let value = parent_active && defined;
            frames.push(Frame {
                branch_active: value,
                else_seen: false,
                taken: value,
            });
        }
        "ifndef" => {
            let defined = defines.contains_key(rest.trim()) || block_macros.contains_key(rest.trim());
            let value = parent_active && !defined;
            frames.push(Frame {
                branch_active: value,
                else_seen: false,
                taken: value,
            });
        }
        "else" => match frames.last_mut() {
            None => sink.error(codes::PREPROCESSOR_ERROR, "#else without matching #if", line_no, 0),
            Some(frame) if frame.else_seen => {
                sink.error(codes::PREPROCESSOR_ERROR, "duplicate #else in conditional block", line_no, 0)
            }
            Some(frame) => {
                frame.else_seen = true;
                let grandparent_active = frames_active_excluding_last(frames);
                let frame = frames.last_mut().unwrap();
                frame.branch_active = grandparent_active && !frame.taken;
                frame.taken = frame.taken || frame.branch_active;
            }
        },
        "endif" => {
            if frames.pop().is_none() {
                sink.error(codes::PREPROCESSOR_ERROR, "#endif without matching #if", line_no, 0);
            }
        }
        other => {
            sink.error(
                codes::PREPROCESSOR_ERROR,
                format!("unknown preprocessor directive '#{other}'"),
                line_no,
                0,
            );
        }
    }
}

fn frames_active_excluding_last(frames: &[Frame]) -> bool {
    frames[..frames.len().saturating_sub(1)].iter().all(|f| f.branch_active)
}

fn define(rest: &str, defines: &mut HashMap<String, String>, block_macros: &mut HashMap<String, BlockMacro>) {
    let rest = rest.trim();
    // Function-like block macro: `NAME!(params...) body`
    if let Some(bang_paren) = rest.find("!(") {
        let name = rest[..bang_paren].trim().to_string();
        let after = &rest[bang_paren + 2..];
        if let Some(close) = find_matching_paren(after) {
            let params: Vec<String> = after[..close]
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            let body = after[close + 1..].trim().to_string();
            block_macros.insert(name, BlockMacro { params, body });
            return;
        }
    }

    match rest.split_once(char::is_whitespace) {
        Some((name, value)) => {
            defines.insert(name.trim().to_string(), value.trim().to_string());
        }
        None => {
            defines.insert(rest.to_string(), String::new());
        }
    }
}

fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Expand function-like and simple macros in a single emitted line, running
/// to a fixed point or [`MAX_MACRO_DEPTH`] iterations.
fn expand_macros(
    line: &str,
    defines: &HashMap<String, String>,
    block_macros: &HashMap<String, BlockMacro>,
    line_no: usize,
    sink: &mut DiagnosticSink,
) -> String {
    let mut current = line.to_string();
    for _ in 0..MAX_MACRO_DEPTH {
        let expanded = expand_macros_once(&current, defines, block_macros, line_no, sink);
        if expanded == current {
            return current;
        }
        current = expanded;
    }
    current
}

fn expand_macros_once(
    line: &str,
    defines: &HashMap<String, String>,
    block_macros: &HashMap<String, BlockMacro>,
    line_no: usize,
    sink: &mut DiagnosticSink,
) -> String {
    let mut result = String::with_capacity(line.len());
    let bytes: Vec<char> = line.chars().collect();
    let mut i = 0usize;

    while i < bytes.len() {
        if is_ident_start(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            let ident: String = bytes[start..i].iter().collect();

            // `NAME!(args...)` or `NAME!`
            if i < bytes.len() && bytes[i] == '!' {
                let bang_pos = i;
                let mut j = i + 1;
                if j < bytes.len() && bytes[j] == '(' {
                    let rest: String = bytes[j + 1..].iter().collect();
                    if let Some(close) = find_matching_paren(&rest) {
                        let args_str = &rest[..close];
                        let args = split_top_level_commas(args_str);
                        if let Some(block) = block_macros.get(&ident) {
                            result.push_str(&substitute_params(&block.body, &block.params, &args));
                            i = j + 1 + close + 1;
                            continue;
                        } else {
                            sink.error(
                                codes::PREPROCESSOR_ERROR,
                                format!("use of undefined macro '{ident}!'"),
                                line_no,
                                start,
                            );
                            i = j + 1 + close + 1;
                            continue;
                        }
                    }
                } else if let Some(block) = block_macros.get(&ident) {
                    if block.params.is_empty() {
                        result.push_str(&block.body);
                        i = bang_pos + 1;
                        continue;
                    }
                }
                j = bang_pos;
                let _ = j;
            }

            if let Some(value) = defines.get(&ident) {
                result.push_str(value);
            } else {
                result.push_str(&ident);
            }
            continue;
        }

        result.push(bytes[i]);
        i += 1;
    }

    result
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn split_top_level_commas(s: &str) -> Vec<String> {
    let mut args = vec![];
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let mut result = body.to_string();
    for (param, arg) in params.iter().zip(args.iter()) {
        result = replace_word_boundary(&result, param, arg);
    }
    result
}

fn replace_word_boundary(haystack: &str, word: &str, replacement: &str) -> String {
    if word.is_empty() {
        return haystack.to_string();
    }
    let mut out = String::with_capacity(haystack.len());
    let chars: Vec<char> = haystack.chars().collect();
    let word_chars: Vec<char> = word.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i..].starts_with(word_chars.as_slice()) {
            let before_ok = i == 0 || !is_ident_continue(chars[i - 1]);
            let after_idx = i + word_chars.len();
            let after_ok = after_idx >= chars.len() || !is_ident_continue(chars[after_idx]);
            if before_ok && after_ok {
                out.push_str(replacement);
                i = after_idx;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Evaluate a `#if` expression: identifiers expand via `defines` (undefined
/// ones evaluate to `0`), then the resulting token sequence is evaluated as
/// a small arithmetic/logical grammar over integers.
fn eval_condition(expr: &str, defines: &HashMap<String, String>, line_no: usize, sink: &mut DiagnosticSink) -> bool {
    let expanded = expand_identifiers_for_condition(expr, defines, 0);
    match CondParser::new(&expanded).parse_expr() {
        Some(value) => value != 0,
        None => {
            sink.error(
                codes::PREPROCESSOR_ERROR,
                format!("malformed #if expression: '{expr}'"),
                line_no,
                0,
            );
            false
        }
    }
}

fn expand_identifiers_for_condition(expr: &str, defines: &HashMap<String, String>, depth: usize) -> String {
    if depth >= MAX_MACRO_DEPTH {
        return expr.to_string();
    }
    let mut result = String::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    let mut changed = false;
    while i < chars.len() {
        if is_ident_start(chars[i]) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            match defines.get(&ident) {
                Some(value) => {
                    result.push_str(value);
                    changed = true;
                }
                None => result.push_str("0"),
            }
            continue;
        }
        result.push(chars[i]);
        i += 1;
    }
    if changed {
        expand_identifiers_for_condition(&result, defines, depth + 1)
    } else {
        result
    }
}

/// Minimal recursive-descent evaluator for `#if` conditions:
/// `! - + * / % == != < > <= >= && || ( )` over integer literals.
struct CondParser {
    tokens: Vec<CondTok>,
    pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum CondTok {
    Num(i64),
    Op(String),
    LParen,
    RParen,
}

impl CondParser {
    fn new(expr: &str) -> Self {
        Self {
            tokens: tokenize_cond(expr),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&CondTok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<CondTok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn parse_expr(&mut self) -> Option<i64> {
        let value = self.parse_or()?;
        if self.pos != self.tokens.len() {
            return None;
        }
        Some(value)
    }

    fn parse_or(&mut self) -> Option<i64> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(CondTok::Op(op)) if op == "||") {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = ((lhs != 0) || (rhs != 0)) as i64;
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<i64> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(CondTok::Op(op)) if op == "&&") {
            self.bump();
            let rhs = self.parse_cmp()?;
            lhs = ((lhs != 0) && (rhs != 0)) as i64;
        }
        Some(lhs)
    }

    fn parse_cmp(&mut self) -> Option<i64> {
        let lhs = self.parse_additive()?;
        if let Some(CondTok::Op(op)) = self.peek().cloned() {
            if ["==", "!=", "<", ">", "<=", ">="].contains(&op.as_str()) {
                self.bump();
                let rhs = self.parse_additive()?;
                return Some(match op.as_str() {
                    "==" => (lhs == rhs) as i64,
                    "!=" => (lhs != rhs) as i64,
                    "<" => (lhs < rhs) as i64,
                    ">" => (lhs > rhs) as i64,
                    "<=" => (lhs <= rhs) as i64,
                    ">=" => (lhs >= rhs) as i64,
                    _ => unreachable!(),
                });
            }
        }
        Some(lhs)
    }

    fn parse_additive(&mut self) -> Option<i64> {
        let mut lhs = self.parse_mul()?;
        loop {
            match self.peek().cloned() {
                Some(CondTok::Op(op)) if op == "+" => {
                    self.bump();
                    lhs += self.parse_mul()?;
                }
                Some(CondTok::Op(op)) if op == "-" => {
                    self.bump();
                    lhs -= self.parse_mul()?;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_mul(&mut self) -> Option<i64> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek().cloned() {
                Some(CondTok::Op(op)) if op == "*" => {
                    self.bump();
                    lhs *= self.parse_unary()?;
                }
                Some(CondTok::Op(op)) if op == "/" => {
                    self.bump();
                    let rhs = self.parse_unary()?;
                    if rhs == 0 {
                        return None;
                    }
                    lhs /= rhs;
                }
                Some(CondTok::Op(op)) if op == "%" => {
                    self.bump();
                    let rhs = self.parse_unary()?;
                    if rhs == 0 {
                        return None;
                    }
                    lhs %= rhs;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<i64> {
        match self.peek().cloned() {
            Some(CondTok::Op(op)) if op == "!" => {
                self.bump();
                let value = self.parse_unary()?;
                Some((value == 0) as i64)
            }
            Some(CondTok::Op(op)) if op == "-" => {
                self.bump();
                Some(-self.parse_unary()?)
            }
            Some(CondTok::Op(op)) if op == "+" => {
                self.bump();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Option<i64> {
        match self.bump()? {
            CondTok::Num(n) => Some(n),
            CondTok::LParen => {
                let value = self.parse_or()?;
                match self.bump() {
                    Some(CondTok::RParen) => Some(value),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

static TWO_CHAR_OPS: Lazy<[&str; 6]> = Lazy::new(|| ["==", "!=", "<=", ">=", "&&", "||"]);

fn tokenize_cond(expr: &str) -> Vec<CondTok> {
    let mut tokens = vec![];
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            if let Ok(n) = text.parse::<i64>() {
                tokens.push(CondTok::Num(n));
            }
            continue;
        }
        if c == '(' {
            tokens.push(CondTok::LParen);
            i += 1;
            continue;
        }
        if c == ')' {
            tokens.push(CondTok::RParen);
            i += 1;
            continue;
        }
        if i + 1 < chars.len() {
            let two: String = chars[i..i + 2].iter().collect();
            if TWO_CHAR_OPS.contains(&two.as_str()) {
                tokens.push(CondTok::Op(two));
                i += 2;
                continue;
            }
        }
        if "!+-*/%<>".contains(c) {
            tokens.push(CondTok::Op(c.to_string()));
            i += 1;
            continue;
        }
        // unknown character: skip, malformed expressions are caught by the
        // parser failing to consume all tokens.
        i += 1;
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (String, DiagnosticSink) {
        let mut sink = DiagnosticSink::new();
        let result = preprocess(src, &mut sink);
        (result.text, sink)
    }

    #[test]
    fn preserves_line_count() {
        let src = "let a = 1\n#if 0\nlet b = 2\n#endif\nlet c = 3";
        let (text, _) = run(src);
        assert_eq!(text.lines().count(), src.lines().count());
    }

    #[test]
    fn ifdef_and_undef() {
        let src = "#define FOO\n#ifdef FOO\nkept\n#endif\n#undef FOO\n#ifdef FOO\ndropped\n#endif";
        let (text, sink) = run(src);
        assert!(!sink.has_errors());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "kept");
        assert_eq!(lines[6], "");
    }

    #[test]
    fn nested_conditionals() {
        let src = "#if 1\n#if 0\ninner\n#else\nelse_inner\n#endif\n#endif";
        let (text, sink) = run(src);
        assert!(!sink.has_errors());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "");
        assert_eq!(lines[4], "else_inner");
    }

    #[test]
    fn unmatched_endif_errors() {
        let src = "#endif";
        let (_, sink) = run(src);
        assert!(sink.has_errors());
    }

    #[test]
    fn double_else_errors() {
        let src = "#if 1\n#else\n#else\n#endif";
        let (_, sink) = run(src);
        assert!(sink.has_errors());
    }

    #[test]
    fn unterminated_if_errors() {
        let src = "#if 1\nx";
        let (_, sink) = run(src);
        assert!(sink.has_errors());
    }

    #[test]
    fn simple_macro_expansion() {
        let src = "#define N 3\nlet x = N + 1";
        let (text, sink) = run(src);
        assert!(!sink.has_errors());
        assert_eq!(text.lines().nth(1).unwrap(), "let x = 3 + 1");
    }

    #[test]
    fn function_like_macro_expansion() {
        let src = "#define DOUBLE!(x) x + x\nlet y = DOUBLE!(5)";
        let (text, sink) = run(src);
        assert!(!sink.has_errors());
        assert_eq!(text.lines().nth(1).unwrap(), "let y = 5 + 5");
    }

    #[test]
    fn arithmetic_condition_with_undefined_identifier() {
        let src = "#if UNSET == 0\nactive\n#endif";
        let (text, sink) = run(src);
        assert!(!sink.has_errors());
        assert_eq!(text.lines().nth(1).unwrap(), "active");
    }
}
