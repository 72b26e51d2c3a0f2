//! Final text-level pass over the emitted script (spec §4.7). Deliberately
//! shallow: normalizing whitespace is safe, anything structural is not.
//! Reformatting, comment-stripping, and peephole rewrites changed
//! observable behavior in earlier iterations and are disallowed here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BashOptimizationOptions {
    pub normalize_line_endings: bool,
    pub strip_trailing_whitespace: bool,
    pub ensure_trailing_newline: bool,
}

impl Default for BashOptimizationOptions {
    fn default() -> Self {
        BashOptimizationOptions {
            normalize_line_endings: true,
            strip_trailing_whitespace: true,
            ensure_trailing_newline: true,
        }
    }
}

pub fn optimize(script: &str, options: &BashOptimizationOptions) -> String {
    let mut text = script.to_string();
    if options.normalize_line_endings {
        text = text.replace("\r\n", "\n").replace('\r', "\n");
    }
    if options.strip_trailing_whitespace {
        text = text
            .lines()
            .map(|line| line.trim_end_matches([' ', '\t']))
            .collect::<Vec<_>>()
            .join("\n");
    }
    if options.ensure_trailing_newline && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_crlf_and_trailing_whitespace() {
        let input = "echo hi   \r\nexit 0\r\n";
        let output = optimize(input, &BashOptimizationOptions::default());
        assert_eq!(output, "echo hi\nexit 0\n");
    }

    #[test]
    fn leaves_comments_and_structure_untouched() {
        let input = "# comment\nif true; then\n    echo x\nfi";
        let output = optimize(input, &BashOptimizationOptions::default());
        assert_eq!(output, "# comment\nif true; then\n    echo x\nfi\n");
    }

    #[test]
    fn does_not_add_newline_when_disabled() {
        let options = BashOptimizationOptions { ensure_trailing_newline: false, ..BashOptimizationOptions::default() };
        let output = optimize("echo hi", &options);
        assert_eq!(output, "echo hi");
    }
}
