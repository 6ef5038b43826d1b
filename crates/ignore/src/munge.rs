use regex::Regex;

/// One normalized ignore line, ready for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MungedPattern {
    pub body: String,
    pub inverted: bool,
}

/// Normalizes raw ignore-file lines.
///
/// The munger brings the many accepted spellings down to the small shape
/// the parser understands: escapes resolved, star runs collapsed, `**`
/// narrowed back to `*` when it touches a non-separator, and `[!...]`
/// classes rewritten to `[^...]`.
pub(crate) struct Munger {
    star_run: Regex,
    left_bound_double_star: Regex,
    right_bound_double_star: Regex,
}

impl Munger {
    pub fn new() -> Self {
        Self {
            star_run: Regex::new(r"\*{3,}").unwrap(),
            left_bound_double_star: Regex::new(r"([^/*])\*\*").unwrap(),
            right_bound_double_star: Regex::new(r"\*\*([^/*])").unwrap(),
        }
    }

    pub fn munge_patterns(&self, raw: &str) -> Vec<MungedPattern> {
        raw.lines().filter_map(|line| self.munge_line(line)).collect()
    }

    fn munge_line(&self, line: &str) -> Option<MungedPattern> {
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (inverted, rest) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let trimmed = trim_unescaped_trailing_spaces(rest);
        if trimmed.is_empty() {
            return None;
        }

        let mut body = unescape(trimmed);
        body = self.star_run.replace_all(&body, "**").into_owned();
        // Narrowing can expose new adjacencies, so run until stable.
        loop {
            let narrowed = self.left_bound_double_star.replace_all(&body, "${1}*");
            let narrowed = self
                .right_bound_double_star
                .replace_all(&narrowed, "*${1}")
                .into_owned();
            if narrowed == body {
                break;
            }
            body = narrowed;
        }
        body = body.replace("[!", "[^");

        Some(MungedPattern { body, inverted })
    }
}

fn trim_unescaped_trailing_spaces(line: &str) -> &str {
    let mut end = line.len();
    let bytes = line.as_bytes();
    while end > 0 && bytes[end - 1] == b' ' {
        if end >= 2 && bytes[end - 2] == b'\\' {
            break;
        }
        end -= 1;
    }
    &line[..end]
}

fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next @ ('#' | '!' | ' ')) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
            continue;
        }
        out.push(c);
    }
    out
}
