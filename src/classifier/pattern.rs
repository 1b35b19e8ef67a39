//! Glob-style path patterns compiled to anchored regular expressions.
//!
//! Syntax:
//! - `*` matches within one path segment, `?` one character, `[0-9]` a class.
//! - `**` as a whole segment matches any number of segments.
//! - Patterns starting with `/` are anchored at the filesystem root; all others
//!   match at any depth (an implicit `**/` prefix).

use regex::Regex;

/// A compiled path pattern with a specificity score used for tie-breaking.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
    specificity: u32,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&translate(pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            specificity: specificity(pattern),
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Anchored regex source, suitable for a `RegexSet`.
    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }

    /// Higher means more targeted: literal segments count 2, partially
    /// wildcarded segments 1, bare wildcards 0.
    pub fn specificity(&self) -> u32 {
        self.specificity
    }
}

fn segments(pattern: &str) -> (bool, Vec<&str>) {
    let absolute = pattern.starts_with('/');
    let mut segs: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    if !absolute && segs.first() != Some(&"**") {
        segs.insert(0, "**");
    }
    (absolute, segs)
}

fn translate(pattern: &str) -> String {
    let (absolute, segs) = segments(pattern);
    let mut out = String::from("^");
    if absolute {
        out.push('/');
    }

    let last = segs.len().saturating_sub(1);
    for (i, seg) in segs.iter().enumerate() {
        if *seg == "**" {
            // `**` swallows its own trailing separator
            if i == 0 && !absolute {
                out.push_str("(?:.*/)?");
            } else {
                out.push_str("(?:[^/]+/)*");
            }
            continue;
        }
        translate_segment(seg, &mut out);
        if i != last {
            out.push('/');
        }
    }

    out.push('$');
    out
}

fn translate_segment(seg: &str, out: &mut String) {
    let mut chars = seg.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    if inner == '\\' || inner == '[' {
                        out.push('\\');
                    }
                    out.push(inner);
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
}

fn specificity(pattern: &str) -> u32 {
    let (_, segs) = segments(pattern);
    segs.iter()
        .map(|seg| {
            if *seg == "**" || seg.chars().all(|c| c == '*') {
                0
            } else if seg.contains(['*', '?', '[']) {
                1
            } else {
                2
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(p: &str) -> GlobPattern {
        GlobPattern::new(p).unwrap()
    }

    #[test]
    fn relative_pattern_matches_at_any_depth() {
        let p = glob("**/.npm");
        assert!(p.matches("/home/user/.npm"));
        assert!(p.matches("/tmp/fixture/.npm"));
        assert!(!p.matches("/home/user/.npm/_cacache"));
        assert!(!p.matches("/home/user/x.npm"));
    }

    #[test]
    fn implicit_double_star_prefix() {
        let p = glob(".cache/pip");
        assert!(p.matches("/home/u/.cache/pip"));
        assert_eq!(p.specificity(), glob("**/.cache/pip").specificity());
    }

    #[test]
    fn single_star_stays_in_segment() {
        let p = glob("**/.cache/*");
        assert!(p.matches("/home/u/.cache/foo"));
        assert!(!p.matches("/home/u/.cache"));
        assert!(!p.matches("/home/u/.cache/foo/bar"));
    }

    #[test]
    fn absolute_pattern_is_anchored() {
        let p = glob("/var/log/*.gz");
        assert!(p.matches("/var/log/syslog.2.gz"));
        assert!(!p.matches("/srv/var/log/syslog.2.gz"));
        assert!(!p.matches("/var/log/nginx/access.log.gz"));
    }

    #[test]
    fn inner_double_star_spans_segments() {
        let p = glob("/var/log/**/*.gz");
        assert!(p.matches("/var/log/a.gz"));
        assert!(p.matches("/var/log/nginx/old/access.log.gz"));
    }

    #[test]
    fn character_class() {
        let p = glob("/var/log/*.[0-9]");
        assert!(p.matches("/var/log/syslog.1"));
        assert!(!p.matches("/var/log/syslog.x"));
    }

    #[test]
    fn literal_characters_are_escaped() {
        let p = glob("**/Code Cache");
        assert!(p.matches("/home/u/.config/Slack/Code Cache"));
        let p = glob("**/com.apple.Safari");
        assert!(!p.matches("/x/comXappleXSafari"));
    }

    #[test]
    fn deeper_literal_patterns_are_more_specific() {
        assert!(glob("**/.cache/google-chrome").specificity() > glob("**/.cache/*").specificity());
        assert!(glob("**/Library/Caches/*").specificity() > glob("**/*").specificity());
        assert_eq!(glob("**/*.log").specificity(), 1);
    }
}
