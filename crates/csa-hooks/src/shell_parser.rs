//! Splits a compound shell command into its top-level components, honoring
//! quoting and escaping. This exists because tool permission layers see the
//! command as an opaque string; decomposing it is the only way to classify
//! `cmd1 && cmd2` by the tier of its most dangerous component.

/// Split `command` at top-level occurrences of `|`, `&&`, `||`, `;`, or a
/// newline. Separators inside single or double quotes are data, not
/// delimiters. An unclosed quote is treated as closed at end of input.
pub fn parse(command: &str) -> Vec<String> {
    let command = command.trim();
    if command.is_empty() {
        return Vec::new();
    }
    split_on_operators(command)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_on_operators(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut components = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == '\\' && i + 1 < chars.len() {
            current.push(ch);
            current.push(chars[i + 1]);
            i += 2;
            continue;
        }

        if ch == '\'' && !in_double_quote {
            in_single_quote = !in_single_quote;
            current.push(ch);
            i += 1;
            continue;
        }

        if ch == '"' && !in_single_quote {
            in_double_quote = !in_double_quote;
            current.push(ch);
            i += 1;
            continue;
        }

        if in_single_quote || in_double_quote {
            current.push(ch);
            i += 1;
            continue;
        }

        if i + 1 < chars.len() {
            let two: String = chars[i..i + 2].iter().collect();
            if two == "&&" || two == "||" {
                if !current.is_empty() {
                    components.push(std::mem::take(&mut current));
                }
                i += 2;
                continue;
            }
        }

        if ch == '|' || ch == ';' || ch == '\n' {
            if !current.is_empty() {
                components.push(std::mem::take(&mut current));
            }
            i += 1;
            continue;
        }

        current.push(ch);
        i += 1;
    }

    if !current.is_empty() {
        components.push(current);
    }

    components
}

/// True if `command` contains a top-level separator outside of quotes.
pub fn contains_operators(command: &str) -> bool {
    parse(command).len() > 1
}

/// True if `command` has no top-level operator (a single component).
pub fn is_simple_command(command: &str) -> bool {
    !contains_operators(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_pipe_and_and() {
        assert_eq!(
            parse("ls | grep foo && wc -l"),
            vec!["ls", "grep foo", "wc -l"]
        );
    }

    #[test]
    fn preserves_separator_inside_single_quotes() {
        assert_eq!(
            parse("echo 'test | grep' | cat"),
            vec!["echo 'test | grep'", "cat"]
        );
    }

    #[test]
    fn preserves_separator_inside_double_quotes() {
        assert_eq!(
            parse(r#"echo "a && b" && ls"#),
            vec![r#"echo "a && b""#, "ls"]
        );
    }

    #[test]
    fn two_char_operators_take_priority_over_one_char() {
        assert_eq!(parse("a && b"), vec!["a", "b"]);
        assert_eq!(parse("a || b"), vec!["a", "b"]);
    }

    #[test]
    fn escape_sequences_consume_two_chars() {
        assert_eq!(parse(r"echo a\|b"), vec![r"echo a\|b"]);
    }

    #[test]
    fn semicolon_and_newline_separate() {
        assert_eq!(parse("a; b\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_and_whitespace_only_input() {
        assert_eq!(parse(""), Vec::<String>::new());
        assert_eq!(parse("   "), Vec::<String>::new());
    }

    #[test]
    fn trailing_separator_drops_empty_component() {
        assert_eq!(parse("ls ;"), vec!["ls"]);
    }

    #[test]
    fn single_component_has_no_top_level_separator() {
        assert_eq!(parse("git status").len(), 1);
        assert!(is_simple_command("git status"));
        assert!(!contains_operators("git status"));
    }

    #[test]
    fn unclosed_quote_behaves_as_closed_at_eol() {
        // Best-effort: the trailing `|` stays inside the (never-closed)
        // single quote rather than splitting.
        assert_eq!(parse("echo 'unterminated | pipe"), vec!["echo 'unterminated | pipe"]);
    }

    #[test]
    fn parse_round_trip_is_stable() {
        let original = "ls | grep foo && wc -l";
        let first = parse(original);
        let rejoined = first.join(" ; ");
        let second = parse(&rejoined);
        assert_eq!(first, second);
    }
}
