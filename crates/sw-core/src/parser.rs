//! Shell command parsing and structural analysis.
//!
//! Decomposes a command string into its base command, flags, arguments,
//! pipes, redirections and leading environment assignments, and tags it with
//! file, network and system operation categories. Parsing is tokenizer based,
//! not a shell grammar, and never fails: malformed input yields a degraded
//! [`ParsedCommand`] with empty structured fields.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// A redirection operator and the word that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirection {
    /// Operator as written, including any fd number (`>`, `2>>`, `<`, `2>&`).
    pub marker: String,
    pub target: String,
}

impl Redirection {
    pub fn new(marker: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            target: target.into(),
        }
    }
}

/// Structured view of a single shell command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedCommand {
    /// Canonical form: `sudo ` prefix and ` &` suffix reattached.
    pub raw_command: String,
    pub base_command: String,
    pub arguments: Vec<String>,
    pub flags: Vec<String>,
    pub redirections: Vec<Redirection>,
    /// Pipe-target segments, excluding the first command.
    pub pipes: Vec<String>,
    pub environment_vars: BTreeMap<String, String>,
    pub background: bool,
    pub uses_sudo: bool,
    pub file_operations: Vec<&'static str>,
    pub network_operations: Vec<&'static str>,
    pub system_operations: Vec<&'static str>,
}

impl ParsedCommand {
    /// Best-effort result for input the parser could not decompose.
    fn degraded(raw: &str, command: &str, uses_sudo: bool) -> Self {
        Self {
            raw_command: raw.to_string(),
            base_command: command.split_whitespace().next().unwrap_or("").to_string(),
            uses_sudo,
            ..Self::default()
        }
    }
}

/// Summary of a parsed command for display and scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub base_command: String,
    pub argument_count: usize,
    pub flag_count: usize,
    pub has_pipes: bool,
    pub has_redirections: bool,
    pub uses_sudo: bool,
    pub runs_background: bool,
    pub file_operations: Vec<&'static str>,
    pub network_operations: Vec<&'static str>,
    pub system_operations: Vec<&'static str>,
    /// Heuristic complexity in `0..=10`.
    pub complexity_score: u8,
}

// --- Pattern tables ---

/// (label, pattern tail after the command word)
const FILE_COMMANDS: &[(&str, &str)] = &[
    ("cp", r"\s+"),
    ("mv", r"\s+"),
    ("rm", r"\s+"),
    ("mkdir", r"\s+"),
    ("rmdir", r"\s+"),
    ("touch", r"\s+"),
    ("ln", r"\s+"),
    ("tar", r"\s+"),
    ("zip", r"\s+"),
    ("unzip", r"\s+"),
];

const NETWORK_COMMANDS: &[(&str, &str)] = &[
    ("curl", r"\s+"),
    ("wget", r"\s+"),
    ("ssh", r"\s+"),
    ("scp", r"\s+"),
    // rsync only counts when a remote host is named
    ("rsync", r"\s+.*@"),
    ("nc", r"\s+"),
    ("netcat", r"\s+"),
    ("telnet", r"\s+"),
    ("ftp", r"\s+"),
    ("sftp", r"\s+"),
];

const SYSTEM_COMMANDS: &[(&str, &str)] = &[
    ("systemctl", r"\s+"),
    ("service", r"\s+"),
    ("mount", r"\s+"),
    ("umount", r"\s+"),
    ("modprobe", r"\s+"),
    ("insmod", r"\s+"),
    ("rmmod", r"\s+"),
    ("iptables", r"\s+"),
];

/// (pattern, description); matched case-insensitively.
const DESTRUCTIVE_PATTERNS: &[(&str, &str)] = &[
    (r"rm\s+-rf\s+/", "Recursive deletion of root directory"),
    (r"dd\s+.*of=/dev/", "Direct disk writing operation"),
    (r"mkfs", "File system formatting"),
    (r"fdisk", "Disk partitioning"),
    (r"format\s+", "Drive formatting"),
    (r":\(\)\s*\{.*\}", "Fork bomb pattern"),
    (r"chmod\s+(?:-R\s+)?777", "Overly permissive permissions"),
    (r"chown\s+(?:-\S+\s+)*root\b", "Root ownership change"),
];

struct OperationPattern {
    label: &'static str,
    regex: Regex,
}

/// Compile a table of command words. A word matches at the start of the
/// command or after whitespace, a separator, a backslash or a quote,
/// optionally with a path prefix and a closing quote (`\curl`, `'wget'`).
fn operation_table(entries: &[(&'static str, &str)]) -> Vec<OperationPattern> {
    entries
        .iter()
        .map(|&(label, tail)| OperationPattern {
            label,
            regex: Regex::new(&format!(
                r#"(?:^|[\s;&|(`\\'"])(?:\S*/)?{}['"]?{}"#,
                regex::escape(label),
                tail
            ))
            .expect("operation pattern is valid"),
        })
        .collect()
}

static FILE_OPERATIONS: LazyLock<Vec<OperationPattern>> =
    LazyLock::new(|| operation_table(FILE_COMMANDS));
static NETWORK_OPERATIONS: LazyLock<Vec<OperationPattern>> =
    LazyLock::new(|| operation_table(NETWORK_COMMANDS));
static SYSTEM_OPERATIONS: LazyLock<Vec<OperationPattern>> =
    LazyLock::new(|| operation_table(SYSTEM_COMMANDS));

static DESTRUCTIVE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    DESTRUCTIVE_PATTERNS
        .iter()
        .map(|(pattern, description)| {
            let regex =
                Regex::new(&format!("(?i){pattern}")).expect("destructive pattern is valid");
            (regex, *description)
        })
        .collect()
});

fn match_operations(table: &[OperationPattern], command: &str) -> Vec<&'static str> {
    table
        .iter()
        .filter(|op| op.regex.is_match(command))
        .map(|op| op.label)
        .collect()
}

/// Stateless shell command parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a command line. Never fails; see the module docs.
    pub fn parse(&self, raw: &str) -> ParsedCommand {
        let trimmed = raw.trim();

        let (uses_sudo, rest) = match trimmed.strip_prefix("sudo ") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };

        let (background, command) = match rest.strip_suffix(" &") {
            Some(command) => (true, command.trim_end()),
            None => (false, rest),
        };

        if command.is_empty() {
            tracing::warn!(command = trimmed, "empty command, returning degraded parse");
            return ParsedCommand::degraded(trimmed, rest, uses_sudo);
        }

        let scan = scan(command);
        if scan.unterminated {
            tracing::warn!(command = trimmed, "unbalanced quoting, returning degraded parse");
            return ParsedCommand::degraded(trimmed, rest, uses_sudo);
        }

        let tokens = match shlex::split(&command[..scan.head_end]) {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => {
                tracing::warn!(command = trimmed, "no command word, returning degraded parse");
                return ParsedCommand::degraded(trimmed, rest, uses_sudo);
            }
        };

        let mut environment_vars = BTreeMap::new();
        for token in tokens.iter().take_while(|t| is_assignment(t)) {
            if let Some((key, value)) = token.split_once('=') {
                environment_vars.insert(key.to_string(), value.to_string());
            }
        }

        // assignments are recorded, not skipped: the first token stays the base
        let mut words = tokens.into_iter();
        let base_command = words.next().unwrap_or_default();
        let (flags, arguments): (Vec<String>, Vec<String>) =
            words.partition(|word| word.starts_with('-'));

        let pipes = scan
            .pipes
            .iter()
            .enumerate()
            .map(|(n, &(_, seg_start))| {
                let seg_end = scan
                    .pipes
                    .get(n + 1)
                    .map(|&(op_start, _)| op_start)
                    .unwrap_or(command.len());
                command[seg_start..seg_end].trim().to_string()
            })
            .filter(|segment| !segment.is_empty())
            .collect();

        let parsed = ParsedCommand {
            raw_command: format!(
                "{}{}{}",
                if uses_sudo { "sudo " } else { "" },
                command,
                if background { " &" } else { "" }
            ),
            base_command,
            arguments,
            flags,
            redirections: scan.redirections,
            pipes,
            environment_vars,
            background,
            uses_sudo,
            file_operations: match_operations(&FILE_OPERATIONS, command),
            network_operations: match_operations(&NETWORK_OPERATIONS, command),
            system_operations: match_operations(&SYSTEM_OPERATIONS, command),
        };

        tracing::debug!(
            base = %parsed.base_command,
            pipes = parsed.pipes.len(),
            redirections = parsed.redirections.len(),
            "parsed command"
        );
        parsed
    }

    /// Check `command` against the destructive pattern table, returning the
    /// description of every pattern that matched.
    pub fn is_destructive(&self, command: &str) -> (bool, Vec<String>) {
        let warnings: Vec<String> = DESTRUCTIVE
            .iter()
            .filter(|(regex, _)| regex.is_match(command))
            .map(|(_, description)| description.to_string())
            .collect();
        (!warnings.is_empty(), warnings)
    }

    /// Advisory syntax checks. Findings never block execution by themselves.
    pub fn validate_syntax(&self, command: &str) -> (bool, Vec<String>) {
        let mut errors = Vec::new();

        if shlex::split(command).is_none() {
            errors.push("Shell syntax error: unterminated quote or trailing escape".to_string());
        }
        if command.matches('"').count() % 2 != 0 {
            errors.push("Unmatched double quotes".to_string());
        }
        if command.matches('\'').count() % 2 != 0 {
            errors.push("Unmatched single quotes".to_string());
        }
        if command.contains("rm")
            && command.contains("-rf")
            && (command.contains('*') || command.contains('/'))
        {
            errors.push("Potentially dangerous rm command with wildcards or paths".to_string());
        }

        (errors.is_empty(), errors)
    }

    pub fn get_command_info(&self, parsed: &ParsedCommand) -> CommandInfo {
        CommandInfo {
            base_command: parsed.base_command.clone(),
            argument_count: parsed.arguments.len(),
            flag_count: parsed.flags.len(),
            has_pipes: !parsed.pipes.is_empty(),
            has_redirections: !parsed.redirections.is_empty(),
            uses_sudo: parsed.uses_sudo,
            runs_background: parsed.background,
            file_operations: parsed.file_operations.clone(),
            network_operations: parsed.network_operations.clone(),
            system_operations: parsed.system_operations.clone(),
            complexity_score: complexity_score(parsed),
        }
    }
}

fn complexity_score(parsed: &ParsedCommand) -> u8 {
    let mut score = parsed.arguments.len().min(3) + parsed.flags.len().min(3);
    if !parsed.pipes.is_empty() {
        score += 2;
    }
    if !parsed.redirections.is_empty() {
        score += 1;
    }
    if parsed.uses_sudo {
        score += 1;
    }
    if !parsed.file_operations.is_empty() {
        score += 1;
    }
    if !parsed.network_operations.is_empty() {
        score += 2;
    }
    if !parsed.system_operations.is_empty() {
        score += 2;
    }
    score.min(10) as u8
}

// --- Private helpers ---

/// `NAME=value` where NAME is an identifier.
fn is_assignment(token: &str) -> bool {
    if token.starts_with('-') {
        return false;
    }
    match token.split_once('=') {
        Some((key, _)) => is_identifier(key),
        None => false,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Operators found outside quotes.
struct Scan {
    /// (operator start, segment start) byte offsets of each pipe.
    pipes: Vec<(usize, usize)>,
    redirections: Vec<Redirection>,
    /// End of the leading simple command: the first pipe, redirection,
    /// `;`, `&` or newline.
    head_end: usize,
    /// A quote or escape was still open at end of input.
    unterminated: bool,
}

fn scan(cmd: &str) -> Scan {
    let chars: Vec<(usize, char)> = cmd.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map(|(b, _)| *b).unwrap_or(cmd.len());
    let char_at = |i: usize| chars.get(i).map(|(_, c)| *c);

    let mut result = Scan {
        pipes: Vec::new(),
        redirections: Vec::new(),
        head_end: cmd.len(),
        unterminated: false,
    };
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];

        if escaped {
            escaped = false;
            i += 1;
            continue;
        }

        match ch {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ if in_single || in_double => {}
            '|' => {
                result.head_end = result.head_end.min(pos);
                if char_at(i + 1) == Some('|') {
                    // logical OR, not a pipe
                    i += 2;
                    continue;
                }
                let mut end = i + 1;
                if char_at(end) == Some('&') {
                    end += 1;
                }
                result.pipes.push((pos, byte_at(end)));
                i = end;
                continue;
            }
            '>' | '<' | '&' => {
                if let Some((start, marker, op_end)) = redirection_operator(&chars, i) {
                    result.head_end = result.head_end.min(byte_at(start));
                    let (target, next) = read_word(&chars, op_end);
                    if !target.is_empty() {
                        result.redirections.push(Redirection { marker, target });
                    }
                    i = next;
                    continue;
                }
                if ch == '&' {
                    result.head_end = result.head_end.min(pos);
                }
            }
            ';' | '\n' => result.head_end = result.head_end.min(pos),
            _ => {}
        }
        i += 1;
    }

    result.unterminated = in_single || in_double || escaped;
    result
}

/// Recognize a redirection operator at `chars[i]`.
///
/// Returns the index where the operator starts (including a leading fd
/// number), the operator text, and the index just past it.
fn redirection_operator(chars: &[(usize, char)], i: usize) -> Option<(usize, String, usize)> {
    let char_at = |k: usize| chars.get(k).map(|(_, c)| *c);
    let mut start = i;
    let mut k = i + 1;

    match chars[i].1 {
        '&' => {
            // &> and &>> redirect stdout and stderr together
            if char_at(k) != Some('>') {
                return None;
            }
            k += 1;
            if char_at(k) == Some('>') {
                k += 1;
            }
        }
        '>' => {
            start = fd_prefix_start(chars, i);
            match char_at(k) {
                Some('>') | Some('&') | Some('|') => k += 1,
                _ => {}
            }
        }
        '<' => {
            match char_at(k) {
                // process substitution
                Some('(') => return None,
                Some('<') => {
                    k += 1;
                    if char_at(k) == Some('<') {
                        k += 1;
                    }
                }
                _ => start = fd_prefix_start(chars, i),
            }
        }
        _ => return None,
    }

    let marker: String = chars[start..k].iter().map(|(_, c)| *c).collect();
    Some((start, marker, k))
}

/// Index of a file-descriptor number written directly before the operator
/// at `i` (`2>`), or `i` when there is none.
fn fd_prefix_start(chars: &[(usize, char)], i: usize) -> usize {
    let mut j = i;
    while j > 0 && chars[j - 1].1.is_ascii_digit() {
        j -= 1;
    }
    if j < i && (j == 0 || chars[j - 1].1.is_whitespace()) {
        j
    } else {
        i
    }
}

/// Read the word after a redirection operator, skipping leading whitespace.
/// Quotes group characters and are removed. Returns the word and the index
/// where scanning should resume.
fn read_word(chars: &[(usize, char)], from: usize) -> (String, usize) {
    let mut i = from;
    while i < chars.len() && chars[i].1.is_whitespace() && chars[i].1 != '\n' {
        i += 1;
    }

    let mut word = String::new();
    let mut in_single = false;
    let mut in_double = false;
    while i < chars.len() {
        let ch = chars[i].1;
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ if in_single || in_double => word.push(ch),
            c if c.is_whitespace() || matches!(c, '|' | ';' | '&' | '<' | '>') => break,
            c => word.push(c),
        }
        i += 1;
    }
    (word, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(cmd: &str) -> ParsedCommand {
        CommandParser::new().parse(cmd)
    }

    // --- Basic structure ---

    #[test]
    fn parse_sudo_rm() {
        let parsed = parse("sudo rm -rf /tmp/x");
        assert!(parsed.uses_sudo);
        assert_eq!(parsed.base_command, "rm");
        assert_eq!(parsed.flags, vec!["-rf"]);
        assert_eq!(parsed.arguments, vec!["/tmp/x"]);
        assert_eq!(parsed.file_operations, vec!["rm"]);
        assert_eq!(parsed.raw_command, "sudo rm -rf /tmp/x");
    }

    #[test]
    fn parse_pipe_and_redirection() {
        let parsed = parse("curl http://x | grep y > out.txt");
        assert_eq!(parsed.base_command, "curl");
        assert_eq!(parsed.arguments, vec!["http://x"]);
        assert_eq!(parsed.network_operations, vec!["curl"]);
        assert_eq!(parsed.pipes, vec!["grep y > out.txt"]);
        assert_eq!(parsed.redirections, vec![Redirection::new(">", "out.txt")]);
    }

    #[test]
    fn parse_flags_and_arguments_keep_order() {
        let parsed = parse("tar -x -v -f archive.tar dir1 dir2");
        assert_eq!(parsed.flags, vec!["-x", "-v", "-f"]);
        assert_eq!(parsed.arguments, vec!["archive.tar", "dir1", "dir2"]);
    }

    #[test]
    fn parse_quoted_arguments() {
        let parsed = parse("grep -r \"hello world\" src");
        assert_eq!(parsed.arguments, vec!["hello world", "src"]);
    }

    #[test]
    fn parse_multiple_pipes() {
        let parsed = parse("ps aux | grep nginx | wc -l");
        assert_eq!(parsed.base_command, "ps");
        assert_eq!(parsed.pipes, vec!["grep nginx", "wc -l"]);
    }

    #[test]
    fn quoted_pipe_is_not_a_pipe() {
        let parsed = parse("echo 'a | b'");
        assert!(parsed.pipes.is_empty());
        assert_eq!(parsed.arguments, vec!["a | b"]);
    }

    #[test]
    fn logical_or_is_not_a_pipe() {
        let parsed = parse("make || echo failed");
        assert!(parsed.pipes.is_empty());
        assert_eq!(parsed.base_command, "make");
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn chain_ends_head_segment() {
        let parsed = parse("cd /tmp && rm scratch.txt");
        assert_eq!(parsed.base_command, "cd");
        assert_eq!(parsed.arguments, vec!["/tmp"]);
        assert_eq!(parsed.file_operations, vec!["rm"]);
    }

    // --- Redirections ---

    #[test]
    fn numbered_fd_redirection() {
        let parsed = parse("ls 2> err.log");
        assert_eq!(parsed.redirections, vec![Redirection::new("2>", "err.log")]);
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn multiple_redirections_in_order() {
        let parsed = parse("sort < in.txt >> out.txt 2>&1");
        assert_eq!(
            parsed.redirections,
            vec![
                Redirection::new("<", "in.txt"),
                Redirection::new(">>", "out.txt"),
                Redirection::new("2>&", "1"),
            ]
        );
        assert_eq!(parsed.base_command, "sort");
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn redirection_without_space() {
        let parsed = parse("echo hi >out.txt");
        assert_eq!(parsed.redirections, vec![Redirection::new(">", "out.txt")]);
        assert_eq!(parsed.arguments, vec!["hi"]);
    }

    #[test]
    fn digit_inside_word_is_not_fd() {
        let parsed = parse("echo a2>f");
        assert_eq!(parsed.redirections, vec![Redirection::new(">", "f")]);
        assert_eq!(parsed.arguments, vec!["a2"]);
    }

    #[test]
    fn quoted_redirection_target() {
        let parsed = parse("echo x > \"my file.txt\"");
        assert_eq!(
            parsed.redirections,
            vec![Redirection::new(">", "my file.txt")]
        );
    }

    #[test]
    fn heredoc_marker() {
        let parsed = parse("cat <<EOF");
        assert_eq!(parsed.redirections, vec![Redirection::new("<<", "EOF")]);
    }

    #[test]
    fn process_substitution_is_not_redirection() {
        let parsed = parse("diff <(ls a) <(ls b)");
        assert!(parsed.redirections.is_empty());
        assert_eq!(parsed.base_command, "diff");
    }

    #[test]
    fn quoted_angle_bracket_is_not_redirection() {
        let parsed = parse("echo '1 > 0'");
        assert!(parsed.redirections.is_empty());
    }

    // --- Environment, background, sudo ---

    #[test]
    fn leading_environment_assignments() {
        let parsed = parse("FOO=1 BAR=2 make all");
        assert_eq!(parsed.environment_vars.get("FOO").map(String::as_str), Some("1"));
        assert_eq!(parsed.environment_vars.get("BAR").map(String::as_str), Some("2"));
    }

    #[test]
    fn assignment_prefix_stays_in_token_stream() {
        let parsed = parse("FOO=1 make all");
        assert_eq!(parsed.environment_vars["FOO"], "1");
        assert_eq!(parsed.base_command, "FOO=1");
        assert_eq!(parsed.arguments, vec!["make", "all"]);
        assert!(parsed.flags.is_empty());
    }

    #[test]
    fn later_assignment_overrides() {
        let parsed = parse("A=1 A=2 env");
        assert_eq!(parsed.environment_vars.len(), 1);
        assert_eq!(parsed.environment_vars["A"], "2");
    }

    #[test]
    fn non_identifier_is_not_assignment() {
        let parsed = parse("1X=2 cmd");
        assert!(parsed.environment_vars.is_empty());
        assert_eq!(parsed.base_command, "1X=2");

        let parsed = parse("--opt=1 cmd");
        assert!(parsed.environment_vars.is_empty());
    }

    #[test]
    fn assignment_after_command_word_is_argument() {
        let parsed = parse("dd if=/dev/zero of=out.img");
        assert!(parsed.environment_vars.is_empty());
        assert_eq!(parsed.arguments, vec!["if=/dev/zero", "of=out.img"]);
    }

    #[test]
    fn background_marker() {
        let parsed = parse("sleep 10 &");
        assert!(parsed.background);
        assert_eq!(parsed.arguments, vec!["10"]);
        assert_eq!(parsed.raw_command, "sleep 10 &");
    }

    #[test]
    fn double_ampersand_is_not_background() {
        let parsed = parse("make &&");
        assert!(!parsed.background);
    }

    #[test]
    fn sudo_and_background_together() {
        let parsed = parse("  sudo   systemctl restart nginx &  ");
        assert!(parsed.uses_sudo);
        assert!(parsed.background);
        assert_eq!(parsed.base_command, "systemctl");
        assert_eq!(parsed.system_operations, vec!["systemctl"]);
        assert_eq!(parsed.raw_command, "sudo systemctl restart nginx &");
    }

    // --- Categories ---

    #[test]
    fn categories_are_independent() {
        let parsed = parse("curl -o a.tgz http://h/a.tgz && tar xzf a.tgz && sudo mount /dev/sdb1 /mnt");
        assert_eq!(parsed.network_operations, vec!["curl"]);
        assert_eq!(parsed.file_operations, vec!["tar"]);
        assert_eq!(parsed.system_operations, vec!["mount"]);
    }

    #[test]
    fn category_words_need_word_boundary() {
        let parsed = parse("echo perform scp_report");
        assert!(parsed.file_operations.is_empty());
        assert!(parsed.network_operations.is_empty());

        let parsed = parse("sftp user@host");
        assert_eq!(parsed.network_operations, vec!["sftp"]);
    }

    #[test]
    fn path_prefixed_command_word() {
        let parsed = parse("/bin/rm file.txt");
        assert_eq!(parsed.base_command, "/bin/rm");
        assert_eq!(parsed.file_operations, vec!["rm"]);
    }

    #[test]
    fn escaped_or_quoted_command_word_is_classified() {
        let parsed = parse("\\curl http://evil.sh");
        assert_eq!(parsed.base_command, "curl");
        assert_eq!(parsed.network_operations, vec!["curl"]);

        let parsed = parse("'wget' http://x");
        assert_eq!(parsed.base_command, "wget");
        assert_eq!(parsed.network_operations, vec!["wget"]);

        let parsed = parse("\"rm\" -r dir");
        assert_eq!(parsed.base_command, "rm");
        assert_eq!(parsed.file_operations, vec!["rm"]);

        let parsed = parse("ls && \"/usr/bin/ssh\" host");
        assert_eq!(parsed.network_operations, vec!["ssh"]);
    }

    #[test]
    fn rsync_needs_remote_host() {
        assert!(parse("rsync -a src/ dst/").network_operations.is_empty());
        assert_eq!(
            parse("rsync -a src/ me@host:dst/").network_operations,
            vec!["rsync"]
        );
    }

    // --- Degradation ---

    #[test]
    fn unbalanced_quote_degrades() {
        let parsed = parse("echo \"unterminated");
        assert_eq!(parsed.base_command, "echo");
        assert_eq!(parsed.raw_command, "echo \"unterminated");
        assert!(parsed.arguments.is_empty());
        assert!(parsed.flags.is_empty());
        assert!(parsed.file_operations.is_empty());
    }

    #[test]
    fn degraded_keeps_sudo() {
        let parsed = parse("sudo rm 'oops");
        assert!(parsed.uses_sudo);
        assert_eq!(parsed.base_command, "rm");
        assert_eq!(parsed.raw_command, "sudo rm 'oops");
    }

    #[test]
    fn empty_command_degrades() {
        let parsed = parse("   ");
        assert_eq!(parsed, ParsedCommand::default());

        let parsed = parse("sudo  &");
        assert!(parsed.uses_sudo);
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn redirection_only_degrades() {
        let parsed = parse("> out.txt");
        assert_eq!(parsed.base_command, ">");
        assert!(parsed.redirections.is_empty());
    }

    #[test]
    fn parse_terminates_on_odd_input() {
        for input in ["|", "||", "&", ">", "<", "\\", "'", "\"", "2>", "a |& b", "<<<", "&>"] {
            let _ = parse(input);
        }
    }

    // --- Idempotence ---

    #[test]
    fn reparse_of_canonical_form_is_stable() {
        for input in [
            "sudo rm -rf /tmp/x",
            "curl http://x | grep y > out.txt",
            "  sleep 5   &",
            "FOO=bar sudo ls",
            "sudo  tar -czf out.tgz dir 2>/dev/null &",
        ] {
            let first = parse(input);
            let second = parse(&first.raw_command);
            assert_eq!(first, second, "unstable reparse for {input:?}");
        }
    }

    // --- Analysis operations ---

    #[test]
    fn destructive_mkfs() {
        let (destructive, warnings) = CommandParser::new().is_destructive("mkfs.ext4 /dev/sda1");
        assert!(destructive);
        assert!(warnings.contains(&"File system formatting".to_string()));
    }

    #[test]
    fn destructive_is_case_insensitive_and_collects_all() {
        let (destructive, warnings) =
            CommandParser::new().is_destructive("RM -RF / ; chmod 777 /etc");
        assert!(destructive);
        assert_eq!(
            warnings,
            vec![
                "Recursive deletion of root directory".to_string(),
                "Overly permissive permissions".to_string(),
            ]
        );
    }

    #[test]
    fn destructive_dd_and_fork_bomb() {
        let parser = CommandParser::new();
        assert!(parser.is_destructive("dd if=/dev/zero of=/dev/sda bs=1M").0);
        assert!(parser.is_destructive(":(){ :|:& };:").0);
        assert!(parser.is_destructive("chown -R root /srv").0);
    }

    #[test]
    fn harmless_is_not_destructive() {
        let (destructive, warnings) = CommandParser::new().is_destructive("ls -la /tmp");
        assert!(!destructive);
        assert!(warnings.is_empty());
    }

    #[test]
    fn validate_unterminated_quote() {
        let (ok, errors) = CommandParser::new().validate_syntax("echo \"unterminated");
        assert!(!ok);
        assert!(errors.iter().any(|e| e.contains("Unmatched double quotes")));
        assert!(errors.iter().any(|e| e.starts_with("Shell syntax error")));
    }

    #[test]
    fn validate_single_quotes() {
        let (ok, errors) = CommandParser::new().validate_syntax("echo 'x");
        assert!(!ok);
        assert!(errors.contains(&"Unmatched single quotes".to_string()));
    }

    #[test]
    fn validate_rm_wildcard() {
        let (ok, errors) = CommandParser::new().validate_syntax("rm -rf *");
        assert!(!ok);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("dangerous rm"));
    }

    #[test]
    fn validate_clean_command() {
        assert_eq!(
            CommandParser::new().validate_syntax("ls -la"),
            (true, Vec::new())
        );
    }

    #[test]
    fn command_info_fields() {
        let parser = CommandParser::new();
        let parsed = parser.parse("sudo curl -s -L http://x | tar xz > log.txt &");
        let info = parser.get_command_info(&parsed);
        assert_eq!(info.base_command, "curl");
        assert_eq!(info.argument_count, 1);
        assert_eq!(info.flag_count, 2);
        assert!(info.has_pipes);
        assert!(info.has_redirections);
        assert!(info.uses_sudo);
        assert!(info.runs_background);
        // 1 arg + 2 flags + pipes 2 + redirection 1 + sudo 1 + file 1 + network 2
        assert_eq!(info.complexity_score, 10);
    }

    #[test]
    fn complexity_is_capped() {
        let parser = CommandParser::new();
        let parsed = parser.parse(
            "sudo a b c d -e -f -g -h | curl x > y; systemctl start z; rm q",
        );
        assert_eq!(parser.get_command_info(&parsed).complexity_score, 10);
    }

    #[test]
    fn complexity_of_simple_command() {
        let parser = CommandParser::new();
        let parsed = parser.parse("ls -la /tmp");
        assert_eq!(parser.get_command_info(&parsed).complexity_score, 2);
    }

    #[test]
    fn command_info_serializes() {
        let parser = CommandParser::new();
        let info = parser.get_command_info(&parser.parse("ls"));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["base_command"], "ls");
        assert_eq!(json["complexity_score"], 0);
    }
}
