//! The dotenv file read by the assistant and by the unit's `EnvironmentFile=`.
//!
//! Updates are line-surgical: assigning a key drops the lines that assign it and
//! appends one new assignment. Every other line, comments included, is kept
//! byte for byte and in order.

use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::BootstrapError;
use crate::prompt::Prompter;
use crate::ui;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Optional keys listed, commented out, in a fresh file.
pub const OPTIONAL_KEYS: &[(&str, &str)] = &[
    (
        "Reuse an existing assistant and conversation thread",
        "JARVIS_ASSISTANT_ID",
    ),
    ("", "JARVIS_THREAD_ID"),
    ("GitHub repository access", "GITHUB_API_TOKEN"),
    ("", "GITHUB_REPO_OWNER"),
    ("", "GITHUB_REPO_NAME"),
];

static API_KEY_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9]{32,}$").expect("API key pattern is valid"));

/// Advisory findings about an API key. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyWarning {
    #[error("API key is empty; the assistant will not start until it is set")]
    Empty,
    #[error("API key does not start with 'sk-'")]
    MissingPrefix,
    #[error("API key should be 'sk-' followed by at least 32 letters or digits")]
    MalformedBody,
}

pub fn validate_api_key(value: &str) -> Result<(), KeyWarning> {
    if value.is_empty() {
        Err(KeyWarning::Empty)
    } else if !value.starts_with("sk-") {
        Err(KeyWarning::MissingPrefix)
    } else if !API_KEY_FORMAT.is_match(value) {
        Err(KeyWarning::MalformedBody)
    } else {
        Ok(())
    }
}

/// Key assigned by `line`, if it is an active `KEY=value` assignment.
fn assignment_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, _) = line.split_once('=')?;
    let key = key.trim();
    is_valid_key(key).then_some(key)
}

/// Shell-style variable name: a letter or `_`, then letters, digits or `_`.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Value of an assignment line. Double-quoted values have `\"` and `\\`
/// unescaped; single-quoted values are literal.
fn assignment_value(line: &str) -> Cow<'_, str> {
    let value = line.split_once('=').map(|(_, v)| v.trim()).unwrap_or("");
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return Cow::Borrowed(&value[1..value.len() - 1]);
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        if !inner.contains('\\') {
            return Cow::Borrowed(inner);
        }
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.push(chars.next().unwrap_or('\\')),
                c => out.push(c),
            }
        }
        return Cow::Owned(out);
    }
    Cow::Borrowed(value)
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// A raw line without its `\n` or `\r\n` terminator.
fn content(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(line) => line.strip_suffix('\r').unwrap_or(line),
        None => line,
    }
}

/// Ordered lines of a dotenv file, each kept with its original terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<String>,
}

impl EnvFile {
    pub fn parse(contents: &str) -> Self {
        Self {
            lines: contents.split_inclusive('\n').map(String::from).collect(),
        }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, BootstrapError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(Self::parse(&contents))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Minimal file for a fresh install.
    pub fn template(api_key: &str) -> Self {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut lines = vec![
            "# Jarvis configuration".to_string(),
            format!("# Generated by jarvis-setup on {now}"),
            String::new(),
            "# Required".to_string(),
            format!("{OPENAI_API_KEY}={}", quote(api_key)),
        ];
        for (section, key) in OPTIONAL_KEYS {
            if !section.is_empty() {
                lines.push(String::new());
                lines.push(format!("# Optional: {section}"));
            }
            lines.push(format!("# {key}="));
        }
        Self {
            lines: lines.into_iter().map(|line| line + "\n").collect(),
        }
    }

    /// Value of the last assignment of `key`, unquoted.
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        self.lines
            .iter()
            .map(|line| content(line))
            .rev()
            .find(|line| assignment_key(line) == Some(key))
            .map(assignment_value)
    }

    /// A key counts as configured once it has a non-empty value.
    pub fn is_configured(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Active assignments in file order, later duplicates included.
    pub fn entries(&self) -> Vec<(&str, Cow<'_, str>)> {
        self.lines
            .iter()
            .map(|line| content(line))
            .filter_map(|line| assignment_key(line).map(|key| (key, assignment_value(line))))
            .collect()
    }

    /// Replace every assignment of `key` with a single one at the end, using
    /// the file's dominant line ending.
    pub fn set(&mut self, key: &str, value: &str) {
        let newline = self.newline();
        self.lines
            .retain(|line| assignment_key(content(line)) != Some(key));
        if let Some(last) = self.lines.last_mut() {
            if !last.ends_with('\n') {
                last.push_str(newline);
            }
        }
        self.lines.push(format!("{key}={}{newline}", quote(value)));
    }

    fn newline(&self) -> &'static str {
        let crlf = self.lines.iter().filter(|l| l.ends_with("\r\n")).count();
        let lf = self.lines.iter().filter(|l| l.ends_with('\n')).count() - crlf;
        if crlf > lf {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Line contents without terminators.
    pub fn lines(&self) -> Vec<&str> {
        self.lines.iter().map(|line| content(line)).collect()
    }

    pub fn render(&self) -> String {
        self.lines.concat()
    }

    /// Plain overwrite; an interrupt mid-write can truncate the file.
    ///
    /// A new file is created owner-only (0600) since it holds secrets; an
    /// existing file keeps its mode.
    pub fn write(&self, path: &Path) -> Result<(), BootstrapError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(self.render().as_bytes())?;
        Ok(())
    }
}

/// What [`ensure_config_value`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOutcome {
    AlreadyConfigured,
    Updated,
    Created,
}

/// Make sure `key` has a value in the dotenv file at `path`, asking for it when
/// missing.
///
/// An existing value is left alone and the file is not rewritten. A new value
/// is checked with `validate`; failures are reported as warnings only.
pub fn ensure_config_value(
    path: &Path,
    key: &str,
    prompter: &dyn Prompter,
    validate: fn(&str) -> Result<(), KeyWarning>,
) -> Result<ConfigOutcome, BootstrapError> {
    let existing = EnvFile::load(path)?;

    if existing.as_ref().is_some_and(|file| file.is_configured(key)) {
        tracing::info!("{} already set in {}", key, path.display());
        return Ok(ConfigOutcome::AlreadyConfigured);
    }

    let value = prompter.secret(&format!("Enter your {key}"))?;
    if let Err(warning) = validate(&value) {
        tracing::warn!("{}: {}", key, warning);
        ui::warn(&format!("{warning}. You can fix it later in {}", path.display()));
    }

    match existing {
        Some(mut file) => {
            file.set(key, &value);
            file.write(path)?;
            tracing::info!("Updated {} in {}", key, path.display());
            Ok(ConfigOutcome::Updated)
        }
        None => {
            let file = if key == OPENAI_API_KEY {
                EnvFile::template(&value)
            } else {
                let mut file = EnvFile::template("");
                file.set(key, &value);
                file
            };
            file.write(path)?;
            tracing::info!("Created {} with {}", path.display(), key);
            Ok(ConfigOutcome::Created)
        }
    }
}

/// Assign `key` without asking, keeping every other line. Creates the file from
/// the template when it is missing.
pub fn set_value(path: &Path, key: &str, value: &str) -> Result<ConfigOutcome, BootstrapError> {
    if !is_valid_key(key) {
        return Err(BootstrapError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{key}' is not a valid variable name"),
        )));
    }
    if key == OPENAI_API_KEY {
        if let Err(warning) = validate_api_key(value) {
            ui::warn(&warning.to_string());
        }
    }

    let (mut file, outcome) = match EnvFile::load(path)? {
        Some(file) => (file, ConfigOutcome::Updated),
        None => (EnvFile::template(""), ConfigOutcome::Created),
    };
    file.set(key, value);
    file.write(path)?;
    Ok(outcome)
}

/// Create the file with an empty API key if it does not exist.
///
/// Returns `true` when a file was created.
pub fn ensure_exists(path: &Path) -> Result<bool, BootstrapError> {
    if path.exists() {
        return Ok(false);
    }
    EnvFile::template("").write(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::MockPrompter;
    use proptest::prelude::*;
    use tempfile::tempdir;

    const GOOD_KEY: &str = "sk-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn no_prompt() -> MockPrompter {
        let mut prompter = MockPrompter::new();
        prompter.expect_secret().never();
        prompter
    }

    #[test]
    fn test_validate_api_key() {
        assert_eq!(validate_api_key(GOOD_KEY), Ok(()));
        assert_eq!(validate_api_key(""), Err(KeyWarning::Empty));
        assert_eq!(
            validate_api_key("pk-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            Err(KeyWarning::MissingPrefix)
        );
        assert_eq!(validate_api_key("sk-short"), Err(KeyWarning::MalformedBody));
        assert_eq!(
            validate_api_key("sk-proj-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            Err(KeyWarning::MalformedBody)
        );
    }

    #[test]
    fn test_assignment_key_parsing() {
        assert_eq!(assignment_key("OPENAI_API_KEY=x"), Some("OPENAI_API_KEY"));
        assert_eq!(assignment_key("  export JARVIS_THREAD_ID = 1"), Some("JARVIS_THREAD_ID"));
        assert_eq!(assignment_key("# OPENAI_API_KEY=x"), None);
        assert_eq!(assignment_key("not an assignment"), None);
        assert_eq!(assignment_key("1BAD=x"), None);
        assert_eq!(assignment_key(""), None);
    }

    #[test]
    fn test_get_unquotes_and_prefers_last() {
        let file = EnvFile::parse("A=1\nB=\"two\"\nC='three'\nA=4\n# A=5\n");
        assert_eq!(file.get("A").as_deref(), Some("4"));
        assert_eq!(file.get("B").as_deref(), Some("two"));
        assert_eq!(file.get("C").as_deref(), Some("three"));
        assert_eq!(file.get("D").as_deref(), None);
    }

    #[test]
    fn test_set_replaces_all_assignments_and_keeps_the_rest() {
        let mut file = EnvFile::parse(
            "# header\nOPENAI_API_KEY=old\nJARVIS_THREAD_ID=123\nexport OPENAI_API_KEY=older\n\n# tail",
        );
        file.set(OPENAI_API_KEY, GOOD_KEY);
        assert_eq!(
            file.lines(),
            &[
                "# header".to_string(),
                "JARVIS_THREAD_ID=123".to_string(),
                String::new(),
                "# tail".to_string(),
                format!("OPENAI_API_KEY=\"{GOOD_KEY}\""),
            ]
        );
    }

    #[test]
    fn test_set_escapes_quotes() {
        let mut file = EnvFile::default();
        file.set("NOTE", r#"say "hi"\"#);
        assert_eq!(file.lines()[0], r#"NOTE="say \"hi\"\\""#);
    }

    #[test]
    fn test_template_lists_optional_keys_commented() {
        let file = EnvFile::template("");
        let rendered = file.render();
        assert!(rendered.contains("OPENAI_API_KEY=\"\""));
        assert!(rendered.contains("# JARVIS_ASSISTANT_ID="));
        assert!(rendered.contains("# JARVIS_THREAD_ID="));
        assert!(rendered.contains("# GITHUB_API_TOKEN="));
        assert_eq!(file.get("JARVIS_THREAD_ID").as_deref(), None);
        assert!(!file.is_configured(OPENAI_API_KEY));
    }

    #[test]
    fn test_configured_file_is_left_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        let original = format!("OPENAI_API_KEY=\"{GOOD_KEY}\"\nJARVIS_THREAD_ID=123\n");
        fs::write(&path, &original).unwrap();

        let outcome = ensure_config_value(&path, OPENAI_API_KEY, &no_prompt(), validate_api_key)
            .unwrap();

        assert_eq!(outcome, ConfigOutcome::AlreadyConfigured);
        let after = fs::read_to_string(&path).unwrap();
        assert_eq!(after, original);
        assert!(after.lines().any(|l| l == "JARVIS_THREAD_ID=123"));
    }

    #[test]
    fn test_second_run_never_prompts_or_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");

        let mut first = MockPrompter::new();
        first
            .expect_secret()
            .times(1)
            .returning(|_| Ok(GOOD_KEY.to_string()));
        assert_eq!(
            ensure_config_value(&path, OPENAI_API_KEY, &first, validate_api_key).unwrap(),
            ConfigOutcome::Created
        );

        assert_eq!(
            ensure_config_value(&path, OPENAI_API_KEY, &no_prompt(), validate_api_key).unwrap(),
            ConfigOutcome::AlreadyConfigured
        );

        let contents = fs::read_to_string(&path).unwrap();
        let assignments = contents
            .lines()
            .filter(|l| assignment_key(l) == Some(OPENAI_API_KEY))
            .count();
        assert_eq!(assignments, 1);
    }

    #[test]
    fn test_missing_key_is_appended_without_losing_other_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# mine\nJARVIS_ASSISTANT_ID=asst_1\nJARVIS_THREAD_ID=123\n").unwrap();

        let mut prompter = MockPrompter::new();
        prompter
            .expect_secret()
            .withf(|q| q.contains(OPENAI_API_KEY))
            .times(1)
            .returning(|_| Ok(GOOD_KEY.to_string()));

        let outcome =
            ensure_config_value(&path, OPENAI_API_KEY, &prompter, validate_api_key).unwrap();
        assert_eq!(outcome, ConfigOutcome::Updated);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            format!(
                "# mine\nJARVIS_ASSISTANT_ID=asst_1\nJARVIS_THREAD_ID=123\nOPENAI_API_KEY=\"{GOOD_KEY}\"\n"
            )
        );
    }

    #[test]
    fn test_empty_value_is_reprompted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        assert!(ensure_exists(&path).unwrap());
        assert!(!ensure_exists(&path).unwrap());

        let mut prompter = MockPrompter::new();
        prompter
            .expect_secret()
            .times(1)
            .returning(|_| Ok(GOOD_KEY.to_string()));
        let outcome =
            ensure_config_value(&path, OPENAI_API_KEY, &prompter, validate_api_key).unwrap();

        assert_eq!(outcome, ConfigOutcome::Updated);
        let file = EnvFile::load(&path).unwrap().unwrap();
        assert_eq!(file.get(OPENAI_API_KEY).as_deref(), Some(GOOD_KEY));
        assert!(file.render().contains("# JARVIS_THREAD_ID="));
    }

    #[test]
    fn test_malformed_key_is_still_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");

        let mut prompter = MockPrompter::new();
        prompter
            .expect_secret()
            .returning(|_| Ok("not-a-key".to_string()));
        let outcome =
            ensure_config_value(&path, OPENAI_API_KEY, &prompter, validate_api_key).unwrap();

        assert_eq!(outcome, ConfigOutcome::Created);
        let file = EnvFile::load(&path).unwrap().unwrap();
        assert_eq!(file.get(OPENAI_API_KEY).as_deref(), Some("not-a-key"));
    }

    #[test]
    fn test_cancelled_prompt_leaves_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "JARVIS_THREAD_ID=123\n").unwrap();

        let mut prompter = MockPrompter::new();
        prompter
            .expect_secret()
            .returning(|_| Err(BootstrapError::Cancelled));
        let err = ensure_config_value(&path, OPENAI_API_KEY, &prompter, validate_api_key)
            .unwrap_err();

        assert!(matches!(err, BootstrapError::Cancelled));
        assert_eq!(fs::read_to_string(&path).unwrap(), "JARVIS_THREAD_ID=123\n");
    }

    #[test]
    fn set_value_updates_any_key_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# keep\nJARVIS_THREAD_ID=old\nOPENAI_API_KEY=x\n").unwrap();

        let outcome = set_value(&path, "JARVIS_THREAD_ID", "thread_42").unwrap();

        assert_eq!(outcome, ConfigOutcome::Updated);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# keep\nOPENAI_API_KEY=x\nJARVIS_THREAD_ID=\"thread_42\"\n"
        );
    }

    #[test]
    fn set_value_creates_template_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");

        let outcome = set_value(&path, "GITHUB_REPO_OWNER", "octo").unwrap();

        assert_eq!(outcome, ConfigOutcome::Created);
        let file = EnvFile::load(&path).unwrap().unwrap();
        assert_eq!(file.get("GITHUB_REPO_OWNER").as_deref(), Some("octo"));
        assert_eq!(file.get(OPENAI_API_KEY).as_deref(), Some(""));
    }

    #[test]
    fn set_value_rejects_bad_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");

        assert!(set_value(&path, "1BAD", "x").is_err());
        assert!(set_value(&path, "WITH SPACE", "x").is_err());
        assert!(!path.exists());
        assert!(is_valid_key("_PRIVATE"));
    }

    fn other_line() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Z][A-Z0-9_]{0,12}=[a-z0-9\"]{0,10}".prop_filter("not the target key", |l| {
                assignment_key(l) != Some(OPENAI_API_KEY)
            }),
            "# [ -~]{0,20}",
            Just(String::new()),
            "# OPENAI_API_KEY=[a-z]{0,5}",
        ]
    }

    #[test]
    fn crlf_lines_survive_an_update() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# keep\r\nJARVIS_THREAD_ID=123\r\nOPENAI_API_KEY=old\r\n").unwrap();

        set_value(&path, OPENAI_API_KEY, GOOD_KEY).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("# keep\r\nJARVIS_THREAD_ID=123\r\nOPENAI_API_KEY=\"{GOOD_KEY}\"\r\n")
        );
    }

    #[test]
    fn missing_final_newline_is_completed_before_append() {
        let mut file = EnvFile::parse("A=1\r\nB=2");
        file.set("C", "3");
        assert_eq!(file.render(), "A=1\r\nB=2\r\nC=\"3\"\r\n");
    }

    #[test]
    fn quoted_values_read_back_as_written() {
        let mut file = EnvFile::default();
        file.set("NOTE", r#"a"b\c"#);
        assert_eq!(file.get("NOTE").as_deref(), Some(r#"a"b\c"#));
        assert_eq!(
            EnvFile::parse("S='a\\b'\n").get("S").as_deref(),
            Some(r"a\b")
        );
    }

    #[test]
    fn new_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");

        set_value(&path, OPENAI_API_KEY, GOOD_KEY).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "mode {mode:o} exposes the key");
    }

    #[test]
    fn existing_file_keeps_its_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "A=1\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        set_value(&path, "B", "2").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    proptest! {
        /// Property: setting one key keeps every other line, in order and with
        /// its original line ending.
        #[test]
        fn prop_set_preserves_unrelated_lines(
            others in proptest::collection::vec(other_line(), 0..12),
            key_positions in proptest::collection::vec(0usize..13, 0..3),
            crlf in any::<bool>(),
        ) {
            let ending = if crlf { "\r\n" } else { "\n" };
            let mut lines = others.clone();
            for pos in key_positions {
                let pos = pos.min(lines.len());
                lines.insert(pos, "OPENAI_API_KEY=old".to_string());
            }
            let contents: String = lines.iter().map(|l| format!("{l}{ending}")).collect();
            let mut file = EnvFile::parse(&contents);
            file.set(OPENAI_API_KEY, GOOD_KEY);

            let appended_ending = if lines.is_empty() { "\n" } else { ending };
            let mut expected: String = others.iter().map(|l| format!("{l}{ending}")).collect();
            expected.push_str(&format!("OPENAI_API_KEY=\"{GOOD_KEY}\"{appended_ending}"));
            prop_assert_eq!(file.render(), expected);

            let after = file.lines();
            let (last, rest) = after.split_last().unwrap();
            prop_assert_eq!(rest, &others[..]);
            let expected_last = format!("OPENAI_API_KEY=\"{}\"", GOOD_KEY);
            prop_assert_eq!(*last, expected_last.as_str());
            let got = file.get(OPENAI_API_KEY);
            prop_assert_eq!(got.as_deref(), Some(GOOD_KEY));
        }
    }
}
