// Credential sources for login.
// Order: TOML config file, then interactive prompts for whatever the file
// does not provide. The file may hold the password directly or name a shell
// command that prints it (password managers like `pass`).

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use dialoguer::{Input, Password};
use serde::Deserialize;
use tracing::debug;

/// Contents of the config file.
///
/// ```toml
/// url = "https://pwn.college"
///
/// [credentials]
/// name = "hacker"
/// password = "hunter2"
/// # or instead of password:
/// # password_command = "pass show pwn.college"
/// ```
#[derive(Deserialize, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub credentials: Option<CredentialsFile>,
}

/// The `[credentials]` section. All fields optional; missing ones are
/// prompted for interactively.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct CredentialsFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_command: Option<String>,
}

/// Resolved credentials, ready for login.
pub struct Credentials {
    pub name: String,
    pub password: String,
}

/// Default config file location: `~/.config/pwncollege-cli/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pwncollege-cli").join("config.toml"))
}

/// Load settings from `path`, or from the default location when `None`.
///
/// The default file may be absent (everything gets prompted), but an
/// explicitly requested path must exist, otherwise a typo'd `--config`
/// would silently fall through to the prompts.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_path() {
            Some(p) => (p, false),
            None => return Ok(Settings::default()),
        },
    };
    if !path.exists() {
        if explicit {
            bail!("config file {} does not exist", path.display());
        }
        debug!("no config file at {}", path.display());
        return Ok(Settings::default());
    }
    debug!("reading config from {}", path.display());
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Resolve credentials from the settings, prompting for missing pieces.
///
/// A literal `password` wins over `password_command` when both are set.
pub fn credentials(settings: &Settings) -> Result<Credentials> {
    let file = settings.credentials.clone().unwrap_or_default();

    let name = match file.name {
        Some(n) => n,
        None => Input::new().with_prompt("username or email").interact_text()?,
    };

    let password = if let Some(p) = file.password {
        p
    } else if let Some(cmd) = file.password_command {
        run_password_command(&cmd)?
    } else {
        Password::new().with_prompt("password").interact()?
    };

    Ok(Credentials { name, password })
}

/// Run a shell command and take its stdout (trailing newline trimmed) as the
/// password.
fn run_password_command(cmd: &str) -> Result<String> {
    debug!("running password command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .with_context(|| format!("running password command `{cmd}`"))?;
    if !output.status.success() {
        bail!("password command `{cmd}` exited with {}", output.status);
    }
    let password =
        String::from_utf8(output.stdout).context("password command output is not UTF-8")?;
    Ok(password.trim_end_matches('\n').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_settings() {
        let settings: Settings = toml::from_str(
            r#"
            url = "https://example.org"

            [credentials]
            name = "hacker"
            password = "hunter2"
            "#,
        )
        .unwrap();

        assert_eq!(settings.url.as_deref(), Some("https://example.org"));
        let creds = settings.credentials.unwrap();
        assert_eq!(creds.name.as_deref(), Some("hacker"));
        assert_eq!(creds.password.as_deref(), Some("hunter2"));
        assert!(creds.password_command.is_none());
    }

    #[test]
    fn parse_empty_settings() {
        let settings: Settings = toml::from_str("").unwrap();
        assert!(settings.url.is_none());
        assert!(settings.credentials.is_none());
    }

    #[test]
    fn parse_password_command_variant() {
        let settings: Settings = toml::from_str(
            r#"
            [credentials]
            name = "hacker"
            password_command = "pass show pwn.college"
            "#,
        )
        .unwrap();

        let creds = settings.credentials.unwrap();
        assert!(creds.password.is_none());
        assert_eq!(
            creds.password_command.as_deref(),
            Some("pass show pwn.college")
        );
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/pwncollege-cli.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn password_command_captures_stdout() {
        assert_eq!(run_password_command("echo hunter2").unwrap(), "hunter2");
    }

    #[test]
    fn password_command_failure_is_an_error() {
        assert!(run_password_command("exit 3").is_err());
    }

    #[test]
    fn literal_password_beats_password_command() {
        let settings = Settings {
            url: None,
            credentials: Some(CredentialsFile {
                name: Some("hacker".into()),
                password: Some("hunter2".into()),
                password_command: Some("echo wrong".into()),
            }),
        };
        let creds = credentials(&settings).unwrap();
        assert_eq!(creds.name, "hacker");
        assert_eq!(creds.password, "hunter2");
    }
}
