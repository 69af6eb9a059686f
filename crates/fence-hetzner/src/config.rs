//! Option resolution for the fencing agent.
//!
//! Options arrive either as command-line flags or, when the agent is started
//! by a cluster manager without arguments, as `key=value` lines on stdin.
//! Both forms end up in [`FenceArgs`] and are validated into [`FenceOptions`].

use std::io::BufRead;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser, ValueEnum};

use crate::agent::{RetryPolicy, DEFAULT_BACKOFF_SECS, DEFAULT_MAX_ATTEMPTS};
use crate::error::{FenceError, EC_GENERIC_ERROR, EC_OK};
use crate::providers::hetzner::{API_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Program name used as `argv[0]` for stdin-supplied options.
pub const PROGRAM_NAME: &str = "fence_hetzner";

/// Default seconds to wait for a power change to be observed.
pub const DEFAULT_POWER_TIMEOUT_SECS: u64 = 40;

/// Fencing action requested by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Power the target on.
    On,
    /// Power the target off.
    Off,
    /// Power the target off, then on again.
    Reboot,
    /// Report the power state of the target.
    Status,
    /// Check that the API is reachable and targets are visible.
    Monitor,
    /// List targets as `id,name`.
    List,
    /// List targets as `id,name,state`.
    ListStatus,
    /// Only validate the options.
    ValidateAll,
    /// Print the resource agent metadata.
    Metadata,
}

impl Action {
    /// Whether the action operates on a single target and needs `--plug`.
    #[must_use]
    pub fn needs_plug(self) -> bool {
        matches!(self, Self::On | Self::Off | Self::Reboot | Self::Status)
    }

    /// Whether the action talks to the API and needs a token.
    #[must_use]
    pub fn needs_token(self) -> bool {
        self != Self::Metadata
    }
}

/// Fence agent for Hetzner Cloud.
#[derive(Parser, Debug)]
#[command(name = "fence_hetzner", version)]
#[command(about = "I/O fencing agent for Hetzner Cloud virtual machines")]
pub struct FenceArgs {
    /// Fencing action.
    #[arg(short = 'o', long, value_enum, default_value = "reboot")]
    pub action: Action,

    /// Server ID of the target (usually from `pcmk_host_map`).
    #[arg(short = 'n', long, visible_alias = "port")]
    pub plug: Option<String>,

    /// Hetzner Cloud API token (or set `HCLOUD_TOKEN` env var).
    #[arg(long, env = "HCLOUD_TOKEN", default_value = "", hide_env_values = true)]
    pub api_token: String,

    /// Verbose mode; repeat to also log API responses.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Explicit verbosity level, overrides `-v`.
    #[arg(long)]
    pub verbose_level: Option<u8>,

    /// Seconds to wait for the power state to change.
    #[arg(long, default_value_t = DEFAULT_POWER_TIMEOUT_SECS)]
    pub power_timeout: u64,

    /// Seconds to wait after issuing a power change.
    #[arg(long, default_value_t = 0)]
    pub power_wait: u64,

    /// Seconds to wait before fencing (off and reboot only).
    #[arg(long, default_value_t = 0)]
    pub delay: u64,

    /// Timeout in seconds for a single API request.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub login_timeout: u64,

    /// Attempts for a power change rejected as rate limited or locked.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub retry_attempts: u32,

    /// Separator between fields in list output.
    #[arg(long, default_value = ",")]
    pub separator: String,

    /// API base URL.
    #[arg(long, default_value = API_BASE_URL)]
    pub api_url: String,
}

impl FenceArgs {
    /// Effective verbosity level.
    #[must_use]
    pub fn verbosity(&self) -> u8 {
        self.verbose_level.unwrap_or(self.verbose)
    }

    /// Validate the arguments into [`FenceOptions`].
    ///
    /// # Errors
    /// [`FenceError::BadArgs`] if the token is missing, the action needs a
    /// plug that was not given, or the plug is not a numeric server ID.
    pub fn into_options(self) -> Result<FenceOptions, FenceError> {
        let verbose_level = self.verbosity();
        let api_token = self.api_token.trim().to_string();
        if self.action.needs_token() && api_token.is_empty() {
            return Err(FenceError::BadArgs(
                "an API token is required (--api-token or HCLOUD_TOKEN)".into(),
            ));
        }

        let plug = self
            .plug
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if self.action.needs_plug() && plug.is_none() {
            return Err(FenceError::BadArgs(
                "a server ID is required for this action (--plug)".into(),
            ));
        }
        if let Some(plug) = plug.as_deref().filter(|p| !is_server_id(p)) {
            return Err(FenceError::BadArgs(format!(
                "server ID must be numeric, got {plug:?}"
            )));
        }

        if self.separator.is_empty() {
            return Err(FenceError::BadArgs("the list separator cannot be empty".into()));
        }

        Ok(FenceOptions {
            action: self.action,
            plug,
            api_token,
            verbose_level,
            power_timeout: Duration::from_secs(self.power_timeout),
            power_wait: Duration::from_secs(self.power_wait),
            delay: Duration::from_secs(self.delay),
            login_timeout: Duration::from_secs(self.login_timeout),
            retry: RetryPolicy {
                backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
                max_attempts: self.retry_attempts.max(1),
            },
            separator: self.separator,
            api_url: self.api_url,
        })
    }
}

/// Hetzner Cloud server IDs are plain decimal numbers.
fn is_server_id(plug: &str) -> bool {
    plug.bytes().all(|b| b.is_ascii_digit())
}

/// Exit code for a command line clap refused.
///
/// Help and version output succeed. Every other parse failure is a generic
/// error; clap's own usage code would read as "target off".
#[must_use]
pub fn parse_failure_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EC_OK,
        _ => EC_GENERIC_ERROR,
    }
}

/// Validated options for one agent invocation.
#[derive(Clone)]
pub struct FenceOptions {
    /// Requested action.
    pub action: Action,
    /// Target server ID.
    pub plug: Option<String>,
    /// API token.
    pub api_token: String,
    /// Verbosity level.
    pub verbose_level: u8,
    /// How long to wait for a power change to be observed.
    pub power_timeout: Duration,
    /// Pause after issuing a power change.
    pub power_wait: Duration,
    /// Pause before fencing.
    pub delay: Duration,
    /// Timeout for a single API request.
    pub login_timeout: Duration,
    /// Retry policy for power changes.
    pub retry: RetryPolicy,
    /// Separator for list output.
    pub separator: String,
    /// API base URL.
    pub api_url: String,
}

impl FenceOptions {
    /// Target server ID.
    ///
    /// # Errors
    /// [`FenceError::BadArgs`] if no plug was given.
    pub fn plug(&self) -> Result<&str, FenceError> {
        self.plug
            .as_deref()
            .ok_or_else(|| FenceError::BadArgs("a server ID is required (--plug)".into()))
    }
}

impl std::fmt::Debug for FenceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FenceOptions")
            .field("action", &self.action)
            .field("plug", &self.plug)
            .field("api_token", &"<redacted>")
            .field("verbose_level", &self.verbose_level)
            .field("power_timeout", &self.power_timeout)
            .field("power_wait", &self.power_wait)
            .field("delay", &self.delay)
            .field("login_timeout", &self.login_timeout)
            .field("retry", &self.retry)
            .field("separator", &self.separator)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Argument vector recovered from stdin.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StdinOptions {
    /// Arguments including `argv[0]`, ready for [`FenceArgs::parse_from`].
    pub args: Vec<String>,
    /// Keys that were not recognised and got dropped.
    pub ignored: Vec<String>,
}

/// Flag for a stdin key, if the key is recognised.
fn stdin_flag(key: &str) -> Option<&'static str> {
    let flag = match key {
        "action" | "option" => "action",
        "plug" | "port" => "plug",
        "api_token" | "api-token" => "api-token",
        "verbose_level" => "verbose-level",
        "power_timeout" => "power-timeout",
        "power_wait" => "power-wait",
        "delay" => "delay",
        "login_timeout" => "login-timeout",
        "retry_attempts" => "retry-attempts",
        "separator" => "separator",
        "api_url" => "api-url",
        _ => return None,
    };
    Some(flag)
}

/// Convert `key=value` lines into command-line arguments.
///
/// Blank lines and `#` comments are skipped. `verbose` turns into `-v`.
/// `nodename` is used as the plug when no `plug`/`port` line is present.
///
/// # Errors
/// Returns error if reading from `reader` fails.
pub fn args_from_stdin<R: BufRead>(reader: R) -> std::io::Result<StdinOptions> {
    let mut options = StdinOptions {
        args: vec![PROGRAM_NAME.to_string()],
        ignored: Vec::new(),
    };
    let mut nodename = None;
    let mut has_plug = false;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        let (key, value) = (key.trim(), value.trim());

        match key {
            "verbose" => options.args.push("-v".to_string()),
            "nodename" => nodename = Some(value.to_string()),
            _ => match stdin_flag(key) {
                Some(flag) => {
                    has_plug |= flag == "plug";
                    options.args.push(format!("--{flag}={value}"));
                }
                None => options.ignored.push(key.to_string()),
            },
        }
    }

    if let (false, Some(node)) = (has_plug, nodename) {
        options.args.push(format!("--plug={node}"));
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> FenceArgs {
        let mut argv = vec![PROGRAM_NAME];
        argv.extend_from_slice(args);
        FenceArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = parse(&["--api-token", "secret", "--plug", "42"])
            .into_options()
            .unwrap();

        assert_eq!(options.action, Action::Reboot);
        assert_eq!(options.plug().unwrap(), "42");
        assert_eq!(options.power_timeout, Duration::from_secs(40));
        assert_eq!(options.retry, RetryPolicy::default());
        assert_eq!(options.separator, ",");
        assert_eq!(options.api_url, API_BASE_URL);
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(parse(&["-vv"]).verbosity(), 2);
        assert_eq!(parse(&["-v", "--verbose-level", "3"]).verbosity(), 3);
        assert_eq!(parse(&[]).verbosity(), 0);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(parse(&["-o", "list-status"]).action, Action::ListStatus);
        assert_eq!(parse(&["--action", "validate-all"]).action, Action::ValidateAll);
        assert!(FenceArgs::try_parse_from([PROGRAM_NAME, "-o", "explode"]).is_err());
    }

    #[test]
    fn test_plug_required_for_target_actions() {
        let err = parse(&["--api-token", "secret", "-o", "off"])
            .into_options()
            .unwrap_err();
        assert!(matches!(err, FenceError::BadArgs(_)));

        let list = parse(&["--api-token", "secret", "-o", "list"]).into_options();
        assert!(list.is_ok());
    }

    #[test]
    fn test_token_required() {
        let err = parse(&["--api-token", "  ", "--plug", "1"])
            .into_options()
            .unwrap_err();
        assert!(matches!(err, FenceError::BadArgs(_)));
    }

    #[test]
    fn test_plug_must_be_numeric() {
        for plug in ["../servers/7", "42/actions/poweron", "node1", "4 2"] {
            let err = parse(&["--api-token", "secret", "-o", "status", "--plug", plug])
                .into_options()
                .unwrap_err();
            assert!(matches!(err, FenceError::BadArgs(_)), "accepted {plug:?}");
        }

        let options = parse(&["--api-token", "secret", "-o", "status", "--plug", " 42 "])
            .into_options()
            .unwrap();
        assert_eq!(options.plug().unwrap(), "42");
    }

    #[test]
    fn test_metadata_needs_no_token_or_plug() {
        let options = parse(&["-o", "metadata"]).into_options().unwrap();
        assert_eq!(options.action, Action::Metadata);
        assert!(options.plug.is_none());

        let stdin = args_from_stdin("action=metadata\n".as_bytes()).unwrap();
        let parsed = FenceArgs::try_parse_from(stdin.args).unwrap();
        assert_eq!(parsed.action, Action::Metadata);
    }

    #[test]
    fn test_invalid_value_is_generic_error() {
        let err = FenceArgs::try_parse_from([
            PROGRAM_NAME,
            "-o",
            "status",
            "-n",
            "42",
            "--api-token",
            "x",
            "--power-timeout",
            "abc",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(parse_failure_code(&err), EC_GENERIC_ERROR);

        let input = "action=status\nport=42\napi_token=x\npower_timeout=forty\n";
        let stdin = args_from_stdin(input.as_bytes()).unwrap();
        let err = FenceArgs::try_parse_from(stdin.args).unwrap_err();
        assert_eq!(parse_failure_code(&err), EC_GENERIC_ERROR);

        let err = FenceArgs::try_parse_from([PROGRAM_NAME, "-o", "explode"]).unwrap_err();
        assert_ne!(parse_failure_code(&err), crate::error::EC_STATUS_OFF);
    }

    #[test]
    fn test_help_and_version_succeed() {
        let help = FenceArgs::try_parse_from([PROGRAM_NAME, "--help"]).unwrap_err();
        assert_eq!(parse_failure_code(&help), EC_OK);

        let version = FenceArgs::try_parse_from([PROGRAM_NAME, "--version"]).unwrap_err();
        assert_eq!(parse_failure_code(&version), EC_OK);
    }

    #[test]
    fn test_debug_redacts_token() {
        let options = parse(&["--api-token", "secret", "-o", "list"])
            .into_options()
            .unwrap();
        let debug = format!("{options:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_args_from_stdin() {
        let input = "# from the cluster manager\n\
                     action=off\n\
                     port=42\n\
                     nodename=node1\n\
                     api_token=secret\n\
                     verbose=1\n\
                     pcmk_host_map=node1:42\n\
                     \n";

        let options = args_from_stdin(input.as_bytes()).unwrap();

        assert_eq!(
            options.args,
            vec![
                "fence_hetzner",
                "--action=off",
                "--plug=42",
                "--api-token=secret",
                "-v",
            ]
        );
        assert_eq!(options.ignored, vec!["pcmk_host_map"]);

        let parsed = FenceArgs::try_parse_from(options.args)
            .unwrap()
            .into_options()
            .unwrap();
        assert_eq!(parsed.action, Action::Off);
        assert_eq!(parsed.plug.as_deref(), Some("42"));
        assert_eq!(parsed.verbose_level, 1);
    }

    #[test]
    fn test_nodename_fallback() {
        let options = args_from_stdin("option=status\nnodename=77\n".as_bytes()).unwrap();
        assert_eq!(
            options.args,
            vec!["fence_hetzner", "--action=status", "--plug=77"]
        );
    }
}
