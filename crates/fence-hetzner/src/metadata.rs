//! Resource agent metadata, as cluster managers request it with
//! `action=metadata` when registering a stonith device.

use std::io::{self, Write};

use crate::agent::DEFAULT_MAX_ATTEMPTS;
use crate::config::{DEFAULT_POWER_TIMEOUT_SECS, PROGRAM_NAME};
use crate::providers::hetzner::{API_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// One-line description of the agent.
pub const SHORT_DESC: &str = "Fence agent for Hetzner Cloud";

/// Long description of the agent.
pub const LONG_DESC: &str =
    "fence_hetzner is an I/O Fencing agent for Hetzner's Cloud API to fence virtual machines.";

/// Vendor homepage.
pub const VENDOR_URL: &str = "https://www.hetzner.com/cloud";

/// Content type of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    String,
    Integer,
    Boolean,
    Select(&'static [&'static str]),
}

struct Parameter {
    name: &'static str,
    getopt: &'static str,
    required: bool,
    content: Content,
    default: Option<String>,
    shortdesc: &'static str,
}

const ACTIONS: &[&str] = &[
    "on",
    "off",
    "reboot",
    "status",
    "list",
    "list-status",
    "monitor",
    "metadata",
    "validate-all",
];

fn parameters() -> Vec<Parameter> {
    let param = |name, getopt, content, default: Option<String>, shortdesc| Parameter {
        name,
        getopt,
        required: false,
        content,
        default,
        shortdesc,
    };

    vec![
        param(
            "action",
            "-o, --action=[action]",
            Content::Select(ACTIONS),
            Some("reboot".into()),
            "Fencing action",
        ),
        Parameter {
            required: true,
            ..param(
                "api_token",
                "--api-token=[apitoken]",
                Content::String,
                None,
                "Hetzner Cloud API Key.",
            )
        },
        param(
            "plug",
            "-n, --plug=[id]",
            Content::String,
            None,
            "Server ID of the target",
        ),
        param(
            "port",
            "-n, --plug=[id]",
            Content::String,
            None,
            "Server ID of the target",
        ),
        param(
            "nodename",
            "",
            Content::String,
            None,
            "Node name, used as the server ID when no plug is given",
        ),
        param("verbose", "-v, --verbose", Content::Boolean, None, "Verbose mode"),
        param(
            "verbose_level",
            "--verbose-level=[level]",
            Content::Integer,
            None,
            "Level of debugging detail in output",
        ),
        param(
            "delay",
            "--delay=[seconds]",
            Content::Integer,
            Some("0".into()),
            "Wait X seconds before fencing is started",
        ),
        param(
            "power_timeout",
            "--power-timeout=[seconds]",
            Content::Integer,
            Some(DEFAULT_POWER_TIMEOUT_SECS.to_string()),
            "Test X seconds for status change after ON/OFF",
        ),
        param(
            "power_wait",
            "--power-wait=[seconds]",
            Content::Integer,
            Some("0".into()),
            "Wait X seconds after issuing ON/OFF",
        ),
        param(
            "login_timeout",
            "--login-timeout=[seconds]",
            Content::Integer,
            Some(DEFAULT_TIMEOUT_SECS.to_string()),
            "Timeout for a single API request",
        ),
        param(
            "retry_attempts",
            "--retry-attempts=[number]",
            Content::Integer,
            Some(DEFAULT_MAX_ATTEMPTS.to_string()),
            "Attempts for a power change while rate limited or locked",
        ),
        param(
            "separator",
            "--separator=[char]",
            Content::String,
            Some(",".into()),
            "Separator for list output",
        ),
        param(
            "api_url",
            "--api-url=[url]",
            Content::String,
            Some(API_BASE_URL.into()),
            "Hetzner Cloud API base URL",
        ),
    ]
}

fn write_parameter<W: Write>(out: &mut W, p: &Parameter) -> io::Result<()> {
    writeln!(
        out,
        "\t<parameter name=\"{}\" unique=\"0\" required=\"{}\">",
        p.name,
        u8::from(p.required)
    )?;
    if !p.getopt.is_empty() {
        writeln!(out, "\t\t<getopt mixed=\"{}\" />", p.getopt)?;
    }

    let default = p
        .default
        .as_deref()
        .map(|d| format!(" default=\"{d}\""))
        .unwrap_or_default();
    match p.content {
        Content::String => writeln!(out, "\t\t<content type=\"string\"{default} />")?,
        Content::Integer => writeln!(out, "\t\t<content type=\"integer\"{default} />")?,
        Content::Boolean => writeln!(out, "\t\t<content type=\"boolean\"{default} />")?,
        Content::Select(options) => {
            writeln!(out, "\t\t<content type=\"select\"{default} >")?;
            for option in options {
                writeln!(out, "\t\t\t<option value=\"{option}\" />")?;
            }
            writeln!(out, "\t\t</content>")?;
        }
    }

    writeln!(out, "\t\t<shortdesc lang=\"en\">{}</shortdesc>", p.shortdesc)?;
    writeln!(out, "\t</parameter>")
}

/// Write the resource agent XML description.
///
/// # Errors
/// Returns error if writing to `out` fails.
pub fn write_metadata<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "<?xml version=\"1.0\" ?>")?;
    writeln!(
        out,
        "<resource-agent name=\"{PROGRAM_NAME}\" shortdesc=\"{SHORT_DESC}\" >"
    )?;
    writeln!(out, "<longdesc>{LONG_DESC}</longdesc>")?;
    writeln!(out, "<vendor-url>{VENDOR_URL}</vendor-url>")?;

    writeln!(out, "<parameters>")?;
    for parameter in parameters() {
        write_parameter(out, &parameter)?;
    }
    writeln!(out, "</parameters>")?;

    writeln!(out, "<actions>")?;
    for action in ACTIONS {
        writeln!(out, "\t<action name=\"{action}\" />")?;
    }
    writeln!(out, "</actions>")?;
    writeln!(out, "</resource-agent>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> String {
        let mut out = Vec::new();
        write_metadata(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_metadata_header() {
        let xml = metadata();
        assert!(xml.starts_with("<?xml version=\"1.0\" ?>\n"));
        assert!(xml.contains(
            "<resource-agent name=\"fence_hetzner\" shortdesc=\"Fence agent for Hetzner Cloud\" >"
        ));
        assert!(xml.contains(&format!("<longdesc>{LONG_DESC}</longdesc>")));
        assert!(xml.contains("<vendor-url>https://www.hetzner.com/cloud</vendor-url>"));
        assert!(xml.trim_end().ends_with("</resource-agent>"));
    }

    #[test]
    fn test_api_token_is_required() {
        let xml = metadata();
        assert!(xml.contains("<parameter name=\"api_token\" unique=\"0\" required=\"1\">"));
        assert!(xml.contains("<parameter name=\"plug\" unique=\"0\" required=\"0\">"));
        assert!(xml.contains("<content type=\"integer\" default=\"40\" />"));
    }

    #[test]
    fn test_every_action_is_listed() {
        let xml = metadata();
        for action in ACTIONS {
            assert!(xml.contains(&format!("<action name=\"{action}\" />")));
            assert!(xml.contains(&format!("<option value=\"{action}\" />")));
        }
    }
}
