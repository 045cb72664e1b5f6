//! Parsers for the text the device tools print.
//!
//! All parsers are total: malformed input yields an empty or `None` result,
//! never an error. A tool that printed garbage found nothing.

use regex::Regex;

/// Status marker of a ready device in `adb devices` output.
pub const ADB_DEVICE_MARKER: &str = "\tdevice";
/// Status marker of a device in `fastboot devices` output.
pub const FASTBOOT_DEVICE_MARKER: &str = "\tfastboot";

/// Collect the serials of lines containing `marker`, in output order.
///
/// The serial is whatever precedes the marker, trimmed. Lines where that is
/// empty are dropped.
pub fn parse_device_list(output: &str, marker: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let (serial, _) = line.split_once(marker)?;
            let serial = serial.trim();
            (!serial.is_empty()).then(|| serial.to_string())
        })
        .collect()
}

/// Parse `adb devices` output. The first line is the banner and is skipped.
pub fn parse_adb_devices(output: &str) -> Vec<String> {
    let body = output.split_once('\n').map_or("", |(_, rest)| rest);
    parse_device_list(body, ADB_DEVICE_MARKER)
}

/// Parse `fastboot devices` output, which has no banner.
pub fn parse_fastboot_devices(output: &str) -> Vec<String> {
    parse_device_list(output, FASTBOOT_DEVICE_MARKER)
}

/// Join both streams of a fastboot call; fastboot reports values on stderr.
pub fn combine_streams(stdout: &str, stderr: &str) -> String {
    format!("{}{}", stdout, stderr).trim().to_string()
}

/// Extract the value of `name` from `fastboot getvar` output.
///
/// Output looks like `product: oriole\nFinished. Total time: 0.001s`.
/// Returns `None` when the variable is missing or has an empty value.
pub fn parse_getvar_value(output: &str, name: &str) -> Option<String> {
    let pattern = format!(r"(?m)^(?:\(bootloader\)\s*)?{}:[ \t]*(.*)$", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(output)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Whether a userspace fastboot answered `is-userspace` affirmatively.
///
/// The tool prints `is-userspace: yes`; the match is literal.
pub fn is_userspace(getvar_output: &str) -> bool {
    getvar_output.contains("yes")
}

/// Strip a markdown code fence wrapping a whole advisor reply.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.remove(0);
        if lines.last().is_some_and(|l| l.trim() == "```") {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// Trim a value and treat empty as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
