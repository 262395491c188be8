use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse a delimiter given as one ASCII character, an escape such as `\n`,
/// or a hex byte such as `0x3b`.
pub fn parse_delimiter(input: &str) -> CliResult<u8> {
    match input {
        "\\n" => return Ok(b'\n'),
        "\\r" => return Ok(b'\r'),
        "\\t" => return Ok(b'\t'),
        "\\0" => return Ok(0),
        _ => {}
    }

    if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        return u8::from_str_radix(hex, 16)
            .map_err(|_| CliError::new(USAGE, format!("invalid hex delimiter: {input}")));
    }

    match input.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(CliError::new(
            USAGE,
            format!("delimiter must be a single byte, got {input:?}"),
        )),
    }
}
