use anyhow::anyhow;
use regex::Regex;

/// Formats seconds as `HH:MM`. Zero renders
/// as an empty string unless `show_zero`.
#[must_use]
pub fn format_duration(
  seconds: u64,
  show_zero: bool
) -> String {
  if seconds == 0 && !show_zero {
    return String::new();
  }
  let hours = seconds / 3600;
  let minutes = (seconds % 3600) / 60;
  format!("{hours:02}:{minutes:02}")
}

/// Parses a time-spent entry into seconds.
///
/// Accepts decimal hours (`1.5`, `1,5`) and
/// `H:MM`. Fractions of a second are
/// truncated; an empty entry is zero.
pub fn parse_duration(
  input: &str
) -> anyhow::Result<u64> {
  let token = input.trim();
  if token.is_empty() {
    return Ok(0);
  }
  let token = token.replacen(',', ".", 1);

  let decimal_re =
    Regex::new(r"^\d+(?:\.\d+)?$").map_err(
      |e| anyhow!("internal regex compile failure: {e}")
    )?;
  if decimal_re.is_match(&token) {
    let hours: f64 =
      token.parse().map_err(|e| {
        anyhow!("invalid duration '{input}': {e}")
      })?;
    let seconds = (hours * 3600.0).trunc();
    if !seconds.is_finite()
      || seconds > u64::MAX as f64
    {
      return Err(anyhow!(
        "duration '{input}' is out of range"
      ));
    }
    return Ok(seconds as u64);
  }

  let clock_re =
    Regex::new(r"^(?P<h>\d+):(?P<m>\d+)$")
      .map_err(|e| {
        anyhow!(
          "internal regex compile failure: {e}"
        )
      })?;
  if let Some(caps) = clock_re.captures(&token)
  {
    let field = |name: &str| -> anyhow::Result<u64> {
      caps
        .name(name)
        .map(|m| m.as_str())
        .ok_or_else(|| anyhow!("missing {name} in '{input}'"))?
        .parse::<u64>()
        .map_err(|e| anyhow!("invalid duration '{input}': {e}"))
    };
    let hours = field("h")?;
    let minutes = field("m")?;
    return hours
      .checked_mul(3600)
      .and_then(|h| {
        minutes
          .checked_mul(60)
          .and_then(|m| h.checked_add(m))
      })
      .ok_or_else(|| {
        anyhow!(
          "duration '{input}' is out of range"
        )
      });
  }

  Err(anyhow!(
    "invalid duration '{input}': expected hours like 1.5 or H:MM"
  ))
}
