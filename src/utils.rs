use anyhow::{anyhow, Context, Result};
use clap::builder::{
    styling::{AnsiColor, Effects},
    Styles,
};

/// Validate a systemd `CPUQuota=` value.
///
/// Accepts a positive integer percentage; values above 100% are allowed on
/// multi-core hosts.
///
/// # Examples
///
/// ```
/// use jarvis_setup::utils::parse_cpu_quota;
///
/// assert_eq!(parse_cpu_quota("80%").unwrap(), 80);
/// assert_eq!(parse_cpu_quota(" 150% ").unwrap(), 150);
/// assert!(parse_cpu_quota("80").is_err());
/// assert!(parse_cpu_quota("0%").is_err());
/// ```
pub fn parse_cpu_quota(quota: &str) -> Result<u32> {
    let quota = quota.trim();
    let value = quota
        .strip_suffix('%')
        .ok_or_else(|| anyhow!("CPU quota must be a percentage, e.g. 80%"))?
        .trim()
        .parse::<u32>()
        .context("Invalid CPU quota percentage")?;

    if value == 0 {
        return Err(anyhow!("CPU quota must be greater than 0%"));
    }
    Ok(value)
}

/// Parse a systemd `MemoryMax=` value into megabytes.
///
/// Supported formats:
/// - `"2G"` or `"2g"`: gigabytes (converted to MB)
/// - `"512M"` or `"512m"`: megabytes
/// - `"512"`: megabytes (default unit)
///
/// # Examples
///
/// ```
/// use jarvis_setup::utils::parse_memory_max;
///
/// assert_eq!(parse_memory_max("512").unwrap(), 512);
/// assert_eq!(parse_memory_max("512M").unwrap(), 512);
/// assert_eq!(parse_memory_max("2G").unwrap(), 2048);
/// ```
pub fn parse_memory_max(memory: &str) -> Result<u64> {
    let memory = memory.trim();

    if memory.is_empty() {
        return Err(anyhow!("Memory limit cannot be empty"));
    }

    if let Some(value) = memory.strip_suffix(['G', 'g']) {
        let value = value
            .trim()
            .parse::<u64>()
            .context("Invalid memory value in GB format")?;
        Ok(value * 1024)
    } else if let Some(value) = memory.strip_suffix(['M', 'm']) {
        value
            .trim()
            .parse::<u64>()
            .context("Invalid memory value in MB format")
    } else {
        memory
            .parse::<u64>()
            .context("Invalid memory format. Expected formats: 2G, 512M, or 512 (MB)")
    }
}

/// Mask a secret for display, keeping a short recognizable prefix.
///
/// # Examples
///
/// ```
/// use jarvis_setup::utils::mask_secret;
///
/// assert_eq!(mask_secret("sk-abcdefghijklmnop"), "sk-a****");
/// assert_eq!(mask_secret("abc"), "****");
/// assert_eq!(mask_secret(""), "");
/// ```
pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let prefix: String = value.chars().take(4).collect();
    if value.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{prefix}****")
    }
}

pub const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_quota_rejects_garbage() {
        assert!(parse_cpu_quota("").is_err());
        assert!(parse_cpu_quota("%").is_err());
        assert!(parse_cpu_quota("eighty%").is_err());
    }

    #[test]
    fn test_parse_memory_max_lowercase_units() {
        assert_eq!(parse_memory_max("1g").unwrap(), 1024);
        assert_eq!(parse_memory_max("256m").unwrap(), 256);
    }

    #[test]
    fn test_parse_memory_max_invalid() {
        assert!(parse_memory_max("").is_err());
        assert!(parse_memory_max("lots").is_err());
        assert!(parse_memory_max("1T").is_err());
    }

    #[test]
    fn test_mask_secret_never_reveals_tail() {
        let masked = mask_secret("sk-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(masked, "sk-a****");
        assert!(!masked.contains("aaaa"));
    }
}
