//! The single tagged-output POSIX probe script and its parser, plus the
//! PowerShell fallback and the default-shell detection script.

use super::{Arch, OsFamily, OsInfo, OsSource};

/// `sh -c '…'` script emitting five `__key=value` lines. Run once per
/// provider; the fallback (`bash -lc`) uses the identical script.
pub fn posix_probe_script() -> &'static str {
    r#"__os=$(uname -s 2>/dev/null); __arch=$(uname -m 2>/dev/null); __id=""; __ver=""; __pretty=""; for f in /etc/os-release /usr/lib/os-release; do if [ -r "$f" ]; then . "$f" 2>/dev/null; __id="$ID"; __ver="$VERSION_ID"; __pretty="$PRETTY_NAME"; break; fi; done; echo "__os=$__os"; echo "__arch=$__arch"; echo "__id=$__id"; echo "__ver=$__ver"; echo "__pretty=$__pretty""#
}

/// PowerShell fallback when the POSIX probe fails to run at all (e.g. the
/// target shell isn't POSIX).
pub fn powershell_probe_script() -> &'static str {
    r#"$os = Get-CimInstance Win32_OperatingSystem; Write-Output "__os=Windows_NT"; Write-Output "__arch=$env:PROCESSOR_ARCHITECTURE"; Write-Output "__id=windows"; Write-Output "__ver=$($os.Version)"; Write-Output "__pretty=$($os.Caption)""#
}

/// Tries each shell on `$PATH` in order and echoes the first one found,
/// falling back to `sh`.
pub fn decide_default_shell_script() -> &'static str {
    r#"for s in bash zsh ksh mksh dash sh fish; do command -v "$s" >/dev/null 2>&1 && echo "$s" && exit 0; done; echo sh"#
}

/// Parse the `__key=value` lines produced by [`posix_probe_script`]. Unknown
/// keys are ignored; empty values are tolerated.
pub fn parse_os_probe(output: &str) -> OsInfo {
    let mut kernel = None;
    let mut arch_raw = None;
    let mut distro_id = None;
    let mut version_id = None;
    let mut pretty_name = None;

    for line in output.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key {
            "__os" => kernel = non_empty(value),
            "__arch" => arch_raw = non_empty(value),
            "__id" => distro_id = non_empty(value).map(|s| s.trim_matches('"').to_string()),
            "__ver" => version_id = non_empty(value).map(|s| s.trim_matches('"').to_string()),
            "__pretty" => pretty_name = non_empty(value).map(|s| s.trim_matches('"').to_string()),
            _ => {}
        }
    }

    let family = kernel
        .as_deref()
        .map(OsFamily::from_kernel_name)
        .unwrap_or(OsFamily::Unknown);
    let arch = arch_raw
        .as_deref()
        .map(Arch::from_raw)
        .unwrap_or(Arch::Unknown);

    let distro_id = if family == OsFamily::Windows {
        Some("windows".to_string())
    } else {
        distro_id
    };

    OsInfo {
        family,
        arch,
        kernel,
        distro_id,
        version_id,
        pretty_name,
        source: OsSource::Posix,
    }
}

/// Same parser, tagged as having come from the PowerShell fallback.
pub fn parse_os_probe_powershell(output: &str) -> OsInfo {
    let mut info = parse_os_probe(output);
    info.source = OsSource::Powershell;
    info
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ubuntu_probe_output() {
        let output = "__os=Linux\n__arch=x86_64\n__id=ubuntu\n__ver=22.04\n__pretty=Ubuntu 22.04.3 LTS\n";
        let info = parse_os_probe(output);
        assert_eq!(info.family, OsFamily::Linux);
        assert_eq!(info.arch, Arch::X86_64);
        assert_eq!(info.distro_id.as_deref(), Some("ubuntu"));
        assert_eq!(info.version_id.as_deref(), Some("22.04"));
        assert_eq!(info.source, OsSource::Posix);
    }

    #[test]
    fn ignores_unknown_keys_and_tolerates_empty_values() {
        let output = "__os=Darwin\n__arch=arm64\n__unknown_key=whatever\n__id=\n__ver=\n__pretty=\n";
        let info = parse_os_probe(output);
        assert_eq!(info.family, OsFamily::Darwin);
        assert_eq!(info.arch, Arch::Aarch64);
        assert!(info.distro_id.is_none());
    }

    #[test]
    fn windows_family_forces_windows_distro_id() {
        let output = "__os=Windows_NT\n__arch=AMD64\n__id=\n__ver=10.0.19045\n__pretty=Windows 10 Pro\n";
        let info = parse_os_probe_powershell(output);
        assert_eq!(info.family, OsFamily::Windows);
        assert_eq!(info.distro_id.as_deref(), Some("windows"));
        assert_eq!(info.source, OsSource::Powershell);
    }
}
