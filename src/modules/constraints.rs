//! Constraint solver: gates a module's `execute` on platform/arch/root/
//! kernel/OS-version/binary/package requirements before it ever runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::{Arch, ConnectionKind, OsInfo, Provider};

/// One family/local entry in `constraints.platform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformEntry {
    Supported(bool),
    Constraint(PlatformConstraint),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConstraint {
    #[serde(default)]
    pub arch: Vec<String>,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub kernel: Option<String>,
    #[serde(default)]
    pub min_os_version: Option<String>,
    #[serde(default)]
    pub binaries: Vec<BinaryConstraint>,
    #[serde(default)]
    pub packages: Vec<PackageConstraint>,
    #[serde(default)]
    pub distro: HashMap<String, DistroOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistroOverride {
    #[serde(default)]
    pub arch: Option<Vec<String>>,
    #[serde(default)]
    pub root: Option<bool>,
    #[serde(default)]
    pub kernel: Option<String>,
    #[serde(default)]
    pub min_os_version: Option<String>,
    #[serde(default)]
    pub binaries: Option<Vec<BinaryConstraint>>,
    #[serde(default)]
    pub packages: Option<Vec<PackageConstraint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryConstraint {
    /// Any-of candidate command names (`["python3", "python"]`).
    pub names: Vec<String>,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub version_regex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConstraint {
    #[serde(default)]
    pub name: Option<String>,
    /// Any-of candidate package names.
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub test_cmd: Option<String>,
    #[serde(default)]
    pub version_regex: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
}

/// A module's declared constraint set, keyed by OS family (plus `any` and
/// the local-connection-only override `local`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub platform: HashMap<String, PlatformEntry>,
}

impl Constraints {
    pub fn always() -> Self {
        let mut platform = HashMap::new();
        platform.insert("any".to_string(), PlatformEntry::Supported(true));
        Self { platform }
    }
}

/// Normalize a `uname -s`-family distro id into a canonical bucket.
pub fn normalize_distro_id(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let table: &[(&str, &str)] = &[
        ("ubuntu", "ubuntu"),
        ("debian", "debian"),
        ("rhel", "rhel"),
        ("centos", "centos"),
        ("rocky", "rocky"),
        ("fedora", "fedora"),
        ("alpine", "alpine"),
        ("arch", "arch"),
        ("opensuse", "suse"),
        ("sles", "suse"),
        ("suse", "suse"),
        ("amzn", "amazon"),
        ("amazon", "amazon"),
    ];
    for (needle, canonical) in table {
        if lower.contains(needle) {
            return canonical.to_string();
        }
    }
    lower
}

/// Coerce a distro version string to the first dotted-number group:
/// `2:1.17.3-1ubuntu1~22.04.1` -> `1.17.3`.
pub fn coerce_version(raw: &str) -> Option<String> {
    let re = once_cell::sync::Lazy::new(|| regex::Regex::new(r"\d+(\.\d+){0,3}").unwrap());
    re.find(raw).map(|m| m.as_str().to_string())
}

/// Compare `version` against a range expression. Tries semver first; falls
/// back to whitespace-separated `(op)?version` clauses compared segment by
/// segment (up to 3 dotted parts).
pub fn version_satisfies(version: &str, range: &str) -> bool {
    if let (Ok(v), Ok(req)) = (
        semver::Version::parse(&pad_semver(version)),
        semver::VersionReq::parse(range),
    ) {
        return req.matches(&v);
    }
    range
        .split_whitespace()
        .all(|clause| eval_clause(version, clause))
}

fn pad_semver(v: &str) -> String {
    let parts: Vec<&str> = v.split('.').collect();
    match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => v.to_string(),
    }
}

fn eval_clause(version: &str, clause: &str) -> bool {
    let (op, rest) = split_op(clause);
    let lhs = parse_segments(version);
    let rhs = parse_segments(rest);
    let ord = compare_segments(&lhs, &rhs);
    match op {
        "<=" => ord != std::cmp::Ordering::Greater,
        ">=" => ord != std::cmp::Ordering::Less,
        "<" => ord == std::cmp::Ordering::Less,
        ">" => ord == std::cmp::Ordering::Greater,
        "=" | "==" => ord == std::cmp::Ordering::Equal,
        _ => ord == std::cmp::Ordering::Equal,
    }
}

fn split_op(clause: &str) -> (&str, &str) {
    for op in ["<=", ">=", "==", "<", ">", "="] {
        if let Some(rest) = clause.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("==", clause.trim())
}

fn parse_segments(v: &str) -> [u64; 3] {
    let mut out = [0u64; 3];
    for (i, part) in v.split('.').take(3).enumerate() {
        out[i] = part.parse().unwrap_or(0);
    }
    out
}

fn compare_segments(a: &[u64; 3], b: &[u64; 3]) -> std::cmp::Ordering {
    a.cmp(b)
}

/// Run the full constraint solve for `module_name` against the connected
/// `provider`. Errors with [`Error::Constraint`] on the first unmet check.
pub async fn solve(
    module_name: &str,
    constraints: &Constraints,
    provider: &mut dyn Provider,
) -> Result<()> {
    let os = provider
        .os_info()
        .cloned()
        .unwrap_or_else(OsInfo::unknown);

    let entry = if provider.kind() == ConnectionKind::Local {
        constraints.platform.get("local")
    } else {
        None
    }
    .or_else(|| constraints.platform.get(os.family.as_str()))
    .or_else(|| constraints.platform.get("any"));

    let base = match entry {
        None => return Ok(()),
        Some(PlatformEntry::Supported(false)) => {
            return Err(Error::constraint(
                module_name,
                format!("platform '{}' is not supported", os.family.as_str()),
            ))
        }
        Some(PlatformEntry::Supported(true)) => return Ok(()),
        Some(PlatformEntry::Constraint(c)) => c.clone(),
    };

    let effective = apply_distro_override(base, &os);

    if !effective.arch.is_empty()
        && !effective.arch.iter().any(|a| a == "any" || a == os.arch.as_str())
    {
        return Err(Error::constraint(
            module_name,
            format!(
                "arch '{}' not in required set {:?} (family={})",
                os.arch.as_str(),
                effective.arch,
                os.family.as_str()
            ),
        ));
    }

    if effective.root {
        check_root(module_name, provider, &os).await?;
    }

    if let Some(range) = &effective.kernel {
        check_kernel(module_name, provider, &os, range).await?;
    }

    if let Some(min) = &effective.min_os_version {
        let version = os.version_id.clone().unwrap_or_default();
        if !version_satisfies(&version, &format!(">={min}")) {
            return Err(Error::constraint(
                module_name,
                format!(
                    "os version '{}' does not satisfy >={} (distro={})",
                    version,
                    min,
                    os.distro_id.as_deref().unwrap_or("unknown")
                ),
            ));
        }
    }

    for binary in &effective.binaries {
        check_binary(module_name, provider, &os, binary).await?;
    }

    for package in &effective.packages {
        check_package(module_name, provider, &os, package).await?;
    }

    Ok(())
}

fn apply_distro_override(mut base: PlatformConstraint, os: &OsInfo) -> PlatformConstraint {
    let distro_id = os
        .distro_id
        .as_deref()
        .map(normalize_distro_id)
        .unwrap_or_default();
    if let Some(over) = base.distro.get("any").cloned() {
        merge_override(&mut base, over);
    }
    if let Some(over) = base.distro.get(&distro_id).cloned() {
        merge_override(&mut base, over);
    }
    base
}

fn merge_override(base: &mut PlatformConstraint, over: DistroOverride) {
    if let Some(arch) = over.arch {
        base.arch = arch;
    }
    if let Some(root) = over.root {
        base.root = root;
    }
    if over.kernel.is_some() {
        base.kernel = over.kernel;
    }
    if over.min_os_version.is_some() {
        base.min_os_version = over.min_os_version;
    }
    if let Some(binaries) = over.binaries {
        base.binaries = binaries;
    }
    if let Some(packages) = over.packages {
        base.packages = packages;
    }
}

async fn check_root(module_name: &str, provider: &mut dyn Provider, os: &OsInfo) -> Result<()> {
    let exec = provider.executor(Default::default());
    let cmd = if os.family == crate::provider::OsFamily::Windows {
        "powershell -NoProfile -Command \"[bool]([Security.Principal.WindowsPrincipal][Security.Principal.WindowsIdentity]::GetCurrent()).IsInRole([Security.Principal.WindowsBuiltinRole]::Administrator)\""
    } else {
        "id -u"
    };
    let result = exec.run_safe(cmd, None).await;
    let is_root = if os.family == crate::provider::OsFamily::Windows {
        result.stdout.trim().eq_ignore_ascii_case("true")
    } else {
        result.stdout.trim() == "0"
    };
    if !is_root {
        return Err(Error::constraint(
            module_name,
            "requires root/administrator privileges",
        ));
    }
    Ok(())
}

async fn check_kernel(
    module_name: &str,
    provider: &mut dyn Provider,
    os: &OsInfo,
    range: &str,
) -> Result<()> {
    if os.family == crate::provider::OsFamily::Windows {
        return Ok(());
    }
    let exec = provider.executor(Default::default());
    let result = exec.run_safe("uname -r", None).await;
    let version = coerce_version(result.stdout.trim()).unwrap_or_default();
    if !version_satisfies(&version, range) {
        return Err(Error::constraint(
            module_name,
            format!("kernel '{version}' does not satisfy {range}"),
        ));
    }
    Ok(())
}

async fn check_binary(
    module_name: &str,
    provider: &mut dyn Provider,
    os: &OsInfo,
    binary: &BinaryConstraint,
) -> Result<()> {
    let exec = provider.executor(Default::default());
    let mut found_cmd = None;
    for name in &binary.names {
        let probe = if os.family == crate::provider::OsFamily::Windows {
            format!("Get-Command {name} -ErrorAction SilentlyContinue")
        } else {
            format!("command -v {name}")
        };
        let result = exec.run_safe(&probe, None).await;
        if result.is_success() && !result.stdout.trim().is_empty() {
            found_cmd = Some(name.clone());
            break;
        }
    }
    let Some(cmd) = found_cmd else {
        return Err(Error::constraint(
            module_name,
            format!("none of {:?} found on PATH", binary.names),
        ));
    };

    if binary.range.is_none() && binary.version_regex.is_none() {
        return Ok(());
    }

    let args = binary.args.clone().unwrap_or_else(|| "--version".to_string());
    let version_out = exec.run_safe(&format!("{cmd} {args}"), None).await;
    let haystack = format!("{}{}", version_out.stdout, version_out.stderr);
    let version = extract_version(&haystack, binary.version_regex.as_deref());
    if let (Some(version), Some(range)) = (&version, &binary.range) {
        if !version_satisfies(version, range) {
            return Err(Error::constraint(
                module_name,
                format!("binary '{cmd}' version '{version}' does not satisfy {range}"),
            ));
        }
    }
    Ok(())
}

fn extract_version(haystack: &str, pattern: Option<&str>) -> Option<String> {
    if let Some(pattern) = pattern {
        let re = regex::Regex::new(pattern).ok()?;
        return re
            .captures(haystack)
            .and_then(|c| c.get(1).or_else(|| c.get(0)))
            .map(|m| m.as_str().to_string());
    }
    coerce_version(haystack)
}

/// Detect the target's package manager via an ordered probe list.
pub async fn detect_package_manager(provider: &mut dyn Provider, os: &OsInfo) -> Option<&'static str> {
    let candidates: &[&str] = if os.family == crate::provider::OsFamily::Windows {
        &["winget", "choco"]
    } else if os.family == crate::provider::OsFamily::Darwin {
        &["brew", "port"]
    } else {
        &["apt", "dnf", "yum", "zypper", "apk", "pacman", "brew", "port"]
    };
    let exec = provider.executor(Default::default());
    for candidate in candidates {
        let probe = if os.family == crate::provider::OsFamily::Windows {
            format!("Get-Command {candidate} -ErrorAction SilentlyContinue")
        } else {
            format!("command -v {candidate}")
        };
        let result = exec.run_safe(&probe, None).await;
        if result.is_success() && !result.stdout.trim().is_empty() {
            return Some(candidate);
        }
    }
    None
}

fn query_command(manager: &str, name: &str) -> String {
    match manager {
        "apt" => format!("dpkg-query -W -f='${{Version}}' {name}"),
        "dnf" | "yum" => format!("rpm -q --qf '%{{EPOCH}}:%{{VERSION}}-%{{RELEASE}}' {name}"),
        "zypper" => format!("rpm -q --qf '%{{VERSION}}-%{{RELEASE}}' {name}"),
        "apk" => format!("apk info -v {name}"),
        "pacman" => format!("pacman -Qi {name}"),
        "brew" => format!("brew list --versions {name}"),
        "port" => format!("port -q installed {name}"),
        "winget" => format!("winget list --id {name}"),
        "choco" => format!("choco list --local-only --limit-output {name}"),
        _ => format!("echo {name}"),
    }
}

async fn check_package(
    module_name: &str,
    provider: &mut dyn Provider,
    os: &OsInfo,
    package: &PackageConstraint,
) -> Result<()> {
    let exec = provider.executor(Default::default());

    if let Some(test_cmd) = &package.test_cmd {
        let result = exec.run_safe(test_cmd, None).await;
        if !result.is_success() {
            return Err(Error::constraint(
                module_name,
                format!("package test command failed: {test_cmd}"),
            ));
        }
        if let Some(range) = &package.range {
            let haystack = format!("{}{}", result.stdout, result.stderr);
            if let Some(version) = extract_version(&haystack, package.version_regex.as_deref()) {
                if !version_satisfies(&version, range) {
                    return Err(Error::constraint(
                        module_name,
                        format!("package version '{version}' does not satisfy {range}"),
                    ));
                }
            }
        }
        return Ok(());
    }

    let candidates: Vec<String> = if !package.alternatives.is_empty() {
        package.alternatives.clone()
    } else if let Some(name) = &package.name {
        vec![name.clone()]
    } else {
        return Ok(());
    };

    let Some(manager) = detect_package_manager(provider, os).await else {
        return Err(Error::constraint(
            module_name,
            "no supported package manager detected",
        ));
    };

    for name in &candidates {
        let result = exec.run_safe(&query_command(manager, name), None).await;
        if result.is_success() && !result.stdout.trim().is_empty() {
            if let Some(range) = &package.range {
                let version = coerce_version(result.stdout.trim()).unwrap_or_default();
                if !version_satisfies(&version, range) {
                    continue;
                }
            }
            return Ok(());
        }
    }

    Err(Error::constraint(
        module_name,
        format!(
            "none of {:?} installed (manager={manager}, family={})",
            candidates,
            os.family.as_str()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_distro_substrings() {
        assert_eq!(normalize_distro_id("Ubuntu"), "ubuntu");
        assert_eq!(normalize_distro_id("rhel8"), "rhel");
        assert_eq!(normalize_distro_id("amzn2"), "amazon");
        assert_eq!(normalize_distro_id("opensuse-leap"), "suse");
    }

    #[test]
    fn coerces_dotted_version_with_epoch_and_suffix() {
        assert_eq!(
            coerce_version("2:1.17.3-1ubuntu1~22.04.1").as_deref(),
            Some("1.17.3")
        );
    }

    #[test]
    fn version_satisfies_fallback_range() {
        assert!(version_satisfies("1.6.0", ">=1.5.0 <2"));
        assert!(!version_satisfies("2.0.0", ">=1.5.0 <2"));
    }

    #[test]
    fn version_satisfies_semver_range() {
        assert!(version_satisfies("1.6.2", ">=1.5.0, <2.0.0"));
    }
}
