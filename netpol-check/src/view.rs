use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Result};
use owo_colors::OwoColorize;

use netpol_check_core::{
    ConnectionSide, Direction, EvalResult, NetworkPolicy, PolicyPort, PolicyResult, PortId,
    PortResult, Rule,
};

/// How much evaluation detail to print.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Ports and their verdicts.
    Default,
    /// Also the policies that matched either pod.
    DetailMatching,
    /// Also the policies that did not match.
    DetailNotMatching,
}

impl Verbosity {
    pub fn from_flags(count: u8) -> Self {
        match count {
            0 => Self::Default,
            1 => Self::DetailMatching,
            _ => Self::DetailNotMatching,
        }
    }
}

/// Renders per-port verdicts, with per-direction and per-policy detail at
/// higher verbosity.
///
/// Returns an error when no port is accessible so the caller exits non-zero;
/// an all-denied run is a normal outcome, not a failure.
pub fn render_check_access(
    w: &mut impl Write,
    verbosity: Verbosity,
    results: &[PortResult],
    source: &ConnectionSide,
    dest: &ConnectionSide,
) -> Result<()> {
    if results.is_empty() {
        writeln!(w, "No ports found on {}.", dest.name())?;
    }

    let mut accessible = 0;
    for result in results {
        if result.allowed {
            accessible += 1;
        }

        writeln!(
            w,
            "{} {} {} {}",
            allow_symbol(result.allowed),
            result.to_port.name,
            result.to_port.number,
            allow_word(result.allowed),
        )?;

        if verbosity > Verbosity::Default {
            writeln!(
                w,
                "      {} Egress from pod {}",
                allow_symbol(result.egress_allowed),
                source.name(),
            )?;
            render_policy_results(w, verbosity, "            ", &result.egress)?;
            writeln!(
                w,
                "      {} Ingress to pod {}",
                allow_symbol(result.ingress_allowed),
                dest.name(),
            )?;
            render_policy_results(w, verbosity, "            ", &result.ingress)?;
        }
    }

    if accessible == 0 {
        bail!("no ports accessible");
    }
    Ok(())
}

fn render_policy_results(
    w: &mut impl Write,
    verbosity: Verbosity,
    prefix: &str,
    results: &[PolicyResult],
) -> Result<()> {
    let matching = results
        .iter()
        .filter(|r| r.result != EvalResult::NoMatch)
        .count();
    if matching == 0 {
        writeln!(w, "{prefix}{} (no matching policies)", eval_result(EvalResult::Allow))?;
    }

    for r in results {
        if r.result == EvalResult::NoMatch && verbosity < Verbosity::DetailNotMatching {
            continue;
        }
        writeln!(
            w,
            "{prefix}{} from NetworkPolicy {}/{}",
            eval_result(r.result),
            r.policy.namespace,
            r.policy.name,
        )?;
    }
    Ok(())
}

/// Renders the `inspect` table: one row per policy selecting the pod, with a
/// port summary per direction.
pub fn render_policy_match(w: &mut impl Write, matches: &[Arc<NetworkPolicy>]) -> Result<()> {
    writeln!(w, "MATCH\tNAME\tPOLICY\tI-PORT\tE-PORT")?;
    for np in matches {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            "✓".green(),
            np.name,
            policy_types(np),
            direction_ports(np, Direction::Ingress),
            direction_ports(np, Direction::Egress),
        )?;
    }
    Ok(())
}

fn policy_types(np: &NetworkPolicy) -> String {
    np.types
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Summarizes the ports a policy's rules name in one direction. A direction
/// that is declared but has no rules denies everything.
fn direction_ports(np: &NetworkPolicy, direction: Direction) -> String {
    let rules = np.rules(direction);
    if np.describes(direction) && rules.is_empty() {
        return "deny".to_string();
    }
    rules.iter().map(rule_ports).collect::<Vec<_>>().join(",")
}

fn rule_ports(rule: &Rule) -> String {
    rule.ports
        .iter()
        .map(policy_port)
        .collect::<Vec<_>>()
        .join(",")
}

fn policy_port(port: &PolicyPort) -> String {
    match (&port.port, port.end_port) {
        (None, _) => "ALL".to_string(),
        (Some(PortId::Number(lo)), Some(hi)) => format!("{lo}-{hi}"),
        (Some(PortId::Number(number)), None) => number.to_string(),
        (Some(PortId::Name(name)), _) => name.to_lowercase(),
    }
}

fn allow_symbol(allowed: bool) -> String {
    if allowed {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

fn allow_word(allowed: bool) -> &'static str {
    if allowed {
        "Allow"
    } else {
        "Deny"
    }
}

fn eval_result(result: EvalResult) -> String {
    match result {
        EvalResult::Allow => "Allow".green().to_string(),
        EvalResult::Deny => "Deny".red().to_string(),
        EvalResult::NoMatch => "No Match".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpol_check_core::Protocol;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(0), Verbosity::Default);
        assert_eq!(Verbosity::from_flags(1), Verbosity::DetailMatching);
        assert_eq!(Verbosity::from_flags(2), Verbosity::DetailNotMatching);
        assert_eq!(Verbosity::from_flags(7), Verbosity::DetailNotMatching);
    }

    #[test]
    fn policy_port_summaries() {
        let all = PolicyPort {
            protocol: Protocol::Tcp,
            port: None,
            end_port: None,
        };
        assert_eq!(policy_port(&all), "ALL");

        let number = PolicyPort {
            port: Some(PortId::Number(8080)),
            ..all.clone()
        };
        assert_eq!(policy_port(&number), "8080");

        let range = PolicyPort {
            port: Some(PortId::Number(8080)),
            end_port: Some(9090),
            ..all.clone()
        };
        assert_eq!(policy_port(&range), "8080-9090");

        let named = PolicyPort {
            port: Some(PortId::Name("Admin".to_string())),
            ..all
        };
        assert_eq!(policy_port(&named), "admin");
    }

    #[test]
    fn declared_direction_without_rules_summarizes_as_deny() {
        let np = NetworkPolicy {
            namespace: "ns-one".to_string(),
            name: "deny-all".to_string(),
            types: vec![Direction::Ingress],
            ..NetworkPolicy::default()
        };
        assert_eq!(direction_ports(&np, Direction::Ingress), "deny");
        assert_eq!(direction_ports(&np, Direction::Egress), "");
    }

    #[test]
    fn all_ports_denied_is_reported_as_an_error() {
        let source = ConnectionSide::external("192.0.2.1", "80", Protocol::Tcp).unwrap();
        let dest = ConnectionSide::external("192.0.2.2", "80", Protocol::Tcp).unwrap();

        let results = vec![PortResult {
            to_port: netpol_check_core::DestinationPort {
                in_cluster: true,
                name: "http".to_string(),
                number: 80,
                protocol: Protocol::Tcp,
            },
            egress: vec![],
            ingress: vec![],
            egress_allowed: false,
            ingress_allowed: true,
            allowed: false,
        }];

        let mut out = Vec::new();
        let err = render_check_access(&mut out, Verbosity::Default, &results, &source, &dest)
            .unwrap_err();
        assert_eq!(err.to_string(), "no ports accessible");
    }
}
