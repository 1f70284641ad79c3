use std::net::IpAddr;

use ipnet::IpNet;

/// An address-based peer: a CIDR and the addresses carved out of it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpBlock {
    pub cidr: String,
    pub except: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("unable to parse ipBlock CIDR {0:?}")]
pub struct InvalidCidr(pub String);

/// Tests `ip` against `block`. The exception list is compared against the
/// address's string form before the CIDR is consulted, so an excepted
/// address loses even when the CIDR contains it.
///
/// The CIDR is parsed here rather than at construction so that malformed
/// policy content surfaces as an evaluation error.
pub fn match_ip_block(block: &IpBlock, ip: IpAddr, ip_str: &str) -> Result<bool, InvalidCidr> {
    if block.except.iter().any(|except| except == ip_str) {
        return Ok(false);
    }

    let net = block
        .cidr
        .parse::<IpNet>()
        .map_err(|_| InvalidCidr(block.cidr.clone()))?;

    Ok(net.contains(&ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(cidr: &str, except: &[&str]) -> IpBlock {
        IpBlock {
            cidr: cidr.to_string(),
            except: except.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn matches_an_ip_in_the_block() {
        let ip = "10.1.1.0".parse().unwrap();
        assert!(match_ip_block(&block("10.1.1.0/16", &[]), ip, "10.1.1.0").unwrap());
    }

    #[test]
    fn does_not_match_an_ip_outside_the_block() {
        let ip = "20.1.1.0".parse().unwrap();
        assert!(!match_ip_block(&block("10.1.1.0/16", &[]), ip, "20.1.1.0").unwrap());
    }

    #[test]
    fn excepted_ip_loses_even_inside_the_block() {
        let ip = "10.1.1.0".parse().unwrap();
        assert!(!match_ip_block(&block("10.1.1.0/16", &["10.1.1.0"]), ip, "10.1.1.0").unwrap());
    }

    #[test]
    fn exception_is_checked_before_the_cidr_parses() {
        let ip = "10.1.1.0".parse().unwrap();
        assert!(!match_ip_block(&block("not-a-cidr", &["10.1.1.0"]), ip, "10.1.1.0").unwrap());
    }

    #[test]
    fn malformed_cidr_is_an_error() {
        let ip = "10.1.1.0".parse().unwrap();
        let err = match_ip_block(&block("10.1.1.0", &[]), ip, "10.1.1.0").unwrap_err();
        assert_eq!(err.0, "10.1.1.0");
    }
}
