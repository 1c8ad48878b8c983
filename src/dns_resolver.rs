//! Iterative DNS NS resolution from the root servers.
//!
//! Walks the delegation chain with non-recursive UDP NS queries, shortcuts
//! through a per-TLD nameserver cache, and renders a human-readable trace of
//! the walk into the record's raw response.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use once_cell::sync::Lazy;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config;
use crate::errors::LookupError;
use crate::record::{DomainInfo, LookupOutcome, LookupType};

const ROOT_SERVERS: [&str; 13] = [
    "a.root-servers.net.",
    "b.root-servers.net.",
    "c.root-servers.net.",
    "d.root-servers.net.",
    "e.root-servers.net.",
    "f.root-servers.net.",
    "g.root-servers.net.",
    "h.root-servers.net.",
    "i.root-servers.net.",
    "j.root-servers.net.",
    "k.root-servers.net.",
    "l.root-servers.net.",
    "m.root-servers.net.",
];

// Delegation chains deeper than this are not walked further.
const MAX_RESOLVE_LEVEL: usize = 3;

const DNS_PORT: u16 = 53;

/// TLD -> nameserver hosts, filled on the first walk that sees a TLD-owned
/// NS answer and never evicted for the process lifetime. Read-mostly.
static TLD_NS_CACHE: Lazy<RwLock<HashMap<String, Vec<String>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn has_tld_ns_cache(tld: &str) -> bool {
    TLD_NS_CACHE
        .read()
        .expect("tld ns cache lock poisoned")
        .contains_key(tld)
}

/// First writer wins; later calls with the same TLD are no-ops.
pub fn add_tld_ns_cache(tld: &str, name_servers: Vec<String>) {
    TLD_NS_CACHE
        .write()
        .expect("tld ns cache lock poisoned")
        .entry(tld.to_string())
        .or_insert(name_servers);
}

pub fn get_tld_ns_cache(tld: &str) -> Vec<String> {
    TLD_NS_CACHE
        .read()
        .expect("tld ns cache lock poisoned")
        .get(tld)
        .cloned()
        .unwrap_or_default()
}

/// What one successful NS answer contributed to the walk.
#[derive(Debug, Default)]
struct LevelScan {
    /// Every NS host in the answer, as the next level's servers.
    response_ns: Vec<String>,
    /// NS hosts whose owner name equals the queried FQDN.
    target_ns: Vec<String>,
    /// Owner name of the last NS record seen (for the trace).
    owner: String,
    /// The answer's owner equals the TLD label, so it can seed the cache.
    tld_owned: bool,
}

fn scan_message(message: &Message, target: &str, tld: &str) -> LevelScan {
    let mut scan = LevelScan::default();

    let records = if message.answers().is_empty() {
        message.name_servers()
    } else {
        message.answers()
    };

    for record in records {
        let Some(RData::NS(ns)) = record.data() else {
            continue;
        };

        let host = ns.0.to_utf8();
        scan.response_ns.push(host.clone());
        scan.owner = record
            .name()
            .to_utf8()
            .trim_matches('.')
            .to_lowercase();

        if scan.owner == target {
            scan.target_ns
                .push(host.trim_matches('.').to_lowercase());
        } else if scan.owner == tld {
            scan.tld_owned = true;
        }
    }

    scan
}

async fn query_ns(
    nameserver: &str,
    fqdn: &Name,
    io_timeout: Duration,
) -> Result<Message, LookupError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| LookupError::DnsServerFailed(e.to_string()))?;

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false);
    message.add_query(Query::query(fqdn.clone(), RecordType::NS));

    let request = message
        .to_vec()
        .map_err(|e| LookupError::DnsServerFailed(e.to_string()))?;

    let target = (nameserver.trim_matches('.'), DNS_PORT);
    match timeout(io_timeout, socket.send_to(&request, target)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => return Err(LookupError::DnsServerFailed(err.to_string())),
        Err(_) => return Err(LookupError::DnsTimeout(nameserver.to_string())),
    }

    let mut buffer = [0u8; 4096];
    let len = match timeout(io_timeout, socket.recv(&mut buffer)).await {
        Ok(Ok(len)) => len,
        Ok(Err(err)) => return Err(LookupError::DnsServerFailed(err.to_string())),
        Err(_) => return Err(LookupError::DnsTimeout(nameserver.to_string())),
    };

    Message::from_vec(&buffer[..len]).map_err(|e| LookupError::DnsServerFailed(e.to_string()))
}

/// Resolve the authoritative NS set for `domain` by walking the delegation
/// chain, shortcutting through the TLD cache when it is already warm.
pub async fn ns_check(domain: &str) -> LookupOutcome {
    debug!("Resolving NS record for domain {}", domain);

    let mut info = DomainInfo {
        lookup_type: LookupType::Dns,
        domain_name: domain.to_string(),
        ..DomainInfo::default()
    };

    let cfg = config::get();
    let io_timeout = Duration::from_secs(cfg.dns_timeout);

    let target = domain.trim_matches('.').to_lowercase();
    let parts: Vec<&str> = target.split('.').collect();
    if parts.len() < 2 {
        return LookupOutcome::err(info, LookupError::InvalidDomainName(domain.to_string()));
    }
    let tld = parts[parts.len() - 1].to_string();

    let fqdn = match Name::from_utf8(format!("{target}.")) {
        Ok(name) => name,
        Err(err) => {
            return LookupOutcome::err(info, LookupError::InvalidDomainName(err.to_string()))
        }
    };

    let mut level = 0usize;
    let mut trace = String::from("┌─ DNS Resolution Trace\n");
    trace.push_str(&format!("├─ Target: {target}\n"));
    trace.push_str("├─ Root Servers: \n");
    for root in ROOT_SERVERS {
        trace.push_str(&format!("│  ├─ {root}\n"));
    }

    let mut next_nameservers: Vec<String> = ROOT_SERVERS.iter().map(|s| s.to_string()).collect();

    if has_tld_ns_cache(&tld) {
        let cached = get_tld_ns_cache(&tld);
        debug!("Using cached NS records for '{}': {:?}", tld, cached);

        trace.push_str("│\n");
        trace.push_str(&format!("├─ Level {}: Query for {target}\n", level + 1));
        trace.push_str(&format!("├─ Got answer for: {tld}\n"));
        trace.push_str("├─ Found nameservers: \n");
        for ns in &cached {
            trace.push_str(&format!("│  ├─ {ns}\n"));
        }
        if let Some(first) = cached.first() {
            trace.push_str(&format!("└─ Via: {first}\n"));
        }

        next_nameservers = cached;
        level += 1;
    }

    let mut target_ns: Vec<String> = Vec::new();

    loop {
        let indent = "│  ".repeat(level);
        trace.push_str("│\n");
        trace.push_str(&format!("{indent}├─ Level {}: Query for {target}\n", level + 1));

        let mut found = false;
        let mut response_ns: Vec<String> = Vec::new();

        for nameserver in &next_nameservers {
            let message = match query_ns(nameserver, &fqdn, io_timeout).await {
                Ok(message) => message,
                Err(err) => {
                    debug!(
                        "Failed to query DNS for domain {} using nameserver {}: {}",
                        target, nameserver, err
                    );
                    continue;
                }
            };

            debug!(
                "DNS query for {} using nameserver {} Rcode is {}",
                target,
                nameserver,
                message.response_code()
            );
            if message.response_code() != ResponseCode::NoError {
                continue;
            }

            let scan = scan_message(&message, &target, &tld);
            if scan.response_ns.is_empty() {
                continue;
            }

            found = true;
            target_ns.extend(scan.target_ns.iter().cloned());

            trace.push_str(&format!("{indent}├─ Got answer for: {}\n", scan.owner));
            trace.push_str(&format!("{indent}├─ Found nameservers: \n"));
            for ns in &scan.response_ns {
                trace.push_str(&format!("{indent}│  ├─ {ns}\n"));
            }
            trace.push_str(&format!("{indent}└─ Via: {nameserver}\n"));

            if scan.tld_owned && !has_tld_ns_cache(&tld) {
                info!("Adding NS records for '{}' to cache: {:?}", tld, scan.response_ns);
                add_tld_ns_cache(&tld, scan.response_ns.clone());
            }

            response_ns = scan.response_ns;
            break;
        }

        if !target_ns.is_empty() {
            info!("Found NS record for {} are: {:?}", target, target_ns);
            break;
        }

        if !found {
            info!("No nameservers found for {}", target);
            trace.push_str(&format!("{indent}└─ No nameservers found for {target}\n"));
            break;
        }

        next_nameservers = response_ns;
        level += 1;

        if level > MAX_RESOLVE_LEVEL {
            warn!("Failed to resolve NS record for domain {}", target);
            break;
        }
    }

    trace.push_str("│\n");
    trace.push_str("└─ Resolution Complete\n");

    info.name_server = target_ns;
    info.raw_response = trace;

    if info.name_server.is_empty() {
        return LookupOutcome::err(info, LookupError::NsNotFound(domain.to_string()));
    }

    LookupOutcome::ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::NS;
    use hickory_proto::rr::Record;

    fn ns_record(owner: &str, host: &str) -> Record {
        Record::from_rdata(
            Name::from_utf8(owner).unwrap(),
            172800,
            RData::NS(NS(Name::from_utf8(host).unwrap())),
        )
    }

    #[test]
    fn scan_collects_target_owned_ns() {
        let mut message = Message::new();
        message.add_answer(ns_record("example.com.", "a.iana-servers.net."));
        message.add_answer(ns_record("example.com.", "b.iana-servers.net."));

        let scan = scan_message(&message, "example.com", "com");
        assert_eq!(scan.target_ns, vec!["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(scan.response_ns.len(), 2);
        assert!(!scan.tld_owned);
    }

    #[test]
    fn scan_falls_back_to_the_authority_section_and_flags_tld_answers() {
        let mut message = Message::new();
        message.add_name_server(ns_record("com.", "a.gtld-servers.net."));
        message.add_name_server(ns_record("com.", "b.gtld-servers.net."));

        let scan = scan_message(&message, "example.com", "com");
        assert!(scan.target_ns.is_empty());
        assert_eq!(scan.response_ns.len(), 2);
        assert!(scan.tld_owned);
    }

    #[test]
    fn cache_first_writer_wins_and_readers_do_not_block() {
        let tld = "cache-test-zone";
        assert!(!has_tld_ns_cache(tld));

        let first = vec!["a.gtld-servers.net.".to_string()];
        let second = vec!["x.other-servers.net.".to_string()];

        add_tld_ns_cache(tld, first.clone());
        add_tld_ns_cache(tld, second);

        assert!(has_tld_ns_cache(tld));
        assert_eq!(get_tld_ns_cache(tld), first);
    }

    #[test]
    fn parallel_cache_writes_keep_exactly_one_entry() {
        let tld = "race-test-zone";
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    add_tld_ns_cache(tld, vec![format!("ns{i}.example.net.")]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let cached = get_tld_ns_cache(tld);
        assert_eq!(cached.len(), 1);
        assert!(cached[0].starts_with("ns"));
    }

    #[tokio::test]
    async fn unresolvable_single_label_is_an_invalid_domain() {
        let outcome = ns_check("localhost").await;
        assert!(matches!(
            outcome.error,
            Some(LookupError::InvalidDomainName(_))
        ));
    }
}
